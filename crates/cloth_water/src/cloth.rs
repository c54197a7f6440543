//! Mass-spring cloth sheet.
//!
//! Particles sit on a `width x height` grid in the XZ plane, indexed
//! `y * width + x`. Each quad gets structural springs to its right and lower
//! neighbours plus a single shear diagonal to (x+1, y+1). There is no
//! anti-diagonal and no bend spring, so the sheet is deliberately stiffer
//! along one diagonal than the other.
//!
//! A tick is split into force accumulation and integration so that outside
//! forces (water, wind) can be added in between:
//!
//! ```
//! use cloth_water::ClothState;
//! use glam::Vec3;
//!
//! let mut cloth = ClothState::new(8, 8, 0.1);
//! cloth.pin(0);
//! cloth.prepare_forces();
//! cloth.apply_gravity(Vec3::new(0.0, -2.0, 0.0));
//! cloth.finalize_integration(1.0 / 60.0);
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTACT_ABSORPTION, MAX_SPRING_FORCE, PARTICLE_MASS, SHEAR_DAMPING, SHEAR_STIFFNESS,
    STRUCTURAL_DAMPING, STRUCTURAL_STIFFNESS, VELOCITY_DAMPING_PER_STEP,
};
use crate::particle::{Particle, Spring, SpringKind};
use crate::serde_utils::{deserialize_vec3, serialize_vec3};

/// Stiffness and damping of one spring family.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpringCoeffs {
    pub stiffness: f32,
    pub damping: f32,
}

/// How free particle velocities are damped after each velocity update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VelocityDamping {
    /// Multiply by a flat factor once per call, whatever the step size.
    PerStep(f32),
    /// Multiply by `exp(-rate * dt)`, consistent across variable frame times.
    Exponential { rate: f32 },
}

impl Default for VelocityDamping {
    fn default() -> Self {
        VelocityDamping::PerStep(VELOCITY_DAMPING_PER_STEP)
    }
}

impl VelocityDamping {
    /// Velocity multiplier for a step of length `dt`.
    pub fn factor(self, dt: f32) -> f32 {
        match self {
            VelocityDamping::PerStep(f) => f,
            VelocityDamping::Exponential { rate } => (-rate * dt).exp(),
        }
    }
}

/// Cloth construction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothConfig {
    /// Particles along X
    pub width: usize,
    /// Particles along Z
    pub height: usize,
    /// Distance between grid neighbours at rest
    pub spacing: f32,
    pub particle_mass: f32,
    /// Horizontal and vertical springs
    pub structural: SpringCoeffs,
    /// Diagonal springs
    pub shear: SpringCoeffs,
    pub velocity_damping: VelocityDamping,
}

impl Default for ClothConfig {
    fn default() -> Self {
        Self {
            width: 15,
            height: 15,
            spacing: 0.15,
            particle_mass: PARTICLE_MASS,
            structural: SpringCoeffs {
                stiffness: STRUCTURAL_STIFFNESS,
                damping: STRUCTURAL_DAMPING,
            },
            shear: SpringCoeffs {
                stiffness: SHEAR_STIFFNESS,
                damping: SHEAR_DAMPING,
            },
            velocity_damping: VelocityDamping::default(),
        }
    }
}

impl ClothConfig {
    /// Default coefficients for a `width x height` sheet.
    pub fn grid(width: usize, height: usize, spacing: f32) -> Self {
        Self {
            width,
            height,
            spacing,
            ..Default::default()
        }
    }
}

/// Infinite plane `position . normal >= height` the cloth cannot pass through.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HalfSpace {
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub normal: Vec3,
    pub height: f32,
}

impl HalfSpace {
    /// Horizontal floor at `height`.
    pub fn floor(height: f32) -> Self {
        Self {
            normal: Vec3::Y,
            height,
        }
    }
}

/// The four grid corners, for pinning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    /// (0, 0), particle 0
    TopLeft,
    /// (width-1, 0)
    TopRight,
    /// (0, height-1)
    BottomLeft,
    /// (width-1, height-1)
    BottomRight,
}

/// Particle/spring mesh and its force + integration pipeline.
#[derive(Clone, Debug)]
pub struct ClothState {
    particles: Vec<Particle>,
    springs: Vec<Spring>,
    config: ClothConfig,
}

impl ClothState {
    /// Build a sheet with default spring coefficients.
    ///
    /// # Panics
    /// If `width`, `height` or `spacing` is not positive.
    pub fn new(width: usize, height: usize, spacing: f32) -> Self {
        Self::from_config(&ClothConfig::grid(width, height, spacing))
    }

    /// Build a sheet from a full configuration.
    ///
    /// # Panics
    /// If the grid dimensions, spacing or particle mass are not positive.
    pub fn from_config(config: &ClothConfig) -> Self {
        assert!(
            config.width > 0 && config.height > 0,
            "cloth grid must be at least 1x1, got {}x{}",
            config.width,
            config.height
        );
        assert!(config.spacing > 0.0, "cloth spacing must be positive");
        assert!(config.particle_mass > 0.0, "particle mass must be positive");

        let (w, h) = (config.width, config.height);
        let mut particles = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let pos = Vec3::new(x as f32 * config.spacing, 0.0, y as f32 * config.spacing);
                particles.push(Particle::new(pos, config.particle_mass));
            }
        }

        let springs = build_springs(&particles, config);
        log::info!(
            "Cloth {}x{}: {} particles, {} springs",
            w,
            h,
            particles.len(),
            springs.len()
        );

        Self {
            particles,
            springs,
            config: config.clone(),
        }
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn height(&self) -> usize {
        self.config.height
    }

    pub fn spacing(&self) -> f32 {
        self.config.spacing
    }

    pub fn config(&self) -> &ClothConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// Mutable access to one particle. Bypasses pinning, so it stays internal.
    pub(crate) fn particle_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    pub(crate) fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Flat index of grid position (x, y).
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.config.width + x
    }

    /// Pin a particle in place. Out-of-range indices are ignored.
    pub fn pin(&mut self, index: usize) {
        if let Some(p) = self.particles.get_mut(index) {
            p.fixed = true;
        }
    }

    pub fn pin_corner(&mut self, corner: Corner) {
        let (w, h) = (self.config.width, self.config.height);
        let index = match corner {
            Corner::TopLeft => 0,
            Corner::TopRight => w - 1,
            Corner::BottomLeft => (h - 1) * w,
            Corner::BottomRight => w * h - 1,
        };
        self.pin(index);
    }

    /// Set the velocity of every free particle.
    pub fn set_initial_velocity(&mut self, velocity: Vec3) {
        for p in self.particles.iter_mut().filter(|p| !p.fixed) {
            p.velocity = velocity;
        }
    }

    /// Move the whole sheet, pinned particles included. Rest lengths are kept.
    ///
    /// Only used while (re)building a scene, before pins are applied.
    pub(crate) fn translate(&mut self, offset: Vec3) {
        for p in &mut self.particles {
            p.position += offset;
        }
    }

    /// Standalone tick without water: springs, gravity, air drag, integrate.
    pub fn update(&mut self, dt: f32, gravity: Vec3, drag_coefficient: f32, air_velocity: Vec3) {
        self.prepare_forces();
        self.apply_gravity(gravity);
        self.apply_air_drag(drag_coefficient, air_velocity);
        self.finalize_integration(dt);
    }

    /// First half of a tick: clear forces and add spring forces.
    pub fn prepare_forces(&mut self) {
        self.clear_and_accumulate_spring_forces();
    }

    /// Second half of a tick: velocities, then positions.
    pub fn finalize_integration(&mut self, dt: f32) {
        self.integrate_velocities(dt);
        self.integrate_positions(dt);
    }

    /// Zero all forces, then accumulate damped spring forces.
    ///
    /// The combined force of each spring is clamped to `MAX_SPRING_FORCE`. A
    /// pinned endpoint does not receive its share.
    pub fn clear_and_accumulate_spring_forces(&mut self) {
        for p in &mut self.particles {
            p.force = Vec3::ZERO;
        }

        for spring in &self.springs {
            let p1 = self.particles[spring.particle1];
            let p2 = self.particles[spring.particle2];

            let delta = p2.position - p1.position;
            let distance = delta.length();
            if distance <= 0.0 {
                continue;
            }

            let direction = delta / distance;
            let spring_force = direction * (distance - spring.rest_length()) * spring.stiffness;
            let relative_velocity = p2.velocity - p1.velocity;
            let damping_force = direction * relative_velocity.dot(direction) * spring.damping;

            let mut total = spring_force + damping_force;
            let mag = total.length();
            if mag > MAX_SPRING_FORCE {
                total *= MAX_SPRING_FORCE / mag;
            }

            // Stretched springs pull p1 toward p2 and p2 toward p1
            self.particles[spring.particle1].add_force(total);
            self.particles[spring.particle2].add_force(-total);
        }
    }

    /// Add `gravity * mass` to every free particle.
    pub fn apply_gravity(&mut self, gravity: Vec3) {
        for p in &mut self.particles {
            let f = gravity * p.mass;
            p.add_force(f);
        }
    }

    /// Linear drag against the air: `-(v - air) * coefficient`.
    pub fn apply_air_drag(&mut self, drag_coefficient: f32, air_velocity: Vec3) {
        for p in &mut self.particles {
            let relative = p.velocity - air_velocity;
            let speed = relative.length();
            if speed > 0.0 {
                let f = -(relative / speed) * speed * drag_coefficient;
                p.add_force(f);
            }
        }
    }

    /// Symplectic Euler velocity update followed by velocity damping.
    pub fn integrate_velocities(&mut self, dt: f32) {
        let damping = self.config.velocity_damping.factor(dt);
        for p in self.particles.iter_mut().filter(|p| !p.fixed) {
            p.velocity += (p.force / p.mass) * dt;
            p.velocity *= damping;
        }
    }

    pub fn integrate_positions(&mut self, dt: f32) {
        for p in self.particles.iter_mut().filter(|p| !p.fixed) {
            p.position += p.velocity * dt;
        }
    }

    /// Project penetrating particles back onto the plane and absorb most of
    /// their into-plane velocity.
    pub fn handle_half_space_collision(&mut self, plane_normal: Vec3, plane_height: f32) {
        for p in self.particles.iter_mut().filter(|p| !p.fixed) {
            let d = p.position.dot(plane_normal);
            if d < plane_height {
                p.position -= plane_normal * (d - plane_height);

                let vn = p.velocity.dot(plane_normal);
                if vn < 0.0 {
                    p.velocity -= plane_normal * vn * CONTACT_ABSORPTION;
                }
            }
        }
    }

    pub fn collide(&mut self, plane: &HalfSpace) {
        self.handle_half_space_collision(plane.normal, plane.height);
    }

    /// Area-weighted vertex normals from two triangles per quad.
    pub fn recompute_vertex_normals(&mut self) {
        for p in &mut self.particles {
            p.normal = Vec3::ZERO;
        }

        let (w, h) = (self.config.width, self.config.height);
        for y in 0..h.saturating_sub(1) {
            for x in 0..w.saturating_sub(1) {
                let i0 = y * w + x;
                let i1 = i0 + 1;
                let i2 = i0 + w;
                let i3 = i2 + 1;

                for [a, b, c] in [[i0, i2, i1], [i1, i2, i3]] {
                    let pa = self.particles[a].position;
                    let n = (self.particles[b].position - pa)
                        .cross(self.particles[c].position - pa);
                    self.particles[a].normal += n;
                    self.particles[b].normal += n;
                    self.particles[c].normal += n;
                }
            }
        }

        for p in &mut self.particles {
            p.normal = p.normal.normalize_or_zero();
        }
    }

    pub fn kinetic_energy(&self) -> f32 {
        self.particles.iter().map(Particle::kinetic_energy).sum()
    }

    pub fn max_speed(&self) -> f32 {
        self.particles
            .iter()
            .map(|p| p.velocity.length())
            .fold(0.0f32, f32::max)
    }

    /// Axis-aligned bounds of all particle positions as (min, max).
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.particles.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(p.position), hi.max(p.position)),
        )
    }
}

fn build_springs(particles: &[Particle], config: &ClothConfig) -> Vec<Spring> {
    let (w, h) = (config.width, config.height);
    let st = config.structural;
    let sh = config.shear;
    let mut springs = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let current = y * w + x;

            if x + 1 < w {
                springs.push(Spring::between(
                    particles,
                    current,
                    current + 1,
                    st.stiffness,
                    st.damping,
                    SpringKind::Horizontal,
                ));
            }
            if y + 1 < h {
                springs.push(Spring::between(
                    particles,
                    current,
                    current + w,
                    st.stiffness,
                    st.damping,
                    SpringKind::Vertical,
                ));
            }
            if x + 1 < w && y + 1 < h {
                springs.push(Spring::between(
                    particles,
                    current,
                    current + w + 1,
                    sh.stiffness,
                    sh.damping,
                    SpringKind::Shear,
                ));
            }
        }
    }

    springs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloth_creation() {
        let cloth = ClothState::new(4, 3, 0.5);
        assert_eq!(cloth.particles().len(), 12);
        // 3*3 horizontal + 4*2 vertical + 3*2 shear
        assert_eq!(cloth.springs().len(), 9 + 8 + 6);
        assert_eq!(cloth.particles()[cloth.index(2, 1)].position, Vec3::new(1.0, 0.0, 0.5));
        assert!(cloth.particles().iter().all(|p| !p.fixed && p.mass == 1.0));
    }

    #[test]
    fn test_spring_topology() {
        let cloth = ClothState::new(3, 3, 1.0);
        let shear: Vec<_> = cloth
            .springs()
            .iter()
            .filter(|s| s.kind == SpringKind::Shear)
            .collect();
        assert_eq!(shear.len(), 4);
        for s in shear {
            assert_eq!(s.particle2, s.particle1 + 4, "shear must go to (x+1, y+1)");
            assert!((s.rest_length() - 2f32.sqrt()).abs() < 1e-6);
            assert_eq!(s.stiffness, 250.0);
            assert_eq!(s.damping, 6.0);
        }
        let structural = cloth
            .springs()
            .iter()
            .filter(|s| s.kind != SpringKind::Shear);
        for s in structural {
            assert_eq!(s.stiffness, 500.0);
            assert_eq!(s.damping, 10.0);
            assert!((s.rest_length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    #[should_panic]
    fn test_zero_width_panics() {
        let _ = ClothState::new(0, 4, 0.1);
    }

    #[test]
    fn test_pin_out_of_range_is_noop() {
        let mut cloth = ClothState::new(2, 2, 1.0);
        cloth.pin(99);
        assert!(cloth.particles().iter().all(|p| !p.fixed));
        cloth.pin_corner(Corner::BottomRight);
        assert!(cloth.particles()[3].fixed);
    }

    #[test]
    fn test_rest_layout_has_no_spring_force() {
        let mut cloth = ClothState::new(4, 4, 0.3);
        cloth.clear_and_accumulate_spring_forces();
        for p in cloth.particles() {
            assert!(p.force.length() < 1e-4, "force at rest: {:?}", p.force);
        }
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let mut cloth = ClothState::new(2, 1, 1.0);
        cloth.particle_mut(1).unwrap().position.x = 1.5;
        cloth.clear_and_accumulate_spring_forces();
        let f0 = cloth.particles()[0].force;
        let f1 = cloth.particles()[1].force;
        assert!((f0.x - 250.0).abs() < 1e-3, "p0 pulled toward +x: {:?}", f0);
        assert!((f1.x + 250.0).abs() < 1e-3, "p1 pulled toward -x: {:?}", f1);
    }

    #[test]
    fn test_spring_force_clamped() {
        let mut cloth = ClothState::new(2, 1, 1.0);
        cloth.particle_mut(1).unwrap().position.x = 10.0;
        cloth.clear_and_accumulate_spring_forces();
        assert!((cloth.particles()[0].force.length() - MAX_SPRING_FORCE).abs() < 1e-2);
    }

    #[test]
    fn test_fixed_endpoint_receives_no_force() {
        let mut cloth = ClothState::new(2, 1, 1.0);
        cloth.pin(0);
        cloth.particle_mut(1).unwrap().position.x = 1.2;
        cloth.clear_and_accumulate_spring_forces();
        assert_eq!(cloth.particles()[0].force, Vec3::ZERO);
        assert!(cloth.particles()[1].force.x < 0.0);
    }

    #[test]
    fn test_air_drag_is_linear_in_speed() {
        let mut cloth = ClothState::new(1, 1, 1.0);
        cloth.set_initial_velocity(Vec3::new(3.0, 0.0, 0.0));
        cloth.apply_air_drag(0.5, Vec3::new(1.0, 0.0, 0.0));
        let f = cloth.particles()[0].force;
        assert!((f - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-6, "{:?}", f);
    }

    #[test]
    fn test_flat_velocity_damping() {
        let mut cloth = ClothState::new(1, 1, 1.0);
        cloth.set_initial_velocity(Vec3::new(1.0, 0.0, 0.0));
        cloth.prepare_forces();
        cloth.integrate_velocities(0.5);
        assert!((cloth.particles()[0].velocity.x - 0.997).abs() < 1e-6);
        cloth.integrate_velocities(0.001);
        assert!((cloth.particles()[0].velocity.x - 0.997 * 0.997).abs() < 1e-6);
    }

    #[test]
    fn test_exponential_velocity_damping() {
        let config = ClothConfig {
            velocity_damping: VelocityDamping::Exponential { rate: 2.0 },
            ..ClothConfig::grid(1, 1, 1.0)
        };
        let mut cloth = ClothState::from_config(&config);
        cloth.set_initial_velocity(Vec3::X);
        cloth.integrate_velocities(0.5);
        assert!((cloth.particles()[0].velocity.x - (-1.0f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_half_space_collision() {
        let mut cloth = ClothState::new(1, 1, 1.0);
        {
            let p = cloth.particle_mut(0).unwrap();
            p.position = Vec3::new(0.0, -0.5, 0.0);
            p.velocity = Vec3::new(1.0, -2.0, 0.0);
        }
        cloth.collide(&HalfSpace::floor(0.0));
        let p = cloth.particles()[0];
        assert!(p.position.y.abs() < 1e-6, "projected onto plane");
        assert!((p.velocity.y + 0.4).abs() < 1e-6, "20% of normal velocity survives");
        assert_eq!(p.velocity.x, 1.0);
    }

    #[test]
    fn test_half_space_keeps_separating_velocity() {
        let mut cloth = ClothState::new(1, 1, 1.0);
        {
            let p = cloth.particle_mut(0).unwrap();
            p.position = Vec3::new(0.0, -0.1, 0.0);
            p.velocity = Vec3::new(0.0, 3.0, 0.0);
        }
        cloth.handle_half_space_collision(Vec3::Y, 0.0);
        assert_eq!(cloth.particles()[0].velocity.y, 3.0);
    }

    #[test]
    fn test_flat_sheet_normals_point_up() {
        let mut cloth = ClothState::new(3, 3, 0.5);
        cloth.recompute_vertex_normals();
        for p in cloth.particles() {
            assert!((p.normal - Vec3::Y).length() < 1e-6, "{:?}", p.normal);
        }
    }

    #[test]
    fn test_single_row_normals_are_zero() {
        let mut cloth = ClothState::new(4, 1, 0.5);
        cloth.recompute_vertex_normals();
        assert!(cloth.particles().iter().all(|p| p.normal == Vec3::ZERO));
    }

    #[test]
    fn test_translate_keeps_rest_lengths() {
        let mut cloth = ClothState::new(3, 3, 0.2);
        cloth.translate(Vec3::new(1.0, 2.0, 3.0));
        cloth.clear_and_accumulate_spring_forces();
        assert!(cloth.particles().iter().all(|p| p.force.length() < 1e-3));
        let (lo, hi) = cloth.bounds();
        assert!((lo - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
        assert!((hi - Vec3::new(1.4, 2.0, 3.4)).length() < 1e-5);
    }

    /// Times of upward crossings of `x = rest`, linearly interpolated
    fn upward_crossings(samples: &[(f32, f32)], rest: f32) -> Vec<f32> {
        samples
            .windows(2)
            .filter_map(|w| {
                let (t0, x0) = w[0];
                let (t1, x1) = w[1];
                let (d0, d1) = (x0 - rest, x1 - rest);
                if d0 < 0.0 && d1 >= 0.0 {
                    Some(t0 + (t1 - t0) * (-d0 / (d1 - d0)))
                } else {
                    None
                }
            })
            .collect()
    }

    #[test]
    fn test_spring_period_matches_mass_and_stiffness() {
        let config = ClothConfig {
            structural: SpringCoeffs {
                stiffness: 500.0,
                damping: 0.0,
            },
            ..ClothConfig::grid(2, 1, 1.0)
        };
        let mut cloth = ClothState::from_config(&config);
        assert_eq!(cloth.springs().len(), 1);
        cloth.pin(0);
        cloth.particle_mut(1).unwrap().position.x = 1.1;

        let dt = 0.001;
        let mut samples = Vec::new();
        for step in 0..1000 {
            cloth.update(dt, Vec3::ZERO, 0.0, Vec3::ZERO);
            samples.push(((step + 1) as f32 * dt, cloth.particles()[1].position.x));
        }

        let crossings = upward_crossings(&samples, 1.0);
        assert!(crossings.len() >= 2, "expected oscillation, got {:?}", crossings);

        let period = crossings[1] - crossings[0];
        let expected = 2.0 * std::f32::consts::PI / 500.0f32.sqrt();
        let err = (period - expected).abs() / expected;
        println!("period {:.5}, expected {:.5}, error {:.3}%", period, expected, err * 100.0);
        assert!(err < 0.02, "period {} too far from {}", period, expected);
    }

    #[test]
    fn test_exponential_damping_settles_spring() {
        let config = ClothConfig {
            velocity_damping: VelocityDamping::Exponential { rate: 4.0 },
            ..ClothConfig::grid(2, 1, 1.0)
        };
        let mut cloth = ClothState::from_config(&config);
        cloth.pin(0);
        cloth.particle_mut(1).unwrap().position.x = 1.2;

        for _ in 0..3000 {
            cloth.update(0.001, Vec3::ZERO, 0.0, Vec3::ZERO);
        }
        let offset = (cloth.particles()[1].position.x - 1.0).abs();
        assert!(offset < 0.01, "spring should have settled, offset {}", offset);
    }
}
