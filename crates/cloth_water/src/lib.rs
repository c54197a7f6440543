//! Cloth and Shallow Water Simulation
//!
//! A mass-spring cloth sheet and a grid-based shallow-water surface, advanced
//! together with a two-way force exchange:
//! - Cloth: damped springs, gravity, linear air drag, symplectic Euler
//! - Water: implicit viscosity, semi-Lagrangian advection, adaptive sub-steps
//! - Coupling: pressure/drag on the cloth, height/momentum deposits in the water
//!
//! This crate is simulation only. Rendering reads particle positions/normals
//! and the height field through the read accessors and never writes back.
//!
//! # Example
//!
//! ```
//! use cloth_water::{SceneConfig, Simulation};
//! use glam::Vec3;
//!
//! let mut sim = Simulation::new(SceneConfig::default());
//! sim.set_wind(Vec3::new(2.0, 0.0, 0.0));
//!
//! for _ in 0..10 {
//!     sim.tick(1.0 / 60.0);
//! }
//! assert!(sim.stats().all_finite());
//! ```

pub mod cloth;
pub mod config;
pub mod constants;
pub mod coupling;
pub mod diagnostics;
pub mod particle;
pub mod serde_utils;
pub mod water;

pub use cloth::{ClothConfig, ClothState, Corner, HalfSpace, SpringCoeffs, VelocityDamping};
pub use config::{SceneConfig, TickParams};
pub use coupling::{apply_cloth_to_water, apply_water_to_cloth, CouplingParams};
pub use diagnostics::SimStats;
pub use glam::Vec3;
pub use particle::{Particle, Spring, SpringKind};
pub use water::{ViscositySolve, WaterConfig, WaterGrid};

/// Cloth over water, stepped with a fixed point-in-time coupling.
pub struct Simulation {
    /// The cloth sheet
    pub cloth: ClothState,
    /// The water surface, absent in cloth-only scenes
    pub water: Option<WaterGrid>,

    config: SceneConfig,
    frame: u64,
    elapsed: f32,
}

impl Simulation {
    /// Build the cloth and water described by `config`.
    pub fn new(config: SceneConfig) -> Self {
        let cloth = build_cloth(&config);
        let water = config.water.as_ref().map(WaterGrid::from_config);
        Self {
            cloth,
            water,
            config,
            frame: 0,
            elapsed: 0.0,
        }
    }

    /// Run one simulation tick.
    ///
    /// Order: springs, water forces on cloth, gravity and air drag, cloth
    /// integration (and floor contact), cloth deposits into water, water step.
    /// The cloth sees the surface from before this tick's water step and the
    /// water only learns about the cloth once it has moved.
    pub fn tick(&mut self, dt: f32) {
        let params = self.config.tick;

        // 1. Clear forces, accumulate springs
        self.cloth.prepare_forces();

        // 2. Water pushes on cloth
        if let (Some(water), Some(coupling)) = (&self.water, &params.coupling) {
            coupling::apply_water_to_cloth(water, &mut self.cloth, coupling);
        }

        // 3. Gravity and air
        self.cloth.apply_gravity(params.gravity);
        self.cloth.apply_air_drag(params.air_drag, params.wind);

        // 4. Integrate cloth
        self.cloth.finalize_integration(dt);
        if let Some(floor) = &params.floor {
            self.cloth.collide(floor);
        }

        // 5. Cloth disturbs water, 6. water advances
        if let Some(water) = &mut self.water {
            if let Some(coupling) = &params.coupling {
                coupling::apply_cloth_to_water(water, &self.cloth, coupling, dt);
            }
            water.step(dt);
        }

        self.frame += 1;
        self.elapsed += dt;
    }

    /// Discard the cloth and rebuild it from configuration, springs included.
    /// The water is rebuilt too when `reset_water` is set.
    pub fn reset(&mut self, reset_water: bool) {
        self.cloth = build_cloth(&self.config);
        if reset_water {
            self.water = self.config.water.as_ref().map(WaterGrid::from_config);
        }
        self.frame = 0;
        self.elapsed = 0.0;
        log::info!("Scene reset (water: {})", reset_water);
    }

    /// Air velocity for subsequent ticks; zero turns the wind off.
    pub fn set_wind(&mut self, wind: Vec3) {
        self.config.tick.wind = wind;
    }

    pub fn tick_params(&self) -> &TickParams {
        &self.config.tick
    }

    pub fn tick_params_mut(&mut self) -> &mut TickParams {
        &mut self.config.tick
    }

    /// Pin a particle now. Lost on reset unless it is also in the config.
    pub fn pin(&mut self, index: usize) {
        self.cloth.pin(index);
    }

    pub fn pin_corner(&mut self, corner: Corner) {
        self.cloth.pin_corner(corner);
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated time since construction or the last reset.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn stats(&self) -> SimStats {
        SimStats::collect(self.frame, &self.cloth, self.water.as_ref())
    }
}

/// Cloth in rest layout, then moved and pinned. Springs are measured from the
/// rest layout before the move, so rest lengths never depend on placement.
fn build_cloth(config: &SceneConfig) -> ClothState {
    let mut cloth = ClothState::from_config(&config.cloth);
    cloth.translate(config.cloth_offset);
    for &index in &config.pinned {
        cloth.pin(index);
    }
    cloth
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloth_only() -> SceneConfig {
        SceneConfig {
            cloth: ClothConfig::grid(4, 4, 0.25),
            water: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_simulation_creation() {
        let sim = Simulation::new(SceneConfig::default());
        assert_eq!(sim.cloth.particles().len(), 225);
        assert!(sim.cloth.particles()[0].fixed);
        assert!((sim.cloth.particles()[0].position.y - 0.6).abs() < 1e-6);
        assert!(sim.water.is_some());
        assert_eq!(sim.frame(), 0);
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut sim = Simulation::new(cloth_only());
        sim.tick(0.01);
        sim.tick(0.01);
        assert_eq!(sim.frame(), 2);
        assert!((sim.elapsed() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_reset_restores_layout_and_pins() {
        let mut sim = Simulation::new(cloth_only());
        let start: Vec<Vec3> = sim.cloth.particles().iter().map(|p| p.position).collect();
        sim.pin_corner(Corner::TopRight);
        for _ in 0..20 {
            sim.tick(0.01);
        }
        sim.reset(false);

        let now: Vec<Vec3> = sim.cloth.particles().iter().map(|p| p.position).collect();
        assert_eq!(start, now);
        assert!(sim.cloth.particles()[0].fixed, "configured pin survives");
        assert!(!sim.cloth.particles()[3].fixed, "runtime pin is dropped");
        assert_eq!(sim.frame(), 0);
    }

    #[test]
    fn test_floor_stops_cloth() {
        let mut config = cloth_only();
        config.pinned.clear();
        config.tick.floor = Some(HalfSpace::floor(0.0));
        let mut sim = Simulation::new(config);
        for _ in 0..200 {
            sim.tick(0.01);
        }
        let (lo, _) = sim.cloth.bounds();
        assert!(lo.y >= -1e-5, "cloth went through the floor: {}", lo.y);
    }

    #[test]
    fn test_wind_pushes_cloth() {
        let mut config = cloth_only();
        config.pinned.clear();
        config.tick.gravity = Vec3::ZERO;
        config.tick.air_drag = 0.5;
        let mut sim = Simulation::new(config);
        sim.set_wind(Vec3::new(0.0, 0.0, 3.0));
        for _ in 0..10 {
            sim.tick(0.01);
        }
        assert!(sim.cloth.particles().iter().all(|p| p.velocity.z > 0.0));
    }
}
