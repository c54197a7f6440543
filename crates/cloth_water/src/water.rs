//! Shallow water on a regular height/velocity grid.
//!
//! Fields are flattened row-major with `idx = k * nx + i` (column `i` along X,
//! row `k` along Z). The basin is closed: border cells carry no velocity and
//! never sit below `base_level` after a step.
//!
//! Each `step(dt)` is split into sub-steps no longer than `max_substep`:
//! 1. Implicit viscosity on u, v (see [`ViscositySolve`])
//! 2. Semi-Lagrangian advection of u, v, h (nearest cell, no interpolation)
//! 3. Surface-gradient acceleration `-g * grad(h) * dt`
//! 4. Injection of the deferred source field `q`
//! 5. Height damping toward rest
//! 6. Closed boundary
//! 7. Speed clamp
//! 8. One explicit Laplacian pass on h
//!
//! Sampling is nearest-cell everywhere. Bilinear interpolation would change
//! the behaviour of every coupled scenario, so it is not offered.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DIFFUSE_ITERATIONS, HEIGHT_SMOOTHING, MAX_CELL_DEPOSIT, MAX_HEIGHT_DEVIATION, MAX_SUBSTEP,
    MAX_WATER_SPEED, SOURCE_INJECTION, WATER_GRAVITY, WATER_VISCOSITY, WAVE_DAMPING,
};
use crate::serde_utils::{deserialize_vec3, serialize_vec3};

/// How the implicit viscosity system is relaxed each sub-step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViscositySolve {
    /// Jacobi iterations against the pre-solve velocity: converges toward a
    /// single implicit viscosity step.
    #[default]
    Jacobi,
    /// Each iteration uses the previous one as its source, so the iterations
    /// compound into that many implicit passes. Smooths velocity much harder.
    RepeatedPasses,
}

/// Water grid parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Cells along X
    pub nx: usize,
    /// Cells along Z
    pub nz: usize,
    /// Cell size in world units
    pub dx: f32,
    /// World position of cell (0, 0)'s corner
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub origin: Vec3,
    /// Rest surface height
    pub base_level: f32,
    pub gravity: f32,
    pub viscosity: f32,
    /// Per-sub-step multiplier on the height deviation
    pub wave_damping: f32,
    /// Largest sub-step length (seconds)
    pub max_substep: f32,
    /// Apply the `-g * grad(h)` acceleration after advection
    pub project_gradient: bool,
    pub viscosity_solve: ViscositySolve,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            nx: 64,
            nz: 64,
            dx: 0.05,
            origin: Vec3::ZERO,
            base_level: 0.0,
            gravity: WATER_GRAVITY,
            viscosity: WATER_VISCOSITY,
            wave_damping: WAVE_DAMPING,
            max_substep: MAX_SUBSTEP,
            project_gradient: true,
            viscosity_solve: ViscositySolve::Jacobi,
        }
    }
}

impl WaterConfig {
    /// Default solver constants for the given layout.
    pub fn grid(nx: usize, nz: usize, dx: f32, origin: Vec3, base_level: f32) -> Self {
        Self {
            nx,
            nz,
            dx,
            origin,
            base_level,
            ..Default::default()
        }
    }
}

/// Height and velocity fields of a closed basin.
#[derive(Clone, Debug)]
pub struct WaterGrid {
    config: WaterConfig,

    /// Surface height per cell
    h: Vec<f32>,
    /// X velocity per cell
    u: Vec<f32>,
    /// Z velocity per cell
    v: Vec<f32>,
    /// Deferred height injections, applied at the next sub-step
    q: Vec<f32>,

    // Double buffers
    h_tmp: Vec<f32>,
    u_tmp: Vec<f32>,
    v_tmp: Vec<f32>,
    // Right-hand side of the viscosity solve
    u_src: Vec<f32>,
    v_src: Vec<f32>,
}

impl WaterGrid {
    /// Quiescent grid with default solver constants.
    ///
    /// # Panics
    /// If `nx` or `nz` is below 3 (no interior) or `dx` is not positive.
    pub fn new(nx: usize, nz: usize, dx: f32, origin: Vec3, base_level: f32) -> Self {
        Self::from_config(&WaterConfig::grid(nx, nz, dx, origin, base_level))
    }

    pub fn from_config(config: &WaterConfig) -> Self {
        assert!(
            config.nx >= 3 && config.nz >= 3,
            "water grid needs an interior, got {}x{}",
            config.nx,
            config.nz
        );
        assert!(config.dx > 0.0, "water cell size must be positive");
        assert!(
            config.max_substep > 0.0 && config.max_substep.is_finite(),
            "water sub-step limit must be positive and finite, got {}",
            config.max_substep
        );

        let n = config.nx * config.nz;
        log::info!(
            "Water grid {}x{} (dx={}, base={})",
            config.nx,
            config.nz,
            config.dx,
            config.base_level
        );

        Self {
            h: vec![config.base_level; n],
            u: vec![0.0; n],
            v: vec![0.0; n],
            q: vec![0.0; n],
            h_tmp: vec![config.base_level; n],
            u_tmp: vec![0.0; n],
            v_tmp: vec![0.0; n],
            u_src: vec![0.0; n],
            v_src: vec![0.0; n],
            config: config.clone(),
        }
    }

    /// Back to rest: flat surface, no motion, no pending sources.
    pub fn reset(&mut self) {
        self.h.fill(self.config.base_level);
        self.u.fill(0.0);
        self.v.fill(0.0);
        self.q.fill(0.0);
    }

    pub fn nx(&self) -> usize {
        self.config.nx
    }

    pub fn nz(&self) -> usize {
        self.config.nz
    }

    pub fn dx(&self) -> f32 {
        self.config.dx
    }

    pub fn origin(&self) -> Vec3 {
        self.config.origin
    }

    pub fn base_level(&self) -> f32 {
        self.config.base_level
    }

    pub fn config(&self) -> &WaterConfig {
        &self.config
    }

    /// Flattened surface heights.
    pub fn heights(&self) -> &[f32] {
        &self.h
    }

    pub fn velocities_u(&self) -> &[f32] {
        &self.u
    }

    pub fn velocities_v(&self) -> &[f32] {
        &self.v
    }

    /// Deferred source field, zero except between an impulse and the next sub-step.
    pub fn pending_source(&self) -> &[f32] {
        &self.q
    }

    /// Flat index of (i, k). Not clamped; pair with `clamp_cell` for
    /// untrusted indices.
    #[inline]
    pub fn idx(&self, i: usize, k: usize) -> usize {
        k * self.config.nx + i
    }

    /// Clamp (i, k) onto the grid.
    #[inline]
    pub fn clamp_cell(&self, i: usize, k: usize) -> (usize, usize) {
        (i.min(self.config.nx - 1), k.min(self.config.nz - 1))
    }

    /// Height at cell (i, k), clamped to the grid.
    pub fn height_at(&self, i: usize, k: usize) -> f32 {
        let (i, k) = self.clamp_cell(i, k);
        self.h[self.idx(i, k)]
    }

    /// Velocity at cell (i, k) as (u, 0, v), clamped to the grid.
    pub fn velocity_at(&self, i: usize, k: usize) -> Vec3 {
        let (i, k) = self.clamp_cell(i, k);
        let id = self.idx(i, k);
        Vec3::new(self.u[id], 0.0, self.v[id])
    }

    /// Nearest cell to world (x, z): floor, then clamp to the grid.
    pub fn cell_of(&self, x: f32, z: f32) -> (usize, usize) {
        let fx = ((x - self.config.origin.x) / self.config.dx).floor();
        let fz = ((z - self.config.origin.z) / self.config.dx).floor();
        (
            clamp_index(fx, self.config.nx),
            clamp_index(fz, self.config.nz),
        )
    }

    /// Nearest cell clamped one further in, so all four neighbours exist.
    pub fn interior_cell_of(&self, x: f32, z: f32) -> (usize, usize) {
        let (i, k) = self.cell_of(x, z);
        (
            i.clamp(1, self.config.nx - 2),
            k.clamp(1, self.config.nz - 2),
        )
    }

    /// Surface height at the nearest cell (no interpolation).
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        let (i, k) = self.cell_of(x, z);
        self.height_at(i, k)
    }

    /// Surface velocity at the nearest cell as (u, 0, v).
    pub fn sample_velocity(&self, x: f32, z: f32) -> Vec3 {
        let (i, k) = self.cell_of(x, z);
        self.velocity_at(i, k)
    }

    /// Centered-difference surface slope (dh/dx, dh/dz), one-sided on the
    /// border. Out-of-range cells are clamped to the grid.
    pub fn slope_at(&self, i: usize, k: usize) -> (f32, f32) {
        let (i, k) = self.clamp_cell(i, k);
        let nx = self.config.nx;
        let nz = self.config.nz;
        let (il, ir) = (i.saturating_sub(1), (i + 1).min(nx - 1));
        let (kd, ku) = (k.saturating_sub(1), (k + 1).min(nz - 1));
        let dhdx = (self.height_at(ir, k) - self.height_at(il, k)) / ((ir - il) as f32 * self.config.dx);
        let dhdz = (self.height_at(i, ku) - self.height_at(i, kd)) / ((ku - kd) as f32 * self.config.dx);
        (dhdx, dhdz)
    }

    /// Unit surface normal at cell (i, k), clamped to the grid.
    pub fn surface_normal(&self, i: usize, k: usize) -> Vec3 {
        let (dhdx, dhdz) = self.slope_at(i, k);
        Vec3::new(-dhdx, 1.0, -dhdz).normalize()
    }

    /// Add velocity and height deltas to the nearest cell.
    pub fn add_impulse(&mut self, x: f32, z: f32, du: f32, dv: f32, dh: f32) {
        let (i, k) = self.cell_of(x, z);
        let id = self.idx(i, k);
        self.u[id] += du;
        self.v[id] += dv;
        self.h[id] += dh;
    }

    /// Gaussian height deposit (sigma = radius / 2) around the nearest cell,
    /// deferred through `q`, with a radial momentum kick.
    ///
    /// The border ring is never touched. Each cell's deposit is capped at
    /// `MAX_CELL_DEPOSIT` and its current height deviation at
    /// `MAX_HEIGHT_DEVIATION`. A non-positive radius does nothing.
    pub fn add_radial_impulse(&mut self, x: f32, z: f32, radius: f32, dh: f32, momentum_scale: f32) {
        if radius <= 0.0 {
            return;
        }
        let (ci, ck) = self.cell_of(x, z);
        let (ci, ck) = (ci as i64, ck as i64);
        let nx = self.config.nx as i64;
        let nz = self.config.nz as i64;
        let dx = self.config.dx;
        let base = self.config.base_level;
        let reach = (radius / dx).ceil() as i64;
        let sigma = radius * 0.5;
        let two_sigma_sq = 2.0 * sigma * sigma;

        for dk in -reach..=reach {
            let k = ck + dk;
            if k < 1 || k > nz - 2 {
                continue;
            }
            for di in -reach..=reach {
                let i = ci + di;
                if i < 1 || i > nx - 2 {
                    continue;
                }

                let offset = Vec3::new(di as f32, 0.0, dk as f32) * dx;
                let dist = offset.length();
                if dist > radius {
                    continue;
                }

                let weight = (-dist * dist / two_sigma_sq).exp();
                let local = (dh * weight).clamp(-MAX_CELL_DEPOSIT, MAX_CELL_DEPOSIT);
                let id = self.idx(i as usize, k as usize);
                self.q[id] += local;

                if dist > 0.0 {
                    let dir = offset / dist;
                    let kick = momentum_scale * weight * (local / radius);
                    self.u[id] += dir.x * kick;
                    self.v[id] += dir.z * kick;
                }

                let dev = (self.h[id] - base).clamp(-MAX_HEIGHT_DEVIATION, MAX_HEIGHT_DEVIATION);
                self.h[id] = base + dev;
            }
        }
    }

    /// Advance by `dt`, split into equal sub-steps of at most `max_substep`.
    /// After any step with a positive `dt` the source field `q` is empty.
    ///
    /// A non-positive (or non-finite) `dt` runs no sub-step and leaves the grid
    /// untouched, `q` included: pending deposits wait for the next real step.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let substeps = ((dt / self.config.max_substep).ceil() as usize).max(1);
        let sub_dt = dt / substeps as f32;
        log::debug!("water step dt={} in {} sub-steps", dt, substeps);

        for _ in 0..substeps {
            self.diffuse(sub_dt);
            self.advect(sub_dt);
            if self.config.project_gradient {
                self.apply_surface_gradient(sub_dt);
            }
            self.inject_sources();
            self.damp_heights();
            self.apply_boundary();
            self.clamp_speeds();
            self.smooth_heights();
        }
    }

    /// Iterations of `(1 + 4a) x = x0 + a * sum(neighbours)`, with `x0` fixed
    /// or refreshed per iteration depending on `viscosity_solve`.
    fn diffuse(&mut self, dt: f32) {
        let nx = self.config.nx;
        let nz = self.config.nz;
        let a = self.config.viscosity * dt / (self.config.dx * self.config.dx);
        let denom = 1.0 + 4.0 * a;

        let repeated = self.config.viscosity_solve == ViscositySolve::RepeatedPasses;
        self.u_src.copy_from_slice(&self.u);
        self.v_src.copy_from_slice(&self.v);

        for iteration in 0..DIFFUSE_ITERATIONS {
            if repeated && iteration > 0 {
                self.u_src.copy_from_slice(&self.u);
                self.v_src.copy_from_slice(&self.v);
            }
            self.u_tmp.copy_from_slice(&self.u);
            self.v_tmp.copy_from_slice(&self.v);
            for k in 1..nz - 1 {
                for i in 1..nx - 1 {
                    let id = k * nx + i;
                    let (l, r, d, up) = (id - 1, id + 1, id - nx, id + nx);
                    self.u_tmp[id] =
                        (self.u_src[id] + a * (self.u[l] + self.u[r] + self.u[d] + self.u[up])) / denom;
                    self.v_tmp[id] =
                        (self.v_src[id] + a * (self.v[l] + self.v[r] + self.v[d] + self.v[up])) / denom;
                }
            }
            std::mem::swap(&mut self.u, &mut self.u_tmp);
            std::mem::swap(&mut self.v, &mut self.v_tmp);
        }
    }

    /// Trace each interior cell back along its velocity and copy the values
    /// of the cell it lands in.
    fn advect(&mut self, dt: f32) {
        let nx = self.config.nx;
        let nz = self.config.nz;
        let scale = dt / self.config.dx;
        let max_x = (nx - 2) as f32;
        let max_z = (nz - 2) as f32;

        self.u_tmp.copy_from_slice(&self.u);
        self.v_tmp.copy_from_slice(&self.v);
        self.h_tmp.copy_from_slice(&self.h);

        for k in 1..nz - 1 {
            for i in 1..nx - 1 {
                let id = k * nx + i;
                let x = (i as f32 - self.u[id] * scale).clamp(1.0, max_x);
                let z = (k as f32 - self.v[id] * scale).clamp(1.0, max_z);
                let src = z as usize * nx + x as usize;
                self.u_tmp[id] = self.u[src];
                self.v_tmp[id] = self.v[src];
                self.h_tmp[id] = self.h[src];
            }
        }

        std::mem::swap(&mut self.u, &mut self.u_tmp);
        std::mem::swap(&mut self.v, &mut self.v_tmp);
        std::mem::swap(&mut self.h, &mut self.h_tmp);
    }

    fn apply_surface_gradient(&mut self, dt: f32) {
        let nx = self.config.nx;
        let nz = self.config.nz;
        let g = self.config.gravity;
        let inv_2dx = 1.0 / (2.0 * self.config.dx);

        for k in 1..nz - 1 {
            for i in 1..nx - 1 {
                let id = k * nx + i;
                let dhdx = (self.h[id + 1] - self.h[id - 1]) * inv_2dx;
                let dhdz = (self.h[id + nx] - self.h[id - nx]) * inv_2dx;
                self.u[id] -= g * dhdx * dt;
                self.v[id] -= g * dhdz * dt;
            }
        }
    }

    fn inject_sources(&mut self) {
        for (h, q) in self.h.iter_mut().zip(self.q.iter_mut()) {
            *h += *q * SOURCE_INJECTION;
            *q = 0.0;
        }
    }

    fn damp_heights(&mut self) {
        let base = self.config.base_level;
        let damp = self.config.wave_damping;
        for h in &mut self.h {
            *h = base + (*h - base) * damp;
        }
    }

    /// Closed basin: no flow through the border, no border below rest.
    fn apply_boundary(&mut self) {
        let nx = self.config.nx;
        let nz = self.config.nz;
        let base = self.config.base_level;

        let border = (0..nx)
            .flat_map(|i| [(i, 0), (i, nz - 1)])
            .chain((0..nz).flat_map(|k| [(0, k), (nx - 1, k)]));
        for (i, k) in border {
            let id = k * nx + i;
            self.u[id] = 0.0;
            self.v[id] = 0.0;
            self.h[id] = self.h[id].max(base);
        }
    }

    fn clamp_speeds(&mut self) {
        for u in &mut self.u {
            *u = u.clamp(-MAX_WATER_SPEED, MAX_WATER_SPEED);
        }
        for v in &mut self.v {
            *v = v.clamp(-MAX_WATER_SPEED, MAX_WATER_SPEED);
        }
    }

    fn smooth_heights(&mut self) {
        let nx = self.config.nx;
        let nz = self.config.nz;

        self.h_tmp.copy_from_slice(&self.h);
        for k in 1..nz - 1 {
            for i in 1..nx - 1 {
                let id = k * nx + i;
                let h = &self.h;
                let lap = h[id - 1] + h[id + 1] + h[id - nx] + h[id + nx] - 4.0 * h[id];
                self.h_tmp[id] = h[id] + HEIGHT_SMOOTHING * lap;
            }
        }
        std::mem::swap(&mut self.h, &mut self.h_tmp);
    }

    /// Volume above rest: sum of (h - base) * dx^2.
    pub fn total_volume(&self) -> f32 {
        let base = self.config.base_level;
        let area = self.config.dx * self.config.dx;
        self.h.iter().map(|h| (h - base) * area).sum()
    }

    /// Largest |h - base| over the grid.
    pub fn max_deviation(&self) -> f32 {
        let base = self.config.base_level;
        self.h.iter().map(|h| (h - base).abs()).fold(0.0f32, f32::max)
    }

    /// Largest per-cell speed.
    pub fn max_speed(&self) -> f32 {
        self.u
            .iter()
            .zip(&self.v)
            .map(|(u, v)| (u * u + v * v).sqrt())
            .fold(0.0f32, f32::max)
    }

    /// Variance of the height field.
    pub fn height_variance(&self) -> f32 {
        let n = self.h.len() as f32;
        let mean = self.h.iter().sum::<f32>() / n;
        self.h.iter().map(|h| (h - mean) * (h - mean)).sum::<f32>() / n
    }

    pub fn all_finite(&self) -> bool {
        self.h
            .iter()
            .chain(&self.u)
            .chain(&self.v)
            .chain(&self.q)
            .all(|x| x.is_finite())
    }
}

fn clamp_index(f: f32, n: usize) -> usize {
    if f.is_nan() || f < 0.0 {
        0
    } else {
        (f as usize).min(n - 1)
    }
}
