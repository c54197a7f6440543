//! Two-way force exchange between the cloth and the water surface.
//!
//! Neither side owns the other. Each function borrows one side for reading and
//! mutates the other only through its own force/impulse entry points.
//!
//! Cloth to water makes two separate deposits per particle: momentum through
//! `add_impulse` (exact, nearest cell) and height through
//! `add_radial_impulse` (Gaussian, clamped, deferred).

use serde::{Deserialize, Serialize};

use crate::cloth::ClothState;
use crate::constants::{
    CONTACT_LIFT, DEPOSIT_MOMENTUM, DEPOSIT_RADIUS, DRAG_RAMP_DEPTH, MAX_PARTICLE_DEPOSIT,
    MOMENTUM_TRANSFER, SURFACE_BAND_HIGH, SURFACE_BAND_LOW, WAKE_GAIN, WAKE_SPEED_THRESHOLD,
};
use crate::water::WaterGrid;
use glam::Vec3;

/// Strength of the cloth/water exchange.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouplingParams {
    /// Upward force per unit submersion depth
    pub pressure_coeff: f32,
    /// Horizontal drag against the water velocity
    pub drag_coeff: f32,
    /// How strongly moving cloth disturbs the water
    pub deposition_coeff: f32,
}

impl Default for CouplingParams {
    fn default() -> Self {
        Self {
            pressure_coeff: 20.0,
            drag_coeff: 2.0,
            deposition_coeff: 1.0,
        }
    }
}

/// Buoyancy-like pressure and horizontal drag on submerged free particles.
///
/// Drag ramps in linearly over the first `DRAG_RAMP_DEPTH` of submersion.
pub fn apply_water_to_cloth(water: &WaterGrid, cloth: &mut ClothState, params: &CouplingParams) {
    for particle in cloth.particles_mut().iter_mut().filter(|p| !p.fixed) {
        let pos = particle.position;
        let surface = water.sample_height(pos.x, pos.z);
        let depth = (surface - pos.y).max(0.0);
        if depth <= 0.0 {
            continue;
        }

        let pressure = Vec3::new(0.0, params.pressure_coeff * depth, 0.0);
        let water_vel = water.sample_velocity(pos.x, pos.z);
        let relative = particle.horizontal_velocity() - water_vel;
        let ramp = (depth / DRAG_RAMP_DEPTH).min(1.0);
        let drag = -relative * params.drag_coeff * ramp;

        particle.add_force(pressure + drag);
    }
}

/// Disturb the water wherever cloth particles touch or skim it.
///
/// Every particle is considered, pinned ones included. A particle deposits
/// when it is submerged, sits in the band just around the surface, or moves
/// horizontally faster than `WAKE_SPEED_THRESHOLD`.
pub fn apply_cloth_to_water(
    water: &mut WaterGrid,
    cloth: &ClothState,
    params: &CouplingParams,
    dt: f32,
) {
    let dep = params.deposition_coeff;

    for particle in cloth.particles() {
        let pos = particle.position;
        let vel = particle.velocity;

        let (i, k) = water.interior_cell_of(pos.x, pos.z);
        let (dhdx, dhdz) = water.slope_at(i, k);

        let surface = water.sample_height(pos.x, pos.z);
        let gap = surface - pos.y;
        let horizontal_speed = particle.horizontal_velocity().length();

        let submerged = gap > 0.0;
        let near_surface = (SURFACE_BAND_LOW..=SURFACE_BAND_HIGH).contains(&gap);
        if !(submerged || near_surface || horizontal_speed > WAKE_SPEED_THRESHOLD) {
            continue;
        }

        let push = dep * dt * MOMENTUM_TRANSFER;
        water.add_impulse(pos.x, pos.z, -vel.x * push, -vel.z * push, 0.0);

        let tangential = -(vel.x * dhdx + vel.z * dhdz);
        let lift = -vel.y * CONTACT_LIFT;
        let wake = horizontal_speed * WAKE_GAIN;
        let dh = ((tangential + lift + wake) * dep * dt)
            .clamp(-MAX_PARTICLE_DEPOSIT, MAX_PARTICLE_DEPOSIT);

        water.add_radial_impulse(pos.x, pos.z, DEPOSIT_RADIUS, dh, DEPOSIT_MOMENTUM);
    }
}
