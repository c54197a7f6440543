//! Point masses and springs of the cloth mesh.

use glam::Vec3;

/// A single point mass of the cloth.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    /// World position
    pub position: Vec3,
    /// Current velocity
    pub velocity: Vec3,
    /// Force accumulated this step (cleared at the start of every step)
    pub force: Vec3,
    /// Vertex normal, only refreshed by `ClothState::recompute_vertex_normals`
    pub normal: Vec3,
    pub mass: f32,
    /// Pinned particles are never moved by the solver
    pub fixed: bool,
}

impl Particle {
    /// Create a free particle at rest.
    pub fn new(position: Vec3, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            normal: Vec3::ZERO,
            mass,
            fixed: false,
        }
    }

    /// Add a force unless the particle is pinned.
    #[inline]
    pub fn add_force(&mut self, force: Vec3) {
        if !self.fixed {
            self.force += force;
        }
    }

    /// Horizontal (XZ) part of the velocity.
    #[inline]
    pub fn horizontal_velocity(&self) -> Vec3 {
        Vec3::new(self.velocity.x, 0.0, self.velocity.z)
    }

    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity.length_squared()
    }
}

/// Which family a spring belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpringKind {
    /// Edge to the right-hand neighbour
    Horizontal,
    /// Edge to the neighbour in the next row
    Vertical,
    /// The one diagonal per quad, (x,y) to (x+1,y+1)
    Shear,
}

/// Damped Hookean link between two particles.
///
/// The rest length is measured from the particle layout when the cloth is
/// built and cannot be set independently afterwards.
#[derive(Clone, Copy, Debug)]
pub struct Spring {
    pub particle1: usize,
    pub particle2: usize,
    rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub kind: SpringKind,
}

impl Spring {
    /// Build a spring whose rest length is the current distance between `p1` and `p2`.
    pub(crate) fn between(
        particles: &[Particle],
        p1: usize,
        p2: usize,
        stiffness: f32,
        damping: f32,
        kind: SpringKind,
    ) -> Self {
        let rest_length = (particles[p2].position - particles[p1].position).length();
        Self {
            particle1: p1,
            particle2: p2,
            rest_length,
            stiffness,
            damping,
            kind,
        }
    }

    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Endpoint indices, for wireframe drawing.
    pub fn endpoints(&self) -> (usize, usize) {
        (self.particle1, self.particle2)
    }
}
