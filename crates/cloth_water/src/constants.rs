//! Numerical constants for the cloth, water and coupling solvers.
//!
//! ## Conventions
//!
//! World space is Y-up. The cloth sheet is built in the XZ plane and the water
//! grid covers the XZ plane, storing surface elevation along Y.
//!
//! Most of these are stability bounds rather than physical quantities. Changing
//! them changes the numerical behaviour of every scenario the tests pin down.

// =============================================================================
// CLOTH
// =============================================================================

/// Stiffness of horizontal and vertical (structural) springs
pub const STRUCTURAL_STIFFNESS: f32 = 500.0;

/// Damping of structural springs
pub const STRUCTURAL_DAMPING: f32 = 10.0;

/// Stiffness of the single diagonal shear spring per quad
pub const SHEAR_STIFFNESS: f32 = 250.0;

/// Damping of shear springs
pub const SHEAR_DAMPING: f32 = 6.0;

/// Maximum magnitude of the combined spring + damping force of one spring
pub const MAX_SPRING_FORCE: f32 = 800.0;

/// Flat velocity multiplier applied once per integration call (dt-independent)
pub const VELOCITY_DAMPING_PER_STEP: f32 = 0.997;

/// Fraction of the into-plane velocity removed on half-space contact
pub const CONTACT_ABSORPTION: f32 = 0.8;

/// Default particle mass
pub const PARTICLE_MASS: f32 = 1.0;

// =============================================================================
// WATER
// =============================================================================

/// Gravity magnitude used by the surface-gradient acceleration (m/s^2)
pub const WATER_GRAVITY: f32 = 9.81;

/// Kinematic viscosity for the implicit velocity diffusion
pub const WATER_VISCOSITY: f32 = 0.05;

/// Per-sub-step pull of the surface back toward rest
pub const WAVE_DAMPING: f32 = 0.998;

/// Largest sub-step the fluid solve accepts (seconds)
pub const MAX_SUBSTEP: f32 = 0.006;

/// Jacobi iterations of the viscosity solve
pub const DIFFUSE_ITERATIONS: usize = 10;

/// Fraction of the deferred source field injected into `h` per sub-step
pub const SOURCE_INJECTION: f32 = 0.9;

/// Hard cap on |u| and |v| per cell
pub const MAX_WATER_SPEED: f32 = 1.8;

/// Explicit Laplacian smoothing coefficient on the height field
pub const HEIGHT_SMOOTHING: f32 = 0.02;

/// Per-cell cap on a single radial height deposit
pub const MAX_CELL_DEPOSIT: f32 = 0.004;

/// Hard bound on |h - base_level| after a radial deposit
pub const MAX_HEIGHT_DEVIATION: f32 = 0.20;

// =============================================================================
// COUPLING
// =============================================================================

/// Submersion depth over which water drag ramps from zero to full strength
pub const DRAG_RAMP_DEPTH: f32 = 0.25;

/// Lower edge of the near-surface band (surface minus particle height)
pub const SURFACE_BAND_LOW: f32 = -0.05;

/// Upper edge of the near-surface band
pub const SURFACE_BAND_HIGH: f32 = 0.20;

/// Horizontal speed above which a particle always disturbs the water
pub const WAKE_SPEED_THRESHOLD: f32 = 0.05;

/// Scale of the horizontal momentum handed to the water
pub const MOMENTUM_TRANSFER: f32 = 0.6;

/// Scale of the vertical contact lift term
pub const CONTACT_LIFT: f32 = 0.25;

/// Scale of the speed-proportional wake term
pub const WAKE_GAIN: f32 = 0.08;

/// Clamp on the per-particle height deposit
pub const MAX_PARTICLE_DEPOSIT: f32 = 0.02;

/// Radius of the Gaussian height deposit around a particle
pub const DEPOSIT_RADIUS: f32 = 0.28;

/// Momentum scale of the Gaussian height deposit
pub const DEPOSIT_MOMENTUM: f32 = 0.35;
