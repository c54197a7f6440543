//! Scene configuration: everything a driver hands to the simulation.
//!
//! Per-tick values (gravity, wind, air drag, coupling) travel by value in
//! [`TickParams`]; nothing is read from process-wide state. Only
//! configuration is (de)serialized, never simulation state.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::cloth::{ClothConfig, HalfSpace};
use crate::coupling::CouplingParams;
use crate::serde_utils::{deserialize_vec3, serialize_vec3};
use crate::water::WaterConfig;

/// Values read once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickParams {
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub gravity: Vec3,
    /// Linear air drag coefficient
    pub air_drag: f32,
    /// Air velocity, zero for still air
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub wind: Vec3,
    /// Optional solid plane below the cloth
    pub floor: Option<HalfSpace>,
    /// Cloth/water exchange; `None` runs the two solvers uncoupled
    pub coupling: Option<CouplingParams>,
}

impl Default for TickParams {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -2.0, 0.0),
            air_drag: 0.1,
            wind: Vec3::ZERO,
            floor: None,
            coupling: Some(CouplingParams::default()),
        }
    }
}

/// A complete cloth-over-water scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub cloth: ClothConfig,
    /// `None` for a cloth-only scene
    pub water: Option<WaterConfig>,
    /// Particle indices pinned after every (re)build
    pub pinned: Vec<usize>,
    /// Where the sheet is placed after construction
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub cloth_offset: Vec3,
    pub tick: TickParams,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let cloth = ClothConfig::default();
        let extent = (cloth.width.max(cloth.height) - 1) as f32 * cloth.spacing;
        // Pool a little larger than the sheet, centred under it
        let (cells, dx) = (48, 0.06);
        let corner = extent * 0.5 - cells as f32 * dx * 0.5;
        let water = WaterConfig {
            nx: cells,
            nz: cells,
            dx,
            origin: Vec3::new(corner, 0.0, corner),
            ..Default::default()
        };
        Self {
            cloth,
            water: Some(water),
            pinned: vec![0],
            cloth_offset: Vec3::new(0.0, 0.6, 0.0),
            tick: TickParams::default(),
        }
    }
}

impl SceneConfig {
    /// Save configuration to JSON file
    pub fn save_json(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save_yaml(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Load configuration from YAML file
    pub fn load_yaml(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&yaml)?;
        Ok(config)
    }
}
