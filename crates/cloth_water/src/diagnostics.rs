//! Per-frame statistics for logging and regression checks.

use crate::cloth::ClothState;
use crate::water::WaterGrid;

/// Snapshot of the scene's energy and extremes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimStats {
    pub frame: u64,
    pub cloth_kinetic_energy: f32,
    pub cloth_max_speed: f32,
    /// Lowest particle height
    pub cloth_min_y: f32,
    pub water_max_deviation: f32,
    pub water_max_speed: f32,
    pub water_variance: f32,
    pub water_volume: f32,
}

impl SimStats {
    pub fn collect(frame: u64, cloth: &ClothState, water: Option<&WaterGrid>) -> Self {
        let (lo, _) = cloth.bounds();
        let mut stats = Self {
            frame,
            cloth_kinetic_energy: cloth.kinetic_energy(),
            cloth_max_speed: cloth.max_speed(),
            cloth_min_y: lo.y,
            ..Default::default()
        };
        if let Some(water) = water {
            stats.water_max_deviation = water.max_deviation();
            stats.water_max_speed = water.max_speed();
            stats.water_variance = water.height_variance();
            stats.water_volume = water.total_volume();
        }
        stats
    }

    /// True when no tracked quantity has blown up. Logs a warning otherwise.
    pub fn all_finite(&self) -> bool {
        let values = [
            self.cloth_kinetic_energy,
            self.cloth_max_speed,
            self.cloth_min_y,
            self.water_max_deviation,
            self.water_max_speed,
            self.water_variance,
            self.water_volume,
        ];
        let ok = values.iter().all(|v| v.is_finite());
        if !ok {
            log::warn!("Non-finite values at frame {}: {:?}", self.frame, self);
        }
        ok
    }

    pub fn log(&self) {
        log::info!(
            "frame {:5}: cloth KE={:.4} vmax={:.3} ymin={:.3} | water dev={:.4} vmax={:.3} var={:.3e}",
            self.frame,
            self.cloth_kinetic_energy,
            self.cloth_max_speed,
            self.cloth_min_y,
            self.water_max_deviation,
            self.water_max_speed,
            self.water_variance
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_stats_at_rest() {
        let cloth = ClothState::new(3, 3, 0.1);
        let water = WaterGrid::new(8, 8, 0.1, Vec3::ZERO, 0.0);
        let stats = SimStats::collect(0, &cloth, Some(&water));
        assert_eq!(stats.cloth_kinetic_energy, 0.0);
        assert_eq!(stats.water_max_deviation, 0.0);
        assert_eq!(stats.water_variance, 0.0);
        assert!(stats.all_finite());
    }

    #[test]
    fn test_stats_detect_nan() {
        let mut cloth = ClothState::new(2, 2, 0.1);
        cloth.particle_mut(1).unwrap().velocity = Vec3::new(f32::NAN, 0.0, 0.0);
        let stats = SimStats::collect(7, &cloth, None);
        assert!(!stats.all_finite());
    }
}
