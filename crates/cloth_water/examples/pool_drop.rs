//! Drop a pinned cloth into a pool and log energy and wave statistics.
//!
//! Run with: RUST_LOG=info cargo run --example pool_drop -p cloth_water [scene.yaml]

use cloth_water::{Corner, SceneConfig, Simulation};
use glam::Vec3;

const DT: f32 = 1.0 / 60.0;
const SECONDS: usize = 10;

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match SceneConfig::load_yaml(std::path::Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load {}: {}", path, e);
                return;
            }
        },
        None => SceneConfig::default(),
    };

    let mut sim = Simulation::new(config);
    sim.pin_corner(Corner::TopRight);

    for frame in 0..SECONDS * 60 {
        // Gust halfway through, then calm
        if frame == 240 {
            sim.set_wind(Vec3::new(3.0, 0.0, 1.0));
        } else if frame == 360 {
            sim.set_wind(Vec3::ZERO);
        }

        sim.tick(DT);

        if frame % 60 == 0 {
            let stats = sim.stats();
            stats.log();
            if !stats.all_finite() {
                return;
            }
        }
    }

    sim.cloth.recompute_vertex_normals();
    log::info!("Done after {:.1}s simulated", sim.elapsed());
}
