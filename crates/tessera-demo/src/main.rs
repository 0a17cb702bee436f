//! Headless fly-over of a single LOD terrain tile.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p tessera-demo` to log per-frame LOD statistics.
//! Run with `cargo run -p tessera-demo -- --simulated-distance 500` to pin the
//! LOD distance, or add `--gpu` to also render each frame offscreen.

mod flight;
mod gpu;
mod terrain;

use std::process::ExitCode;

use clap::Parser;
use tessera_config::{CliArgs, Config, TerrainKind};
use tessera_lod::{DistanceSource, FrameStats, LodCamera, PatchTree, RecordingBackend};
use tracing::{error, info};

use crate::flight::FlightPath;
use crate::gpu::OffscreenRenderer;
use crate::terrain::DemoTerrain;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tessera")
    });

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    tessera_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.lod.settings()?;
    let view = config.camera.view_params()?;
    let terrain = DemoTerrain::from_config(&config.terrain)?;
    let terrain_name = terrain.name();

    let (width, depth) = (config.terrain.tile_width, config.terrain.tile_depth);
    let mut tree = PatchTree::new(terrain, width, depth, settings.clone())?;
    if let Some(distance) = config.debug.simulated_distance {
        tree.set_distance_source(DistanceSource::Simulated(distance));
    }

    info!(
        "Flying over {width}x{depth} {terrain_name} tile: resolution {}, {} px tolerance, {} slabs",
        settings.resolution, settings.error_threshold_pixels, settings.pool_capacity
    );

    let frames = config.debug.frames;
    let path = FlightPath::new(
        width,
        depth,
        config.camera.start_altitude,
        config.camera.end_altitude,
        frames,
    );

    let mut gpu = if config.debug.gpu {
        let renderer = OffscreenRenderer::new(&settings, &config.camera, config.debug.wireframe);
        if renderer.is_none() {
            info!("No GPU adapter available, recording draws only");
        }
        renderer
    } else {
        None
    };
    let height_range = height_range(config);

    let mut recorder = RecordingBackend::new();
    let mut totals = FrameStats::default();

    for frame in 0..frames {
        let camera = LodCamera::new(path.position(frame, tree.terrain()), view);

        let stats = match gpu.as_mut() {
            Some(renderer) => {
                renderer.backend.begin_frame();
                let stats = tree.per_frame(&camera, &mut renderer.backend);
                renderer.render(camera.position, path.target(tree.terrain()), height_range);
                stats
            }
            None => {
                recorder.clear();
                tree.per_frame(&camera, &mut recorder)
            }
        };

        totals.splits += stats.splits;
        totals.merges += stats.merges;
        totals.declined_splits += stats.declined_splits;
        totals.vertex_builds += stats.vertex_builds;
        totals.max_level = totals.max_level.max(stats.max_level);

        if stats.splits + stats.merges > 0 || frame % 30 == 0 {
            info!(
                frame,
                distance = stats.distance,
                leaves = stats.live_leaves,
                splits = stats.splits,
                merges = stats.merges,
                declined = stats.declined_splits,
                rebuilt = stats.vertex_builds,
                max_level = stats.max_level,
                "LOD frame"
            );
        }
    }

    tree.check_invariants()?;
    info!(
        "Done after {frames} frames: {} splits, {} merges, {} declined, {} rebuilds, deepest level {}, {}/{} slabs in use",
        totals.splits,
        totals.merges,
        totals.declined_splits,
        totals.vertex_builds,
        totals.max_level,
        tree.pool().in_use(),
        tree.pool().capacity()
    );
    Ok(())
}

/// Heights mapped onto the shader's colour ramp.
fn height_range(config: &Config) -> [f32; 2] {
    match config.terrain.kind {
        TerrainKind::Noise => {
            let amplitude = config.terrain.noise_params().amplitude as f32 * 2.0;
            [-amplitude, amplitude]
        }
        TerrainKind::Heightmap => [0.0, config.terrain.vertical_scale],
    }
}
