//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, TerrainKind};

/// Tessera command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "tessera", about = "Quadtree terrain LOD fly-over")]
pub struct CliArgs {
    /// Number of frames to run.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Drive LOD from a fixed distance instead of the camera.
    #[arg(long)]
    pub simulated_distance: Option<f32>,

    /// Vertices per patch edge.
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Maximum concurrently live leaf patches.
    #[arg(long)]
    pub pool_capacity: Option<usize>,

    /// Screen-space error tolerance in pixels.
    #[arg(long)]
    pub error_threshold: Option<f32>,

    /// Merge dead-zone factor.
    #[arg(long)]
    pub hysteresis: Option<f32>,

    /// Grayscale heightmap to use instead of procedural noise.
    #[arg(long)]
    pub heightmap: Option<PathBuf>,

    /// Noise seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Render offscreen on the GPU (needs an adapter).
    #[arg(long)]
    pub gpu: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(frames) = args.frames {
            self.debug.frames = frames;
        }
        if let Some(distance) = args.simulated_distance {
            self.debug.simulated_distance = Some(distance);
        }
        if let Some(res) = args.resolution {
            self.lod.resolution = res;
        }
        if let Some(capacity) = args.pool_capacity {
            self.lod.pool_capacity = capacity;
        }
        if let Some(threshold) = args.error_threshold {
            self.lod.error_threshold_pixels = threshold;
        }
        if let Some(hysteresis) = args.hysteresis {
            self.lod.hysteresis = hysteresis;
        }
        if let Some(ref path) = args.heightmap {
            self.terrain.kind = TerrainKind::Heightmap;
            self.terrain.heightmap = Some(path.clone());
        }
        if args.gpu {
            self.debug.gpu = true;
        }
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
