//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_lod::{LodSettings, ViewParams};
use tessera_terrain::NoiseParams;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Patch tree tuning.
    pub lod: LodConfig,
    /// Projection used by the error metric, plus the demo flight path.
    pub camera: CameraConfig,
    /// Height source and tile extents.
    pub terrain: TerrainConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Patch tree configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Vertices per patch edge.
    pub resolution: u32,
    /// Screen-space error tolerance in pixels.
    pub error_threshold_pixels: f32,
    /// Maximum concurrently live leaf patches.
    pub pool_capacity: usize,
    /// Merge dead-zone factor (1.0 = merge as soon as the viewer passes the
    /// switch distance).
    pub hysteresis: f32,
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Near plane distance in world units.
    pub near_plane: f32,
    /// Full vertical field of view in degrees.
    pub vertical_fov_degrees: f32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Altitude above the tile at the start of the fly-over.
    pub start_altitude: f32,
    /// Altitude at the end of the fly-over.
    pub end_altitude: f32,
}

/// Which height source backs the tile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TerrainKind {
    /// Procedural fBm noise.
    #[default]
    Noise,
    /// Grayscale heightmap image.
    Heightmap,
}

/// Terrain configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    pub kind: TerrainKind,
    /// Tile extent along x in world units.
    pub tile_width: f32,
    /// Tile extent along z in world units.
    pub tile_depth: f32,
    /// Noise seed.
    pub seed: u64,
    /// Number of noise octaves.
    pub octaves: u32,
    /// Peak height of the noise field.
    pub amplitude: f64,
    /// Heightmap image, used when `kind` is `Heightmap`.
    pub heightmap: Option<PathBuf>,
    /// World height of a full-white heightmap pixel.
    pub vertical_scale: f32,
}

/// Debug configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level filter (e.g. "info", "debug", "tessera_lod=trace").
    pub log_level: String,
    /// Drive LOD from this fixed distance instead of the camera.
    pub simulated_distance: Option<f32>,
    /// Number of frames the demo runs.
    pub frames: u32,
    /// Render offscreen through wgpu instead of only recording draws.
    pub gpu: bool,
    /// Draw patches as wireframe when a GPU is attached.
    pub wireframe: bool,
}

// --- Default implementations ---

impl Default for LodConfig {
    fn default() -> Self {
        let settings = LodSettings::default();
        Self {
            resolution: settings.resolution,
            error_threshold_pixels: settings.error_threshold_pixels,
            pool_capacity: settings.pool_capacity,
            hysteresis: settings.hysteresis,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            near_plane: 0.1,
            vertical_fov_degrees: 45.0,
            viewport_height: 720,
            start_altitude: 4000.0,
            end_altitude: 150.0,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        let noise = NoiseParams::default();
        Self {
            kind: TerrainKind::Noise,
            tile_width: 2048.0,
            tile_depth: 2048.0,
            seed: noise.seed,
            octaves: noise.octaves,
            amplitude: noise.amplitude,
            heightmap: None,
            vertical_scale: 200.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            simulated_distance: None,
            frames: 120,
            gpu: false,
            wireframe: false,
        }
    }
}

// --- Conversions into engine types ---

impl LodConfig {
    /// Validated patch tree settings.
    pub fn settings(&self) -> Result<LodSettings, ConfigError> {
        let settings = LodSettings {
            resolution: self.resolution,
            error_threshold_pixels: self.error_threshold_pixels,
            pool_capacity: self.pool_capacity,
            hysteresis: self.hysteresis,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl CameraConfig {
    /// Projection parameters for the error metric.
    pub fn view_params(&self) -> Result<ViewParams, ConfigError> {
        Ok(ViewParams::from_vertical_fov(
            self.near_plane,
            self.vertical_fov_degrees.to_radians(),
            self.viewport_height as f32,
        )?)
    }
}

impl TerrainConfig {
    /// Noise parameters with this config's seed, octaves and amplitude.
    pub fn noise_params(&self) -> NoiseParams {
        NoiseParams {
            seed: self.seed,
            octaves: self.octaves,
            amplitude: self.amplitude,
            ..NoiseParams::default()
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_lod::LodError;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("resolution: 17"));
        assert!(ron_str.contains("pool_capacity: 1024"));
        assert!(ron_str.contains("kind: Noise"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.terrain.heightmap = Some(PathBuf::from("maps/valley.png"));
        config.debug.simulated_distance = Some(250.0);
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(lod: (resolution: 33))").unwrap();
        assert_eq!(config.lod.resolution, 33);
        assert_eq!(config.lod.pool_capacity, 1024);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.lod.error_threshold_pixels = 2.0;
        config.terrain.kind = TerrainKind::Heightmap;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.lod.hysteresis = 1.25;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().lod.hysteresis, 1.25);
        assert!(modified.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_default_lod_settings_are_valid() {
        let settings = Config::default().lod.settings().unwrap();
        assert_eq!(settings, LodSettings::default());
    }

    #[test]
    fn test_invalid_lod_settings_rejected() {
        let lod = LodConfig {
            resolution: 1,
            ..Default::default()
        };
        assert!(matches!(
            lod.settings(),
            Err(ConfigError::InvalidLod(LodError::InvalidResolution(1)))
        ));
    }

    #[test]
    fn test_view_params_from_degrees() {
        let view = CameraConfig::default().view_params().unwrap();
        assert!((view.half_fov_y() - 22.5_f32.to_radians()).abs() < 1e-6);
        assert_eq!(view.viewport_height(), 720.0);

        let camera = CameraConfig {
            vertical_fov_degrees: 180.0,
            ..Default::default()
        };
        assert!(camera.view_params().is_err());
    }

    #[test]
    fn test_noise_params_follow_config() {
        let terrain = TerrainConfig {
            seed: 99,
            octaves: 3,
            ..Default::default()
        };
        let params = terrain.noise_params();
        assert_eq!(params.seed, 99);
        assert_eq!(params.octaves, 3);
        assert_eq!(params.base_frequency, NoiseParams::default().base_frequency);
    }
}
