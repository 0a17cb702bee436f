//! Configuration for the Tessera terrain demo.
//!
//! Settings persist to disk as RON and can be overridden from the command
//! line. Unknown or missing fields fall back to defaults so config files stay
//! compatible across versions.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CameraConfig, Config, DebugConfig, LodConfig, TerrainConfig, TerrainKind};
pub use error::ConfigError;
