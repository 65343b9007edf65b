//! Configuration for the mixing engine
//!
//! - Generic YAML config loading/saving (shared with `fader-analysis`)
//! - Default config paths
//! - [`EngineConfig`]: audio I/O plus mixer settings
//!
//! ```ignore
//! use fader_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path("engine.yaml"));
//! ```

mod engine;
mod io;
mod paths;

pub use engine::{EngineConfig, MixerConfig, MAX_RENDER_THREADS, MAX_TRACKS};
pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
