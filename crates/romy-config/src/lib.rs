//! YAML settings for the ROMY integration
//!
//! Settings live in `romy.yaml` inside the config directory. Robot
//! credentials are not part of it; they are stored with each config entry.
//!
//! # Example
//!
//! ```ignore
//! use romy_config::RomyConfig;
//!
//! let config = RomyConfig::load("/config")?;
//! let interval = config.update_interval();
//! ```

mod error;
mod romy_config;

pub use error::{ConfigError, ConfigResult};
pub use romy_config::{RomyConfig, CONFIG_FILE};
