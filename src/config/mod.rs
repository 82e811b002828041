//! Configuration module for v24-line.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `V24_LINE_CONFIG` environment variable (explicit path)
//! 2. `./v24-line.toml` (current directory)
//! 3. `~/.config/v24-line/v24-line.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\v24-line\v24-line.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `V24_LINE_<SECTION>_<KEY>`, e.g. `V24_LINE_LINE_PORT=/dev/ttyUSB0`
//! or `V24_LINE_LOGGING_LEVEL=debug`.
//!
//! # Example
//!
//! ```rust,no_run
//! use v24_line::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Port: {}", loader.config().line.port);
//! # Ok::<(), v24_line::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LineConfig, LogFormat, LoggingConfig, TimingConfig};
