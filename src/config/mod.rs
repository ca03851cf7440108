//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, from --config or APP_CONFIG)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, load_or_default, parse_config, ConfigError};
pub use schema::{
    AnalyticsConfig, AppConfig, BusConfig, DelayConfig, LogFormat, LoggingConfig, MetricsConfig, ServerConfig,
    ServiceConfig, ValidationConfig, WorkerConfig,
};
pub use validation::{validate_config, ValidationError};
