//! Configuration subsystem.
//!
//! Schema types deserialize from TOML with per-section defaults; the loader
//! validates the whole file in one pass. Configuration is read once at
//! startup and handed to the engine as a value.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, CorsConfig, EngineConfig, ListenerConfig, ObservabilityConfig, ThrottleConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
