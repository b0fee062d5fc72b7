pub mod settings;

pub use settings::*;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "SCAN_RELAY_CONFIG";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_INGEST_PORT: u16 = 5000;
pub const DEFAULT_WEB_PORT: u16 = 8000;
