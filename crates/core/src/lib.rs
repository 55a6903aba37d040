pub mod config;
pub mod config_loader;

pub use config::{
    AnomalyConfig, ApiConfig, AppConfig, DatabaseConfig, EtlConfig, LlmConfig, ServerConfig,
};
pub use config_loader::ConfigLoader;
