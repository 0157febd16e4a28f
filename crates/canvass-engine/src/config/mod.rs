pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{
    CanvassConfig, DispatchConfig, LearningConfig, ScoringConfig, SecurityConfig, StorageConfig,
};
