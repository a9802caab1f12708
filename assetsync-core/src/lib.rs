//! assetsync core library: manifest model, validator, configuration, errors.
//!
//! - [`types`]: manifest, store projections, sync state
//! - [`validate`]: schema validation of raw manifest data
//! - [`config`]: YAML + environment configuration
//! - [`error`]: [`SchemaViolation`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use config::Config;
pub use error::{ConfigError, FieldError, SchemaViolation};
pub use types::{
    AgentSpecs, Asset, Category, ConfigFieldType, ConfigItem, Manifest, Permissions, Runtime,
    RuntimeLanguage, SelectOption, StoredAsset, SummaryEntry, SyncState, SyncStatus,
    unix_now,
};
pub use validate::{validate, validate_yaml};
