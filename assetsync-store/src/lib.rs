//! assetsync store: the materialized view of the asset catalogue.
//!
//! - [`keys`]: key model
//! - [`backend`]: [`KvBackend`] trait and [`Batch`]
//! - [`memory`] / [`redis_backend`]: backends
//! - [`record`]: hash encoding of records
//! - [`asset_store`]: [`AssetStore`], the typed API the engine uses

pub mod asset_store;
pub mod backend;
pub mod error;
pub mod keys;
pub mod memory;
pub mod record;
pub mod redis_backend;

pub use asset_store::AssetStore;
pub use backend::{Batch, BatchOp, KvBackend};
pub use error::StoreError;
pub use keys::KeySpace;
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
