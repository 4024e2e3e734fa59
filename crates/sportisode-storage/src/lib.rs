//! Sportisode Storage Library
//!
//! Object storage abstraction with S3 (`object_store`) and local filesystem backends,
//! plus an in-memory backend for tests.
//!
//! # Storage key format
//!
//! Raw uploads live under `uploads/{asset_id}/`, derived renditions under
//! `media/{asset_id}/`. Keys must not contain `..` or a leading `/`. Key generation is
//! centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signing;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, StorageHandle};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use sportisode_core::StorageBackend;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
