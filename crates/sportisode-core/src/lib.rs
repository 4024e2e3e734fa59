//! Sportisode Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every Sportisode component: media assets and their renditions, live streams,
//! and the settings for storage, transcoding, integrations and the broadcast provider.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    BaseConfig, BroadcastConfig, Config, IntegrationsConfig, MediaConfig, RenditionSpec,
    SportisodeConfig, StorageConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
