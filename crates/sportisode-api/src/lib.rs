//! Sportisode API Library
//!
//! HTTP handlers, request extractors and application setup for the media
//! pipeline, live streams and sports data.

pub mod api_doc;
pub mod caller;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use error::ErrorResponse;
