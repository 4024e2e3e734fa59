//! Tracing initialization
//!
//! Log output is filtered by `RUST_LOG` and switches to JSON lines when
//! `LOG_FORMAT=json`.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};
