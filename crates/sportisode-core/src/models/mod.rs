//! Data models shared across crates.

mod media;
mod stream;
mod upload;

pub use media::*;
pub use stream::*;
pub use upload::*;
