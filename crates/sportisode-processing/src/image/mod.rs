//! Image renditions
//!
//! Decoding normalizes to RGB; every rendition is re-encoded in the configured
//! output format so none of the source container or metadata survives.

mod renditions;

pub use renditions::{
    decode_rgb, fit_within, render, thumbnail_fill, ImageOutputFormat, MediaDecodeError,
    RenderedImage,
};
