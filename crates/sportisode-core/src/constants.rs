//! Shared constants
//!
//! Storage key layout, header names and signed URL lifetimes used by more than one crate.

/// Prefix under which every derived rendition is stored.
pub const MEDIA_KEY_PREFIX: &str = "media";

/// Prefix for raw client uploads before processing.
pub const UPLOAD_KEY_PREFIX: &str = "uploads";

/// Master playlist file name, stored at `media/{id}/playlist.m3u8`.
pub const HLS_MANIFEST_NAME: &str = "playlist.m3u8";

/// Per-rendition MP4 file name, stored at `media/{id}/hls/{i}/rendition.mp4`.
pub const HLS_RENDITION_NAME: &str = "rendition.mp4";

/// Lifetime of a signed PUT URL handed out for direct uploads.
pub const UPLOAD_URL_TTL_SECS: u64 = 15 * 60;

/// Lifetime of a signed read URL for a video rendition.
pub const VIDEO_URL_TTL_SECS: u64 = 60;

/// Lifetime of a signed read URL for the HLS manifest.
pub const MANIFEST_URL_TTL_SECS: u64 = 3600;

/// Lifetime of a signed read URL for image renditions.
pub const IMAGE_URL_TTL_SECS: u64 = 3600;

/// Signature header sent by the broadcast provider.
pub const PROVIDER_SIGNATURE_HEADER: &str = "provider-signature";

/// The provider's native header name, accepted as an alias.
pub const MUX_SIGNATURE_HEADER: &str = "mux-signature";

/// Opaque caller id set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";
