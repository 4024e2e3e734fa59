//! Shared key layout for storage backends.
//!
//! - raw uploads: `uploads/{asset_id}/{filename}`
//! - image renditions and the video poster: `media/{asset_id}/{rendition}.{ext}`
//! - HLS renditions: `media/{asset_id}/hls/{i}/rendition.mp4`
//! - HLS manifest: `media/{asset_id}/playlist.m3u8`

use sportisode_core::constants::{
    HLS_MANIFEST_NAME, HLS_RENDITION_NAME, MEDIA_KEY_PREFIX, UPLOAD_KEY_PREFIX,
};
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Reduce a client filename to a safe key segment.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn upload_key(asset_id: Uuid, filename: &str) -> String {
    format!(
        "{}/{}/{}",
        UPLOAD_KEY_PREFIX,
        asset_id,
        sanitize_filename(filename)
    )
}

pub fn rendition_key(asset_id: Uuid, rendition: &str, extension: &str) -> String {
    format!(
        "{}/{}/{}.{}",
        MEDIA_KEY_PREFIX, asset_id, rendition, extension
    )
}

/// URI of a rendition relative to the manifest.
pub fn hls_relative_uri(index: usize) -> String {
    format!("hls/{}/{}", index, HLS_RENDITION_NAME)
}

pub fn hls_rendition_key(asset_id: Uuid, index: usize) -> String {
    format!(
        "{}/{}/{}",
        MEDIA_KEY_PREFIX,
        asset_id,
        hls_relative_uri(index)
    )
}

pub fn hls_manifest_key(asset_id: Uuid) -> String {
    format!("{}/{}/{}", MEDIA_KEY_PREFIX, asset_id, HLS_MANIFEST_NAME)
}

/// Whether a raw upload key belongs to the given asset.
pub fn is_upload_key_for(asset_id: Uuid, storage_key: &str) -> bool {
    storage_key.starts_with(&format!("{}/{}/", UPLOAD_KEY_PREFIX, asset_id))
}

/// Keys must not contain `..`, a leading `/` or be empty.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty()
        || storage_key.contains("..")
        || storage_key.starts_with('/')
        || storage_key.contains('\\')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_documented_layout() {
        let id = Uuid::nil();
        assert_eq!(
            rendition_key(id, "thumbnail", "webp"),
            format!("media/{}/thumbnail.webp", id)
        );
        assert_eq!(
            hls_rendition_key(id, 2),
            format!("media/{}/hls/2/rendition.mp4", id)
        );
        assert_eq!(hls_manifest_key(id), format!("media/{}/playlist.m3u8", id));
        assert_eq!(hls_relative_uri(0), "hls/0/rendition.mp4");
    }

    #[test]
    fn sanitizes_client_filenames() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my goal!.mp4"), "my_goal_.mp4");
        assert_eq!(sanitize_filename("C:\\videos\\clip.mov"), "clip.mov");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn upload_keys_are_scoped_to_asset() {
        let id = Uuid::new_v4();
        let key = upload_key(id, "pic.jpg");
        assert!(is_upload_key_for(id, &key));
        assert!(!is_upload_key_for(Uuid::new_v4(), &key));
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_key("../x").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
    }
}
