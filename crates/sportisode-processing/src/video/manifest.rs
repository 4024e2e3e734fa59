pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub bitrate_kbps: u32,
    pub width: u32,
    pub height: u32,
    /// Rendition URI relative to the manifest
    pub uri: String,
}

/// HLS master playlist listing the renditions in the given order.
pub fn master_manifest(entries: &[ManifestEntry]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for entry in entries {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}\n",
            u64::from(entry.bitrate_kbps) * 1000,
            entry.width,
            entry.height,
            entry.uri
        ));
    }
    playlist
}
