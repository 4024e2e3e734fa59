//! Transcode pipeline: raw upload -> renditions -> storage -> job store.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use sportisode_core::models::{
    MediaAsset, MediaDimensions, MediaKind, MediaVariant, NewMediaVariant, ProcessingStatus,
    VariantType,
};
use sportisode_core::{MediaConfig, RenditionSpec};
use sportisode_db::MediaJobStore;
use sportisode_storage::{keys, Storage};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::image::{self as renditions, ImageOutputFormat, MediaDecodeError, RenderedImage};
use crate::video::{master_manifest, ManifestEntry, VideoToolkit, HLS_CONTENT_TYPE};

const FINAL_STATUS_ATTEMPTS: u32 = 2;
const FINAL_STATUS_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub thumbnail_size: (u32, u32),
    pub preview_size: (u32, u32),
    pub video_thumbnail_size: (u32, u32),
    pub video_thumbnail_time_secs: f64,
    pub hls_ladder: Vec<RenditionSpec>,
    pub output_format: ImageOutputFormat,
    pub download_timeout: Duration,
    pub upload_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_media_config(media: &MediaConfig) -> Self {
        Self {
            thumbnail_size: media.thumbnail_size,
            preview_size: media.preview_size,
            video_thumbnail_size: media.video_thumbnail_size,
            video_thumbnail_time_secs: media.video_thumbnail_time_secs,
            hls_ladder: media.hls_ladder.clone(),
            output_format: ImageOutputFormat::from_config(
                &media.image_output_format,
                media.jpeg_quality,
            ),
            download_timeout: Duration::from_secs(media.download_timeout_secs),
            upload_timeout: Duration::from_secs(media.upload_timeout_secs),
        }
    }
}

/// What a pipeline run did with the asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    /// Another run owns the asset or already finished it
    Skipped(ProcessingStatus),
    Missing,
}

/// One rendition on its way to storage and the job store
struct Publication {
    asset_id: Uuid,
    variant_type: VariantType,
    segment_index: Option<i32>,
    storage_key: String,
    data: Vec<u8>,
    content_type: &'static str,
    format: &'static str,
    dimensions: Option<(u32, u32)>,
    bitrate_kbps: Option<u32>,
}

#[derive(Clone)]
pub struct TranscodePipeline {
    store: Arc<dyn MediaJobStore>,
    storage: Arc<dyn Storage>,
    toolkit: Arc<dyn VideoToolkit>,
    config: PipelineConfig,
}

async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| anyhow!("{} timed out after {}s", what, limit.as_secs()))?
}

impl TranscodePipeline {
    pub fn new(
        store: Arc<dyn MediaJobStore>,
        storage: Arc<dyn Storage>,
        toolkit: Arc<dyn VideoToolkit>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            storage,
            toolkit,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn MediaJobStore> {
        &self.store
    }

    /// Process one asset. Only a run that wins `pending -> processing` does any
    /// work; everyone else gets [`JobOutcome::Skipped`].
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn run(&self, asset_id: Uuid) -> Result<JobOutcome> {
        let Some(asset) = self.store.get_asset(asset_id).await? else {
            tracing::warn!("Asset not found, nothing to process");
            return Ok(JobOutcome::Missing);
        };

        let claimed = self
            .store
            .compare_and_set_status(
                asset_id,
                ProcessingStatus::Pending,
                ProcessingStatus::Processing,
                None,
            )
            .await?;
        if !claimed {
            // The first read may predate whoever won the claim
            let current = match self.store.get_asset(asset_id).await {
                Ok(Some(current)) => current.processing_status,
                Ok(None) => return Ok(JobOutcome::Missing),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not re-read asset after lost claim");
                    ProcessingStatus::Processing
                }
            };
            tracing::debug!(status = %current, "Asset not pending, skipping");
            return Ok(JobOutcome::Skipped(current));
        }

        tracing::info!(kind = ?asset.kind, storage_key = %asset.storage_key, "Processing started");

        let result = match asset.kind {
            MediaKind::Image => self.process_image(&asset).await,
            MediaKind::Video => self.process_video(&asset).await,
        };

        match result {
            Ok(()) => {
                self.finish(asset_id, ProcessingStatus::Completed, None).await?;
                tracing::info!("Processing completed");
                Ok(JobOutcome::Completed)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if e.downcast_ref::<MediaDecodeError>().is_some() {
                    tracing::warn!(error = %message, "Source media could not be decoded");
                } else {
                    tracing::error!(error = %message, "Processing failed");
                }
                self.finish(asset_id, ProcessingStatus::Failed, Some(&message))
                    .await?;
                Ok(JobOutcome::Failed(message))
            }
        }
    }

    /// Record the terminal status, retrying once. An asset whose final write
    /// keeps failing stays in `processing` and is logged for an operator.
    async fn finish(
        &self,
        asset_id: Uuid,
        status: ProcessingStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self
                .store
                .compare_and_set_status(
                    asset_id,
                    ProcessingStatus::Processing,
                    status,
                    error_message,
                )
                .await
            {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    tracing::warn!(to = %status, "Asset left processing before its final status was written");
                    return Ok(());
                }
                Err(e) if attempt < FINAL_STATUS_ATTEMPTS => {
                    tracing::error!(error = %e, to = %status, attempt, "Final status write failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(FINAL_STATUS_RETRY_DELAY).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, to = %status, "Asset stuck in processing");
                    return Err(anyhow::Error::new(e).context(format!("Failed to mark asset {}", status)));
                }
            }
        }
    }

    async fn process_image(&self, asset: &MediaAsset) -> Result<()> {
        let data = bounded(self.config.download_timeout, "Source download", async {
            self.storage
                .download(&asset.storage_key)
                .await
                .context("Failed to download source")
        })
        .await?;

        let config = self.config.clone();
        let (dimensions, rendered) = tokio::task::spawn_blocking(move || {
            let img = renditions::decode_rgb(&data)?;
            let dimensions = (img.width(), img.height());
            let format = config.output_format;
            let rendered = vec![
                (
                    VariantType::Thumbnail,
                    renditions::render(&renditions::thumbnail_fill(&img, config.thumbnail_size), format)?,
                ),
                (
                    VariantType::Preview,
                    renditions::render(&renditions::fit_within(&img, config.preview_size), format)?,
                ),
                (VariantType::Full, renditions::render(&img, format)?),
            ];
            Ok::<_, anyhow::Error>((dimensions, rendered))
        })
        .await
        .context("Image rendering task panicked")??;

        self.store
            .record_dimensions(
                asset.id,
                MediaDimensions {
                    width: Some(dimensions.0 as i32),
                    height: Some(dimensions.1 as i32),
                    duration: None,
                },
            )
            .await?;

        for (variant_type, image) in rendered {
            self.publish_image(asset.id, variant_type, image).await?;
        }
        Ok(())
    }

    async fn process_video(&self, asset: &MediaAsset) -> Result<()> {
        let workdir = tempfile::TempDir::new().context("Failed to create temp directory")?;
        let source = workdir.path().join("source");

        bounded(
            self.config.download_timeout,
            "Source download",
            self.download_to_file(&asset.storage_key, &source),
        )
        .await?;

        let probe = self
            .toolkit
            .probe(&source)
            .await
            .context("Failed to probe video")?;
        self.store
            .record_dimensions(
                asset.id,
                MediaDimensions {
                    width: Some(probe.width as i32),
                    height: Some(probe.height as i32),
                    duration: Some(probe.duration),
                },
            )
            .await?;

        // Poster frame
        let at = self.config.video_thumbnail_time_secs.min(probe.duration).max(0.0);
        let frame_path = workdir.path().join("frame.png");
        self.toolkit
            .extract_frame(&source, at, &frame_path)
            .await
            .context("Failed to extract poster frame")?;
        let frame = tokio::fs::read(&frame_path)
            .await
            .context("Failed to read poster frame")?;
        let (size, format) = (self.config.video_thumbnail_size, self.config.output_format);
        let poster = tokio::task::spawn_blocking(move || {
            let img = renditions::decode_rgb(&frame)?;
            Ok::<_, anyhow::Error>(renditions::render(&renditions::fit_within(&img, size), format)?)
        })
        .await
        .context("Poster rendering task panicked")??;
        self.publish_image(asset.id, VariantType::VideoThumbnail, poster)
            .await?;

        // Rendition ladder
        let mut entries = Vec::with_capacity(self.config.hls_ladder.len());
        for (index, spec) in self.config.hls_ladder.iter().enumerate() {
            let output = workdir.path().join(format!("rendition_{}.mp4", index));
            self.toolkit
                .transcode(&source, spec, &output)
                .await
                .with_context(|| format!("Failed to transcode rendition {}", index))?;
            let data = tokio::fs::read(&output)
                .await
                .with_context(|| format!("Failed to read rendition {}", index))?;

            self.publish(Publication {
                asset_id: asset.id,
                variant_type: VariantType::HlsRendition,
                segment_index: Some(index as i32),
                storage_key: keys::hls_rendition_key(asset.id, index),
                data,
                content_type: "video/mp4",
                format: "mp4",
                dimensions: Some((spec.width, spec.height)),
                bitrate_kbps: Some(spec.bitrate_kbps),
            })
            .await?;

            entries.push(ManifestEntry {
                bitrate_kbps: spec.bitrate_kbps,
                width: spec.width,
                height: spec.height,
                uri: keys::hls_relative_uri(index),
            });
        }

        let manifest = master_manifest(&entries);
        self.publish(Publication {
            asset_id: asset.id,
            variant_type: VariantType::HlsManifest,
            segment_index: None,
            storage_key: keys::hls_manifest_key(asset.id),
            data: manifest.into_bytes(),
            content_type: HLS_CONTENT_TYPE,
            format: "m3u8",
            dimensions: None,
            bitrate_kbps: None,
        })
        .await?;

        Ok(())
    }

    async fn download_to_file(&self, storage_key: &str, path: &Path) -> Result<()> {
        let mut stream = self
            .storage
            .download_stream(storage_key)
            .await
            .context("Failed to download source")?;
        let mut file = tokio::fs::File::create(path)
            .await
            .context("Failed to create source file")?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Source download interrupted")?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn publish_image(
        &self,
        asset_id: Uuid,
        variant_type: VariantType,
        image: RenderedImage,
    ) -> Result<MediaVariant> {
        let format = self.config.output_format;
        self.publish(Publication {
            asset_id,
            variant_type,
            segment_index: None,
            storage_key: keys::rendition_key(asset_id, variant_type.as_str(), format.extension()),
            data: image.data,
            content_type: format.content_type(),
            format: format.format_name(),
            dimensions: Some((image.width, image.height)),
            bitrate_kbps: None,
        })
        .await
        .map(|variant| {
            tracing::debug!(asset_id = %asset_id, variant_type = %variant_type, "Image rendition stored");
            variant
        })
    }

    /// Upload, record the variant, then expose its URL on the asset.
    async fn publish(&self, publication: Publication) -> Result<MediaVariant> {
        let Publication {
            asset_id,
            variant_type,
            segment_index,
            storage_key,
            data,
            content_type,
            format,
            dimensions,
            bitrate_kbps,
        } = publication;
        let file_size = data.len() as i64;

        let url = bounded(self.config.upload_timeout, "Rendition upload", async {
            self.storage
                .upload_with_key(&storage_key, data, content_type)
                .await
                .with_context(|| format!("Failed to upload {}", storage_key))
        })
        .await?;

        let variant = self
            .store
            .insert_variant(NewMediaVariant {
                asset_id,
                variant_type,
                segment_index,
                storage_key,
                url: url.clone(),
                width: dimensions.map(|(w, _)| w as i32),
                height: dimensions.map(|(_, h)| h as i32),
                file_size,
                format: format.to_string(),
                bitrate_kbps: bitrate_kbps.map(|b| b as i32),
            })
            .await?;

        self.store
            .set_rendition_url(asset_id, variant_type, &url)
            .await?;
        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_bytes, FakeVideoToolkit};
    use sportisode_core::Config;
    use sportisode_db::{InMemoryMediaJobStore, StoreError, StoreResult};
    use sportisode_storage::InMemoryStorage;

    struct Harness {
        store: Arc<InMemoryMediaJobStore>,
        storage: Arc<InMemoryStorage>,
        toolkit: Arc<FakeVideoToolkit>,
        pipeline: TranscodePipeline,
    }

    fn harness_with(toolkit: FakeVideoToolkit, config: PipelineConfig) -> Harness {
        let store = Arc::new(InMemoryMediaJobStore::new());
        let storage = Arc::new(InMemoryStorage::new());
        let toolkit = Arc::new(toolkit);
        let pipeline = TranscodePipeline::new(
            store.clone(),
            storage.clone(),
            toolkit.clone(),
            config,
        );
        Harness {
            store,
            storage,
            toolkit,
            pipeline,
        }
    }

    fn default_config() -> PipelineConfig {
        PipelineConfig::from_media_config(Config::default().media())
    }

    fn harness() -> Harness {
        harness_with(FakeVideoToolkit::new(12.0, 640, 360), default_config())
    }

    async fn seed(h: &Harness, kind: MediaKind, data: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        let (filename, content_type) = match kind {
            MediaKind::Image => ("goal.png", "image/png"),
            MediaKind::Video => ("highlights.mp4", "video/mp4"),
        };
        let key = keys::upload_key(id, filename);
        h.storage.put(&key, data.clone(), content_type);
        let asset =
            MediaAsset::new_pending(id, filename, data.len() as i64, content_type, kind, key);
        h.store.create_asset(&asset).await.unwrap();
        id
    }

    #[tokio::test]
    async fn image_produces_three_renditions() {
        let h = harness();
        let id = seed(&h, MediaKind::Image, png_bytes(1600, 900)).await;

        assert_eq!(h.pipeline.run(id).await.unwrap(), JobOutcome::Completed);

        let asset = h.store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.processing_status, ProcessingStatus::Completed);
        assert_eq!((asset.width, asset.height), (Some(1600), Some(900)));
        assert!(asset.thumbnail_url.is_some());
        assert!(asset.preview_url.is_some());
        assert!(asset.full_url.is_some());
        assert!(asset.hls_manifest_url.is_none());

        let variants = h.store.list_variants(id).await.unwrap();
        let dims: Vec<_> = variants
            .iter()
            .map(|v| (v.variant_type, v.width, v.height))
            .collect();
        assert_eq!(
            dims,
            vec![
                (VariantType::Thumbnail, Some(150), Some(150)),
                (VariantType::Preview, Some(800), Some(450)),
                (VariantType::Full, Some(1600), Some(900)),
            ]
        );

        let thumb_key = keys::rendition_key(id, "thumbnail", "webp");
        let thumb = image::load_from_memory(&h.storage.get(&thumb_key).unwrap()).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (150, 150));
        assert_eq!(h.storage.content_type(&thumb_key).as_deref(), Some("image/webp"));
    }

    #[tokio::test]
    async fn small_image_preview_is_not_upscaled() {
        let h = harness();
        let id = seed(&h, MediaKind::Image, png_bytes(120, 80)).await;
        h.pipeline.run(id).await.unwrap();

        let preview = h
            .store
            .find_variant(id, VariantType::Preview, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((preview.width, preview.height), (Some(120), Some(80)));
    }

    #[tokio::test]
    async fn jpeg_output_format_uses_jpg_keys() {
        let mut config = default_config();
        config.output_format = ImageOutputFormat::Jpeg { quality: 80 };
        let h = harness_with(FakeVideoToolkit::new(1.0, 64, 36), config);
        let id = seed(&h, MediaKind::Image, png_bytes(300, 300)).await;
        h.pipeline.run(id).await.unwrap();

        let full = h
            .store
            .find_variant(id, VariantType::Full, None)
            .await
            .unwrap()
            .unwrap();
        assert!(full.storage_key.ends_with("/full.jpg"));
        assert_eq!(full.format, "jpeg");
    }

    #[tokio::test]
    async fn undecodable_image_fails_without_uploads() {
        let h = harness();
        let id = seed(&h, MediaKind::Image, b"not an image at all".to_vec()).await;

        let outcome = h.pipeline.run(id).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(ref msg) if msg.contains("decode")));

        let asset = h.store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.processing_status, ProcessingStatus::Failed);
        assert!(asset.error_message.is_some());
        assert!(h.store.list_variants(id).await.unwrap().is_empty());
        assert!(h.storage.keys().iter().all(|k| !k.starts_with("media/")));
    }

    #[tokio::test]
    async fn completed_asset_is_not_reprocessed() {
        let h = harness();
        let id = seed(&h, MediaKind::Image, png_bytes(200, 200)).await;
        h.pipeline.run(id).await.unwrap();
        let before = h.store.all_variants(id).await.len();

        let outcome = h.pipeline.run(id).await.unwrap();

        assert_eq!(outcome, JobOutcome::Skipped(ProcessingStatus::Completed));
        assert_eq!(h.store.all_variants(id).await.len(), before);
        let asset = h.store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.processing_status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_runs_process_once() {
        let h = harness();
        let id = seed(&h, MediaKind::Image, png_bytes(200, 100)).await;

        let (a, b) = tokio::join!(h.pipeline.run(id), h.pipeline.run(id));
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == JobOutcome::Completed)
                .count(),
            1
        );
        assert_eq!(h.store.list_variants(id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_asset_is_reported() {
        let h = harness();
        assert_eq!(
            h.pipeline.run(Uuid::new_v4()).await.unwrap(),
            JobOutcome::Missing
        );
    }

    #[tokio::test]
    async fn video_produces_poster_ladder_and_manifest() {
        let h = harness();
        let id = seed(&h, MediaKind::Video, b"fake mp4 bytes".to_vec()).await;

        assert_eq!(h.pipeline.run(id).await.unwrap(), JobOutcome::Completed);

        let asset = h.store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.duration, Some(12.0));
        assert_eq!((asset.width, asset.height), (Some(640), Some(360)));
        assert!(asset.video_thumbnail_url.is_some());
        assert!(asset.hls_manifest_url.is_some());
        assert!(asset.thumbnail_url.is_none());

        let variants = h.store.list_variants(id).await.unwrap();
        let count = |t: VariantType| variants.iter().filter(|v| v.variant_type == t).count();
        assert_eq!(count(VariantType::VideoThumbnail), 1);
        assert_eq!(count(VariantType::HlsRendition), 3);
        assert_eq!(count(VariantType::HlsManifest), 1);

        let poster = variants
            .iter()
            .find(|v| v.variant_type == VariantType::VideoThumbnail)
            .unwrap();
        assert_eq!((poster.width, poster.height), (Some(320), Some(180)));

        let renditions: Vec<_> = variants
            .iter()
            .filter(|v| v.variant_type == VariantType::HlsRendition)
            .map(|v| (v.segment_index, v.bitrate_kbps, v.storage_key.clone()))
            .collect();
        assert_eq!(renditions[0], (Some(0), Some(800), keys::hls_rendition_key(id, 0)));
        assert_eq!(renditions[2].1, Some(2800));

        let manifest =
            String::from_utf8(h.storage.get(&keys::hls_manifest_key(id)).unwrap()).unwrap();
        assert!(manifest.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(manifest.contains("BANDWIDTH=800000,RESOLUTION=640x360\nhls/0/rendition.mp4"));
        assert!(manifest.contains("BANDWIDTH=2800000,RESOLUTION=1280x720\nhls/2/rendition.mp4"));

        assert_eq!(h.toolkit.frame_requests(), vec![1.0]);
    }

    #[tokio::test]
    async fn short_video_poster_is_taken_within_duration() {
        let h = harness_with(FakeVideoToolkit::new(0.4, 320, 240), default_config());
        let id = seed(&h, MediaKind::Video, b"short clip".to_vec()).await;
        h.pipeline.run(id).await.unwrap();
        assert_eq!(h.toolkit.frame_requests(), vec![0.4]);
    }

    #[tokio::test]
    async fn failed_rendition_keeps_earlier_variants() {
        let h = harness_with(
            FakeVideoToolkit::new(8.0, 640, 360).failing_transcode(1400),
            default_config(),
        );
        let id = seed(&h, MediaKind::Video, b"clip".to_vec()).await;

        let outcome = h.pipeline.run(id).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(ref msg) if msg.contains("rendition 1")));

        let asset = h.store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.processing_status, ProcessingStatus::Failed);
        assert!(asset.video_thumbnail_url.is_some());
        assert!(asset.hls_manifest_url.is_none());

        let kinds: Vec<_> = h
            .store
            .list_variants(id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| (v.variant_type, v.segment_index))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (VariantType::VideoThumbnail, None),
                (VariantType::HlsRendition, Some(0)),
            ]
        );
        assert_eq!(h.toolkit.transcodes().len(), 2);
    }

    #[tokio::test]
    async fn upload_failure_leaves_url_unset() {
        let h = harness();
        h.storage.fail_uploads_containing("/preview.");
        let id = seed(&h, MediaKind::Image, png_bytes(400, 400)).await;

        let outcome = h.pipeline.run(id).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(_)));

        let asset = h.store.get_asset(id).await.unwrap().unwrap();
        assert!(asset.thumbnail_url.is_some());
        assert!(asset.preview_url.is_none());
        assert!(asset.full_url.is_none());
    }

    /// Store that serves a stale first read and fails a set number of final
    /// status writes.
    struct ScriptedStore {
        inner: InMemoryMediaJobStore,
        stale_reads: std::sync::atomic::AtomicU32,
        failing_finishes: std::sync::atomic::AtomicU32,
    }

    impl ScriptedStore {
        fn new(stale_reads: u32, failing_finishes: u32) -> Self {
            Self {
                inner: InMemoryMediaJobStore::new(),
                stale_reads: stale_reads.into(),
                failing_finishes: failing_finishes.into(),
            }
        }

        fn take(counter: &std::sync::atomic::AtomicU32) -> bool {
            use std::sync::atomic::Ordering;
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait::async_trait]
    impl MediaJobStore for ScriptedStore {
        async fn create_asset(&self, asset: &MediaAsset) -> StoreResult<()> {
            self.inner.create_asset(asset).await
        }

        async fn get_asset(&self, id: Uuid) -> StoreResult<Option<MediaAsset>> {
            let asset = self.inner.get_asset(id).await?;
            if Self::take(&self.stale_reads) {
                return Ok(asset.map(|mut a| {
                    a.processing_status = ProcessingStatus::Pending;
                    a
                }));
            }
            Ok(asset)
        }

        async fn compare_and_set_status(
            &self,
            id: Uuid,
            expected: ProcessingStatus,
            new: ProcessingStatus,
            error_message: Option<&str>,
        ) -> StoreResult<bool> {
            if new.is_terminal() && Self::take(&self.failing_finishes) {
                return Err(StoreError::Conflict("connection reset".to_string()));
            }
            self.inner
                .compare_and_set_status(id, expected, new, error_message)
                .await
        }

        async fn record_dimensions(&self, id: Uuid, dimensions: MediaDimensions) -> StoreResult<()> {
            self.inner.record_dimensions(id, dimensions).await
        }

        async fn set_rendition_url(
            &self,
            id: Uuid,
            variant_type: VariantType,
            url: &str,
        ) -> StoreResult<()> {
            self.inner.set_rendition_url(id, variant_type, url).await
        }

        async fn insert_variant(&self, variant: NewMediaVariant) -> StoreResult<MediaVariant> {
            self.inner.insert_variant(variant).await
        }

        async fn list_variants(&self, asset_id: Uuid) -> StoreResult<Vec<MediaVariant>> {
            self.inner.list_variants(asset_id).await
        }

        async fn find_variant(
            &self,
            asset_id: Uuid,
            variant_type: VariantType,
            segment_index: Option<i32>,
        ) -> StoreResult<Option<MediaVariant>> {
            self.inner
                .find_variant(asset_id, variant_type, segment_index)
                .await
        }
    }

    async fn scripted(store: ScriptedStore) -> (Arc<ScriptedStore>, TranscodePipeline, Uuid) {
        let store = Arc::new(store);
        let storage = Arc::new(InMemoryStorage::new());
        let id = Uuid::new_v4();
        let key = keys::upload_key(id, "goal.png");
        let data = png_bytes(200, 120);
        storage.put(&key, data.clone(), "image/png");
        let asset = MediaAsset::new_pending(
            id,
            "goal.png",
            data.len() as i64,
            "image/png",
            MediaKind::Image,
            key,
        );
        store.create_asset(&asset).await.unwrap();
        let pipeline = TranscodePipeline::new(
            store.clone(),
            storage,
            Arc::new(FakeVideoToolkit::new(12.0, 640, 360)),
            default_config(),
        );
        (store, pipeline, id)
    }

    #[tokio::test]
    async fn lost_claim_reports_current_status() {
        let (store, pipeline, id) = scripted(ScriptedStore::new(1, 0)).await;
        assert!(store
            .inner
            .compare_and_set_status(id, ProcessingStatus::Pending, ProcessingStatus::Processing, None)
            .await
            .unwrap());

        let outcome = pipeline.run(id).await.unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(ProcessingStatus::Processing));
    }

    #[tokio::test]
    async fn final_status_write_is_retried_once() {
        let (store, pipeline, id) = scripted(ScriptedStore::new(0, 1)).await;

        assert_eq!(pipeline.run(id).await.unwrap(), JobOutcome::Completed);
        let asset = store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.processing_status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn final_status_write_failing_twice_surfaces_error() {
        let (store, pipeline, id) = scripted(ScriptedStore::new(0, 2)).await;

        assert!(pipeline.run(id).await.is_err());
        let asset = store.get_asset(id).await.unwrap().unwrap();
        assert_eq!(asset.processing_status, ProcessingStatus::Processing);
    }
}
