use async_trait::async_trait;
use sportisode_core::models::{
    MediaAsset, MediaDimensions, MediaVariant, NewMediaVariant, ProcessingStatus, VariantType,
};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::MediaJobStore;
use crate::{is_unique_violation, StoreError, StoreResult};

/// PostgreSQL-backed media store
#[derive(Clone)]
pub struct PgMediaJobStore {
    pool: PgPool,
}

impl PgMediaJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_exists(&self, id: Uuid) -> StoreResult<()> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM media_assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Media asset {}", id)))
    }
}

#[async_trait]
impl MediaJobStore for PgMediaJobStore {
    #[tracing::instrument(skip(self, asset), fields(asset_id = %asset.id))]
    async fn create_asset(&self, asset: &MediaAsset) -> StoreResult<()> {
        // Runtime queries so builds do not need DATABASE_URL or an offline cache
        let result = sqlx::query(
            r#"
            INSERT INTO media_assets (
                id, original_filename, file_size, content_type, kind, storage_key,
                processing_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(asset.id)
        .bind(&asset.original_filename)
        .bind(asset.file_size)
        .bind(&asset.content_type)
        .bind(asset.kind)
        .bind(&asset.storage_key)
        .bind(asset.processing_status)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "Media asset {} already exists",
                asset.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_asset(&self, id: Uuid) -> StoreResult<Option<MediaAsset>> {
        let row = sqlx::query_as::<Postgres, MediaAsset>("SELECT * FROM media_assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, error_message), fields(asset_id = %id))]
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: ProcessingStatus,
        new: ProcessingStatus,
        error_message: Option<&str>,
    ) -> StoreResult<bool> {
        if !expected.can_transition_to(new) {
            return Ok(false);
        }

        let error_message = if new == ProcessingStatus::Failed {
            error_message
        } else {
            None
        };

        let result = sqlx::query(
            r#"
            UPDATE media_assets
            SET processing_status = $3,
                error_message = COALESCE($4, error_message),
                updated_at = NOW()
            WHERE id = $1 AND processing_status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        self.ensure_exists(id).await?;
        Ok(false)
    }

    async fn record_dimensions(&self, id: Uuid, dimensions: MediaDimensions) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE media_assets
            SET width = COALESCE($2, width),
                height = COALESCE($3, height),
                duration = COALESCE($4, duration),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(dimensions.width)
        .bind(dimensions.height)
        .bind(dimensions.duration)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Media asset {}", id)));
        }
        Ok(())
    }

    async fn set_rendition_url(
        &self,
        id: Uuid,
        variant_type: VariantType,
        url: &str,
    ) -> StoreResult<()> {
        let column = match variant_type {
            VariantType::Thumbnail => "thumbnail_url",
            VariantType::Preview => "preview_url",
            VariantType::Full => "full_url",
            VariantType::VideoThumbnail => "video_thumbnail_url",
            VariantType::HlsManifest => "hls_manifest_url",
            VariantType::HlsRendition => return Ok(()),
        };

        let sql = format!(
            "UPDATE media_assets SET {} = $2, updated_at = NOW() WHERE id = $1",
            column
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Media asset {}", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, variant), fields(asset_id = %variant.asset_id, variant_type = %variant.variant_type))]
    async fn insert_variant(&self, variant: NewMediaVariant) -> StoreResult<MediaVariant> {
        let row = variant.into_variant();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE media_variants
            SET superseded = TRUE
            WHERE asset_id = $1
              AND variant_type = $2
              AND segment_index IS NOT DISTINCT FROM $3
              AND NOT superseded
            "#,
        )
        .bind(row.asset_id)
        .bind(row.variant_type)
        .bind(row.segment_index)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query_as::<Postgres, MediaVariant>(
            r#"
            INSERT INTO media_variants (
                id, asset_id, variant_type, segment_index, storage_key, url,
                width, height, file_size, format, bitrate_kbps, superseded, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, $12)
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(row.asset_id)
        .bind(row.variant_type)
        .bind(row.segment_index)
        .bind(&row.storage_key)
        .bind(&row.url)
        .bind(row.width)
        .bind(row.height)
        .bind(row.file_size)
        .bind(&row.format)
        .bind(row.bitrate_kbps)
        .bind(row.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!(
                    "Concurrent insert of {} for asset {}",
                    row.variant_type, row.asset_id
                ))
            } else {
                StoreError::from(e)
            }
        })?;

        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_variants(&self, asset_id: Uuid) -> StoreResult<Vec<MediaVariant>> {
        let rows = sqlx::query_as::<Postgres, MediaVariant>(
            r#"
            SELECT * FROM media_variants
            WHERE asset_id = $1 AND NOT superseded
            ORDER BY variant_type, segment_index NULLS FIRST
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_variant(
        &self,
        asset_id: Uuid,
        variant_type: VariantType,
        segment_index: Option<i32>,
    ) -> StoreResult<Option<MediaVariant>> {
        let row = sqlx::query_as::<Postgres, MediaVariant>(
            r#"
            SELECT * FROM media_variants
            WHERE asset_id = $1
              AND variant_type = $2
              AND segment_index IS NOT DISTINCT FROM $3
              AND NOT superseded
            "#,
        )
        .bind(asset_id)
        .bind(variant_type)
        .bind(segment_index)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
