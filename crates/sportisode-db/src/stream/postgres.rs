use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sportisode_core::models::{LiveStream, StreamStatus};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::StreamStore;
use crate::{is_unique_violation, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgStreamStore {
    pool: PgPool,
}

impl PgStreamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_exists(&self, id: Uuid) -> StoreResult<()> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM live_streams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Live stream {}", id)))
    }
}

#[async_trait]
impl StreamStore for PgStreamStore {
    #[tracing::instrument(skip(self, stream), fields(stream_id = %stream.id))]
    async fn insert(&self, stream: &LiveStream) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO live_streams (
                id, title, description, host_id, stream_key, provider_stream_id,
                ingest_url, playback_url, status, scheduled_start, viewer_count,
                peak_viewers, is_private, allowed_viewers, tags, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(stream.id)
        .bind(&stream.title)
        .bind(&stream.description)
        .bind(&stream.host_id)
        .bind(&stream.stream_key)
        .bind(&stream.provider_stream_id)
        .bind(&stream.ingest_url)
        .bind(&stream.playback_url)
        .bind(stream.status)
        .bind(stream.scheduled_start)
        .bind(stream.viewer_count)
        .bind(stream.peak_viewers)
        .bind(stream.is_private)
        .bind(&stream.allowed_viewers)
        .bind(&stream.tags)
        .bind(stream.created_at)
        .bind(stream.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "Live stream {} collides with an existing stream",
                stream.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<LiveStream>> {
        let row = sqlx::query_as::<Postgres, LiveStream>("SELECT * FROM live_streams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_provider_id(
        &self,
        provider_stream_id: &str,
    ) -> StoreResult<Option<LiveStream>> {
        let row = sqlx::query_as::<Postgres, LiveStream>(
            "SELECT * FROM live_streams WHERE provider_stream_id = $1",
        )
        .bind(provider_stream_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(stream_id = %id))]
    async fn transition(
        &self,
        id: Uuid,
        expected: StreamStatus,
        new: StreamStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<LiveStream>> {
        if !expected.can_transition_to(new) {
            return Ok(None);
        }

        let actual_start = (new == StreamStatus::Live).then_some(at);
        let actual_end = (new == StreamStatus::Ended).then_some(at);

        let row = sqlx::query_as::<Postgres, LiveStream>(
            r#"
            UPDATE live_streams
            SET status = $3,
                actual_start = COALESCE($4, actual_start),
                actual_end = COALESCE($5, actual_end),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(actual_start)
        .bind(actual_end)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            self.ensure_exists(id).await?;
        }
        Ok(row)
    }

    async fn set_playback_url(&self, id: Uuid, playback_url: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE live_streams SET playback_url = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(playback_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Live stream {}", id)));
        }
        Ok(())
    }

    async fn adjust_viewers(&self, id: Uuid, delta: i32) -> StoreResult<Option<LiveStream>> {
        let row = sqlx::query_as::<Postgres, LiveStream>(
            r#"
            UPDATE live_streams
            SET viewer_count = GREATEST(viewer_count + $2, 0),
                peak_viewers = GREATEST(peak_viewers, GREATEST(viewer_count + $2, 0)),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('starting', 'live')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        if row.is_none() {
            self.ensure_exists(id).await?;
        }
        Ok(row)
    }
}
