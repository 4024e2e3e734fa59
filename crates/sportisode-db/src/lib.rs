//! Sportisode persistence
//!
//! Store traits for media assets and live streams, with in-memory implementations
//! and PostgreSQL implementations behind the `postgres` feature. Both stores apply
//! status changes as compare-and-set so concurrent writers converge.

mod error;
pub mod media;
pub mod stream;

pub use error::{StoreError, StoreResult};
pub use media::{InMemoryMediaJobStore, MediaJobStore};
pub use stream::{InMemoryStreamStore, StreamStore};

#[cfg(feature = "postgres")]
pub use media::PgMediaJobStore;
#[cfg(feature = "postgres")]
pub use stream::PgStreamStore;

#[cfg(feature = "postgres")]
pub use pool::{connect, run_migrations};

#[cfg(feature = "postgres")]
mod pool {
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use std::time::Duration;

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }
}

#[cfg(feature = "postgres")]
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
