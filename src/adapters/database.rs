use crate::domain::model::KeypointRow;
use crate::domain::ports::KeypointSink;
use crate::utils::error::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// SQLite store of flattened keypoints, keyed by (video, frame, landmark).
pub struct KeypointDatabase {
    pool: SqlitePool,
    location: PathBuf,
}

impl KeypointDatabase {
    /// Opens the database file, creating it and its directory when missing.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            location: path.to_path_buf(),
        })
    }

    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // a single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            location: PathBuf::from(":memory:"),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub async fn count_rows(&self, video_name: Option<&str>) -> Result<i64> {
        let count = match video_name {
            Some(name) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM normalized_keypoints WHERE video_name = ?",
                )
                .bind(name)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM normalized_keypoints")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count)
    }

    /// Distinct frame indices stored for a video, ascending.
    pub async fn frames_for_video(&self, video_name: &str) -> Result<Vec<i64>> {
        let frames = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT frame FROM normalized_keypoints
            WHERE video_name = ?
            ORDER BY frame
            "#,
        )
        .bind(video_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(frames)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeypointSink for KeypointDatabase {
    async fn setup(&self) -> Result<()> {
        tracing::info!("Setting up database at: {}", self.location.display());

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS normalized_keypoints (
                video_name TEXT,
                frame INTEGER,
                landmark_id INTEGER,
                landmark_name TEXT,
                x REAL,
                y REAL,
                z REAL,
                visibility REAL,
                processed_at TEXT,
                PRIMARY KEY (video_name, frame, landmark_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database ready.");
        Ok(())
    }

    async fn insert_rows(&self, rows: &[KeypointRow]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO normalized_keypoints (
                    video_name, frame, landmark_id, landmark_name,
                    x, y, z, visibility, processed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.video_name)
            .bind(row.frame as i64)
            .bind(row.landmark_id as i64)
            .bind(&row.landmark_name)
            .bind(row.x)
            .bind(row.y)
            .bind(row.z)
            .bind(row.visibility)
            .bind(&row.processed_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
