use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::llm::quiz::QuizItem;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Stored quiz for report {id} is not valid JSON: {source}")]
    CorruptQuiz {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A finished research artifact. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: String,
    pub topic: String,
    pub summary: String,
    pub quiz: Vec<QuizItem>,
    pub created_at: DateTime<Utc>,
}

/// Report store over SQLite.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Connection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self { conn: Arc::new(conn) };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS reports (
                        id TEXT PRIMARY KEY,
                        topic TEXT NOT NULL,
                        summary TEXT NOT NULL,
                        quiz_json TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );",
                )?;
                Ok(())
            })
            .await?;

        tracing::info!("Report database initialized");
        Ok(())
    }

    /// Inserts a new report and returns its generated id.
    pub async fn save_report(&self, topic: &str, summary: &str, quiz: &[QuizItem]) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let quiz_json = serde_json::to_string(quiz).map_err(|source| DatabaseError::CorruptQuiz {
            id: id.clone(),
            source,
        })?;
        let created_at = Utc::now().to_rfc3339();

        let row = [id.clone(), topic.to_string(), summary.to_string(), quiz_json, created_at];
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO reports (id, topic, summary, quiz_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    [&row[0], &row[1], &row[2], &row[3], &row[4]],
                )?;
                Ok(())
            })
            .await?;

        tracing::info!("Report for '{}' saved with id {}", topic, id);
        Ok(id)
    }

    pub async fn get_report(&self, id: &str) -> Result<Option<Report>, DatabaseError> {
        let key = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, topic, summary, quiz_json, created_at FROM reports WHERE id = ?1")?;
                let mut rows = stmt.query([&key])?;

                if let Some(row) = rows.next()? {
                    Ok(Some((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    )))
                } else {
                    Ok(None)
                }
            })
            .await?;

        let Some((id, topic, summary, quiz_json, created_at)) = row else {
            return Ok(None);
        };

        let quiz = serde_json::from_str(&quiz_json).map_err(|source| DatabaseError::CorruptQuiz {
            id: id.clone(),
            source,
        })?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                tracing::warn!("Report {} has unreadable timestamp {}: {}", id, created_at, e);
                DateTime::<Utc>::MIN_UTC
            });

        Ok(Some(Report {
            id,
            topic,
            summary,
            quiz,
            created_at,
        }))
    }

    pub async fn count_reports(&self) -> Result<usize, DatabaseError> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;

        Ok(count as usize)
    }
}
