//! `store`: SQLite catalog of products, reviews, AI summaries, recommendation
//! feedback and recommendation timing records.
//!
//! [`Catalog`] is a cheap handle holding the database path. Each operation
//! opens its own connection, so a `Catalog` can be cloned into blocking tasks
//! freely; callers on the async side wrap calls in `spawn_blocking`.

mod analytics;
mod products;
mod reviews;
mod summaries;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::AppError;

pub use analytics::{FeedbackStats, PerformanceOverview, PerformanceRecord, ReviewBucket};

const SCHEMA_VERSION: i64 = 1;

/// Username stored when a review carries none.
pub const DEFAULT_USERNAME: &str = "default user";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub image_url: String,
    pub price: Option<f64>,
}

/// A review as it is about to be inserted.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: String,
    pub review_id: i64,
    pub review_title: Option<String>,
    pub review_username: String,
    /// 1..=5; the schema rejects anything else.
    pub review_score: u8,
    pub review_text: Option<String>,
    pub created_at_unix: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: i64,
    pub product_id: String,
    pub review_id: i64,
    pub review_title: Option<String>,
    pub review_username: String,
    pub review_score: u8,
    pub review_text: Option<String>,
    pub created_at_unix: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub product_id: String,
    pub positive_sentiment: Option<String>,
    pub negative_sentiment: Option<String>,
}

impl Summary {
    /// Both sentiments present: the only summaries the engine can compare.
    pub fn is_complete(&self) -> bool {
        self.positive_sentiment.is_some() && self.negative_sentiment.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    db_path: PathBuf,
}

impl Catalog {
    /// Open (creating if needed) the catalog database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("catalog: cannot create {}: {e}", parent.display()))
            })?;
        }
        let catalog = Self {
            db_path: db_path.to_path_buf(),
        };
        catalog.init_db()?;
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("catalog: read schema version: {e}")))?;

        if version == 0 {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS products (
                    product_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    image_url TEXT NOT NULL DEFAULT '',
                    price REAL
                );

                CREATE TABLE IF NOT EXISTS reviews (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    product_id TEXT NOT NULL REFERENCES products(product_id) ON DELETE CASCADE,
                    review_id INTEGER NOT NULL,
                    review_title TEXT,
                    review_username TEXT NOT NULL DEFAULT 'default user',
                    review_score INTEGER NOT NULL CHECK (review_score BETWEEN 1 AND 5),
                    review_text TEXT,
                    created_at_unix INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_reviews_product ON reviews(product_id);

                CREATE TABLE IF NOT EXISTS summaries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    product_id TEXT NOT NULL UNIQUE REFERENCES products(product_id) ON DELETE CASCADE,
                    positive_sentiment TEXT,
                    negative_sentiment TEXT
                );

                CREATE TABLE IF NOT EXISTS feedback (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    initial_product_id TEXT NOT NULL REFERENCES products(product_id) ON DELETE CASCADE,
                    recommended_product_id TEXT NOT NULL,
                    good_recommendation INTEGER NOT NULL,
                    created_at_unix INTEGER
                );

                CREATE TABLE IF NOT EXISTS recommendation_performance (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    product_id TEXT NOT NULL REFERENCES products(product_id) ON DELETE CASCADE,
                    summary_time REAL NOT NULL,
                    reviews_time REAL NOT NULL,
                    num_reviews INTEGER NOT NULL,
                    recorded_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_performance_product
                    ON recommendation_performance(product_id);

                PRAGMA user_version = 1;
                ",
            )
            .map_err(|e| AppError::Store(format!("catalog: initialize schema: {e}")))?;
            return Ok(());
        }

        if version != SCHEMA_VERSION {
            return Err(AppError::Store(format!(
                "catalog: unsupported schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }

        Ok(())
    }

    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            AppError::Store(format!("catalog: open {}: {e}", self.db_path.display()))
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("catalog: set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| AppError::Store(format!("catalog: set foreign_keys ON: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("catalog: set busy_timeout: {e}")))?;

        Ok(conn)
    }
}

/// Wrap a rusqlite error with the failing operation's name.
fn ctx(op: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Store(format!("catalog: {op}: {e}"))
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
