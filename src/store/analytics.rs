//! Recommendation feedback and strategy timing records.

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

use super::{Catalog, ctx, now_iso8601};
use crate::error::AppError;

/// One timing sample of both strategies for one product.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceRecord {
    pub id: i64,
    pub product_id: String,
    /// Seconds spent in the summary strategy.
    pub summary_time: f64,
    /// Seconds spent in the review-text strategy.
    pub reviews_time: f64,
    pub num_reviews: usize,
    pub recorded_at: String,
}

/// Aggregates over every timing sample. Averages are `None` with no samples.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceOverview {
    pub total_runs: usize,
    pub products_measured: usize,
    pub avg_summary_time: Option<f64>,
    pub avg_reviews_time: Option<f64>,
    pub min_summary_time: Option<f64>,
    pub max_summary_time: Option<f64>,
    pub min_reviews_time: Option<f64>,
    pub max_reviews_time: Option<f64>,
    pub avg_num_reviews: Option<f64>,
    /// Runs where the summary strategy finished first.
    pub summary_faster_runs: usize,
}

impl PerformanceOverview {
    /// How many times faster the summary strategy is on average.
    pub fn speedup(&self) -> Option<f64> {
        match (self.avg_summary_time, self.avg_reviews_time) {
            (Some(s), Some(r)) if s > 0.0 => Some(r / s),
            _ => None,
        }
    }
}

/// Average timings of products grouped by their review count.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewBucket {
    pub label: &'static str,
    pub runs: usize,
    pub avg_summary_time: f64,
    pub avg_reviews_time: f64,
}

/// Lower bounds (inclusive) and labels of the review-count buckets.
const BUCKETS: [(i64, &str); 4] = [(0, "0-9"), (10, "10-49"), (50, "50-199"), (200, "200+")];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub good: usize,
    pub bad: usize,
}

impl Catalog {
    pub fn record_feedback(
        &self,
        initial_product_id: &str,
        recommended_product_id: &str,
        good_recommendation: bool,
    ) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO feedback
                (initial_product_id, recommended_product_id, good_recommendation, created_at_unix)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                initial_product_id,
                recommended_product_id,
                good_recommendation,
                Utc::now().timestamp()
            ],
        )
        .map_err(ctx("record_feedback"))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn feedback_stats(&self) -> Result<FeedbackStats, AppError> {
        let conn = self.open_conn()?;
        let (total, good): (i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), SUM(good_recommendation) FROM feedback",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(ctx("feedback_stats"))?;
        let good = good.unwrap_or(0) as usize;
        let total = total as usize;
        Ok(FeedbackStats {
            total,
            good,
            bad: total - good,
        })
    }

    pub fn record_performance(
        &self,
        product_id: &str,
        summary_time: f64,
        reviews_time: f64,
        num_reviews: usize,
    ) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO recommendation_performance
                (product_id, summary_time, reviews_time, num_reviews, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                product_id,
                summary_time,
                reviews_time,
                num_reviews as i64,
                now_iso8601()
            ],
        )
        .map_err(ctx("record_performance"))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn performance_overview(&self) -> Result<PerformanceOverview, AppError> {
        let conn = self.open_conn()?;
        conn.query_row(
            "SELECT COUNT(*),
                    COUNT(DISTINCT product_id),
                    AVG(summary_time), AVG(reviews_time),
                    MIN(summary_time), MAX(summary_time),
                    MIN(reviews_time), MAX(reviews_time),
                    AVG(num_reviews),
                    COALESCE(SUM(CASE WHEN summary_time < reviews_time THEN 1 ELSE 0 END), 0)
             FROM recommendation_performance",
            [],
            |row| {
                Ok(PerformanceOverview {
                    total_runs: row.get::<_, i64>(0)? as usize,
                    products_measured: row.get::<_, i64>(1)? as usize,
                    avg_summary_time: row.get(2)?,
                    avg_reviews_time: row.get(3)?,
                    min_summary_time: row.get(4)?,
                    max_summary_time: row.get(5)?,
                    min_reviews_time: row.get(6)?,
                    max_reviews_time: row.get(7)?,
                    avg_num_reviews: row.get(8)?,
                    summary_faster_runs: row.get::<_, i64>(9)? as usize,
                })
            },
        )
        .map_err(ctx("performance_overview"))
    }

    /// The `n` most recent samples, newest first.
    pub fn recent_performance(&self, n: usize) -> Result<Vec<PerformanceRecord>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, product_id, summary_time, reviews_time, num_reviews, recorded_at
                 FROM recommendation_performance
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(ctx("prepare recent_performance"))?;
        let rows = stmt
            .query_map(params![n as i64], |row| {
                Ok(PerformanceRecord {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    summary_time: row.get(2)?,
                    reviews_time: row.get(3)?,
                    num_reviews: row.get::<_, i64>(4)? as usize,
                    recorded_at: row.get(5)?,
                })
            })
            .map_err(ctx("query recent_performance"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map recent_performance"))
    }

    /// Average timings per review-count bucket. Empty buckets are omitted.
    pub fn performance_by_review_bucket(&self) -> Result<Vec<ReviewBucket>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT COUNT(*), AVG(summary_time), AVG(reviews_time)
                 FROM recommendation_performance
                 WHERE num_reviews >= ?1 AND num_reviews < ?2",
            )
            .map_err(ctx("prepare performance_by_review_bucket"))?;

        let mut buckets = Vec::new();
        for (i, &(lower, label)) in BUCKETS.iter().enumerate() {
            let upper = BUCKETS.get(i + 1).map(|(b, _)| *b).unwrap_or(i64::MAX);
            let (runs, avg_s, avg_r): (i64, Option<f64>, Option<f64>) = stmt
                .query_row(params![lower, upper], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .map_err(ctx("performance_by_review_bucket"))?;
            if runs > 0 {
                buckets.push(ReviewBucket {
                    label,
                    runs: runs as usize,
                    avg_summary_time: avg_s.unwrap_or(0.0),
                    avg_reviews_time: avg_r.unwrap_or(0.0),
                });
            }
        }
        Ok(buckets)
    }

    /// Keep only the newest sample per product. Returns rows removed.
    pub fn dedupe_performance(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "DELETE FROM recommendation_performance
             WHERE id NOT IN (
                 SELECT MAX(id) FROM recommendation_performance GROUP BY product_id
             )",
            [],
        )
        .map_err(ctx("dedupe_performance"))
    }
}
