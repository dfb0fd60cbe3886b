use rusqlite::{OptionalExtension, params};

use super::{Catalog, Summary, ctx};
use crate::error::AppError;

impl Catalog {
    /// Create or replace the summary of `product_id`.
    pub fn upsert_summary(
        &self,
        product_id: &str,
        positive: Option<&str>,
        negative: Option<&str>,
    ) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO summaries (product_id, positive_sentiment, negative_sentiment)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(product_id) DO UPDATE SET
                positive_sentiment = excluded.positive_sentiment,
                negative_sentiment = excluded.negative_sentiment",
            params![product_id, positive, negative],
        )
        .map_err(ctx("upsert_summary"))?;
        Ok(())
    }

    pub fn get_summary(&self, product_id: &str) -> Result<Option<Summary>, AppError> {
        let conn = self.open_conn()?;
        conn.query_row(
            "SELECT product_id, positive_sentiment, negative_sentiment
             FROM summaries WHERE product_id = ?1",
            params![product_id],
            |row| {
                Ok(Summary {
                    product_id: row.get(0)?,
                    positive_sentiment: row.get(1)?,
                    negative_sentiment: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(ctx("get_summary"))
    }

    /// Complete summaries of every product except `exclude_id`, ordered by
    /// product id.
    pub fn summaries_excluding(&self, exclude_id: &str) -> Result<Vec<Summary>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT product_id, positive_sentiment, negative_sentiment
                 FROM summaries
                 WHERE product_id != ?1
                   AND positive_sentiment IS NOT NULL
                   AND negative_sentiment IS NOT NULL
                 ORDER BY product_id",
            )
            .map_err(ctx("prepare summaries_excluding"))?;
        let rows = stmt
            .query_map(params![exclude_id], |row| {
                Ok(Summary {
                    product_id: row.get(0)?,
                    positive_sentiment: row.get(1)?,
                    negative_sentiment: row.get(2)?,
                })
            })
            .map_err(ctx("query summaries_excluding"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map summaries_excluding"))
    }

    pub fn count_summaries(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM summaries
                 WHERE positive_sentiment IS NOT NULL AND negative_sentiment IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(ctx("count_summaries"))?;
        Ok(n as usize)
    }
}
