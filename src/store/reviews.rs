use rusqlite::{Row, params};

use super::{Catalog, NewReview, Product, Review, ctx};
use crate::error::AppError;

fn map_review(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        product_id: row.get(1)?,
        review_id: row.get(2)?,
        review_title: row.get(3)?,
        review_username: row.get(4)?,
        review_score: row.get(5)?,
        review_text: row.get(6)?,
        created_at_unix: row.get(7)?,
    })
}

const INSERT_REVIEW: &str = "INSERT INTO reviews
    (product_id, review_id, review_title, review_username, review_score, review_text, created_at_unix)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

impl Catalog {
    pub fn insert_review(&self, review: &NewReview) -> Result<i64, AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            INSERT_REVIEW,
            params![
                review.product_id,
                review.review_id,
                review.review_title,
                review.review_username,
                review.review_score,
                review.review_text,
                review.created_at_unix,
            ],
        )
        .map_err(ctx("insert_review"))?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of reviews in a single transaction.
    pub fn insert_reviews(&self, reviews: &[NewReview]) -> Result<usize, AppError> {
        if reviews.is_empty() {
            return Ok(0);
        }
        let mut conn = self.open_conn()?;
        let tx = conn.transaction().map_err(ctx("begin insert_reviews"))?;
        {
            let mut stmt = tx.prepare(INSERT_REVIEW).map_err(ctx("prepare insert_reviews"))?;
            for r in reviews {
                stmt.execute(params![
                    r.product_id,
                    r.review_id,
                    r.review_title,
                    r.review_username,
                    r.review_score,
                    r.review_text,
                    r.created_at_unix,
                ])
                .map_err(ctx("insert_reviews row"))?;
            }
        }
        tx.commit().map_err(ctx("commit insert_reviews"))?;
        Ok(reviews.len())
    }

    /// Reviews for one product, newest first.
    pub fn reviews_for_product(
        &self,
        product_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Review>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, product_id, review_id, review_title, review_username,
                        review_score, review_text, created_at_unix
                 FROM reviews
                 WHERE product_id = ?1
                 ORDER BY created_at_unix IS NULL, created_at_unix DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )
            .map_err(ctx("prepare reviews_for_product"))?;
        let rows = stmt
            .query_map(params![product_id, limit as i64, offset as i64], map_review)
            .map_err(ctx("query reviews_for_product"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map reviews_for_product"))
    }

    pub fn count_reviews(&self, product_id: &str) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM reviews WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .map_err(ctx("count_reviews"))?;
        Ok(n as usize)
    }

    pub fn count_all_reviews(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))
            .map_err(ctx("count_all_reviews"))?;
        Ok(n as usize)
    }

    /// Non-empty review texts of one product, in insertion order.
    pub fn review_texts_for_product(&self, product_id: &str) -> Result<Vec<String>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT review_text FROM reviews
                 WHERE product_id = ?1 AND review_text IS NOT NULL AND review_text != ''
                 ORDER BY id",
            )
            .map_err(ctx("prepare review_texts_for_product"))?;
        let rows = stmt
            .query_map(params![product_id], |row| row.get::<_, String>(0))
            .map_err(ctx("query review_texts_for_product"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map review_texts_for_product"))
    }

    /// `(product_id, review_text)` pairs for every product except
    /// `exclude_id`, capped at `row_limit` rows in insertion order.
    pub fn review_texts_excluding(
        &self,
        exclude_id: &str,
        row_limit: usize,
    ) -> Result<Vec<(String, String)>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT product_id, review_text FROM reviews
                 WHERE product_id != ?1 AND review_text IS NOT NULL AND review_text != ''
                 ORDER BY id
                 LIMIT ?2",
            )
            .map_err(ctx("prepare review_texts_excluding"))?;
        let rows = stmt
            .query_map(params![exclude_id, row_limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(ctx("query review_texts_excluding"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map review_texts_excluding"))
    }

    /// Products other than `exclude_id` that appear among the first
    /// `row_limit` non-empty reviews, ordered by id, at most `limit`.
    pub fn products_with_reviews(
        &self,
        exclude_id: &str,
        row_limit: usize,
        limit: usize,
    ) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT p.product_id, p.name, p.image_url, p.price
                 FROM products p
                 WHERE p.product_id != ?1
                   AND p.product_id IN (
                       SELECT product_id FROM reviews
                       WHERE review_text IS NOT NULL AND review_text != ''
                       ORDER BY id
                       LIMIT ?2
                   )
                 ORDER BY p.product_id
                 LIMIT ?3",
            )
            .map_err(ctx("prepare products_with_reviews"))?;
        let rows = stmt
            .query_map(params![exclude_id, row_limit as i64, limit as i64], |row| {
                Ok(Product {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    image_url: row.get(2)?,
                    price: row.get(3)?,
                })
            })
            .map_err(ctx("query products_with_reviews"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map products_with_reviews"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn insert_and_page_reviews_newest_first() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A", "Pan")).unwrap();
        let mut batch = Vec::new();
        for ts in [100, 300, 200] {
            let mut r = review("A", &format!("review at {ts}"));
            r.created_at_unix = Some(ts);
            batch.push(r);
        }
        assert_eq!(catalog.insert_reviews(&batch).unwrap(), 3);
        assert_eq!(catalog.count_reviews("A").unwrap(), 3);

        let page = catalog.reviews_for_product("A", 2, 0).unwrap();
        let stamps: Vec<_> = page.iter().map(|r| r.created_at_unix).collect();
        assert_eq!(stamps, vec![Some(300), Some(200)]);
        assert_eq!(catalog.reviews_for_product("A", 2, 2).unwrap().len(), 1);
    }

    #[test]
    fn review_for_unknown_product_is_rejected() {
        let (_t, catalog) = make_catalog();
        assert!(catalog.insert_review(&review("missing", "text")).is_err());
    }

    #[test]
    fn score_outside_range_is_rejected() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A", "Pan")).unwrap();
        let mut r = review("A", "bad score");
        r.review_score = 9;
        assert!(catalog.insert_review(&r).is_err());
    }

    #[test]
    fn batch_insert_is_atomic() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A", "Pan")).unwrap();
        let batch = vec![review("A", "fine"), review("ghost", "orphan")];
        assert!(catalog.insert_reviews(&batch).is_err());
        assert_eq!(catalog.count_reviews("A").unwrap(), 0);
    }

    #[test]
    fn texts_skip_empty_and_null() {
        let (_t, catalog) = make_catalog();
        catalog
            .upsert_products(&[product("A", "Pan"), product("B", "Pot")])
            .unwrap();
        let mut empty = review("A", "");
        let mut null = review("A", "x");
        null.review_text = None;
        empty.review_title = None;
        catalog
            .insert_reviews(&[review("A", "sturdy"), empty, null, review("B", "leaks")])
            .unwrap();

        assert_eq!(catalog.review_texts_for_product("A").unwrap(), vec!["sturdy"]);
        let others = catalog.review_texts_excluding("A", 100).unwrap();
        assert_eq!(others, vec![("B".to_string(), "leaks".to_string())]);
    }

    #[test]
    fn products_with_reviews_excludes_target() {
        let (_t, catalog) = make_catalog();
        catalog
            .upsert_products(&[product("A", "a"), product("B", "b"), product("C", "c")])
            .unwrap();
        catalog
            .insert_reviews(&[review("C", "one"), review("A", "two"), review("B", "")])
            .unwrap();
        let ids: Vec<_> = catalog
            .products_with_reviews("A", 100, 10)
            .unwrap()
            .into_iter()
            .map(|p| p.product_id)
            .collect();
        assert_eq!(ids, vec!["C"]);
    }
}
