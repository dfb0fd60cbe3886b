use rand::Rng;
use rusqlite::{OptionalExtension, Row, params};

use super::{Catalog, Product, ctx};
use crate::error::AppError;

const PRODUCT_COLUMNS: &str = "product_id, name, image_url, price";

fn map_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
        price: row.get(3)?,
    })
}

/// Escape `%`, `_` and `\` so user input matches literally inside `LIKE`.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

impl Catalog {
    /// Insert or update a product by id.
    pub fn upsert_product(&self, product: &Product) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO products (product_id, name, image_url, price) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(product_id) DO UPDATE SET
                name = excluded.name,
                image_url = excluded.image_url,
                price = excluded.price",
            params![product.product_id, product.name, product.image_url, product.price],
        )
        .map_err(ctx("upsert_product"))?;
        Ok(())
    }

    /// Upsert many products in one transaction.
    pub fn upsert_products(&self, products: &[Product]) -> Result<(), AppError> {
        if products.is_empty() {
            return Ok(());
        }
        let mut conn = self.open_conn()?;
        let tx = conn.transaction().map_err(ctx("begin upsert_products"))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO products (product_id, name, image_url, price) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(product_id) DO UPDATE SET
                        name = excluded.name,
                        image_url = excluded.image_url,
                        price = excluded.price",
                )
                .map_err(ctx("prepare upsert_products"))?;
            for p in products {
                stmt.execute(params![p.product_id, p.name, p.image_url, p.price])
                    .map_err(ctx("upsert_products row"))?;
            }
        }
        tx.commit().map_err(ctx("commit upsert_products"))?;
        Ok(())
    }

    pub fn get_product(&self, product_id: &str) -> Result<Option<Product>, AppError> {
        let conn = self.open_conn()?;
        conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"),
            params![product_id],
            map_product,
        )
        .optional()
        .map_err(ctx("get_product"))
    }

    /// Fetch products by id, preserving the order of `ids` and skipping
    /// ids that no longer exist.
    pub fn products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ?1"))
            .map_err(ctx("prepare products_by_ids"))?;
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = stmt
                .query_row(params![id], map_product)
                .optional()
                .map_err(ctx("products_by_ids"))?
            {
                products.push(p);
            }
        }
        Ok(products)
    }

    /// All product ids, ascending.
    pub fn product_ids(&self) -> Result<Vec<String>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare("SELECT product_id FROM products ORDER BY product_id")
            .map_err(ctx("prepare product_ids"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(ctx("query product_ids"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map product_ids"))
    }

    pub fn count_products(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .map_err(ctx("count_products"))?;
        Ok(n as usize)
    }

    /// A uniformly random product, or `None` when the catalog is empty.
    pub fn random_product(&self) -> Result<Option<Product>, AppError> {
        let total = self.count_products()?;
        if total == 0 {
            return Ok(None);
        }
        let offset = rand::thread_rng().gen_range(0..total) as i64;
        let conn = self.open_conn()?;
        conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY product_id LIMIT 1 OFFSET ?1"),
            params![offset],
            map_product,
        )
        .optional()
        .map_err(ctx("random_product"))
    }

    /// Up to `n` random products that have a complete AI summary.
    pub fn featured_products(&self, n: usize) -> Result<Vec<Product>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT p.product_id, p.name, p.image_url, p.price
                 FROM products p
                 JOIN summaries s ON s.product_id = p.product_id
                 WHERE s.positive_sentiment IS NOT NULL AND s.negative_sentiment IS NOT NULL
                 ORDER BY RANDOM()
                 LIMIT ?1",
            )
            .map_err(ctx("prepare featured_products"))?;
        let rows = stmt
            .query_map(params![n as i64], map_product)
            .map_err(ctx("query featured_products"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map featured_products"))
    }

    /// Case-insensitive substring search on product name, ordered by name.
    pub fn search_products(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>, AppError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY name, product_id
                 LIMIT ?2 OFFSET ?3"
            ))
            .map_err(ctx("prepare search_products"))?;
        let rows = stmt
            .query_map(
                params![like_pattern(query), limit as i64, offset as i64],
                map_product,
            )
            .map_err(ctx("query search_products"))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ctx("map search_products"))
    }

    pub fn count_search(&self, query: &str) -> Result<usize, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(0);
        }
        let conn = self.open_conn()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM products WHERE name LIKE ?1 ESCAPE '\\'",
                params![like_pattern(query)],
                |row| row.get(0),
            )
            .map_err(ctx("count_search"))?;
        Ok(n as usize)
    }

    /// Delete every product that has no reviews. Summaries, feedback and
    /// timing rows of deleted products cascade. Returns the number deleted.
    pub fn delete_products_without_reviews(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM products
                 WHERE product_id NOT IN (SELECT DISTINCT product_id FROM reviews)",
                [],
            )
            .map_err(ctx("delete_products_without_reviews"))?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn upsert_updates_existing_row() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A1", "Kettle")).unwrap();
        let mut changed = product("A1", "Electric Kettle");
        changed.price = None;
        catalog.upsert_product(&changed).unwrap();

        assert_eq!(catalog.count_products().unwrap(), 1);
        let got = catalog.get_product("A1").unwrap().unwrap();
        assert_eq!(got.name, "Electric Kettle");
        assert_eq!(got.price, None);
    }

    #[test]
    fn get_missing_product_is_none() {
        let (_t, catalog) = make_catalog();
        assert!(catalog.get_product("nope").unwrap().is_none());
    }

    #[test]
    fn search_is_case_insensitive_and_paginated() {
        let (_t, catalog) = make_catalog();
        catalog
            .upsert_products(&[
                product("A", "Chef Knife"),
                product("B", "Bread knife"),
                product("C", "Cutting Board"),
                product("D", "KNIFE block"),
            ])
            .unwrap();

        assert_eq!(catalog.count_search("knife").unwrap(), 3);
        let first = catalog.search_products("knife", 2, 0).unwrap();
        let names: Vec<_> = first.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bread knife", "Chef Knife"]);
        let second = catalog.search_products("knife", 2, 2).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].product_id, "D");
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let (_t, catalog) = make_catalog();
        catalog
            .upsert_products(&[product("A", "100% cotton towel"), product("B", "Towel rack")])
            .unwrap();
        let hits = catalog.search_products("100%", 10, 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(catalog.search_products("   ", 10, 0).unwrap().is_empty());
        assert_eq!(catalog.count_search("_").unwrap(), 0);
    }

    #[test]
    fn random_product_on_empty_catalog() {
        let (_t, catalog) = make_catalog();
        assert!(catalog.random_product().unwrap().is_none());
        catalog.upsert_product(&product("ONLY", "Only one")).unwrap();
        assert_eq!(catalog.random_product().unwrap().unwrap().product_id, "ONLY");
    }

    #[test]
    fn products_by_ids_preserves_order_and_skips_missing() {
        let (_t, catalog) = make_catalog();
        catalog
            .upsert_products(&[product("A", "a"), product("B", "b"), product("C", "c")])
            .unwrap();
        let ids = vec!["C".to_string(), "X".to_string(), "A".to_string()];
        let got: Vec<_> = catalog
            .products_by_ids(&ids)
            .unwrap()
            .into_iter()
            .map(|p| p.product_id)
            .collect();
        assert_eq!(got, vec!["C", "A"]);
    }

    #[test]
    fn delete_products_without_reviews_cascades() {
        let (_t, catalog) = make_catalog();
        catalog
            .upsert_products(&[product("A", "reviewed"), product("B", "lonely")])
            .unwrap();
        catalog.insert_review(&review("A", "great")).unwrap();
        catalog.upsert_summary("B", Some("p"), Some("n")).unwrap();

        assert_eq!(catalog.delete_products_without_reviews().unwrap(), 1);
        assert_eq!(catalog.product_ids().unwrap(), vec!["A"]);
        assert!(catalog.get_summary("B").unwrap().is_none());
    }
}
