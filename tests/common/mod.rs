//! Shared fixtures for integration tests.

#![allow(dead_code)]

use tempfile::TempDir;

use product_recommender::store::{Catalog, DEFAULT_USERNAME, NewReview, Product};

pub fn catalog() -> (TempDir, Catalog) {
    let tmp = TempDir::new().expect("tempdir");
    let catalog = Catalog::open(&tmp.path().join("catalog.sqlite3")).expect("open catalog");
    (tmp, catalog)
}

pub fn product(id: &str, name: &str) -> Product {
    Product {
        product_id: id.into(),
        name: name.into(),
        image_url: format!("http://img.example/{id}.jpg"),
        price: Some(19.99),
    }
}

pub fn review(product_id: &str, review_id: i64, text: &str) -> NewReview {
    NewReview {
        product_id: product_id.into(),
        review_id,
        review_title: None,
        review_username: DEFAULT_USERNAME.into(),
        review_score: 4,
        review_text: Some(text.into()),
        created_at_unix: Some(review_id),
    }
}

/// Five kitchen products: kettles share vocabulary, pans share vocabulary,
/// the blender has reviews but no summary.
pub fn seed_kitchen(catalog: &Catalog) {
    catalog
        .upsert_products(&[
            product("K1", "Electric Kettle"),
            product("K2", "Stovetop Kettle"),
            product("P1", "Nonstick Frying Pan"),
            product("P2", "Cast Iron Skillet"),
            product("B1", "Countertop Blender"),
        ])
        .expect("seed products");

    let reviews = [
        ("K1", "boils water quickly, kettle whistle loud, handle stays cool"),
        ("K1", "kettle boils water fast"),
        ("K2", "kettle boils water slowly on gas stove, whistle loud"),
        ("K2", "nice whistle kettle"),
        ("K2", "kettle handle gets hot"),
        ("P1", "eggs slide right off the nonstick pan coating"),
        ("P2", "skillet sears steak, heavy cast iron pan"),
        ("B1", "blender crushes ice and makes smoothies"),
    ];
    let rows: Vec<NewReview> = reviews
        .iter()
        .enumerate()
        .map(|(i, (pid, text))| review(pid, 1_300_000_000 + i as i64, text))
        .collect();
    catalog.insert_reviews(&rows).expect("seed reviews");

    for (pid, pos, neg) in [
        ("K1", "boils water quickly", "whistle is loud"),
        ("K2", "boils water on any stove", "whistle loud and handle hot"),
        ("P1", "eggs slide off the coating", "coating scratches"),
        ("P2", "sears steak evenly", "very heavy pan"),
    ] {
        catalog.upsert_summary(pid, Some(pos), Some(neg)).expect("seed summary");
    }
}
