use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::de::{self, SeqAccess, Visitor};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::store::{Catalog, DEFAULT_USERNAME, NewReview, Product};

const BATCH_SIZE: usize = 1000;
const PROGRESS_EVERY: usize = 10_000;

/// Category that marks a metadata item as part of the catalog.
pub const CATALOG_CATEGORY: &str = "Home & Kitchen";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Rows written to the catalog.
    pub processed: usize,
    /// Items missing a required field (`title` for products).
    pub skipped: usize,
    /// Well-formed items outside the catalog (wrong category, unknown product).
    pub filtered: usize,
    /// Items that could not be mapped or stored.
    pub failed: usize,
}

/// Stream the items of a top-level JSON array through `f` without
/// materialising the array. Returns the number of items seen.
///
/// An error from `f` aborts the walk and is returned as-is.
pub fn for_each_item<R, F>(reader: R, mut f: F) -> Result<usize, AppError>
where
    R: Read,
    F: FnMut(Value) -> Result<(), AppError>,
{
    let mut failure = None;
    let mut de = serde_json::Deserializer::from_reader(reader);
    let outcome = serde::Deserializer::deserialize_seq(
        &mut de,
        EachItem { f: &mut f, failure: &mut failure },
    );
    if let Some(e) = failure {
        return Err(e);
    }
    let count = outcome.map_err(|e| AppError::Ingest(format!("malformed JSON array: {e}")))?;
    de.end()
        .map_err(|e| AppError::Ingest(format!("trailing data after JSON array: {e}")))?;
    Ok(count)
}

struct EachItem<'a, F> {
    f: &'a mut F,
    failure: &'a mut Option<AppError>,
}

impl<'de, F> Visitor<'de> for EachItem<'_, F>
where
    F: FnMut(Value) -> Result<(), AppError>,
{
    type Value = usize;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<usize, A::Error> {
        let mut seen = 0;
        while let Some(item) = seq.next_element::<Value>()? {
            seen += 1;
            if let Err(e) = (self.f)(item) {
                *self.failure = Some(e);
                return Err(de::Error::custom("aborted by item handler"));
            }
        }
        Ok(seen)
    }
}

fn open_json(path: &Path) -> Result<BufReader<File>, AppError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| AppError::Ingest(format!("cannot open {}: {e}", path.display())))
}

enum ProductItem {
    Keep(Product),
    Untitled,
    OtherCategory,
}

fn in_catalog_category(item: &Value) -> bool {
    item.get("categories")
        .and_then(Value::as_array)
        .is_some_and(|lists| {
            lists.iter().filter_map(Value::as_array).any(|sub| {
                sub.iter().any(|c| c.as_str() == Some(CATALOG_CATEGORY))
            })
        })
}

fn product_from_item(item: &Value) -> Result<ProductItem, String> {
    let Some(title) = item.get("title").and_then(Value::as_str) else {
        return Ok(ProductItem::Untitled);
    };
    if !in_catalog_category(item) {
        return Ok(ProductItem::OtherCategory);
    }
    let asin = item
        .get("asin")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty())
        .ok_or("missing asin")?;
    Ok(ProductItem::Keep(Product {
        product_id: asin.to_string(),
        name: title.to_string(),
        image_url: item.get("imUrl").and_then(Value::as_str).unwrap_or_default().to_string(),
        price: item.get("price").and_then(Value::as_f64),
    }))
}

/// Load catalog products from the cleaned metadata array.
pub fn populate_products(catalog: &Catalog, json_path: &Path) -> Result<PopulateReport, AppError> {
    let reader = open_json(json_path)?;
    let mut report = PopulateReport::default();
    let mut batch: Vec<Product> = Vec::with_capacity(BATCH_SIZE);

    let seen = for_each_item(reader, |item| {
        match product_from_item(&item) {
            Ok(ProductItem::Keep(product)) => {
                batch.push(product);
                if batch.len() >= BATCH_SIZE {
                    flush_products(catalog, &mut batch, &mut report);
                }
            }
            Ok(ProductItem::Untitled) => report.skipped += 1,
            Ok(ProductItem::OtherCategory) => report.filtered += 1,
            Err(reason) => {
                warn!(%reason, "skipping metadata item");
                report.failed += 1;
            }
        }
        let handled = report.processed + report.skipped + report.filtered + report.failed + batch.len();
        if handled % PROGRESS_EVERY == 0 {
            debug!(handled, "metadata items handled");
        }
        Ok(())
    })?;
    flush_products(catalog, &mut batch, &mut report);

    info!(
        seen,
        processed = report.processed,
        skipped = report.skipped,
        filtered = report.filtered,
        failed = report.failed,
        "products populated"
    );
    Ok(report)
}

/// Write a batch; if the transaction fails, retry row by row so one bad
/// item does not sink its neighbours.
fn flush_products(catalog: &Catalog, batch: &mut Vec<Product>, report: &mut PopulateReport) {
    if batch.is_empty() {
        return;
    }
    match catalog.upsert_products(batch) {
        Ok(()) => report.processed += batch.len(),
        Err(e) => {
            warn!(error = %e, size = batch.len(), "product batch failed, retrying individually");
            for product in batch.iter() {
                match catalog.upsert_product(product) {
                    Ok(()) => report.processed += 1,
                    Err(e) => {
                        warn!(product_id = %product.product_id, error = %e, "product upsert failed");
                        report.failed += 1;
                    }
                }
            }
        }
    }
    batch.clear();
}

fn as_integer(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f.trunc() as i64))
}

fn review_from_item(item: &Value) -> Result<NewReview, String> {
    let asin = item
        .get("asin")
        .and_then(Value::as_str)
        .ok_or("missing asin")?;
    let review_time = item
        .get("unixReviewTime")
        .and_then(as_integer)
        .ok_or("missing unixReviewTime")?;
    let score = item
        .get("overall")
        .and_then(as_integer)
        .unwrap_or(1)
        .clamp(1, 5) as u8;
    let text = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(NewReview {
        product_id: asin.to_string(),
        review_id: review_time,
        review_title: text("summary"),
        review_username: text("reviewerName")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
        review_score: score,
        review_text: text("reviewText"),
        created_at_unix: Some(review_time),
    })
}

/// Load reviews for products already in the catalog from the cleaned review
/// array. Reviews of unknown products are counted as filtered.
pub fn populate_reviews(catalog: &Catalog, json_path: &Path) -> Result<PopulateReport, AppError> {
    let known: HashSet<String> = catalog.product_ids()?.into_iter().collect();
    info!(products = known.len(), "loading reviews for known products");

    let reader = open_json(json_path)?;
    let mut report = PopulateReport::default();
    let mut batch: Vec<NewReview> = Vec::with_capacity(BATCH_SIZE);

    let seen = for_each_item(reader, |item| {
        let asin = item.get("asin").and_then(Value::as_str);
        if !asin.is_some_and(|a| known.contains(a)) {
            report.filtered += 1;
            return Ok(());
        }
        match review_from_item(&item) {
            Ok(review) => {
                batch.push(review);
                if batch.len() >= BATCH_SIZE {
                    flush_reviews(catalog, &mut batch, &mut report);
                }
            }
            Err(reason) => {
                warn!(%reason, "skipping review item");
                report.failed += 1;
            }
        }
        Ok(())
    })?;
    flush_reviews(catalog, &mut batch, &mut report);

    info!(
        seen,
        processed = report.processed,
        filtered = report.filtered,
        failed = report.failed,
        "reviews populated"
    );
    Ok(report)
}

fn flush_reviews(catalog: &Catalog, batch: &mut Vec<NewReview>, report: &mut PopulateReport) {
    if batch.is_empty() {
        return;
    }
    match catalog.insert_reviews(batch) {
        Ok(n) => report.processed += n,
        Err(e) => {
            warn!(error = %e, size = batch.len(), "review batch failed, retrying individually");
            for review in batch.iter() {
                match catalog.insert_review(review) {
                    Ok(_) => report.processed += 1,
                    Err(e) => {
                        warn!(product_id = %review.product_id, error = %e, "review insert failed");
                        report.failed += 1;
                    }
                }
            }
        }
    }
    batch.clear();
}

/// Drop products nobody reviewed. Returns how many were removed.
pub fn remove_products_with_zero_reviews(catalog: &Catalog) -> Result<usize, AppError> {
    let removed = catalog.delete_products_without_reviews()?;
    info!(removed, "removed products without reviews");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;
    use serde_json::json;

    #[test]
    fn streams_array_items_in_order() {
        let mut seen = Vec::new();
        let n = for_each_item(r#"[{"a":1}, [2], "three"]"#.as_bytes(), |v| {
            seen.push(v);
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(seen, vec![json!({"a": 1}), json!([2]), json!("three")]);
    }

    #[test]
    fn handler_error_is_returned_unchanged() {
        let err = for_each_item("[1, 2, 3]".as_bytes(), |v| {
            if v == json!(2) {
                Err(AppError::Store("disk full".into()))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Store(ref m) if m == "disk full"));
    }

    #[test]
    fn non_array_input_is_an_error() {
        assert!(for_each_item(r#"{"a": 1}"#.as_bytes(), |_| Ok(())).is_err());
        assert!(for_each_item("[1, 2".as_bytes(), |_| Ok(())).is_err());
        assert!(for_each_item("[1] [2]".as_bytes(), |_| Ok(())).is_err());
    }

    #[test]
    fn product_mapping_filters_by_category() {
        let item = json!({
            "asin": "A1", "title": "Kettle", "imUrl": "http://i/1.jpg", "price": 12.5,
            "categories": [["Books"], ["Home & Kitchen", "Kitchen & Dining"]]
        });
        let ProductItem::Keep(p) = product_from_item(&item).unwrap() else {
            panic!("expected a product");
        };
        assert_eq!(p.product_id, "A1");
        assert_eq!(p.price, Some(12.5));

        let other = json!({"asin": "A2", "title": "Novel", "categories": [["Books"]]});
        assert!(matches!(product_from_item(&other), Ok(ProductItem::OtherCategory)));
        let untitled = json!({"asin": "A3", "categories": [["Home & Kitchen"]]});
        assert!(matches!(product_from_item(&untitled), Ok(ProductItem::Untitled)));
        let no_asin = json!({"title": "x", "categories": [["Home & Kitchen"]]});
        assert!(product_from_item(&no_asin).is_err());
    }

    #[test]
    fn review_mapping_defaults_and_clamps() {
        let r = review_from_item(&json!({
            "asin": "A1", "unixReviewTime": 1_370_000_000, "overall": 7.0
        }))
        .unwrap();
        assert_eq!(r.review_score, 5);
        assert_eq!(r.review_username, DEFAULT_USERNAME);
        assert_eq!(r.review_id, 1_370_000_000);
        assert_eq!(r.review_title, None);

        let r = review_from_item(&json!({
            "asin": "A1", "unixReviewTime": 5, "reviewerName": "Sam",
            "summary": "Great", "reviewText": "Boils fast", "overall": 3.0
        }))
        .unwrap();
        assert_eq!(r.review_score, 3);
        assert_eq!(r.review_username, "Sam");
        assert_eq!(r.review_title.as_deref(), Some("Great"));

        let missing_score = review_from_item(&json!({"asin": "A1", "unixReviewTime": 5})).unwrap();
        assert_eq!(missing_score.review_score, 1);
        assert!(review_from_item(&json!({"asin": "A1"})).is_err());
    }

    #[test]
    fn populate_then_prune() {
        let (tmp, catalog) = make_catalog();
        let products = tmp.path().join("meta.json");
        std::fs::write(
            &products,
            r#"[{"asin": "A1", "title": "Kettle", "categories": [["Home & Kitchen"]]},
                {"asin": "A2", "title": "Pan", "categories": [["Home & Kitchen"]]},
                {"asin": "A3", "categories": [["Home & Kitchen"]]},
                {"asin": "B1", "title": "Book", "categories": [["Books"]]}]"#,
        )
        .unwrap();
        let report = populate_products(&catalog, &products).unwrap();
        assert_eq!(report, PopulateReport { processed: 2, skipped: 1, filtered: 1, failed: 0 });

        let reviews = tmp.path().join("reviews.json");
        std::fs::write(
            &reviews,
            r#"[{"asin": "A1", "unixReviewTime": 10, "overall": 5.0, "reviewText": "hot"},
                {"asin": "ZZ", "unixReviewTime": 11, "overall": 5.0},
                {"asin": "A1", "overall": 2.0}]"#,
        )
        .unwrap();
        let report = populate_reviews(&catalog, &reviews).unwrap();
        assert_eq!(report, PopulateReport { processed: 1, skipped: 0, filtered: 1, failed: 1 });

        assert_eq!(remove_products_with_zero_reviews(&catalog).unwrap(), 1);
        assert_eq!(catalog.product_ids().unwrap(), vec!["A1".to_string()]);
    }
}
