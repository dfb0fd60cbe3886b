//! Integration tests for the SQLite catalog.

mod common;

use product_recommender::store::Catalog;

use common::{catalog, product, review, seed_kitchen};

#[test]
fn catalog_persists_across_handles() {
    let (tmp, first) = catalog();
    seed_kitchen(&first);
    let path = first.path().to_path_buf();
    drop(first);

    let reopened = Catalog::open(&path).unwrap();
    assert_eq!(reopened.count_products().unwrap(), 5);
    assert_eq!(reopened.count_all_reviews().unwrap(), 8);
    assert_eq!(reopened.count_summaries().unwrap(), 4);
    drop(tmp);
}

#[test]
fn pruning_cascades_to_dependent_rows() {
    let (_tmp, catalog) = catalog();
    seed_kitchen(&catalog);
    catalog.upsert_product(&product("X1", "Lonely Ladle")).unwrap();
    catalog.upsert_summary("X1", Some("nice"), Some("bent")).unwrap();
    catalog.record_feedback("X1", "K1", true).unwrap();
    catalog.record_performance("X1", 0.01, 0.02, 0).unwrap();

    assert_eq!(catalog.delete_products_without_reviews().unwrap(), 1);
    assert!(catalog.get_product("X1").unwrap().is_none());
    assert!(catalog.get_summary("X1").unwrap().is_none());
    assert_eq!(catalog.feedback_stats().unwrap().total, 0);
    assert_eq!(catalog.performance_overview().unwrap().total_runs, 0);
    assert_eq!(catalog.count_products().unwrap(), 5);
}

#[test]
fn search_pages_through_matches() {
    let (_tmp, catalog) = catalog();
    seed_kitchen(&catalog);

    assert_eq!(catalog.count_search("kettle").unwrap(), 2);
    let first = catalog.search_products("KETTLE", 1, 0).unwrap();
    let second = catalog.search_products("kettle", 1, 1).unwrap();
    assert_eq!(first[0].name, "Electric Kettle");
    assert_eq!(second[0].name, "Stovetop Kettle");
    assert!(catalog.search_products("kettle", 1, 2).unwrap().is_empty());

    // LIKE wildcards in user input match literally.
    assert_eq!(catalog.count_search("%").unwrap(), 0);
    assert_eq!(catalog.count_search("").unwrap(), 0);
}

#[test]
fn reviews_page_newest_first() {
    let (_tmp, catalog) = catalog();
    catalog.upsert_product(&product("A", "Toaster")).unwrap();
    for t in [10, 30, 20] {
        catalog.insert_review(&review("A", t, &format!("review at {t}"))).unwrap();
    }
    let page = catalog.reviews_for_product("A", 2, 0).unwrap();
    assert_eq!(page.iter().map(|r| r.review_id).collect::<Vec<_>>(), vec![30, 20]);
    let rest = catalog.reviews_for_product("A", 2, 2).unwrap();
    assert_eq!(rest[0].review_id, 10);
}

#[test]
fn review_batch_is_all_or_nothing() {
    let (_tmp, catalog) = catalog();
    catalog.upsert_product(&product("A", "Toaster")).unwrap();
    let good = review("A", 1, "fine");
    let orphan = review("missing", 2, "no product");
    assert!(catalog.insert_reviews(&[good, orphan]).is_err());
    assert_eq!(catalog.count_all_reviews().unwrap(), 0);
}

#[test]
fn feedback_counts_good_and_bad() {
    let (_tmp, catalog) = catalog();
    seed_kitchen(&catalog);
    catalog.record_feedback("K1", "K2", true).unwrap();
    catalog.record_feedback("K1", "P1", false).unwrap();
    catalog.record_feedback("P1", "P2", true).unwrap();
    let stats = catalog.feedback_stats().unwrap();
    assert_eq!((stats.total, stats.good, stats.bad), (3, 2, 1));
}

#[test]
fn featured_products_have_complete_summaries() {
    let (_tmp, catalog) = catalog();
    seed_kitchen(&catalog);
    let featured = catalog.featured_products(10).unwrap();
    assert_eq!(featured.len(), 4);
    assert!(featured.iter().all(|p| p.product_id != "B1"));
}

#[test]
fn cleanup_keeps_latest_sample_per_product() {
    let (_tmp, catalog) = catalog();
    seed_kitchen(&catalog);
    catalog.record_performance("K1", 0.1, 0.2, 2).unwrap();
    catalog.record_performance("K1", 0.3, 0.4, 2).unwrap();
    catalog.record_performance("P1", 0.1, 0.2, 1).unwrap();

    assert_eq!(catalog.dedupe_performance().unwrap(), 1);
    let recent = catalog.recent_performance(10).unwrap();
    assert_eq!(recent.len(), 2);
    let k1 = recent.iter().find(|r| r.product_id == "K1").unwrap();
    assert!((k1.summary_time - 0.3).abs() < 1e-12);
}
