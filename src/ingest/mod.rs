//! Dataset munging: gzip dumps → JSON arrays → catalog rows.
//!
//! The pipeline is run once, step by step, from the CLI:
//! `clean-metadata`, `clean-reviews`, `populate-products`,
//! `populate-reviews`, `remove-products-with-zero-reviews`.

mod clean;
mod populate;
pub mod pyliteral;

pub use clean::{CleanReport, clean_metadata, clean_reviews};
pub use populate::{
    CATALOG_CATEGORY, PopulateReport, for_each_item, populate_products, populate_reviews,
    remove_products_with_zero_reviews,
};

/// Raw metadata dump, one Python dict per line.
pub const RAW_METADATA_FILE: &str = "metadata.json.gz";
/// Cleaned metadata array.
pub const METADATA_FILE: &str = "metadata_processed.json";
/// Raw review dump, one JSON object per line.
pub const RAW_REVIEWS_FILE: &str = "reviews.json.gz";
/// Cleaned review array.
pub const REVIEWS_FILE: &str = "home_and_kitchen_reviews_processed.json";
