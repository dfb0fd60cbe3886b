//! "Similar product" recommendation strategies.
//!
//! Two strategies rank other products by TF-IDF cosine similarity:
//!
//! - [`recommend_by_summaries`] compares the AI-written positive and negative
//!   summaries and averages the two similarities.
//! - [`recommend_by_reviews`] compares the concatenated raw review text.
//!
//! [`compare`] runs both, times them and records the timings for the
//! analytics dashboard.

mod stop_words;
pub mod tfidf;

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::RecommendConfig;
use crate::error::AppError;
use crate::store::{Catalog, Product};

use tfidf::{TfidfVectorizer, cosine_similarity, top_k};

/// Review rows fetched per product slot by the review strategy.
const ROWS_PER_PRODUCT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub product: Product,
    pub score: f64,
}

/// Rank products by the similarity of their AI summaries to the target's.
///
/// Only products whose summary has both sentiments take part. A target
/// without a complete summary gets no recommendations.
pub fn recommend_by_summaries(
    catalog: &Catalog,
    target_id: &str,
    k: usize,
) -> Result<Vec<Recommendation>, AppError> {
    let Some(target) = catalog.get_summary(target_id)?.filter(|s| s.is_complete()) else {
        debug!(%target_id, "no complete summary for target");
        return Ok(Vec::new());
    };
    let candidates = catalog.summaries_excluding(target_id)?;
    if candidates.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let positives: Vec<&str> = candidates
        .iter()
        .map(|s| s.positive_sentiment.as_deref().unwrap_or_default())
        .collect();
    let negatives: Vec<&str> = candidates
        .iter()
        .map(|s| s.negative_sentiment.as_deref().unwrap_or_default())
        .collect();

    let (pos_vec, pos_rows) = TfidfVectorizer::fit_transform(&positives);
    let (neg_vec, neg_rows) = TfidfVectorizer::fit_transform(&negatives);
    let target_pos = pos_vec.transform(target.positive_sentiment.as_deref().unwrap_or_default());
    let target_neg = neg_vec.transform(target.negative_sentiment.as_deref().unwrap_or_default());

    let scores: Vec<f64> = pos_rows
        .iter()
        .zip(&neg_rows)
        .map(|(p, n)| (cosine_similarity(&target_pos, p) + cosine_similarity(&target_neg, n)) / 2.0)
        .collect();

    let ranked = top_k(&scores, k);
    let ids: Vec<String> = ranked.iter().map(|&i| candidates[i].product_id.clone()).collect();
    attach_scores(catalog, &ids, ranked.iter().map(|&i| scores[i]).collect())
}

/// Rank products by the similarity of their combined review text to the
/// target's.
///
/// The candidate pool is capped: at most `product_limit * 10` review rows
/// are read, and of those only the `product_limit` products with the most
/// reviews are vectorised. A target that exists but has no review text
/// falls back to up to `k` other reviewed products, each with score `0.0`.
pub fn recommend_by_reviews(
    catalog: &Catalog,
    target_id: &str,
    k: usize,
    product_limit: usize,
) -> Result<Vec<Recommendation>, AppError> {
    if k == 0 {
        return Ok(Vec::new());
    }
    let row_limit = product_limit.saturating_mul(ROWS_PER_PRODUCT);
    let target_texts = catalog.review_texts_for_product(target_id)?;

    if target_texts.is_empty() {
        if catalog.get_product(target_id)?.is_none() {
            debug!(%target_id, "target product not in catalog");
            return Ok(Vec::new());
        }
        let fallback = catalog.products_with_reviews(target_id, row_limit, k)?;
        info!(%target_id, count = fallback.len(), "target has no reviews, returning fallback products");
        return Ok(fallback
            .into_iter()
            .map(|product| Recommendation { product, score: 0.0 })
            .collect());
    }

    let other_rows = catalog.review_texts_excluding(target_id, row_limit)?;
    if other_rows.is_empty() {
        debug!(%target_id, "no other product reviews available");
        return Ok(Vec::new());
    }

    // Group by product, remembering first-seen order for tie-breaks.
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for (pid, text) in other_rows {
        grouped
            .entry(pid.clone())
            .or_insert_with(|| {
                order.push(pid);
                Vec::new()
            })
            .push(text);
    }
    let mut products: Vec<(String, Vec<String>)> = order
        .into_iter()
        .filter_map(|pid| grouped.remove(&pid).map(|texts| (pid, texts)))
        .collect();
    products.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    products.truncate(product_limit);

    let mut corpus: Vec<String> = Vec::with_capacity(products.len() + 1);
    corpus.push(target_texts.join(" "));
    corpus.extend(products.iter().map(|(_, texts)| texts.join(" ")));

    let (_, rows) = TfidfVectorizer::fit_transform(&corpus);
    let (target_row, other) = rows.split_first().ok_or_else(|| {
        AppError::Store("review corpus unexpectedly empty".into())
    })?;
    let scores: Vec<f64> = other.iter().map(|r| cosine_similarity(target_row, r)).collect();

    let ranked = top_k(&scores, k);
    let ids: Vec<String> = ranked.iter().map(|&i| products[i].0.clone()).collect();
    attach_scores(catalog, &ids, ranked.iter().map(|&i| scores[i]).collect())
}

fn attach_scores(
    catalog: &Catalog,
    ids: &[String],
    scores: Vec<f64>,
) -> Result<Vec<Recommendation>, AppError> {
    let by_id: HashMap<&str, f64> = ids.iter().map(String::as_str).zip(scores).collect();
    Ok(catalog
        .products_by_ids(ids)?
        .into_iter()
        .map(|product| {
            let score = by_id.get(product.product_id.as_str()).copied().unwrap_or(0.0);
            Recommendation { product, score }
        })
        .collect())
}

/// Both strategies' results for one product, with timings in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub product_id: String,
    pub summary: Vec<Recommendation>,
    pub reviews: Vec<Recommendation>,
    pub summary_time: f64,
    pub reviews_time: f64,
    pub num_reviews: usize,
}

/// Run both strategies for `target_id`, time them and record a
/// performance sample. Unknown products are [`AppError::NotFound`].
pub fn compare(
    catalog: &Catalog,
    target_id: &str,
    config: &RecommendConfig,
) -> Result<Comparison, AppError> {
    if catalog.get_product(target_id)?.is_none() {
        return Err(AppError::NotFound(format!("product {target_id}")));
    }

    let started = Instant::now();
    let summary = recommend_by_summaries(catalog, target_id, config.max_results)?;
    let summary_time = started.elapsed().as_secs_f64();

    let started = Instant::now();
    let reviews =
        recommend_by_reviews(catalog, target_id, config.max_results, config.review_product_limit)?;
    let reviews_time = started.elapsed().as_secs_f64();

    let num_reviews = catalog.count_reviews(target_id)?;
    catalog.record_performance(target_id, summary_time, reviews_time, num_reviews)?;

    debug!(
        %target_id,
        summary_time,
        reviews_time,
        num_reviews,
        "recommendation strategies compared"
    );

    Ok(Comparison {
        product_id: target_id.to_string(),
        summary,
        reviews,
        summary_time,
        reviews_time,
        num_reviews,
    })
}
