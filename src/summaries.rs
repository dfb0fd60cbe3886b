//! AI summary generation.
//!
//! For each product, its review texts are joined and sent to the LLM twice:
//! once with the positive-sentiment prompt and once with the negative one.
//! Products run sequentially; the model server is the bottleneck.

use tracing::{debug, info, warn};

use crate::config::SummaryPrompts;
use crate::error::AppError;
use crate::llm::LlmProvider;
use crate::store::Catalog;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryReport {
    /// Products whose summary now has both sentiments.
    pub generated: usize,
    /// Products where at least one side failed, or the store write failed.
    pub failed: usize,
    /// Products without any review text.
    pub skipped: usize,
}

/// First `max` chars of `text`; `max == 0` returns it whole.
fn truncate_chars(text: &str, max: usize) -> &str {
    if max == 0 {
        return text;
    }
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn build_prompt(prompt: &str, reviews: &str) -> String {
    format!("{prompt}\n\n{reviews}")
}

async fn generate_side(provider: &LlmProvider, product_id: &str, side: &str, prompt: String) -> Option<String> {
    match provider.generate(&prompt).await {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(%product_id, side, error = %e, "summary generation failed");
            None
        }
    }
}

/// Generate and store summaries for every product, or only `only_product`.
///
/// Per-product failures are logged and counted, never fatal. An unknown
/// `only_product` is [`AppError::NotFound`].
pub async fn generate_all(
    catalog: &Catalog,
    provider: &LlmProvider,
    prompts: &SummaryPrompts,
    only_product: Option<&str>,
) -> Result<SummaryReport, AppError> {
    let ids = match only_product {
        Some(id) => {
            if catalog.get_product(id)?.is_none() {
                return Err(AppError::NotFound(format!("product {id}")));
            }
            vec![id.to_string()]
        }
        None => catalog.product_ids()?,
    };

    info!(products = ids.len(), provider = provider.name(), "generating summaries");
    let mut report = SummaryReport::default();

    for (n, product_id) in ids.iter().enumerate() {
        let texts = match catalog.review_texts_for_product(product_id) {
            Ok(t) => t,
            Err(e) => {
                warn!(%product_id, error = %e, "cannot read reviews");
                report.failed += 1;
                continue;
            }
        };
        if texts.is_empty() {
            debug!(%product_id, "no review text, skipping");
            report.skipped += 1;
            continue;
        }
        let joined = texts.join("\n\n");
        let reviews = truncate_chars(&joined, prompts.max_review_chars);
        if reviews.len() < joined.len() {
            debug!(%product_id, kept = prompts.max_review_chars, "review text truncated");
        }

        let positive =
            generate_side(provider, product_id, "positive", build_prompt(&prompts.positive, reviews)).await;
        let negative =
            generate_side(provider, product_id, "negative", build_prompt(&prompts.negative, reviews)).await;
        let complete = positive.is_some() && negative.is_some();

        match catalog.upsert_summary(product_id, positive.as_deref(), negative.as_deref()) {
            Ok(()) if complete => report.generated += 1,
            Ok(()) => report.failed += 1,
            Err(e) => {
                warn!(%product_id, error = %e, "cannot store summary");
                report.failed += 1;
            }
        }
        debug!(%product_id, done = n + 1, total = ids.len(), "summary processed");
    }

    info!(
        generated = report.generated,
        failed = report.failed,
        skipped = report.skipped,
        "summary generation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::llm::providers::ollama::OllamaProvider;
    use crate::store::test_support::*;

    fn prompts() -> SummaryPrompts {
        SummaryPrompts {
            positive: "Summarise the praise.".into(),
            negative: "Summarise the complaints.".into(),
            max_review_chars: 0,
        }
    }

    #[test]
    fn prompt_appends_reviews_after_blank_line() {
        assert_eq!(build_prompt("P", "r1\n\nr2"), "P\n\nr1\n\nr2");
    }

    #[test]
    fn review_text_cap_respects_char_boundaries() {
        assert_eq!(truncate_chars("crème brûlée", 4), "crèm");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("uncapped", 0), "uncapped");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[tokio::test]
    async fn unreachable_model_still_stores_empty_summary() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A1", "Kettle")).unwrap();
        catalog.insert_review(&review("A1", "boils fast")).unwrap();

        // Nothing listens on port 1, so both sides fail at the transport.
        let ollama = OllamaProvider::new("http://127.0.0.1:1/api/generate".into(), "llama3.2".into(), 5).unwrap();
        let provider = LlmProvider::Ollama(ollama);
        let report = generate_all(&catalog, &provider, &prompts(), None).await.unwrap();
        assert_eq!(report, SummaryReport { generated: 0, failed: 1, skipped: 0 });

        let summary = catalog.get_summary("A1").unwrap().unwrap();
        assert_eq!(summary.positive_sentiment, None);
        assert_eq!(summary.negative_sentiment, None);
    }

    #[tokio::test]
    async fn generates_for_reviewed_products_only() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A1", "Kettle")).unwrap();
        catalog.upsert_product(&product("A2", "Pan")).unwrap();
        catalog.insert_review(&review("A1", "boils fast")).unwrap();

        let provider = LlmProvider::Dummy(DummyProvider);
        let report = generate_all(&catalog, &provider, &prompts(), None).await.unwrap();
        assert_eq!(report, SummaryReport { generated: 1, failed: 0, skipped: 1 });

        let summary = catalog.get_summary("A1").unwrap().unwrap();
        assert_eq!(summary.positive_sentiment.as_deref(), Some("[echo] Summarise the praise."));
        assert_eq!(summary.negative_sentiment.as_deref(), Some("[echo] Summarise the complaints."));
        assert!(catalog.get_summary("A2").unwrap().is_none());
    }

    #[tokio::test]
    async fn single_product_mode() {
        let (_t, catalog) = make_catalog();
        catalog.upsert_product(&product("A1", "Kettle")).unwrap();
        catalog.upsert_product(&product("A2", "Pan")).unwrap();
        catalog.insert_review(&review("A1", "boils fast")).unwrap();
        catalog.insert_review(&review("A2", "sticks")).unwrap();

        let provider = LlmProvider::Dummy(DummyProvider);
        let report = generate_all(&catalog, &provider, &prompts(), Some("A2")).await.unwrap();
        assert_eq!(report.generated, 1);
        assert!(catalog.get_summary("A1").unwrap().is_none());
        assert!(catalog.get_summary("A2").unwrap().is_some());

        let err = generate_all(&catalog, &provider, &prompts(), Some("nope")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
