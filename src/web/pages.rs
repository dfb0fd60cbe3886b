//! Server-rendered HTML pages.

use std::fmt::Write;

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tracing::error;

use super::html::{escape, format_price, layout, pager, product_card, product_href, url_encode};
use super::{AppState, Page, run_blocking};
use crate::error::AppError;
use crate::recommend::{self, Recommendation};
use crate::store::{
    FeedbackStats, PerformanceOverview, PerformanceRecord, Product, Review, ReviewBucket, Summary,
};

const FEATURED_COUNT: usize = 8;
const RECENT_RUNS: usize = 20;

/// An error rendered as an HTML page.
pub(super) struct PageError {
    status: StatusCode,
    message: String,
    app_name: String,
}

impl PageError {
    fn new(state: &AppState, err: AppError) -> Self {
        let (status, message) = match err {
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
            other => {
                error!(error = %other, "page handler failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.".to_string())
            }
        };
        Self { status, message, app_name: state.config.name.clone() }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let title = self.status.canonical_reason().unwrap_or("Error");
        let body = format!(
            "<h1>{}</h1><p class=\"muted\">{}</p><p><a href=\"/\">Back to the homepage</a></p>",
            self.status.as_u16(),
            escape(&self.message)
        );
        (self.status, Html(layout(&self.app_name, title, &body))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    q: Option<String>,
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageParams {
    page: Option<String>,
}

// ── Homepage ──────────────────────────────────────────────────────────────────

struct HomeData {
    products: usize,
    reviews: usize,
    summaries: usize,
    featured: Vec<Product>,
}

/// GET /
pub(super) async fn home(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let data = run_blocking(&state, |c| {
        Ok(HomeData {
            products: c.count_products()?,
            reviews: c.count_all_reviews()?,
            summaries: c.count_summaries()?,
            featured: c.featured_products(FEATURED_COUNT)?,
        })
    })
    .await
    .map_err(|e| PageError::new(&state, e))?;

    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>Find similar household products</h1>\
         <p class=\"muted\">{} products · {} reviews · {} AI summaries</p>",
        data.products, data.reviews, data.summaries
    );
    body.push_str("<h2>Featured</h2>");
    if data.featured.is_empty() {
        body.push_str("<p class=\"muted\">No summarised products yet.</p>");
    } else {
        body.push_str("<div class=\"grid\">");
        for p in &data.featured {
            body.push_str(&product_card(p, ""));
        }
        body.push_str("</div>");
    }
    Ok(Html(layout(&state.config.name, "Home", &body)))
}

// ── Search ────────────────────────────────────────────────────────────────────

/// GET /search/?q=&page=
pub(super) async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, PageError> {
    let query = params.q.unwrap_or_default().trim().to_string();
    let page_size = state.config.web.page_size;
    let requested = params.page;

    let q = query.clone();
    let (page, total, results) = run_blocking(&state, move |c| {
        let total = c.count_search(&q)?;
        let page = Page::resolve(requested.as_deref(), total, page_size);
        let results = c.search_products(&q, page.size, page.offset())?;
        Ok((page, total, results))
    })
    .await
    .map_err(|e| PageError::new(&state, e))?;

    let mut body = String::new();
    if query.is_empty() {
        body.push_str("<h1>Search</h1><p class=\"muted\">Type a product name in the search box.</p>");
        return Ok(Html(layout(&state.config.name, "Search", &body)));
    }
    let _ = write!(
        body,
        "<h1>Results for “{}”</h1><p class=\"muted\">{total} matching products</p>",
        escape(&query)
    );
    if results.is_empty() {
        body.push_str("<p>No products found.</p>");
    } else {
        body.push_str("<div class=\"grid\">");
        for p in &results {
            body.push_str(&product_card(p, ""));
        }
        body.push_str("</div>");
    }
    let base = format!("/search/?q={}&", url_encode(&query));
    body.push_str(&pager(&base, page.number, page.total_pages));

    Ok(Html(layout(&state.config.name, "Search", &body)))
}

// ── Random ────────────────────────────────────────────────────────────────────

/// GET /random/ → 302 to a random product.
pub(super) async fn random(State(state): State<AppState>) -> Result<Response, PageError> {
    let product = run_blocking(&state, |c| c.random_product())
        .await
        .map_err(|e| PageError::new(&state, e))?
        .ok_or_else(|| PageError::new(&state, AppError::NotFound("catalog is empty".into())))?;
    let location = product_href(&product.product_id);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

// ── Product detail ────────────────────────────────────────────────────────────

struct ProductData {
    product: Product,
    summary: Option<Summary>,
    by_summary: Vec<Recommendation>,
    by_reviews: Vec<Recommendation>,
    summary_time: f64,
    reviews_time: f64,
    reviews: Vec<Review>,
    page: Page,
    total_reviews: usize,
}

/// GET /product/{product_id}/?page=
pub(super) async fn product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Html<String>, PageError> {
    let config = state.config.clone();
    let data = run_blocking(&state, move |c| {
        let product = c
            .get_product(&product_id)?
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
        let summary = c.get_summary(&product_id)?;
        let mut comparison = recommend::compare(c, &product_id, &config.recommend)?;
        comparison.summary.truncate(config.web.recommendation_count);
        comparison.reviews.truncate(config.web.recommendation_count);

        let total_reviews = c.count_reviews(&product_id)?;
        let page = Page::resolve(params.page.as_deref(), total_reviews, config.web.reviews_page_size);
        let reviews = c.reviews_for_product(&product_id, page.size, page.offset())?;
        Ok(ProductData {
            product,
            summary,
            by_summary: comparison.summary,
            by_reviews: comparison.reviews,
            summary_time: comparison.summary_time,
            reviews_time: comparison.reviews_time,
            reviews,
            page,
            total_reviews,
        })
    })
    .await
    .map_err(|e| PageError::new(&state, e))?;

    let p = &data.product;
    let mut body = String::new();
    let _ = write!(body, "<h1>{}</h1>", escape(&p.name));
    if !p.image_url.is_empty() {
        let _ = write!(body, r#"<img src="{}" alt="" style="max-height:240px" />"#, escape(&p.image_url));
    }
    let _ = write!(
        body,
        "<p>{}</p><p class=\"muted\">Product id {}</p>",
        escape(&format_price(p.price)),
        escape(&p.product_id)
    );

    body.push_str("<h2>What reviewers say</h2>");
    match &data.summary {
        Some(s) => {
            let side = |text: &Option<String>| {
                text.as_deref().map(escape).unwrap_or_else(|| "<span class=\"muted\">Not available</span>".into())
            };
            let _ = write!(
                body,
                "<div class=\"grid\"><div class=\"card\"><strong>Liked</strong><p>{}</p></div>\
                 <div class=\"card\"><strong>Disliked</strong><p>{}</p></div></div>",
                side(&s.positive_sentiment),
                side(&s.negative_sentiment)
            );
        }
        None => body.push_str("<p class=\"muted\">No AI summary yet.</p>"),
    }

    let _ = write!(
        body,
        "<h2>Similar by AI summary <span class=\"muted\">({:.3}s)</span></h2>",
        data.summary_time
    );
    body.push_str(&recommendation_grid(&p.product_id, &data.by_summary));
    let _ = write!(
        body,
        "<h2>Similar by review text <span class=\"muted\">({:.3}s)</span></h2>",
        data.reviews_time
    );
    body.push_str(&recommendation_grid(&p.product_id, &data.by_reviews));

    let _ = write!(body, "<h2>Reviews <span class=\"muted\">({})</span></h2>", data.total_reviews);
    if data.reviews.is_empty() {
        body.push_str("<p class=\"muted\">No reviews.</p>");
    }
    for r in &data.reviews {
        let _ = write!(
            body,
            "<div class=\"card\" style=\"margin-bottom:0.75rem\"><strong>{} / 5</strong> {}\
             <div class=\"muted\">{}</div><p>{}</p></div>",
            r.review_score,
            escape(r.review_title.as_deref().unwrap_or_default()),
            escape(&r.review_username),
            escape(r.review_text.as_deref().unwrap_or_default()),
        );
    }
    let base = format!("{}?", product_href(&p.product_id));
    body.push_str(&pager(&base, data.page.number, data.page.total_pages));
    body.push_str(FEEDBACK_SCRIPT);

    Ok(Html(layout(&state.config.name, &p.name, &body)))
}

const FEEDBACK_SCRIPT: &str = r#"<script>
document.addEventListener('click', async (ev) => {
  const btn = ev.target.closest('button[data-good]');
  if (!btn) return;
  const card = btn.closest('[data-initial]');
  const res = await fetch('/api/feedback/', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({
      initial_product_id: card.dataset.initial,
      recommended_product_id: card.dataset.recommended,
      good_recommendation: btn.dataset.good === 'true',
    }),
  });
  card.querySelectorAll('button').forEach((b) => b.remove());
  card.insertAdjacentHTML('beforeend', res.ok ? '<div class="muted">Thanks!</div>' : '<div class="muted">Could not save feedback</div>');
});
</script>"#;

fn recommendation_grid(initial_id: &str, recs: &[Recommendation]) -> String {
    if recs.is_empty() {
        return "<p class=\"muted\">No recommendations available.</p>".to_string();
    }
    let mut out = String::from("<div class=\"grid\">");
    for rec in recs {
        let extra = format!(
            "<div class=\"muted\">similarity {:.3}</div>\
             <div data-initial=\"{}\" data-recommended=\"{}\">\
             <button data-good=\"true\">Good</button> <button data-good=\"false\">Bad</button></div>",
            rec.score,
            escape(initial_id),
            escape(&rec.product.product_id),
        );
        out.push_str(&product_card(&rec.product, &extra));
    }
    out.push_str("</div>");
    out
}

// ── Analytics ─────────────────────────────────────────────────────────────────

struct AnalyticsData {
    overview: PerformanceOverview,
    buckets: Vec<ReviewBucket>,
    recent: Vec<PerformanceRecord>,
    feedback: FeedbackStats,
}

fn secs(v: Option<f64>) -> String {
    v.map(|s| format!("{s:.4}s")).unwrap_or_else(|| "–".to_string())
}

/// GET /analytics/
pub(super) async fn analytics(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let data = run_blocking(&state, |c| {
        Ok(AnalyticsData {
            overview: c.performance_overview()?,
            buckets: c.performance_by_review_bucket()?,
            recent: c.recent_performance(RECENT_RUNS)?,
            feedback: c.feedback_stats()?,
        })
    })
    .await
    .map_err(|e| PageError::new(&state, e))?;

    let o = &data.overview;
    let mut body = String::from("<h1>Recommendation analytics</h1>");
    if o.total_runs == 0 {
        body.push_str("<p class=\"muted\">No recommendation runs recorded yet. Open a product page to record one.</p>");
    }
    let _ = write!(
        body,
        "<table><tr><th></th><th>AI summary</th><th>Review text</th></tr>\
         <tr><td>Average</td><td>{}</td><td>{}</td></tr>\
         <tr><td>Fastest</td><td>{}</td><td>{}</td></tr>\
         <tr><td>Slowest</td><td>{}</td><td>{}</td></tr></table>",
        secs(o.avg_summary_time),
        secs(o.avg_reviews_time),
        secs(o.min_summary_time),
        secs(o.min_reviews_time),
        secs(o.max_summary_time),
        secs(o.max_reviews_time),
    );
    let _ = write!(
        body,
        "<p class=\"muted\">{} runs over {} products · summary strategy faster in {} runs",
        o.total_runs, o.products_measured, o.summary_faster_runs
    );
    if let Some(x) = o.speedup() {
        let _ = write!(body, " · {x:.1}× speedup on average");
    }
    body.push_str("</p>");

    body.push_str("<h2>By review count</h2><table><tr><th>Reviews</th><th>Runs</th><th>AI summary</th><th>Review text</th></tr>");
    for b in &data.buckets {
        let _ = write!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{:.4}s</td><td>{:.4}s</td></tr>",
            b.label, b.runs, b.avg_summary_time, b.avg_reviews_time
        );
    }
    body.push_str("</table>");

    let f = &data.feedback;
    let _ = write!(
        body,
        "<h2>Feedback</h2><p>{} ratings · {} good · {} bad</p>",
        f.total, f.good, f.bad
    );

    body.push_str("<h2>Recent runs</h2><table><tr><th>Product</th><th>Reviews</th><th>AI summary</th><th>Review text</th><th>Recorded</th></tr>");
    for r in &data.recent {
        let _ = write!(
            body,
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{:.4}s</td><td>{:.4}s</td><td>{}</td></tr>",
            escape(&product_href(&r.product_id)),
            escape(&r.product_id),
            r.num_reviews,
            r.summary_time,
            r.reviews_time,
            escape(&r.recorded_at),
        );
    }
    body.push_str("</table>");

    Ok(Html(layout(&state.config.name, "Analytics", &body)))
}

/// Fallback for unknown paths.
pub(super) async fn not_found(State(state): State<AppState>, uri: Uri) -> PageError {
    PageError::new(&state, AppError::NotFound(format!("page {}", uri.path())))
}
