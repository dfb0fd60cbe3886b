//! Handlers for `/api/*` routes. Errors are JSON: `{"error": code, "message": text}`.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::{AppState, Page, run_blocking};
use crate::error::AppError;
use crate::recommend;
use crate::store::Review;

pub(super) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "bad_request", message: message.into() }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(what) => Self {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: format!("{what} not found"),
            },
            other => {
                error!(error = %other, "api handler failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: "internal server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.code, "message": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PageParams {
    page: Option<String>,
}

/// GET /api/recommendations/{product_id}/
pub(super) async fn recommendations(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<recommend::Comparison>, ApiError> {
    let config = state.config.clone();
    let comparison =
        run_blocking(&state, move |c| recommend::compare(c, &product_id, &config.recommend)).await?;
    Ok(Json(comparison))
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewPage {
    product_id: String,
    page: usize,
    total_pages: usize,
    total_reviews: usize,
    has_next: bool,
    has_previous: bool,
    reviews: Vec<Review>,
}

/// GET /api/reviews/{product_id}/?page=
pub(super) async fn reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ReviewPage>, ApiError> {
    let page_size = state.config.web.reviews_page_size;
    let body = run_blocking(&state, move |c| {
        if c.get_product(&product_id)?.is_none() {
            return Err(AppError::NotFound(format!("product {product_id}")));
        }
        let total_reviews = c.count_reviews(&product_id)?;
        let page = Page::resolve(params.page.as_deref(), total_reviews, page_size);
        let reviews = c.reviews_for_product(&product_id, page.size, page.offset())?;
        Ok(ReviewPage {
            product_id,
            page: page.number,
            total_pages: page.total_pages,
            total_reviews,
            has_next: page.has_next(),
            has_previous: page.has_previous(),
            reviews,
        })
    })
    .await?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub(super) struct FeedbackRequest {
    initial_product_id: String,
    recommended_product_id: String,
    good_recommendation: bool,
}

/// POST /api/feedback/
pub(super) async fn feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let initial = req.initial_product_id.trim().to_string();
    let recommended = req.recommended_product_id.trim().to_string();
    if initial.is_empty() || recommended.is_empty() {
        return Err(ApiError::bad_request("product ids must not be empty"));
    }
    if initial == recommended {
        return Err(ApiError::bad_request("a product cannot be recommended for itself"));
    }
    let good = req.good_recommendation;

    let (id, initial, recommended) = run_blocking(&state, move |c| {
        for pid in [&initial, &recommended] {
            if c.get_product(pid)?.is_none() {
                return Err(AppError::NotFound(format!("product {pid}")));
            }
        }
        let id = c.record_feedback(&initial, &recommended, good)?;
        Ok((id, initial, recommended))
    })
    .await?;

    info!(%initial, %recommended, good, "recommendation feedback recorded");
    Ok((StatusCode::CREATED, Json(json!({ "status": "ok", "id": id }))).into_response())
}

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    let products = run_blocking(&state, |c| c.count_products()).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "name": state.config.name,
            "version": env!("CARGO_PKG_VERSION"),
            "products": products,
        })),
    )
        .into_response())
}
