//! Axum web front end: server-rendered pages plus a small JSON API.
//!
//! ## URL layout
//!
//! ```text
//! GET  /                                  homepage
//! GET  /search/?q=&page=                  paginated search
//! GET  /random/                           302 → random product
//! GET  /product/{product_id}/             product detail
//! GET  /analytics/                        strategy comparison dashboard
//! GET  /api/recommendations/{product_id}/
//! GET  /api/reviews/{product_id}/?page=
//! POST /api/feedback/
//! GET  /api/health
//! GET  /favicon.ico                       → 204
//! ```
//!
//! Catalog calls are blocking SQLite work and always go through
//! [`run_blocking`].

mod api;
mod html;
mod pages;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::store::Catalog;

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(catalog: Catalog, config: Config) -> Self {
        Self { catalog, config: Arc::new(config) }
    }
}

/// Run `f` against the catalog on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Catalog) -> Result<T, AppError> + Send + 'static,
{
    let catalog = state.catalog.clone();
    tokio::task::spawn_blocking(move || f(&catalog))
        .await
        .map_err(|e| AppError::Web(format!("blocking task failed: {e}")))?
}

/// One page of a paginated listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Page {
    pub number: usize,
    pub total_pages: usize,
    pub size: usize,
}

impl Page {
    /// Resolve a raw `?page=` value. Non-numbers fall back to the first page
    /// and out-of-range numbers clamp to the last.
    pub fn resolve(requested: Option<&str>, total_items: usize, size: usize) -> Self {
        let size = size.max(1);
        let total_pages = total_items.div_ceil(size).max(1);
        let number = requested
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, total_pages);
        Self { number, total_pages, size }
    }

    pub fn offset(&self) -> usize {
        (self.number - 1) * self.size
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/",                                    get(pages::home))
        .route("/search/",                             get(pages::search))
        .route("/random/",                             get(pages::random))
        .route("/product/{product_id}/",               get(pages::product))
        .route("/analytics/",                          get(pages::analytics))
        .route("/api/recommendations/{product_id}/",   get(api::recommendations))
        .route("/api/reviews/{product_id}/",           get(api::reviews))
        .route("/api/feedback/",                       post(api::feedback))
        .route("/api/health",                          get(api::health))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .fallback(pages::not_found)
        .with_state(state)
}

/// Open the catalog, bind `config.web.bind` and serve until `shutdown` fires.
pub async fn serve(config: Config, shutdown: CancellationToken) -> Result<(), AppError> {
    let catalog = Catalog::open(&config.database_path())?;
    let bind_addr = config.web.bind.clone();
    let router = build_router(AppState::new(catalog, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Web(format!("bind failed on {bind_addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::Web(format!("listener address: {e}")))?;

    info!(%local_addr, "web server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Web(format!("server error: {e}")))?;

    info!("web server shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        let p = Page::resolve(None, 45, 20);
        assert_eq!(p, Page { number: 1, total_pages: 3, size: 20 });
        assert_eq!(p.offset(), 0);
        assert!(!p.has_previous() && p.has_next());

        let last = Page::resolve(Some("99"), 45, 20);
        assert_eq!(last.number, 3);
        assert_eq!(last.offset(), 40);
        assert!(!last.has_next());

        assert_eq!(Page::resolve(Some("abc"), 45, 20).number, 1);
        assert_eq!(Page::resolve(Some("0"), 45, 20).number, 1);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let p = Page::resolve(Some("2"), 0, 10);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.number, 1);
    }
}
