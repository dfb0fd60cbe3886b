//! Household product recommender.
//!
//! Ingests the Amazon "Home & Kitchen" review dataset into SQLite, asks an
//! LLM for positive/negative summaries of each product's reviews, and
//! recommends similar products by TF-IDF similarity of either the summaries
//! or the raw review text. A small axum site exposes search, product pages,
//! recommendations and a timing dashboard comparing the two strategies.

pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod logger;
pub mod recommend;
pub mod store;
pub mod summaries;
pub mod web;
