//! `product-recommender`: dataset pipeline commands and the web server.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args
//!   3. Load config
//!   4. Init logger (`-v` beats config)
//!   5. Run the subcommand

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use product_recommender::config::{self, Config};
use product_recommender::error::AppError;
use product_recommender::store::Catalog;
use product_recommender::{ingest, llm, logger, summaries, web};

#[derive(Parser, Debug)]
#[command(name = "product-recommender")]
#[command(about = "Household product recommender: dataset ingestion, AI summaries and web UI")]
struct Cli {
    /// Config file (default: config/default.toml)
    #[arg(short = 'f', long = "config", global = true)]
    config: Option<String>,

    /// Increase log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server until Ctrl-C
    Serve,
    /// Convert the gzip'd metadata dump into a JSON array
    CleanMetadata {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert the gzip'd review dump into a JSON array
    CleanReviews {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load Home & Kitchen products from the cleaned metadata
    PopulateProducts {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Load reviews of known products from the cleaned reviews
    PopulateReviews {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete products that have no reviews
    RemoveProductsWithZeroReviews,
    /// Ask the LLM for positive/negative review summaries
    GenerateSummaries {
        /// Only summarise this product
        #[arg(long)]
        product: Option<String>,
    },
    /// Keep only the newest timing sample per product
    CleanupPerformance,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Optional .env file.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    let cli_level = logger::level_for_verbosity(cli.verbose);
    let effective_log_level = cli_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, cli_level.is_some())?;

    info!(
        name = %config.name,
        data_dir = %config.data_dir.display(),
        database = %config.database_path().display(),
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    match cli.command {
        Command::Serve => {
            let shutdown = CancellationToken::new();
            let ctrlc_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("ctrl-c received, shutting down");
                    ctrlc_token.cancel();
                }
            });
            web::serve(config, shutdown).await
        }
        Command::CleanMetadata { input, output } => {
            let input = input.unwrap_or_else(|| config.data_file(ingest::RAW_METADATA_FILE));
            let output = output.unwrap_or_else(|| config.data_file(ingest::METADATA_FILE));
            let report = ingest::clean_metadata(&input, &output)?;
            println!("✓ {} metadata records written, {} lines skipped", report.written, report.failed);
            Ok(())
        }
        Command::CleanReviews { input, output } => {
            let input = input.unwrap_or_else(|| config.data_file(ingest::RAW_REVIEWS_FILE));
            let output = output.unwrap_or_else(|| config.data_file(ingest::REVIEWS_FILE));
            let report = ingest::clean_reviews(&input, &output)?;
            println!("✓ {} reviews written, {} lines skipped", report.written, report.failed);
            Ok(())
        }
        Command::PopulateProducts { file } => {
            let catalog = open_catalog(&config)?;
            let file = file.unwrap_or_else(|| config.data_file(ingest::METADATA_FILE));
            let report = ingest::populate_products(&catalog, &file)?;
            println!(
                "✓ {} products stored ({} without title, {} other categories, {} failed)",
                report.processed, report.skipped, report.filtered, report.failed
            );
            Ok(())
        }
        Command::PopulateReviews { file } => {
            let catalog = open_catalog(&config)?;
            let file = file.unwrap_or_else(|| config.data_file(ingest::REVIEWS_FILE));
            let report = ingest::populate_reviews(&catalog, &file)?;
            println!(
                "✓ {} reviews stored ({} for unknown products, {} failed)",
                report.processed, report.filtered, report.failed
            );
            Ok(())
        }
        Command::RemoveProductsWithZeroReviews => {
            let catalog = open_catalog(&config)?;
            let removed = ingest::remove_products_with_zero_reviews(&catalog)?;
            println!("✓ {removed} products without reviews removed");
            Ok(())
        }
        Command::GenerateSummaries { product } => {
            let catalog = open_catalog(&config)?;
            let provider = llm::providers::build(&config.llm, config.llm_api_key.clone())
                .map_err(|e| AppError::Llm(e.to_string()))?;
            let report =
                summaries::generate_all(&catalog, &provider, &config.prompts, product.as_deref()).await?;
            println!(
                "✓ {} summaries generated ({} failed, {} products without reviews)",
                report.generated, report.failed, report.skipped
            );
            Ok(())
        }
        Command::CleanupPerformance => {
            let catalog = open_catalog(&config)?;
            let removed = catalog.dedupe_performance()?;
            info!(removed, "duplicate performance records removed");
            println!("✓ {removed} duplicate performance records removed");
            Ok(())
        }
    }
}

fn open_catalog(config: &Config) -> Result<Catalog, AppError> {
    Catalog::open(&config.database_path())
}
