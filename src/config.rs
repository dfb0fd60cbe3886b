//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `--config`), then applies `RECOMMENDER_DATA_DIR`
//! and `RECOMMENDER_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Socket address to bind the HTTP listener to.
    pub bind: String,
    /// Search results per page.
    pub page_size: usize,
    /// Recommendations shown per strategy on the product page.
    pub recommendation_count: usize,
    /// Reviews per page on the product page and `/api/reviews/`.
    pub reviews_page_size: usize,
}

/// Recommendation engine limits.
#[derive(Debug, Clone)]
pub struct RecommendConfig {
    /// Top-k returned by each strategy.
    pub max_results: usize,
    /// Products considered by the review-text strategy.
    pub review_product_limit: usize,
}

/// Ollama `/api/generate` provider configuration (`[llm.ollama]`).
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"ollama"`, `"openai"`).
    /// Maps to `default` in `[llm]`.
    pub provider: String,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

/// Prompts used by the summary generator.
#[derive(Debug, Clone)]
pub struct SummaryPrompts {
    pub positive: String,
    pub negative: String,
    /// Cap on the joined review text, in chars; 0 means uncapped.
    pub max_review_chars: usize,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Directory holding dataset files (already expanded, no `~`).
    pub data_dir: PathBuf,
    /// Database file, absolute or relative to `data_dir`.
    pub database: PathBuf,
    pub log_level: String,
    pub web: WebConfig,
    pub recommend: RecommendConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var. Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub prompts: SummaryPrompts,
}

impl Config {
    /// Absolute (or cwd-relative) path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            self.data_dir.join(&self.database)
        }
    }

    /// Resolve a dataset file name against `data_dir`.
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    web: RawWeb,
    #[serde(default)]
    recommend: RawRecommend,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    summaries: RawSummaries,
}

#[derive(Deserialize)]
struct RawApp {
    #[serde(default = "default_name")]
    name: String,
    data_dir: String,
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Deserialize)]
struct RawWeb {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_recommendation_count")]
    recommendation_count: usize,
    #[serde(default = "default_reviews_page_size")]
    reviews_page_size: usize,
}

impl Default for RawWeb {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            page_size: default_page_size(),
            recommendation_count: default_recommendation_count(),
            reviews_page_size: default_reviews_page_size(),
        }
    }
}

#[derive(Deserialize)]
struct RawRecommend {
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default = "default_review_product_limit")]
    review_product_limit: usize,
}

impl Default for RawRecommend {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            review_product_limit: default_review_product_limit(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    ollama: RawOllamaConfig,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            ollama: RawOllamaConfig::default(),
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawOllamaConfig {
    #[serde(default = "default_ollama_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_ollama_model")]
    model: String,
    #[serde(default = "default_ollama_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOllamaConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_ollama_api_base_url(),
            model: default_ollama_model(),
            timeout_seconds: default_ollama_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawSummaries {
    #[serde(default = "default_positive_prompt")]
    positive_prompt: String,
    #[serde(default = "default_negative_prompt")]
    negative_prompt: String,
    #[serde(default = "default_max_review_chars")]
    max_review_chars: usize,
}

impl Default for RawSummaries {
    fn default() -> Self {
        Self {
            positive_prompt: default_positive_prompt(),
            negative_prompt: default_negative_prompt(),
            max_review_chars: default_max_review_chars(),
        }
    }
}

fn default_name() -> String { "product-recommender".to_string() }
fn default_database() -> String { "db.sqlite3".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_bind() -> String { "127.0.0.1:8000".to_string() }
fn default_page_size() -> usize { 20 }
fn default_recommendation_count() -> usize { 3 }
fn default_reviews_page_size() -> usize { 10 }
fn default_max_results() -> usize { 10 }
fn default_review_product_limit() -> usize { 5000 }
fn default_max_review_chars() -> usize { 48_000 }
fn default_llm_provider() -> String { "ollama".to_string() }
fn default_ollama_api_base_url() -> String { "http://localhost:11434/api/generate".to_string() }
fn default_ollama_model() -> String { "llama3.2".to_string() }
fn default_ollama_timeout_seconds() -> u64 { 300 }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }

pub fn default_positive_prompt() -> String {
    "For the following review text, summarise one positive aspect about the product in a single sentence".to_string()
}

pub fn default_negative_prompt() -> String {
    "For the following review text, summarise one negative aspect about the product in a single sentence".to_string()
}

/// Load config from `path` (or `config/default.toml`), then apply env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let data_dir_override = env::var("RECOMMENDER_DATA_DIR").ok();
    let log_level_override = env::var("RECOMMENDER_LOG_LEVEL").ok();
    let mut config = load_from(
        Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH)),
        data_dir_override.as_deref(),
        log_level_override.as_deref(),
    )?;
    config.llm_api_key = env::var("LLM_API_KEY").ok();
    Ok(config)
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    data_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let app = parsed.app;
    let data_dir = expand_home(data_dir_override.unwrap_or(&app.data_dir));
    let log_level = log_level_override.unwrap_or(&app.log_level).to_string();

    crate::logger::parse_level(&log_level)
        .map_err(|e| AppError::Config(format!("[app] log_level: {e}")))?;

    if parsed.web.page_size == 0 || parsed.web.reviews_page_size == 0 {
        return Err(AppError::Config("web page sizes must be > 0".into()));
    }

    Ok(Config {
        name: app.name,
        data_dir,
        database: expand_home(&app.database),
        log_level,
        web: WebConfig {
            bind: parsed.web.bind,
            page_size: parsed.web.page_size,
            recommendation_count: parsed.web.recommendation_count,
            reviews_page_size: parsed.web.reviews_page_size,
        },
        recommend: RecommendConfig {
            max_results: parsed.recommend.max_results,
            review_product_limit: parsed.recommend.review_product_limit,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            ollama: OllamaConfig {
                api_base_url: parsed.llm.ollama.api_base_url,
                model: parsed.llm.ollama.model,
                timeout_seconds: parsed.llm.ollama.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: None,
        prompts: SummaryPrompts {
            positive: parsed.summaries.positive_prompt,
            negative: parsed.summaries.negative_prompt,
            max_review_chars: parsed.summaries.max_review_chars,
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests: dummy LLM, no API keys, no external calls.
    pub fn test_default(data_dir: &Path) -> Self {
        Self {
            name: "test".into(),
            data_dir: data_dir.to_path_buf(),
            database: PathBuf::from("test.sqlite3"),
            log_level: "info".into(),
            web: WebConfig {
                bind: "127.0.0.1:0".into(),
                page_size: default_page_size(),
                recommendation_count: default_recommendation_count(),
                reviews_page_size: default_reviews_page_size(),
            },
            recommend: RecommendConfig {
                max_results: default_max_results(),
                review_product_limit: default_review_product_limit(),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                ollama: OllamaConfig {
                    api_base_url: "http://localhost:0/api/generate".into(),
                    model: "test-model".into(),
                    timeout_seconds: 1,
                },
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            prompts: SummaryPrompts {
                positive: default_positive_prompt(),
                negative: default_negative_prompt(),
                max_review_chars: default_max_review_chars(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[app]
data_dir = "~/.recommender"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_uses_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.name, "product-recommender");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.web.recommendation_count, 3);
        assert_eq!(cfg.recommend.max_results, 10);
        assert_eq!(cfg.recommend.review_product_limit, 5000);
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.ollama.model, "llama3.2");
        assert!(cfg.prompts.positive.contains("positive aspect"));
    }

    #[test]
    fn database_resolves_against_data_dir() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/data"), None).unwrap();
        assert_eq!(cfg.database_path(), PathBuf::from("/tmp/data/db.sqlite3"));
    }

    #[test]
    fn absolute_database_is_kept() {
        let f = write_toml(
            r#"
[app]
data_dir = "data"
database = "/var/lib/recommender.db"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.database_path(), PathBuf::from("/var/lib/recommender.db"));
    }

    #[test]
    fn llm_sections_parse() {
        let f = write_toml(
            r#"
[app]
data_dir = "data"

[llm]
default = "openai"

[llm.openai]
model = "gpt-4o"
timeout_seconds = 5
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "gpt-4o");
        assert_eq!(cfg.llm.openai.timeout_seconds, 5);
        assert_eq!(cfg.llm.ollama.model, "llama3.2");
    }

    #[test]
    fn zero_page_size_rejected() {
        let f = write_toml(
            r#"
[app]
data_dir = "data"

[web]
page_size = 0
"#,
        );
        assert!(load_from(f.path(), None, None).is_err());
    }

    #[test]
    fn bad_log_level_rejected() {
        let f = write_toml(MINIMAL_TOML);
        let err = load_from(f.path(), None, Some("chatty")).unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.recommender");
        assert!(expanded.starts_with(&home));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn shipped_default_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let cfg = load_from(&path, None, None).unwrap();
        assert_eq!(cfg.web.bind, "127.0.0.1:8000");
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.prompts.max_review_chars, 48_000);
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/override"), Some("debug")).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/override"));
        assert_eq!(cfg.log_level, "debug");
    }
}
