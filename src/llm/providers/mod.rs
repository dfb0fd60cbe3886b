//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory, called before summary generation.

pub mod dummy;
pub mod ollama;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "ollama" => {
            let o = &config.ollama;
            let p = ollama::OllamaProvider::new(
                o.api_base_url.clone(),
                o.model.clone(),
                o.timeout_seconds,
            )?;
            Ok(LlmProvider::Ollama(p))
        }
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builds_each_known_provider() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp")).llm;
        for (name, label) in [("dummy", "dummy"), ("ollama", "ollama"), ("openai", "openai")] {
            cfg.provider = name.to_string();
            let p = build(&cfg, None).expect("provider builds");
            assert_eq!(p.name(), label);
        }
    }

    #[test]
    fn unknown_provider_errors() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp")).llm;
        cfg.provider = "mystery".into();
        let err = build(&cfg, None).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(ref n) if n == "mystery"));
    }
}
