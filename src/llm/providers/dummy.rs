//! Dummy LLM provider: echoes the first line of the prompt back prefixed
//! with `[echo]`. Used for exercising the summary pipeline without a model.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let first = prompt.lines().next().unwrap_or_default();
        Ok(format!("[echo] {first}").trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_echoes_first_line() {
        let p = DummyProvider;
        assert_eq!(
            p.generate("summarise this\n\ngreat pan").await.unwrap(),
            "[echo] summarise this"
        );
    }

    #[tokio::test]
    async fn generate_empty_input() {
        let p = DummyProvider;
        assert_eq!(p.generate("").await.unwrap(), "[echo]");
    }
}
