//! Ollama `/api/generate` provider with streamed responses.
//!
//! Ollama streams newline-delimited JSON objects, each carrying a fragment
//! in `response`; the final object has `done: true`. Fragments are
//! concatenated and the result trimmed.

use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    api_base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(
        api_base_url: String,
        model: String,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model })
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "sending ollama generate request");

        let response = self
            .client
            .post(&self.api_base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "ollama request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            error!(%status, "ollama returned HTTP error");
            return Err(ProviderError::Request(format!("HTTP {status}: {body}")));
        }

        let mut acc = StreamAccumulator::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| ProviderError::Request(format!("stream read: {e}")))?;
            acc.push(&bytes)?;
            if acc.done {
                break;
            }
        }
        let text = acc.finish()?;
        trace!(len = text.len(), "ollama response complete");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Reassembles NDJSON lines that may be split across network chunks.
#[derive(Debug, Default)]
struct StreamAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl StreamAccumulator {
    fn push(&mut self, bytes: &[u8]) -> Result<(), ProviderError> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line)?;
        }
        Ok(())
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<(), ProviderError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let chunk: GenerateChunk = serde_json::from_slice(line)
            .map_err(|e| ProviderError::Response(format!("bad stream line: {e}")))?;
        if let Some(err) = chunk.error {
            return Err(ProviderError::Request(err));
        }
        self.text.push_str(&chunk.response);
        self.done |= chunk.done;
        Ok(())
    }

    fn finish(mut self) -> Result<String, ProviderError> {
        let rest = std::mem::take(&mut self.pending);
        self.consume_line(&rest)?;
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::Response("empty response".into()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_provider() {
        let p = OllamaProvider::new(
            "http://127.0.0.1:11434/api/generate".into(),
            "llama3.2".into(),
            5,
        );
        assert!(p.is_ok());
    }

    #[test]
    fn accumulates_split_lines() {
        let mut acc = StreamAccumulator::default();
        acc.push(b"{\"response\":\" Sturdy\",\"done\":false}\n{\"resp").unwrap();
        acc.push(b"onse\":\" handle.\",\"done\":false}\n").unwrap();
        acc.push(b"{\"response\":\"\",\"done\":true}\n").unwrap();
        assert!(acc.done);
        assert_eq!(acc.finish().unwrap(), "Sturdy handle.");
    }

    #[test]
    fn final_line_without_newline_is_consumed() {
        let mut acc = StreamAccumulator::default();
        acc.push(b"{\"response\":\"ok\",\"done\":true}").unwrap();
        assert_eq!(acc.finish().unwrap(), "ok");
    }

    #[test]
    fn error_line_fails() {
        let mut acc = StreamAccumulator::default();
        let err = acc.push(b"{\"error\":\"model not found\"}\n").unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn empty_stream_is_an_error() {
        let acc = StreamAccumulator::default();
        assert!(acc.finish().is_err());
    }

    #[test]
    fn garbage_line_is_malformed() {
        let mut acc = StreamAccumulator::default();
        assert!(matches!(
            acc.push(b"not json\n"),
            Err(ProviderError::Response(_))
        ));
    }
}
