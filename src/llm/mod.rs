//! LLM client for page entity extraction.
//!
//! Supports Ollama for local inference and OpenAI-compatible APIs for
//! hosted providers. One request per logical page; the reply is strict
//! JSON parsed by [`contract`].

mod config;
mod contract;
mod prompts;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use config::{LlmConfig, LlmProvider};
pub use contract::{
    parse_extraction, ExtractedBrand, ExtractedEvent, ExtractedLocation, ExtractedPhotographer,
    ExtractedSkater, ExtractedSpot, ExtractedTrick, PageExtraction,
};

/// LLM client for page processing.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

/// OpenAI-compatible chat request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// Chat message with either plain string content or content parts
/// (text + image) for vision requests.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 min timeout for slow models
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the LLM service is reachable.
    pub async fn is_available(&self) -> bool {
        let url = match self.config.provider {
            LlmProvider::Ollama => format!("{}/api/tags", self.config.endpoint),
            LlmProvider::OpenAI => format!("{}/v1/models", self.config.endpoint),
        };
        let mut req = self.client.get(&url);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Extract entities from one page's OCR text.
    ///
    /// Empty or whitespace-only text short-circuits to an empty extraction
    /// without calling the model. A reply that cannot be parsed as the JSON
    /// contract also yields an empty extraction (logged, no retry).
    pub async fn extract_page(&self, page_text: &str) -> Result<PageExtraction, LlmError> {
        if page_text.trim().is_empty() {
            return Ok(PageExtraction::default());
        }

        let truncated = self.truncate_content(page_text);
        let prompt = self
            .config
            .get_extraction_prompt()
            .replace("{page_text}", truncated);

        let model = self.config.model.clone();
        let response = self.complete(&prompt, None, &model).await?;

        Ok(self.parse_reply(&response))
    }

    /// Extract entities from one page image (vision mode).
    ///
    /// The PNG bytes are base64-encoded and attached to the request.
    pub async fn extract_page_vision(&self, image_png: &[u8]) -> Result<PageExtraction, LlmError> {
        let encoded = STANDARD.encode(image_png);
        let prompt = self.config.get_vision_prompt().to_string();

        let model = self.config.vision_model.clone();
        let response = self.complete(&prompt, Some(encoded), &model).await?;

        Ok(self.parse_reply(&response))
    }

    fn parse_reply(&self, response: &str) -> PageExtraction {
        match parse_extraction(response) {
            Some(extraction) => {
                debug!("Parsed {} entities from reply", extraction.len());
                extraction
            }
            None => {
                warn!(
                    "Model reply was not valid extraction JSON ({} chars), treating page as empty",
                    response.len()
                );
                PageExtraction::default()
            }
        }
    }

    /// Truncate content to configured maximum (UTF-8 safe).
    fn truncate_content<'a>(&self, text: &'a str) -> &'a str {
        if text.len() <= self.config.max_content_chars {
            return text;
        }
        // Find a valid UTF-8 boundary at or before max_content_chars
        let mut end = self.config.max_content_chars;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }

    /// Run one completion against the configured provider.
    async fn complete(
        &self,
        prompt: &str,
        image_b64: Option<String>,
        model: &str,
    ) -> Result<String, LlmError> {
        match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(prompt, image_b64, model).await,
            LlmProvider::OpenAI => self.call_openai(prompt, image_b64, model).await,
        }
    }

    /// Call Ollama's generate API.
    async fn call_ollama(
        &self,
        prompt: &str,
        image_b64: Option<String>,
        model: &str,
    ) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            images: image_b64.map(|img| vec![img]),
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    /// Call an OpenAI-compatible chat completions API.
    async fn call_openai(
        &self,
        prompt: &str,
        image_b64: Option<String>,
        model: &str,
    ) -> Result<String, LlmError> {
        let content = match image_b64 {
            Some(img) => serde_json::json!([
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{}", img) }
                }
            ]),
            None => serde_json::Value::String(prompt.to_string()),
        };

        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Chat response had no choices".to_string()))
    }
}

/// Errors that can occur during LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),
    /// API returned an error
    #[error("API error: {0}")]
    Api(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert!(config.endpoint.contains("localhost"));
        assert!(config.extraction_prompt.is_none());
        assert!(config.get_extraction_prompt().contains("{page_text}"));
        assert!(config.get_vision_prompt().contains("JSON"));
    }

    #[test]
    fn test_truncate_content_respects_char_boundaries() {
        let config = LlmConfig::default().with_endpoint("http://localhost:11434");
        let mut client = LlmClient::new(config);
        client.config.max_content_chars = 5;

        // "héllo" is 6 bytes; byte 5 falls inside no character here, but
        // place a multi-byte char straddling the cut to check walk-back
        let text = "aaaaé";
        let truncated = client.truncate_content(text);
        assert!(truncated.len() <= 5);
        assert!(text.starts_with(truncated));

        client.config.max_content_chars = 100;
        assert_eq!(client.truncate_content("short"), "short");
    }

    #[test]
    fn test_empty_reply_parses_as_empty_extraction() {
        let client = LlmClient::new(LlmConfig::default());
        let extraction = client.parse_reply("total garbage, no json");
        assert!(extraction.is_empty());

        let extraction = client.parse_reply(r#"{"skaters": [{"name": "Natas Kaupas"}]}"#);
        assert_eq!(extraction.skaters.len(), 1);
    }
}
