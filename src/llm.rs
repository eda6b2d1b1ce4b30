//! Language model backends for response generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Anything that completes a prompt
#[async_trait]
pub trait Generate: Send + Sync {
    /// Generate a completion for a fully rendered prompt
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LlmProvider {
    Ollama { base_url: String },
    OpenAI { api_key: String },
}

/// Non-streaming completion client for Ollama or `OpenAI`
#[derive(Debug, Clone)]
pub struct LanguageModel {
    client: reqwest::Client,
    model: String,
    provider: LlmProvider,
}

impl LanguageModel {
    /// Create a client for a local Ollama server
    ///
    /// # Errors
    ///
    /// Returns error if the base URL or model is empty
    pub fn ollama(base_url: String, model: String) -> Result<Self> {
        if base_url.trim().is_empty() || model.trim().is_empty() {
            return Err(Error::Config(
                "Ollama URL and language model are required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            model,
            provider: LlmProvider::Ollama {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        })
    }

    /// Create a client for `OpenAI` chat completions
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn openai(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for generation".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            model,
            provider: LlmProvider::OpenAI { api_key },
        })
    }

    /// Model name
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::items_after_statements)]
    async fn generate_ollama(&self, base_url: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            response: String,
        }

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{base_url}/api/generate"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Ollama generate error {status}: {body}"
            )));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }

    #[allow(clippy::items_after_statements)]
    async fn generate_openai(&self, api_key: &str, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
        }

        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: Option<String>,
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "OpenAI chat error {status}: {body}"
            )));
        }

        let result: ChatResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Generation("empty completion".to_string()))
    }
}

#[async_trait]
impl Generate for LanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "generating");

        match &self.provider {
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, prompt).await,
            LlmProvider::OpenAI { api_key } => self.generate_openai(api_key, prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_requires_key() {
        assert!(LanguageModel::openai(String::new(), "gpt-4o-mini".to_string()).is_err());
    }

    #[test]
    fn test_ollama_requires_model() {
        assert!(LanguageModel::ollama("http://localhost:11434".to_string(), " ".to_string()).is_err());

        let llm = LanguageModel::ollama(
            "http://localhost:11434/".to_string(),
            "gemma3:4b-it-qat".to_string(),
        )
        .unwrap();
        assert_eq!(llm.model(), "gemma3:4b-it-qat");
    }
}
