//! Text embedding for retrieval and wake word similarity

use async_trait::async_trait;

use crate::{Error, Result};

/// Default Ollama endpoint
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Anything that maps text to a dense vector
#[async_trait]
pub trait Embed: Send + Sync {
    /// Generate embeddings for multiple texts, in input order
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails or returns nothing
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }
}

/// Embedding backend
#[derive(Debug, Clone, PartialEq, Eq)]
enum EmbeddingProvider {
    Ollama { base_url: String },
    OpenAI { api_key: String },
}

/// Text embedder backed by Ollama or `OpenAI`
#[derive(Debug, Clone)]
pub struct Embedder {
    client: reqwest::Client,
    model: String,
    provider: EmbeddingProvider,
}

impl Embedder {
    /// Create an embedder for a local Ollama server
    ///
    /// # Errors
    ///
    /// Returns error if the base URL or model is empty
    pub fn ollama(base_url: String, model: String) -> Result<Self> {
        if base_url.trim().is_empty() || model.trim().is_empty() {
            return Err(Error::Config(
                "Ollama URL and embedding model are required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            model,
            provider: EmbeddingProvider::Ollama {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        })
    }

    /// Create an embedder using `OpenAI`'s embedding API
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn openai(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for embeddings".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            model,
            provider: EmbeddingProvider::OpenAI { api_key },
        })
    }

    /// Model name
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn embed_ollama(&self, base_url: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbedResponse {
            embeddings: Vec<Vec<f32>>,
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{base_url}/api/embed"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Ollama embed error {status}: {body}")));
        }

        let result: EmbedResponse = response.json().await?;
        Ok(result.embeddings)
    }

    async fn embed_openai(&self, api_key: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
            index: usize,
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Embedding API error {status}: {body}")));
        }

        let mut result: EmbeddingResponse = response.json().await?;

        // Sort by index to maintain input order
        result.data.sort_by_key(|d| d.index);

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Serialize embedding to bytes for `SQLite` storage
    #[must_use]
    pub fn to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

#[async_trait]
impl Embed for Embedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = match &self.provider {
            EmbeddingProvider::Ollama { base_url } => self.embed_ollama(base_url, texts).await?,
            EmbeddingProvider::OpenAI { api_key } => self.embed_openai(api_key, texts).await?,
        };

        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        tracing::trace!(count = texts.len(), model = %self.model, "embedded batch");
        Ok(embeddings)
    }
}
