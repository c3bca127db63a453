mod types;

use crate::completion::types::{GenerateContentRequest, GenerateContentResponse};
use crate::config::GeminiConfig;
use crate::session::SessionState;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::log::{debug, error, warn};

/// Sent when the API answered but without any usable text.
pub const NO_RESPONSE_REPLY: &str = "⚠️ IA não respondeu.";

/// Sent when the API could not be reached or returned garbage.
pub const TRANSPORT_ERROR_REPLY: &str = "❌ Erro ao conectar com a IA.";

/// Sent when no API key has been configured yet.
pub const NOT_CONFIGURED_REPLY: &str =
    "A IA não está configurada. Acesse /setup e salve sua chave.";

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unparsable response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Maps a prompt onto a reply. Implementations never fail: every error
/// is turned into a human readable reply string.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> String;
}

#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    session: Arc<SessionState>,
    url: String,
}
impl GeminiClient {
    pub fn new(config: &GeminiConfig, session: Arc<SessionState>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            session,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
        })
    }

    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> Result<Option<String>, CompletionError> {
        let response = self
            .http_client
            .post(&self.url)
            .query(&[("key", api_key)])
            .json(&GenerateContentRequest::single_prompt(prompt))
            .send()
            .await?;

        // Error payloads still parse, they just carry no candidates.
        let status = response.status();
        if !status.is_success() {
            warn!("Gemini API returned status {status}");
        }

        let body = response.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&body)?;
        Ok(parsed.first_text().map(str::to_string))
    }
}

#[async_trait]
impl Completion for GeminiClient {
    async fn complete(&self, prompt: &str) -> String {
        let Some(credential) = self.session.credential().await else {
            warn!("Completion requested before any API key was configured");
            return NOT_CONFIGURED_REPLY.to_string();
        };

        debug!("Sending request to Gemini API");
        match self.generate(credential.expose(), prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!("Gemini response did not contain any candidate text");
                NO_RESPONSE_REPLY.to_string()
            }
            Err(e) => {
                error!("Gemini error: {e}");
                TRANSPORT_ERROR_REPLY.to_string()
            }
        }
    }
}
