use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use realtime_voice_types::SessionRequest;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("provider refused the session request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Transport(String),
}

/// The upstream that turns a session request into a session with a client secret.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the provider's session document untouched.
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<serde_json::Value, ProviderError>;
}

pub struct OpenAiSessionProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiSessionProvider {
    pub fn new(api_key: SecretString, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionProvider for OpenAiSessionProvider {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/realtime/sessions", self.base_url);
        tracing::debug!(
            %url,
            model = request.model(),
            voice = %request.voice(),
            "creating realtime session"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", "realtime=v1")
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }
}
