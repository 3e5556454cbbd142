use crate::error::SessionError;
use crate::types::audio::{DEFAULT_VOICE, Voice};
use crate::types::{BrokerErrorBody, SessionPreferences, SessionResponse};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;

/// Short-lived bearer token that authorizes exactly one SDP exchange.
///
/// It is moved into the signaling call, so a grant cannot be used twice.
#[derive(Debug)]
pub struct EphemeralCredential(SecretString);

impl EphemeralCredential {
    pub fn new(token: &str) -> Self {
        Self(SecretString::from(token.to_string()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Effective session parameters after the broker applied its allow-lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    model: String,
    voice: Voice,
    instructions: Option<String>,
}

impl SessionConfig {
    pub fn new(model: &str, voice: Voice, instructions: Option<&str>) -> Self {
        Self {
            model: model.to_string(),
            voice,
            instructions: instructions.map(str::to_string),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

#[derive(Debug)]
pub struct SessionGrant {
    credential: EphemeralCredential,
    config: SessionConfig,
    expires_at: Option<i64>,
}

impl SessionGrant {
    pub fn new(credential: EphemeralCredential, config: SessionConfig) -> Self {
        Self {
            credential,
            config,
            expires_at: None,
        }
    }

    /// Builds a grant out of a broker response. The broker may have replaced anything that was
    /// requested, so its answer wins; the request and then `fallback_model` fill gaps.
    pub fn from_response(
        response: SessionResponse,
        requested: &SessionPreferences,
        fallback_model: &str,
    ) -> Result<Self, SessionError> {
        let secret = response
            .client_secret()
            .and_then(|secret| secret.value())
            .ok_or_else(|| {
                SessionError::Credential(
                    "Missing client secret in realtime session response.".to_string(),
                )
            })?;

        let model = response
            .model()
            .or(requested.model())
            .unwrap_or(fallback_model);
        let voice = response
            .voice()
            .cloned()
            .or_else(|| requested.voice().and_then(|v| Voice::from_str(v).ok()))
            .unwrap_or(DEFAULT_VOICE);
        let instructions = response.instructions().or(requested.instructions());

        Ok(Self {
            credential: EphemeralCredential::new(secret),
            config: SessionConfig::new(model, voice, instructions),
            expires_at: response.client_secret().and_then(|secret| secret.expires_at()),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn into_parts(self) -> (EphemeralCredential, SessionConfig) {
        (self.credential, self.config)
    }
}

/// The backend relay that mints ephemeral credentials.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn create_session(
        &self,
        preferences: &SessionPreferences,
    ) -> Result<SessionGrant, SessionError>;
}

/// Talks to the broker over HTTP: `POST` JSON preferences, `201` with the session on success.
pub struct HttpCredentialBroker {
    client: reqwest::Client,
    url: String,
    fallback_model: String,
}

impl HttpCredentialBroker {
    pub fn new(url: &str, fallback_model: &str) -> Self {
        Self::with_client(reqwest::Client::new(), url, fallback_model)
    }

    pub fn with_client(client: reqwest::Client, url: &str, fallback_model: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            fallback_model: fallback_model.to_string(),
        }
    }
}

#[async_trait]
impl CredentialBroker for HttpCredentialBroker {
    async fn create_session(
        &self,
        preferences: &SessionPreferences,
    ) -> Result<SessionGrant, SessionError> {
        tracing::debug!(url = %self.url, "requesting realtime session");
        let response = self
            .client
            .post(&self.url)
            .json(preferences)
            .send()
            .await
            .map_err(|e| SessionError::Credential(format!("Failed to reach session broker: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<BrokerErrorBody>().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                error = ?body.error(),
                details = ?body.details(),
                "session broker refused"
            );
            let message = body.error().map(str::to_string).unwrap_or_else(|| {
                format!("Failed to create realtime session ({})", status.as_u16())
            });
            return Err(SessionError::Credential(message));
        }

        let session = response.json::<SessionResponse>().await.map_err(|e| {
            SessionError::Credential(format!("Malformed realtime session response: {e}"))
        })?;
        SessionGrant::from_response(session, preferences, &self.fallback_model)
    }
}
