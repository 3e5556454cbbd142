use crate::broker::EphemeralCredential;
use crate::consts::{OPENAI_BETA_HEADER, OPENAI_BETA_REALTIME, SDP_CONTENT_TYPE};
use crate::error::SessionError;
use crate::rtc::SessionDescription;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::CONTENT_TYPE;

/// Offer/answer exchange with the provider's session-description endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignalingClient: Send + Sync {
    /// Sends the local offer and returns the provider's answer. Consumes the credential.
    async fn exchange(
        &self,
        model: &str,
        credential: EphemeralCredential,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError>;
}

pub struct HttpSignalingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSignalingClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SignalingClient for HttpSignalingClient {
    async fn exchange(
        &self,
        model: &str,
        credential: EphemeralCredential,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError> {
        let url = format!("{}/realtime", self.base_url);
        tracing::debug!(%url, model, offer_bytes = offer.sdp().len(), "sending SDP offer");

        let response = self
            .client
            .post(&url)
            .query(&[("model", model)])
            .bearer_auth(credential.expose())
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .header(OPENAI_BETA_HEADER, OPENAI_BETA_REALTIME)
            .body(offer.sdp().to_string())
            .send()
            .await
            .map_err(|e| SessionError::Signaling {
                detail: Some(e.to_string()),
            })?;
        drop(credential);

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "SDP exchange rejected");
            let body = response.text().await.unwrap_or_default();
            let detail = body.trim();
            return Err(SessionError::Signaling {
                detail: (!detail.is_empty()).then(|| detail.to_string()),
            });
        }

        let body = response.text().await.map_err(|e| SessionError::Signaling {
            detail: Some(format!("could not read SDP answer: {e}")),
        })?;
        if body.trim().is_empty() {
            tracing::warn!(status = %status, "SDP exchange returned an empty answer");
            return Err(SessionError::Signaling {
                detail: Some("empty SDP answer".to_string()),
            });
        }

        tracing::debug!(answer_bytes = body.len(), "received SDP answer");
        Ok(SessionDescription::answer(body))
    }
}
