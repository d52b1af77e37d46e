//! Client for the signed challenge verification endpoint.

use serde::Deserialize;

use crate::{
    defaults::{ResolvedConfig, AUTH_PATH},
    error::BioKitError,
    http_request::Request,
    session::{CredentialsEnvelope, SessionCredentials, SignedChallenge},
};

/// Error body returned by the backend on rejection.
#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(rename = "_message", alias = "message")]
    message: String,
}

/// Exchanges a signed challenge for session credentials.
pub struct AuthExchangeClient {
    url: String,
    request: Request,
}

impl AuthExchangeClient {
    pub(crate) fn new(config: &ResolvedConfig) -> Self {
        Self {
            url: config.endpoint(AUTH_PATH),
            request: Request::new(config.request_timeout),
        }
    }

    /// Posts the challenge once. Takes it by value: a challenge is never sent twice.
    ///
    /// The backend validates the nonce (exists, unexpired, unused), verifies the signature
    /// against the supplied public key and marks the nonce consumed.
    ///
    /// # Errors
    ///
    /// - [`BioKitError::NetworkError`] if the request does not complete.
    /// - [`BioKitError::AuthRejected`] on a non-2xx status, carrying the server's `_message`.
    /// - [`BioKitError::MalformedResponse`] if a 2xx body holds no credentials.
    pub async fn exchange(
        &self,
        challenge: SignedChallenge,
    ) -> Result<SessionCredentials, BioKitError> {
        let response = self
            .request
            .handle(self.request.post(&self.url).json(&challenge))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BioKitError::AuthRejected {
                status: status.as_u16(),
                reason: rejection_reason(status.as_u16(), &body),
            });
        }

        let body = response.text().await.map_err(|e| BioKitError::NetworkError {
            url: self.url.clone(),
            status: Some(status.as_u16()),
            error: format!("failed reading response body: {e}"),
        })?;

        serde_json::from_str::<CredentialsEnvelope>(&body)
            .map(SessionCredentials::from)
            .map_err(|e| BioKitError::MalformedResponse {
                reason: format!("no session credentials in response: {e}"),
            })
    }
}

fn rejection_reason(status: u16, body: &str) -> String {
    if let Ok(rejection) = serde_json::from_str::<RejectionBody>(body) {
        return rejection.message;
    }
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}
