//! Client for the single-use login challenge endpoint.

use serde::Deserialize;

use crate::{
    defaults::{ResolvedConfig, NONCE_PATH},
    error::BioKitError,
    http_request::Request,
};

/// A server-issued single-use challenge.
///
/// Deliberately not `Clone`: a nonce is moved into the one [`crate::SignedChallenge`] it ends up
/// in, so the same value cannot be submitted twice by accident.
#[derive(Debug, PartialEq, Eq)]
pub struct Nonce {
    value: String,
    expires_at: u64,
}

impl Nonce {
    /// Builds a nonce from its parts.
    #[must_use]
    pub const fn new(value: String, expires_at: u64) -> Self {
        Self { value, expires_at }
    }

    /// The opaque challenge value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry as unix seconds.
    #[must_use]
    pub const fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whether the nonce has expired at `now` (unix seconds).
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn into_value(self) -> String {
        self.value
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NonceResponse {
    nonce: String,
    expires_at: Timestamp,
}

/// Backends disagree on timestamp encoding, so both RFC 3339 strings and unix numbers are taken.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Unix(u64),
    Text(String),
}

/// Unix values above this are taken to be milliseconds (it is year 33658 in seconds).
const MILLIS_THRESHOLD: u64 = 1_000_000_000_000;

impl Timestamp {
    fn to_unix_seconds(&self) -> Result<u64, String> {
        match self {
            Self::Unix(value) if *value > MILLIS_THRESHOLD => Ok(value / 1000),
            Self::Unix(value) => Ok(*value),
            Self::Text(text) => {
                if let Ok(value) = text.parse::<u64>() {
                    return Self::Unix(value).to_unix_seconds();
                }
                let parsed = chrono::DateTime::parse_from_rfc3339(text)
                    .map_err(|e| format!("invalid expiresAt {text:?}: {e}"))?;
                u64::try_from(parsed.timestamp())
                    .map_err(|_| format!("expiresAt {text:?} is before the unix epoch"))
            }
        }
    }
}

impl TryFrom<NonceResponse> for Nonce {
    type Error = String;

    fn try_from(response: NonceResponse) -> Result<Self, Self::Error> {
        if response.nonce.is_empty() {
            return Err("empty nonce".to_string());
        }
        Ok(Self {
            expires_at: response.expires_at.to_unix_seconds()?,
            value: response.nonce,
        })
    }
}

/// Fetches login challenges. One round trip per call; no caching, no retries.
pub struct NonceClient {
    url: String,
    request: Request,
}

impl NonceClient {
    pub(crate) fn new(config: &ResolvedConfig) -> Self {
        Self {
            url: config.endpoint(NONCE_PATH),
            request: Request::new(config.request_timeout),
        }
    }

    /// Requests a fresh nonce.
    ///
    /// # Errors
    ///
    /// Every failure, including transport errors, is reported as
    /// [`BioKitError::NonceFetchFailed`].
    pub async fn fetch_nonce(&self) -> Result<Nonce, BioKitError> {
        let failed = |reason: String| BioKitError::NonceFetchFailed { reason };

        let response = self
            .request
            .handle(self.request.get(&self.url))
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!(
                "nonce endpoint returned {}: {body}",
                status.as_u16()
            )));
        }

        let body: NonceResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable nonce response: {e}")))?;

        Nonce::try_from(body).map_err(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandshakeConfig;
    use mockito::Server;
    use test_case::test_case;

    fn client(base_url: &str) -> NonceClient {
        let config = ResolvedConfig::try_from(&HandshakeConfig {
            base_url: base_url.to_string(),
            ..HandshakeConfig::default()
        })
        .unwrap();
        NonceClient::new(&config)
    }

    #[test_case("1900000000" => 1_900_000_000; "unix seconds")]
    #[test_case("1900000000000" => 1_900_000_000; "unix millis")]
    #[test_case(r#""1900000000""# => 1_900_000_000; "stringified seconds")]
    #[test_case(r#""2030-03-17T17:46:40Z""# => 1_900_000_000; "rfc3339 utc")]
    #[test_case(r#""2030-03-17T18:46:40+01:00""# => 1_900_000_000; "rfc3339 offset")]
    fn test_expires_at_formats(raw: &str) -> u64 {
        let timestamp: Timestamp = serde_json::from_str(raw).unwrap();
        timestamp.to_unix_seconds().unwrap()
    }

    #[test]
    fn test_expiry() {
        let nonce = Nonce::new("n".to_string(), 100);
        assert!(!nonce.is_expired(99));
        assert!(nonce.is_expired(100));
    }

    #[tokio::test]
    async fn test_fetch_nonce_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", NONCE_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"nonce": "c2luZ2xlLXVzZQ", "expiresAt": "2030-03-17T17:46:40Z"}"#)
            .expect(1)
            .create_async()
            .await;

        let nonce = client(&server.url()).fetch_nonce().await.unwrap();

        mock.assert_async().await;
        assert_eq!(nonce.value(), "c2luZ2xlLXVzZQ");
        assert_eq!(nonce.expires_at(), 1_900_000_000);
    }

    #[tokio::test]
    async fn test_fetch_nonce_server_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", NONCE_PATH)
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_nonce().await.unwrap_err();

        mock.assert_async().await;
        match err {
            BioKitError::NonceFetchFailed { reason } => {
                assert_eq!(reason, "nonce endpoint returned 500: boom");
            }
            other => panic!("expected NonceFetchFailed, got {other:?}"),
        }
    }

    #[test_case(r#"{"expiresAt": 1900000000}"#; "missing nonce")]
    #[test_case(r#"{"nonce": "", "expiresAt": 1900000000}"#; "empty nonce")]
    #[test_case(r#"{"nonce": "abc", "expiresAt": "tomorrow"}"#; "bad expiry")]
    #[test_case("<html>"; "not json")]
    #[tokio::test]
    async fn test_fetch_nonce_malformed(body: &str) {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", NONCE_PATH)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_nonce().await.unwrap_err();
        assert!(matches!(err, BioKitError::NonceFetchFailed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_nonce_unreachable() {
        let err = client("http://127.0.0.1:9").fetch_nonce().await.unwrap_err();
        assert!(matches!(err, BioKitError::NonceFetchFailed { .. }));
    }
}
