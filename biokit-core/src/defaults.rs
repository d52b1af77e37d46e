//! Endpoint paths, timeouts and the validated handshake configuration.

use std::time::Duration;

use reqwest::Url;

use crate::error::BioKitError;

/// Path of the single-use challenge endpoint.
pub const NONCE_PATH: &str = "/accounts/biometric-nonce";
/// Path of the signed challenge verification endpoint.
pub const AUTH_PATH: &str = "/accounts/biometric-auth";

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_PROMPT_MESSAGE: &str = "Sign in";
pub(crate) const DEFAULT_CANCEL_BUTTON_TEXT: &str = "Cancel";

/// Handshake settings supplied by the host app.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct HandshakeConfig {
    /// Backend base URL, e.g. `https://api.example.com`. Must be `https` unless it points at a
    /// loopback host.
    pub base_url: String,
    /// Timeout for each network round trip. Defaults to 10 seconds.
    #[uniffi(default = None)]
    pub request_timeout_ms: Option<u64>,
    /// Upper bound for the biometric prompt, after which the attempt counts as cancelled.
    /// Defaults to 60 seconds.
    #[uniffi(default = None)]
    pub prompt_timeout_ms: Option<u64>,
    /// Message shown in the biometric prompt.
    #[uniffi(default = None)]
    pub prompt_message: Option<String>,
    /// Label of the prompt's cancel button.
    #[uniffi(default = None)]
    pub cancel_button_text: Option<String>,
}

/// [`HandshakeConfig`] after validation and with defaults applied.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub prompt_timeout: Duration,
    pub prompt_message: String,
    pub cancel_button_text: String,
}

impl ResolvedConfig {
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

impl TryFrom<&HandshakeConfig> for ResolvedConfig {
    type Error = BioKitError;

    fn try_from(config: &HandshakeConfig) -> Result<Self, Self::Error> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| BioKitError::InvalidInput {
                attribute: "base_url".to_string(),
                reason: e.to_string(),
            })?;

        let secure = match base_url.scheme() {
            "https" => true,
            "http" => is_loopback(&base_url),
            _ => false,
        };
        if !secure {
            return Err(BioKitError::InvalidInput {
                attribute: "base_url".to_string(),
                reason: "only https endpoints are allowed".to_string(),
            });
        }

        let non_zero = |attribute: &str, value: Option<u64>, default: Duration| match value {
            Some(0) => Err(BioKitError::InvalidInput {
                attribute: attribute.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            Some(ms) => Ok(Duration::from_millis(ms)),
            None => Ok(default),
        };

        Ok(Self {
            request_timeout: non_zero(
                "request_timeout_ms",
                config.request_timeout_ms,
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            prompt_timeout: non_zero(
                "prompt_timeout_ms",
                config.prompt_timeout_ms,
                DEFAULT_PROMPT_TIMEOUT,
            )?,
            prompt_message: config
                .prompt_message
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_MESSAGE.to_string()),
            cancel_button_text: config
                .cancel_button_text
                .clone()
                .unwrap_or_else(|| DEFAULT_CANCEL_BUTTON_TEXT.to_string()),
            base_url,
        })
    }
}

fn is_loopback(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    host == "localhost"
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn config(base_url: &str) -> HandshakeConfig {
        HandshakeConfig {
            base_url: base_url.to_string(),
            ..HandshakeConfig::default()
        }
    }

    #[test_case("https://api.example.com" => true; "https")]
    #[test_case("http://127.0.0.1:4010" => true; "loopback ipv4")]
    #[test_case("http://localhost:8080" => true; "localhost")]
    #[test_case("http://[::1]:8080" => true; "loopback ipv6")]
    #[test_case("http://api.example.com" => false; "plain http")]
    #[test_case("ftp://api.example.com" => false; "other scheme")]
    #[test_case("not a url" => false; "garbage")]
    fn test_base_url_validation(base_url: &str) -> bool {
        ResolvedConfig::try_from(&config(base_url)).is_ok()
    }

    #[test]
    fn test_defaults_applied() {
        let resolved = ResolvedConfig::try_from(&config("https://api.example.com")).unwrap();
        assert_eq!(resolved.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(resolved.prompt_timeout, DEFAULT_PROMPT_TIMEOUT);
        assert_eq!(resolved.prompt_message, DEFAULT_PROMPT_MESSAGE);
        assert_eq!(resolved.cancel_button_text, DEFAULT_CANCEL_BUTTON_TEXT);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut cfg = config("https://api.example.com");
        cfg.prompt_timeout_ms = Some(0);
        let err = ResolvedConfig::try_from(&cfg).unwrap_err();
        assert!(matches!(
            err,
            BioKitError::InvalidInput { attribute, .. } if attribute == "prompt_timeout_ms"
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let resolved = ResolvedConfig::try_from(&config("https://api.example.com/v1/")).unwrap();
        assert_eq!(
            resolved.endpoint(NONCE_PATH),
            "https://api.example.com/v1/accounts/biometric-nonce"
        );
    }
}
