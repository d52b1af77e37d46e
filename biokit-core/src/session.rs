//! Per-attempt login input, the signed challenge, and the credentials the backend returns.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::nonce::Nonce;

/// Caller-supplied input for one login attempt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct LoginRequest {
    /// Backend user the device key is registered to.
    pub user_id: String,
    /// Refresh token to forward to the backend. Only sent when the backend requires it; the value
    /// is never logged.
    #[uniffi(default = None)]
    pub refresh_token: Option<String>,
}

/// The body posted to the verification endpoint. Built once per attempt and sent once.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedChallenge {
    user_id: String,
    device_id: String,
    nonce: String,
    signature: String,
    public_key_pem: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret"
    )]
    refresh_token: Option<SecretString>,
}

#[allow(clippy::ref_option)]
fn serialize_secret<S: Serializer>(
    value: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

impl SignedChallenge {
    /// Assembles the challenge, consuming the nonce it was signed over.
    #[must_use]
    pub fn new(
        request: LoginRequest,
        device_id: String,
        nonce: Nonce,
        signature: String,
        public_key_pem: String,
    ) -> Self {
        Self {
            user_id: request.user_id,
            device_id,
            nonce: nonce.into_value(),
            signature,
            public_key_pem,
            refresh_token: request.refresh_token.map(SecretString::from),
        }
    }
}

/// Session tokens issued by the backend. Ownership passes to the app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, uniffi::Record)]
pub struct SessionCredentials {
    /// Bearer token for API calls.
    #[serde(alias = "accessToken", alias = "AccessToken")]
    pub access_token: String,
    /// `OpenID` identity token, if issued.
    #[serde(default, alias = "idToken", alias = "IdToken")]
    pub id_token: Option<String>,
    /// Refresh token, if issued.
    #[serde(default, alias = "refreshToken", alias = "RefreshToken")]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default, alias = "expiresIn", alias = "ExpiresIn")]
    pub expires_in: Option<u64>,
    /// Token type, usually `Bearer`.
    #[serde(default, alias = "tokenType", alias = "TokenType")]
    pub token_type: Option<String>,
}

/// Response shapes accepted from the verification endpoint: the credentials themselves, or
/// wrapped the way Cognito's custom auth flow returns them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CredentialsEnvelope {
    Cognito {
        #[serde(rename = "AuthenticationResult", alias = "authenticationResult")]
        authentication_result: SessionCredentials,
    },
    Flat(SessionCredentials),
}

impl From<CredentialsEnvelope> for SessionCredentials {
    fn from(envelope: CredentialsEnvelope) -> Self {
        match envelope {
            CredentialsEnvelope::Cognito {
                authentication_result,
            } => authentication_result,
            CredentialsEnvelope::Flat(credentials) => credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn challenge(refresh_token: Option<&str>) -> SignedChallenge {
        SignedChallenge::new(
            LoginRequest {
                user_id: "user-1".to_string(),
                refresh_token: refresh_token.map(str::to_string),
            },
            "ios_17.2_390x844_3".to_string(),
            Nonce::new("nonce-1".to_string(), 1_900_000_000),
            "c2ln".to_string(),
            "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n".to_string(),
        )
    }

    #[test]
    fn test_wire_format() {
        let body = serde_json::to_value(challenge(None)).unwrap();
        assert_eq!(
            body,
            json!({
                "userId": "user-1",
                "deviceId": "ios_17.2_390x844_3",
                "nonce": "nonce-1",
                "signature": "c2ln",
                "publicKeyPem": "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n",
            })
        );
    }

    #[test]
    fn test_refresh_token_only_sent_when_supplied_and_never_debug_printed() {
        let challenge = challenge(Some("long-lived-secret"));
        let body = serde_json::to_value(&challenge).unwrap();
        assert_eq!(body["refreshToken"], "long-lived-secret");
        assert!(!format!("{challenge:?}").contains("long-lived-secret"));
    }

    #[test]
    fn test_parses_flat_and_cognito_credentials() {
        let flat: CredentialsEnvelope = serde_json::from_value(json!({
            "accessToken": "at",
            "idToken": "it",
            "expiresIn": 3600,
        }))
        .unwrap();
        let cognito: CredentialsEnvelope = serde_json::from_value(json!({
            "AuthenticationResult": {
                "AccessToken": "at",
                "IdToken": "it",
                "RefreshToken": "rt",
                "ExpiresIn": 3600,
                "TokenType": "Bearer",
            },
            "ChallengeParameters": {},
        }))
        .unwrap();

        let flat = SessionCredentials::from(flat);
        assert_eq!(flat.access_token, "at");
        assert_eq!(flat.refresh_token, None);

        let cognito = SessionCredentials::from(cognito);
        assert_eq!(cognito.refresh_token.as_deref(), Some("rt"));
        assert_eq!(cognito.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_missing_access_token_is_rejected() {
        let parsed = serde_json::from_value::<CredentialsEnvelope>(json!({ "idToken": "it" }));
        assert!(parsed.is_err());
    }
}
