//! In-process P-256 capability for development, the CLI and tests.
//!
//! The key lives in process memory and the "prompt" is a scripted [`PromptBehavior`]. Never ship
//! this in an app; it offers none of the hardware guarantees a real provider gives.

use std::sync::Mutex;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;

use super::{
    BiometricCapability, BiometryType, CreatedKeys, SensorStatus, SignatureRequest,
    SignatureResult,
};
use crate::error::{BioKitError, CapabilityError};

/// How the simulated prompt responds to a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    /// The user authenticates.
    Approve,
    /// The user taps the cancel button (`success == false`).
    Cancel,
    /// The sensor is locked after too many attempts.
    Lockout,
    /// The user authenticates after the given delay.
    Delay(Duration),
    /// The user never answers.
    Hang,
}

#[derive(Debug)]
struct SoftwareState {
    sensor: SensorStatus,
    prompt: PromptBehavior,
    signing_key: Option<SigningKey>,
    prompts: usize,
    signed_payloads: Vec<String>,
}

/// A [`BiometricCapability`] backed by an in-memory P-256 key.
#[derive(Debug)]
pub struct SoftwareCapability {
    state: Mutex<SoftwareState>,
}

impl Default for SoftwareCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareCapability {
    /// A device with an available sensor, no keys, and a prompt the user approves.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SoftwareState {
                sensor: SensorStatus {
                    available: true,
                    biometry_type: Some(BiometryType::Biometrics),
                },
                prompt: PromptBehavior::Approve,
                signing_key: None,
                prompts: 0,
                signed_payloads: Vec::new(),
            }),
        }
    }

    /// A device without a usable sensor.
    #[must_use]
    pub fn without_sensor() -> Self {
        let capability = Self::new();
        capability.lock().sensor = SensorStatus {
            available: false,
            biometry_type: None,
        };
        capability
    }

    /// Restores a key previously exported with [`Self::export_pkcs8_pem`].
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::InvalidInput`] if the PEM is not a P-256 PKCS#8 private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, BioKitError> {
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| BioKitError::InvalidInput {
                attribute: "private_key".to_string(),
                reason: e.to_string(),
            })?;
        let capability = Self::new();
        capability.lock().signing_key = Some(signing_key);
        Ok(capability)
    }

    /// Exports the current key as PKCS#8 PEM, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::InvalidInput`] if encoding fails.
    pub fn export_pkcs8_pem(&self) -> Result<Option<String>, BioKitError> {
        self.lock()
            .signing_key
            .as_ref()
            .map(|key| {
                key.to_pkcs8_pem(LineEnding::LF)
                    .map(|pem| pem.to_string())
                    .map_err(|e| BioKitError::InvalidInput {
                        attribute: "private_key".to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }

    /// Changes how subsequent prompts respond.
    pub fn set_prompt_behavior(&self, prompt: PromptBehavior) {
        self.lock().prompt = prompt;
    }

    /// Changes the reported sensor type.
    pub fn set_biometry_type(&self, biometry_type: BiometryType) {
        self.lock().sensor.biometry_type = Some(biometry_type);
    }

    /// Number of prompts shown so far.
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.lock().prompts
    }

    /// Every payload signed so far, in order.
    #[must_use]
    pub fn signed_payloads(&self) -> Vec<String> {
        self.lock().signed_payloads.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SoftwareState> {
        // a poisoned lock only means a test panicked mid-call; the state itself stays valid
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn encoded_public_key(key: &SigningKey) -> Result<String, CapabilityError> {
        key.verifying_key()
            .to_public_key_der()
            .map(|der| STANDARD.encode(der.as_bytes()))
            .map_err(|e| CapabilityError::Platform(e.to_string()))
    }

    fn sign_payload(&self, payload: &str) -> Result<SignatureResult, CapabilityError> {
        let mut state = self.lock();
        let key = state
            .signing_key
            .as_ref()
            .ok_or(CapabilityError::KeyNotFound)?;
        let signature: Signature = key.sign(payload.as_bytes());
        state.signed_payloads.push(payload.to_string());
        Ok(SignatureResult {
            success: true,
            signature: Some(STANDARD.encode(signature.to_der().as_bytes())),
        })
    }
}

#[async_trait::async_trait]
impl BiometricCapability for SoftwareCapability {
    async fn is_sensor_available(&self) -> Result<SensorStatus, CapabilityError> {
        Ok(self.lock().sensor.clone())
    }

    async fn keys_exist(&self) -> Result<bool, CapabilityError> {
        Ok(self.lock().signing_key.is_some())
    }

    async fn create_keys(&self) -> Result<CreatedKeys, CapabilityError> {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = Self::encoded_public_key(&signing_key)?;
        self.lock().signing_key = Some(signing_key);
        Ok(CreatedKeys { public_key })
    }

    async fn public_key(&self) -> Result<Option<String>, CapabilityError> {
        self.lock()
            .signing_key
            .as_ref()
            .map(Self::encoded_public_key)
            .transpose()
    }

    async fn delete_keys(&self) -> Result<bool, CapabilityError> {
        Ok(self.lock().signing_key.take().is_some())
    }

    async fn sign(
        &self,
        request: SignatureRequest,
    ) -> Result<SignatureResult, CapabilityError> {
        let prompt = {
            let mut state = self.lock();
            if !state.sensor.available {
                return Err(CapabilityError::NotEnrolled);
            }
            state.prompts += 1;
            state.prompt
        };

        match prompt {
            PromptBehavior::Approve => self.sign_payload(&request.payload),
            PromptBehavior::Cancel => Ok(SignatureResult {
                success: false,
                signature: None,
            }),
            PromptBehavior::Lockout => Err(CapabilityError::Lockout),
            PromptBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.sign_payload(&request.payload)
            }
            PromptBehavior::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;

    fn request(payload: &str) -> SignatureRequest {
        SignatureRequest {
            prompt_message: "Sign in".to_string(),
            payload: payload.to_string(),
            cancel_button_text: "Cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signature_verifies_against_exported_key() {
        let capability = SoftwareCapability::new();
        let CreatedKeys { public_key } = capability.create_keys().await.unwrap();

        let result = capability.sign(request("nonce-abc")).await.unwrap();
        assert!(result.success);
        let signature = result.signature.unwrap();

        assert!(verify_signature(&public_key, "nonce-abc", &signature).unwrap());
        assert!(!verify_signature(&public_key, "nonce-abd", &signature).unwrap());
        assert_eq!(capability.signed_payloads(), vec!["nonce-abc".to_string()]);
    }

    #[tokio::test]
    async fn test_sign_without_keys() {
        let capability = SoftwareCapability::new();
        let err = capability.sign(request("nonce")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::KeyNotFound));
        assert_eq!(capability.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_reports_unsuccessful_result() {
        let capability = SoftwareCapability::new();
        capability.create_keys().await.unwrap();
        capability.set_prompt_behavior(PromptBehavior::Cancel);

        let result = capability.sign(request("nonce")).await.unwrap();
        assert_eq!(
            result,
            SignatureResult {
                success: false,
                signature: None
            }
        );
        assert!(capability.signed_payloads().is_empty());
    }

    #[tokio::test]
    async fn test_pkcs8_round_trip_keeps_public_key() {
        let capability = SoftwareCapability::new();
        let created = capability.create_keys().await.unwrap();
        let pem = capability.export_pkcs8_pem().unwrap().unwrap();

        let restored = SoftwareCapability::from_pkcs8_pem(&pem).unwrap();
        assert!(restored.keys_exist().await.unwrap());
        assert_eq!(
            restored.public_key().await.unwrap(),
            Some(created.public_key)
        );
    }

    #[tokio::test]
    async fn test_delete_keys() {
        let capability = SoftwareCapability::new();
        assert!(!capability.delete_keys().await.unwrap());
        capability.create_keys().await.unwrap();
        assert!(capability.delete_keys().await.unwrap());
        assert!(!capability.keys_exist().await.unwrap());
        assert_eq!(capability.public_key().await.unwrap(), None);
    }
}
