//! The host platform's biometric capability.
//!
//! `BioKit` never touches the sensor or the secure hardware itself. Each platform supplies an
//! implementation of [`BiometricCapability`]:
//!
//! - iOS: Secure Enclave P-256 key with `.biometryCurrentSet` access control, `LocalAuthentication`
//!   for the prompt.
//! - Android: Android Keystore key with `setUserAuthenticationRequired(true)`, `BiometricPrompt`
//!   with a `CryptoObject` for the signature.
//!
//! [`software::SoftwareCapability`] is an in-process implementation for development and tests.

use strum::{Display, EnumString};

use crate::error::CapabilityError;

pub mod software;

/// Kind of biometric sensor available on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum, Display, EnumString)]
pub enum BiometryType {
    /// Apple Touch ID.
    #[strum(serialize = "TouchID")]
    TouchId,
    /// Apple Face ID.
    #[strum(serialize = "FaceID")]
    FaceId,
    /// Android class 3 biometrics (fingerprint, face or iris).
    #[strum(serialize = "Biometrics")]
    Biometrics,
}

impl BiometryType {
    /// Human-readable name of the sensor, suitable for a login button label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::TouchId => "Touch ID",
            Self::FaceId => "Face ID",
            Self::Biometrics => "Fingerprint",
        }
    }
}

/// Returns the human-readable name for an optional sensor type.
#[uniffi::export]
#[must_use]
pub fn biometry_display_name(biometry_type: Option<BiometryType>) -> String {
    biometry_type
        .map_or("Biometrics", BiometryType::display_name)
        .to_string()
}

/// Sensor availability as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SensorStatus {
    /// Whether a sensor is present, enabled and enrolled.
    pub available: bool,
    /// Sensor kind, when available.
    pub biometry_type: Option<BiometryType>,
}

/// Result of creating a key pair.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CreatedKeys {
    /// The public key, either PEM or base64 of the DER `SubjectPublicKeyInfo`.
    pub public_key: String,
}

/// A biometric-gated signing request.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SignatureRequest {
    /// Message shown in the prompt.
    pub prompt_message: String,
    /// Payload to sign, as UTF-8 text.
    pub payload: String,
    /// Label of the prompt's cancel button.
    pub cancel_button_text: String,
}

/// Outcome of a signing request.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SignatureResult {
    /// `false` when the user dismissed the prompt.
    pub success: bool,
    /// Base64 detached signature over the payload, present on success.
    pub signature: Option<String>,
}

/// Device biometric capability and the biometric-bound key pair it manages.
///
/// # Requirements
///
/// - The private key MUST NOT leave secure hardware and MUST only be usable after a successful
///   biometric prompt.
/// - `sign` MUST sign exactly the bytes of `payload` (SHA-256 with ECDSA P-256 or RSA PKCS#1 v1.5).
/// - A cancelled prompt resolves to `success == false` or [`CapabilityError::Cancelled`]; it
///   never leaves the future pending forever.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait BiometricCapability: Send + Sync {
    /// Reports whether a biometric sensor can be used.
    async fn is_sensor_available(&self) -> Result<SensorStatus, CapabilityError>;

    /// Reports whether the biometric-bound key pair exists.
    async fn keys_exist(&self) -> Result<bool, CapabilityError>;

    /// Creates the key pair, replacing any existing one.
    async fn create_keys(&self) -> Result<CreatedKeys, CapabilityError>;

    /// Returns the public half of the existing key pair, if any.
    async fn public_key(&self) -> Result<Option<String>, CapabilityError>;

    /// Deletes the key pair. Returns whether a key pair was deleted.
    async fn delete_keys(&self) -> Result<bool, CapabilityError>;

    /// Prompts the user and signs `request.payload` with the private key.
    async fn sign(
        &self,
        request: SignatureRequest,
    ) -> Result<SignatureResult, CapabilityError>;
}
