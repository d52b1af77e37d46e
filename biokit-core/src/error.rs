use thiserror::Error;

/// Reason a biometric signing step did not produce a signature.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum SigningFailure {
    /// The user dismissed the prompt, or it was cancelled or timed out.
    UserCancelled,
    /// The sensor refused the operation (lockout, nothing enrolled, platform error).
    SensorError {
        /// Message reported by the platform.
        message: String,
    },
    /// No biometric-bound key pair exists on the device.
    NoKeys,
}

impl std::fmt::Display for SigningFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserCancelled => write!(f, "biometric prompt was cancelled"),
            Self::SensorError { message } => write!(f, "biometric sensor error: {message}"),
            Self::NoKeys => write!(f, "no biometric keys on this device"),
        }
    }
}

/// Error outputs from `BioKit`
#[derive(Debug, Error, uniffi::Error)]
pub enum BioKitError {
    /// The device has no usable biometric sensor, or login is disabled until keys exist.
    #[error("biometric login is not available on this device: {reason}")]
    CapabilityUnavailable {
        /// Why the capability is unavailable.
        reason: String,
    },
    /// The biometric-bound key pair could not be created or read.
    #[error("biometric keys are unavailable: {reason}")]
    KeyProvisioningFailed {
        /// Details from the capability provider.
        reason: String,
    },
    /// A server challenge could not be obtained.
    #[error("could not fetch a login challenge: {reason}")]
    NonceFetchFailed {
        /// What went wrong with the nonce request.
        reason: String,
    },
    /// The device did not sign the challenge.
    #[error("signing failed: {reason}")]
    SigningFailed {
        /// The distinct signing failure.
        reason: SigningFailure,
    },
    /// The backend refused the signed challenge.
    #[error("login rejected: {reason}")]
    AuthRejected {
        /// HTTP status returned by the backend.
        status: u16,
        /// Message supplied by the backend.
        reason: String,
    },
    /// A successful response could not be understood.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// Parsing details.
        reason: String,
    },
    /// Network connection error with details
    #[error("network error on {url}: {error}")]
    NetworkError {
        /// The URL that was being requested.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// The underlying error.
        error: String,
    },
    /// The presented input is not valid for the requested operation
    #[error("invalid input on {attribute}: {reason}")]
    InvalidInput {
        /// The offending attribute.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Another login attempt owns the handshake; this trigger was ignored.
    #[error("a login attempt is already in progress")]
    HandshakeInProgress,
}

impl BioKitError {
    /// Short name of the failure, stable across releases. Useful for analytics and log filters.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CapabilityUnavailable { .. } => "capability_unavailable",
            Self::KeyProvisioningFailed { .. } => "key_provisioning_failed",
            Self::NonceFetchFailed { .. } => "nonce_fetch_failed",
            Self::SigningFailed { .. } => "signing_failed",
            Self::AuthRejected { .. } => "auth_rejected",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::NetworkError { .. } => "network_error",
            Self::InvalidInput { .. } => "invalid_input",
            Self::HandshakeInProgress => "handshake_in_progress",
        }
    }
}

impl From<SigningFailure> for BioKitError {
    fn from(reason: SigningFailure) -> Self {
        Self::SigningFailed { reason }
    }
}

/// Errors raised by a [`crate::BiometricCapability`] implementation.
#[derive(Debug, Error, uniffi::Error)]
pub enum CapabilityError {
    /// The user dismissed the biometric prompt.
    #[error("user cancelled the prompt")]
    Cancelled,
    /// Too many failed attempts; the sensor is locked.
    #[error("biometric sensor is locked out")]
    Lockout,
    /// No biometric is enrolled on the device.
    #[error("no biometric enrolled")]
    NotEnrolled,
    /// The key pair does not exist.
    #[error("biometric key pair not found")]
    KeyNotFound,
    /// Any other platform failure.
    #[error("platform error: {0}")]
    Platform(String),
    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for CapabilityError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

impl From<CapabilityError> for SigningFailure {
    fn from(error: CapabilityError) -> Self {
        match error {
            CapabilityError::Cancelled => Self::UserCancelled,
            CapabilityError::KeyNotFound => Self::NoKeys,
            other => Self::SensorError {
                message: other.to_string(),
            },
        }
    }
}
