#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! `BioKit` runs the biometric login handshake for mobile apps.
//!
//! A device-bound key pair is unlocked by the platform's biometric prompt and signs a single-use
//! server nonce; the signature is exchanged for session credentials. The sensor and the secure
//! hardware stay on the host platform behind [`BiometricCapability`].

mod error;
pub use error::*;

/// Forwards `log` records to a logger supplied by the host app.
pub mod logger;

mod defaults;
pub use defaults::{HandshakeConfig, AUTH_PATH, NONCE_PATH};

/// The biometric capability the host platform provides.
pub mod capability;
pub use capability::{
    BiometricCapability, BiometryType, CreatedKeys, SensorStatus, SignatureRequest,
    SignatureResult,
};

mod crypto;
pub use crypto::{public_key_to_pem, verify_signature};

mod device;
pub use device::*;

mod exchange;
pub use exchange::AuthExchangeClient;

mod handshake;
pub use handshake::*;

mod keys;
pub use keys::*;

mod nonce;
pub use nonce::{Nonce, NonceClient};

mod session;
pub use session::{LoginRequest, SessionCredentials, SignedChallenge};

mod signer;
pub use signer::{CancelSignal, ChallengeSigner};

// private modules
mod http_request;

uniffi::setup_scaffolding!("biokit_core");
