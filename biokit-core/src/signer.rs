//! Biometric signing of login challenges.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::{
    capability::{BiometricCapability, SignatureRequest},
    defaults::ResolvedConfig,
    error::{BioKitError, SigningFailure},
    nonce::Nonce,
};

/// Cancellation of a single login attempt. Once cancelled it stays cancelled.
#[derive(Debug, Default)]
pub struct CancelSignal {
    cancelled: AtomicBool,
    wake: Notify,
}

impl CancelSignal {
    /// Cancels the attempt, whether or not its prompt is showing yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Whether [`Self::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the attempt is cancelled.
    pub async fn cancelled(&self) {
        // registered before the flag is read, so a cancel in between still wakes us
        let notified = self.wake.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Obtains the device signature over a nonce through the biometric prompt.
pub struct ChallengeSigner {
    capability: Arc<dyn BiometricCapability>,
    prompt_message: String,
    cancel_button_text: String,
    prompt_timeout: Duration,
}

impl ChallengeSigner {
    pub(crate) fn new(capability: Arc<dyn BiometricCapability>, config: &ResolvedConfig) -> Self {
        Self {
            capability,
            prompt_message: config.prompt_message.clone(),
            cancel_button_text: config.cancel_button_text.clone(),
            prompt_timeout: config.prompt_timeout,
        }
    }

    /// Prompts the user and signs exactly `nonce.value()`.
    ///
    /// Returns the base64 detached signature. The prompt is bounded by the configured timeout
    /// and by `cancel`; both resolve as [`SigningFailure::UserCancelled`]. An attempt cancelled
    /// before this is called never shows a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::SigningFailed`] with the distinct failure reason.
    pub async fn sign(
        &self,
        nonce: &Nonce,
        cancel: &CancelSignal,
    ) -> Result<String, BioKitError> {
        if cancel.is_cancelled() {
            log::info!("attempt cancelled before the biometric prompt");
            return Err(SigningFailure::UserCancelled.into());
        }

        // a missing key never shows a prompt that cannot succeed
        let has_keys = self.capability.keys_exist().await.map_err(SigningFailure::from)?;
        if !has_keys {
            return Err(SigningFailure::NoKeys.into());
        }

        let request = SignatureRequest {
            prompt_message: self.prompt_message.clone(),
            payload: nonce.value().to_string(),
            cancel_button_text: self.cancel_button_text.clone(),
        };

        let prompt = tokio::time::timeout(self.prompt_timeout, self.capability.sign(request));

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                log::info!("biometric prompt cancelled by the app");
                return Err(SigningFailure::UserCancelled.into());
            }
            outcome = prompt => outcome,
        };

        let Ok(result) = outcome else {
            log::info!(
                "biometric prompt timed out after {}s",
                self.prompt_timeout.as_secs()
            );
            return Err(SigningFailure::UserCancelled.into());
        };

        let result = result.map_err(SigningFailure::from)?;
        match (result.success, result.signature) {
            (true, Some(signature)) if !signature.is_empty() => Ok(signature),
            (true, _) => Err(SigningFailure::SensorError {
                message: "provider reported success without a signature".to_string(),
            }
            .into()),
            (false, _) => Err(SigningFailure::UserCancelled.into()),
        }
    }
}
