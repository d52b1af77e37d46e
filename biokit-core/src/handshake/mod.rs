//! The biometric login handshake: capability check, then nonce, signature and exchange.

use std::sync::{Arc, Mutex, PoisonError};

use strum::Display;

use crate::{
    capability::{BiometricCapability, BiometryType},
    defaults::ResolvedConfig,
    device::{DeviceIdentity, DeviceInfo},
    error::{BioKitError, SigningFailure},
    exchange::AuthExchangeClient,
    keys::KeyProvisioner,
    nonce::{Nonce, NonceClient},
    session::{LoginRequest, SessionCredentials, SignedChallenge},
    signer::{CancelSignal, ChallengeSigner},
    HandshakeConfig,
};

mod state;

use state::{ConsumedNonces, StateCell};
pub use state::HandshakeState;

/// How many submitted nonces are remembered to detect a server re-issuing one.
const CONSUMED_NONCE_CAPACITY: usize = 32;

/// Receives every handshake state transition, including the transient `Success` and `Failed`.
///
/// Called synchronously from the task driving the handshake; implementations should hand the
/// state to their UI thread and return.
#[uniffi::export(with_foreign)]
pub trait HandshakeObserver: Send + Sync {
    /// The handshake moved to `state`.
    fn on_state_changed(&self, state: HandshakeState);
}

/// Outcome of [`BiometricLogin::check_capability`].
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CapabilityReport {
    /// Whether a login can start: the sensor is usable and keys are provisioned.
    pub ready: bool,
    /// Whether the sensor is present, enabled and enrolled.
    pub sensor_available: bool,
    /// Whether the biometric-bound key pair exists.
    pub keys_ready: bool,
    /// Sensor kind, when reported.
    pub biometry_type: Option<BiometryType>,
    /// Human-readable sensor name for the login button.
    pub display_name: String,
    /// Why the capability is unavailable, when it is.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Display)]
#[strum(serialize_all = "snake_case")]
enum Step {
    CheckCapability,
    FetchNonce,
    Sign,
    ReadPublicKey,
    Exchange,
}

/// Drives biometric login for one device.
///
/// At most one capability check or login attempt runs at a time; concurrent triggers are
/// refused with [`BioKitError::HandshakeInProgress`]. Every attempt fetches its own nonce and
/// nothing is retried.
#[derive(uniffi::Object)]
pub struct BiometricLogin {
    capability: Arc<dyn BiometricCapability>,
    provisioner: KeyProvisioner,
    nonces: NonceClient,
    signer: ChallengeSigner,
    exchange: AuthExchangeClient,
    device_id: DeviceIdentity,
    state: StateCell,
    unavailable_reason: Mutex<Option<String>>,
    consumed: Mutex<ConsumedNonces>,
    attempt_cancel: Mutex<Option<Arc<CancelSignal>>>,
    observer: Option<Arc<dyn HandshakeObserver>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl BiometricLogin {
    /// Creates the handshake for this device.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::InvalidInput`] if the configuration is invalid.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(
        capability: Arc<dyn BiometricCapability>,
        config: HandshakeConfig,
        device: DeviceInfo,
        observer: Option<Arc<dyn HandshakeObserver>>,
    ) -> Result<Self, BioKitError> {
        let config = ResolvedConfig::try_from(&config)?;
        Ok(Self {
            provisioner: KeyProvisioner::new(capability.clone()),
            nonces: NonceClient::new(&config),
            signer: ChallengeSigner::new(capability.clone(), &config),
            exchange: AuthExchangeClient::new(&config),
            device_id: DeviceIdentity::from(&device),
            capability,
            state: StateCell::new(),
            unavailable_reason: Mutex::new(None),
            consumed: Mutex::new(ConsumedNonces::with_capacity(CONSUMED_NONCE_CAPACITY)),
            attempt_cancel: Mutex::new(None),
            observer,
        })
    }

    /// The current handshake state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state.load()
    }

    /// The device identity sent with every login.
    #[must_use]
    pub fn device_id(&self) -> String {
        self.device_id.to_string()
    }

    /// Checks the sensor and makes sure keys exist, ending in `Ready` or `NotAvailable`.
    ///
    /// Keys are only created when the sensor is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::HandshakeInProgress`] if a check or login is already running.
    pub async fn check_capability(&self) -> Result<CapabilityReport, BioKitError> {
        let guard = self.begin(HandshakeState::CheckingCapability)?;
        let report = self.run_capability_check().await;
        guard.finish(if report.ready {
            HandshakeState::Ready
        } else {
            HandshakeState::NotAvailable
        });
        Ok(report)
    }

    /// Runs one login attempt.
    ///
    /// From `Idle` the capability is checked first; from `Ready` the attempt starts directly.
    /// The state returns to `Idle` once the attempt finishes, so the next call checks again.
    ///
    /// # Errors
    ///
    /// - [`BioKitError::HandshakeInProgress`] if a check or login is already running.
    /// - [`BioKitError::CapabilityUnavailable`] if the device cannot do biometric login. Call
    ///   [`Self::check_capability`] again once the user has enrolled.
    /// - The error of the first failing step otherwise.
    pub async fn login(
        &self,
        request: LoginRequest,
    ) -> Result<SessionCredentials, BioKitError> {
        let (guard, cancel) = loop {
            match self.state.load() {
                HandshakeState::NotAvailable => {
                    return Err(BioKitError::CapabilityUnavailable {
                        reason: self.unavailable_reason(),
                    });
                }
                HandshakeState::Ready => {
                    if let Some(cancel) = self.enter_authenticating(HandshakeState::Ready) {
                        break (self.hold(), cancel);
                    }
                }
                HandshakeState::Idle => {
                    if let Some(guard) = self
                        .try_begin(HandshakeState::Idle, HandshakeState::CheckingCapability)
                    {
                        let report = self.run_capability_check().await;
                        if !report.ready {
                            guard.finish(HandshakeState::NotAvailable);
                            return Err(BioKitError::CapabilityUnavailable {
                                reason: self.unavailable_reason(),
                            });
                        }
                        // observers hear Ready; the tag stays busy until Authenticating
                        self.notify(HandshakeState::Ready);
                        let Some(cancel) =
                            self.enter_authenticating(HandshakeState::CheckingCapability)
                        else {
                            return Err(BioKitError::HandshakeInProgress);
                        };
                        break (guard, cancel);
                    }
                }
                _ => {
                    log::debug!("login refused, handshake already in progress");
                    return Err(BioKitError::HandshakeInProgress);
                }
            }
        };

        let outcome = self.authenticate(request, &cancel).await;
        self.release_cancel();
        match outcome {
            Ok(credentials) => {
                log::info!("biometric login succeeded on device {}", self.device_id);
                guard.advance(HandshakeState::Success);
                guard.finish(HandshakeState::Idle);
                Ok(credentials)
            }
            Err(e) => {
                guard.advance(HandshakeState::Failed);
                guard.finish(HandshakeState::Idle);
                Err(e)
            }
        }
    }

    /// Cancels the running login attempt. A prompt on screen resolves as cancelled and a prompt
    /// not shown yet never appears; the attempt fails with `SigningFailed(UserCancelled)`.
    ///
    /// Returns whether an attempt was running.
    pub fn cancel(&self) -> bool {
        let running = self
            .attempt_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(cancel) = running else {
            return false;
        };
        cancel.cancel();
        true
    }

    /// Creates the key pair if it does not exist yet. Returns whether usable keys are present.
    pub async fn ensure_keys(&self) -> bool {
        self.provisioner.ensure_keys().await
    }

    /// Deletes the key pair and returns the handshake to `Idle`. The observer only hears the
    /// final `Idle`.
    ///
    /// # Errors
    ///
    /// - [`BioKitError::HandshakeInProgress`] if a check or login is running.
    /// - [`BioKitError::KeyProvisioningFailed`] if the provider refuses.
    pub async fn reset_keys(&self) -> Result<bool, BioKitError> {
        let guard = self.claim(HandshakeState::CheckingCapability)?;
        let deleted = self.provisioner.reset_keys().await;
        guard.finish(HandshakeState::Idle);
        deleted
    }
}

impl BiometricLogin {
    /// Takes ownership of the handshake from any state that is not busy.
    fn begin(&self, next: HandshakeState) -> Result<AttemptGuard<'_>, BioKitError> {
        let guard = self.claim(next)?;
        self.notify(next);
        Ok(guard)
    }

    /// Like [`Self::begin`], without telling the observer.
    fn claim(&self, next: HandshakeState) -> Result<AttemptGuard<'_>, BioKitError> {
        loop {
            let current = self.state.load();
            if current.is_busy() {
                return Err(BioKitError::HandshakeInProgress);
            }
            if self.state.transition(current, next) {
                return Ok(self.hold());
            }
        }
    }

    fn try_begin(
        &self,
        current: HandshakeState,
        next: HandshakeState,
    ) -> Option<AttemptGuard<'_>> {
        if !self.state.transition(current, next) {
            return None;
        }
        self.notify(next);
        Some(self.hold())
    }

    const fn hold(&self) -> AttemptGuard<'_> {
        AttemptGuard {
            login: self,
            armed: true,
        }
    }

    /// Moves the tag from `current` to `Authenticating` and installs the attempt's cancel signal
    /// under one lock, so [`Self::cancel`] reaches every attempt that got this far.
    fn enter_authenticating(&self, current: HandshakeState) -> Option<Arc<CancelSignal>> {
        let cancel = Arc::new(CancelSignal::default());
        {
            let mut slot = self
                .attempt_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.state.transition(current, HandshakeState::Authenticating) {
                return None;
            }
            *slot = Some(cancel.clone());
        }
        self.notify(HandshakeState::Authenticating);
        Some(cancel)
    }

    fn release_cancel(&self) {
        self.attempt_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn notify(&self, state: HandshakeState) {
        log::debug!("handshake state: {state}");
        if let Some(observer) = &self.observer {
            observer.on_state_changed(state);
        }
    }

    fn unavailable_reason(&self) -> String {
        self.unavailable_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "biometric capability has not been checked".to_string())
    }

    async fn run_capability_check(&self) -> CapabilityReport {
        let (sensor_available, biometry_type, mut reason) =
            match self.capability.is_sensor_available().await {
                Ok(status) if status.available => (true, status.biometry_type, None),
                Ok(status) => (
                    false,
                    status.biometry_type,
                    Some("no usable biometric sensor".to_string()),
                ),
                Err(e) => {
                    let reason = e.to_string();
                    self.log_failure(
                        Step::CheckCapability,
                        BioKitError::CapabilityUnavailable {
                            reason: reason.clone(),
                        },
                    );
                    (false, None, Some(reason))
                }
            };

        let keys_ready = sensor_available && self.provisioner.ensure_keys().await;
        if sensor_available && !keys_ready {
            reason = Some("biometric keys could not be provisioned".to_string());
        }

        *self
            .unavailable_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason.clone();

        CapabilityReport {
            ready: sensor_available && keys_ready,
            sensor_available,
            keys_ready,
            display_name: crate::capability::biometry_display_name(biometry_type),
            biometry_type,
            reason,
        }
    }

    /// Nonce, signature, exchange. Strictly in sequence; the first failure ends the attempt.
    async fn authenticate(
        &self,
        request: LoginRequest,
        cancel: &CancelSignal,
    ) -> Result<SessionCredentials, BioKitError> {
        let nonce = self
            .nonces
            .fetch_nonce()
            .await
            .and_then(|nonce| self.accept_nonce(nonce))
            .map_err(|e| self.log_failure(Step::FetchNonce, e))?;

        let signature = self
            .signer
            .sign(&nonce, cancel)
            .await
            .map_err(|e| self.log_failure(Step::Sign, e))?;

        let key = self
            .provisioner
            .current()
            .await
            .and_then(|key| {
                key.ok_or(BioKitError::SigningFailed {
                    reason: SigningFailure::NoKeys,
                })
            })
            .map_err(|e| self.log_failure(Step::ReadPublicKey, e))?;

        self.consumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(nonce.value());

        let challenge = SignedChallenge::new(
            request,
            self.device_id.to_string(),
            nonce,
            signature,
            key.public_key_pem,
        );
        self.exchange
            .exchange(challenge)
            .await
            .map_err(|e| self.log_failure(Step::Exchange, e))
    }

    /// Refuses nonces that expired in transit or that were already submitted.
    fn accept_nonce(&self, nonce: Nonce) -> Result<Nonce, BioKitError> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        if nonce.is_expired(now) {
            return Err(BioKitError::NonceFetchFailed {
                reason: format!("nonce expired at {}", nonce.expires_at()),
            });
        }
        let replayed = self
            .consumed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(nonce.value());
        if replayed {
            return Err(BioKitError::NonceFetchFailed {
                reason: "server issued a nonce that was already used".to_string(),
            });
        }
        Ok(nonce)
    }

    fn log_failure(&self, step: Step, error: BioKitError) -> BioKitError {
        let timestamp = chrono::Utc::now().to_rfc3339();
        match &error {
            BioKitError::SigningFailed {
                reason: SigningFailure::UserCancelled,
            } => log::info!(
                "[{timestamp}] biometric login cancelled at {step} on device {}",
                self.device_id
            ),
            _ => log::error!(
                "[{timestamp}] biometric login failed at {step} on device {}: {} ({error})",
                self.device_id,
                error.code()
            ),
        }
        error
    }
}

/// Owns the handshake while a check or attempt runs. Dropping it unfinished, e.g. when the
/// caller drops the login future, returns the handshake to `Idle`.
struct AttemptGuard<'a> {
    login: &'a BiometricLogin,
    armed: bool,
}

impl AttemptGuard<'_> {
    /// Moves to an intermediate state while keeping ownership.
    fn advance(&self, state: HandshakeState) {
        self.login.state.store(state);
        self.login.notify(state);
    }

    /// Moves to `state` and releases ownership.
    fn finish(mut self, state: HandshakeState) {
        self.armed = false;
        self.advance(state);
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("handshake abandoned, returning to idle");
            self.login.release_cancel();
            self.advance(HandshakeState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::capability::software::{PromptBehavior, SoftwareCapability};

    fn device() -> DeviceInfo {
        DeviceInfo {
            platform: "ios".to_string(),
            os_version: "17.2".to_string(),
            screen_width: 390.0,
            screen_height: 844.0,
            screen_scale: 3.0,
        }
    }

    fn login_with(capability: Arc<SoftwareCapability>, base_url: &str) -> BiometricLogin {
        BiometricLogin::new(
            capability,
            HandshakeConfig {
                base_url: base_url.to_string(),
                ..HandshakeConfig::default()
            },
            device(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_insecure_base_url() {
        let result = BiometricLogin::new(
            Arc::new(SoftwareCapability::new()),
            HandshakeConfig {
                base_url: "http://api.example.com".to_string(),
                ..HandshakeConfig::default()
            },
            device(),
            None,
        );
        assert!(matches!(result, Err(BioKitError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_check_capability_provisions_keys() {
        let capability = Arc::new(SoftwareCapability::new());
        let login = login_with(capability.clone(), "https://api.example.com");

        let report = login.check_capability().await.unwrap();

        assert!(report.ready);
        assert!(report.keys_ready);
        assert_eq!(report.display_name, "Fingerprint");
        assert_eq!(login.state(), HandshakeState::Ready);
        assert!(capability.keys_exist().await.unwrap());
        assert_eq!(login.device_id(), "ios_17.2_390x844_3");
    }

    #[tokio::test]
    async fn test_report_names_sensor() {
        let capability = Arc::new(SoftwareCapability::new());
        capability.set_biometry_type(BiometryType::FaceId);
        let login = login_with(capability, "https://api.example.com");

        let report = login.check_capability().await.unwrap();

        assert_eq!(report.biometry_type, Some(BiometryType::FaceId));
        assert_eq!(report.display_name, "Face ID");
    }

    #[tokio::test]
    async fn test_no_sensor_is_not_available_and_sticky() {
        let capability = Arc::new(SoftwareCapability::without_sensor());
        let login = login_with(capability.clone(), "https://api.example.com");

        let report = login.check_capability().await.unwrap();
        assert!(!report.ready);
        assert!(!report.keys_ready);
        assert_eq!(login.state(), HandshakeState::NotAvailable);
        assert!(!capability.keys_exist().await.unwrap());

        let err = login
            .login(LoginRequest {
                user_id: "user-1".to_string(),
                refresh_token: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BioKitError::CapabilityUnavailable { .. }));
        assert_eq!(capability.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_login_returns_to_idle() {
        let capability = Arc::new(SoftwareCapability::new());
        let login = login_with(capability.clone(), "http://127.0.0.1:9");
        login.check_capability().await.unwrap();
        capability.set_prompt_behavior(PromptBehavior::Hang);

        // the nonce fetch against a closed port either fails fast or is abandoned here
        let _ = tokio::time::timeout(
            Duration::from_millis(20),
            login.login(LoginRequest {
                user_id: "user-1".to_string(),
                refresh_token: None,
            }),
        )
        .await;

        assert_eq!(login.state(), HandshakeState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_without_attempt_is_noop() {
        let login = login_with(Arc::new(SoftwareCapability::new()), "https://api.example.com");
        assert!(!login.cancel());
    }

    #[tokio::test]
    async fn test_reset_keys_returns_to_idle() {
        let capability = Arc::new(SoftwareCapability::new());
        let login = login_with(capability.clone(), "https://api.example.com");
        login.check_capability().await.unwrap();

        assert!(login.reset_keys().await.unwrap());
        assert_eq!(login.state(), HandshakeState::Idle);
        assert!(!capability.keys_exist().await.unwrap());
        assert!(login.ensure_keys().await);
    }
}
