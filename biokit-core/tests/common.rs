//! Common test utilities shared across integration tests.
#![allow(dead_code, missing_docs)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use biokit_core::{
    capability::software::SoftwareCapability, BiometricCapability, BiometricLogin,
    CapabilityError, CreatedKeys, DeviceInfo, HandshakeConfig, HandshakeObserver,
    HandshakeState, LoginRequest, SensorStatus, SignatureRequest, SignatureResult,
};
use serde_json::json;

pub const USER_ID: &str = "user-7f3a";
pub const DEVICE_ID: &str = "ios_17.2_390x844_3";
/// 2030-03-17T17:46:40Z
pub const FAR_FUTURE: u64 = 1_900_000_000;

pub fn device() -> DeviceInfo {
    DeviceInfo {
        platform: "ios".to_string(),
        os_version: "17.2".to_string(),
        screen_width: 390.0,
        screen_height: 844.0,
        screen_scale: 3.0,
    }
}

pub fn request() -> LoginRequest {
    LoginRequest {
        user_id: USER_ID.to_string(),
        refresh_token: None,
    }
}

pub fn nonce_body(nonce: &str, expires_at: u64) -> String {
    json!({ "nonce": nonce, "expiresAt": expires_at }).to_string()
}

pub fn credentials_body() -> String {
    json!({
        "accessToken": "access-token",
        "idToken": "id-token",
        "refreshToken": "refresh-token",
        "expiresIn": 3600,
        "tokenType": "Bearer",
    })
    .to_string()
}

pub fn handshake(
    base_url: &str,
    capability: Arc<dyn BiometricCapability>,
    observer: Option<Arc<RecordingObserver>>,
) -> BiometricLogin {
    BiometricLogin::new(
        capability,
        HandshakeConfig {
            base_url: base_url.to_string(),
            request_timeout_ms: Some(5_000),
            prompt_timeout_ms: Some(5_000),
            ..HandshakeConfig::default()
        },
        device(),
        observer.map(|o| o as Arc<dyn HandshakeObserver>),
    )
    .expect("loopback base url is valid")
}

/// A device with a sensor and no keys yet.
pub fn software_device() -> Arc<SoftwareCapability> {
    Arc::new(SoftwareCapability::new())
}

/// Records every state the handshake reports.
#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<HandshakeState>>,
    pause: Option<(HandshakeState, Duration)>,
}

impl RecordingObserver {
    /// Blocks the reporting thread for `delay` after recording `state`, like a busy UI thread.
    pub fn pausing_on(state: HandshakeState, delay: Duration) -> Self {
        Self {
            states: Mutex::default(),
            pause: Some((state, delay)),
        }
    }

    pub fn states(&self) -> Vec<HandshakeState> {
        self.states.lock().unwrap().clone()
    }
}

impl HandshakeObserver for RecordingObserver {
    fn on_state_changed(&self, state: HandshakeState) {
        self.states.lock().unwrap().push(state);
        if let Some((paused, delay)) = self.pause {
            if paused == state {
                std::thread::sleep(delay);
            }
        }
    }
}

/// A provider whose sensor works but whose secure hardware refuses to create keys.
pub struct BrokenKeystore;

#[async_trait::async_trait]
impl BiometricCapability for BrokenKeystore {
    async fn is_sensor_available(&self) -> Result<SensorStatus, CapabilityError> {
        Ok(SensorStatus {
            available: true,
            biometry_type: None,
        })
    }

    async fn keys_exist(&self) -> Result<bool, CapabilityError> {
        Ok(false)
    }

    async fn create_keys(&self) -> Result<CreatedKeys, CapabilityError> {
        Err(CapabilityError::Platform("secure enclave unavailable".to_string()))
    }

    async fn public_key(&self) -> Result<Option<String>, CapabilityError> {
        Ok(None)
    }

    async fn delete_keys(&self) -> Result<bool, CapabilityError> {
        Ok(false)
    }

    async fn sign(
        &self,
        _request: SignatureRequest,
    ) -> Result<SignatureResult, CapabilityError> {
        Err(CapabilityError::KeyNotFound)
    }
}
