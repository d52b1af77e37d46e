//! Provisioning of the biometric-bound key pair.

use std::sync::Arc;

use crate::{
    capability::BiometricCapability, crypto::public_key_to_pem, error::BioKitError,
};

/// A key pair known to exist on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedKey {
    /// Public half, normalized to PEM.
    pub public_key_pem: String,
    /// Whether this call generated the key pair.
    pub created: bool,
}

/// Makes sure a biometric-bound key pair exists before the first login.
pub struct KeyProvisioner {
    capability: Arc<dyn BiometricCapability>,
}

impl KeyProvisioner {
    /// Creates a provisioner over the given capability.
    #[must_use]
    pub const fn new(capability: Arc<dyn BiometricCapability>) -> Self {
        Self { capability }
    }

    /// Returns whether a usable key pair is present, creating one if needed.
    ///
    /// Failures are logged and reported as `false`: biometric login stays disabled until they
    /// are resolved, the rest of the app keeps working.
    pub async fn ensure_keys(&self) -> bool {
        match self.provision().await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("biometric keys unavailable: {e}");
                false
            }
        }
    }

    /// Check-then-create. Existing keys are never regenerated; their public half is read back.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::KeyProvisioningFailed`] if the provider fails or hands back an
    /// unusable public key.
    pub async fn provision(&self) -> Result<ProvisionedKey, BioKitError> {
        let exists = self
            .capability
            .keys_exist()
            .await
            .map_err(|e| provisioning_failed(e.to_string()))?;

        if exists {
            return self.current().await?.ok_or_else(|| {
                provisioning_failed("provider reported keys but no public key".to_string())
            });
        }

        log::info!("no biometric key pair on this device, creating one");
        let created = self
            .capability
            .create_keys()
            .await
            .map_err(|e| provisioning_failed(e.to_string()))?;
        Ok(ProvisionedKey {
            public_key_pem: normalize(&created.public_key)?,
            created: true,
        })
    }

    /// The key pair already on the device, or `None`. Never creates one.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::KeyProvisioningFailed`] if the provider fails or hands back an
    /// unusable public key.
    pub async fn current(&self) -> Result<Option<ProvisionedKey>, BioKitError> {
        let public_key = self
            .capability
            .public_key()
            .await
            .map_err(|e| provisioning_failed(e.to_string()))?;
        public_key
            .map(|public_key| {
                Ok(ProvisionedKey {
                    public_key_pem: normalize(&public_key)?,
                    created: false,
                })
            })
            .transpose()
    }

    /// Deletes the key pair. The next [`Self::ensure_keys`] creates a fresh one, which the
    /// backend has to learn about again.
    ///
    /// # Errors
    ///
    /// Returns [`BioKitError::KeyProvisioningFailed`] if the provider refuses.
    pub async fn reset_keys(&self) -> Result<bool, BioKitError> {
        let deleted = self
            .capability
            .delete_keys()
            .await
            .map_err(|e| provisioning_failed(e.to_string()))?;
        if deleted {
            log::info!("biometric key pair deleted");
        }
        Ok(deleted)
    }
}

const fn provisioning_failed(reason: String) -> BioKitError {
    BioKitError::KeyProvisioningFailed { reason }
}

fn normalize(public_key: &str) -> Result<String, BioKitError> {
    public_key_to_pem(public_key)
        .map_err(|e| provisioning_failed(format!("unusable public key: {e}")))
}
