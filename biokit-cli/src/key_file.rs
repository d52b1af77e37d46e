//! Persistence of the software device key between CLI runs.

use std::fs;
use std::path::{Path, PathBuf};

use biokit_core::capability::software::SoftwareCapability;
use eyre::{eyre, Context, Result};

/// Default location of the device key: `<data dir>/biokit/device-key.pem`.
pub fn default_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("biokit").join("device-key.pem"))
        .ok_or_else(|| eyre!("no data directory on this platform, pass --key-file"))
}

/// Loads the software device from `path`, or a device without keys if the file does not exist.
pub fn load(path: &Path) -> Result<SoftwareCapability> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no device key yet");
        return Ok(SoftwareCapability::new());
    }
    let pem = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading device key {}", path.display()))?;
    SoftwareCapability::from_pkcs8_pem(&pem)
        .wrap_err_with(|| format!("parsing device key {}", path.display()))
}

/// Writes the device key to `path`, or removes the file if the device has no key.
pub fn save(path: &Path, device: &SoftwareCapability) -> Result<()> {
    let Some(pem) = device.export_pkcs8_pem()? else {
        return remove(path);
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, pem).wrap_err_with(|| format!("writing device key {}", path.display()))?;
    tracing::debug!(path = %path.display(), "device key saved");
    Ok(())
}

/// Removes the key file. Succeeds if it does not exist.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).wrap_err_with(|| format!("removing {}", path.display())),
    }
}
