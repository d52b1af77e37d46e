//! Device identity used to correlate login attempts on the backend.

/// Platform facts the device identity is derived from.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct DeviceInfo {
    /// Platform name, e.g. `ios` or `android`.
    pub platform: String,
    /// OS version as reported by the platform.
    pub os_version: String,
    /// Screen width in points.
    pub screen_width: f64,
    /// Screen height in points.
    pub screen_height: f64,
    /// Screen pixel density.
    pub screen_scale: f64,
}

/// A stable fingerprint of the device.
///
/// Only a correlation key. It is not secret and proves nothing on its own; the signature over the
/// server nonce is what authenticates the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

impl From<&DeviceInfo> for DeviceIdentity {
    fn from(info: &DeviceInfo) -> Self {
        Self(format!(
            "{}_{}_{}x{}_{}",
            info.platform,
            info.os_version,
            format_dimension(info.screen_width),
            format_dimension(info.screen_height),
            format_dimension(info.screen_scale),
        ))
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole numbers are printed without a fractional part (`390`, not `390.0`), so the same device
/// produces the same identity regardless of how the platform reports its geometry.
#[allow(clippy::cast_possible_truncation)]
fn format_dimension(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Computes the device identity for the given platform facts.
#[uniffi::export]
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn device_id(info: DeviceInfo) -> String {
    DeviceIdentity::from(&info).0
}
