//! `biokit`: drive the biometric login handshake from a terminal.
//!
//! The device is simulated by a software P-256 key kept in a PEM file, so a backend can be
//! exercised end to end without a phone.

use std::path::PathBuf;
use std::sync::Arc;

use biokit_core::capability::software::PromptBehavior;
use biokit_core::{
    device_id, verify_signature, BiometricLogin, DeviceInfo, HandshakeConfig, KeyProvisioner,
    LoginRequest,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eyre::{bail, Context, Result};
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod key_file;

#[derive(Parser)]
#[command(name = "biokit", version, about = "Biometric login handshake developer tool")]
struct Cli {
    /// Device key file. Defaults to the platform data directory.
    #[arg(long, global = true, env = "BIOKIT_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the device identity sent with each login
    DeviceId {
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Check the sensor and provision the device key
    Check {
        #[command(flatten)]
        backend: BackendArgs,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Run one login and print the session credentials
    Login {
        #[command(flatten)]
        backend: BackendArgs,
        #[command(flatten)]
        device: DeviceArgs,
        /// Backend user the device key belongs to
        #[arg(long, env = "BIOKIT_USER_ID")]
        user_id: String,
        /// Refresh token to forward, if the backend expects one
        #[arg(long, env = "BIOKIT_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: Option<String>,
        /// How the simulated biometric prompt answers
        #[arg(long, value_enum, default_value_t = Prompt::Approve)]
        prompt: Prompt,
    },
    /// Delete the device key
    ResetKeys,
    /// Verify a device signature over a payload
    Verify {
        /// Public key as PEM, a PEM file path, or base64 DER
        #[arg(long)]
        public_key: String,
        /// The signed payload, usually the nonce
        #[arg(long)]
        payload: String,
        /// Base64 signature
        #[arg(long)]
        signature: String,
    },
}

#[derive(Args)]
struct BackendArgs {
    /// Backend base URL
    #[arg(long, env = "BIOKIT_BASE_URL")]
    base_url: String,
    /// Per-request timeout in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,
    /// Prompt timeout in milliseconds
    #[arg(long)]
    prompt_timeout_ms: Option<u64>,
}

impl From<BackendArgs> for HandshakeConfig {
    fn from(args: BackendArgs) -> Self {
        Self {
            base_url: args.base_url,
            request_timeout_ms: args.request_timeout_ms,
            prompt_timeout_ms: args.prompt_timeout_ms,
            prompt_message: None,
            cancel_button_text: None,
        }
    }
}

#[derive(Args)]
struct DeviceArgs {
    /// Platform name reported in the device identity
    #[arg(long, default_value = std::env::consts::OS)]
    platform: String,
    /// OS version reported in the device identity
    #[arg(long, default_value = "0")]
    os_version: String,
    /// Screen width in points
    #[arg(long, default_value_t = 1920.0)]
    screen_width: f64,
    /// Screen height in points
    #[arg(long, default_value_t = 1080.0)]
    screen_height: f64,
    /// Screen pixel density
    #[arg(long, default_value_t = 1.0)]
    screen_scale: f64,
}

impl From<DeviceArgs> for DeviceInfo {
    fn from(args: DeviceArgs) -> Self {
        Self {
            platform: args.platform,
            os_version: args.os_version,
            screen_width: args.screen_width,
            screen_height: args.screen_height,
            screen_scale: args.screen_scale,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Prompt {
    Approve,
    Cancel,
    Lockout,
}

impl From<Prompt> for PromptBehavior {
    fn from(prompt: Prompt) -> Self {
        match prompt {
            Prompt::Approve => Self::Approve,
            Prompt::Cancel => Self::Cancel,
            Prompt::Lockout => Self::Lockout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let key_path = match cli.key_file {
        Some(path) => path,
        None => key_file::default_path()?,
    };

    match cli.command {
        Command::DeviceId { device } => {
            println!("{}", device_id(device.into()));
        }
        Command::Check { backend, device } => {
            let capability = Arc::new(key_file::load(&key_path)?);
            let login =
                BiometricLogin::new(capability.clone(), backend.into(), device.into(), None)?;
            let report = login.check_capability().await?;
            key_file::save(&key_path, &capability)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "ready": report.ready,
                    "sensorAvailable": report.sensor_available,
                    "keysReady": report.keys_ready,
                    "biometry": report.display_name,
                    "reason": report.reason,
                    "deviceId": login.device_id(),
                }))?
            );
        }
        Command::Login {
            backend,
            device,
            user_id,
            refresh_token,
            prompt,
        } => {
            let capability = Arc::new(key_file::load(&key_path)?);
            capability.set_prompt_behavior(prompt.into());
            let login =
                BiometricLogin::new(capability.clone(), backend.into(), device.into(), None)?;
            let result = login
                .login(LoginRequest {
                    user_id,
                    refresh_token,
                })
                .await;
            // keys may have been created by the capability check
            key_file::save(&key_path, &capability)?;
            let credentials = result.wrap_err("biometric login failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "accessToken": credentials.access_token,
                    "idToken": credentials.id_token,
                    "refreshToken": credentials.refresh_token,
                    "expiresIn": credentials.expires_in,
                    "tokenType": credentials.token_type,
                }))?
            );
        }
        Command::ResetKeys => {
            let capability = Arc::new(key_file::load(&key_path)?);
            let deleted = KeyProvisioner::new(capability.clone()).reset_keys().await?;
            key_file::save(&key_path, &capability)?;
            tracing::info!(path = %key_path.display(), deleted, "device key reset");
            println!("{}", if deleted { "deleted" } else { "no key" });
        }
        Command::Verify {
            public_key,
            payload,
            signature,
        } => {
            let public_key = read_public_key(&public_key)?;
            if verify_signature(&public_key, &payload, &signature)? {
                println!("valid");
            } else {
                bail!("signature does not match payload");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "biokit=debug" } else { "biokit=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Accepts the key inline or as a path to a PEM file.
fn read_public_key(value: &str) -> Result<String> {
    if value.contains("-----BEGIN") {
        return Ok(value.to_string());
    }
    let path = PathBuf::from(value);
    if path.is_file() {
        return std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("reading public key {}", path.display()));
    }
    Ok(value.to_string())
}
