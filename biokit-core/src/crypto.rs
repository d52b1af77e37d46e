//! Public key encoding and local verification of device signatures.
//!
//! Mobile biometric providers export public keys in different shapes: iOS hands out base64 of the
//! DER `SubjectPublicKeyInfo`, some Android bridges already wrap it in PEM. The backend expects
//! PEM, so every key goes through [`public_key_to_pem`] before it is sent.

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::pkcs8::DecodePublicKey as _;
use spki::{der::Decode, ObjectIdentifier, SubjectPublicKeyInfoRef};

use crate::error::BioKitError;

const PEM_LABEL: &str = "PUBLIC KEY";
const PEM_LINE_WIDTH: usize = 64;

const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

fn invalid_key(reason: impl Into<String>) -> BioKitError {
    BioKitError::InvalidInput {
        attribute: "public_key".to_string(),
        reason: reason.into(),
    }
}

/// Decodes a PEM or bare base64 public key into its DER bytes and checks it is a well-formed
/// `SubjectPublicKeyInfo`.
pub(crate) fn public_key_der(public_key: &str) -> Result<Vec<u8>, BioKitError> {
    let trimmed = public_key.trim();
    let body: String = if trimmed.starts_with("-----BEGIN") {
        let begin = format!("-----BEGIN {PEM_LABEL}-----");
        let end = format!("-----END {PEM_LABEL}-----");
        let inner = trimmed
            .strip_prefix(begin.as_str())
            .and_then(|rest| rest.trim_end().strip_suffix(end.as_str()))
            .ok_or_else(|| invalid_key(format!("expected a {PEM_LABEL} PEM block")))?;
        inner.split_whitespace().collect()
    } else {
        trimmed.split_whitespace().collect()
    };

    let der = STANDARD
        .decode(body)
        .map_err(|e| invalid_key(format!("invalid base64: {e}")))?;
    SubjectPublicKeyInfoRef::from_der(&der)
        .map_err(|e| invalid_key(format!("not a SubjectPublicKeyInfo: {e}")))?;
    Ok(der)
}

/// Encodes DER `SubjectPublicKeyInfo` bytes as PEM with 64-column lines.
pub(crate) fn der_to_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {PEM_LABEL}-----\n");
    // base64 output is ASCII, so chunking bytes never splits a character
    for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {PEM_LABEL}-----\n"));
    pem
}

/// Normalizes a public key exported by a biometric provider into PEM.
///
/// Accepts PEM (any line wrapping) or bare base64 of the DER `SubjectPublicKeyInfo`.
///
/// # Errors
///
/// Returns [`BioKitError::InvalidInput`] if the key cannot be decoded.
#[uniffi::export]
pub fn public_key_to_pem(public_key: &str) -> Result<String, BioKitError> {
    public_key_der(public_key).map(|der| der_to_pem(&der))
}

/// Verifies a base64 detached signature over `payload` against a device public key.
///
/// Supports the two key types mobile providers issue: P-256 ECDSA with SHA-256 (DER or raw
/// `r || s` signatures) and RSA PKCS#1 v1.5 with SHA-256. Returns `Ok(false)` for a signature
/// that does not verify.
///
/// # Errors
///
/// Returns [`BioKitError::InvalidInput`] if the key or signature cannot be decoded, or the key
/// algorithm is not supported.
#[uniffi::export]
pub fn verify_signature(
    public_key: &str,
    payload: &str,
    signature: &str,
) -> Result<bool, BioKitError> {
    let der = public_key_der(public_key)?;
    let signature = STANDARD.decode(signature.trim()).map_err(|e| {
        BioKitError::InvalidInput {
            attribute: "signature".to_string(),
            reason: format!("invalid base64: {e}"),
        }
    })?;
    let spki = SubjectPublicKeyInfoRef::from_der(&der)
        .map_err(|e| invalid_key(format!("not a SubjectPublicKeyInfo: {e}")))?;

    let algorithm = spki.algorithm.oid;
    if algorithm == ID_EC_PUBLIC_KEY {
        verify_p256(&der, payload.as_bytes(), &signature)
    } else if algorithm == RSA_ENCRYPTION {
        verify_rsa(&der, payload.as_bytes(), &signature)
    } else {
        Err(invalid_key(format!("unsupported key algorithm {algorithm}")))
    }
}

fn verify_p256(der: &[u8], payload: &[u8], signature: &[u8]) -> Result<bool, BioKitError> {
    use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};

    let key = VerifyingKey::from_public_key_der(der)
        .map_err(|e| invalid_key(format!("invalid P-256 key: {e}")))?;
    let Ok(signature) =
        Signature::from_der(signature).or_else(|_| Signature::from_slice(signature))
    else {
        return Ok(false);
    };
    Ok(key.verify(payload, &signature).is_ok())
}

fn verify_rsa(der: &[u8], payload: &[u8], signature: &[u8]) -> Result<bool, BioKitError> {
    use rsa::{
        pkcs1v15::{Signature, VerifyingKey},
        pkcs8::DecodePublicKey,
        signature::Verifier,
        RsaPublicKey,
    };
    use sha2::Sha256;

    let key = RsaPublicKey::from_public_key_der(der)
        .map_err(|e| invalid_key(format!("invalid RSA key: {e}")))?;
    let Ok(signature) = Signature::try_from(signature) else {
        return Ok(false);
    };
    Ok(VerifyingKey::<Sha256>::new(key)
        .verify(payload, &signature)
        .is_ok())
}
