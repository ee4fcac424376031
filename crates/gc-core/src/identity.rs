//! Device identity and challenge signing
//!
//! A [`DeviceIdentity`] is a P-256 ECDSA keypair plus a random device id.
//! It proves possession of the private key by signing the gateway's
//! challenge without ever transmitting the key.
//!
//! # Signed Payload
//!
//! The signature covers the UTF-8 bytes of `"{nonce}:{issuedAt}:{deviceId}"`
//! where `nonce` and `issuedAt` are the exact values from the challenge
//! event. The gateway rebuilds the same string to verify, so `signedAt` in
//! the assertion always echoes the server timestamp, never a local clock.
//!
//! # Encodings
//!
//! - Public key: SubjectPublicKeyInfo DER, standard base64 (a PEM body with
//!   the armor lines and line breaks removed)
//! - Signature: ASN.1 DER ECDSA signature (SHA-256 digest), standard base64
//!
//! Identities live for one connection attempt and are never persisted.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use gc_protocol::DeviceAssertion;

use crate::error::CryptoError;
use crate::types::DeviceInfo;

/// Random bytes behind a device id (64 bits)
const DEVICE_ID_BYTES: usize = 8;

/// Prefix of every generated device id
pub const DEVICE_ID_PREFIX: &str = "device_";

/// Length of the public key fingerprint shown in reports
const FINGERPRINT_LEN: usize = 16;

/// Build the canonical string signed for a challenge
pub fn canonical_payload(nonce: &str, issued_at: u64, device_id: &str) -> String {
    format!("{}:{}:{}", nonce, issued_at, device_id)
}

/// Keypair plus stable device identifier for one client instance
pub struct DeviceIdentity {
    device_id: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl DeviceIdentity {
    /// Generate a fresh keypair and device id.
    ///
    /// Fails only if the operating system entropy source is unavailable.
    pub fn create() -> Result<Self, CryptoError> {
        let mut id_bytes = [0u8; DEVICE_ID_BYTES];
        OsRng
            .try_fill_bytes(&mut id_bytes)
            .map_err(|e| CryptoError::Entropy(e.to_string()))?;

        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let device_id = format!("{}{}", DEVICE_ID_PREFIX, hex::encode(id_bytes));

        tracing::debug!(device_id = %device_id, "Generated device identity");

        Ok(Self {
            device_id,
            signing_key,
            verifying_key,
        })
    }

    /// Get the device identifier
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Export the public key as base64 SubjectPublicKeyInfo DER (no PEM armor)
    pub fn export_public_key(&self) -> Result<String, CryptoError> {
        let der = self
            .verifying_key
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// Short SHA-256 fingerprint of the public key, hex encoded
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        let der = self
            .verifying_key
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        let digest = Sha256::digest(der.as_bytes());
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(FINGERPRINT_LEN);
        Ok(fingerprint)
    }

    /// Public, shareable description of this identity
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.device_id.clone(),
            fingerprint: self.fingerprint().ok(),
        }
    }

    /// Sign a challenge and build the assertion carried in the connect request.
    ///
    /// `nonce` and `issued_at` must be the values received in the challenge,
    /// unmodified.
    pub fn sign_assertion(&self, nonce: &str, issued_at: u64) -> Result<DeviceAssertion, CryptoError> {
        let payload = canonical_payload(nonce, issued_at, &self.device_id);
        let signature: Signature = self
            .signing_key
            .try_sign(payload.as_bytes())
            .map_err(|e| CryptoError::Signing(e.to_string()))?;

        Ok(DeviceAssertion {
            id: self.device_id.clone(),
            public_key: self.export_public_key()?,
            signature: STANDARD.encode(signature.to_der().as_bytes()),
            signed_at: issued_at,
            nonce: nonce.to_string(),
        })
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

/// Verify a signature over `(nonce, issued_at, device_id)` against an
/// exported public key
pub fn verify_signature(
    public_key: &str,
    signature: &str,
    nonce: &str,
    issued_at: u64,
    device_id: &str,
) -> Result<(), CryptoError> {
    let key_der = STANDARD
        .decode(public_key)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let verifying_key = VerifyingKey::from_public_key_der(&key_der)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    let sig_der = STANDARD
        .decode(signature)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let signature =
        Signature::from_der(&sig_der).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    let payload = canonical_payload(nonce, issued_at, device_id);
    verifying_key
        .verify(payload.as_bytes(), &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Verify an assertion the way the gateway does: it must echo the challenge
/// and its signature must cover the challenge plus the claimed device id
pub fn verify_assertion(
    assertion: &DeviceAssertion,
    nonce: &str,
    issued_at: u64,
) -> Result<(), CryptoError> {
    if assertion.nonce != nonce {
        return Err(CryptoError::ChallengeMismatch("nonce differs".to_string()));
    }
    if assertion.signed_at != issued_at {
        return Err(CryptoError::ChallengeMismatch(format!(
            "signedAt {} does not echo challenge ts {}",
            assertion.signed_at, issued_at
        )));
    }

    verify_signature(
        &assertion.public_key,
        &assertion.signature,
        nonce,
        issued_at,
        &assertion.id,
    )
}
