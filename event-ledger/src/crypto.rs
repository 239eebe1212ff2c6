//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pair generation, signing, and verification
//! - Signed event submissions
//! - SHA-256 hashing

use crate::types::{Commitment, EventKind, EventSubmission, Signature, SubmitterId};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a hex-encoded seed (`0x` prefix optional)
    pub fn from_hex_seed(seed: &str) -> Result<Self> {
        let digits = seed.trim().strip_prefix("0x").unwrap_or(seed.trim());
        let bytes = hex::decode(digits)
            .map_err(|e| Error::Config(format!("Invalid signing seed: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Config("Signing seed must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Identity this key submits under
    pub fn submitter_id(&self) -> SubmitterId {
        SubmitterId::from_bytes(self.public_key())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::from_bytes(signature.to_bytes())
    }

    /// Verify a signature
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let dalek_sig = DalekSignature::from_bytes(signature.as_bytes());
        self.verifying_key
            .verify(message, &dalek_sig)
            .map_err(|e| Error::SignatureError(format!("Verification failed: {}", e)))
    }

    /// Build a signed submission
    pub fn sign_submission(
        &self,
        correlation_id: impl Into<String>,
        kind: EventKind,
        commitment: Commitment,
    ) -> EventSubmission {
        let correlation_id = correlation_id.into();
        let message = EventSubmission::signing_message(&correlation_id, kind, &commitment);

        EventSubmission {
            correlation_id,
            kind,
            commitment,
            submitter: self.submitter_id(),
            signature: self.sign(&message),
        }
    }
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);

        // Same seed should produce same keys
        assert_eq!(keypair1.public_key(), keypair2.public_key());
    }

    #[test]
    fn test_keypair_from_hex_seed() {
        let hex_seed = format!("0x{}", hex::encode([42u8; 32]));
        let keypair = KeyPair::from_hex_seed(&hex_seed).unwrap();
        assert_eq!(keypair.public_key(), KeyPair::from_seed(&[42u8; 32]).public_key());

        assert!(KeyPair::from_hex_seed("0x1234").is_err());
        assert!(KeyPair::from_hex_seed("not hex").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"test message";

        let signature = keypair.sign(message);
        assert!(keypair.verify(message, &signature).is_ok());

        // Wrong message should fail
        assert!(keypair.verify(b"wrong message", &signature).is_err());
    }

    #[test]
    fn test_signed_submission_verifies() {
        let keypair = KeyPair::generate();
        let submission = keypair.sign_submission(
            "ord_1",
            EventKind::OrderCreated,
            Commitment::from_bytes([9u8; 32]),
        );

        assert_eq!(submission.submitter, keypair.submitter_id());
        assert!(submission.verify_signature());

        let mut forged = submission.clone();
        forged.correlation_id = "ord_2".to_string();
        assert!(!forged.verify_signature());
    }

    #[test]
    fn test_hash_bytes() {
        let hash1 = hash_bytes(b"test data");
        let hash2 = hash_bytes(b"test data");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash_bytes(b"different data"));
    }

    #[test]
    fn test_known_signature_vector() {
        // RFC 8032 test vector 1
        let seed = [
            0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60,
            0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
            0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19,
            0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
        ];

        let keypair = KeyPair::from_seed(&seed);
        assert_eq!(
            hex::encode(keypair.public_key()),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );

        let signature = keypair.sign(b"");
        assert!(keypair.verify(b"", &signature).is_ok());
    }
}
