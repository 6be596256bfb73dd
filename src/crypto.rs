//! Cryptographic primitives for AssetChain
//!
//! Content hashes are hex-encoded SHA-256 digests. Signatures are secp256k1
//! ECDSA over the SHA-256 digest of the message, serialized in compact form
//! and hex encoded. Public keys travel as hex of the compressed point.

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Deterministic content hash, hex encoded.
pub fn hash_data(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, ChainError> {
        let secret_key = SecretKey::new(&mut OsRng);
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    /// Hex of the compressed public key; this is the identity used in
    /// outputs, inputs and as a block's `node_pubkey`.
    pub fn public_key_hex(&self) -> String {
        let bytes: [u8; PUBLIC_KEY_SIZE] = self.public_key.serialize();
        hex::encode(bytes)
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Signs a message (hashed with SHA-256 first) and returns the compact
    /// signature as hex.
    pub fn sign(&self, message: &[u8]) -> Result<String, ChainError> {
        let digest = Sha256::digest(message);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        let compact: [u8; COMPACT_SIGNATURE_SIZE] = signature.serialize_compact();
        Ok(hex::encode(compact))
    }
}

/// Verifies a hex-encoded compact ECDSA signature against a hex-encoded
/// compressed public key.
pub fn verify_signature(
    public_key_hex: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), ChainError> {
    let public_key_bytes = hex::decode(public_key_hex)
        .map_err(|e| ChainError::CryptoError(format!("Invalid hex public key: {}", e)))?;
    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| ChainError::CryptoError(format!("Invalid hex signature: {}", e)))?;

    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(&public_key_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;

    let digest = Sha256::digest(message);
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

    let signature = Signature::from_compact(&signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keypair = KeyPair::generate().unwrap();
        assert_eq!(keypair.public_key_hex().len(), PUBLIC_KEY_SIZE * 2);
        assert_eq!(keypair.secret_key_hex().len(), SECRET_KEY_SIZE * 2);
    }

    #[test]
    fn test_hash_data_is_deterministic() {
        assert_eq!(hash_data(b"abc"), hash_data(b"abc"));
        assert_ne!(hash_data(b"abc"), hash_data(b"abd"));
        assert_eq!(
            hash_data(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate().unwrap();
        let message = b"Hello, AssetChain!";

        let signature = keypair.sign(message).unwrap();
        assert_eq!(signature.len(), COMPACT_SIGNATURE_SIZE * 2);
        assert!(verify_signature(&keypair.public_key_hex(), message, &signature).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let keypair1 = KeyPair::generate().unwrap();
        let keypair2 = KeyPair::generate().unwrap();

        let message = b"Test message";
        let signature = keypair1.sign(message).unwrap();

        let result = verify_signature(&keypair2.public_key_hex(), message, &signature);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cryptographic error: Signature verification failed"
        );
    }

    #[test]
    fn test_tampered_message() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"Original message").unwrap();

        let result = verify_signature(&keypair.public_key_hex(), b"Tampered message", &signature);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_inputs() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign(b"Test").unwrap();
        let pubkey = keypair.public_key_hex();

        let result = verify_signature(&pubkey[2..], b"Test", &signature);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Public key must be exactly"));

        let result = verify_signature(&pubkey, b"Test", &signature[2..]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Signature must be exactly"));

        let result = verify_signature(&pubkey, b"Test", "an invalid signature");
        assert!(result.unwrap_err().to_string().contains("Invalid hex signature"));
    }

    #[test]
    fn test_secret_hex_round_trip() {
        let keypair = KeyPair::generate().unwrap();
        let restored = KeyPair::from_secret_hex(&keypair.secret_key_hex()).unwrap();
        assert_eq!(restored.public_key_hex(), keypair.public_key_hex());
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = KeyPair::from_secret_bytes(&short_bytes);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Secret key must be"));
    }
}
