use rand::Rng;
use sha2::{Digest, Sha256};

/// A fresh bearer token: 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Hex-encoded SHA-256 of an opaque token. Only this digest is stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Compares two secrets by digest so the comparison does not short-circuit
/// on the secret's own bytes.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
