use crate::domains::publish::types::DigestAlgorithm;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Lowercase hex digest of `bytes`
pub fn hex_digest(algorithm: DigestAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        DigestAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
        DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
    }
}
