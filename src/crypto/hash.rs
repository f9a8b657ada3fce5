//! SHA-256 helpers shared by the codec, merkle and PoW validator.

use sha2::{Digest, Sha256};

/// Lower-case hex of `sha256(data)`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_raw(data))
}

/// Raw 32-byte `sha256(data)` digest.
pub fn sha256_raw(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn raw_and_hex_agree() {
        let raw = sha256_raw(b"denarite");
        assert_eq!(sha256_hex(b"denarite"), hex::encode(raw));
    }
}
