//! Block header wire format.
//!
//! Two header shapes share a byte stream: version 1 has no version prefix
//! and a 64-byte address (138 bytes total); version 2 prepends `0x02` and
//! uses a 33-byte address (108 bytes total). The version to emit is chosen
//! purely by the length of the already-encoded address — the core never
//! decides it from a caller-supplied flag.

use crate::error::{CoreError, CoreResult};

pub const V1_LEN: usize = 138;
pub const V2_LEN: usize = 108;
const HASH_LEN: usize = 32;
const V1_ADDRESS_LEN: usize = 64;
const V2_ADDRESS_LEN: usize = 33;
const V2_VERSION_BYTE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVersion {
    V1,
    V2,
}

/// A decoded block header. `previous_hash` and `merkle_root` are raw 32-byte
/// digests; `address` is the already-decoded miner address (33 or 64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: HeaderVersion,
    pub previous_hash: [u8; HASH_LEN],
    pub address: Vec<u8>,
    pub merkle_root: [u8; HASH_LEN],
    pub timestamp: u32,
    pub difficulty_scaled: u16,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn new(
        previous_hash: [u8; HASH_LEN],
        address: Vec<u8>,
        merkle_root: [u8; HASH_LEN],
        timestamp: u32,
        difficulty_scaled: u16,
        nonce: u32,
    ) -> CoreResult<Self> {
        let version = match address.len() {
            V1_ADDRESS_LEN => HeaderVersion::V1,
            V2_ADDRESS_LEN => HeaderVersion::V2,
            _ => return Err(CoreError::BadAddressLength),
        };
        Ok(Self {
            version,
            previous_hash,
            address,
            merkle_root,
            timestamp,
            difficulty_scaled,
            nonce,
        })
    }

    /// Serialize to the exact on-chain byte layout.
    pub fn serialize(&self) -> CoreResult<Vec<u8>> {
        let address_len = self.address.len();
        match (self.version, address_len) {
            (HeaderVersion::V1, V1_ADDRESS_LEN) => {}
            (HeaderVersion::V2, V2_ADDRESS_LEN) => {}
            _ => return Err(CoreError::BadAddressLength),
        }

        let mut out = Vec::with_capacity(V1_LEN.max(V2_LEN));
        if self.version == HeaderVersion::V2 {
            out.push(V2_VERSION_BYTE);
        }
        out.extend_from_slice(&self.previous_hash);
        out.extend_from_slice(&self.address);
        out.extend_from_slice(&self.merkle_root);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.difficulty_scaled.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        Ok(out)
    }

    /// Decode from the on-chain byte layout, dispatching on total length.
    pub fn deserialize(bytes: &[u8]) -> CoreResult<Self> {
        let (version, body) = match bytes.len() {
            V1_LEN => (HeaderVersion::V1, bytes),
            V2_LEN => {
                if bytes[0] != V2_VERSION_BYTE {
                    return Err(CoreError::UnsupportedVersion);
                }
                (HeaderVersion::V2, &bytes[1..])
            }
            _ => return Err(CoreError::BadHeaderShape),
        };

        let address_len = match version {
            HeaderVersion::V1 => V1_ADDRESS_LEN,
            HeaderVersion::V2 => V2_ADDRESS_LEN,
        };

        let mut cursor = 0usize;
        let mut previous_hash = [0u8; HASH_LEN];
        previous_hash.copy_from_slice(&body[cursor..cursor + HASH_LEN]);
        cursor += HASH_LEN;

        let address = body[cursor..cursor + address_len].to_vec();
        cursor += address_len;

        let mut merkle_root = [0u8; HASH_LEN];
        merkle_root.copy_from_slice(&body[cursor..cursor + HASH_LEN]);
        cursor += HASH_LEN;

        let timestamp = u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap());
        cursor += 4;

        let difficulty_scaled = u16::from_le_bytes(body[cursor..cursor + 2].try_into().unwrap());
        cursor += 2;

        let nonce = u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap());

        Ok(Self {
            version,
            previous_hash,
            address,
            merkle_root,
            timestamp,
            difficulty_scaled,
            nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_v1() -> BlockHeader {
        BlockHeader::new([1u8; 32], vec![7u8; 64], [2u8; 32], 1000, 60, 42).unwrap()
    }

    fn sample_v2() -> BlockHeader {
        BlockHeader::new([1u8; 32], vec![7u8; 33], [2u8; 32], 1000, 60, 42).unwrap()
    }

    #[test]
    fn v1_serializes_to_138_bytes_with_no_prefix() {
        let h = sample_v1();
        let bytes = h.serialize().unwrap();
        assert_eq!(bytes.len(), V1_LEN);
    }

    #[test]
    fn v2_serializes_to_108_bytes_with_version_prefix() {
        let h = sample_v2();
        let bytes = h.serialize().unwrap();
        assert_eq!(bytes.len(), V2_LEN);
        assert_eq!(bytes[0], V2_VERSION_BYTE);
    }

    #[test]
    fn round_trip_v1() {
        let h = sample_v1();
        let bytes = h.serialize().unwrap();
        let back = BlockHeader::deserialize(&bytes).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn round_trip_v2() {
        let h = sample_v2();
        let bytes = h.serialize().unwrap();
        let back = BlockHeader::deserialize(&bytes).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn bad_address_length_is_rejected() {
        let err = BlockHeader::new([0u8; 32], vec![0u8; 40], [0u8; 32], 0, 0, 0).unwrap_err();
        assert!(matches!(err, CoreError::BadAddressLength));
    }

    #[test]
    fn malformed_length_is_bad_header_shape() {
        let err = BlockHeader::deserialize(&vec![0u8; 50]).unwrap_err();
        assert!(matches!(err, CoreError::BadHeaderShape));
    }

    #[test]
    fn v2_with_wrong_version_byte_is_unsupported() {
        let mut bytes = sample_v2().serialize().unwrap();
        bytes[0] = 9;
        let err = BlockHeader::deserialize(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedVersion));
    }
}
