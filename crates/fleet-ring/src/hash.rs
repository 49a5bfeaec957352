//! Hash functions for ring positions.
//!
//! Output is interpreted as a big-endian unsigned integer and truncated to
//! 64 bits: the ring's hash space is `[0, 2^64)`. A full-width digest
//! comparison buys nothing here: SHA-256/SHA-1/MD5 collisions in the low
//! 64 bits are already astronomically unlikely for a fleet-sized node
//! count, and a `u64` keeps the ring a plain `BTreeMap<u64, ProviderId>`.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hash algorithm used to place keys and virtual nodes on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha1,
    Md5,
}

impl HashAlgorithm {
    pub fn hash_u64(&self, data: &[u8]) -> u64 {
        let digest = match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
        };
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest[0..8]);
        u64::from_be_bytes(buf)
    }
}
