//! Deterministic per-chunk nonce derivation.
//!
//! Chunk nonces are never stored; both sides regenerate them from the file
//! nonce persisted in the header and the chunk position:
//!
//! ```text
//! salt = HMAC-SHA256(key = file_nonce, msg = 0_i64_le)        (once per stream)
//! prk  = HMAC-SHA256(key = salt, msg = index_le)              (per chunk)
//! okm  = HKDF-Expand(prk, info = index_le || NONCE_CONTEXT, 12)
//! ```
//!
//! The salt step amortises the derivation so each chunk costs one HMAC plus
//! one HKDF-Expand. All integers are little-endian; the construction is
//! deterministic and collision-free for indices in `[0, 2^63)`.

use hkdf::Hkdf;
use hmac::Mac as _;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::config::{NONCE_CONTEXT, NONCE_SIZE};
use crate::hash::HashProvider;

/// Per-stream nonce derivation state.
///
/// Holds the precomputed salt for one file. Derivation itself is a pure
/// function of the stored salt and the chunk index.
pub struct ChunkNonces {
    provider: HashProvider,
    salt: Zeroizing<[u8; 32]>,
}

impl ChunkNonces {
    /// Precomputes the derivation salt for a file nonce.
    pub fn new(provider: HashProvider, file_nonce: &[u8; NONCE_SIZE]) -> Self {
        let mut mac = provider.create_hmac(file_nonce);
        mac.update(&0_i64.to_le_bytes());
        let salt = Zeroizing::new(mac.finalize().into_bytes().into());

        Self { provider, salt }
    }

    /// Derives the AEAD nonce for the chunk at `index`.
    pub fn derive(&self, index: i64) -> [u8; NONCE_SIZE] {
        let index_bytes = index.to_le_bytes();

        let mut mac = self.provider.create_hmac(self.salt.as_ref());
        mac.update(&index_bytes);
        let prk: Zeroizing<[u8; 32]> = Zeroizing::new(mac.finalize().into_bytes().into());

        let mut info = Vec::with_capacity(index_bytes.len() + NONCE_CONTEXT.len());
        info.extend_from_slice(&index_bytes);
        info.extend_from_slice(NONCE_CONTEXT);

        let hkdf = Hkdf::<Sha256>::from_prk(prk.as_ref()).expect("prk is hash-sized");
        let mut nonce = [0u8; NONCE_SIZE];
        hkdf.expand(&info, &mut nonce).expect("nonce fits hkdf output bounds");

        nonce
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn nonces() -> ChunkNonces {
        ChunkNonces::new(HashProvider::for_host(), &[7u8; NONCE_SIZE])
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = nonces();
        let b = nonces();

        for index in [0, 1, 42, i64::MAX] {
            assert_eq!(a.derive(index), b.derive(index));
        }
    }

    #[test]
    fn test_nonces_unique_across_indices() {
        let stream = nonces();

        let mut seen = HashSet::new();
        for index in 0..=(1_i64 << 16) {
            assert!(seen.insert(stream.derive(index)), "nonce collision at index {index}");
        }
    }

    #[test]
    fn test_different_file_nonces_diverge() {
        let provider = HashProvider::for_host();
        let a = ChunkNonces::new(provider, &[1u8; NONCE_SIZE]);
        let b = ChunkNonces::new(provider, &[2u8; NONCE_SIZE]);

        assert_ne!(a.derive(0), b.derive(0));
    }

    #[test]
    fn test_nonce_length() {
        assert_eq!(nonces().derive(0).len(), NONCE_SIZE);
    }
}
