//! Per-platform hash and HMAC selection.
//!
//! All three platforms currently agree on HMAC-SHA256 with 32-byte keys and
//! salts. The indirection exists so a platform can later switch to a
//! hardware-accelerated primitive without touching call sites.

use hmac::{Hmac, Mac as _};
use sha2::Sha256;

pub type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
}

/// Platform-selected hash capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashProvider {
    Linux,
    MacOs,
    Windows,
}

impl HashProvider {
    /// Selects the provider for the host operating system.
    pub fn for_host() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Windows
        }
    }

    #[inline]
    pub fn algorithm(self) -> HashAlgorithm {
        HashAlgorithm::Sha256
    }

    /// Creates an HMAC instance keyed with `key`.
    pub fn create_hmac(self, key: &[u8]) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length (long keys are hashed down).
        HmacSha256::new_from_slice(key).expect("hmac accepts any key length")
    }

    #[inline]
    pub fn hmac_key_size(self) -> usize {
        32
    }

    #[inline]
    pub fn salt_size(self) -> usize {
        32
    }
}

#[cfg(test)]
mod tests {
    use hmac::Mac as _;

    use super::*;

    #[test]
    fn test_all_variants_agree() {
        for provider in [HashProvider::Linux, HashProvider::MacOs, HashProvider::Windows] {
            assert_eq!(provider.algorithm(), HashAlgorithm::Sha256);
            assert_eq!(provider.hmac_key_size(), 32);
            assert_eq!(provider.salt_size(), 32);
        }
    }

    #[test]
    fn test_hmac_output_is_stable() {
        let provider = HashProvider::for_host();

        let mut a = provider.create_hmac(b"key");
        a.update(b"message");
        let mut b = provider.create_hmac(b"key");
        b.update(b"message");

        assert_eq!(a.finalize().into_bytes(), b.finalize().into_bytes());
    }

    #[test]
    fn test_hmac_keyed() {
        let provider = HashProvider::for_host();

        let mut a = provider.create_hmac(b"key one");
        a.update(b"message");
        let mut b = provider.create_hmac(b"key two");
        b.update(b"message");

        assert_ne!(a.finalize().into_bytes(), b.finalize().into_bytes());
    }
}
