//! Owned secret byte containers.

use std::fmt::{Debug, Formatter, Result};

use rand::Rng;
use zeroize::Zeroize;

/// A byte buffer that is wiped when its storage is released.
///
/// Used for content keys, the system security key, decoded master keys and
/// unwrapped intermediates. The bytes are overwritten with zeros on drop on
/// every exit path, including errors and cancellation unwinds.
pub struct SecretBytes {
    data: Vec<u8>,
}

impl SecretBytes {
    #[inline]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Creates a secret filled with `len` uniformly random bytes.
    pub fn random(len: usize) -> Self {
        let mut data = vec![0u8; len];
        rand::rng().fill(data.as_mut_slice());
        Self { data }
    }

    /// Creates a zero-filled secret of `len` bytes, to be written in place.
    #[inline]
    pub fn zeroed(len: usize) -> Self {
        Self { data: vec![0u8; len] }
    }

    #[inline]
    pub fn expose(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn expose_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl Debug for SecretBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_secrets_differ() {
        let a = SecretBytes::random(32);
        let b = SecretBytes::random(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBytes::new(vec![1, 2, 3]);
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
    }

    #[test]
    fn test_empty() {
        assert!(SecretBytes::new(Vec::new()).is_empty());
        assert!(!SecretBytes::random(1).is_empty());
    }
}
