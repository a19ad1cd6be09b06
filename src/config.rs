//! Global configuration constants.
//!
//! This module contains the parameters that define the encrypted file format
//! and the cryptographic policy of the application. The byte counts here are
//! load-bearing: changing any of them changes the on-disk layout and breaks
//! compatibility with existing files.
//!
//! ## File layout
//!
//! ```text
//! [ wrapped content key (88 B) | file nonce (12 B) | chunk_0 | chunk_1 | ... ]
//! chunk_i = [ tag (16 B) | ciphertext (<= BUFFER_SIZE B) ]
//! ```

/// File extension appended to encrypted files.
pub const FILE_EXTENSION: &str = ".nxl";

// === AEAD parameters ===

/// Size of AES-GCM nonces in bytes.
///
/// 12 bytes (96 bits) is the recommended nonce size for AES-GCM; other sizes
/// force an extra GHASH pass and are not used here.
pub const NONCE_SIZE: usize = 12;

/// Size of AES-GCM authentication tags in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of the per-file content key in bytes.
///
/// Every file body is encrypted under a fresh random 256-bit AES key. The
/// master key may be 128, 192 or 256 bits, but the content key is always
/// full-width.
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Acceptable decoded lengths for the caller-supplied base64 master key.
pub const MASTER_KEY_SIZES: [usize; 3] = [16, 24, 32];

// === Key wrapping ===

/// Bytes added by one AEAD wrap layer: a fresh nonce plus the tag.
pub const WRAP_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Size of the wrapped content key stored at offset 0 of every file.
///
/// The content key is sealed twice (master key, then system key) and each
/// layer contributes `WRAP_OVERHEAD` bytes: 32 + 2 * 28 = 88.
pub const FINAL_ENCRYPTED_KEY_SIZE: usize = DEFAULT_KEY_SIZE + 2 * WRAP_OVERHEAD;

/// Total header size: wrapped content key followed by the file nonce.
pub const HEADER_SIZE: usize = FINAL_ENCRYPTED_KEY_SIZE + NONCE_SIZE;

// === Chunking ===

/// Plaintext chunk size for streaming encryption.
///
/// 80 KiB keeps peak memory small while amortising per-chunk AEAD and flush
/// costs. Only the final chunk of a file may be shorter.
pub const BUFFER_SIZE: usize = 81_920;

/// Domain-separation constant mixed into per-chunk nonce derivation.
///
/// Fixed ASCII, 23 bytes. Frozen: it participates in every nonce ever
/// derived, so it can never change.
pub const NONCE_CONTEXT: &[u8] = b"NexpLock/chunk-nonce/v1";

// === System security key ===

/// Size of the process-local system security key in bytes.
pub const SYSTEM_KEY_SIZE: usize = 32;

/// Size of the random seed fed to PBKDF2 when the system key is first
/// generated.
pub const SYSTEM_KEY_SEED_SIZE: usize = 32;

/// PBKDF2-HMAC-SHA256 iteration count for system key derivation.
///
/// The seed is already uniformly random, so the iteration count is not a
/// brute-force defence the way it would be for a password; it is kept at a
/// conventional figure so the derivation step stays interchangeable.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Directory under the base directory holding the system key file.
pub const VAULT_SUBDIR: &str = "vault";

/// File name of the persisted system security key.
pub const SYSTEM_KEY_FILE: &str = "sp.bin";

// === Request validation ===

/// Maximum accepted path length.
pub const MAX_PATH_LENGTH: usize = 260;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_key_size() {
        // Two wrap layers over a 32-byte key: 32 + 2 * (12 + 16).
        assert_eq!(FINAL_ENCRYPTED_KEY_SIZE, 88);
        assert_eq!(HEADER_SIZE, 100);
    }

    #[test]
    fn test_nonce_context_frozen() {
        assert_eq!(NONCE_CONTEXT, b"NexpLock/chunk-nonce/v1");
        assert_eq!(NONCE_CONTEXT.len(), 23);
    }
}
