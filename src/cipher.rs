//! AES-GCM primitives: key wrapping and chunk sealing.

use aes_gcm::aead::generic_array::typenum::U12;
use aes_gcm::aead::{Aead, AeadInPlace, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce, Tag};
use rand::Rng;

use crate::config::{DEFAULT_KEY_SIZE, NONCE_SIZE, TAG_SIZE, WRAP_OVERHEAD};
use crate::error::{Error, Result};
use crate::secret::SecretBytes;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Fills a fixed-size array with cryptographically secure random bytes.
pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes);
    bytes
}

/// An AES-GCM key used for the wrap layers, width selected by key length.
///
/// The master key layer may be 128, 192 or 256 bits; the system key layer is
/// always 256 bits. Sealed blobs are `nonce || ciphertext || tag` with a
/// fresh random nonce per invocation.
pub(crate) enum WrapKey {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl WrapKey {
    pub fn new(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Ok(Self::Aes128(Aes128Gcm::new_from_slice(key).expect("length checked"))),
            24 => Ok(Self::Aes192(Aes192Gcm::new_from_slice(key).expect("length checked"))),
            32 => Ok(Self::Aes256(Aes256Gcm::new_from_slice(key).expect("length checked"))),
            n => Err(Error::InvalidMasterKey(format!("unsupported key length: {n} bytes"))),
        }
    }

    /// Seals `plaintext` under this key with a fresh nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let nonce_bytes: [u8; NONCE_SIZE] = random_bytes();
        let nonce = Nonce::from_slice(&nonce_bytes);

        // GCM encryption only fails past the 64 GiB message bound; wrap
        // payloads are under a hundred bytes.
        let ciphertext = match self {
            Self::Aes128(aead) => aead.encrypt(nonce, plaintext),
            Self::Aes192(aead) => aead.encrypt(nonce, plaintext),
            Self::Aes256(aead) => aead.encrypt(nonce, plaintext),
        }
        .expect("wrap payload within aes-gcm bounds");

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        blob
    }

    /// Opens a sealed blob, verifying its tag.
    pub fn open(&self, blob: &[u8]) -> Result<SecretBytes> {
        if blob.len() < WRAP_OVERHEAD {
            return Err(Error::AuthenticationFailed);
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = match self {
            Self::Aes128(aead) => aead.decrypt(nonce, ciphertext),
            Self::Aes192(aead) => aead.decrypt(nonce, ciphertext),
            Self::Aes256(aead) => aead.decrypt(nonce, ciphertext),
        }
        .map_err(|_| Error::AuthenticationFailed)?;

        Ok(SecretBytes::new(plaintext))
    }
}

/// The per-file AES-256-GCM cipher for chunk bodies.
///
/// Works in place over pooled scratch buffers with a detached tag, so the
/// rented buffer is the only copy of the plaintext.
pub(crate) struct ChunkCipher {
    aead: Aes256Gcm,
}

impl ChunkCipher {
    pub fn new(content_key: &[u8; DEFAULT_KEY_SIZE]) -> Self {
        let aead = Aes256Gcm::new_from_slice(content_key).expect("content keys are 32 bytes");
        Self { aead }
    }

    /// Encrypts `buf` in place and returns the detached tag.
    pub fn seal_in_place(&self, nonce: &[u8; NONCE_SIZE], buf: &mut [u8]) -> [u8; TAG_SIZE] {
        let tag = self
            .aead
            .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", buf)
            .expect("chunk within aes-gcm bounds");
        tag.into()
    }

    /// Verifies `tag` and decrypts `buf` in place.
    ///
    /// The tag is checked before any byte of `buf` is transformed, so no
    /// plaintext materialises on mismatch.
    pub fn open_in_place(&self, nonce: &[u8; NONCE_SIZE], buf: &mut [u8], tag: &[u8; TAG_SIZE]) -> Result<()> {
        self.aead
            .decrypt_in_place_detached(Nonce::from_slice(nonce), b"", buf, Tag::from_slice(tag))
            .map_err(|_| Error::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_roundtrip_all_widths() {
        for len in [16usize, 24, 32] {
            let key = vec![0x11u8; len];
            let wrap = WrapKey::new(&key).unwrap();

            let sealed = wrap.seal(b"content key material");
            assert_eq!(sealed.len(), WRAP_OVERHEAD + 20);

            let opened = wrap.open(&sealed).unwrap();
            assert_eq!(opened.expose(), b"content key material");
        }
    }

    #[test]
    fn test_wrap_rejects_bad_key_length() {
        assert!(matches!(WrapKey::new(&[0u8; 20]), Err(Error::InvalidMasterKey(_))));
    }

    #[test]
    fn test_open_rejects_tampered_blob() {
        let wrap = WrapKey::new(&[0x22u8; 32]).unwrap();
        let mut sealed = wrap.seal(b"secret");

        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(wrap.open(&sealed), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_open_rejects_short_blob() {
        let wrap = WrapKey::new(&[0x22u8; 32]).unwrap();
        assert!(matches!(wrap.open(&[0u8; WRAP_OVERHEAD - 1]), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let sealed = WrapKey::new(&[0x01u8; 32]).unwrap().seal(b"secret");
        let other = WrapKey::new(&[0x02u8; 32]).unwrap();

        assert!(matches!(other.open(&sealed), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_chunk_seal_open_in_place() {
        let cipher = ChunkCipher::new(&[0x33u8; DEFAULT_KEY_SIZE]);
        let nonce = [0x44u8; NONCE_SIZE];

        let mut buf = *b"chunk plaintext";
        let tag = cipher.seal_in_place(&nonce, &mut buf);
        assert_ne!(&buf, b"chunk plaintext");

        cipher.open_in_place(&nonce, &mut buf, &tag).unwrap();
        assert_eq!(&buf, b"chunk plaintext");
    }

    #[test]
    fn test_chunk_open_rejects_flipped_tag_bit() {
        let cipher = ChunkCipher::new(&[0x33u8; DEFAULT_KEY_SIZE]);
        let nonce = [0x44u8; NONCE_SIZE];

        let mut buf = *b"chunk plaintext";
        let mut tag = cipher.seal_in_place(&nonce, &mut buf);
        tag[0] ^= 0x01;

        let before = buf;
        assert!(matches!(cipher.open_in_place(&nonce, &mut buf, &tag), Err(Error::AuthenticationFailed)));
        // Tag mismatch must leave the ciphertext untouched.
        assert_eq!(buf, before);
    }

    #[test]
    fn test_chunk_open_rejects_wrong_nonce() {
        let cipher = ChunkCipher::new(&[0x33u8; DEFAULT_KEY_SIZE]);

        let mut buf = *b"chunk plaintext";
        let tag = cipher.seal_in_place(&[0x44u8; NONCE_SIZE], &mut buf);

        assert!(matches!(cipher.open_in_place(&[0x45u8; NONCE_SIZE], &mut buf, &tag), Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn test_empty_chunk() {
        let cipher = ChunkCipher::new(&[0x33u8; DEFAULT_KEY_SIZE]);
        let nonce = [0x44u8; NONCE_SIZE];

        let mut buf = [0u8; 0];
        let tag = cipher.seal_in_place(&nonce, &mut buf);
        cipher.open_in_place(&nonce, &mut buf, &tag).unwrap();
    }
}
