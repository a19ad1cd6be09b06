//! Chunked file encryption and decryption.
//!
//! Each call is one sequential pipeline: header, then chunks, each chunk
//! durably flushed before the next is processed. A crash at any point leaves
//! a prefix of chunks that decrypts and authenticates cleanly up to, but not
//! including, the interrupted chunk.

use std::io;
use std::sync::Arc;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::cipher::{random_bytes, ChunkCipher};
use crate::config::{BUFFER_SIZE, DEFAULT_KEY_SIZE, FINAL_ENCRYPTED_KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, IoPhase, Result};
use crate::hash::HashProvider;
use crate::nonce::ChunkNonces;
use crate::pool::BufferPool;
use crate::request::FileProcessingRequest;
use crate::secret::SecretBytes;
use crate::stream::DirectStream;
use crate::vault::VaultService;

pub struct StorageService {
    vault: Arc<VaultService>,
    provider: HashProvider,
}

impl StorageService {
    pub fn new(vault: Arc<VaultService>, provider: HashProvider) -> Self {
        Self { vault, provider }
    }

    /// Encrypts the request's source file into its destination file.
    ///
    /// The destination is written as header (wrapped content key, file
    /// nonce) followed by `tag || ciphertext` chunks. On any error the
    /// partial destination is left on disk; it will fail authentication if
    /// decryption is attempted.
    pub async fn encrypt(&self, request: &FileProcessingRequest, master_key: &SecretString, cancel: &CancellationToken) -> Result<()> {
        request.validate()?;
        ensure_active(cancel)?;

        let content_key = SecretBytes::random(DEFAULT_KEY_SIZE);
        let wrapped_key = self.vault.encrypt_key(&content_key, master_key).await?;
        let file_nonce = Zeroizing::new(random_bytes::<NONCE_SIZE>());

        let mut source = DirectStream::open_read(&request.source_path).await?;
        let mut destination = DirectStream::create(&request.destination_path).await?;

        let outcome = self.encrypt_stream(&content_key, &wrapped_key, &file_nonce, &mut source, &mut destination, cancel).await;

        finish(outcome, source, destination).await
    }

    /// Decrypts the request's source file into its destination file.
    ///
    /// Fails with [`Error::AuthenticationFailed`] before writing anything if
    /// the master key does not match, and stops at the first chunk whose tag
    /// does not verify.
    pub async fn decrypt(&self, request: &FileProcessingRequest, master_key: &SecretString, cancel: &CancellationToken) -> Result<()> {
        request.validate()?;
        ensure_active(cancel)?;

        let mut source = DirectStream::open_read(&request.source_path).await?;
        let mut destination = DirectStream::create(&request.destination_path).await?;

        let outcome = self.decrypt_stream(master_key, &mut source, &mut destination, cancel).await;

        finish(outcome, source, destination).await
    }

    async fn encrypt_stream(
        &self,
        content_key: &SecretBytes,
        wrapped_key: &[u8],
        file_nonce: &[u8; NONCE_SIZE],
        source: &mut DirectStream,
        destination: &mut DirectStream,
        cancel: &CancellationToken,
    ) -> Result<()> {
        destination.write_all(wrapped_key, IoPhase::WriteHeader).await?;
        destination.write_all(file_nonce, IoPhase::WriteHeader).await?;
        destination.flush().await?;

        let nonces = ChunkNonces::new(self.provider, file_nonce);
        let cipher = ChunkCipher::new(content_key.expose().try_into().expect("content keys are 32 bytes"));

        let mut chunk = BufferPool::global().rent(BUFFER_SIZE);
        let mut index: i64 = 0;

        loop {
            ensure_active(cancel)?;

            let read = source.read_full(&mut chunk, IoPhase::ReadChunk).await?;
            if read == 0 {
                break;
            }

            let nonce = nonces.derive(index);
            let tag = cipher.seal_in_place(&nonce, &mut chunk[..read]);

            destination.write_all(&tag, IoPhase::WriteChunk).await?;
            destination.write_all(&chunk[..read], IoPhase::WriteChunk).await?;
            destination.flush().await?;

            index += 1;
        }

        Ok(())
    }

    async fn decrypt_stream(
        &self,
        master_key: &SecretString,
        source: &mut DirectStream,
        destination: &mut DirectStream,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut wrapped_key = [0u8; FINAL_ENCRYPTED_KEY_SIZE];
        read_header_field(source, &mut wrapped_key).await?;

        let mut file_nonce = Zeroizing::new([0u8; NONCE_SIZE]);
        read_header_field(source, &mut file_nonce[..]).await?;

        let content_key = self.vault.decrypt_key(&wrapped_key, master_key).await?;
        let key_bytes: &[u8; DEFAULT_KEY_SIZE] = content_key.expose().try_into().map_err(|_| Error::AuthenticationFailed)?;

        let nonces = ChunkNonces::new(self.provider, &file_nonce);
        let cipher = ChunkCipher::new(key_bytes);

        let mut chunk = BufferPool::global().rent(BUFFER_SIZE);
        let mut tag = [0u8; TAG_SIZE];
        let mut index: i64 = 0;

        loop {
            ensure_active(cancel)?;

            // A short tag read is the clean end of the stream; the source
            // need not be seekable.
            let tag_read = source.read_full(&mut tag, IoPhase::ReadChunk).await?;
            if tag_read < TAG_SIZE {
                break;
            }

            let ciphertext_len = source.read_full(&mut chunk, IoPhase::ReadChunk).await?;
            if ciphertext_len == 0 {
                break;
            }

            let nonce = nonces.derive(index);
            cipher.open_in_place(&nonce, &mut chunk[..ciphertext_len], &tag)?;

            destination.write_all(&chunk[..ciphertext_len], IoPhase::WriteChunk).await?;
            destination.flush().await?;

            index += 1;
        }

        Ok(())
    }
}

/// Closes both streams, preserving the pipeline's error if it failed.
async fn finish(outcome: Result<()>, mut source: DirectStream, mut destination: DirectStream) -> Result<()> {
    let source_closed = source.close().await;
    let destination_closed = destination.close().await;

    outcome.and(source_closed).and(destination_closed)
}

async fn read_header_field(source: &mut DirectStream, buf: &mut [u8]) -> Result<()> {
    let read = source.read_full(buf, IoPhase::ReadHeader).await?;
    if read != buf.len() {
        return Err(Error::io(IoPhase::ReadHeader, io::Error::new(io::ErrorKind::UnexpectedEof, "short header read")));
    }
    Ok(())
}

#[inline]
fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
