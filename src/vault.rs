//! System key vault and two-layer content-key wrapping.
//!
//! Every encrypted file carries its content key wrapped twice: first under
//! the caller's master key, then under a system security key private to this
//! installation. The outer layer binds ciphertexts to the machine that wrote
//! them; presenting the master key alone on another installation is not
//! enough to unwrap a content key.
//!
//! The system key is derived once, on first use, from a random seed via
//! PBKDF2-HMAC-SHA256 and persisted raw to `<base_dir>/vault/sp.bin` through
//! a durable stream. It is loaded at most once per process; concurrent
//! callers await the same initialisation, and a failed first load stays
//! failed rather than racing a retry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::cipher::{random_bytes, WrapKey};
use crate::config::{MASTER_KEY_SIZES, PBKDF2_ITERATIONS, SYSTEM_KEY_FILE, SYSTEM_KEY_SEED_SIZE, SYSTEM_KEY_SIZE, VAULT_SUBDIR};
use crate::error::{Error, IoPhase, Result};
use crate::hash::HashProvider;
use crate::secret::SecretBytes;
use crate::stream::DirectStream;

type LoadOutcome = std::result::Result<Arc<SecretBytes>, LoadFailure>;

/// Sticky outcome of the one-shot system key load.
#[derive(Debug, Clone)]
enum LoadFailure {
    Unavailable(String),
    Corrupt { expected: usize, actual: usize },
}

impl From<LoadFailure> for Error {
    fn from(failure: LoadFailure) -> Self {
        match failure {
            LoadFailure::Unavailable(cause) => Error::VaultUnavailable(cause),
            LoadFailure::Corrupt { expected, actual } => Error::VaultCorrupt { expected, actual },
        }
    }
}

pub struct VaultService {
    key_path: PathBuf,
    provider: HashProvider,
    system_key: OnceCell<LoadOutcome>,
}

impl VaultService {
    pub fn new(base_dir: impl Into<PathBuf>, provider: HashProvider) -> Self {
        let key_path = base_dir.into().join(VAULT_SUBDIR).join(SYSTEM_KEY_FILE);
        Self { key_path, provider, system_key: OnceCell::new() }
    }

    /// Path of the persisted system security key.
    #[inline]
    pub fn key_file_path(&self) -> &Path {
        &self.key_path
    }

    /// Wraps a content key: `AEAD(system_key, AEAD(master_key, ck))`.
    pub async fn encrypt_key(&self, content_key: &SecretBytes, master_key: &SecretString) -> Result<Vec<u8>> {
        let mk = decode_master_key(master_key)?;
        let inner = Zeroizing::new(WrapKey::new(mk.expose())?.seal(content_key.expose()));

        let system = self.system_key().await?;
        Ok(WrapKey::new(system.expose())?.seal(&inner))
    }

    /// Unwraps a content key, verifying both layers' tags.
    pub async fn decrypt_key(&self, wrapped: &[u8], master_key: &SecretString) -> Result<SecretBytes> {
        let mk = decode_master_key(master_key)?;

        let system = self.system_key().await?;
        let inner = WrapKey::new(system.expose())?.open(wrapped)?;

        WrapKey::new(mk.expose())?.open(inner.expose())
    }

    async fn system_key(&self) -> Result<Arc<SecretBytes>> {
        let outcome = self.system_key.get_or_init(|| self.load_or_create()).await;
        match outcome {
            Ok(key) => Ok(key.clone()),
            Err(failure) => Err(failure.clone().into()),
        }
    }

    async fn load_or_create(&self) -> LoadOutcome {
        match tokio::fs::metadata(&self.key_path).await {
            Ok(_) => self.read_key_file().await,
            Err(e) if e.kind() == ErrorKind::NotFound => self.create_key_file().await,
            Err(e) => Err(LoadFailure::Unavailable(e.to_string())),
        }
    }

    async fn read_key_file(&self) -> LoadOutcome {
        let mut stream = DirectStream::open_read(&self.key_path).await.map_err(unavailable)?;

        let len = stream.len(IoPhase::ReadKeyFile).await.map_err(unavailable)?;
        if len != SYSTEM_KEY_SIZE as u64 {
            let _ = stream.close().await;
            return Err(LoadFailure::Corrupt { expected: SYSTEM_KEY_SIZE, actual: len as usize });
        }

        let mut key = SecretBytes::zeroed(SYSTEM_KEY_SIZE);
        let read = stream.read_full(key.expose_mut(), IoPhase::ReadKeyFile).await.map_err(unavailable)?;
        stream.close().await.map_err(unavailable)?;

        if read != SYSTEM_KEY_SIZE {
            return Err(LoadFailure::Corrupt { expected: SYSTEM_KEY_SIZE, actual: read });
        }

        Ok(Arc::new(key))
    }

    async fn create_key_file(&self) -> LoadOutcome {
        let seed = Zeroizing::new(random_bytes::<SYSTEM_KEY_SEED_SIZE>());
        let salt = SecretBytes::random(self.provider.salt_size());

        let mut key = SecretBytes::zeroed(SYSTEM_KEY_SIZE);
        pbkdf2_hmac::<Sha256>(seed.as_ref(), salt.expose(), PBKDF2_ITERATIONS, key.expose_mut());

        if let Some(parent) = self.key_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| LoadFailure::Unavailable(e.to_string()))?;
        }

        let mut stream = DirectStream::create(&self.key_path).await.map_err(unavailable)?;
        restrict_permissions(&self.key_path).await.map_err(|e| LoadFailure::Unavailable(e.to_string()))?;

        stream.write_all(key.expose(), IoPhase::WriteKeyFile).await.map_err(unavailable)?;
        stream.flush().await.map_err(unavailable)?;
        stream.close().await.map_err(unavailable)?;

        Ok(Arc::new(key))
    }
}

fn unavailable(e: Error) -> LoadFailure {
    LoadFailure::Unavailable(e.to_string())
}

fn decode_master_key(master_key: &SecretString) -> Result<SecretBytes> {
    let decoded = BASE64
        .decode(master_key.expose_secret().trim())
        .map_err(|e| Error::InvalidMasterKey(format!("base64 decode failed: {e}")))?;
    let decoded = SecretBytes::new(decoded);

    if !MASTER_KEY_SIZES.contains(&decoded.len()) {
        return Err(Error::InvalidMasterKey(format!("decoded key must be 16, 24 or 32 bytes, got {}", decoded.len())));
    }

    Ok(decoded)
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
