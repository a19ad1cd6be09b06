//! NexpLock - file-at-rest encryption with durable chunked writes.
//!
//! A resilient file protection core that uses:
//! - AES-256-GCM per chunk with deterministically derived nonces
//! - Two-layer content-key wrapping (master key, then a machine-local system key)
//! - Write-through streams with a platform durable flush after every chunk
//! - Zeroisation of all key material on release

pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod nonce;
pub mod pool;
pub mod request;
pub mod secret;
pub mod storage;
pub mod stream;
pub mod vault;

mod cipher;
