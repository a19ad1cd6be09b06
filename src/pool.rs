//! Process-wide pool of scratch buffers for chunk processing.
//!
//! Plaintext and ciphertext scratch space cycles through this pool rather
//! than the allocator. The contract is strict: every rented buffer is
//! zero-filled before its storage becomes reusable, so a later renter can
//! never observe an earlier caller's plaintext.

use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock};

use zeroize::Zeroize;

static GLOBAL: OnceLock<BufferPool> = OnceLock::new();

/// A rent/return pool of byte buffers.
pub struct BufferPool {
    slots: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    #[inline]
    pub fn new() -> Self {
        Self { slots: Mutex::new(Vec::new()) }
    }

    /// The shared pool used by the streaming pipeline.
    pub fn global() -> &'static BufferPool {
        GLOBAL.get_or_init(BufferPool::new)
    }

    /// Rents a zero-filled buffer of exactly `len` bytes.
    #[must_use = "the rented buffer is returned to the pool when dropped"]
    pub fn rent(&self, len: usize) -> PooledBuffer<'_> {
        let mut buf = self.slots.lock().expect("buffer pool poisoned").pop().unwrap_or_default();
        // Returned slots are already zeroed; resizing only writes more zeros.
        buf.resize(len, 0);
        PooledBuffer { buf, pool: self }
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        buf.zeroize();
        self.slots.lock().expect("buffer pool poisoned").push(buf);
    }

    #[cfg(test)]
    fn idle_slots(&self) -> usize {
        self.slots.lock().expect("buffer pool poisoned").len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A rented buffer. Zero-filled and returned to its pool on drop.
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(mem::take(&mut self.buf));
    }
}
