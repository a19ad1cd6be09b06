//! Write-through file streams with guaranteed-durable flushes.
//!
//! A [`DirectStream`] wraps a file opened with the platform's write-through
//! flag. Writes are strictly append-order, reads strictly sequential, and
//! [`DirectStream::flush`] does not return until previously written bytes
//! have reached stable storage. A crash therefore leaves a durable prefix of
//! everything flushed so far.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, IoPhase, Result};

mod platform;

pub struct DirectStream {
    file: Option<File>,
    path: PathBuf,
    writable: bool,
    flushing: AtomicBool,
}

impl DirectStream {
    /// Opens an existing file for sequential reading.
    pub async fn open_read(path: &Path) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        apply_write_through(&mut options);

        let file = options.open(path).await.map_err(|e| Error::io(IoPhase::OpenSource, e))?;
        platform::configure(&file, path);

        Ok(Self::wrap(file, path, false))
    }

    /// Creates (or truncates) a file for sequential writing.
    pub async fn create(path: &Path) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        apply_write_through(&mut options);

        let file = options.open(path).await.map_err(|e| Error::io(IoPhase::OpenDestination, e))?;
        platform::configure(&file, path);

        Ok(Self::wrap(file, path, true))
    }

    fn wrap(file: File, path: &Path, writable: bool) -> Self {
        Self { file: Some(file), path: path.to_path_buf(), writable, flushing: AtomicBool::new(false) }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads until `buf` is full or the file ends; returns the bytes read.
    pub async fn read_full(&mut self, buf: &mut [u8], phase: IoPhase) -> Result<usize> {
        let file = self.file.as_mut().ok_or(Error::AlreadyClosed)?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await.map_err(|e| Error::io(phase, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(filled)
    }

    /// Appends `bytes` to the stream.
    pub async fn write_all(&mut self, bytes: &[u8], phase: IoPhase) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::AlreadyClosed)?;
        file.write_all(bytes).await.map_err(|e| Error::io(phase, e))
    }

    /// Current length of the underlying file in bytes.
    pub async fn len(&self, phase: IoPhase) -> Result<u64> {
        let file = self.file.as_ref().ok_or(Error::AlreadyClosed)?;
        let meta = file.metadata().await.map_err(|e| Error::io(phase, e))?;
        Ok(meta.len())
    }

    /// Flushes written bytes all the way to stable storage.
    ///
    /// Single-slot gate: if another flush on this stream is still in flight,
    /// this call returns immediately without error. The in-flight flush
    /// already covers every byte written before it began, because writes and
    /// flushes on one stream are strictly ordered.
    pub async fn flush(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::AlreadyClosed);
        }
        if self.flushing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result = self.flush_inner().await;
        self.flushing.store(false, Ordering::Release);
        result
    }

    async fn flush_inner(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::AlreadyClosed)?;
        file.flush().await.map_err(|e| Error::io(IoPhase::Flush, e))?;
        platform::durable_flush(file).await
    }

    /// Durably flushes (writable streams) and releases the handle.
    ///
    /// Idempotent: a second close is a no-op. Any other operation after close
    /// fails with [`Error::AlreadyClosed`].
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        if self.writable {
            file.flush().await.map_err(|e| Error::io(IoPhase::Flush, e))?;
            platform::durable_flush(&file).await?;
        }

        Ok(())
    }
}

// Dropping the stream releases the OS handle, but without the durable flush
// close() performs; callers are expected to close explicitly.

fn apply_write_through(options: &mut OpenOptions) {
    #[cfg(unix)]
    options.custom_flags(libc::O_DSYNC);

    #[cfg(windows)]
    options.custom_flags(windows_sys::Win32::Storage::FileSystem::FILE_FLAG_WRITE_THROUGH);

    #[cfg(not(any(unix, windows)))]
    let _ = options;
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.bin");

        let mut writer = DirectStream::create(&path).await.unwrap();
        writer.write_all(b"hello direct stream", IoPhase::WriteChunk).await.unwrap();
        writer.flush().await.unwrap();
        writer.close().await.unwrap();

        let mut reader = DirectStream::open_read(&path).await.unwrap();
        assert_eq!(reader.len(IoPhase::ReadChunk).await.unwrap(), 19);

        let mut buf = [0u8; 19];
        let n = reader.read_full(&mut buf, IoPhase::ReadChunk).await.unwrap();
        assert_eq!(n, 19);
        assert_eq!(&buf, b"hello direct stream");
        reader.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_full_stops_at_eof() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let mut reader = DirectStream::open_read(&path).await.unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(reader.read_full(&mut buf, IoPhase::ReadChunk).await.unwrap(), 3);
        assert_eq!(reader.read_full(&mut buf, IoPhase::ReadChunk).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.bin");

        let mut stream = DirectStream::create(&path).await.unwrap();
        stream.close().await.unwrap();
        stream.close().await.unwrap();

        assert!(matches!(stream.write_all(b"x", IoPhase::WriteChunk).await, Err(Error::AlreadyClosed)));
        assert!(matches!(stream.flush().await, Err(Error::AlreadyClosed)));
        assert!(matches!(stream.len(IoPhase::ReadChunk).await, Err(Error::AlreadyClosed)));
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = DirectStream::open_read(&dir.path().join("absent.bin")).await;
        assert!(matches!(result, Err(Error::Io { phase: IoPhase::OpenSource, .. })));
    }

    #[tokio::test]
    async fn test_overlapping_flush_is_elided() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gate.bin");

        let mut stream = DirectStream::create(&path).await.unwrap();
        stream.write_all(b"payload", IoPhase::WriteChunk).await.unwrap();

        // Simulate a flush in flight: the gated call must return Ok without
        // attempting a second platform flush.
        stream.flushing.store(true, Ordering::Release);
        stream.flush().await.unwrap();
        stream.flushing.store(false, Ordering::Release);

        stream.flush().await.unwrap();
        stream.close().await.unwrap();
    }
}
