//! Per-platform stream configuration and durable flush.
//!
//! Three variants: Linux (fsync + fadvise + I/O priority), macOS
//! (F_NOCACHE + F_FULLFSYNC), Windows (write-through flag + FlushFileBuffers
//! via `sync_all`). Advisory calls warn and continue; durability calls fail
//! hard.

use std::path::Path;

use tokio::fs::File;

use crate::error::Result;
#[cfg(any(target_os = "linux", target_os = "macos"))]
use crate::error::Error;

#[cfg(target_os = "linux")]
pub(super) fn configure(file: &File, path: &Path) {
    use std::os::unix::io::AsRawFd;

    raise_io_priority();

    // Length 0 advises to end of file, so the hint stays valid as the file
    // grows during writes.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL) };
    if rc != 0 {
        tracing::warn!(path = %path.display(), code = rc, "posix_fadvise(SEQUENTIAL) failed");
    }
}

#[cfg(target_os = "macos")]
pub(super) fn configure(file: &File, path: &Path) {
    use std::os::unix::io::AsRawFd;

    // Bypass the unified buffer cache; writes go straight through.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
    if rc == -1 {
        tracing::warn!(path = %path.display(), "fcntl(F_NOCACHE) failed");
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(super) fn configure(file: &File, path: &Path) {
    // Windows needs no extra configuration beyond FILE_FLAG_WRITE_THROUGH,
    // which is set at open time.
    let _ = (file, path);
}

#[cfg(target_os = "linux")]
pub(super) async fn durable_flush(file: &File) -> Result<()> {
    use std::io;
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let outcome = tokio::task::spawn_blocking(move || {
        if unsafe { libc::fsync(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }

        // Data is durable; let the kernel drop the cached pages.
        let rc = unsafe { libc::posix_fadvise(fd, 0, 0, libc::POSIX_FADV_DONTNEED) };
        if rc != 0 {
            tracing::warn!(code = rc, "posix_fadvise(DONTNEED) failed");
        }

        Ok(())
    })
    .await
    .expect("durable flush task panicked");

    outcome.map_err(|e| Error::Durability { operation: "fsync", code: e.raw_os_error().unwrap_or(-1) })
}

#[cfg(target_os = "macos")]
pub(super) async fn durable_flush(file: &File) -> Result<()> {
    use std::io;
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let outcome = tokio::task::spawn_blocking(move || {
        // fsync is not enough on macOS; F_FULLFSYNC forces the drive cache.
        if unsafe { libc::fcntl(fd, libc::F_FULLFSYNC) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    })
    .await
    .expect("durable flush task panicked");

    outcome.map_err(|e| Error::Durability { operation: "F_FULLFSYNC", code: e.raw_os_error().unwrap_or(-1) })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub(super) async fn durable_flush(file: &File) -> Result<()> {
    use crate::error::Error;

    file.sync_all()
        .await
        .map_err(|e| Error::Durability { operation: "FlushFileBuffers", code: e.raw_os_error().unwrap_or(-1) })
}

#[cfg(target_os = "linux")]
fn raise_io_priority() {
    const IOPRIO_WHO_PROCESS: libc::c_int = 1;
    const IOPRIO_CLASS_SHIFT: libc::c_int = 13;
    const IOPRIO_CLASS_RT: libc::c_int = 1;
    const IOPRIO_CLASS_BE: libc::c_int = 2;

    // Real-time first, best-effort as the fallback.
    for class in [IOPRIO_CLASS_RT, IOPRIO_CLASS_BE] {
        let rc = unsafe { libc::syscall(libc::SYS_ioprio_set, IOPRIO_WHO_PROCESS, 0, class << IOPRIO_CLASS_SHIFT) };
        if rc == 0 {
            return;
        }
    }

    tracing::warn!("unable to raise i/o priority, continuing with defaults");
}
