//! File processing requests and path validation.
//!
//! Validation runs before any I/O so malformed requests never create
//! destination files. The rules are deliberately conservative: they reject
//! anything that is not a plain, rooted, platform-safe path.

use std::path::{Path, PathBuf};

use crate::config::MAX_PATH_LENGTH;
use crate::error::{Error, Result};

/// Reserved device stems that may not appear as a file name.
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "COM^", "LPT1",
    "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9", "LPT^",
];

/// Characters never accepted in a path, on any platform.
const INVALID_CHARS: &[char] = &['*', '?', '"', '<', '>', '|'];

/// One encryption or decryption job.
#[derive(Debug, Clone)]
pub struct FileProcessingRequest {
    pub file_id: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

impl FileProcessingRequest {
    pub fn new(file_id: impl Into<String>, source_path: impl Into<PathBuf>, destination_path: impl Into<PathBuf>) -> Self {
        Self { file_id: file_id.into(), source_path: source_path.into(), destination_path: destination_path.into() }
    }

    /// Checks ids and paths without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.file_id.trim().is_empty() {
            return Err(Error::InvalidRequest("file id is empty".into()));
        }

        validate_path(&self.source_path, "source")?;
        validate_path(&self.destination_path, "destination")
    }
}

fn validate_path(path: &Path, role: &str) -> Result<()> {
    let text = path.to_string_lossy();

    let invalid = |reason: &str| Err(Error::InvalidRequest(format!("{role} path {reason}")));

    if text.trim().is_empty() {
        return invalid("is empty");
    }
    if text.len() > MAX_PATH_LENGTH {
        return invalid("exceeds the maximum length");
    }
    if text.ends_with(' ') || text.ends_with('.') {
        return invalid("ends with a space or dot");
    }
    if text.chars().any(|c| c.is_control() || INVALID_CHARS.contains(&c)) {
        return invalid("contains an invalid character");
    }

    // A UNC path legitimately starts with two separators; any other doubled
    // separator is rejected.
    let after_root = text.strip_prefix(r"\\").unwrap_or(&text);
    if after_root.contains("//") || after_root.contains(r"\\") {
        return invalid("contains doubled separators");
    }

    if text.split(['/', '\\']).any(|segment| segment == "..") {
        return invalid("contains a parent directory segment");
    }

    if let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) {
        if RESERVED_STEMS.iter().any(|r| stem.eq_ignore_ascii_case(r)) {
            return invalid("uses a reserved file name");
        }
    }

    if !has_valid_root(&text) {
        return invalid("has no valid root");
    }

    Ok(())
}

#[cfg(windows)]
fn has_valid_root(text: &str) -> bool {
    let mut chars = text.chars();
    let drive_rooted = matches!((chars.next(), chars.next(), chars.next()), (Some(d), Some(':'), Some('\\' | '/')) if d.is_ascii_alphabetic());

    drive_rooted || is_unc(text)
}

#[cfg(windows)]
fn is_unc(text: &str) -> bool {
    // \\host\share\... needs a host and a share component.
    let Some(rest) = text.strip_prefix(r"\\") else {
        return false;
    };
    let mut parts = rest.split(['\\', '/']);
    matches!((parts.next(), parts.next()), (Some(host), Some(share)) if !host.is_empty() && !share.is_empty())
}

#[cfg(not(windows))]
fn has_valid_root(text: &str) -> bool {
    text.starts_with('/')
}
