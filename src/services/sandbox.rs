//! Path-traversal defense for the sandboxed file endpoints.
//!
//! Untrusted paths are percent-decoded a bounded number of rounds,
//! normalized, collapsed lexically, and only then resolved against the real
//! sandbox root. Traversal is rejected before the filesystem is consulted,
//! so probes against paths that do not exist still read as traversal, not
//! as missing files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::SandboxConfig;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Invalid path: {0}")]
    InvalidPath(&'static str),

    #[error("Path escapes the sandbox")]
    Traversal,

    #[error("File extension not allowed")]
    DisallowedExtension,

    #[error("File not found")]
    NotFound,

    #[error("File too large")]
    TooLarge,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct PathSandbox {
    root: PathBuf,
    allowed_extensions: Vec<String>,
    max_file_bytes: u64,
    max_decode_rounds: u32,
}

impl PathSandbox {
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_path),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            max_file_bytes: config.max_file_bytes,
            max_decode_rounds: config.max_decode_rounds,
        }
    }

    /// Create the sandbox directory if it does not exist yet.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Percent-decode until the value stabilizes or the round limit is hit.
    /// Bounded so double-encoded probes unwrap without looping forever on
    /// adversarial input.
    fn decode(&self, raw: &str) -> String {
        let mut current = raw.to_string();
        for _ in 0..self.max_decode_rounds {
            match urlencoding::decode(&current) {
                Ok(decoded) => {
                    if decoded == current.as_str() {
                        break;
                    }
                    current = decoded.into_owned();
                }
                Err(_) => break,
            }
        }
        current
    }

    /// Decode and validate an untrusted path into a safe relative path.
    /// Purely lexical; `..` that would climb past the sandbox root is
    /// traversal even when the named target does not exist.
    pub fn sanitize(&self, raw: &str) -> Result<PathBuf, SandboxError> {
        let decoded = self.decode(raw);

        // Windows-style separators normalize to the POSIX form
        let normalized = decoded.replace('\\', "/");

        if normalized.chars().any(char::is_control) {
            return Err(SandboxError::InvalidPath("control character in path"));
        }

        if normalized.starts_with('/') || is_drive_absolute(&normalized) {
            return Err(SandboxError::InvalidPath("absolute path"));
        }

        let mut parts: Vec<&str> = Vec::new();
        for seg in normalized.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(SandboxError::Traversal);
                    }
                }
                seg => parts.push(seg),
            }
        }

        Ok(parts.iter().collect())
    }

    /// Resolve an untrusted path to a real, readable file inside the
    /// sandbox. Symlinks are followed on both the root and the candidate;
    /// the real path must stay under the real root.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, SandboxError> {
        let relative = self.sanitize(raw)?;

        let root = fs::canonicalize(&self.root)?;
        let candidate = root.join(&relative);

        let resolved = match fs::canonicalize(&candidate) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SandboxError::NotFound);
            }
            Err(e) => return Err(SandboxError::Io(e)),
        };

        if !resolved.starts_with(&root) {
            return Err(SandboxError::Traversal);
        }

        self.check_extension(&resolved)?;

        let metadata = fs::metadata(&resolved)?;
        if metadata.is_dir() {
            return Err(SandboxError::InvalidPath("path is a directory"));
        }
        if metadata.len() > self.max_file_bytes {
            return Err(SandboxError::TooLarge);
        }

        Ok(resolved)
    }

    /// Read a sandboxed file after full validation.
    pub fn read(&self, raw: &str) -> Result<String, SandboxError> {
        let path = self.resolve(raw)?;
        let bytes = fs::read(&path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write a file into the sandbox. Filenames pass the same sanitization
    /// and extension policy as reads; parent directories inside the sandbox
    /// are created as needed and re-verified after creation.
    pub fn save(&self, filename: &str, content: &str) -> Result<PathBuf, SandboxError> {
        let relative = self.sanitize(filename)?;
        if relative.as_os_str().is_empty() {
            return Err(SandboxError::InvalidPath("empty path"));
        }

        self.check_extension(&relative)?;

        if content.len() as u64 > self.max_file_bytes {
            return Err(SandboxError::TooLarge);
        }

        let root = fs::canonicalize(&self.root)?;
        let target = root.join(&relative);

        let parent = target
            .parent()
            .ok_or(SandboxError::InvalidPath("missing file name"))?;
        let file_name = target
            .file_name()
            .ok_or(SandboxError::InvalidPath("missing file name"))?;

        fs::create_dir_all(parent)?;
        let real_parent = fs::canonicalize(parent)?;
        if !real_parent.starts_with(&root) {
            return Err(SandboxError::Traversal);
        }

        fs::write(real_parent.join(file_name), content)?;

        Ok(relative)
    }

    fn check_extension(&self, path: &Path) -> Result<(), SandboxError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or(SandboxError::DisallowedExtension)?;

        if self.allowed_extensions.iter().any(|allowed| *allowed == ext) {
            Ok(())
        } else {
            Err(SandboxError::DisallowedExtension)
        }
    }
}

/// Drive-letter absolute form (`C:/...`), after backslash normalization.
fn is_drive_absolute(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}
