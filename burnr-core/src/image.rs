//! The disc image a run burns, whether freshly built or supplied by the operator.
use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A single image file on disk.
///
/// Produced by [`crate::builder::build`] or supplied by the operator in
/// reuse mode. Only [`crate::validator::validate`] flips `validated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub(crate) validated: bool,
}

impl ImageArtifact {
    /// Opens an existing image, requiring a non-empty regular file.
    pub fn existing(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|_| Error::MissingPath(path.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }
        if metadata.len() == 0 {
            return Err(Error::EmptyImage(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            validated: false,
        })
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }
}

impl fmt::Display for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.validated {
            "[validated]"
        } else {
            "[not validated]"
        };
        write!(f, "{} ({} bytes) {}", self.path.display(), self.size_bytes, state)
    }
}
