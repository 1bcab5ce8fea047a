//! Validated source and stage directories for create mode.
use crate::error::{Error, Result};
use crate::platform;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

fn require_dir(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|_| Error::MissingPath(path.to_path_buf()))?;
    if !metadata.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// The directory whose contents become the image.
#[derive(Debug, Clone)]
pub struct SourceDir {
    pub path: PathBuf,
    /// On-disk allocation of the whole tree.
    pub size_bytes: u64,
}

impl SourceDir {
    pub fn open(path: &Path) -> Result<Self> {
        require_dir(path)?;
        let size_bytes = platform::allocated_size(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
        })
    }
}

/// The directory the image is written into.
#[derive(Debug, Clone)]
pub struct StageDir {
    pub path: PathBuf,
    /// Free space on the stage volume when the directory was opened.
    pub free_bytes: u64,
}

impl StageDir {
    pub fn open(path: &Path) -> Result<Self> {
        require_dir(path)?;
        drop(WriteProbe::create(path)?);
        let free_bytes = platform::available_space(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            free_bytes,
        })
    }
}

/// A scratch file proving a directory is writable. Removed on drop.
struct WriteProbe {
    path: PathBuf,
}

impl WriteProbe {
    fn create(dir: &Path) -> Result<Self> {
        let path = dir.join(format!(".burnr-write-probe-{}", std::process::id()));
        let not_writable = |e: std::io::Error| Error::StageNotWritable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(not_writable)?;
        let probe = Self { path };
        file.write_all(b"burnr").map_err(not_writable)?;
        Ok(probe)
    }
}

impl Drop for WriteProbe {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not remove write probe {}: {}", self.path.display(), e);
        }
    }
}
