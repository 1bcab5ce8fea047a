//! Error types shared by every stage of a run.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for `burnr-core` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a run, plus the one warning-class condition
/// ([`Error::DetachFailed`]) that only stops it when the caller asks.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither an image nor a source/stage pair was supplied.
    #[error("missing arguments: supply --image <path>, or both --source <dir> and --stage <dir>")]
    MissingArguments,

    /// Reuse-mode and create-mode inputs were mixed.
    #[error("conflicting arguments: --image cannot be combined with --source/--stage")]
    ConflictingArguments,

    #[error("path does not exist: {0}")]
    MissingPath(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("stage directory is not writable: {path} ({reason})")]
    StageNotWritable { path: PathBuf, reason: String },

    #[error("image file is empty: {0}")]
    EmptyImage(PathBuf),

    #[error("invalid volume label '{0}': must be non-empty and contain no path separators")]
    InvalidLabel(String),

    #[error(
        "source is too large for {medium}: {source_bytes} bytes >= limit of {limit_bytes} bytes"
    )]
    SourceTooLarge {
        medium: String,
        source_bytes: u64,
        limit_bytes: u64,
    },

    #[error(
        "insufficient space on stage volume: {free_bytes} bytes free, more than {needed_bytes} bytes needed"
    )]
    InsufficientStageSpace { free_bytes: u64, needed_bytes: u64 },

    #[error("image creation failed: {0}")]
    ImageCreationFailed(String),

    #[error("image missing after creation: {0}")]
    ImageMissingAfterCreation(PathBuf),

    #[error("created image is empty: {0}")]
    ImageEmpty(PathBuf),

    #[error("image is unreadable: {path}: {diagnostic}")]
    ImageUnreadable { path: PathBuf, diagnostic: String },

    #[error("attach of {0} reported no device identifier")]
    NoDeviceFromAttach(PathBuf),

    #[error("failed to detach {device} after {attempts} attempts: {diagnostic}")]
    DetachFailed {
        device: String,
        attempts: u32,
        diagnostic: String,
    },

    #[error("no optical device detected")]
    NoOpticalDevice,

    #[error("no writable media in {0}")]
    NoWritableMedia(String),

    #[error("burn failed: device-bound attempt: {primary}; fallback attempt: {fallback}")]
    BurnFailed { primary: String, fallback: String },

    #[error("operation cancelled by user")]
    Cancelled,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The coarse class of an [`Error`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Argument,
    Precondition,
    Capacity,
    Creation,
    Validation,
    Device,
    Burn,
    Cleanup,
    Cancelled,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Error::MissingArguments | Error::ConflictingArguments | Error::InvalidLabel(_) => {
                Category::Argument
            }
            Error::MissingPath(_)
            | Error::NotADirectory(_)
            | Error::NotAFile(_)
            | Error::StageNotWritable { .. }
            | Error::EmptyImage(_)
            | Error::Io { .. } => Category::Precondition,
            Error::SourceTooLarge { .. } | Error::InsufficientStageSpace { .. } => {
                Category::Capacity
            }
            Error::ImageCreationFailed(_)
            | Error::ImageMissingAfterCreation(_)
            | Error::ImageEmpty(_) => Category::Creation,
            Error::ImageUnreadable { .. } | Error::NoDeviceFromAttach(_) => Category::Validation,
            Error::NoOpticalDevice | Error::NoWritableMedia(_) => Category::Device,
            Error::BurnFailed { .. } => Category::Burn,
            Error::DetachFailed { .. } => Category::Cleanup,
            Error::Cancelled => Category::Cancelled,
        }
    }

    /// Whether the run should stop on this error. Only a failed detach is soft.
    pub fn is_fatal(&self) -> bool {
        self.category() != Category::Cleanup
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Argument => "argument error",
            Category::Precondition => "precondition error",
            Category::Capacity => "capacity error",
            Category::Creation => "creation error",
            Category::Validation => "validation error",
            Category::Device => "device error",
            Category::Burn => "burn error",
            Category::Cleanup => "cleanup warning",
            Category::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
