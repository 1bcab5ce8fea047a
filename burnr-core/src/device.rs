//! Optical drive readiness, as reported by `drutil status`.
use crate::runner::CommandRunner;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Name:\s*(/dev/disk\d+)").expect("valid regex"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Type:\s*(\S+)(\s+Media)?").expect("valid regex"));

/// The drive and media currently visible to the system.
///
/// Recomputed on every [`probe`]; never cached. Only the first drive is
/// considered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriveState {
    /// The drive's device node (e.g., `/dev/disk4`).
    pub device_path: Option<String>,
    /// The media type token (e.g., `BD-R`, `DVD+R`).
    pub media_type: Option<String>,
}

impl DriveState {
    pub fn is_empty(&self) -> bool {
        self.device_path.is_none() && self.media_type.is_none()
    }
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.device_path, &self.media_type) {
            (None, _) => f.write_str("[No drive]"),
            (Some(device), None) => write!(f, "{:<15} [No media]", device),
            (Some(device), Some(media)) => write!(f, "{:<15} [{}]", device, media),
        }
    }
}

/// Translates `drutil status` text into a [`DriveState`].
///
/// The device comes from the first `Name: /dev/diskN` and the media type from
/// the first `Type: <token>`. Without a device line nothing is reported, since
/// a media type alone cannot be burned to. `Type: No Media Inserted` counts as
/// no media.
pub fn parse_drive_status(text: &str) -> DriveState {
    let Some(device) = NAME_RE.captures(text).map(|c| c[1].to_string()) else {
        return DriveState::default();
    };

    let media_type = TYPE_RE
        .captures(text)
        .filter(|c| !(&c[1] == "No" && c.get(2).is_some()))
        .map(|c| c[1].to_string());

    DriveState {
        device_path: Some(device),
        media_type,
    }
}

/// Queries the drive once.
///
/// A missing tool, a failing query or empty output all mean "no drive"
/// rather than an error; the orchestrator decides what absence means.
pub fn probe<R: CommandRunner + ?Sized>(runner: &R) -> DriveState {
    let output = match runner.run("drutil", &["status".to_string()]) {
        Ok(output) => output,
        Err(e) => {
            log::warn!("drutil status could not run: {e}");
            return DriveState::default();
        }
    };

    if !output.success {
        log::warn!("drutil status failed: {}", output.diagnostic());
        return DriveState::default();
    }

    let state = parse_drive_status(&output.stdout);
    log::info!("drive state: {state}");
    state
}
