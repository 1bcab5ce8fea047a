//! Proves an image is structurally readable by attaching it read-only.
//!
//! Metadata-only inspection (`hdiutil imageinfo`) gives false negatives on
//! large raw and hybrid images, so validation actually attaches the image as
//! a virtual device and then releases it again. Release is retried because
//! the OS can hold the device busy for a moment after attach.
use crate::error::{Error, Result};
use crate::image::ImageArtifact;
use crate::policy::{attempt_with_fallback, retry_bounded};
use crate::runner::CommandRunner;
use std::fs;
use std::time::Duration;

/// How hard to try when releasing an attached image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for DetachPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            pause: Duration::from_secs(1),
        }
    }
}

/// Outcome of a successful validation.
#[derive(Debug)]
pub struct Validation {
    /// Device node the image was attached as, e.g. `/dev/disk5`.
    pub device: String,
    /// Set when the device could not be detached. Always an [`Error::DetachFailed`].
    pub detach_warning: Option<Error>,
}

/// Extracts the device node from the first line of `hdiutil attach` output.
///
/// ```text
/// /dev/disk5
/// ```
pub fn parse_attach_device(stdout: &str) -> Option<String> {
    let first = stdout.lines().find(|l| !l.trim().is_empty())?;
    let token = first.split_whitespace().next()?;
    token.starts_with("/dev/").then(|| token.to_string())
}

/// Mounts the image read-only and hidden from Finder under a random
/// directory in the temp dir. Mounting makes the tool parse the filesystem
/// layers, so a structurally broken image fails the attach.
fn attach_args(image: &ImageArtifact) -> Vec<String> {
    vec![
        "attach".to_string(),
        "-readonly".to_string(),
        "-nobrowse".to_string(),
        "-mountrandom".to_string(),
        std::env::temp_dir().to_string_lossy().into_owned(),
        image.path.to_string_lossy().into_owned(),
    ]
}

fn detach_once<R: CommandRunner + ?Sized>(
    runner: &R,
    device: &str,
    force: bool,
) -> std::result::Result<(), String> {
    let mut args = vec!["detach".to_string()];
    if force {
        args.push("-force".to_string());
    }
    args.push(device.to_string());

    match runner.run("hdiutil", &args) {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(output.diagnostic()),
        Err(e) => Err(e.to_string()),
    }
}

/// Detaches `device`: graceful first, then forced, for up to `policy.attempts` rounds.
pub fn detach<R: CommandRunner + ?Sized>(
    runner: &R,
    device: &str,
    policy: &DetachPolicy,
) -> Result<()> {
    retry_bounded(policy.attempts, policy.pause, |attempt| {
        attempt_with_fallback(
            || detach_once(runner, device, false),
            |e| {
                log::warn!("detach of {device} failed ({e}), forcing (attempt {attempt})");
                detach_once(runner, device, true)
            },
        )
    })
    .map_err(|diagnostic| Error::DetachFailed {
        device: device.to_string(),
        attempts: policy.attempts.max(1),
        diagnostic,
    })
}

/// An attached image that is detached when released or dropped.
struct Attached<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    device: String,
    policy: DetachPolicy,
    released: bool,
}

impl<R: CommandRunner + ?Sized> Attached<'_, R> {
    fn release(mut self) -> Result<()> {
        self.released = true;
        detach(self.runner, &self.device, &self.policy)
    }
}

impl<R: CommandRunner + ?Sized> Drop for Attached<'_, R> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = detach(self.runner, &self.device, &self.policy) {
                log::warn!("{e}");
            }
        }
    }
}

/// Attaches `image` read-only, then detaches it again.
///
/// Marks the image validated on success. A failed detach does not fail
/// validation; it is returned in [`Validation::detach_warning`] for the
/// caller to weigh.
pub fn validate<R: CommandRunner + ?Sized>(
    runner: &R,
    image: &mut ImageArtifact,
    policy: &DetachPolicy,
) -> Result<Validation> {
    let metadata = fs::metadata(&image.path).map_err(|_| Error::MissingPath(image.path.clone()))?;
    if metadata.len() == 0 {
        return Err(Error::EmptyImage(image.path.clone()));
    }

    log::info!("attaching {} read-only", image.path.display());
    let output = runner
        .run("hdiutil", &attach_args(image))
        .map_err(|e| Error::ImageUnreadable {
            path: image.path.clone(),
            diagnostic: e.to_string(),
        })?;
    if !output.success {
        return Err(Error::ImageUnreadable {
            path: image.path.clone(),
            diagnostic: output.diagnostic(),
        });
    }

    let device = parse_attach_device(&output.stdout)
        .ok_or_else(|| Error::NoDeviceFromAttach(image.path.clone()))?;
    log::info!("{} attached as {}", image.path.display(), device);

    let attached = Attached {
        runner,
        device: device.clone(),
        policy: *policy,
        released: false,
    };
    image.validated = true;

    let detach_warning = match attached.release() {
        Ok(()) => None,
        Err(e) => {
            log::warn!("{e}");
            Some(e)
        }
    };

    Ok(Validation {
        device,
        detach_warning,
    })
}
