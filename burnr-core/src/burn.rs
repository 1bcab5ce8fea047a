//! Writes a validated image to the detected drive with `hdiutil burn`.
//!
//! A burn is tried twice at most: first bound to the detected device, then
//! once more without a device binding so the tool can pick its default
//! burner. The requested speed, if any, is kept for both attempts.
use crate::device::DriveState;
use crate::error::{Error, Result};
use crate::image::ImageArtifact;
use crate::policy::attempt_with_fallback;
use crate::runner::CommandRunner;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything that determines the final burn invocation.
#[derive(Debug, Clone)]
pub struct BurnRequest {
    pub image: ImageArtifact,
    pub speed: Option<u32>,
    pub drive: DriveState,
    /// Resolve the plan but invoke nothing. The orchestrator exits before
    /// building a request for dry runs, so it always sets this to `false`.
    pub dry_run: bool,
}

/// One `hdiutil burn` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnInvocation {
    pub device: Option<String>,
    pub speed: Option<u32>,
}

impl BurnInvocation {
    pub fn args(&self, image: &ImageArtifact) -> Vec<String> {
        let mut args = vec!["burn".to_string(), "-puppetstrings".to_string()];
        if let Some(device) = &self.device {
            args.extend(["-device".to_string(), device.clone()]);
        }
        if let Some(speed) = self.speed {
            args.extend(["-speed".to_string(), speed.to_string()]);
        }
        args.push(image.path.to_string_lossy().into_owned());
        args
    }
}

/// The primary and fallback invocations for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnPlan {
    pub primary: BurnInvocation,
    pub fallback: BurnInvocation,
}

impl BurnPlan {
    pub fn for_request(request: &BurnRequest) -> Self {
        Self {
            primary: BurnInvocation {
                device: request.drive.device_path.clone(),
                speed: request.speed,
            },
            fallback: BurnInvocation {
                device: None,
                speed: request.speed,
            },
        }
    }
}

/// Parses a `-puppetstrings` progress line such as `PERCENT:42.137`.
///
/// Returns `None` for other lines and for the indeterminate `PERCENT:-1`.
pub fn parse_progress(line: &str) -> Option<u8> {
    let value: f64 = line.trim().strip_prefix("PERCENT:")?.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some(value.round().min(100.0) as u8)
}

fn run_invocation<R: CommandRunner + ?Sized>(
    runner: &R,
    invocation: &BurnInvocation,
    image: &ImageArtifact,
    on_progress: &mut dyn FnMut(u8),
) -> std::result::Result<(), String> {
    let args = invocation.args(image);
    let mut on_line = |line: &str| {
        if let Some(percent) = parse_progress(line) {
            on_progress(percent);
        }
    };
    match runner.run_streaming("hdiutil", &args, &mut on_line) {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(output.diagnostic()),
        Err(e) => Err(e.to_string()),
    }
}

/// Burns `request.image`, falling back once to an unbound invocation.
///
/// `on_fallback` is called with the primary failure before the second
/// attempt; `on_progress` receives percentages from either attempt. If
/// `running` has been cleared by the time the primary attempt fails, the
/// fallback is skipped and [`Error::Cancelled`] is returned.
///
/// Nothing is invoked when `request.dry_run` is set.
pub fn burn<R: CommandRunner + ?Sized>(
    runner: &R,
    request: &BurnRequest,
    running: &AtomicBool,
    mut on_fallback: impl FnMut(&str),
    on_progress: impl FnMut(u8),
) -> Result<()> {
    let plan = BurnPlan::for_request(request);
    log::info!(
        "burning {} (device {:?}, speed {:?})",
        request.image.path.display(),
        plan.primary.device,
        plan.primary.speed
    );
    if request.dry_run {
        log::info!("dry run: not invoking {:?}", plan.primary.args(&request.image));
        return Ok(());
    }

    let on_progress = RefCell::new(on_progress);
    attempt_with_fallback(
        || {
            let mut progress = on_progress.borrow_mut();
            run_invocation(runner, &plan.primary, &request.image, &mut *progress).map_err(
                |primary| Error::BurnFailed {
                    primary,
                    fallback: String::new(),
                },
            )
        },
        |err| {
            let Error::BurnFailed { primary, .. } = err else {
                return Err(err);
            };
            if !running.load(Ordering::SeqCst) {
                log::warn!("device-bound burn failed after cancellation: {primary}");
                return Err(Error::Cancelled);
            }
            log::warn!("device-bound burn failed: {primary}; retrying without device binding");
            on_fallback(&primary);
            let mut progress = on_progress.borrow_mut();
            run_invocation(runner, &plan.fallback, &request.image, &mut *progress)
                .map_err(|fallback| Error::BurnFailed { primary, fallback })
        },
    )
}
