mod logging;
mod report;

use anyhow::Result;
use burnr_core::builder::DEFAULT_LABEL;
use burnr_core::keep_awake::KeepAwake;
use burnr_core::orchestrator::{Completion, Mode, Orchestrator, RunConfig};
use burnr_core::profile::{MediumKind, MediumProfile};
use burnr_core::runner::SystemRunner;
use burnr_core::{Category, Error};
use clap::Parser;
use console::style;
use report::ConsoleObserver;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use libc::ECHOCTL;
#[cfg(unix)]
use std::io::{IsTerminal, stdout};
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use termios::{TCSANOW, Termios, tcsetattr};

/// Exit status for a detach failure made fatal by `--strict-detach`.
const EXIT_CLEANUP: u8 = 3;

#[derive(Parser)]
#[command(name = "burnr")]
#[command(
    about = "Build a disc image from a directory, prove it readable, and burn it",
    version
)]
struct Cli {
    /// Directory to build the image from (create mode, requires --stage)
    #[arg(long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Directory to write the new image into (create mode, requires --source)
    #[arg(long, value_name = "DIR")]
    stage: Option<PathBuf>,

    /// Volume label of the new image
    #[arg(long = "volume", value_name = "LABEL", default_value = DEFAULT_LABEL)]
    volume: String,

    /// Build for single-layer DVD media
    #[arg(long, conflicts_with = "bdxl")]
    dvd: bool,

    /// Build for BDXL media (default)
    #[arg(long)]
    bdxl: bool,

    /// Existing image to validate and burn (reuse mode)
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Burn speed hint passed to the burner
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    speed: Option<u32>,

    /// Stop after validation; do not touch the drive
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Burn without asking for confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Fail the run if the validated image cannot be detached
    #[arg(long = "strict-detach")]
    strict_detach: bool,

    /// Append a debug log of the run to this file
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Show more diagnostics (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn medium(&self) -> MediumKind {
        if self.dvd && !self.bdxl {
            MediumKind::Dvd
        } else {
            MediumKind::Bdxl
        }
    }
}

/// Suppresses the terminal's `^C` echo while a run is in progress.
///
/// Ctrl+C is handled by clearing the run's `running` flag, and the error
/// that follows explains what happened; the echoed `^C` would only clutter
/// it. The saved settings are restored on drop.
struct EchoGuard {
    #[cfg(unix)]
    saved: Option<Termios>,
}

impl EchoGuard {
    #[cfg(unix)]
    fn new() -> Self {
        let out = stdout();
        if !out.is_terminal() {
            return Self { saved: None };
        }

        let fd = out.as_raw_fd();
        let Ok(saved) = Termios::from_fd(fd) else {
            return Self { saved: None };
        };
        let mut quiet = saved;
        quiet.c_lflag &= !ECHOCTL;

        match tcsetattr(fd, TCSANOW, &quiet) {
            Ok(()) => Self { saved: Some(saved) },
            Err(_) => Self { saved: None },
        }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        Self {}
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(saved) = &self.saved {
            tcsetattr(stdout().as_raw_fd(), TCSANOW, saved).ok();
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Dropped when run() returns, on success or error.
    let _echo = EchoGuard::new();
    let _awake = KeepAwake::start();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let medium = cli.medium();
    let config = RunConfig {
        mode: Mode::select(cli.image, cli.source, cli.stage)?,
        profile: MediumProfile::for_kind(medium),
        label: cli.volume,
        speed: cli.speed,
        dry_run: cli.dry_run,
        strict_detach: cli.strict_detach,
    };
    log::info!("run configuration: {config:?}");

    let runner = SystemRunner;
    let mut observer = ConsoleObserver::new(cli.yes);
    let outcome = match Orchestrator::new(&runner, running).run(&config, &mut observer) {
        Ok(outcome) => outcome,
        Err(e) => {
            observer.abandon();
            return Err(e.into());
        }
    };

    if let Some(warning) = &outcome.detach_warning {
        println!(
            "\n{} {}\n  The image may still be attached; check `hdiutil info` and detach it manually.",
            style("WARNING:").yellow().bold(),
            warning
        );
    }

    match outcome.completion {
        Completion::DryRun => println!(
            "\n✨ Image ready at {} (dry run, nothing burned).",
            style(outcome.image.path.display()).cyan()
        ),
        Completion::Declined => println!("Burn cancelled."),
        Completion::Burned => {
            let device = outcome
                .drive
                .as_ref()
                .and_then(|d| d.device_path.clone())
                .unwrap_or_default();
            println!(
                "\n✨ Successfully burned {} to {}.",
                style(outcome.image.path.display()).cyan(),
                style(device).cyan()
            );
        }
    }

    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>().map(Error::category) {
        Some(Category::Cleanup) => EXIT_CLEANUP,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let category = err
                .downcast_ref::<Error>()
                .map(|e| format!("{}: ", e.category()))
                .unwrap_or_default();
            eprintln!("{} {}{:#}", style("ERROR:").red().bold(), category, err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}
