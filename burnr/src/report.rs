//! Turns orchestrator events into the operator's audit trail on stdout.
use burnr_core::burn::BurnRequest;
use burnr_core::orchestrator::{Event, Observer, State};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::io::{IsTerminal, stdin};
use std::time::Duration;

pub struct ConsoleObserver {
    assume_yes: bool,
    spinner: Option<ProgressBar>,
    burn_pb: Option<ProgressBar>,
}

impl ConsoleObserver {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            spinner: None,
            burn_pb: None,
        }
    }

    fn start_spinner(&mut self, prefix: &str, message: String) {
        self.stop_spinner();
        let pb = ProgressBar::new_spinner();
        pb.set_prefix(prefix.to_string());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:12} [{elapsed_precise}] {spinner:.blue} {msg}")
                .expect("static template"),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn stop_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn start_burn_bar(&mut self) {
        let pb = ProgressBar::new(100);
        pb.set_prefix("Burning");
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {pos:>3}% ({eta})")
                .expect("static template")
                .progress_chars("■ "),
        );
        self.burn_pb = Some(pb);
    }

    /// Clears any live progress output so an error message is not garbled.
    pub fn abandon(&mut self) {
        self.stop_spinner();
        if let Some(pb) = self.burn_pb.take() {
            pb.abandon_with_message("❌ Operation failed.");
        }
    }

    fn line(&self, text: String) {
        match (&self.spinner, &self.burn_pb) {
            (_, Some(pb)) | (Some(pb), None) => pb.println(text),
            (None, None) => println!("{text}"),
        }
    }
}

impl Observer for ConsoleObserver {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::Entered(State::ModeSelect) => {}
            Event::Entered(State::Creating) => println!("{}", style("Creating a new image").bold()),
            Event::Entered(State::Reusing) => {
                println!("{}", style("Reusing an existing image").bold());
                self.start_spinner("Validating", "attaching read-only".to_string());
            }
            Event::SourceMeasured { path, size_bytes } => println!(
                "  Source: {} ({})",
                style(path.display()).cyan(),
                HumanBytes(*size_bytes)
            ),
            Event::StageMeasured { path, free_bytes } => println!(
                "  Stage:  {} ({} free)",
                style(path.display()).cyan(),
                HumanBytes(*free_bytes)
            ),
            Event::CapacityOk { profile, .. } => {
                println!(
                    "  Fits {} (limit {})",
                    profile.kind,
                    HumanBytes(profile.limit_bytes())
                );
                self.start_spinner("Imaging", format!("building {} image", profile.kind));
            }
            Event::ImageCreated(image) => {
                self.stop_spinner();
                println!(
                    "  Output: {} ({})",
                    style(image.path.display()).cyan(),
                    HumanBytes(image.size_bytes)
                );
                self.start_spinner("Validating", "attaching read-only".to_string());
            }
            Event::DetachWarning(warning) => {
                self.line(format!("{} {}", style("WARNING:").yellow().bold(), warning));
            }
            Event::ImageValidated { image, attached_as } => {
                self.stop_spinner();
                println!(
                    "  Validated: {} ({}, attached as {})",
                    style(image.path.display()).cyan(),
                    HumanBytes(image.size_bytes),
                    attached_as
                );
            }
            Event::Entered(State::Validated) => {}
            Event::Entered(State::DryRunExit) => {
                println!("{}", style("Dry run: skipping device check and burn.").bold());
            }
            Event::Entered(State::DeviceCheck) => {
                self.start_spinner("Drive", "checking drive status".to_string());
            }
            Event::DriveDetected(drive) => {
                self.stop_spinner();
                println!("  Drive:  {}", style(drive).cyan());
            }
            Event::Entered(State::Burning) => self.start_burn_bar(),
            Event::BurnFallback(reason) => {
                self.line(format!(
                    "{} device-bound burn failed ({}); retrying with the default burner",
                    style("WARNING:").yellow().bold(),
                    reason
                ));
            }
            Event::BurnProgress(percent) => {
                if let Some(pb) = &self.burn_pb {
                    pb.set_position(u64::from(*percent));
                }
            }
            Event::Entered(State::Done) => {
                if let Some(pb) = self.burn_pb.take() {
                    pb.finish_with_message("Burn complete.");
                }
            }
        }
    }

    fn confirm_burn(&mut self, request: &BurnRequest) -> bool {
        self.stop_spinner();
        let device = request.drive.device_path.as_deref().unwrap_or("the default burner");

        println!();
        println!(
            "{} This will write {} to the media in {}.",
            style("WARNING:").red().bold(),
            HumanBytes(request.image.size_bytes),
            device,
        );
        println!("  Image:  {}", style(request.image.path.display()).cyan());
        if let Some(speed) = request.speed {
            println!("  Speed:  {speed}x");
        }
        println!();

        if self.assume_yes || !stdin().is_terminal() {
            return true;
        }

        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Are you sure you want to proceed?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}
