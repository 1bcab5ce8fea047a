//! Drives a run end to end: create or reuse, validate, check the drive, burn.
//!
//! ```text
//! ModeSelect -> Creating | Reusing -> Validated -> DeviceCheck -> Burning -> Done
//!                                         \-> DryRunExit
//! ```
//!
//! Every fatal condition aborts at the point it is detected; nothing after it
//! runs. The only soft failure is a detach that would not complete during
//! validation, which is reported and carried in the [`Outcome`].
use crate::builder;
use crate::burn::{self, BurnRequest};
use crate::capacity::check_capacity;
use crate::device::{self, DriveState};
use crate::error::{Error, Result};
use crate::image::ImageArtifact;
use crate::layout::{SourceDir, StageDir};
use crate::profile::MediumProfile;
use crate::runner::CommandRunner;
use crate::validator::{self, DetachPolicy};
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where the image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Burn an image the operator already has.
    Reuse { image: PathBuf },
    /// Build a new image of `source` inside `stage`.
    Create { source: PathBuf, stage: PathBuf },
}

impl Mode {
    /// Picks the mode from the operator's inputs.
    ///
    /// An image path selects reuse mode and may not be combined with
    /// source/stage. Otherwise both source and stage are required.
    pub fn select(
        image: Option<PathBuf>,
        source: Option<PathBuf>,
        stage: Option<PathBuf>,
    ) -> Result<Self> {
        match (image, source, stage) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::ConflictingArguments),
            (Some(image), None, None) => Ok(Mode::Reuse { image }),
            (None, Some(source), Some(stage)) => Ok(Mode::Create { source, stage }),
            _ => Err(Error::MissingArguments),
        }
    }
}

/// Everything a run needs to know up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub profile: MediumProfile,
    pub label: String,
    pub speed: Option<u32>,
    pub dry_run: bool,
    /// Treat a failed detach during validation as fatal.
    pub strict_detach: bool,
}

/// The states of a run, reported as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ModeSelect,
    Creating,
    Reusing,
    Validated,
    DryRunExit,
    DeviceCheck,
    Burning,
    Done,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::ModeSelect => "mode select",
            State::Creating => "creating image",
            State::Reusing => "reusing image",
            State::Validated => "validated",
            State::DryRunExit => "dry run",
            State::DeviceCheck => "checking drive",
            State::Burning => "burning",
            State::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress notifications, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Entered(State),
    SourceMeasured { path: PathBuf, size_bytes: u64 },
    StageMeasured { path: PathBuf, free_bytes: u64 },
    CapacityOk { profile: MediumProfile, source_bytes: u64, stage_free_bytes: u64 },
    ImageCreated(ImageArtifact),
    ImageValidated { image: ImageArtifact, attached_as: String },
    DetachWarning(String),
    DriveDetected(DriveState),
    BurnFallback(String),
    BurnProgress(u8),
}

/// Receives events from a run and answers the one question it asks.
pub trait Observer {
    fn on_event(&mut self, event: &Event);

    /// Last chance to stop before media is written. Defaults to proceeding.
    fn confirm_burn(&mut self, _request: &BurnRequest) -> bool {
        true
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    DryRun,
    Burned,
    Declined,
}

#[derive(Debug)]
pub struct Outcome {
    pub completion: Completion,
    pub image: ImageArtifact,
    /// The drive that was checked; `None` for dry runs.
    pub drive: Option<DriveState>,
    /// Set when validation could not detach the image (non-strict runs only).
    pub detach_warning: Option<Error>,
}

/// Runs the pipeline against a [`CommandRunner`].
pub struct Orchestrator<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    running: Arc<AtomicBool>,
    detach_policy: DetachPolicy,
}

impl<'a, R: CommandRunner + ?Sized> Orchestrator<'a, R> {
    /// `running` is checked between states; clearing it cancels the run.
    pub fn new(runner: &'a R, running: Arc<AtomicBool>) -> Self {
        Self {
            runner,
            running,
            detach_policy: DetachPolicy::default(),
        }
    }

    pub fn with_detach_policy(mut self, policy: DetachPolicy) -> Self {
        self.detach_policy = policy;
        self
    }

    fn check_running(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }

    fn create(
        &self,
        config: &RunConfig,
        source: &Path,
        stage: &Path,
        observer: &mut dyn Observer,
    ) -> Result<ImageArtifact> {
        observer.on_event(&Event::Entered(State::Creating));

        let source = SourceDir::open(source)?;
        observer.on_event(&Event::SourceMeasured {
            path: source.path.clone(),
            size_bytes: source.size_bytes,
        });

        let stage = StageDir::open(stage)?;
        observer.on_event(&Event::StageMeasured {
            path: stage.path.clone(),
            free_bytes: stage.free_bytes,
        });

        check_capacity(&config.profile, source.size_bytes, stage.free_bytes)?;
        observer.on_event(&Event::CapacityOk {
            profile: config.profile,
            source_bytes: source.size_bytes,
            stage_free_bytes: stage.free_bytes,
        });

        self.check_running()?;
        let image =
            builder::build(self.runner, &source, &stage, config.profile.kind, &config.label)?;
        observer.on_event(&Event::ImageCreated(image.clone()));
        Ok(image)
    }

    /// Executes `config`, reporting to `observer`.
    pub fn run(&self, config: &RunConfig, observer: &mut dyn Observer) -> Result<Outcome> {
        observer.on_event(&Event::Entered(State::ModeSelect));
        self.check_running()?;

        let mut image = match &config.mode {
            Mode::Reuse { image } => {
                observer.on_event(&Event::Entered(State::Reusing));
                ImageArtifact::existing(image)?
            }
            Mode::Create { source, stage } => self.create(config, source, stage, observer)?,
        };

        self.check_running()?;
        let validation = validator::validate(self.runner, &mut image, &self.detach_policy)?;
        let detach_warning = match validation.detach_warning {
            Some(warning) if config.strict_detach => return Err(warning),
            Some(warning) => {
                observer.on_event(&Event::DetachWarning(warning.to_string()));
                Some(warning)
            }
            None => None,
        };
        observer.on_event(&Event::ImageValidated {
            image: image.clone(),
            attached_as: validation.device,
        });
        observer.on_event(&Event::Entered(State::Validated));

        if config.dry_run {
            observer.on_event(&Event::Entered(State::DryRunExit));
            return Ok(Outcome {
                completion: Completion::DryRun,
                image,
                drive: None,
                detach_warning,
            });
        }

        self.check_running()?;
        observer.on_event(&Event::Entered(State::DeviceCheck));
        let drive = device::probe(self.runner);
        observer.on_event(&Event::DriveDetected(drive.clone()));
        let device_path = drive.device_path.clone().ok_or(Error::NoOpticalDevice)?;
        if drive.media_type.is_none() {
            return Err(Error::NoWritableMedia(device_path));
        }

        let request = BurnRequest {
            image,
            speed: config.speed,
            drive,
            dry_run: false,
        };
        if !observer.confirm_burn(&request) {
            return Ok(Outcome {
                completion: Completion::Declined,
                image: request.image,
                drive: Some(request.drive),
                detach_warning,
            });
        }

        self.check_running()?;
        observer.on_event(&Event::Entered(State::Burning));
        {
            let observer = RefCell::new(&mut *observer);
            burn::burn(
                self.runner,
                &request,
                &self.running,
                |reason| {
                    observer
                        .borrow_mut()
                        .on_event(&Event::BurnFallback(reason.to_string()))
                },
                |percent| observer.borrow_mut().on_event(&Event::BurnProgress(percent)),
            )?;
        }
        observer.on_event(&Event::Entered(State::Done));

        Ok(Outcome {
            completion: Completion::Burned,
            image: request.image,
            drive: Some(request.drive),
            detach_warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Category;
    use crate::profile::MediumKind;
    use crate::testing::{FakeRunner, arg_after, fail, ok};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const DRIVE_READY: &str = "           Type: BD-R                  Name: /dev/disk4\n";

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        decline: bool,
        asked: bool,
    }

    impl Recorder {
        fn states(&self) -> Vec<State> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Entered(s) => Some(*s),
                    _ => None,
                })
                .collect()
        }
    }

    impl Observer for Recorder {
        fn on_event(&mut self, event: &Event) {
            self.events.push(event.clone());
        }

        fn confirm_burn(&mut self, _request: &BurnRequest) -> bool {
            self.asked = true;
            !self.decline
        }
    }

    /// A runner where every tool succeeds and `makehybrid` writes a real file.
    fn happy_runner(drive_status: &'static str) -> FakeRunner {
        FakeRunner::new(move |call| match (call[0].as_str(), call[1].as_str()) {
            ("hdiutil", "makehybrid") => {
                fs::write(arg_after(call, "-o").unwrap(), vec![0u8; 8192]).unwrap();
                ok("")
            }
            ("hdiutil", "attach") => ok("/dev/disk5\t\n"),
            ("drutil", "status") => ok(drive_status),
            _ => ok(""),
        })
    }

    fn orchestrator(runner: &FakeRunner) -> Orchestrator<'_, FakeRunner> {
        Orchestrator::new(runner, Arc::new(AtomicBool::new(true))).with_detach_policy(DetachPolicy {
            attempts: 3,
            pause: Duration::ZERO,
        })
    }

    fn config(mode: Mode) -> RunConfig {
        RunConfig {
            mode,
            profile: MediumProfile::DVD,
            label: "TEST".to_string(),
            speed: None,
            dry_run: false,
            strict_detach: false,
        }
    }

    fn reuse_image(dir: &TempDir, len: usize) -> PathBuf {
        let path = dir.path().join("existing.iso");
        fs::write(&path, vec![9u8; len]).unwrap();
        path
    }

    fn create_dirs(dir: &TempDir) -> (PathBuf, PathBuf) {
        let source = dir.path().join("source");
        let stage = dir.path().join("stage");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&stage).unwrap();
        fs::write(source.join("notes.txt"), b"backup me").unwrap();
        (source, stage)
    }

    #[test]
    fn test_mode_select() {
        let p = |s: &str| Some(PathBuf::from(s));
        assert_eq!(
            Mode::select(p("a.iso"), None, None).unwrap(),
            Mode::Reuse { image: PathBuf::from("a.iso") }
        );
        assert_eq!(
            Mode::select(None, p("src"), p("stage")).unwrap(),
            Mode::Create {
                source: PathBuf::from("src"),
                stage: PathBuf::from("stage")
            }
        );
        assert!(matches!(Mode::select(None, p("src"), None), Err(Error::MissingArguments)));
        assert!(matches!(Mode::select(None, None, None), Err(Error::MissingArguments)));
        assert!(matches!(
            Mode::select(p("a.iso"), p("src"), None),
            Err(Error::ConflictingArguments)
        ));
    }

    #[test]
    fn test_create_mode_runs_full_pipeline() {
        let dir = TempDir::new().unwrap();
        let (source, stage) = create_dirs(&dir);
        let runner = happy_runner(DRIVE_READY);
        let mut recorder = Recorder::default();

        let outcome = orchestrator(&runner)
            .run(&config(Mode::Create { source, stage: stage.clone() }), &mut recorder)
            .unwrap();

        assert_eq!(outcome.completion, Completion::Burned);
        assert!(outcome.image.is_validated());
        assert!(outcome.image.path.starts_with(&stage));
        assert!(recorder.asked);
        assert_eq!(
            recorder.states(),
            vec![
                State::ModeSelect,
                State::Creating,
                State::Validated,
                State::DeviceCheck,
                State::Burning,
                State::Done
            ]
        );
        let verbs: Vec<String> = runner.calls().iter().map(|c| c[1].clone()).collect();
        assert_eq!(verbs, vec!["makehybrid", "attach", "detach", "status", "burn"]);
    }

    #[test]
    fn test_reuse_mode_skips_capacity_and_builder() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = happy_runner(DRIVE_READY);
        let mut recorder = Recorder::default();

        orchestrator(&runner)
            .run(&config(Mode::Reuse { image }), &mut recorder)
            .unwrap();

        assert!(runner.calls_to("hdiutil", "makehybrid").is_empty());
        assert!(!recorder
            .events
            .iter()
            .any(|e| matches!(e, Event::CapacityOk { .. } | Event::SourceMeasured { .. })));
        assert_eq!(runner.calls_to("hdiutil", "burn").len(), 1);
    }

    #[test]
    fn test_dry_run_never_probes_or_burns() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = happy_runner(DRIVE_READY);
        let mut recorder = Recorder::default();
        let mut cfg = config(Mode::Reuse { image: image.clone() });
        cfg.dry_run = true;

        let outcome = orchestrator(&runner).run(&cfg, &mut recorder).unwrap();

        assert_eq!(outcome.completion, Completion::DryRun);
        assert_eq!(outcome.image.path, image);
        assert!(runner.calls_to("drutil", "status").is_empty());
        assert!(runner.calls_to("hdiutil", "burn").is_empty());
        assert!(!recorder.asked);
        assert_eq!(recorder.states().last(), Some(&State::DryRunExit));
    }

    #[test]
    fn test_zero_byte_reuse_image_fails_before_attach() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 0);
        let runner = happy_runner(DRIVE_READY);

        let err = orchestrator(&runner)
            .run(&config(Mode::Reuse { image }), &mut Recorder::default())
            .unwrap_err();

        assert_eq!(err.category(), Category::Precondition);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_corrupt_reuse_image_is_fatal() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = FakeRunner::new(|_| fail("hdiutil: attach failed - image not recognized"));

        let err = orchestrator(&runner)
            .run(&config(Mode::Reuse { image }), &mut Recorder::default())
            .unwrap_err();

        assert!(matches!(err, Error::ImageUnreadable { .. }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_missing_drive_aborts_before_burn() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = happy_runner(" Vendor   Product\n           Type: BD-R\n");

        let err = orchestrator(&runner)
            .run(&config(Mode::Reuse { image }), &mut Recorder::default())
            .unwrap_err();

        assert!(matches!(err, Error::NoOpticalDevice));
        assert_eq!(err.category(), Category::Device);
        assert!(runner.calls_to("hdiutil", "burn").is_empty());
    }

    #[test]
    fn test_drive_without_media_aborts_before_burn() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = happy_runner("           Type: No Media Inserted     Name: /dev/disk4\n");

        let err = orchestrator(&runner)
            .run(&config(Mode::Reuse { image }), &mut Recorder::default())
            .unwrap_err();

        assert!(matches!(err, Error::NoWritableMedia(ref d) if d == "/dev/disk4"));
        assert!(runner.calls_to("hdiutil", "burn").is_empty());
    }

    #[test]
    fn test_capacity_failure_stops_before_builder() {
        let dir = TempDir::new().unwrap();
        let (source, stage) = create_dirs(&dir);
        let runner = happy_runner(DRIVE_READY);
        let mut cfg = config(Mode::Create { source, stage });
        cfg.profile = MediumProfile {
            kind: MediumKind::Dvd,
            capacity_bytes: 1,
            margin_bytes: 0,
        };

        let err = orchestrator(&runner).run(&cfg, &mut Recorder::default()).unwrap_err();

        assert!(matches!(err, Error::SourceTooLarge { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_missing_stage_is_a_precondition_error() {
        let dir = TempDir::new().unwrap();
        let (source, _) = create_dirs(&dir);
        let runner = happy_runner(DRIVE_READY);
        let cfg = config(Mode::Create {
            source,
            stage: dir.path().join("nowhere"),
        });

        let err = orchestrator(&runner).run(&cfg, &mut Recorder::default()).unwrap_err();
        assert_eq!(err.category(), Category::Precondition);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_speed_burn_falls_back_without_device() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = FakeRunner::new(|call| match (call[0].as_str(), call[1].as_str()) {
            ("hdiutil", "attach") => ok("/dev/disk5\n"),
            ("drutil", _) => ok(DRIVE_READY),
            ("hdiutil", "burn") if call.contains(&"-device".to_string()) => {
                fail("bound burn failed")
            }
            _ => ok("PERCENT:100.0\n"),
        });
        let mut recorder = Recorder::default();
        let mut cfg = config(Mode::Reuse { image });
        cfg.speed = Some(4);

        let outcome = orchestrator(&runner).run(&cfg, &mut recorder).unwrap();

        assert_eq!(outcome.completion, Completion::Burned);
        let burns = runner.calls_to("hdiutil", "burn");
        assert_eq!(burns.len(), 2);
        assert_eq!(arg_after(&burns[1], "-speed"), Some("4"));
        assert_eq!(arg_after(&burns[1], "-device"), None);
        assert!(recorder
            .events
            .contains(&Event::BurnFallback("bound burn failed".to_string())));
        assert!(recorder.events.contains(&Event::BurnProgress(100)));
    }

    #[test]
    fn test_declined_confirmation_does_not_burn() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = happy_runner(DRIVE_READY);
        let mut recorder = Recorder {
            decline: true,
            ..Default::default()
        };

        let outcome = orchestrator(&runner)
            .run(&config(Mode::Reuse { image }), &mut recorder)
            .unwrap();

        assert_eq!(outcome.completion, Completion::Declined);
        assert!(runner.calls_to("hdiutil", "burn").is_empty());
    }

    fn stuck_detach_runner() -> FakeRunner {
        FakeRunner::new(|call| match (call[0].as_str(), call[1].as_str()) {
            ("hdiutil", "attach") => ok("/dev/disk5\n"),
            ("hdiutil", "detach") => fail("Resource busy"),
            _ => ok(""),
        })
    }

    #[test]
    fn test_detach_warning_is_carried_but_not_fatal() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = stuck_detach_runner();
        let mut recorder = Recorder::default();
        let mut cfg = config(Mode::Reuse { image });
        cfg.dry_run = true;

        let outcome = orchestrator(&runner).run(&cfg, &mut recorder).unwrap();

        assert!(matches!(outcome.detach_warning, Some(Error::DetachFailed { .. })));
        assert!(recorder
            .events
            .iter()
            .any(|e| matches!(e, Event::DetachWarning(_))));
    }

    #[test]
    fn test_strict_detach_makes_warning_fatal() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = stuck_detach_runner();
        let mut cfg = config(Mode::Reuse { image });
        cfg.strict_detach = true;

        let err = orchestrator(&runner).run(&cfg, &mut Recorder::default()).unwrap_err();

        assert_eq!(err.category(), Category::Cleanup);
        assert!(runner.calls_to("drutil", "status").is_empty());
    }

    #[test]
    fn test_cancelled_run_stops_immediately() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let runner = happy_runner(DRIVE_READY);
        let orchestrator = Orchestrator::new(&runner, Arc::new(AtomicBool::new(false)));

        let err = orchestrator
            .run(&config(Mode::Reuse { image }), &mut Recorder::default())
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_interrupted_primary_burn_does_not_fall_back() {
        let dir = TempDir::new().unwrap();
        let image = reuse_image(&dir, 4096);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let runner = FakeRunner::new(move |call| match (call[0].as_str(), call[1].as_str()) {
            ("hdiutil", "attach") => ok("/dev/disk5\n"),
            ("drutil", _) => ok(DRIVE_READY),
            ("hdiutil", "burn") => {
                // Ctrl+C arrives while the bound burn is running.
                flag.store(false, Ordering::SeqCst);
                fail("hdiutil: burn failed - interrupted")
            }
            _ => ok(""),
        });
        let mut recorder = Recorder::default();

        let err = Orchestrator::new(&runner, running)
            .with_detach_policy(DetachPolicy {
                attempts: 1,
                pause: Duration::ZERO,
            })
            .run(&config(Mode::Reuse { image }), &mut recorder)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(runner.calls_to("hdiutil", "burn").len(), 1);
        assert!(!recorder
            .events
            .iter()
            .any(|e| matches!(e, Event::BurnFallback(_))));
        assert!(!recorder.states().contains(&State::Done));
    }

    #[test]
    fn test_created_image_is_left_in_place_when_validation_fails() {
        let dir = TempDir::new().unwrap();
        let (source, stage) = create_dirs(&dir);
        let runner = FakeRunner::new(|call| match call[1].as_str() {
            "makehybrid" => {
                fs::write(arg_after(call, "-o").unwrap(), b"garbage").unwrap();
                ok("")
            }
            _ => fail("hdiutil: attach failed - corrupt image"),
        });

        let err = orchestrator(&runner)
            .run(&config(Mode::Create { source, stage: stage.clone() }), &mut Recorder::default())
            .unwrap_err();

        assert!(matches!(err, Error::ImageUnreadable { .. }));
        let left: Vec<_> = fs::read_dir(&stage).unwrap().collect();
        assert_eq!(left.len(), 1);
        assert!(Path::new(&stage).exists());
    }
}
