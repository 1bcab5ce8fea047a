//! The core, UI-agnostic library for the `burnr` disc imaging utility.
//!
//! `burnr-core` decides whether a disc image is safe to create, safe to treat
//! as valid and safe to burn. The external tools that do the actual work
//! (`hdiutil`, `drutil`) are reached only through the [`runner::CommandRunner`]
//! trait, so a front-end, or a test, can supply its own runner.
//!
//! The library is structured into several key modules:
//! - [`profile`]: Capacity and margin of the supported media.
//! - [`capacity`]: The guard comparing a source against a medium and the stage volume.
//! - [`layout`]: Validated source and stage directories.
//! - [`builder`]: Creating a hybrid image with `hdiutil makehybrid`.
//! - [`validator`]: Proving an image readable with a read-only attach.
//! - [`device`]: Parsing `drutil status` into a [`device::DriveState`].
//! - [`burn`]: The burn invocation with its single fallback.
//! - [`orchestrator`]: The state machine tying all of the above together.
//! - [`keep_awake`]: A guard that keeps the host awake during a run.
//!
//! The primary entry point is [`orchestrator::Orchestrator::run`], which
//! reports progress to an [`orchestrator::Observer`] so the calling
//! application can display it however it chooses.
//!
//! ## Example: Burning an Existing Image
//!
//! ```rust,no_run
//! use burnr_core::orchestrator::{Event, Mode, Observer, Orchestrator, RunConfig};
//! use burnr_core::profile::MediumProfile;
//! use burnr_core::runner::SystemRunner;
//! use std::path::PathBuf;
//! use std::sync::{Arc, atomic::AtomicBool};
//!
//! struct Print;
//!
//! impl Observer for Print {
//!     fn on_event(&mut self, event: &Event) {
//!         println!("{event:?}");
//!     }
//! }
//!
//! fn main() -> Result<(), burnr_core::Error> {
//!     let config = RunConfig {
//!         mode: Mode::Reuse { image: PathBuf::from("backup.iso") },
//!         profile: MediumProfile::BDXL,
//!         label: "BD_BACKUP".to_string(),
//!         speed: Some(4),
//!         dry_run: false,
//!         strict_detach: false,
//!     };
//!
//!     // A shared flag to allow for graceful cancellation.
//!     let running = Arc::new(AtomicBool::new(true));
//!     let _awake = burnr_core::keep_awake::KeepAwake::start();
//!
//!     let outcome = Orchestrator::new(&SystemRunner, running).run(&config, &mut Print)?;
//!     println!("{:?}: {}", outcome.completion, outcome.image);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod burn;
pub mod capacity;
pub mod device;
pub mod error;
pub mod image;
pub mod keep_awake;
pub mod layout;
pub mod orchestrator;
pub mod platform;
pub mod policy;
pub mod profile;
pub mod runner;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Category, Error, Result};
