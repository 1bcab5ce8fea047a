//! Keeps the host awake for the duration of a run.
use std::process::{Child, Command, Stdio};

/// A running `caffeinate` assertion, terminated when dropped.
///
/// Hold it for the whole run so every exit path (success, error or a
/// cancelled operation unwinding out of `main`) releases it. `-w <pid>`
/// additionally ties it to this process, so a hard kill of the CLI does not
/// leave it behind.
#[derive(Debug)]
pub struct KeepAwake {
    child: Option<Child>,
}

impl KeepAwake {
    /// Starts `caffeinate`. If it cannot be spawned, returns an inert guard.
    pub fn start() -> Self {
        Self::start_with("caffeinate", &["-dims"])
    }

    pub(crate) fn start_with(program: &str, args: &[&str]) -> Self {
        let pid = std::process::id().to_string();
        let spawned = Command::new(program)
            .args(args)
            .args(["-w", pid.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                log::debug!("keep-awake started (pid {})", child.id());
                Self { child: Some(child) }
            }
            Err(e) => {
                log::warn!("could not start {program}, the system may sleep: {e}");
                Self { child: None }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for KeepAwake {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // The child may already have exited on its own.
            let _ = child.kill();
            let _ = child.wait();
            log::debug!("keep-awake stopped");
        }
    }
}
