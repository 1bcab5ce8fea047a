//! The seam between decision logic and the external disc tools.
//!
//! Every component that shells out (`hdiutil`, `drutil`) does so through the
//! [`CommandRunner`] trait. [`SystemRunner`] is the real implementation;
//! tests substitute a scripted runner that records each invocation.
use std::io::{self, BufRead, BufReader};
use std::process::{Command, Stdio};

/// Captured result of a finished external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// The most useful diagnostic text: stderr, or stdout if stderr is blank.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs to completion.
pub trait CommandRunner {
    /// Runs `program` with `args` and captures its output.
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;

    /// Runs `program`, handing each stdout line to `on_line` as it arrives.
    ///
    /// The returned [`CommandOutput`] carries stderr but an empty stdout.
    fn run_streaming(
        &self,
        program: &str,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> io::Result<CommandOutput>;
}

/// Renders a command line for logs and diagnostics.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        log::debug!("exec: {}", command_line(program, args));
        let output = Command::new(program).args(args).stdin(Stdio::null()).output()?;

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log::debug!("exit: {:?} ({} bytes stdout)", result.code, result.stdout.len());
        Ok(result)
    }

    fn run_streaming(
        &self,
        program: &str,
        args: &[String],
        on_line: &mut dyn FnMut(&str),
    ) -> io::Result<CommandOutput> {
        log::debug!("exec (streaming): {}", command_line(program, args));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr must be drained concurrently or a full pipe stalls the child.
        let stderr = child.stderr.take();
        let stderr_thread = std::thread::spawn(move || {
            let mut text = String::new();
            if let Some(stderr) = stderr {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    text.push_str(&line);
                    text.push('\n');
                }
            }
            text
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                on_line(&line);
            }
        }

        let status = child.wait()?;
        let stderr = stderr_thread.join().unwrap_or_default();
        log::debug!("exit: {:?}", status.code());

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::new(),
            stderr,
        })
    }
}
