//! The two retry shapes used by a run: primary-then-fallback, and a bounded retry loop.
use std::time::Duration;

/// Runs `primary`; if it fails, runs `fallback` exactly once with the primary error.
pub fn attempt_with_fallback<T, E>(
    primary: impl FnOnce() -> Result<T, E>,
    fallback: impl FnOnce(E) -> Result<T, E>,
) -> Result<T, E> {
    match primary() {
        Ok(value) => Ok(value),
        Err(e) => fallback(e),
    }
}

/// Runs `op` up to `attempts` times, sleeping `pause` between failures.
///
/// `op` receives the 1-based attempt number. Returns the last error if every
/// attempt fails. `attempts` of zero is treated as one.
pub fn retry_bounded<T, E>(
    attempts: u32,
    pause: Duration,
    mut op: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(_) => {
                attempt += 1;
                if !pause.is_zero() {
                    std::thread::sleep(pause);
                }
            }
        }
    }
}
