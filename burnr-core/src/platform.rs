//! Provides platform-specific filesystem introspection.
//!
//! Capacity decisions need two numbers the standard library does not expose
//! portably: the on-disk allocation of a directory tree and the free space
//! of the volume holding a path. Each submodule exposes the same functions
//! so the rest of the library can call them without caring about the OS.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::*;

#[cfg(not(unix))]
mod unsupported {
    use std::io;
    use std::path::Path;

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "filesystem introspection is only implemented for unix targets",
        )
    }

    pub fn allocated_size(_root: &Path) -> io::Result<u64> {
        Err(unsupported())
    }

    pub fn available_space(_path: &Path) -> io::Result<u64> {
        Err(unsupported())
    }
}
#[cfg(not(unix))]
pub use self::unsupported::*;
