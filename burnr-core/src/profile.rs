//! Capacity parameters for the supported target media.
use std::fmt;

/// The class of medium an image is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediumKind {
    Dvd,
    #[default]
    Bdxl,
}

impl fmt::Display for MediumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediumKind::Dvd => f.write_str("DVD"),
            MediumKind::Bdxl => f.write_str("BDXL"),
        }
    }
}

/// Nominal capacity and safety margin of a medium.
///
/// The margin covers filesystem overhead and write-verification headroom;
/// the usable limit is `capacity_bytes - margin_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediumProfile {
    pub kind: MediumKind,
    pub capacity_bytes: u64,
    pub margin_bytes: u64,
}

impl MediumProfile {
    /// Single-layer DVD±R.
    pub const DVD: MediumProfile = MediumProfile {
        kind: MediumKind::Dvd,
        capacity_bytes: 4_700_000_000,
        margin_bytes: 90_000_000,
    };

    /// Triple-layer BD-R XL.
    pub const BDXL: MediumProfile = MediumProfile {
        kind: MediumKind::Bdxl,
        capacity_bytes: 100_103_356_416,
        margin_bytes: 300_000_000,
    };

    pub fn for_kind(kind: MediumKind) -> Self {
        match kind {
            MediumKind::Dvd => Self::DVD,
            MediumKind::Bdxl => Self::BDXL,
        }
    }

    pub fn limit_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.margin_bytes)
    }
}

impl fmt::Display for MediumProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, {} bytes margin)",
            self.kind, self.capacity_bytes, self.margin_bytes
        )
    }
}
