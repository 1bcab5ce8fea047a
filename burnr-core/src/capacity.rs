//! Decides whether a source directory fits a medium and the stage volume.
use crate::error::{Error, Result};
use crate::profile::MediumProfile;

/// Checks a source size against a medium profile and the stage's free space.
///
/// Fails with [`Error::SourceTooLarge`] when `source_bytes` reaches the
/// profile's limit, and with [`Error::InsufficientStageSpace`] when the stage
/// cannot hold the source plus the profile's margin. The medium check runs
/// first.
pub fn check_capacity(
    profile: &MediumProfile,
    source_bytes: u64,
    stage_free_bytes: u64,
) -> Result<()> {
    let limit_bytes = profile.limit_bytes();
    if source_bytes >= limit_bytes {
        return Err(Error::SourceTooLarge {
            medium: profile.kind.to_string(),
            source_bytes,
            limit_bytes,
        });
    }

    let needed_bytes = source_bytes.saturating_add(profile.margin_bytes);
    if stage_free_bytes <= needed_bytes {
        return Err(Error::InsufficientStageSpace {
            free_bytes: stage_free_bytes,
            needed_bytes,
        });
    }

    log::debug!(
        "capacity ok: source {} < limit {}, stage free {} > needed {}",
        source_bytes,
        limit_bytes,
        stage_free_bytes,
        needed_bytes
    );
    Ok(())
}
