use nix::sys::statvfs::statvfs;
use std::collections::HashSet;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use walkdir::WalkDir;

/// `st_blocks` is always counted in 512-byte units, whatever the filesystem's block size.
const STAT_BLOCK_SIZE: u64 = 512;

/// Computes the on-disk allocation of a directory tree, like `du -s`.
///
/// Apparent file lengths underestimate what a filesystem image needs, so this
/// sums allocated blocks instead. Symlinks are not followed and hard-linked
/// files are counted once.
pub fn allocated_size(root: &Path) -> io::Result<u64> {
    let mut seen = HashSet::new();
    let mut total: u64 = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        let metadata = entry.metadata()?;

        if metadata.nlink() > 1
            && !metadata.is_dir()
            && !seen.insert((metadata.dev(), metadata.ino()))
        {
            continue;
        }

        total = total.saturating_add(metadata.blocks().saturating_mul(STAT_BLOCK_SIZE));
    }

    Ok(total)
}

/// Returns the bytes currently available to unprivileged users on the volume
/// holding `path`. Queried fresh on every call.
pub fn available_space(path: &Path) -> io::Result<u64> {
    let stat = statvfs(path)?;
    #[allow(clippy::unnecessary_cast)]
    let available = (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64);
    Ok(available)
}
