//! Retention math over one machine's newest-first backups.

use super::catalog::BackupFile;

/// Backups beyond the `keep` most recent, oldest last.
///
/// `group` must be ordered newest first, as [`Catalog`](super::catalog::Catalog)
/// returns it. `keep` is expected to be at least 1.
pub fn overflow(group: &[BackupFile], keep: usize) -> &[BackupFile] {
    group.get(keep..).unwrap_or_default()
}

/// The `keep` most recent backups (all of them if there are fewer).
pub fn retained(group: &[BackupFile], keep: usize) -> &[BackupFile] {
    &group[..keep.min(group.len())]
}
