//! Per-machine catalog of the backups found in one directory.
//!
//! The catalog is rebuilt from the directory listing on every scan and is
//! never updated in place.

use super::name::parse_name;
use crate::utils::errors::{MirrorError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// One backup archive on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    /// Exact on-disk name, the key for copy, delete and existence checks
    pub file_name: String,

    /// Size in bytes at scan time
    pub file_size: u64,

    /// Snapshot time taken from the name
    pub snapshot_time: DateTime<Utc>,
}

impl BackupFile {
    /// Build from a directory entry, paired with its machine identifier.
    /// `None` for anything that is not a recognized backup file.
    fn from_entry(entry: &DirEntry) -> std::io::Result<Option<(String, Self)>> {
        let Some(file_name) = entry.file_name().to_str() else {
            return Ok(None);
        };
        let Some(name) = parse_name(file_name) else {
            return Ok(None);
        };

        // Symlinks are followed; links to directories and broken links are skipped
        let metadata = if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(resolved) => resolved,
                Err(_) => return Ok(None),
            }
        } else {
            entry.metadata()?
        };
        if metadata.is_dir() {
            return Ok(None);
        }

        let file = Self {
            file_name: file_name.to_string(),
            file_size: metadata.len(),
            snapshot_time: name.snapshot_time,
        };
        Ok(Some((name.machine_id, file)))
    }
}

/// Backups of one directory grouped by machine identifier, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    groups: BTreeMap<String, Vec<BackupFile>>,
}

impl Catalog {
    /// Scan `dir` (non-recursively) on the blocking pool.
    pub async fn scan(dir: &Path) -> Result<Self> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::scan_blocking(&dir)).await?
    }

    /// Scan `dir` (non-recursively) on the current thread.
    ///
    /// Fails only when the directory cannot be listed. A directory with no
    /// recognizable backups yields an empty catalog.
    pub fn scan_blocking(dir: &Path) -> Result<Self> {
        let wrap = |source: std::io::Error| MirrorError::Catalog {
            path: dir.to_path_buf(),
            source,
        };

        let mut found = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| wrap(e.into()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            if let Some(pair) = BackupFile::from_entry(&entry).map_err(wrap)? {
                found.push(pair);
            }
        }

        let catalog = Self::group(found);
        debug!(
            "Scanned {}: {} machines, {} backups",
            dir.display(),
            catalog.machine_count(),
            catalog.backup_count()
        );
        Ok(catalog)
    }

    /// Group already-described files by machine.
    ///
    /// Names that do not parse are dropped. Each group is ordered by
    /// snapshot time descending, ties by file name ascending.
    pub fn from_files(files: impl IntoIterator<Item = BackupFile>) -> Self {
        Self::group(files.into_iter().filter_map(|file| {
            parse_name(&file.file_name).map(|name| (name.machine_id, file))
        }))
    }

    fn group(pairs: impl IntoIterator<Item = (String, BackupFile)>) -> Self {
        let mut groups: BTreeMap<String, Vec<BackupFile>> = BTreeMap::new();

        for (machine_id, file) in pairs {
            groups.entry(machine_id).or_default().push(file);
        }

        for group in groups.values_mut() {
            group.sort_by(|a, b| {
                b.snapshot_time
                    .cmp(&a.snapshot_time)
                    .then_with(|| a.file_name.cmp(&b.file_name))
            });
        }

        Self { groups }
    }

    /// Backups of one machine, newest first (empty if unknown)
    pub fn machine(&self, machine_id: &str) -> &[BackupFile] {
        self.groups
            .get(machine_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterate machines in ascending identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[BackupFile])> {
        self.groups
            .iter()
            .map(|(id, files)| (id.as_str(), files.as_slice()))
    }

    pub fn machine_count(&self) -> usize {
        self.groups.len()
    }

    pub fn backup_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
