//! Mirror orchestration: copy the newest backups of every machine and
//! prune the destination after each copy.
//!
//! The destination is re-scanned after every copy instead of being tracked
//! in memory, so what gets pruned always reflects the directory as it is.
//! Copy and prune are interleaved to keep at most `keep + 1` backups of a
//! machine at the destination at any time.

use crate::backup::{retention, BackupFile, Catalog};
use crate::transfer::{copy_backup, CopyOutcome, TransferMode};
use crate::utils::errors::{MirrorError, Result};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{info, warn};

/// Validated parameters of one mirror run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub source: PathBuf,
    pub destination: PathBuf,

    /// Backups to retain per machine
    pub keep: NonZeroUsize,

    pub mode: TransferMode,
}

/// Summary of a finished mirror run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Machines found in the source
    pub machines: usize,
    pub copied_files: usize,
    pub replaced_files: usize,
    pub skipped_files: usize,
    pub deleted_files: usize,
    pub transferred_bytes: u64,
    pub duration_secs: u64,
}

impl SyncReport {
    fn record(&mut self, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Skipped => self.skipped_files += 1,
            CopyOutcome::Copied { .. } => self.copied_files += 1,
            CopyOutcome::Replaced { .. } => self.replaced_files += 1,
        }
        self.transferred_bytes += outcome.bytes();
    }
}

/// Mirror the newest `keep` backups of every source machine.
///
/// Per machine, newest first: copy one backup, re-scan the destination,
/// delete that machine's backups beyond `keep`, then move on to the next.
/// The first failed scan, copy or delete aborts the whole run. Running it
/// again with an unchanged source copies nothing.
pub async fn synchronize(options: &SyncOptions) -> Result<SyncReport> {
    let start_time = Instant::now();
    let keep = options.keep.get();

    let source_catalog = Catalog::scan(&options.source).await?;
    info!(
        "Found {} backups of {} machines in {}",
        source_catalog.backup_count(),
        source_catalog.machine_count(),
        options.source.display()
    );
    if source_catalog.is_empty() {
        warn!("No backups recognized in {}", options.source.display());
    }

    let mut report = SyncReport::default();

    for (machine_id, backups) in source_catalog.iter() {
        info!("Machine {}: {} backups in source", machine_id, backups.len());
        report.machines += 1;

        for file in retention::retained(backups, keep) {
            let outcome =
                copy_backup(&options.source, &options.destination, file, options.mode).await?;
            report.record(outcome);

            report.deleted_files += prune_machine(&options.destination, machine_id, keep).await?;
        }
    }

    report.duration_secs = start_time.elapsed().as_secs();
    Ok(report)
}

/// Delete the backups of `machine_id` in `dir` beyond the `keep` newest.
/// Returns how many were deleted.
pub async fn prune_machine(dir: &Path, machine_id: &str, keep: usize) -> Result<usize> {
    let catalog = Catalog::scan(dir).await?;
    let overflow = retention::overflow(catalog.machine(machine_id), keep);

    for file in overflow {
        delete_backup(dir, file).await?;
    }

    Ok(overflow.len())
}

async fn delete_backup(dir: &Path, file: &BackupFile) -> Result<()> {
    info!("Removing old backup {}", file.file_name);
    fs::remove_file(dir.join(&file.file_name))
        .await
        .map_err(|source| MirrorError::Delete {
            file: file.file_name.clone(),
            source,
        })
}
