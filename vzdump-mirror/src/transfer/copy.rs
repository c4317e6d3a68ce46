//! Copying one backup file from the source to the destination directory.

use super::progress::{format_bytes, format_duration, format_speed, ProgressTracker};
use super::throttle::{throttled_copy, TransferMode};
use crate::backup::BackupFile;
use crate::utils::errors::{MirrorError, Result};
use std::io;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// What [`copy_backup`] did with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Destination already held a file of the same name and size
    Skipped,

    /// Fresh copy, nothing was at the destination
    Copied { bytes: u64 },

    /// A same-named file of a different size was deleted and re-copied
    Replaced { bytes: u64 },
}

impl CopyOutcome {
    /// Bytes written to the destination
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Skipped => 0,
            Self::Copied { bytes } | Self::Replaced { bytes } => *bytes,
        }
    }
}

/// Copy `file` from `source_dir` to `dest_dir`.
///
/// A destination file with the same name and size is taken as already
/// copied and left alone. One with a different size is presumed to be a
/// partial copy and is deleted first. A failed copy leaves whatever was
/// written in place; the next run sees the size mismatch and starts over.
pub async fn copy_backup(
    source_dir: &Path,
    dest_dir: &Path,
    file: &BackupFile,
    mode: TransferMode,
) -> Result<CopyOutcome> {
    let wrap = |source: io::Error| MirrorError::Copy {
        file: file.file_name.clone(),
        source,
    };
    let source_path = source_dir.join(&file.file_name);
    let dest_path = dest_dir.join(&file.file_name);

    let replacing = match fs::metadata(&dest_path).await {
        Ok(existing) if existing.len() == file.file_size => {
            info!("File {} exists", file.file_name);
            return Ok(CopyOutcome::Skipped);
        }
        Ok(existing) => {
            warn!(
                "File {} exists but size differs ({} != {}), copying again",
                file.file_name,
                existing.len(),
                file.file_size
            );
            fs::remove_file(&dest_path).await.map_err(wrap)?;
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(wrap(e)),
    };

    info!("Copying {}", file.file_name);
    let mut progress = ProgressTracker::new(file.file_size);
    let bytes = transfer(&source_path, &dest_path, mode, &mut progress)
        .await
        .map_err(wrap)?;

    info!(
        "Copied {} ({}) in {} at {}",
        file.file_name,
        format_bytes(bytes),
        format_duration(progress.elapsed()),
        format_speed(progress.average_speed())
    );

    Ok(if replacing {
        CopyOutcome::Replaced { bytes }
    } else {
        CopyOutcome::Copied { bytes }
    })
}

/// Both handles live only for the duration of this call.
async fn transfer(
    source_path: &Path,
    dest_path: &Path,
    mode: TransferMode,
    progress: &mut ProgressTracker,
) -> io::Result<u64> {
    let mut reader = File::open(source_path).await?;
    let mut writer = File::create(dest_path).await?;

    match mode {
        TransferMode::Unthrottled => {
            let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
            writer.flush().await?;
            progress.advance(bytes);
            Ok(bytes)
        }
        TransferMode::Throttled { period } => {
            throttled_copy(&mut reader, &mut writer, period, progress).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::Catalog;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const NAME: &str = "vzdump-qemu-100-2019_03_28-23_59_59.vma";

    struct Dirs {
        source: TempDir,
        dest: TempDir,
    }

    impl Dirs {
        fn new() -> io::Result<Self> {
            Ok(Self {
                source: TempDir::new()?,
                dest: TempDir::new()?,
            })
        }

        fn source_backup(&self, name: &str, content: &[u8]) -> Result<BackupFile> {
            std::fs::write(self.source.path().join(name), content)?;
            let catalog = Catalog::scan_blocking(self.source.path())?;
            let file = catalog
                .iter()
                .flat_map(|(_, files)| files)
                .find(|f| f.file_name == name)
                .cloned();
            Ok(file.expect("backup should be cataloged"))
        }
    }

    #[tokio::test]
    async fn test_copy_new_file() -> Result<()> {
        let dirs = Dirs::new()?;
        let file = dirs.source_backup(NAME, b"backup payload")?;

        let outcome =
            copy_backup(dirs.source.path(), dirs.dest.path(), &file, TransferMode::Unthrottled)
                .await?;

        assert_eq!(outcome, CopyOutcome::Copied { bytes: 14 });
        assert_eq!(std::fs::read(dirs.dest.path().join(NAME))?, b"backup payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_same_size_is_skipped() -> Result<()> {
        let dirs = Dirs::new()?;
        let file = dirs.source_backup(NAME, b"backup payload")?;
        // same length, different bytes: size is the only equality check
        std::fs::write(dirs.dest.path().join(NAME), b"BACKUP PAYLOAD")?;

        let outcome =
            copy_backup(dirs.source.path(), dirs.dest.path(), &file, TransferMode::Unthrottled)
                .await?;

        assert_eq!(outcome, CopyOutcome::Skipped);
        assert_eq!(outcome.bytes(), 0);
        assert_eq!(std::fs::read(dirs.dest.path().join(NAME))?, b"BACKUP PAYLOAD");
        Ok(())
    }

    #[tokio::test]
    async fn test_size_mismatch_is_recopied() -> Result<()> {
        let dirs = Dirs::new()?;
        let file = dirs.source_backup(NAME, b"complete backup payload")?;
        std::fs::write(dirs.dest.path().join(NAME), b"partial")?;

        let outcome =
            copy_backup(dirs.source.path(), dirs.dest.path(), &file, TransferMode::Unthrottled)
                .await?;

        assert_eq!(outcome, CopyOutcome::Replaced { bytes: 23 });
        assert_eq!(
            std::fs::read(dirs.dest.path().join(NAME))?,
            b"complete backup payload"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupted_copy_is_replaced() -> Result<()> {
        let dirs = Dirs::new()?;
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 241) as u8).collect();
        let file = dirs.source_backup(NAME, &payload)?;
        // leftover of a copy that died after its first chunk
        std::fs::write(dirs.dest.path().join(NAME), &payload[..4096])?;

        let outcome =
            copy_backup(dirs.source.path(), dirs.dest.path(), &file, TransferMode::Unthrottled)
                .await?;

        assert_eq!(outcome, CopyOutcome::Replaced { bytes: 10_000 });
        assert_eq!(std::fs::read(dirs.dest.path().join(NAME))?, payload);
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupted_copy_is_replaced_when_throttled() -> Result<()> {
        let dirs = Dirs::new()?;
        let payload: Vec<u8> = (0..9_000u32).map(|i| (i % 233) as u8).collect();
        let file = dirs.source_backup(NAME, &payload)?;
        std::fs::write(dirs.dest.path().join(NAME), &payload[..8192])?;

        let mode = TransferMode::from_rate_limit(4000);
        let outcome = copy_backup(dirs.source.path(), dirs.dest.path(), &file, mode).await?;

        assert_eq!(outcome, CopyOutcome::Replaced { bytes: 9_000 });
        assert_eq!(std::fs::read(dirs.dest.path().join(NAME))?, payload);

        // the repaired copy is now recognized as complete
        let again = copy_backup(dirs.source.path(), dirs.dest.path(), &file, mode).await?;
        assert_eq!(again, CopyOutcome::Skipped);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_creating_destination() -> Result<()> {
        let dirs = Dirs::new()?;
        let file = dirs.source_backup(NAME, b"payload")?;
        std::fs::remove_file(dirs.source.path().join(NAME))?;

        let err =
            copy_backup(dirs.source.path(), dirs.dest.path(), &file, TransferMode::Unthrottled)
                .await
                .unwrap_err();

        assert!(matches!(err, MirrorError::Copy { ref file, .. } if file == NAME));
        assert!(!dirs.dest.path().join(NAME).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_destination_directory_fails() -> Result<()> {
        let dirs = Dirs::new()?;
        let file = dirs.source_backup(NAME, b"payload")?;
        let missing = dirs.dest.path().join("missing");

        let result =
            copy_backup(dirs.source.path(), &missing, &file, TransferMode::Unthrottled).await;

        assert!(matches!(result, Err(MirrorError::Copy { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_throttled_copy_is_complete_and_slower() -> Result<()> {
        let dirs = Dirs::new()?;
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
        let file = dirs.source_backup(NAME, &payload)?;

        // 100 KB/s ticks every 40ms, five chunks need at least 200ms
        let mode = TransferMode::from_rate_limit(100);
        let start = Instant::now();
        let outcome = copy_backup(dirs.source.path(), dirs.dest.path(), &file, mode).await?;

        assert_eq!(outcome, CopyOutcome::Copied { bytes: 20_000 });
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(std::fs::read(dirs.dest.path().join(NAME))?, payload);
        Ok(())
    }
}
