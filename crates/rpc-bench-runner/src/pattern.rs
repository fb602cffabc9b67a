//! Pattern archive staging
//!
//! The generator scripts read their request targets from a fixed location, so
//! the pattern archive is copied there and unpacked before the campaign.

use crate::command::{run_command_streaming, CommandConfig};
use crate::error::StageError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Copy `archive` into `staging_dir` and unpack it there.
///
/// Returns the path of the staged copy.
pub async fn stage_pattern_archive(archive: &Path, staging_dir: &Path) -> Result<PathBuf, StageError> {
    let copy_err = |to: &Path, source: std::io::Error| StageError::Copy {
        from: archive.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    let file_name = archive.file_name().ok_or_else(|| {
        copy_err(
            staging_dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        )
    })?;
    let staged = staging_dir.join(file_name);

    // Copying a file onto itself truncates it
    let source = tokio::fs::canonicalize(archive)
        .await
        .map_err(|e| copy_err(&staged, e))?;
    let target = tokio::fs::canonicalize(staging_dir)
        .await
        .map_err(|e| copy_err(&staged, e))?
        .join(file_name);

    if source == target {
        debug!(archive = %staged.display(), "Pattern archive already staged");
    } else {
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| copy_err(&staged, e))?;
    }

    info!(archive = %staged.display(), "Extracting vegeta pattern");
    let args = vec!["xf".to_string(), file_name.to_string_lossy().into_owned()];
    let status =
        run_command_streaming("tar", &args, &CommandConfig::for_setup().in_dir(staging_dir)).await?;
    if !status.success() {
        return Err(StageError::Extract {
            archive: staged,
            status,
        });
    }

    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    /// Pack `targets.txt` in `dir` into `dir/p.tar`
    fn tar_targets(dir: &Path) {
        let status = Command::new("tar")
            .args(["cf", "p.tar", "targets.txt"])
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_stage_and_extract() {
        let source = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("targets.txt"), "POST http://localhost:8545\n").unwrap();
        tar_targets(source.path());

        let staged = stage_pattern_archive(&source.path().join("p.tar"), staging.path())
            .await
            .unwrap();

        assert_eq!(staged, staging.path().join("p.tar"));
        assert!(staging.path().join("targets.txt").exists());
    }

    #[tokio::test]
    async fn test_archive_already_in_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("targets.txt"), "POST http://localhost:8545\n").unwrap();
        tar_targets(dir.path());
        let archive = dir.path().join("p.tar");
        let size = std::fs::metadata(&archive).unwrap().len();
        assert!(size > 0);
        std::fs::remove_file(dir.path().join("targets.txt")).unwrap();

        // Same file reached through a non-canonical path
        let staging = dir.path().join(".");
        let staged = stage_pattern_archive(&archive, &staging).await.unwrap();

        assert_eq!(staged, staging.join("p.tar"));
        assert_eq!(std::fs::metadata(&archive).unwrap().len(), size);
        assert!(dir.path().join("targets.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_archive() {
        let staging = tempfile::tempdir().unwrap();
        let err = stage_pattern_archive(&staging.path().join("nope.tar"), staging.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Copy { .. }));
    }

    #[tokio::test]
    async fn test_not_an_archive() {
        let source = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let archive = source.path().join("p.tar");
        std::fs::write(&archive, "definitely not tar").unwrap();

        let err = stage_pattern_archive(&archive, staging.path()).await.unwrap_err();
        assert!(matches!(err, StageError::Extract { .. }));
    }
}
