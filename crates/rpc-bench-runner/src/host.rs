//! Host and input metadata for the report header

use crate::command::first_output_line;
use crate::config::CampaignConfig;
use crate::report::ReportHeader;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tracing::{debug, warn};

/// Written when a value cannot be determined
pub const UNKNOWN: &str = "unknown";

const TOOLCHAIN_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// CPU brand string of the first core
pub fn machine_model() -> String {
    let system =
        System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::everything()));
    system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|brand| !brand.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `sha256:<hex>` of the file at `path`
pub fn pattern_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    let digest = hasher.finalize();
    Ok(format!("sha256:{digest:x}"))
}

/// First line of `gcc --version`
pub async fn toolchain_version() -> String {
    first_output_line("gcc", &["--version"], TOOLCHAIN_PROBE_TIMEOUT)
        .await
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Gather everything the report header needs
pub async fn collect_header(config: &CampaignConfig) -> ReportHeader {
    let checksum = match pattern_checksum(&config.pattern_source) {
        Ok(checksum) => checksum,
        Err(e) => {
            warn!(
                path = %config.pattern_source.display(),
                error = %e,
                "Could not checksum pattern source"
            );
            UNKNOWN.to_string()
        }
    };

    let header = ReportHeader {
        machine_model: machine_model(),
        affinity: config.affinity.clone(),
        pattern_source: config.pattern_source.display().to_string(),
        checksum,
        toolchain: toolchain_version().await,
    };
    debug!(?header, "Collected report header");
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.tar");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            pattern_checksum(&path).unwrap(),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_pattern_checksum_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pattern_checksum(&dir.path().join("absent.tar")).is_err());
    }

    #[test]
    fn test_machine_model_not_empty() {
        assert!(!machine_model().is_empty());
    }

    #[tokio::test]
    async fn test_toolchain_version_single_line() {
        let version = toolchain_version().await;
        assert!(!version.is_empty());
        assert!(!version.contains('\n'));
    }
}
