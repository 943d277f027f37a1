//! Model artifact download and installation.
//!
//! Downloads the artifact set into the user's cache directory, verifying
//! SHA-256 checksums where the catalog provides one.

use crate::error::{LivesenseError, Result};
use crate::models::catalog::{ARTIFACTS, ArtifactInfo};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Directory where artifacts are stored (`~/.cache/livesense/models/`).
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("livesense")
        .join("models")
}

/// Full path for an artifact file.
pub fn artifact_path(info: &ArtifactInfo) -> PathBuf {
    models_dir().join(info.filename)
}

/// Whether an artifact is already installed.
pub fn is_installed(info: &ArtifactInfo) -> bool {
    artifact_path(info).exists()
}

/// Download every missing artifact. Returns the models directory.
pub async fn download_all(progress: bool) -> Result<PathBuf> {
    let dir = models_dir();
    fs::create_dir_all(&dir)?;

    for info in ARTIFACTS {
        if is_installed(info) {
            eprintln!("{} already installed", info.name);
            continue;
        }
        download_artifact(info, progress).await?;
    }
    Ok(dir)
}

/// Download one artifact with optional progress display and checksum
/// verification.
pub async fn download_artifact(info: &ArtifactInfo, progress: bool) -> Result<PathBuf> {
    let output_path = artifact_path(info);
    fs::create_dir_all(output_path.parent().expect("models dir has a parent"))?;

    if progress {
        eprintln!("Downloading {} (~{} MB)...", info.name, info.size_mb);
    }

    let client = reqwest::Client::new();
    let response = client
        .get(info.url)
        .send()
        .await
        .map_err(|e| LivesenseError::Other(format!("Failed to start download: {}", e)))?;

    if !response.status().is_success() {
        return Err(LivesenseError::Other(format!(
            "Download of {} failed with status {}",
            info.name,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let bar = if progress {
        let bar = ProgressBar::new(total_size);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .expect("static template is valid")
                .progress_chars("#>-"),
        );
        Some(bar)
    } else {
        None
    };

    // Stream to a temp file, verify, then move into place.
    let temp_path = output_path.with_extension("partial");
    let mut file = fs::File::create(&temp_path)?;
    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    while let Some(item) = stream.next().await {
        let bytes =
            item.map_err(|e| LivesenseError::Other(format!("Download stream error: {}", e)))?;
        hasher.update(&bytes);
        file.write_all(&bytes)?;
        if let Some(bar) = &bar {
            bar.inc(bytes.len() as u64);
        }
    }
    file.flush()?;
    drop(file);

    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    if !info.sha256.is_empty() {
        let calculated = format!("{:x}", hasher.finalize());
        if calculated != info.sha256 {
            let _ = fs::remove_file(&temp_path);
            return Err(LivesenseError::Other(format!(
                "Checksum mismatch for {}: expected {}, got {}",
                info.name, info.sha256, calculated
            )));
        }
    }

    fs::rename(&temp_path, &output_path)?;
    if progress {
        eprintln!("Installed {} at {}", info.name, output_path.display());
    }
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::get_artifact;

    #[test]
    fn test_models_dir_is_under_cache() {
        let dir = models_dir();
        let path = dir.to_string_lossy();
        assert!(path.contains("livesense"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_artifact_path_uses_filename() {
        let info = get_artifact("embedding").unwrap();
        let path = artifact_path(info);
        assert!(path.ends_with("embedding.npy"));
    }

    #[test]
    fn test_missing_artifact_not_installed() {
        let info = ArtifactInfo {
            name: "ghost",
            filename: "definitely-not-present.bin",
            url: "https://example.invalid/x",
            sha256: "",
            size_mb: 1,
        };
        assert!(!is_installed(&info));
    }
}
