//! Catalog of model artifacts.
//!
//! A complete installation needs four files: the encoder itself, the task
//! query embedding table, the subword vocabulary, and the CMVN statistics.

/// One downloadable artifact.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactInfo {
    /// Catalog key.
    pub name: &'static str,
    /// Filename under the models directory.
    pub filename: &'static str,
    /// Download URL.
    pub url: &'static str,
    /// Expected SHA-256 (hex). Empty means unverified.
    pub sha256: &'static str,
    /// Approximate size for progress display.
    pub size_mb: u32,
}

/// All artifacts of the default model set.
pub const ARTIFACTS: &[ArtifactInfo] = &[
    ArtifactInfo {
        name: "encoder",
        filename: "sense-voice-encoder.rknn",
        url: "https://huggingface.co/happyme531/SenseVoiceSmall-RKNN2/resolve/main/sense-voice-encoder.rknn",
        sha256: "",
        size_mb: 485,
    },
    ArtifactInfo {
        name: "embedding",
        filename: "embedding.npy",
        url: "https://huggingface.co/happyme531/SenseVoiceSmall-RKNN2/resolve/main/embedding.npy",
        sha256: "",
        size_mb: 1,
    },
    ArtifactInfo {
        name: "vocab",
        filename: "vocab.txt",
        url: "https://huggingface.co/happyme531/SenseVoiceSmall-RKNN2/resolve/main/vocab.txt",
        sha256: "",
        size_mb: 3,
    },
    ArtifactInfo {
        name: "cmvn",
        filename: "am.mvn",
        url: "https://huggingface.co/happyme531/SenseVoiceSmall-RKNN2/resolve/main/am.mvn",
        sha256: "",
        size_mb: 1,
    },
];

/// Look up an artifact by catalog key.
pub fn get_artifact(name: &str) -> Option<&'static ArtifactInfo> {
    ARTIFACTS.iter().find(|a| a.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_contains_required_artifacts() {
        for name in ["encoder", "embedding", "vocab", "cmvn"] {
            assert!(get_artifact(name).is_some(), "missing artifact {}", name);
        }
    }

    #[test]
    fn test_unknown_artifact_is_none() {
        assert!(get_artifact("decoder").is_none());
    }

    #[test]
    fn test_filenames_are_unique() {
        for (i, a) in ARTIFACTS.iter().enumerate() {
            for b in &ARTIFACTS[i + 1..] {
                assert_ne!(a.filename, b.filename);
            }
        }
    }
}
