use std::path::PathBuf;

/// Error type for fetching, filtering and writing manifests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected status code {status} fetching {url}")]
    Fetch { status: u16, url: String },

    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("Failed to parse manifest from {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("Version {0} not present in manifest")]
    VersionNotFound(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
