use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use log::*;

pub use error::Error;

pub mod error;
pub mod util;


pub const DEFAULT_MANIFEST_URL: &str = "https://dl.fusion.getdbt.com/cli/manifest.json";
pub const DEFAULT_OUTPUT_PATH: &str = "share/fusion-manifest.json";

#[derive(Debug)]
pub enum ItemProgress {
    Downloading(u64, u64), // bytes received, total bytes (0 if unknown)
    Completed(u64),        // total bytes
    Failed,
}
pub type ProgressCallback = fn(&str, ItemProgress); // item name, progress

/// The dbt Fusion CLI manifest: every published version mapped to its
/// per-platform download descriptors.
///
/// Descriptors are kept as raw JSON and never inspected. Top-level keys other
/// than `versions` are carried through untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Manifest {
    #[serde(default)]
    versions: BTreeMap<String, Value>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}
impl Manifest {
    /// Parses a manifest from raw JSON. `origin` only appears in error messages.
    pub fn from_slice(json: &[u8], origin: &str) -> Result<Self, Error> {
        serde_json::from_slice(json).map_err(|source| Error::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Loads the manifest from a URL or, for anything that isn't `http(s)://`, a local file.
    pub async fn fetch(source: &str, callback: Option<ProgressCallback>) -> Result<Self, Error> {
        if util::is_url(source) {
            Self::from_url(source, callback).await
        } else {
            Self::from_file(util::uri_to_file_path(source))
        }
    }

    /// Downloads the manifest. Only a 200 response is accepted.
    pub async fn from_url(url: &str, callback: Option<ProgressCallback>) -> Result<Self, Error> {
        info!("Fetching manifest from {}", url);
        let body = util::download_to_buffer(url, callback).await?;
        let manifest = Self::from_slice(&body, url)?;
        info!("Fetched {} version(s)", manifest.version_count());
        Ok(manifest)
    }

    /// Loads the manifest from a JSON file, e.g. a previously cached copy.
    pub fn from_file(path: &str) -> Result<Self, Error> {
        info!("Reading manifest from {}", path);
        let json = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::from_slice(&json, path)
    }

    /// Restricts the manifest to a single version. `None` keeps everything.
    pub fn filter(self, version: Option<&str>) -> Result<Self, Error> {
        let Some(version) = version else {
            return Ok(self);
        };

        let mut versions = self.versions;
        let Some(descriptor) = versions.remove(version) else {
            return Err(Error::VersionNotFound(version.to_string()));
        };
        debug!("Keeping version {}, dropping {} other(s)", version, versions.len());

        Ok(Self {
            versions: BTreeMap::from([(version.to_string(), descriptor)]),
            extra: BTreeMap::new(),
        })
    }

    /// Writes the manifest as pretty-printed JSON with sorted keys, creating
    /// parent directories as needed and replacing any existing file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))?;
        info!("Wrote {}", path.display());
        Ok(())
    }

    /// Serializes the manifest with every object's keys in sorted order and
    /// non-ASCII text escaped.
    pub fn to_json(&self) -> Result<String, Error> {
        // Going through Value flattens `extra` into one sorted map alongside `versions`.
        let value = serde_json::to_value(self).map_err(Error::Serialize)?;
        let mut json = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut json,
            util::AsciiPrettyFormatter::default(),
        );
        value.serialize(&mut serializer).map_err(Error::Serialize)?;
        String::from_utf8(json).map_err(|e| Error::Serialize(serde::ser::Error::custom(e)))
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn get_version(&self, version: &str) -> Option<&Value> {
        self.versions.get(version)
    }

    /// Version keys in lexicographic order.
    pub fn version_keys(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }
}
