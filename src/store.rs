use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::AssayId;
use crate::error::KiraError;
use crate::extract::check_archive;
use crate::tripod::AssayClient;

/// Shared on-disk cache of raw assay archives.
#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KiraError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-tox21")).ok()
            })
            .ok_or_else(|| {
                KiraError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { cache_root })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn archive_path(&self, assay: &AssayId) -> Utf8PathBuf {
        self.cache_root
            .join("archives")
            .join(format!("{}.zip", assay.as_str()))
    }

    pub fn metadata_path(&self, assay: &AssayId) -> Utf8PathBuf {
        self.cache_root
            .join("metadata")
            .join(format!("{}.json", assay.as_str()))
    }

    pub fn ensure_cache_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn read_archive(&self, assay: &AssayId) -> Result<Option<Vec<u8>>, KiraError> {
        let path = self.archive_path(assay);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        fs::read(path.as_std_path())
            .map(Some)
            .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))
    }

    pub fn write_archive(
        &self,
        assay: &AssayId,
        content: &[u8],
        source: &str,
    ) -> Result<(), KiraError> {
        let path = self.archive_path(assay);
        Self::write_bytes_atomic(&path, content)?;
        let metadata = Metadata {
            source: source.to_string(),
            assay: assay.as_str().to_string(),
            bytes: content.len() as u64,
            downloaded_at: Utc::now().to_rfc3339(),
            tool: format!("kira-tox21/{}", env!("CARGO_PKG_VERSION")),
            resolved_path: path.to_string(),
        };
        Self::write_metadata(&self.metadata_path(assay), &metadata)
    }

    pub fn write_metadata(path: &Utf8Path, metadata: &Metadata) -> Result<(), KiraError> {
        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
        let parent = path
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("kira-tox21-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn list_cached(&self) -> Result<Vec<Metadata>, KiraError> {
        let metadata_root = self.cache_root.join("metadata");
        if !metadata_root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(metadata_root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let mut items = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| KiraError::Filesystem(err.to_string()))?
                .path();
            if !path.is_file() || path.extension().map(|ext| ext != "json").unwrap_or(true) {
                continue;
            }
            let content =
                fs::read_to_string(&path).map_err(|err| KiraError::Filesystem(err.to_string()))?;
            let metadata: Metadata = serde_json::from_str(&content)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            items.push(metadata);
        }
        items.sort_by(|a, b| a.assay.cmp(&b.assay));
        Ok(items)
    }

    pub fn clear(&self) -> Result<(), KiraError> {
        if self.cache_root.as_std_path().exists() {
            fs::remove_dir_all(self.cache_root.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub assay: String,
    pub bytes: u64,
    pub downloaded_at: String,
    pub tool: String,
    pub resolved_path: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Ignore cached archives; fresh downloads are still stored.
    pub refresh: bool,
}

const ARCHIVE_SOURCE: &str = "tripod";

/// Serves archives from the [`Store`] and falls back to the wrapped client.
/// Only archives that hold an aggregated results member are cached or served.
pub struct CachedClient<C: AssayClient> {
    store: Store,
    inner: C,
    options: CacheOptions,
}

impl<C: AssayClient> CachedClient<C> {
    pub fn new(store: Store, inner: C, options: CacheOptions) -> Self {
        Self {
            store,
            inner,
            options,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl<C: AssayClient> AssayClient for CachedClient<C> {
    fn fetch(&self, assay: &AssayId) -> Result<Vec<u8>, KiraError> {
        if !self.options.refresh {
            if let Some(bytes) = self.store.read_archive(assay)? {
                match check_archive(&bytes) {
                    Ok(()) => {
                        debug!(assay = assay.as_str(), "using cached archive");
                        return Ok(bytes);
                    }
                    Err(err) => {
                        warn!(
                            assay = assay.as_str(),
                            error = %err,
                            "discarding unreadable cached archive"
                        );
                    }
                }
            }
        }
        let bytes = self.inner.fetch(assay)?;
        check_archive(&bytes)?;
        if let Err(err) = self.store.write_archive(assay, &bytes, ARCHIVE_SOURCE) {
            warn!(assay = assay.as_str(), error = %err, "failed to cache archive");
        }
        Ok(bytes)
    }
}
