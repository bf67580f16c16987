//! Key-value blob storage for the two training artifacts.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::estimator::Regressor;
use crate::metadata::PreprocessingMetadata;

pub const MODEL_KEY: &str = "model.json";
pub const METADATA_KEY: &str = "preprocessing.json";

pub trait ArtifactStore {
    /// Fails with [`Error::ArtifactNotFound`] when nothing is stored under `key`.
    fn load(&self, key: &str) -> Result<Vec<u8>>;

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()>;

    fn contains(&self, key: &str) -> bool;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ArtifactStore for DirStore {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path(key);
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ArtifactNotFound(path.display().to_string()),
            _ => Error::Io(e),
        })
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path(key);
        std::fs::write(&path, bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "saved artifact");
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.path(key).is_file()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl ArtifactStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ArtifactNotFound(key.to_string()))
    }

    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }
}

pub fn save_artifacts<R: Regressor>(
    store: &mut impl ArtifactStore,
    model: &R,
    metadata: &PreprocessingMetadata,
) -> Result<()> {
    store.save(MODEL_KEY, &model.to_bytes()?)?;
    store.save(METADATA_KEY, &metadata.to_json()?)
}

/// Loads both artifacts; the metadata is validated on the way in.
pub fn load_artifacts<R: Regressor>(
    store: &impl ArtifactStore,
) -> Result<(R, PreprocessingMetadata)> {
    let metadata = PreprocessingMetadata::from_json(&store.load(METADATA_KEY)?)?;
    let model = R::from_bytes(&store.load(MODEL_KEY)?)?;
    Ok((model, metadata))
}
