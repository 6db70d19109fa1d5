//! Filesystem artifact registry with an in-memory cache.
//!
//! Artifacts are bincode files named after the normalized segment key, one
//! per segment, under a single registry directory. Lookups go through a
//! read-through cache; a loaded artifact stays resident for the life of the
//! registry.

use crate::error::{CosechaError, Result};
use crate::training::ModelArtifact;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Turns a segment key into a filesystem-safe file stem.
///
/// Path separators and whitespace become underscores, so "Rabi/Winter
/// Crop" and "Rabi Winter_Crop" collide deliberately: keys that differ
/// only in separators name the same artifact.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Persistent store of per-segment model artifacts.
///
/// Reads go through an `RwLock`-guarded cache so concurrent serving
/// threads share loaded models.
#[derive(Debug)]
pub struct ArtifactRegistry {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<ModelArtifact>>>,
}

impl ArtifactRegistry {
    /// Opens a registry rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the registry directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the artifact path for a segment key.
    #[must_use]
    pub fn path_for(&self, segment: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", normalize_key(segment)))
    }

    /// Persists an artifact and returns where it was written.
    ///
    /// Overwrites any previous artifact for the same key and refreshes the
    /// cache entry.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.path_for(&artifact.segment);
        let bytes = bincode::serialize(artifact)
            .map_err(|e| CosechaError::Serialization(format!("Serialization failed: {e}")))?;
        fs::write(&path, bytes)?;

        let key = normalize_key(&artifact.segment);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, Arc::new(artifact.clone()));
        }
        log::debug!("Saved artifact for '{}' to {}", artifact.segment, path.display());
        Ok(path)
    }

    /// Fetches an artifact by segment key, reading from disk on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns [`CosechaError::ArtifactNotFound`] if no artifact exists for
    /// the key, or a serialization error if the file is unreadable.
    pub fn get(&self, segment: &str) -> Result<Arc<ModelArtifact>> {
        let key = normalize_key(segment);

        if let Ok(cache) = self.cache.read() {
            if let Some(artifact) = cache.get(&key) {
                return Ok(Arc::clone(artifact));
            }
        }

        let path = self.dir.join(format!("{key}.bin"));
        if !path.exists() {
            return Err(CosechaError::ArtifactNotFound {
                segment: segment.to_string(),
            });
        }
        let bytes = fs::read(&path)?;
        let artifact: ModelArtifact = bincode::deserialize(&bytes)
            .map_err(|e| CosechaError::Serialization(format!("Deserialization failed: {e}")))?;
        let artifact = Arc::new(artifact);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, Arc::clone(&artifact));
        }
        Ok(artifact)
    }

    /// Lists the normalized keys of every artifact on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry directory cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "bin") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
