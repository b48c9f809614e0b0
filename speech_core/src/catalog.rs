use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown model '{0}' and no default reference audio is available")]
    UnknownModel(String),

    #[error("reference audio file not found: {0}")]
    MissingFile(PathBuf),
}

/// One voice map entry: a bare path string or an object with a `path` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MapEntry {
    Path(PathBuf),
    Detailed { path: PathBuf },
}

impl MapEntry {
    fn into_path(self) -> PathBuf {
        match self {
            MapEntry::Path(p) => p,
            MapEntry::Detailed { path } => path,
        }
    }
}

/// Maps model names to the reference audio clip the backend conditions on.
///
/// Requests for an unknown model fall back to the configured default clip
/// when one exists on disk.
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    map: HashMap<String, PathBuf>,
    default_prompt: Option<PathBuf>,
}

impl VoiceCatalog {
    /// Create from a prebuilt map.
    pub fn new(map: HashMap<String, PathBuf>, default_prompt: Option<PathBuf>) -> Self {
        Self {
            map,
            default_prompt,
        }
    }

    /// Load from a JSON map file.
    pub fn from_mapfile<P: AsRef<Path>>(
        p: P,
        default_prompt: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let raw: HashMap<String, MapEntry> = serde_json::from_str(&text)
            .with_context(|| "voice map is not a valid JSON object of model entries")?;

        let map = raw
            .into_iter()
            .map(|(model, entry)| (model, entry.into_path()))
            .collect();

        Ok(Self {
            map,
            default_prompt,
        })
    }

    /// List known model names.
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.map.keys().cloned().collect();
        models.sort();
        models
    }

    /// Resolve the reference audio for a model.
    ///
    /// A known model whose file is gone is an error distinct from an unknown
    /// model; the latter falls back to the default clip when it exists.
    pub fn resolve(&self, model: &str) -> Result<PathBuf, CatalogError> {
        if let Some(path) = self.map.get(model) {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(CatalogError::MissingFile(path.clone()));
        }

        match &self.default_prompt {
            Some(path) if path.exists() => Ok(path.clone()),
            _ => Err(CatalogError::UnknownModel(model.to_string())),
        }
    }
}
