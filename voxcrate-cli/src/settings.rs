//! Preprocessing settings file
//!
//! Every field is optional in the JSON document; missing ones keep their
//! defaults, and command-line flags override whatever the file sets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use voxcrate_algorithms::VoxelizerConfig;
use voxcrate_core::LabelDictionary;
use voxcrate_dataset::BuildConfig;
use voxcrate_io::RecordLayout;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    pub build: BuildConfig,
    pub voxelizer: VoxelizerConfig,
    pub layout: RecordLayout,
    /// JSON label dictionary; the Sydney Urban Objects table when unset
    pub labels: Option<PathBuf>,
}

impl PreprocessSettings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn label_dictionary(&self) -> Result<LabelDictionary> {
        load_labels(self.labels.as_deref())
    }
}

/// Load a label dictionary file, or the built-in table
pub fn load_labels(path: Option<&Path>) -> Result<LabelDictionary> {
    match path {
        Some(path) => LabelDictionary::from_json_file(path)
            .with_context(|| format!("failed to load labels from {}", path.display())),
        None => Ok(LabelDictionary::sydney_urban_objects()),
    }
}
