//! Fold manifests and the on-disk dataset layout
//!
//! A dataset directory holds the raw point files under `objects/` and one
//! manifest per cross-validation fold under `folds/fold<N>.txt`. A manifest
//! lists one point file name per line.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use voxcrate_core::{Error, Result};

/// Paths inside a dataset directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/folds/fold<N>.txt`
    pub fn fold_manifest_path(&self, fold: usize) -> PathBuf {
        self.root.join("folds").join(format!("fold{}.txt", fold))
    }

    /// `<root>/objects/<name>`
    pub fn object_path(&self, name: &str) -> PathBuf {
        self.root.join("objects").join(name)
    }
}

/// Ordered list of point file names making up one fold
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Parse newline-delimited entries
    ///
    /// Surrounding whitespace is trimmed and blank lines are skipped. A name
    /// listed twice would make two entries write the same output files, so it
    /// is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            if !seen.insert(name) {
                return Err(Error::MalformedInput(format!(
                    "manifest line {} repeats entry {:?}",
                    line_no + 1,
                    name
                )));
            }
            entries.push(name.to_string());
        }

        Ok(Self { entries })
    }

    /// Read a manifest file; a missing or unreadable file is an I/O error
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_access(path, e))?;
        Self::parse(&text)
    }

    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let text: Vec<String> = entries.into_iter().map(Into::into).collect();
        Self::parse(&text.join("\n"))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
