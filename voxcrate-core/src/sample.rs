//! Structured sample metadata and its file-name encoding

use crate::error::{Error, Result};
use crate::label::Label;
use serde::{Deserialize, Serialize};

/// Extension of raw point files in the dataset's `objects/` directory
pub const POINT_FILE_EXTENSION: &str = ".bin";

/// Extension of persisted grids
pub const GRID_FILE_EXTENSION: &str = ".npy";

/// Identity of one persisted grid
///
/// One source file can yield several samples (e.g. rotated copies); each is
/// told apart by its `sample_index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRecord {
    /// File name of the source point file, e.g. `pillar.2.3582.bin`
    pub source_name: String,
    pub sample_index: usize,
    pub label: Label,
}

impl SampleRecord {
    pub fn new(source_name: impl Into<String>, sample_index: usize, label: Label) -> Self {
        Self {
            source_name: source_name.into(),
            sample_index,
            label,
        }
    }

    /// Source name without the point file extension
    pub fn stem(&self) -> &str {
        source_stem(&self.source_name)
    }

    /// Storage file name, `<stem>_<sample_index>.npy`
    pub fn storage_file_name(&self) -> String {
        format!("{}_{}{}", self.stem(), self.sample_index, GRID_FILE_EXTENSION)
    }
}

/// Strip a trailing `.bin` from a point file name
pub fn source_stem(source_name: &str) -> &str {
    source_name
        .strip_suffix(POINT_FILE_EXTENSION)
        .unwrap_or(source_name)
}

/// Split a storage file name back into `(stem, sample_index)`
pub fn parse_storage_file_name(file_name: &str) -> Result<(&str, usize)> {
    let malformed = || Error::InvalidData(format!("not a grid file name: {}", file_name));

    let base = file_name
        .strip_suffix(GRID_FILE_EXTENSION)
        .ok_or_else(malformed)?;
    let (stem, index) = base.rsplit_once('_').ok_or_else(malformed)?;
    if stem.is_empty() {
        return Err(malformed());
    }
    let index = index.parse::<usize>().map_err(|_| malformed())?;
    Ok((stem, index))
}
