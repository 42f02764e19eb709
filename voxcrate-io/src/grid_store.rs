//! Persisted voxel grids
//!
//! Each retained sample is stored as one `u32` `.npy` array of shape
//! `(r, r, r)` named `<stem>_<sample_index>.npy`. The directory also carries
//! an `index.json` with the structured records of the run that produced it,
//! so readers do not have to recover metadata from file names.

use ndarray::Array3;
use ndarray_npy::{read_npy, write_npy, ReadNpyError, WriteNpyError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use voxcrate_core::{
    parse_storage_file_name, Error, LabelDictionary, OccupancyPolicy, Result, SampleRecord,
    VoxelGrid, GRID_FILE_EXTENSION, POINT_FILE_EXTENSION,
};

/// Name of the JSON index written next to the grids
pub const INDEX_FILE_NAME: &str = "index.json";

/// Contents of `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridIndex {
    pub resolution: usize,
    pub occupancy: OccupancyPolicy,
    pub samples: Vec<SampleRecord>,
}

impl GridIndex {
    pub fn new(resolution: usize, occupancy: OccupancyPolicy) -> Self {
        Self {
            resolution,
            occupancy,
            samples: Vec::new(),
        }
    }

    /// Fail unless grids written with `resolution` and `occupancy` can share
    /// this index
    pub fn check_compatible(&self, resolution: usize, occupancy: OccupancyPolicy) -> Result<()> {
        if self.resolution != resolution || self.occupancy != occupancy {
            return Err(Error::InvalidConfig(format!(
                "store holds {}^3 {:?} grids, cannot add {}^3 {:?} grids",
                self.resolution, self.occupancy, resolution, occupancy
            )));
        }
        Ok(())
    }

    /// Add records, replacing any with the same source name and sample index
    /// in place
    pub fn merge(&mut self, records: impl IntoIterator<Item = SampleRecord>) {
        let mut positions: HashMap<(String, usize), usize> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.source_name.clone(), r.sample_index), i))
            .collect();

        for record in records {
            let key = (record.source_name.clone(), record.sample_index);
            match positions.get(&key) {
                Some(&i) => self.samples[i] = record,
                None => {
                    positions.insert(key, self.samples.len());
                    self.samples.push(record);
                }
            }
        }
    }
}

/// A grid file found in a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSample {
    pub path: PathBuf,
    pub stem: String,
    pub sample_index: usize,
}

impl StoredSample {
    /// Rebuild the sample record from the file name alone
    pub fn record(&self, labels: &LabelDictionary) -> Result<SampleRecord> {
        let label = labels.label_for_file(&self.stem)?;
        Ok(SampleRecord::new(
            format!("{}{}", self.stem, POINT_FILE_EXTENSION),
            self.sample_index,
            label,
        ))
    }
}

/// Directory of persisted grids for one split
#[derive(Debug, Clone)]
pub struct GridStore {
    dir: PathBuf,
}

impl GridStore {
    /// Store rooted at `<output_dir>/<split>`
    pub fn for_split(output_dir: &Path, split: &str) -> Self {
        Self {
            dir: output_dir.join(split),
        }
    }

    /// Store rooted directly at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::file_access(&self.dir, e))
    }

    pub fn path_for(&self, record: &SampleRecord) -> PathBuf {
        self.dir.join(record.storage_file_name())
    }

    /// Persist one grid, returning the written path
    pub fn write(&self, record: &SampleRecord, grid: &VoxelGrid) -> Result<PathBuf> {
        let path = self.path_for(record);
        write_npy(&path, grid.cells()).map_err(|e| write_error(&path, e))?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Load one grid; `policy` states how the values were accumulated
    pub fn load(&self, path: &Path, policy: OccupancyPolicy) -> Result<VoxelGrid> {
        let cells: Array3<u32> = read_npy(path).map_err(|e| read_error(path, e))?;
        VoxelGrid::from_array(cells, policy)
    }

    pub fn write_index(&self, index: &GridIndex) -> Result<PathBuf> {
        let path = self.dir.join(INDEX_FILE_NAME);
        let json = serde_json::to_string_pretty(index)?;
        fs::write(&path, json).map_err(|e| Error::file_access(&path, e))?;
        info!("Wrote index of {} samples to {}", index.samples.len(), path.display());
        Ok(path)
    }

    /// Read `index.json`, `None` when the store has none
    pub fn read_index(&self) -> Result<Option<GridIndex>> {
        let path = self.dir.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| Error::file_access(&path, e))?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// All grid files in the store, sorted by file name
    ///
    /// Files that do not follow the `<stem>_<index>.npy` pattern are ignored.
    pub fn list(&self) -> Result<Vec<StoredSample>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::file_access(&self.dir, e))?;

        let mut samples = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::file_access(&self.dir, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.ends_with(GRID_FILE_EXTENSION) {
                continue;
            }
            match parse_storage_file_name(file_name) {
                Ok((stem, sample_index)) => samples.push(StoredSample {
                    path: entry.path(),
                    stem: stem.to_string(),
                    sample_index,
                }),
                Err(e) => debug!("Skipping {}: {}", file_name, e),
            }
        }

        samples.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(samples)
    }
}

/// Remove `dir` with everything in it and create it again empty
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| Error::file_access(dir, e))?;
        info!("Cleared previous output in {}", dir.display());
    }
    fs::create_dir_all(dir).map_err(|e| Error::file_access(dir, e))
}

fn write_error(path: &Path, e: WriteNpyError) -> Error {
    match e {
        WriteNpyError::Io(source) => Error::file_access(path, source),
        other => Error::Serialization(format!("{}: {}", path.display(), other)),
    }
}

fn read_error(path: &Path, e: ReadNpyError) -> Error {
    match e {
        ReadNpyError::Io(source) => Error::file_access(path, source),
        other => Error::InvalidData(format!("{}: {}", path.display(), other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use voxcrate_core::Label;

    fn record(source: &str, index: usize) -> SampleRecord {
        SampleRecord::new(source, index, Label { id: 3, name: "car".to_string() })
    }

    #[test]
    fn test_write_list_load() {
        let temp = tempdir().unwrap();
        let store = GridStore::for_split(temp.path(), "training");
        store.ensure_dir().unwrap();

        let grid = VoxelGrid::from_indices(4, OccupancyPolicy::Count, vec![[1, 2, 3], [1, 2, 3]]).unwrap();
        let path = store.write(&record("car.1.77.bin", 0), &grid).unwrap();
        assert!(path.ends_with("training/car.1.77_0.npy"));

        // Stray files are not listed
        fs::write(store.dir().join("notes.txt"), "x").unwrap();
        fs::write(store.dir().join("bad.npy"), "x").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].stem, "car.1.77");
        assert_eq!(listed[0].sample_index, 0);

        let loaded = store.load(&listed[0].path, OccupancyPolicy::Count).unwrap();
        assert_eq!(loaded, grid);

        let labels = LabelDictionary::sydney_urban_objects();
        assert_eq!(listed[0].record(&labels).unwrap(), record("car.1.77.bin", 0));
    }

    #[test]
    fn test_index_roundtrip() {
        let temp = tempdir().unwrap();
        let store = GridStore::open(temp.path());
        assert!(store.read_index().unwrap().is_none());

        let index = GridIndex {
            resolution: 32,
            occupancy: OccupancyPolicy::Binary,
            samples: vec![record("car.1.77.bin", 0), record("car.1.77.bin", 1)],
        };
        store.write_index(&index).unwrap();
        assert_eq!(store.read_index().unwrap(), Some(index));
    }

    #[test]
    fn test_index_merge_replaces_same_sample() {
        let mut index = GridIndex::new(32, OccupancyPolicy::Binary);
        index.merge(vec![record("car.1.77.bin", 0), record("car.1.77.bin", 1)]);

        let relabeled = SampleRecord::new("car.1.77.bin", 1, Label { id: 4, name: "van".to_string() });
        index.merge(vec![relabeled.clone(), record("car.1.78.bin", 0)]);

        assert_eq!(
            index.samples,
            vec![record("car.1.77.bin", 0), relabeled, record("car.1.78.bin", 0)]
        );
        assert!(index.check_compatible(32, OccupancyPolicy::Binary).is_ok());
        assert!(index.check_compatible(16, OccupancyPolicy::Binary).is_err());
        assert!(index.check_compatible(32, OccupancyPolicy::Count).is_err());
    }

    #[test]
    fn test_recreate_dir_clears_contents() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("npy_generated");
        fs::create_dir_all(out.join("training")).unwrap();
        fs::write(out.join("training").join("old_0.npy"), "stale").unwrap();

        recreate_dir(&out).unwrap();
        assert!(out.exists());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }
}
