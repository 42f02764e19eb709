//! Batches of persisted grids for an external trainer

use ndarray::{Array4, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;
use tracing::{debug, warn};
use voxcrate_core::{Error, LabelDictionary, OccupancyPolicy, Result, SampleRecord};
use voxcrate_io::GridStore;

/// One batch of grids, stacked along the first axis
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Shape `(n, r, r, r)`
    pub grids: Array4<f32>,
    /// Class id of each grid
    pub labels: Vec<u32>,
    pub records: Vec<SampleRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Serves the grids of one store as fixed-size batches
///
/// Sample metadata comes from the store's `index.json` when present, and
/// otherwise from the grid file names.
#[derive(Debug, Clone)]
pub struct BatchGenerator {
    store: GridStore,
    samples: Vec<(PathBuf, SampleRecord)>,
    batch_size: usize,
    resolution: usize,
    policy: OccupancyPolicy,
}

impl BatchGenerator {
    pub fn from_store(store: GridStore, labels: &LabelDictionary, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }

        let (samples, resolution, policy) = match store.read_index()? {
            Some(index) => {
                let samples = index
                    .samples
                    .into_iter()
                    .map(|record| (store.path_for(&record), record))
                    .collect();
                (samples, Some(index.resolution), index.occupancy)
            }
            None => {
                let mut samples = Vec::new();
                for stored in store.list()? {
                    match stored.record(labels) {
                        Ok(record) => samples.push((stored.path, record)),
                        Err(e) => warn!("Ignoring {}: {}", stored.path.display(), e),
                    }
                }
                // Counts are a superset of binary values, so any stored grid loads
                (samples, None, OccupancyPolicy::Count)
            }
        };

        let resolution = match (resolution, samples.first()) {
            (Some(resolution), _) => resolution,
            (None, Some((path, _))) => store.load(path, policy)?.resolution(),
            (None, None) => 0,
        };

        debug!("{} samples of resolution {} in {}", samples.len(), resolution, store.dir().display());
        Ok(Self {
            store,
            samples,
            batch_size,
            resolution,
            policy,
        })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Grid edge length every sample must share
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Batches per epoch; the last batch may be short
    pub fn num_batches(&self) -> usize {
        self.samples.len().div_ceil(self.batch_size)
    }

    pub fn records(&self) -> impl Iterator<Item = &SampleRecord> {
        self.samples.iter().map(|(_, record)| record)
    }

    /// One epoch in a freshly shuffled order
    pub fn epoch<R: Rng + ?Sized>(&self, rng: &mut R) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        order.shuffle(rng);
        Batches {
            generator: self,
            order,
            position: 0,
        }
    }

    /// One epoch in store order
    pub fn epoch_in_order(&self) -> Batches<'_> {
        Batches {
            generator: self,
            order: (0..self.samples.len()).collect(),
            position: 0,
        }
    }

    fn load_batch(&self, indices: &[usize]) -> Result<Batch> {
        let r = self.resolution;
        let mut grids = Array4::<f32>::zeros((indices.len(), r, r, r));
        let mut labels = Vec::with_capacity(indices.len());
        let mut records = Vec::with_capacity(indices.len());

        for (slot, &index) in indices.iter().enumerate() {
            let (path, record) = &self.samples[index];
            let grid = self.store.load(path, self.policy)?;
            if grid.resolution() != r {
                return Err(Error::InvalidData(format!(
                    "{} has resolution {}, expected {}",
                    path.display(),
                    grid.resolution(),
                    r
                )));
            }
            grids.index_axis_mut(Axis(0), slot).assign(&grid.to_f32());
            labels.push(record.label.id);
            records.push(record.clone());
        }

        Ok(Batch { grids, labels, records })
    }
}

/// Iterator over the batches of one epoch
pub struct Batches<'a> {
    generator: &'a BatchGenerator,
    order: Vec<usize>,
    position: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.generator.batch_size).min(self.order.len());
        let batch = self.generator.load_batch(&self.order[self.position..end]);
        self.position = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.position).div_ceil(self.generator.batch_size);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;
    use voxcrate_core::{Label, VoxelGrid};
    use voxcrate_io::GridIndex;

    fn populate(store: &GridStore, count: usize, resolution: usize, with_index: bool) -> Vec<SampleRecord> {
        store.ensure_dir().unwrap();
        let records: Vec<SampleRecord> = (0..count)
            .map(|i| SampleRecord::new(format!("car.1.{}.bin", i), 0, Label { id: 3, name: "car".to_string() }))
            .collect();
        for (i, record) in records.iter().enumerate() {
            let grid = VoxelGrid::from_indices(resolution, OccupancyPolicy::Binary, vec![[i % resolution, 0, 0]]).unwrap();
            store.write(record, &grid).unwrap();
        }
        if with_index {
            store
                .write_index(&GridIndex {
                    resolution,
                    occupancy: OccupancyPolicy::Binary,
                    samples: records.clone(),
                })
                .unwrap();
        }
        records
    }

    #[test]
    fn test_batches_cover_every_sample_once() {
        let temp = tempdir().unwrap();
        let store = GridStore::for_split(temp.path(), "training");
        populate(&store, 7, 4, true);

        let labels = LabelDictionary::sydney_urban_objects();
        let generator = BatchGenerator::from_store(store, &labels, 3).unwrap();
        assert_eq!(generator.len(), 7);
        assert_eq!(generator.num_batches(), 3);

        let mut rng = StdRng::seed_from_u64(42);
        let batches: Vec<Batch> = generator.epoch(&mut rng).collect::<Result<_>>().unwrap();
        assert_eq!(batches.iter().map(Batch::len).collect::<Vec<_>>(), vec![3, 3, 1]);
        assert_eq!(batches[0].grids.shape(), &[3, 4, 4, 4]);
        assert!(batches.iter().all(|b| b.labels.iter().all(|&l| l == 3)));

        let mut seen: Vec<String> = batches
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.source_name.clone()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let temp = tempdir().unwrap();
        let store = GridStore::open(temp.path());
        populate(&store, 10, 2, true);
        let generator = BatchGenerator::from_store(store, &LabelDictionary::default(), 4).unwrap();

        let order = |seed: u64| -> Vec<String> {
            generator
                .epoch(&mut StdRng::seed_from_u64(seed))
                .flat_map(|b| b.unwrap().records)
                .map(|r| r.source_name)
                .collect()
        };
        assert_eq!(order(5), order(5));
    }

    #[test]
    fn test_without_index_uses_file_names() {
        let temp = tempdir().unwrap();
        let store = GridStore::open(temp.path());
        populate(&store, 2, 3, false);

        let generator = BatchGenerator::from_store(store, &LabelDictionary::default(), 8).unwrap();
        assert_eq!(generator.resolution(), 3);
        let batch = generator.epoch_in_order().next().unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].source_name, "car.1.0.bin");
        assert_eq!(batch.grids[[0, 0, 0, 0]], 1.0);
        assert_eq!(batch.grids[[1, 1, 0, 0]], 1.0);
    }

    #[test]
    fn test_mixed_resolutions_rejected() {
        let temp = tempdir().unwrap();
        let store = GridStore::open(temp.path());
        populate(&store, 1, 4, true);

        let odd = SampleRecord::new("van.1.1.bin", 0, Label { id: 13, name: "van".to_string() });
        store.write(&odd, &VoxelGrid::empty(2, OccupancyPolicy::Binary)).unwrap();
        let mut index = store.read_index().unwrap().unwrap();
        index.samples.push(odd);
        store.write_index(&index).unwrap();

        let generator = BatchGenerator::from_store(store, &LabelDictionary::default(), 2).unwrap();
        let err = generator.epoch_in_order().next().unwrap().unwrap_err();
        assert_eq!(err.kind(), voxcrate_core::ErrorKind::InvalidData);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let temp = tempdir().unwrap();
        let err = BatchGenerator::from_store(GridStore::open(temp.path()), &LabelDictionary::default(), 0).unwrap_err();
        assert_eq!(err.kind(), voxcrate_core::ErrorKind::InvalidConfig);
    }
}
