//! Dataset builder
//!
//! Walks one fold manifest, loads every listed point file, voxelizes each of
//! its augmentation samples and persists the non-empty grids under
//! `<output_dir>/<split>/`. Problems with individual samples are logged and
//! collected in the [`BuildReport`]; only I/O failures (and malformed files
//! under [`FailurePolicy::Abort`]) stop the run.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};
use voxcrate_algorithms::{RotationAugmentation, Voxelizer};
use voxcrate_core::{Error, ErrorKind, LabelDictionary, Result, SampleRecord};
use voxcrate_io::{recreate_dir, DatasetLayout, GridIndex, GridStore, Manifest, PointCloudReader};

use crate::visualize::{ProjectionVisualizer, Visualizer};

/// Output partition a fold is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Training,
    Testing,
}

impl Split {
    /// Directory name under the output directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Training => "training",
            Split::Testing => "testing",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "training" => Ok(Split::Training),
            "testing" => Ok(Split::Testing),
            other => Err(Error::InvalidConfig(format!(
                "split must be 'training' or 'testing', got {:?}",
                other
            ))),
        }
    }
}

/// What to do with a point file whose contents cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record a skip event and continue with the next entry
    #[default]
    Skip,
    /// Stop the whole run
    Abort,
}

/// Parallel processing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Process manifest entries on the rayon thread pool
    pub enabled: bool,
    /// Size of a dedicated pool; `None` uses the global one
    pub num_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_threads: None,
        }
    }
}

impl ParallelConfig {
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            num_threads: None,
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Configuration of one dataset run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Dataset root holding `objects/` and `folds/`
    pub dataset_dir: PathBuf,
    pub fold: usize,
    pub split: Split,
    pub output_dir: PathBuf,
    /// Remove and recreate `output_dir` before writing
    pub clear_output: bool,
    pub malformed_policy: FailurePolicy,
    pub parallel: ParallelConfig,
    pub augmentation: RotationAugmentation,
    /// Hand each written grid to the visualizer
    pub visualize: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("sydney-urban-objects-dataset"),
            fold: 0,
            split: Split::Training,
            output_dir: PathBuf::from("npy_generated"),
            clear_output: false,
            malformed_policy: FailurePolicy::Skip,
            parallel: ParallelConfig::default(),
            augmentation: RotationAugmentation::default(),
            visualize: false,
        }
    }
}

impl BuildConfig {
    pub fn with_dataset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dataset_dir = dir.into();
        self
    }

    pub fn with_fold(mut self, fold: usize) -> Self {
        self.fold = fold;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = split;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_clear_output(mut self, clear: bool) -> Self {
        self.clear_output = clear;
        self
    }

    pub fn with_malformed_policy(mut self, policy: FailurePolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_augmentation(mut self, augmentation: RotationAugmentation) -> Self {
        self.augmentation = augmentation;
        self
    }

    pub fn with_visualize(mut self, visualize: bool) -> Self {
        self.visualize = visualize;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.augmentation.validate()?;
        if self.parallel.num_threads == Some(0) {
            return Err(Error::InvalidConfig("num_threads must be positive".to_string()));
        }
        Ok(())
    }
}

/// A sample that was not written, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSample {
    pub source_name: String,
    pub sample_index: usize,
    pub reason: ErrorKind,
    pub message: String,
}

/// Outcome of a dataset run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Records of the persisted grids, in manifest order
    pub written: Vec<SampleRecord>,
    pub skipped: Vec<SkippedSample>,
}

impl BuildReport {
    /// Number of skip events with the given reason
    pub fn skipped_with(&self, reason: ErrorKind) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }

    fn merge(&mut self, other: BuildReport) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
    }
}

/// Builds a persisted grid dataset from one fold of raw point files
pub struct DatasetBuilder<'a, R> {
    reader: R,
    voxelizer: Voxelizer,
    labels: &'a LabelDictionary,
    config: BuildConfig,
    visualizer: Box<dyn Visualizer + 'a>,
}

impl<'a, R: PointCloudReader> DatasetBuilder<'a, R> {
    /// Create a builder; the configuration is checked before anything runs
    pub fn new(reader: R, voxelizer: Voxelizer, labels: &'a LabelDictionary, config: BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            voxelizer,
            labels,
            config,
            visualizer: Box::new(ProjectionVisualizer::new()),
        })
    }

    /// Replace the default text visualizer
    pub fn with_visualizer(mut self, visualizer: impl Visualizer + 'a) -> Self {
        self.visualizer = Box::new(visualizer);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Store the configured split is written to
    pub fn store(&self) -> GridStore {
        GridStore::for_split(&self.config.output_dir, self.config.split.as_str())
    }

    /// Process the configured fold
    pub fn run(&self) -> Result<BuildReport> {
        let layout = DatasetLayout::new(&self.config.dataset_dir);
        let manifest = Manifest::read(&layout.fold_manifest_path(self.config.fold))?;
        info!(
            "Fold {} lists {} files, writing {} samples",
            self.config.fold,
            manifest.len(),
            self.config.split
        );
        self.run_manifest(&layout, &manifest)
    }

    /// Process an explicit manifest against a dataset layout
    ///
    /// Records are merged into the split's existing `index.json`, so several
    /// folds can be built into one split. The stored resolution and occupancy
    /// must match this voxelizer's.
    pub fn run_manifest(&self, layout: &DatasetLayout, manifest: &Manifest) -> Result<BuildReport> {
        if self.config.clear_output {
            recreate_dir(&self.config.output_dir)?;
        }
        let store = self.store();
        store.ensure_dir()?;

        let resolution = self.voxelizer.resolution();
        let occupancy = self.voxelizer.config().occupancy;
        let mut index = match store.read_index()? {
            Some(existing) => {
                existing.check_compatible(resolution, occupancy)?;
                debug!("Extending index of {} samples in {}", existing.samples.len(), store.dir().display());
                existing
            }
            None => GridIndex::new(resolution, occupancy),
        };

        let outcomes = if self.config.parallel.enabled {
            let process_all = || {
                manifest
                    .entries()
                    .par_iter()
                    .map(|name| self.process_entry(layout, &store, name))
                    .collect::<Result<Vec<_>>>()
            };
            match self.config.parallel.num_threads {
                Some(threads) => ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("voxcrate-build-{}", i))
                    .build()
                    .map_err(|e| Error::InvalidConfig(format!("failed to build thread pool: {}", e)))?
                    .install(process_all)?,
                None => process_all()?,
            }
        } else {
            manifest
                .entries()
                .iter()
                .map(|name| self.process_entry(layout, &store, name))
                .collect::<Result<Vec<_>>>()?
        };

        let mut report = BuildReport::default();
        for outcome in outcomes {
            report.merge(outcome);
        }

        index.merge(report.written.iter().cloned());
        store.write_index(&index)?;

        info!(
            "Wrote {} grids to {}, skipped {}",
            report.written.len(),
            store.dir().display(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Load, voxelize and persist every sample of one manifest entry
    #[tracing::instrument(skip(self, layout, store))]
    fn process_entry(&self, layout: &DatasetLayout, store: &GridStore, name: &str) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let steps = self.config.augmentation.steps;

        let label = match self.labels.label_for_file(name) {
            Ok(label) => label,
            Err(e) => {
                report.skip_all(name, steps, &e);
                return Ok(report);
            }
        };

        let cloud = match self.reader.read_point_cloud(&layout.object_path(name)) {
            Ok(cloud) => cloud,
            Err(e) if e.kind() == ErrorKind::MalformedInput && self.config.malformed_policy == FailurePolicy::Skip => {
                report.skip_all(name, steps, &e);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        let samples = self.config.augmentation.samples(&cloud);
        for (sample_index, sample) in samples {
            let voxelization = self.voxelizer.voxelize(&sample)?;
            match voxelization.into_non_empty(name) {
                Ok(voxelization) => {
                    let record = SampleRecord::new(name, sample_index, label.clone());
                    store.write(&record, &voxelization.grid)?;
                    debug!(
                        "{} sample {}: {} of {} points retained",
                        name,
                        sample_index,
                        voxelization.retained.len(),
                        sample.len()
                    );
                    if self.config.visualize {
                        self.visualizer.show(&record, &voxelization.grid)?;
                    }
                    report.written.push(record);
                }
                Err(e) => report.skip(name, sample_index, &e),
            }
        }

        Ok(report)
    }
}

impl BuildReport {
    fn skip(&mut self, source_name: &str, sample_index: usize, error: &Error) {
        warn!(
            source = source_name,
            sample_index,
            reason = %error.kind(),
            "Skipping sample: {}",
            error
        );
        self.skipped.push(SkippedSample {
            source_name: source_name.to_string(),
            sample_index,
            reason: error.kind(),
            message: error.to_string(),
        });
    }

    fn skip_all(&mut self, source_name: &str, steps: usize, error: &Error) {
        for sample_index in 0..steps {
            self.skip(source_name, sample_index, error);
        }
    }
}
