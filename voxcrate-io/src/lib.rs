//! I/O operations for voxcrate
//!
//! This crate reads raw binary point files and fold manifests, and persists
//! voxel grids as `.npy` arrays together with a JSON index of the samples
//! written in a run.

pub mod bin;
pub mod manifest;
pub mod grid_store;
pub mod mmap;

pub use bin::{count_non_finite, BinPointReader, Endianness, RecordLayout, ScalarType};
pub use grid_store::{recreate_dir, GridIndex, GridStore, StoredSample, INDEX_FILE_NAME};
pub use manifest::{DatasetLayout, Manifest};

use std::path::Path;
use voxcrate_core::{Point3f, PointCloud, Result};

/// Trait for reading point clouds from files
pub trait PointCloudReader: Send + Sync {
    /// Read a point cloud from the given path
    fn read_point_cloud(&self, path: &Path) -> Result<PointCloud<Point3f>>;

    /// Get the format name this reader handles
    fn format_name(&self) -> &'static str;
}

impl<R: PointCloudReader + ?Sized> PointCloudReader for &R {
    fn read_point_cloud(&self, path: &Path) -> Result<PointCloud<Point3f>> {
        (**self).read_point_cloud(path)
    }

    fn format_name(&self) -> &'static str {
        (**self).format_name()
    }
}
