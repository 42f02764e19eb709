//! # voxcrate
//!
//! Point cloud voxelization for VoxNet-style 3D classifiers.
//!
//! This is the umbrella crate that provides convenient access to all voxcrate
//! functionality. You can use this crate to get everything in one place, or use
//! individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: Points, point clouds, voxel grids, labels and sample records
//! - **I/O**: Binary point files, fold manifests and `.npy` grid stores
//! - **Algorithms**: Voxelization and rotation augmentation
//! - **Dataset**: Dataset building, batching, classifier interface and metrics
//!
//! ## Quick Start
//!
//! ```rust
//! use voxcrate::prelude::*;
//!
//! let cloud = PointCloud::from_points(vec![
//!     Point3f::new(0.0, 0.0, 0.0),
//!     Point3f::new(0.0, 0.0, 0.0),
//!     Point3f::new(1.0, 1.0, 1.0),
//! ]);
//!
//! let voxelizer = Voxelizer::new(VoxelizerConfig::default())?;
//! let result = voxelizer.voxelize(&cloud)?;
//! assert_eq!(result.retained.len(), 3);
//! assert_eq!(result.grid.resolution(), 32);
//! # Ok::<(), voxcrate::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables algorithms, io and dataset
//! - `algorithms`: Voxelizer and augmentation
//! - `io`: Point file reading and grid persistence
//! - `io-mmap`: Memory-mapped reading of large point files
//! - `dataset`: Dataset builder, batch generator and evaluation
//! - `all`: Enables all features

// Re-export core functionality
pub use voxcrate_core::*;

// Re-export sub-crates
#[cfg(feature = "algorithms")]
pub use voxcrate_algorithms as algorithms;

#[cfg(feature = "io")]
pub use voxcrate_io as io;

#[cfg(feature = "dataset")]
pub use voxcrate_dataset as dataset;

/// Convenient imports for common use cases
pub mod prelude {
    pub use voxcrate_core::*;

    #[cfg(feature = "algorithms")]
    pub use voxcrate_algorithms::*;

    #[cfg(feature = "io")]
    pub use voxcrate_io::*;

    #[cfg(feature = "dataset")]
    pub use voxcrate_dataset::*;
}
