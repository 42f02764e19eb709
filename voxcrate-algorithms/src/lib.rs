//! # voxcrate Algorithms
//!
//! Algorithms that turn point clouds into classifier input.
//!
//! This crate provides the voxelizer, which quantizes a point cloud into a
//! fixed-resolution occupancy grid, and rotation augmentation, which derives
//! several samples from one object.

pub mod voxelize;
pub mod augmentation;

// Re-export commonly used items
pub use voxelize::*;
pub use augmentation::*;
