//! Core data structures and traits for voxcrate
//!
//! This crate provides the fundamental types shared by the voxelization
//! pipeline: points, point clouds, bounds, voxel grids, the label dictionary
//! and the structured sample records that travel alongside each grid.

pub mod point;
pub mod point_cloud;
pub mod bounds;
pub mod voxel_grid;
pub mod label;
pub mod sample;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use bounds::*;
pub use voxel_grid::*;
pub use label::*;
pub use sample::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, UnitQuaternion};

// Type aliases for easier imports
pub type Point = Point3f;
