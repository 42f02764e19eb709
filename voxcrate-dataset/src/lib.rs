//! Dataset preparation and model glue for voxcrate
//!
//! This crate turns a fold of raw point files into persisted voxel grids,
//! serves those grids back as shuffled batches, and defines the interface
//! and reporting helpers around an external voxel classifier.

pub mod builder;
pub mod batch;
pub mod model;
pub mod evaluation;
pub mod visualize;

pub use builder::*;
pub use batch::*;
pub use model::*;
pub use evaluation::*;
pub use visualize::*;
