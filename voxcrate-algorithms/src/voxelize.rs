//! Point cloud voxelization

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;
use voxcrate_core::{
    Bounded, Bounds, CellIndex, Error, OccupancyPolicy, Point3f, PointCloud, Positioned, Result,
    VoxelGrid,
};

/// Largest accepted grid edge length
pub const MAX_RESOLUTION: usize = 512;

/// Where the grid's minimum corner sits when the cell size is fixed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginPolicy {
    /// A fixed world-space corner shared by every sample
    Explicit(Point3f),
    /// The minimum corner of each cloud's bounds
    BoundsMin,
    /// Each cloud's bounds center lands on the grid center
    Centered,
}

/// How world coordinates are scaled into cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScalePolicy {
    /// One physical cell size for the whole dataset; large objects are clipped
    Fixed { cell_size: f32, origin: OriginPolicy },
    /// Per-sample cell size so the longest axis of each cloud spans the grid,
    /// with the cloud centered on every axis
    Adaptive,
}

/// Voxelizer configuration, shared unchanged by every sample of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// Cells per axis
    pub resolution: usize,
    pub scale: ScalePolicy,
    pub occupancy: OccupancyPolicy,
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            resolution: 32,
            scale: ScalePolicy::Fixed {
                cell_size: 0.2,
                origin: OriginPolicy::Centered,
            },
            occupancy: OccupancyPolicy::Binary,
        }
    }
}

impl VoxelizerConfig {
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_scale(mut self, scale: ScalePolicy) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_occupancy(mut self, occupancy: OccupancyPolicy) -> Self {
        self.occupancy = occupancy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(Error::InvalidConfig("resolution must be positive".to_string()));
        }
        if self.resolution > MAX_RESOLUTION {
            return Err(Error::InvalidConfig(format!(
                "resolution {} exceeds the maximum of {}",
                self.resolution, MAX_RESOLUTION
            )));
        }

        match self.scale {
            ScalePolicy::Fixed { cell_size, origin } => {
                if !(cell_size.is_finite() && cell_size > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "cell_size must be positive and finite, got {}",
                        cell_size
                    )));
                }
                if let OriginPolicy::Explicit(point) = origin {
                    if !voxcrate_core::is_finite_point(&point) {
                        return Err(Error::InvalidConfig(format!(
                            "grid origin must be finite, got {:?}",
                            point
                        )));
                    }
                }
            }
            ScalePolicy::Adaptive => {
                if self.resolution < 2 {
                    return Err(Error::InvalidConfig(
                        "adaptive scaling needs a resolution of at least 2".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// World-space placement of a grid: minimum corner and cell edge length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPlacement {
    pub origin: [f64; 3],
    pub cell_size: f64,
    pub resolution: usize,
}

impl GridPlacement {
    /// Cell containing `point`, `None` when it falls outside the grid
    ///
    /// Indices are `floor((coordinate - origin) / cell_size)`; anything
    /// outside `[0, resolution)` on any axis is clipped.
    pub fn cell_of(&self, point: &Point3f) -> Option<CellIndex> {
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let scaled = (f64::from(point[axis]) - self.origin[axis]) / self.cell_size;
            if !scaled.is_finite() {
                return None;
            }
            let cell = scaled.floor();
            if cell < 0.0 || cell >= self.resolution as f64 {
                return None;
            }
            index[axis] = cell as usize;
        }
        Some(index)
    }

    /// World-space center of a cell
    pub fn cell_center(&self, index: CellIndex) -> Point3f {
        let coord = |axis: usize| (self.origin[axis] + (index[axis] as f64 + 0.5) * self.cell_size) as f32;
        Point3f::new(coord(0), coord(1), coord(2))
    }

    fn linear_index(&self, index: CellIndex) -> usize {
        (index[0] * self.resolution + index[1]) * self.resolution + index[2]
    }
}

/// Output of one voxelization
#[derive(Debug, Clone, PartialEq)]
pub struct Voxelization<T> {
    pub grid: VoxelGrid,
    /// Points that landed inside the grid, ordered by cell then coordinates
    pub retained: PointCloud<T>,
    /// `None` when the input had no finite points
    pub placement: Option<GridPlacement>,
}

impl<T> Voxelization<T> {
    /// True when no point landed in the grid
    ///
    /// This is the only reliable emptiness test: a sparse cloud can produce
    /// an almost all-zero grid too.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Turn an empty result into [`Error::EmptyResult`] for `source_name`
    pub fn into_non_empty(self, source_name: &str) -> Result<Self> {
        if self.is_empty() {
            Err(Error::EmptyResult {
                source_name: source_name.to_string(),
            })
        } else {
            Ok(self)
        }
    }
}

/// Deterministic point cloud → occupancy grid conversion
#[derive(Debug, Clone)]
pub struct Voxelizer {
    config: VoxelizerConfig,
}

impl Voxelizer {
    /// Create a voxelizer; an invalid configuration is rejected here, before
    /// any cloud is processed
    pub fn new(config: VoxelizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VoxelizerConfig {
        &self.config
    }

    pub fn resolution(&self) -> usize {
        self.config.resolution
    }

    /// Grid placement for a cloud with the given bounds
    pub fn placement(&self, bounds: &Bounds) -> GridPlacement {
        let resolution = self.config.resolution;
        let min = [f64::from(bounds.min.x), f64::from(bounds.min.y), f64::from(bounds.min.z)];
        let max = [f64::from(bounds.max.x), f64::from(bounds.max.y), f64::from(bounds.max.z)];

        let (origin, cell_size) = match self.config.scale {
            ScalePolicy::Fixed { cell_size, origin } => {
                let cell_size = f64::from(cell_size);
                let origin = match origin {
                    OriginPolicy::Explicit(point) => {
                        [f64::from(point.x), f64::from(point.y), f64::from(point.z)]
                    }
                    OriginPolicy::BoundsMin => min,
                    OriginPolicy::Centered => {
                        let half_span = cell_size * resolution as f64 / 2.0;
                        std::array::from_fn(|axis| (min[axis] + max[axis]) / 2.0 - half_span)
                    }
                };
                (origin, cell_size)
            }
            ScalePolicy::Adaptive => {
                let extent: [f64; 3] = std::array::from_fn(|axis| max[axis] - min[axis]);
                let max_extent = extent.iter().copied().fold(0.0, f64::max);
                let divisor = (resolution - 1).max(1) as f64;
                let cell_size = if max_extent > 0.0 { max_extent / divisor } else { 1.0 };
                let span = cell_size * divisor;
                // Never start above the cloud's minimum, even after rounding
                let origin = std::array::from_fn(|axis| min[axis] - ((span - extent[axis]) / 2.0).max(0.0));
                (origin, cell_size)
            }
        };

        GridPlacement {
            origin,
            cell_size,
            resolution,
        }
    }

    /// Voxelize one cloud
    ///
    /// Identical input and configuration always give a bit-identical grid and
    /// retained cloud, whatever the order of the input points.
    pub fn voxelize<T>(&self, cloud: &PointCloud<T>) -> Result<Voxelization<T>>
    where
        T: Positioned + Clone,
    {
        let resolution = self.config.resolution;
        let occupancy = self.config.occupancy;

        let Some(bounds) = cloud.bounds() else {
            return Ok(Voxelization {
                grid: VoxelGrid::empty(resolution, occupancy),
                retained: PointCloud::new(),
                placement: None,
            });
        };

        let placement = self.placement(&bounds);

        let mut inside: Vec<(usize, CellIndex, &T)> = cloud
            .iter()
            .filter_map(|point| {
                placement
                    .cell_of(&point.position())
                    .map(|cell| (placement.linear_index(cell), cell, point))
            })
            .collect();

        inside.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| compare_points(a.2, b.2)));

        let grid = VoxelGrid::from_indices(resolution, occupancy, inside.iter().map(|(_, cell, _)| *cell))?;
        let retained: PointCloud<T> = inside.into_iter().map(|(_, _, point)| point.clone()).collect();
        debug!(
            "{} of {} points inside a {}^3 grid, cell size {:.4}",
            retained.len(),
            cloud.len(),
            resolution,
            placement.cell_size
        );

        Ok(Voxelization {
            grid,
            retained,
            placement: Some(placement),
        })
    }

    /// Voxelize several clouds in parallel, preserving their order
    pub fn voxelize_all<T>(&self, clouds: &[PointCloud<T>]) -> Result<Vec<Voxelization<T>>>
    where
        T: Positioned + Clone + Send + Sync,
    {
        clouds.par_iter().map(|cloud| self.voxelize(cloud)).collect()
    }
}

/// Coordinates first, then attributes, so equal positions still sort stably
/// regardless of input order
fn compare_points<T: Positioned>(a: &T, b: &T) -> Ordering {
    let (pa, pb) = (a.position(), b.position());
    pa.x.total_cmp(&pb.x)
        .then_with(|| pa.y.total_cmp(&pb.y))
        .then_with(|| pa.z.total_cmp(&pb.z))
        .then_with(|| a.cmp_attributes(b))
}
