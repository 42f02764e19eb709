//! Fixed-resolution occupancy grids

use crate::error::{Error, Result};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// How retained points contribute to the value of their cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyPolicy {
    /// A cell is 1 when at least one point falls into it, 0 otherwise
    #[default]
    Binary,
    /// A cell holds the number of points that fall into it
    Count,
}

/// Integer cell coordinate `[i, j, k]` along x, y and z
pub type CellIndex = [usize; 3];

/// A cubic `resolution³` occupancy grid
///
/// Grids are built in one step from the cell indices of their retained points
/// and are not modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    cells: Array3<u32>,
    policy: OccupancyPolicy,
}

impl VoxelGrid {
    /// An all-zero grid
    pub fn empty(resolution: usize, policy: OccupancyPolicy) -> Self {
        Self {
            cells: Array3::zeros((resolution, resolution, resolution)),
            policy,
        }
    }

    /// Accumulate one contribution per index under `policy`
    ///
    /// Every index must lie in `[0, resolution)` on all axes.
    pub fn from_indices<I>(resolution: usize, policy: OccupancyPolicy, indices: I) -> Result<Self>
    where
        I: IntoIterator<Item = CellIndex>,
    {
        let mut grid = Self::empty(resolution, policy);
        for index in indices {
            if index.iter().any(|&i| i >= resolution) {
                return Err(Error::InvalidData(format!(
                    "cell index {:?} outside a grid of resolution {}",
                    index, resolution
                )));
            }
            let cell = &mut grid.cells[index];
            match policy {
                OccupancyPolicy::Binary => *cell = 1,
                OccupancyPolicy::Count => *cell += 1,
            }
        }
        Ok(grid)
    }

    /// Wrap an existing array, e.g. one read back from storage
    pub fn from_array(cells: Array3<u32>, policy: OccupancyPolicy) -> Result<Self> {
        let (x, y, z) = cells.dim();
        if x != y || y != z {
            return Err(Error::InvalidData(format!(
                "voxel grid must be cubic, got {}x{}x{}",
                x, y, z
            )));
        }
        if policy == OccupancyPolicy::Binary && cells.iter().any(|&v| v > 1) {
            return Err(Error::InvalidData(
                "binary occupancy grid contains values greater than 1".to_string(),
            ));
        }
        Ok(Self { cells, policy })
    }

    /// Cells per axis
    pub fn resolution(&self) -> usize {
        self.cells.dim().0
    }

    pub fn policy(&self) -> OccupancyPolicy {
        self.policy
    }

    pub fn get(&self, index: CellIndex) -> Option<u32> {
        self.cells.get(index).copied()
    }

    pub fn cells(&self) -> &Array3<u32> {
        &self.cells
    }

    pub fn into_array(self) -> Array3<u32> {
        self.cells
    }

    /// Number of cells with a non-zero value
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v > 0).count()
    }

    /// Sum of all cell values
    pub fn total_occupancy(&self) -> u64 {
        self.cells.iter().map(|&v| u64::from(v)).sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.cells.iter().all(|&v| v == 0)
    }

    /// Occupied cells and their values, in row-major (x, y, z) order
    pub fn occupied_cells(&self) -> impl Iterator<Item = (CellIndex, u32)> + '_ {
        self.cells
            .indexed_iter()
            .filter(|(_, &v)| v > 0)
            .map(|((i, j, k), &v)| ([i, j, k], v))
    }

    /// Float copy of the grid as consumed by the classifier
    pub fn to_f32(&self) -> Array3<f32> {
        self.cells.mapv(|v| v as f32)
    }
}
