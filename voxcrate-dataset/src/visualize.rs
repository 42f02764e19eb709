//! Visualization hook for built samples

use tracing::info;
use voxcrate_core::{Result, SampleRecord, VoxelGrid};

/// Receives each grid the dataset builder persists when visualization is on
pub trait Visualizer: Send + Sync {
    fn show(&self, record: &SampleRecord, grid: &VoxelGrid) -> Result<()>;
}

/// Shading ramp from empty to the top of the grid
const SHADES: &[u8] = b" .:-=+*#%@";

/// Top-down text rendering of a grid
///
/// Each character is one `(x, y)` column; its shade encodes the highest
/// occupied `z` in that column. Rows are printed with `y` increasing upwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionVisualizer;

impl ProjectionVisualizer {
    pub fn new() -> Self {
        Self
    }

    /// Render the max-height projection, one line per `y`
    pub fn render(&self, grid: &VoxelGrid) -> String {
        let resolution = grid.resolution();
        let mut heights = vec![None; resolution * resolution];
        for ([x, y, z], _) in grid.occupied_cells() {
            let top = &mut heights[y * resolution + x];
            *top = Some(top.map_or(z, |h: usize| h.max(z)));
        }

        let mut out = String::with_capacity(resolution * (resolution + 1));
        for y in (0..resolution).rev() {
            for x in 0..resolution {
                let shade = match heights[y * resolution + x] {
                    None => SHADES[0],
                    Some(z) => {
                        let level = 1 + z * (SHADES.len() - 2) / resolution.saturating_sub(1).max(1);
                        SHADES[level.min(SHADES.len() - 1)]
                    }
                };
                out.push(shade as char);
            }
            out.push('\n');
        }
        out
    }
}

impl Visualizer for ProjectionVisualizer {
    fn show(&self, record: &SampleRecord, grid: &VoxelGrid) -> Result<()> {
        info!(
            "{} sample {} ({}), {} occupied cells\n{}",
            record.source_name,
            record.sample_index,
            record.label,
            grid.occupied_count(),
            self.render(grid)
        );
        Ok(())
    }
}
