//! Rotation augmentation
//!
//! Each source cloud can be expanded into several samples rotated about the
//! vertical axis. Sample `i` of `steps` is rotated by `2π·i/steps` around the
//! center of the cloud's bounds, so sample 0 is always the untouched input.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use voxcrate_core::{Bounded, Error, PointCloud, Repositionable, Result, Transform3D, Transformable};

/// Number of rotated copies produced per source cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationAugmentation {
    pub steps: usize,
}

impl Default for RotationAugmentation {
    fn default() -> Self {
        Self { steps: 1 }
    }
}

impl RotationAugmentation {
    pub fn new(steps: usize) -> Result<Self> {
        let augmentation = Self { steps };
        augmentation.validate()?;
        Ok(augmentation)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(Error::InvalidConfig(
                "rotation augmentation needs at least one step".to_string(),
            ));
        }
        Ok(())
    }

    /// Rotation angle in radians for a sample index
    pub fn angle(&self, sample_index: usize) -> f32 {
        TAU * sample_index as f32 / self.steps.max(1) as f32
    }

    /// The rotated copy for one sample index
    pub fn sample<T>(&self, cloud: &PointCloud<T>, sample_index: usize) -> PointCloud<T>
    where
        T: Repositionable + Clone,
    {
        if sample_index % self.steps.max(1) == 0 {
            return cloud.clone();
        }
        match cloud.center() {
            Some(pivot) => cloud.transformed(&Transform3D::rotation_z_about(self.angle(sample_index), &pivot)),
            None => cloud.clone(),
        }
    }

    /// Every sample of a cloud as `(sample_index, cloud)` pairs
    pub fn samples<T>(&self, cloud: &PointCloud<T>) -> Vec<(usize, PointCloud<T>)>
    where
        T: Repositionable + Clone,
    {
        (0..self.steps.max(1))
            .map(|index| (index, self.sample(cloud, index)))
            .collect()
    }
}
