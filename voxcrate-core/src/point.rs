//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A point carrying the per-return intensity (reflectance) recorded by the sensor
///
/// Intensity rides along with the point through loading and filtering but is
/// never consulted when computing occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct IntensityPoint3f {
    pub position: Point3f,
    pub intensity: f32,
}

impl IntensityPoint3f {
    pub fn new(position: Point3f, intensity: f32) -> Self {
        Self { position, intensity }
    }
}

impl Default for IntensityPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            intensity: 0.0,
        }
    }
}

impl From<IntensityPoint3f> for Point3f {
    fn from(point: IntensityPoint3f) -> Self {
        point.position
    }
}

/// Anything that has a position in 3D space
pub trait Positioned {
    fn position(&self) -> Point3f;

    /// Total order over the non-positional attributes, used to break ties
    /// between points at the same position
    fn cmp_attributes(&self, _other: &Self) -> std::cmp::Ordering
    where
        Self: Sized,
    {
        std::cmp::Ordering::Equal
    }
}

impl Positioned for Point3f {
    fn position(&self) -> Point3f {
        *self
    }
}

impl Positioned for IntensityPoint3f {
    fn position(&self) -> Point3f {
        self.position
    }

    fn cmp_attributes(&self, other: &Self) -> std::cmp::Ordering {
        self.intensity.total_cmp(&other.intensity)
    }
}

/// Whether all three coordinates are finite
pub fn is_finite_point(point: &Point3f) -> bool {
    point.x.is_finite() && point.y.is_finite() && point.z.is_finite()
}
