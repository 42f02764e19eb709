//! Axis-aligned bounds of a point cloud

use crate::point::{is_finite_point, Point3f, Vector3f};
use serde::{Deserialize, Serialize};

/// Axis-aligned min/max extents of a set of points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3f,
    pub max: Point3f,
}

impl Bounds {
    /// Bounds of a single point
    pub fn from_point(point: Point3f) -> Self {
        Self { min: point, max: point }
    }

    /// Compute bounds over all finite points, `None` when there are none
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3f>,
    {
        let mut bounds: Option<Bounds> = None;
        for point in points.into_iter().filter(is_finite_point) {
            match bounds.as_mut() {
                Some(b) => b.update(&point),
                None => bounds = Some(Bounds::from_point(point)),
            }
        }
        bounds
    }

    /// Grow the bounds to include `point`
    pub fn update(&mut self, point: &Point3f) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);

        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Per-axis size
    pub fn extent(&self) -> Vector3f {
        self.max - self.min
    }

    /// Largest per-axis size
    pub fn max_extent(&self) -> f32 {
        self.extent().max()
    }

    pub fn center(&self) -> Point3f {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn contains(&self, point: &Point3f) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }
}
