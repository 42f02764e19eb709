//! Core traits for voxcrate

use crate::{bounds::Bounds, point::*, point_cloud::*, transform::Transform3D};

/// Trait for objects with an axis-aligned extent
pub trait Bounded {
    /// Bounds over all finite points, `None` for an empty object
    fn bounds(&self) -> Option<Bounds>;

    /// Center of the bounds
    fn center(&self) -> Option<Point3f> {
        self.bounds().map(|b| b.center())
    }
}

/// Point types whose position can be replaced while keeping other attributes
pub trait Repositionable: Positioned {
    fn with_position(&self, position: Point3f) -> Self;
}

impl Repositionable for Point3f {
    fn with_position(&self, position: Point3f) -> Self {
        position
    }
}

impl Repositionable for IntensityPoint3f {
    fn with_position(&self, position: Point3f) -> Self {
        Self {
            position,
            intensity: self.intensity,
        }
    }
}

/// Trait for objects that can be transformed
pub trait Transformable {
    /// Return a transformed copy of the object
    fn transformed(&self, transform: &Transform3D) -> Self;
}

impl<T: Positioned> Bounded for PointCloud<T> {
    fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.positions())
    }
}

impl<T: Repositionable> Transformable for PointCloud<T> {
    fn transformed(&self, transform: &Transform3D) -> Self {
        self.points
            .iter()
            .map(|p| p.with_position(transform.transform_point(&p.position())))
            .collect()
    }
}
