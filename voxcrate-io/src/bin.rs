//! Flat binary point records
//!
//! A point file is a headerless array of fixed-size records. Each record holds
//! `fields_per_record` scalars of one type and byte order; three of them are
//! the x, y and z coordinates and one may be an intensity value. The Sydney
//! Urban Objects `.bin` files use four little-endian `f32` per record
//! (x, y, z, intensity), which is the default layout.

use crate::mmap::FileBytes;
use crate::PointCloudReader;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use voxcrate_core::{is_finite_point, Error, IntensityPoint3f, Point3f, PointCloud, Positioned, Result};

/// Scalar type of every field in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    #[default]
    F32,
    F64,
}

impl ScalarType {
    /// Size of one field in bytes
    pub fn size(&self) -> usize {
        match self {
            ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }
}

/// Byte order of the scalars in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Description of one fixed-stride record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordLayout {
    pub scalar: ScalarType,
    pub endianness: Endianness,
    /// Stride of one record, counted in fields
    pub fields_per_record: usize,
    pub x_field: usize,
    pub y_field: usize,
    pub z_field: usize,
    pub intensity_field: Option<usize>,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            scalar: ScalarType::F32,
            endianness: Endianness::Little,
            fields_per_record: 4,
            x_field: 0,
            y_field: 1,
            z_field: 2,
            intensity_field: Some(3),
        }
    }
}

impl RecordLayout {
    /// Bare `x y z` records without extra fields
    pub fn xyz() -> Self {
        Self {
            fields_per_record: 3,
            intensity_field: None,
            ..Default::default()
        }
    }

    pub fn with_scalar(mut self, scalar: ScalarType) -> Self {
        self.scalar = scalar;
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_fields_per_record(mut self, fields: usize) -> Self {
        self.fields_per_record = fields;
        self
    }

    pub fn with_coordinate_fields(mut self, x: usize, y: usize, z: usize) -> Self {
        self.x_field = x;
        self.y_field = y;
        self.z_field = z;
        self
    }

    pub fn with_intensity_field(mut self, field: Option<usize>) -> Self {
        self.intensity_field = field;
        self
    }

    /// Size of one record in bytes
    pub fn stride_bytes(&self) -> usize {
        self.fields_per_record * self.scalar.size()
    }

    /// Check that every referenced field lies inside the record
    pub fn validate(&self) -> Result<()> {
        if self.fields_per_record < 3 {
            return Err(Error::InvalidConfig(format!(
                "record must hold at least 3 fields, got {}",
                self.fields_per_record
            )));
        }

        let fields = [
            ("x", Some(self.x_field)),
            ("y", Some(self.y_field)),
            ("z", Some(self.z_field)),
            ("intensity", self.intensity_field),
        ];
        for (name, field) in fields {
            if let Some(field) = field {
                if field >= self.fields_per_record {
                    return Err(Error::InvalidConfig(format!(
                        "{} field {} outside a record of {} fields",
                        name, field, self.fields_per_record
                    )));
                }
            }
        }

        if self.x_field == self.y_field || self.y_field == self.z_field || self.x_field == self.z_field {
            return Err(Error::InvalidConfig(
                "x, y and z must come from distinct fields".to_string(),
            ));
        }

        Ok(())
    }

    fn field(&self, record: &[u8], field: usize) -> f32 {
        let size = self.scalar.size();
        let bytes = &record[field * size..(field + 1) * size];
        match (self.scalar, self.endianness) {
            (ScalarType::F32, Endianness::Little) => LittleEndian::read_f32(bytes),
            (ScalarType::F32, Endianness::Big) => BigEndian::read_f32(bytes),
            (ScalarType::F64, Endianness::Little) => LittleEndian::read_f64(bytes) as f32,
            (ScalarType::F64, Endianness::Big) => BigEndian::read_f64(bytes) as f32,
        }
    }

    fn position(&self, record: &[u8]) -> Point3f {
        Point3f::new(
            self.field(record, self.x_field),
            self.field(record, self.y_field),
            self.field(record, self.z_field),
        )
    }

    /// Split `bytes` into records, failing when the length is not a whole
    /// number of records
    fn records<'a>(&self, bytes: &'a [u8]) -> Result<std::slice::ChunksExact<'a, u8>> {
        let stride = self.stride_bytes();
        if bytes.len() % stride != 0 {
            return Err(Error::MalformedInput(format!(
                "{} bytes is not a multiple of the {}-byte record stride",
                bytes.len(),
                stride
            )));
        }
        Ok(bytes.chunks_exact(stride))
    }
}

/// Point Loader for flat binary point files
#[derive(Debug, Clone)]
pub struct BinPointReader {
    layout: RecordLayout,
}

impl BinPointReader {
    /// Create a reader, rejecting an invalid layout up front
    pub fn new(layout: RecordLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Decode coordinates from an in-memory buffer
    pub fn parse_points(&self, bytes: &[u8]) -> Result<PointCloud<Point3f>> {
        Ok(self
            .layout
            .records(bytes)?
            .map(|record| self.layout.position(record))
            .collect())
    }

    /// Decode coordinates and intensity from an in-memory buffer
    ///
    /// Layouts without an intensity field yield an intensity of 0.
    pub fn parse_points_with_intensity(&self, bytes: &[u8]) -> Result<PointCloud<IntensityPoint3f>> {
        Ok(self
            .layout
            .records(bytes)?
            .map(|record| {
                let intensity = self
                    .layout
                    .intensity_field
                    .map(|field| self.layout.field(record, field))
                    .unwrap_or(0.0);
                IntensityPoint3f::new(self.layout.position(record), intensity)
            })
            .collect())
    }

    /// Read the coordinates of every record in `path`
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn read_points(&self, path: &Path) -> Result<PointCloud<Point3f>> {
        let bytes = FileBytes::open(path)?;
        let cloud = self.parse_points(&bytes)?;
        debug!("Loaded {} points", cloud.len());
        warn_non_finite(&cloud);
        Ok(cloud)
    }

    /// Read coordinates and intensity of every record in `path`
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn read_points_with_intensity(&self, path: &Path) -> Result<PointCloud<IntensityPoint3f>> {
        let bytes = FileBytes::open(path)?;
        let cloud = self.parse_points_with_intensity(&bytes)?;
        debug!("Loaded {} points with intensity", cloud.len());
        warn_non_finite(&cloud);
        Ok(cloud)
    }
}

/// Points with a NaN or infinite coordinate, including `f64` values that
/// overflowed when narrowed to `f32`
pub fn count_non_finite<T: Positioned>(cloud: &PointCloud<T>) -> usize {
    cloud.iter().filter(|p| !is_finite_point(&p.position())).count()
}

fn warn_non_finite<T: Positioned>(cloud: &PointCloud<T>) {
    let bad = count_non_finite(cloud);
    if bad > 0 {
        warn!("{} of {} points have non-finite coordinates and will be dropped", bad, cloud.len());
    }
}

impl Default for BinPointReader {
    fn default() -> Self {
        Self {
            layout: RecordLayout::default(),
        }
    }
}

impl PointCloudReader for BinPointReader {
    fn read_point_cloud(&self, path: &Path) -> Result<PointCloud<Point3f>> {
        self.read_points(path)
    }

    fn format_name(&self) -> &'static str {
        "bin"
    }
}
