//! LAS fixtures and in-memory sources/sinks for tests.

use std::{collections::VecDeque, path::Path};

use corridor_core::crs::EpsgCode;
use las::{point::Classification, point::Format, Builder, Point, Transform, Vector, Writer};

use crate::{
    crs::{crs_vlrs, ModelType},
    error::LasError,
    reader::PointSource,
    writer::{conform_point, PointSink},
};

pub fn las_point(x: f64, y: f64, z: f64, class: u8) -> Point {
    Point {
        x,
        y,
        z,
        classification: Classification::new(class).unwrap(),
        ..Default::default()
    }
}

/// Writes a LAS 1.2 point format 1 file with millimetre scale, optionally
/// tagged with a projected CRS.
pub fn write_las(path: &Path, points: &[Point], crs: Option<EpsgCode>) {
    let mut builder = Builder::from((1, 2));
    builder.point_format = Format::new(1).unwrap();
    let transform = Transform {
        scale: 0.001,
        offset: 0.0,
    };
    builder.transforms = Vector {
        x: transform,
        y: transform,
        z: transform,
    };
    if let Some(epsg) = crs {
        builder.vlrs = crs_vlrs(epsg, ModelType::Projected, None);
    }
    let header = builder.into_header().unwrap();
    let format = *header.point_format();

    let mut writer = Writer::from_path(path, header).unwrap();
    for point in points {
        writer
            .write_point(conform_point(point.clone(), &format))
            .unwrap();
    }
    writer.close().unwrap();
}

#[derive(Debug, Default)]
pub struct MemorySource {
    points: VecDeque<Point>,
    pub chunks_served: usize,
}

impl MemorySource {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points: points.into(),
            chunks_served: 0,
        }
    }
}

impl PointSource for MemorySource {
    fn next_chunk(&mut self, max: usize) -> Result<Option<Vec<Point>>, LasError> {
        if self.points.is_empty() || max == 0 {
            return Ok(None);
        }
        let n = max.min(self.points.len());
        self.chunks_served += 1;
        Ok(Some(self.points.drain(..n).collect()))
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub points: Vec<Point>,
    pub fail_after: Option<usize>,
}

impl MemorySink {
    /// A sink that errors once it holds `n` points.
    pub fn failing_after(n: usize) -> Self {
        Self {
            points: Vec::new(),
            fail_after: Some(n),
        }
    }
}

impl PointSink for MemorySink {
    fn write_points(&mut self, points: Vec<Point>) -> Result<u64, LasError> {
        if let Some(limit) = self.fail_after {
            if self.points.len() + points.len() > limit {
                return Err(LasError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
        }
        let count = points.len() as u64;
        self.points.extend(points);
        Ok(count)
    }
}
