use std::f64::consts::FRAC_PI_2;

use serde::Serialize;

use super::{GeometryError, Polygon};
use crate::crs::EpsgCode;

/// A line segment with a half-width, expressed in a single CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorridorSpec {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub half_width: f64,
    pub crs: EpsgCode,
}

impl CorridorSpec {
    pub fn new(
        start: [f64; 2],
        end: [f64; 2],
        half_width: f64,
        crs: EpsgCode,
    ) -> Result<Self, GeometryError> {
        for value in start.iter().chain(end.iter()) {
            if !value.is_finite() {
                return Err(GeometryError::NonFinite(*value));
            }
        }
        check_half_width(half_width)?;
        if start == end {
            return Err(GeometryError::DegenerateSegment(start[0], start[1]));
        }
        Ok(Self {
            start,
            end,
            half_width,
            crs,
        })
    }

    /// Euclidean distance between start and end.
    pub fn length(&self) -> f64 {
        (self.end[0] - self.start[0]).hypot(self.end[1] - self.start[1])
    }

    pub fn width(&self) -> f64 {
        self.half_width * 2.0
    }

    pub fn polygon(&self) -> Result<Polygon, GeometryError> {
        build_corridor(
            self.start[0],
            self.start[1],
            self.end[0],
            self.end[1],
            self.half_width,
        )
    }
}

fn check_half_width(half_width: f64) -> Result<(), GeometryError> {
    if !half_width.is_finite() {
        return Err(GeometryError::NonFinite(half_width));
    }
    if half_width <= 0.0 {
        return Err(GeometryError::NonPositiveHalfWidth(half_width));
    }
    Ok(())
}

/// Builds the rectangle around the segment. Both ends are pushed outward by
/// `half_width` along the segment direction, so the long side measures
/// `length + 2 * half_width` and the short side `2 * half_width`.
pub fn build_corridor(
    x_start: f64,
    y_start: f64,
    x_end: f64,
    y_end: f64,
    half_width: f64,
) -> Result<Polygon, GeometryError> {
    check_half_width(half_width)?;

    let angle = (y_end - y_start).atan2(x_end - x_start);
    let perpendicular = angle + FRAC_PI_2;

    let buffer_x = half_width * perpendicular.cos();
    let buffer_y = half_width * perpendicular.sin();
    let end_buffer_x = half_width * angle.cos();
    let end_buffer_y = half_width * angle.sin();

    Polygon::new(vec![
        [
            x_start - end_buffer_x + buffer_x,
            y_start - end_buffer_y + buffer_y,
        ],
        [
            x_start - end_buffer_x - buffer_x,
            y_start - end_buffer_y - buffer_y,
        ],
        [x_end + end_buffer_x - buffer_x, y_end + end_buffer_y - buffer_y],
        [x_end + end_buffer_x + buffer_x, y_end + end_buffer_y + buffer_y],
    ])
}
