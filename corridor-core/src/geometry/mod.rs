use thiserror::Error;

pub mod bounds;
pub mod corridor;
pub mod polygon;

pub use bounds::PlanarBounds;
pub use corridor::{build_corridor, CorridorSpec};
pub use polygon::Polygon;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("corridor half-width must be a positive number, got {0}")]
    NonPositiveHalfWidth(f64),

    #[error("corridor start and end points coincide at ({0}, {1})")]
    DegenerateSegment(f64, f64),

    #[error("coordinate value is not finite: {0}")]
    NonFinite(f64),

    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    #[error("polygon is not simple (zero area or self-intersecting)")]
    NotSimple,
}
