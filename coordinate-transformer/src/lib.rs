mod error;
mod polygon;
mod transformer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::TransformError;
pub use polygon::{reproject_bounds, reproject_polygon};
pub use transformer::{
    CoordinateTransform, PointTransformer, ProjTransformerFactory, TransformerFactory,
};
