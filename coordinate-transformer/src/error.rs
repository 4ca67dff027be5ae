use corridor_core::{crs::EpsgCode, geometry::GeometryError};
use proj_sys_transformer::ProjError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Proj(#[from] ProjError),

    #[error("no transformation from EPSG:{source_crs} to EPSG:{target}")]
    Unsupported {
        source_crs: EpsgCode,
        target: EpsgCode,
    },

    #[error("got {0} x values but {1} y values")]
    LengthMismatch(usize, usize),

    #[error("polygon reprojected from EPSG:{source_crs} to EPSG:{target} is not valid: {inner}")]
    InvalidPolygon {
        source_crs: EpsgCode,
        target: EpsgCode,
        inner: GeometryError,
    },
}
