use std::path::PathBuf;

use coordinate_transformer::TransformError;
use corridor_core::{geometry::GeometryError, sampling::InvalidStride};
use corridor_las::LasError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid corridor: {0}")]
    InvalidInput(#[from] GeometryError),

    #[error(transparent)]
    InvalidStride(#[from] InvalidStride),

    #[error("chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("no input files given")]
    NoInputFiles,

    #[error("no input file intersects the corridor")]
    NoIntersectingFiles,

    #[error("none of the selected files is available in {0}")]
    NoLocalFiles(PathBuf),

    #[error("all {0} selected files failed")]
    AllFilesFailed(usize),

    #[error("{0} has no CRS and no default CRS was given")]
    MissingCrs(String),

    #[error("could not create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Las(#[from] LasError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}
