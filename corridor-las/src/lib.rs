pub mod classification;
pub mod crs;
pub mod error;
pub mod file;
pub mod inspect;
pub mod reader;
pub mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::LasError;
pub use file::{CrsSource, PointCloudFile};
pub use reader::{LasChunkReader, PointSource};
pub use writer::{OutputHeader, OutputSink, PointSink};

/// Points per chunk when streaming a file.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;
