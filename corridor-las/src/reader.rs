use std::path::{Path, PathBuf};

use las::{Point, Reader};

use crate::{error::LasError, file::PointCloudFile};

/// A stream of points delivered in bounded chunks.
pub trait PointSource {
    /// Returns at most `max` points, or `None` once the source is exhausted.
    fn next_chunk(&mut self, max: usize) -> Result<Option<Vec<Point>>, LasError>;
}

pub struct LasChunkReader {
    path: PathBuf,
    reader: Reader,
    remaining: u64,
}

impl LasChunkReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LasError> {
        let path = path.as_ref();
        let reader = Reader::from_path(path).map_err(LasError::file(path))?;
        let remaining = reader.header().number_of_points();
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            remaining,
        })
    }

    pub fn file(&self) -> PointCloudFile {
        PointCloudFile::from_header(&self.path, self.reader.header())
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl PointSource for LasChunkReader {
    fn next_chunk(&mut self, max: usize) -> Result<Option<Vec<Point>>, LasError> {
        if self.remaining == 0 || max == 0 {
            return Ok(None);
        }

        let points = self
            .reader
            .points()
            .take(max)
            .collect::<Result<Vec<_>, _>>()
            .map_err(LasError::file(&self.path))?;

        if points.is_empty() {
            if self.remaining > 0 {
                log::warn!(
                    "{}: header announced {} more points than the file holds",
                    self.path.display(),
                    self.remaining
                );
            }
            self.remaining = 0;
            return Ok(None);
        }
        self.remaining = self.remaining.saturating_sub(points.len() as u64);
        Ok(Some(points))
    }
}
