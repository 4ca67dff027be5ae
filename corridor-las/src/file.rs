use std::{
    fmt,
    path::{Path, PathBuf},
};

use corridor_core::{crs::EpsgCode, geometry::PlanarBounds};
use las::{point::Format, Bounds, Header, Reader, Transform, Vector, Version};

use crate::{crs::read_crs, error::LasError};

/// Where the CRS of a file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsSource {
    Header,
    Default,
}

impl fmt::Display for CrsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Header facts about one LAS/LAZ file. Opening a file reads only its header.
#[derive(Debug, Clone)]
pub struct PointCloudFile {
    pub path: PathBuf,
    pub point_count: u64,
    pub crs: Option<EpsgCode>,
    pub bounds: Bounds,
    pub version: Version,
    pub point_format: Format,
    pub transforms: Vector<Transform>,
}

impl PointCloudFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LasError> {
        let path = path.as_ref();
        let reader = Reader::from_path(path).map_err(LasError::file(path))?;
        Ok(Self::from_header(path, reader.header()))
    }

    pub fn from_header(path: impl Into<PathBuf>, header: &Header) -> Self {
        Self {
            path: path.into(),
            point_count: header.number_of_points(),
            crs: read_crs(header),
            bounds: header.bounds(),
            version: header.version(),
            point_format: *header.point_format(),
            transforms: *header.transforms(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// The horizontal extent from the header.
    pub fn planar_bounds(&self) -> PlanarBounds {
        PlanarBounds::new(
            [self.bounds.min.x, self.bounds.min.y],
            [self.bounds.max.x, self.bounds.max.y],
        )
    }

    /// The file's own CRS, else `default` when given.
    pub fn resolve_crs(&self, default: Option<EpsgCode>) -> Option<(EpsgCode, CrsSource)> {
        match (self.crs, default) {
            (Some(epsg), _) => Some((epsg, CrsSource::Header)),
            (None, Some(epsg)) => Some((epsg, CrsSource::Default)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for PointCloudFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = self
            .point_format
            .to_u8()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "?".to_string());
        let crs = self
            .crs
            .map(|epsg| format!("EPSG:{epsg}"))
            .unwrap_or_else(|| "unknown".to_string());
        write!(
            f,
            "{} (LAS {}.{}, format {}, {} points, CRS {})",
            self.file_name(),
            self.version.major,
            self.version.minor,
            format,
            self.point_count,
            crs
        )
    }
}
