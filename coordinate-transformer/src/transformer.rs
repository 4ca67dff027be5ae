use std::path::{Path, PathBuf};

use corridor_core::crs::EpsgCode;
use proj_sys_transformer::{describe_epsg, CrsDescription, ProjTransformer};

use crate::error::TransformError;

/// Planar coordinate transformation between two CRS.
pub trait CoordinateTransform {
    fn transform_xy_in_place(
        &mut self,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), TransformError>;

    fn is_identity(&self) -> bool {
        false
    }

    fn transform_coord(&mut self, coord: [f64; 2]) -> Result<[f64; 2], TransformError> {
        let mut xs = [coord[0]];
        let mut ys = [coord[1]];
        self.transform_xy_in_place(&mut xs, &mut ys)?;
        Ok([xs[0], ys[0]])
    }
}

/// Creates transformations on demand, one per (source, target) pair.
pub trait TransformerFactory {
    fn create(
        &self,
        source: EpsgCode,
        target: EpsgCode,
    ) -> Result<Box<dyn CoordinateTransform>, TransformError>;

    /// Name, kind and WKT of `epsg`, when the backend knows them.
    fn describe(&self, _epsg: EpsgCode) -> Option<CrsDescription> {
        None
    }
}

pub enum PointTransformer {
    Identity,
    Proj(ProjTransformer),
}

impl PointTransformer {
    pub fn new(
        input_epsg: EpsgCode,
        output_epsg: EpsgCode,
        proj_data_dir: Option<&Path>,
    ) -> Result<Self, TransformError> {
        if input_epsg == output_epsg {
            return Ok(Self::Identity);
        }

        Ok(Self::Proj(ProjTransformer::new_epsg(
            input_epsg,
            output_epsg,
            proj_data_dir,
        )?))
    }
}

impl CoordinateTransform for PointTransformer {
    fn transform_xy_in_place(
        &mut self,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), TransformError> {
        if xs.len() != ys.len() {
            return Err(TransformError::LengthMismatch(xs.len(), ys.len()));
        }
        match self {
            Self::Identity => Ok(()),
            Self::Proj(t) => t
                .transform_xy_in_place(xs, ys)
                .map_err(TransformError::from),
        }
    }

    fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

/// Builds PROJ-backed transformers, searching `proj_data_dir` for grids and
/// the database when given.
#[derive(Debug, Clone, Default)]
pub struct ProjTransformerFactory {
    proj_data_dir: Option<PathBuf>,
}

impl ProjTransformerFactory {
    pub fn new(proj_data_dir: Option<PathBuf>) -> Self {
        Self { proj_data_dir }
    }

    pub fn proj_data_dir(&self) -> Option<&Path> {
        self.proj_data_dir.as_deref()
    }
}

impl TransformerFactory for ProjTransformerFactory {
    fn create(
        &self,
        source: EpsgCode,
        target: EpsgCode,
    ) -> Result<Box<dyn CoordinateTransform>, TransformError> {
        Ok(Box::new(PointTransformer::new(
            source,
            target,
            self.proj_data_dir(),
        )?))
    }

    fn describe(&self, epsg: EpsgCode) -> Option<CrsDescription> {
        describe_epsg(epsg, self.proj_data_dir())
            .inspect_err(|e| log::warn!("Could not look up EPSG:{} in PROJ: {}", epsg, e))
            .ok()
    }
}
