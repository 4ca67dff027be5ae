//! A PROJ-free stand-in for exercising CRS-dependent code paths in tests.

use std::collections::HashMap;

use corridor_core::crs::EpsgCode;

use crate::{CoordinateTransform, TransformError, TransformerFactory};

/// Every registered CRS is the same plane shifted by a fixed offset.
/// Transforming from `a` to `b` adds `offset(b) - offset(a)`.
#[derive(Debug, Clone, Default)]
pub struct TranslationFactory {
    offsets: HashMap<EpsgCode, [f64; 2]>,
}

impl TranslationFactory {
    pub fn with_crs(mut self, epsg: EpsgCode, offset: [f64; 2]) -> Self {
        self.offsets.insert(epsg, offset);
        self
    }
}

struct Translation {
    dx: f64,
    dy: f64,
}

impl CoordinateTransform for Translation {
    fn transform_xy_in_place(
        &mut self,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), TransformError> {
        if xs.len() != ys.len() {
            return Err(TransformError::LengthMismatch(xs.len(), ys.len()));
        }
        xs.iter_mut().for_each(|x| *x += self.dx);
        ys.iter_mut().for_each(|y| *y += self.dy);
        Ok(())
    }

    fn is_identity(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

impl TransformerFactory for TranslationFactory {
    fn create(
        &self,
        source: EpsgCode,
        target: EpsgCode,
    ) -> Result<Box<dyn CoordinateTransform>, TransformError> {
        if source == target {
            return Ok(Box::new(Translation { dx: 0.0, dy: 0.0 }));
        }
        let unsupported = TransformError::Unsupported {
            source_crs: source,
            target,
        };
        let (Some(from), Some(to)) = (self.offsets.get(&source), self.offsets.get(&target)) else {
            return Err(unsupported);
        };
        Ok(Box::new(Translation {
            dx: to[0] - from[0],
            dy: to[1] - from[1],
        }))
    }
}
