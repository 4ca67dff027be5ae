use corridor_core::{
    crs::EpsgCode,
    geometry::{GeometryError, PlanarBounds, Polygon},
};

use crate::{
    error::TransformError,
    transformer::{CoordinateTransform, TransformerFactory},
};

/// Re-expresses `polygon` in `target`. The input is never modified; equal CRS
/// yield an exact copy. Vertex order is preserved, and a result that is no
/// longer a simple polygon is rejected.
pub fn reproject_polygon(
    polygon: &Polygon,
    source: EpsgCode,
    target: EpsgCode,
    factory: &dyn TransformerFactory,
) -> Result<Polygon, TransformError> {
    if source == target {
        return Ok(polygon.clone());
    }

    let mut transformer = factory.create(source, target)?;
    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) =
        polygon.vertices().iter().map(|v| (v[0], v[1])).unzip();
    transformer.transform_xy_in_place(&mut xs, &mut ys)?;

    let invalid = |inner| TransformError::InvalidPolygon {
        source_crs: source,
        target,
        inner,
    };
    let reprojected =
        Polygon::new(xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect()).map_err(invalid)?;
    if !reprojected.is_simple() {
        return Err(invalid(GeometryError::NotSimple));
    }
    Ok(reprojected)
}

/// Envelope of the four transformed corners of `bounds`. All four corners are
/// needed because the transformation is generally not affine.
pub fn reproject_bounds(
    bounds: &PlanarBounds,
    transformer: &mut dyn CoordinateTransform,
) -> Result<PlanarBounds, TransformError> {
    if transformer.is_identity() {
        return Ok(*bounds);
    }

    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) =
        bounds.corners().iter().map(|c| (c[0], c[1])).unzip();
    transformer.transform_xy_in_place(&mut xs, &mut ys)?;

    Ok(
        PlanarBounds::from_coords(xs.into_iter().zip(ys).map(|(x, y)| [x, y]))
            .unwrap_or(*bounds),
    )
}
