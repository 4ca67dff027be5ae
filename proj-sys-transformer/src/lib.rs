use std::{
    ffi::{CStr, CString},
    os::raw::c_char,
    path::Path,
    ptr,
};

use corridor_core::crs::{authority_string, EpsgCode};
use proj_sys as proj;

#[derive(Debug)]
pub struct ProjError {
    pub code: i32,
    pub message: String,
    pub context: &'static str,
}

impl std::fmt::Display for ProjError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PROJ error ({}): {} {}",
            self.context, self.code, self.message
        )
    }
}

impl std::error::Error for ProjError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    Geographic,
    Projected,
    Other,
}

/// What PROJ knows about an EPSG CRS.
#[derive(Debug, Clone)]
pub struct CrsDescription {
    pub epsg: EpsgCode,
    pub name: String,
    pub kind: CrsKind,
    pub wkt: Option<String>,
}

/// Owns a PROJ context. A context must be used by only one thread at a time.
#[derive(Debug)]
struct Context(*mut proj::PJ_CONTEXT);

impl Context {
    fn new(proj_data_dir: Option<&Path>) -> Result<Self, ProjError> {
        let raw = unsafe { proj::proj_context_create() };
        if raw.is_null() {
            return Err(ProjError {
                code: 0,
                message: "proj_context_create() returned NULL".to_string(),
                context: "proj_context_create",
            });
        }
        let ctx = Self(raw);

        // Grid files missing locally are fetched from the CDN and cached.
        unsafe {
            proj::proj_context_set_enable_network(ctx.0, 1);
            proj::proj_grid_cache_set_enable(ctx.0, 1);
        }

        if let Some(dir) = proj_data_dir {
            let search_path = c_string(&dir.to_string_lossy(), "proj_context_set_search_paths")?;
            let paths = [search_path.as_ptr()];
            unsafe {
                proj::proj_context_set_search_paths(ctx.0, paths.len() as i32, paths.as_ptr());
            }
        }
        Ok(ctx)
    }

    /// Wraps a PROJ object, turning NULL into the context's last error.
    fn object(&self, raw: *mut proj::PJ, context: &'static str) -> Result<Object, ProjError> {
        if raw.is_null() {
            let code = unsafe { proj::proj_context_errno(self.0) };
            Err(self.error(code, context))
        } else {
            Ok(Object(raw))
        }
    }

    fn error(&self, code: i32, context: &'static str) -> ProjError {
        let message = unsafe { owned_string(proj::proj_context_errno_string(self.0, code)) }
            .unwrap_or_else(|| "unknown error".to_string());
        ProjError {
            code,
            message,
            context,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { proj::proj_context_destroy(self.0) };
    }
}

/// Owns a PROJ object created within a [`Context`].
#[derive(Debug)]
struct Object(*mut proj::PJ);

impl Drop for Object {
    fn drop(&mut self) {
        unsafe { proj::proj_destroy(self.0) };
    }
}

/// Transforms planar coordinates between two CRS. Axis order is normalized
/// to x/easting first, y/northing second for every CRS.
#[derive(Debug)]
pub struct ProjTransformer {
    // declared first so it is destroyed before its context
    operation: Object,
    ctx: Context,
}

impl ProjTransformer {
    pub fn new_epsg(
        input_epsg: EpsgCode,
        output_epsg: EpsgCode,
        proj_data_dir: Option<&Path>,
    ) -> Result<Self, ProjError> {
        Self::new(
            &authority_string(input_epsg),
            &authority_string(output_epsg),
            proj_data_dir,
        )
    }

    pub fn new(source: &str, target: &str, proj_data_dir: Option<&Path>) -> Result<Self, ProjError> {
        let ctx = Context::new(proj_data_dir)?;
        let source = c_string(source, "proj_create_crs_to_crs")?;
        let target = c_string(target, "proj_create_crs_to_crs")?;

        let raw = unsafe {
            proj::proj_create_crs_to_crs(ctx.0, source.as_ptr(), target.as_ptr(), ptr::null_mut())
        };
        let operation = ctx.object(raw, "proj_create_crs_to_crs")?;

        // EPSG:4326 and friends are lat,lon by definition.
        let raw = unsafe { proj::proj_normalize_for_visualization(ctx.0, operation.0) };
        let operation = ctx.object(raw, "proj_normalize_for_visualization")?;

        Ok(Self { operation, ctx })
    }

    /// Transforms `xs[i], ys[i]` pairs in place. Heights are not involved.
    pub fn transform_xy_in_place(
        &mut self,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> Result<(), ProjError> {
        if xs.len() != ys.len() {
            return Err(ProjError {
                code: 0,
                message: format!("{} x values but {} y values", xs.len(), ys.len()),
                context: "proj_trans_generic",
            });
        }
        let n = xs.len();
        if n == 0 {
            return Ok(());
        }
        let stride = std::mem::size_of::<f64>();

        let pj = self.operation.0;
        let code = unsafe {
            proj::proj_errno_reset(pj);
            proj::proj_trans_generic(
                pj,
                proj::PJ_DIRECTION_PJ_FWD,
                xs.as_mut_ptr(),
                stride,
                n,
                ys.as_mut_ptr(),
                stride,
                n,
                ptr::null_mut(),
                0,
                0,
                ptr::null_mut(),
                0,
                0,
            );
            proj::proj_errno(pj)
        };
        if code != 0 {
            return Err(self.ctx.error(code, "proj_trans_generic"));
        }

        // failed coordinates come back as HUGE_VAL without setting errno
        match xs.iter().zip(ys.iter()).position(|(x, y)| !x.is_finite() || !y.is_finite()) {
            Some(i) => Err(ProjError {
                code: 0,
                message: format!("coordinate {i} could not be transformed"),
                context: "proj_trans_generic",
            }),
            None => Ok(()),
        }
    }
}

/// Looks up an EPSG CRS in the PROJ database.
pub fn describe_epsg(
    epsg: EpsgCode,
    proj_data_dir: Option<&Path>,
) -> Result<CrsDescription, ProjError> {
    let ctx = Context::new(proj_data_dir)?;
    let definition = c_string(&authority_string(epsg), "proj_create")?;
    let crs = ctx.object(
        unsafe { proj::proj_create(ctx.0, definition.as_ptr()) },
        "proj_create",
    )?;

    let kind = match unsafe { proj::proj_get_type(crs.0) } {
        proj::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_2D_CRS | proj::PJ_TYPE_PJ_TYPE_GEOGRAPHIC_3D_CRS => {
            CrsKind::Geographic
        }
        proj::PJ_TYPE_PJ_TYPE_PROJECTED_CRS => CrsKind::Projected,
        _ => CrsKind::Other,
    };
    let name = unsafe { owned_string(proj::proj_get_name(crs.0)) }.unwrap_or_default();
    let wkt = unsafe {
        owned_string(proj::proj_as_wkt(
            ctx.0,
            crs.0,
            proj::PJ_WKT_TYPE_PJ_WKT1_GDAL,
            ptr::null(),
        ))
    };

    Ok(CrsDescription {
        epsg,
        name,
        kind,
        wkt,
    })
}

fn c_string(value: &str, context: &'static str) -> Result<CString, ProjError> {
    CString::new(value).map_err(|_| ProjError {
        code: 0,
        message: format!("{value:?} contains NUL byte"),
        context,
    })
}

unsafe fn owned_string(c_str: *const c_char) -> Option<String> {
    if c_str.is_null() {
        return None;
    }
    Some(CStr::from_ptr(c_str).to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "needs a PROJ database"]
    fn utm32_to_wgs84() {
        let mut transformer = ProjTransformer::new_epsg(25832, 4326, None).unwrap();
        let mut xs = [500_000.0];
        let mut ys = [0.0];
        transformer.transform_xy_in_place(&mut xs, &mut ys).unwrap();
        // central meridian of zone 32 on the equator
        assert!((xs[0] - 9.0).abs() < 1e-9);
        assert!(ys[0].abs() < 1e-9);
    }

    #[test]
    #[ignore = "needs a PROJ database"]
    fn describes_projected_and_geographic() {
        let utm = describe_epsg(25832, None).unwrap();
        assert_eq!(utm.kind, CrsKind::Projected);
        assert!(utm.wkt.unwrap().contains("UTM"));
        assert_eq!(describe_epsg(4326, None).unwrap().kind, CrsKind::Geographic);
    }
}
