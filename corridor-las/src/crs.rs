//! Coordinate reference system metadata stored in LAS variable length records.
//!
//! Two encodings are understood: the GeoTIFF key directory used by LAS 1.0-1.4
//! and the OGC WKT record that LAS 1.4 prefers. Only EPSG-coded systems are
//! recognized; anything else reads as "no CRS". Reading goes through the
//! `las` header accessors; the GeoTIFF directory for output is built here.

use corridor_core::crs::{EpsgCode, EPSG_USER_DEFINED};
use las::{crs::GeoTiffCrs, Header, Vlr};

pub const PROJECTION_USER_ID: &str = "LASF_Projection";
pub const GEO_KEY_DIRECTORY_RECORD_ID: u16 = 34735;
pub const OGC_WKT_RECORD_ID: u16 = 2112;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Projected,
    Geographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoKeyEntry {
    pub key_id: u16,
    pub tiff_tag_location: u16,
    pub count: u16,
    pub value_offset: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoKeyDirectory {
    pub entries: Vec<GeoKeyEntry>,
}

impl GeoKeyDirectory {
    pub fn for_epsg(epsg: EpsgCode, model: ModelType) -> Self {
        let (model_type, crs_key) = match model {
            ModelType::Projected => (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY),
            ModelType::Geographic => (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY),
        };
        let inline = |key_id, value_offset| GeoKeyEntry {
            key_id,
            tiff_tag_location: 0,
            count: 1,
            value_offset,
        };
        Self {
            entries: vec![
                inline(GT_MODEL_TYPE_KEY, model_type),
                inline(GT_RASTER_TYPE_KEY, RASTER_PIXEL_IS_AREA),
                inline(crs_key, epsg),
            ],
        }
    }

    pub fn to_vlr(&self) -> Vlr {
        let mut words = vec![1, 1, 0, self.entries.len() as u16];
        for e in &self.entries {
            words.extend([e.key_id, e.tiff_tag_location, e.count, e.value_offset]);
        }
        Vlr {
            user_id: PROJECTION_USER_ID.to_string(),
            record_id: GEO_KEY_DIRECTORY_RECORD_ID,
            description: "GeoTiff GeoKeyDirectoryTag".to_string(),
            data: words.iter().flat_map(|w| w.to_le_bytes()).collect(),
        }
    }
}

fn is_epsg_code(code: &u16) -> bool {
    *code != 0 && *code != EPSG_USER_DEFINED
}

/// The projected CRS code if present, else the geographic one.
fn geo_keys_epsg(crs: &GeoTiffCrs) -> Option<EpsgCode> {
    crs.get_projected_crs_geo_key_value()
        .filter(is_epsg_code)
        .or_else(|| crs.get_geodetic_crs_geo_key_value().filter(is_epsg_code))
}

/// EPSG code of the outermost CRS in a WKT1 or WKT2 string.
pub fn epsg_from_wkt(wkt: &str) -> Option<EpsgCode> {
    ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","]
        .iter()
        .filter_map(|marker| wkt.rfind(marker).map(|pos| pos + marker.len()))
        .max()
        .and_then(|start| {
            let digits: String = wkt[start..]
                .trim_start_matches(|c: char| c == '"' || c.is_whitespace())
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        })
}

pub fn wkt_vlr(wkt: &str) -> Vlr {
    let mut data = wkt.as_bytes().to_vec();
    data.push(0);
    Vlr {
        user_id: PROJECTION_USER_ID.to_string(),
        record_id: OGC_WKT_RECORD_ID,
        description: "OGC Coordinate System WKT".to_string(),
        data,
    }
}

/// Reads the CRS from the header's VLRs and EVLRs. GeoTIFF keys win over WKT.
pub fn read_crs(header: &Header) -> Option<EpsgCode> {
    let from_geo_keys = match header.get_geotiff_crs() {
        Ok(crs) => crs.as_ref().and_then(geo_keys_epsg),
        Err(e) => {
            log::warn!("Ignoring unreadable GeoKey directory: {}", e);
            None
        }
    };

    from_geo_keys.or_else(|| {
        let wkt = String::from_utf8_lossy(header.get_wkt_crs_bytes()?);
        epsg_from_wkt(wkt.trim_end_matches('\0'))
    })
}

/// Records describing `epsg`, to be attached to an output header.
pub fn crs_vlrs(epsg: EpsgCode, model: ModelType, wkt: Option<&str>) -> Vec<Vlr> {
    let mut vlrs = vec![GeoKeyDirectory::for_epsg(epsg, model).to_vlr()];
    if let Some(wkt) = wkt {
        vlrs.push(wkt_vlr(wkt));
    }
    vlrs
}

/// Drops existing CRS records so a new CRS can be attached.
pub fn without_crs_vlrs(vlrs: &[Vlr]) -> Vec<Vlr> {
    vlrs.iter().filter(|vlr| !vlr.is_crs()).cloned().collect()
}
