/// EPSG code type alias
pub type EpsgCode = u16;

/// ETRS89 / UTM zone 32N (EPSG:25832), used when no corridor CRS is configured
pub const DEFAULT_CORRIDOR_EPSG: EpsgCode = 25832;

/// WGS84 Geographic 2D (EPSG:4326)
pub const EPSG_WGS84_GEOGRAPHIC_2D: EpsgCode = 4326;

/// EPSG:32767 marks a user-defined CRS in GeoTIFF keys and carries no usable code.
pub const EPSG_USER_DEFINED: EpsgCode = 32767;

pub fn authority_string(epsg: EpsgCode) -> String {
    format!("EPSG:{epsg}")
}
