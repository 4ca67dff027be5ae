use std::{
    fmt,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use corridor_core::crs::EpsgCode;
use las::{point::Format, Builder, Color, Point, Transform, Vector, Version, Vlr, Writer};

use crate::{
    crs::{crs_vlrs, without_crs_vlrs, ModelType},
    error::LasError,
    file::PointCloudFile,
};

const GENERATING_SOFTWARE: &str = concat!("corridor-extract ", env!("CARGO_PKG_VERSION"));

/// Receives points that passed the corridor filter.
pub trait PointSink {
    /// Writes all of `points` and returns how many were written.
    fn write_points(&mut self, points: Vec<Point>) -> Result<u64, LasError>;
}

/// Fills or drops optional attributes so `point` can be written with `format`.
pub fn conform_point(mut point: Point, format: &Format) -> Point {
    point.gps_time = match (format.has_gps_time, point.gps_time) {
        (true, time) => Some(time.unwrap_or(0.0)),
        (false, _) => None,
    };
    point.color = match (format.has_color, point.color) {
        (true, color) => Some(color.unwrap_or(Color::new(0, 0, 0))),
        (false, _) => None,
    };
    if format.has_nir {
        point.nir.get_or_insert(0);
    } else {
        point.nir = None;
    }
    if !format.has_waveform {
        point.waveform = None;
    }
    point
        .extra_bytes
        .resize(usize::from(format.extra_bytes), 0);
    point
}

/// Header settings for an output file. Point format, scale and offset come
/// from a template input file, the CRS records from the output CRS.
#[derive(Debug, Clone)]
pub struct OutputHeader {
    version: Version,
    point_format: Format,
    transforms: Vector<Transform>,
    vlrs: Vec<Vlr>,
}

impl OutputHeader {
    /// Starts from `template`, replacing its CRS records by ones for `crs`.
    pub fn from_template(template: &PointCloudFile, crs: EpsgCode) -> Self {
        let mut point_format = template.point_format;
        point_format.is_compressed = false;
        Self {
            version: template.version,
            point_format,
            transforms: template.transforms,
            vlrs: crs_vlrs(crs, ModelType::Projected, None),
        }
    }

    /// Moves the x/y offset, e.g. after reprojecting the template's offset.
    pub fn with_offset_xy(mut self, x: f64, y: f64) -> Self {
        self.transforms.x.offset = x;
        self.transforms.y.offset = y;
        self
    }

    pub fn with_crs_vlrs(mut self, vlrs: Vec<Vlr>) -> Self {
        let mut kept = without_crs_vlrs(&self.vlrs);
        kept.extend(vlrs);
        self.vlrs = kept;
        self
    }

    pub fn point_format(&self) -> &Format {
        &self.point_format
    }

    pub fn transforms(&self) -> &Vector<Transform> {
        &self.transforms
    }

    pub fn vlrs(&self) -> &[Vlr] {
        &self.vlrs
    }

    fn to_las_header(&self, compressed: bool) -> Result<las::Header, LasError> {
        let mut builder = Builder::from(self.version);
        builder.point_format = self.point_format;
        builder.point_format.is_compressed = compressed;
        builder.transforms = self.transforms;
        builder.vlrs = self.vlrs.clone();
        builder.generating_software = GENERATING_SOFTWARE.to_string();
        Ok(builder.into_header()?)
    }
}

fn is_laz(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("laz"))
        .unwrap_or(false)
}

/// The single output file of a run. LAZ compression follows the extension.
pub struct OutputSink {
    path: PathBuf,
    format: Format,
    writer: Option<Writer<BufWriter<File>>>,
    points_written: u64,
}

impl OutputSink {
    pub fn create(path: impl AsRef<Path>, header: &OutputHeader) -> Result<Self, LasError> {
        let path = path.as_ref();
        let las_header = header.to_las_header(is_laz(path))?;
        let format = *las_header.point_format();
        let writer = Writer::from_path(path, las_header).map_err(LasError::file(path))?;
        log::debug!("Opened {} for writing", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            format,
            writer: Some(writer),
            points_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn points_written(&self) -> u64 {
        self.points_written
    }

    /// Finalizes the header and returns the number of points written.
    pub fn close(mut self) -> Result<u64, LasError> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.close().map_err(LasError::file(&self.path))?;
                Ok(self.points_written)
            }
            None => Err(LasError::Closed(self.path.clone())),
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("open", &self.writer.is_some())
            .field("points_written", &self.points_written)
            .finish()
    }
}

impl PointSink for OutputSink {
    /// Points written before a failure stay counted.
    fn write_points(&mut self, points: Vec<Point>) -> Result<u64, LasError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LasError::Closed(self.path.clone()))?;
        let mut count = 0;
        for point in points {
            writer
                .write_point(conform_point(point, &self.format))
                .map_err(LasError::file(&self.path))?;
            count += 1;
            self.points_written += 1;
        }
        Ok(count)
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.close() {
                log::warn!("Failed to close {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crs::read_crs,
        test_utils::{las_point, write_las},
    };
    use las::Reader;

    #[test]
    fn conform_fills_and_drops_attributes() {
        let mut point = las_point(1.0, 2.0, 3.0, 2);
        point.gps_time = Some(5.0);

        let format_3 = Format::new(3).unwrap();
        let conformed = conform_point(point.clone(), &format_3);
        assert_eq!(conformed.gps_time, Some(5.0));
        assert_eq!(conformed.color, Some(Color::new(0, 0, 0)));

        let format_0 = Format::new(0).unwrap();
        let conformed = conform_point(point, &format_0);
        assert_eq!(conformed.gps_time, None);
        assert_eq!(conformed.color, None);
    }

    #[test]
    fn writes_points_with_output_crs() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.las");
        write_las(&template_path, &[las_point(0.0, 0.0, 0.0, 2)], Some(25833));
        let template = PointCloudFile::open(&template_path).unwrap();

        let out = dir.path().join("out.las");
        let header = OutputHeader::from_template(&template, 25832).with_offset_xy(100.0, 200.0);
        let mut sink = OutputSink::create(&out, &header).unwrap();
        assert_eq!(
            sink.write_points(vec![
                las_point(101.0, 201.0, 1.0, 2),
                las_point(102.0, 202.0, 1.0, 6),
            ])
            .unwrap(),
            2
        );
        assert_eq!(sink.close().unwrap(), 2);

        let mut reader = Reader::from_path(&out).unwrap();
        assert_eq!(reader.header().number_of_points(), 2);
        assert_eq!(read_crs(reader.header()), Some(25832));
        assert_eq!(reader.header().transforms().x.offset, 100.0);
        let classes: Vec<u8> = reader
            .points()
            .map(|p| u8::from(p.unwrap().classification))
            .collect();
        assert_eq!(classes, vec![2, 6]);
    }

    #[test]
    fn crs_records_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.las");
        write_las(&template_path, &[las_point(0.0, 0.0, 0.0, 2)], Some(25833));
        let template = PointCloudFile::open(&template_path).unwrap();

        let header = OutputHeader::from_template(&template, 25832)
            .with_crs_vlrs(crs_vlrs(4326, ModelType::Geographic, Some("GEOGCS[]")));
        assert_eq!(header.vlrs().len(), 2);
    }

    #[test]
    fn failed_batch_keeps_the_count_of_written_points() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.las");
        write_las(&template_path, &[las_point(0.0, 0.0, 0.0, 2)], None);
        let template = PointCloudFile::open(&template_path).unwrap();

        let out = dir.path().join("out.las");
        let header = OutputHeader::from_template(&template, 25832);
        let mut sink = OutputSink::create(&out, &header).unwrap();
        // a millimetre scale cannot store x = 1e10 in 32 bits
        let result = sink.write_points(vec![
            las_point(1.0, 1.0, 1.0, 2),
            las_point(2.0, 2.0, 1.0, 2),
            las_point(1e10, 3.0, 1.0, 2),
            las_point(4.0, 4.0, 1.0, 2),
        ]);
        assert!(matches!(result, Err(LasError::File { .. })));
        assert_eq!(sink.points_written(), 2);
        assert!(format!("{:?}", sink).contains("points_written: 2"));
        assert_eq!(sink.close().unwrap(), 2);
    }
}
