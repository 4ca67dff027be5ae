//! Human-readable summary of a LAS/LAZ file.

use std::{collections::BTreeMap, fmt, path::Path};

use crate::{
    classification::classification_name,
    error::LasError,
    file::PointCloudFile,
    reader::{LasChunkReader, PointSource},
};

#[derive(Debug, Clone)]
pub struct ClassCount {
    pub code: u8,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct InspectionReport {
    pub file: PointCloudFile,
    pub file_size: u64,
    pub class_counts: Vec<ClassCount>,
    pub points_read: u64,
}

impl InspectionReport {
    /// Points per square unit of the horizontal bounding box.
    pub fn density(&self) -> Option<f64> {
        let area = self.file.planar_bounds().area();
        (area > 0.0).then(|| self.file.point_count as f64 / area)
    }
}

/// Reads the header and streams every point once to count classifications.
pub fn inspect(path: impl AsRef<Path>, chunk_size: usize) -> Result<InspectionReport, LasError> {
    let path = path.as_ref();
    let file_size = std::fs::metadata(path)?.len();
    let mut reader = LasChunkReader::open(path)?;
    let file = reader.file();

    let mut counts: BTreeMap<u8, u64> = BTreeMap::new();
    let mut points_read = 0;
    while let Some(chunk) = reader.next_chunk(chunk_size.max(1))? {
        points_read += chunk.len() as u64;
        for point in &chunk {
            *counts.entry(u8::from(point.classification)).or_default() += 1;
        }
    }

    Ok(InspectionReport {
        file,
        file_size,
        class_counts: counts
            .into_iter()
            .map(|(code, count)| ClassCount { code, count })
            .collect(),
        points_read,
    })
}

impl fmt::Display for InspectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = &self.file;
        writeln!(f, "File: {}", file.path.display())?;
        writeln!(
            f,
            "  Size: {:.2} MB",
            self.file_size as f64 / (1024.0 * 1024.0)
        )?;
        writeln!(
            f,
            "  LAS version: {}.{}",
            file.version.major, file.version.minor
        )?;
        match file.point_format.to_u8() {
            Ok(id) => writeln!(f, "  Point format: {id}")?,
            Err(_) => writeln!(f, "  Point format: unknown")?,
        }
        writeln!(f, "  Points: {}", file.point_count)?;
        match file.crs {
            Some(epsg) => writeln!(f, "  CRS: EPSG:{epsg}")?,
            None => writeln!(f, "  CRS: not defined")?,
        }

        let (min, max) = (&file.bounds.min, &file.bounds.max);
        writeln!(f, "  X range: {:.3} .. {:.3}", min.x, max.x)?;
        writeln!(f, "  Y range: {:.3} .. {:.3}", min.y, max.y)?;
        writeln!(f, "  Z range: {:.3} .. {:.3}", min.z, max.z)?;

        let t = &file.transforms;
        writeln!(f, "  Scale: {} {} {}", t.x.scale, t.y.scale, t.z.scale)?;
        writeln!(f, "  Offset: {} {} {}", t.x.offset, t.y.offset, t.z.offset)?;

        if let Some(density) = self.density() {
            writeln!(f, "  Density: {density:.2} points/unit²")?;
        }

        writeln!(f, "  Classifications:")?;
        for class in &self.class_counts {
            let percent = if self.points_read > 0 {
                class.count as f64 * 100.0 / self.points_read as f64
            } else {
                0.0
            };
            writeln!(
                f,
                "    {:>3} {:<28} {:>12} ({:.2}%)",
                class.code,
                classification_name(class.code),
                class.count,
                percent
            )?;
        }
        Ok(())
    }
}
