use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use corridor_core::{
    artifact::OutputArtifact,
    cancel::CancellationToken,
    progress::{ExportStage, PercentTracker, ProgressEvent, ProgressObserver},
};
use corridor_las::{
    classification::classification_name, LasChunkReader, LasError, PointSource,
    DEFAULT_CHUNK_SIZE,
};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

const PROGRESS_INTERVAL: u8 = 10;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Las(#[from] LasError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    pub code: u8,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub total_points: u64,
    pub classes: Vec<ClassSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed(ExportSummary),
    Cancelled,
}

/// `corridor.las` becomes `corridor.txt`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("txt")
}

type Buckets = BTreeMap<u8, Vec<[f64; 3]>>;

/// Writes a LAS file as `classification,x,y,z` lines, grouped by ascending
/// classification and sorted by x then y within each group.
///
/// All points are held in memory until the scan completes.
pub struct ClassificationExporter<'a> {
    chunk_size: usize,
    cancel: &'a CancellationToken,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ClassificationExporter<'a> {
    pub fn new(cancel: &'a CancellationToken, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel,
            observer,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn export(&self, input: &Path, output: &Path) -> Result<ExportOutcome, ExportError> {
        log::info!("Exporting {} to {}", input.display(), output.display());
        let mut reader = LasChunkReader::open(input)?;
        let total = reader.remaining();
        self.export_from(&mut reader, total, output)
    }

    /// Same as [`export`](Self::export) for any point source announcing
    /// `total` points.
    pub fn export_from(
        &self,
        source: &mut dyn PointSource,
        total: u64,
        output: &Path,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(mut buckets) = self.collect(source, total)? else {
            log::info!("Export cancelled while reading");
            return Ok(ExportOutcome::Cancelled);
        };

        buckets.par_iter_mut().for_each(|(_, points)| {
            points.par_sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        });

        let artifact = OutputArtifact::new(output);
        let io_error = |source| ExportError::Io {
            path: output.to_path_buf(),
            source,
        };
        let file = File::create(output).map_err(io_error)?;
        let mut writer = BufWriter::new(file);

        let total_points: u64 = buckets.values().map(|b| b.len() as u64).sum();
        let mut tracker = PercentTracker::new(PROGRESS_INTERVAL);
        let mut written = 0;
        for (code, points) in &buckets {
            for [x, y, z] in points {
                if self.cancel.is_cancelled() {
                    log::info!("Export cancelled while writing");
                    return Ok(ExportOutcome::Cancelled);
                }
                writeln!(writer, "{},{:.3},{:.3},{:.3}", code, x, y, z).map_err(io_error)?;
                written += 1;
                if let Some(percent) = tracker.update(written, total_points) {
                    self.observer.notify(ProgressEvent::ExportProgress {
                        stage: ExportStage::Writing,
                        percent,
                    });
                }
            }
        }
        writer.flush().map_err(io_error)?;
        drop(writer);

        let classes: Vec<ClassSummary> = buckets
            .iter()
            .map(|(&code, points)| ClassSummary {
                code,
                name: classification_name(code).into_owned(),
                count: points.len() as u64,
            })
            .collect();
        log_summary(&classes, total_points);

        Ok(ExportOutcome::Completed(ExportSummary {
            output: artifact.keep(),
            total_points,
            classes,
        }))
    }

    fn collect(
        &self,
        source: &mut dyn PointSource,
        total: u64,
    ) -> Result<Option<Buckets>, ExportError> {
        let mut buckets = Buckets::new();
        let mut tracker = PercentTracker::new(PROGRESS_INTERVAL);
        let mut read = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            let Some(chunk) = source.next_chunk(self.chunk_size)? else {
                break;
            };
            read += chunk.len() as u64;
            for point in chunk {
                buckets
                    .entry(u8::from(point.classification))
                    .or_default()
                    .push([point.x, point.y, point.z]);
            }
            if let Some(percent) = tracker.update(read, total) {
                log::info!("Reading: {}% ({} points)", percent, read);
                self.observer.notify(ProgressEvent::ExportProgress {
                    stage: ExportStage::Reading,
                    percent,
                });
            }
        }
        Ok(Some(buckets))
    }
}

fn log_summary(classes: &[ClassSummary], total: u64) {
    log::info!("Exported {} points in {} classes", total, classes.len());
    for class in classes {
        let percent = if total > 0 {
            class.count as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        log::info!(
            "  class {:>3} {:<28} {:>10} ({:.2}%)",
            class.code,
            class.name,
            class.count,
            percent
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corridor_core::progress::NullObserver;
    use corridor_las::test_utils::{las_point, write_las, MemorySource};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn export(points: Vec<las::Point>, output: &Path) -> ExportOutcome {
        let cancel = CancellationToken::new();
        let total = points.len() as u64;
        ClassificationExporter::new(&cancel, &NullObserver)
            .with_chunk_size(2)
            .export_from(&mut MemorySource::new(points), total, output)
            .unwrap()
    }

    #[test]
    fn groups_by_class_and_sorts_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let points = vec![
            las_point(5.0, 1.0, 0.5, 6),
            las_point(2.0, 9.0, 1.25, 2),
            las_point(2.0, 3.0, 7.0, 2),
            las_point(-1.0, 0.0, 0.0, 6),
            las_point(10.5, 0.0, 2.0, 1),
        ];
        let ExportOutcome::Completed(summary) = export(points, &output) else {
            panic!("expected completion");
        };

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            text,
            "1,10.500,0.000,2.000\n\
             2,2.000,3.000,7.000\n\
             2,2.000,9.000,1.250\n\
             6,-1.000,0.000,0.000\n\
             6,5.000,1.000,0.500\n"
        );
        assert_eq!(summary.total_points, 5);
        let counts: Vec<(u8, u64)> = summary
            .classes
            .iter()
            .map(|c| (c.code, c.count))
            .collect();
        assert_eq!(counts, vec![(1, 1), (2, 2), (6, 2)]);
        assert_eq!(summary.classes[1].name, "Ground");
    }

    #[test]
    fn equal_positions_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let points = vec![
            las_point(1.0, 1.0, 3.0, 2),
            las_point(1.0, 1.0, 1.0, 2),
            las_point(1.0, 1.0, 2.0, 2),
        ];
        export(points, &output);
        let zs: Vec<String> = std::fs::read_to_string(&output)
            .unwrap()
            .lines()
            .map(|l| l.rsplit(',').next().unwrap().to_string())
            .collect();
        assert_eq!(zs, vec!["3.000", "1.000", "2.000"]);
    }

    #[test]
    fn output_is_a_sorted_permutation_of_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut rng = StdRng::seed_from_u64(7);
        let cancel = CancellationToken::new();

        for _ in 0..5 {
            // quarter steps in a small range give plenty of equal coordinates
            let points: Vec<_> = (0..rng.gen_range(200..400))
                .map(|_| {
                    las_point(
                        rng.gen_range(-40..40) as f64 / 4.0,
                        rng.gen_range(-40..40) as f64 / 4.0,
                        rng.gen_range(-1000..1000) as f64 / 8.0,
                        [1, 2, 2, 6, 9][rng.gen_range(0..5)],
                    )
                })
                .collect();
            let mut expected: Vec<String> = points
                .iter()
                .map(|p| {
                    format!(
                        "{},{:.3},{:.3},{:.3}",
                        u8::from(p.classification),
                        p.x,
                        p.y,
                        p.z
                    )
                })
                .collect();
            let total = points.len() as u64;

            ClassificationExporter::new(&cancel, &NullObserver)
                .with_chunk_size(rng.gen_range(1..64))
                .export_from(&mut MemorySource::new(points), total, &output)
                .unwrap();

            let text = std::fs::read_to_string(&output).unwrap();
            let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
            let keys: Vec<(u8, f64, f64)> = lines
                .iter()
                .map(|line| {
                    let fields: Vec<&str> = line.split(',').collect();
                    (
                        fields[0].parse().unwrap(),
                        fields[1].parse().unwrap(),
                        fields[2].parse().unwrap(),
                    )
                })
                .collect();
            for pair in keys.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(a.0 <= b.0, "classes out of order: {:?} {:?}", a, b);
                if a.0 == b.0 {
                    assert!((a.1, a.2) <= (b.1, b.2), "not sorted: {:?} {:?}", a, b);
                }
            }

            lines.sort();
            expected.sort();
            assert_eq!(lines, expected);
        }
    }

    #[test]
    fn cancelled_export_removes_the_file() {
        struct CancelWhileWriting<'a>(&'a CancellationToken);
        impl ProgressObserver for CancelWhileWriting<'_> {
            fn notify(&self, event: ProgressEvent) {
                if let ProgressEvent::ExportProgress {
                    stage: ExportStage::Writing,
                    ..
                } = event
                {
                    self.0.cancel();
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let cancel = CancellationToken::new();
        let observer = CancelWhileWriting(&cancel);
        let points: Vec<_> = (0..100).map(|i| las_point(i as f64, 0.0, 0.0, 2)).collect();

        let outcome = ClassificationExporter::new(&cancel, &observer)
            .export_from(&mut MemorySource::new(points), 100, &output)
            .unwrap();
        assert_eq!(outcome, ExportOutcome::Cancelled);
        assert!(!output.exists());
    }

    #[test]
    fn cancelled_before_reading_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = MemorySource::new(vec![las_point(0.0, 0.0, 0.0, 2)]);
        let outcome = ClassificationExporter::new(&cancel, &NullObserver)
            .export_from(&mut source, 1, &output)
            .unwrap();
        assert_eq!(outcome, ExportOutcome::Cancelled);
        assert_eq!(source.chunks_served, 0);
        assert!(!output.exists());
    }

    #[test]
    fn exports_a_las_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("corridor.las");
        write_las(
            &input,
            &[las_point(50.0, 5.0, 1.5, 2), las_point(20.0, 5.0, 1.5, 2)],
            None,
        );
        let output = default_output_path(&input);
        assert_eq!(output, dir.path().join("corridor.txt"));

        let cancel = CancellationToken::new();
        let outcome = ClassificationExporter::new(&cancel, &NullObserver)
            .export(&input, &output)
            .unwrap();
        assert!(matches!(outcome, ExportOutcome::Completed(_)));
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "2,20.000,5.000,1.500\n2,50.000,5.000,1.500\n"
        );
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.las");
        std::fs::write(&input, b"nope").unwrap();
        let output = dir.path().join("broken.txt");
        let cancel = CancellationToken::new();
        let result = ClassificationExporter::new(&cancel, &NullObserver).export(&input, &output);
        assert!(matches!(result, Err(ExportError::Las(_))));
        assert!(!output.exists());
    }
}
