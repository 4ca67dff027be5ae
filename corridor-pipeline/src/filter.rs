use std::time::Instant;

use coordinate_transformer::CoordinateTransform;
use corridor_core::{
    cancel::CancellationToken,
    geometry::{PlanarBounds, Polygon},
    progress::{PercentTracker, ProgressEvent, ProgressObserver},
    sampling::DownsampleStride,
    stats::FileStats,
};
use corridor_las::{PointSink, PointSource};
use las::Point;
use rayon::prelude::*;

use crate::error::PipelineError;

const PROGRESS_INTERVAL: u8 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Completed(FileStats),
    Cancelled,
}

/// Position of the file being filtered within the run, for progress reports.
#[derive(Debug, Clone, Copy)]
pub struct FilePosition {
    pub index: usize,
    pub total: usize,
}

/// Streams one file through the corridor test into a sink.
///
/// The corridor must already be expressed in the file's CRS; `transform` takes
/// surviving points from the file's CRS to the output CRS.
pub struct ChunkFilter<'a> {
    corridor: &'a Polygon,
    chunk_size: usize,
    stride: DownsampleStride,
    cancel: &'a CancellationToken,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ChunkFilter<'a> {
    pub fn new(
        corridor: &'a Polygon,
        chunk_size: usize,
        stride: DownsampleStride,
        cancel: &'a CancellationToken,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            corridor,
            chunk_size: chunk_size.max(1),
            stride,
            cancel,
            observer,
        }
    }

    pub fn process(
        &self,
        source: &mut dyn PointSource,
        sink: &mut dyn PointSink,
        transform: &mut dyn CoordinateTransform,
        mut stats: FileStats,
        position: FilePosition,
    ) -> Result<FilterOutcome, PipelineError> {
        let started = Instant::now();
        let mut sampler = self.stride.sampler();
        let mut tracker = PercentTracker::new(PROGRESS_INTERVAL);

        loop {
            if self.cancel.is_cancelled() {
                log::info!("{}: cancelled", stats.file_name);
                return Ok(FilterOutcome::Cancelled);
            }
            let Some(chunk) = source.next_chunk(self.chunk_size)? else {
                break;
            };
            stats.points_scanned += chunk.len() as u64;

            let mask = containment_mask(self.corridor, &chunk, |p: &Point| [p.x, p.y]);
            let inside: Vec<Point> = chunk
                .into_iter()
                .zip(mask)
                .filter_map(|(point, keep)| keep.then_some(point))
                .collect();

            if !inside.is_empty() {
                stats.points_in_corridor += inside.len() as u64;
                let mut kept = sampler.retain(inside);
                if !kept.is_empty() {
                    reproject_points(&mut kept, transform)?;
                    stats.points_written += sink.write_points(kept)?;
                }
            }

            if let Some(percent) = tracker.update(stats.points_scanned, stats.total_points) {
                log::info!(
                    "{}: {}% ({} points scanned, {} in corridor, {} written)",
                    stats.file_name,
                    percent,
                    stats.points_scanned,
                    stats.points_in_corridor,
                    stats.points_written
                );
                self.observer.notify(ProgressEvent::FileProgress {
                    index: position.index,
                    total: position.total,
                    name: stats.file_name.clone(),
                    percent,
                });
            }
        }

        stats.finish(started.elapsed());
        Ok(FilterOutcome::Completed(stats))
    }
}

/// Whether each item lies strictly inside `corridor`. A bounding box test runs
/// over every item in parallel; only the survivors get the exact test.
pub fn containment_mask<P, F>(corridor: &Polygon, items: &[P], xy: F) -> Vec<bool>
where
    P: Sync,
    F: Fn(&P) -> [f64; 2] + Sync,
{
    let bounds: PlanarBounds = corridor.bounds();
    let candidates: Vec<usize> = items
        .par_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let [x, y] = xy(item);
            bounds.contains(x, y).then_some(i)
        })
        .collect();

    let inside: Vec<usize> = candidates
        .into_par_iter()
        .filter(|&i| {
            let [x, y] = xy(&items[i]);
            corridor.contains(x, y)
        })
        .collect();

    let mut mask = vec![false; items.len()];
    for i in inside {
        mask[i] = true;
    }
    mask
}

fn reproject_points(
    points: &mut [Point],
    transform: &mut dyn CoordinateTransform,
) -> Result<(), PipelineError> {
    if transform.is_identity() {
        return Ok(());
    }
    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = points.iter().map(|p| (p.x, p.y)).unzip();
    transform.transform_xy_in_place(&mut xs, &mut ys)?;
    for ((point, x), y) in points.iter_mut().zip(xs).zip(ys) {
        point.x = x;
        point.y = y;
    }
    Ok(())
}
