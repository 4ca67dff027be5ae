use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use coordinate_transformer::{reproject_polygon, TransformerFactory};
use corridor_core::{
    artifact::OutputArtifact,
    cancel::CancellationToken,
    crs::EpsgCode,
    geometry::{CorridorSpec, Polygon},
    progress::{ProgressEvent, ProgressObserver},
    sampling::DownsampleStride,
    stats::FileStats,
};
use corridor_las::{
    crs::{crs_vlrs, ModelType},
    CrsSource, LasChunkReader, OutputHeader, OutputSink, PointCloudFile, DEFAULT_CHUNK_SIZE,
};
use proj_sys_transformer::CrsKind;
use serde::Serialize;

use crate::{
    error::PipelineError,
    filter::{ChunkFilter, FilePosition, FilterOutcome},
    selector::select_files,
    sourcing::{reconcile_local, FileFetcher},
};

/// Everything needed to extract one corridor. Values are checked by
/// [`CorridorConfig::validate`] before any file is touched.
#[derive(Debug, Clone)]
pub struct CorridorConfig {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub half_width: f64,
    pub corridor_crs: EpsgCode,
    pub output: PathBuf,
    pub nth_point: usize,
    pub default_crs: Option<EpsgCode>,
    pub chunk_size: usize,
    /// Download-then-process: selected files are copied here and read from here.
    pub local_dir: Option<PathBuf>,
}

impl CorridorConfig {
    pub fn new(
        start: [f64; 2],
        end: [f64; 2],
        half_width: f64,
        corridor_crs: EpsgCode,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            start,
            end,
            half_width,
            corridor_crs,
            output: output.into(),
            nth_point: 1,
            default_crs: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            local_dir: None,
        }
    }

    pub fn validate(&self) -> Result<(CorridorSpec, DownsampleStride), PipelineError> {
        let spec = CorridorSpec::new(self.start, self.end, self.half_width, self.corridor_crs)?;
        let stride = DownsampleStride::new(self.nth_point)?;
        if self.chunk_size == 0 {
            return Err(PipelineError::ZeroChunkSize);
        }
        Ok((spec, stride))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    NoPointsWritten,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub points_scanned: u64,
    pub points_in_corridor: u64,
    pub points_written: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Set only when the output file was kept.
    pub output: Option<PathBuf>,
    pub corridor: CorridorSpec,
    pub corridor_area: f64,
    pub selected_files: Vec<String>,
    pub files: Vec<FileStats>,
    pub failed_files: Vec<FailedFile>,
    pub totals: Totals,
    pub elapsed_secs: f64,
}

impl RunReport {
    fn new(spec: CorridorSpec, corridor: &Polygon, selected_files: Vec<String>) -> Self {
        Self {
            outcome: RunOutcome::Completed,
            output: None,
            corridor: spec,
            corridor_area: corridor.area(),
            selected_files,
            files: Vec::new(),
            failed_files: Vec::new(),
            totals: Totals::default(),
            elapsed_secs: 0.0,
        }
    }

    fn add(&mut self, stats: FileStats) {
        self.totals.points_scanned += stats.points_scanned;
        self.totals.points_in_corridor += stats.points_in_corridor;
        self.totals.points_written += stats.points_written;
        self.files.push(stats);
    }
}

/// Runs a whole extraction: selection, optional download, per-file filtering
/// into a single output file.
pub struct CorridorOrchestrator<'a> {
    config: CorridorConfig,
    factory: &'a dyn TransformerFactory,
    observer: &'a dyn ProgressObserver,
    cancel: CancellationToken,
    fetcher: Option<&'a dyn FileFetcher>,
}

impl<'a> CorridorOrchestrator<'a> {
    pub fn new(
        config: CorridorConfig,
        factory: &'a dyn TransformerFactory,
        observer: &'a dyn ProgressObserver,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            factory,
            observer,
            cancel,
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: &'a dyn FileFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(&self) -> &CorridorConfig {
        &self.config
    }

    pub fn run(&self, candidates: &[PathBuf]) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let (spec, stride) = self.config.validate()?;
        if candidates.is_empty() {
            return Err(PipelineError::NoInputFiles);
        }

        let corridor = spec.polygon()?;
        log::info!(
            "Corridor EPSG:{}: length {:.2}, width {:.2}, area {:.2}",
            spec.crs,
            spec.length(),
            spec.width(),
            corridor.area()
        );

        let selected = select_files(
            candidates,
            &corridor,
            spec.crs,
            self.config.default_crs,
            self.factory,
        );
        if selected.is_empty() {
            return Err(PipelineError::NoIntersectingFiles);
        }
        let mut report = RunReport::new(
            spec,
            &corridor,
            selected.iter().map(|s| s.file.file_name()).collect(),
        );

        let mut files: Vec<PathBuf> = selected.into_iter().map(|s| s.file.path).collect();
        if let Some(local_dir) = &self.config.local_dir {
            files = reconcile_local(&files, local_dir, self.fetcher);
            if files.is_empty() {
                return Err(PipelineError::NoLocalFiles(local_dir.clone()));
            }
        }

        if self.cancel.is_cancelled() {
            log::info!("Cancelled before processing started");
            report.outcome = RunOutcome::Cancelled;
            report.elapsed_secs = started.elapsed().as_secs_f64();
            return Ok(report);
        }

        let output = &self.config.output;
        let header = self.output_header(&files[0], spec.crs)?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PipelineError::OutputDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let artifact = OutputArtifact::new(output);
        let mut sink = OutputSink::create(output, &header)?;
        log::info!("Writing corridor points to {}", output.display());

        let mut cancelled = false;
        for (index, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let position = FilePosition {
                index,
                total: files.len(),
            };
            let name = display_name(path);
            log::info!("[{}/{}] Processing {}", index + 1, files.len(), name);
            self.observer.notify(ProgressEvent::FileStarted {
                index,
                total: files.len(),
                name: name.clone(),
            });

            match self.process_file(path, &corridor, spec.crs, stride, &mut sink, position) {
                Ok(FilterOutcome::Completed(stats)) => {
                    log::info!(
                        "{}: {} of {} points in corridor, {} written in {:.1}s",
                        stats.file_name,
                        stats.points_in_corridor,
                        stats.points_scanned,
                        stats.points_written,
                        stats.elapsed_secs
                    );
                    self.observer
                        .notify(ProgressEvent::FileFinished(stats.clone()));
                    report.add(stats);
                }
                Ok(FilterOutcome::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    log::error!("Skipping {}: {}", name, e);
                    self.observer.notify(ProgressEvent::FileSkipped {
                        name: name.clone(),
                        reason: e.to_string(),
                    });
                    report.failed_files.push(FailedFile {
                        file_name: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        let written = sink.close()?;
        report.elapsed_secs = started.elapsed().as_secs_f64();

        if !cancelled && report.failed_files.len() == files.len() {
            return Err(PipelineError::AllFilesFailed(files.len()));
        }

        report.outcome = if cancelled {
            RunOutcome::Cancelled
        } else if written == 0 {
            RunOutcome::NoPointsWritten
        } else {
            RunOutcome::Completed
        };

        log::info!(
            "Processed {} files ({} failed): {} points scanned, {} in corridor, {} written in {:.1}s",
            report.files.len(),
            report.failed_files.len(),
            report.totals.points_scanned,
            report.totals.points_in_corridor,
            written,
            report.elapsed_secs
        );

        match report.outcome {
            RunOutcome::Completed => report.output = Some(artifact.keep()),
            RunOutcome::Cancelled => log::warn!("Run cancelled, discarding output"),
            RunOutcome::NoPointsWritten => log::warn!("No points fell inside the corridor"),
        }
        Ok(report)
    }

    /// Header of the first file to be processed, moved to the output CRS.
    fn output_header(
        &self,
        template: &Path,
        crs: EpsgCode,
    ) -> Result<OutputHeader, PipelineError> {
        let template = PointCloudFile::open(template)?;
        let mut header = OutputHeader::from_template(&template, crs);

        if let Some((template_crs, _)) = template.resolve_crs(self.config.default_crs) {
            if template_crs != crs {
                let t = &template.transforms;
                let offset = self
                    .factory
                    .create(template_crs, crs)?
                    .transform_coord([t.x.offset, t.y.offset])?;
                log::debug!(
                    "Output offset moved from ({}, {}) to ({}, {})",
                    t.x.offset,
                    t.y.offset,
                    offset[0],
                    offset[1]
                );
                header = header.with_offset_xy(offset[0], offset[1]);
            }
        }

        let description = self.factory.describe(crs);
        let model = match description.as_ref().map(|d| d.kind) {
            Some(CrsKind::Geographic) => ModelType::Geographic,
            _ => ModelType::Projected,
        };
        if let Some(d) = &description {
            log::info!("Output CRS: EPSG:{} ({})", crs, d.name);
        }
        let wkt = description.as_ref().and_then(|d| d.wkt.as_deref());
        Ok(header.with_crs_vlrs(crs_vlrs(crs, model, wkt)))
    }

    fn process_file(
        &self,
        path: &Path,
        corridor: &Polygon,
        corridor_crs: EpsgCode,
        stride: DownsampleStride,
        sink: &mut OutputSink,
        position: FilePosition,
    ) -> Result<FilterOutcome, PipelineError> {
        let mut reader = LasChunkReader::open(path)?;
        let file = reader.file();
        log::debug!("{}", file);

        let name = file.file_name();
        let (crs, crs_source) = file
            .resolve_crs(self.config.default_crs)
            .ok_or_else(|| PipelineError::MissingCrs(name.clone()))?;
        if crs_source == CrsSource::Default {
            log::warn!("{} has no CRS, assuming EPSG:{}", name, crs);
        }

        let native_corridor = reproject_polygon(corridor, corridor_crs, crs, self.factory)?;
        let mut transform = self.factory.create(crs, corridor_crs)?;

        let filter = ChunkFilter::new(
            &native_corridor,
            self.config.chunk_size,
            stride,
            &self.cancel,
            self.observer,
        );
        filter.process(
            &mut reader,
            sink,
            transform.as_mut(),
            FileStats::new(name, file.point_count),
            position,
        )
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
