mod discovery;
mod fetch;

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
    time::Instant,
};

use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam::channel::Sender;
use env_logger::Builder;
use log::LevelFilter;
use thiserror::Error;

use coordinate_transformer::ProjTransformerFactory;
use corridor_core::{
    cancel::CancellationToken,
    crs::{EpsgCode, DEFAULT_CORRIDOR_EPSG},
    progress::{progress_channel, ExportStage, ProgressEvent},
};
use corridor_exporter::{default_output_path, ClassificationExporter, ExportOutcome};
use corridor_las::{inspect::inspect, DEFAULT_CHUNK_SIZE};
use corridor_pipeline::{CorridorConfig, CorridorOrchestrator, RunOutcome, RunReport};

use discovery::{expand_inputs, list_directory, merge_by_name};
use fetch::CopyFetcher;

#[derive(Parser, Debug)]
#[command(
    name = "corridor-extract",
    about = "Extracts a corridor around a line from LAS/LAZ point clouds",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the points inside a corridor into one LAS file
    Extract(ExtractArgs),
    /// Write a LAS file as sorted `classification,x,y,z` text
    ExportTxt(ExportArgs),
    /// Print header facts and classification counts
    Inspect {
        #[arg(required = true, num_args = 1.., value_name = "FILE")]
        files: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceMode {
    /// Only files given by --source
    Local,
    /// Only files in --network-dir
    Network,
    /// Copy selected network files into the local directory, then process
    Download,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input files, glob patterns or directories
    #[arg(short, long, num_args = 1.., value_name = "PATH|GLOB")]
    source: Vec<String>,

    #[arg(long, value_name = "DIR")]
    network_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SourceMode::Local)]
    mode: SourceMode,

    /// Download target; defaults to the first --source directory
    #[arg(long, value_name = "DIR")]
    local_dir: Option<PathBuf>,

    #[arg(long, num_args = 2, required = true, value_names = ["X", "Y"], allow_negative_numbers = true)]
    start: Vec<f64>,

    #[arg(long, num_args = 2, required = true, value_names = ["X", "Y"], allow_negative_numbers = true)]
    end: Vec<f64>,

    #[arg(long, required = true)]
    half_width: f64,

    /// Keep every nth point inside the corridor
    #[arg(long, default_value_t = 1)]
    nth: usize,

    #[arg(long, default_value_t = DEFAULT_CORRIDOR_EPSG)]
    corridor_epsg: EpsgCode,

    /// CRS assumed for files that declare none
    #[arg(long)]
    default_epsg: Option<EpsgCode>,

    #[arg(short, long, required = true, value_name = "FILE")]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Directory holding proj.db and grid files
    #[arg(long, value_name = "DIR")]
    proj_data: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Also export the result as text; defaults to the output with .txt
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    txt: Option<Option<PathBuf>>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(short, long, required = true, value_name = "FILE")]
    input: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("--mode {0} requires --network-dir")]
    MissingNetworkDir(&'static str),
    #[error("--mode download needs --local-dir or a --source directory")]
    MissingLocalDir,
    #[error("failed to write {path}: {source}")]
    Summary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const EXIT_FAILURE: u8 = 1;
const EXIT_NO_POINTS: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

fn init_logger(verbose: bool) {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        )
        .init();
}

fn install_interrupt_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("Interrupted, stopping after the current chunk...");
        handle.cancel();
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }
    cancel
}

/// Runs `job` on a worker thread while this thread logs its progress events.
fn with_progress<T, F>(job: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(Sender<ProgressEvent>) -> T + Send + 'static,
{
    let (tx, rx) = progress_channel();
    let worker = thread::spawn(move || job(tx));

    let mut files_done = 0;
    for event in rx.iter() {
        match event {
            ProgressEvent::FileStarted { index, total, name } => {
                log::debug!("Started {} ({}/{})", name, index + 1, total);
            }
            ProgressEvent::FileProgress {
                index,
                total,
                name,
                percent,
            } => {
                log::debug!("{} ({}/{}): {}%", name, index + 1, total, percent);
            }
            ProgressEvent::FileFinished(stats) => {
                files_done += 1;
                log::debug!("Finished {} ({} files done)", stats.file_name, files_done);
            }
            ProgressEvent::FileSkipped { name, reason } => {
                files_done += 1;
                log::debug!("Skipped {}: {} ({} files done)", name, reason, files_done);
            }
            ProgressEvent::ExportProgress { stage, percent } => match stage {
                ExportStage::Reading => log::debug!("Export reading: {}%", percent),
                ExportStage::Writing => log::info!("Export writing: {}%", percent),
            },
        }
    }

    match worker.join() {
        Ok(result) => Some(result),
        Err(_) => {
            log::error!("Worker thread panicked");
            None
        }
    }
}

fn collect_candidates(args: &ExtractArgs) -> Result<Vec<PathBuf>, CliError> {
    let local = || expand_inputs(&args.source);
    let network = |mode| match &args.network_dir {
        Some(dir) => Ok(list_directory(dir)),
        None => Err(CliError::MissingNetworkDir(mode)),
    };

    let files = match args.mode {
        SourceMode::Local => local(),
        SourceMode::Network => network("network")?,
        SourceMode::Download => merge_by_name(local(), network("download")?),
    };
    log::info!("Found {} candidate files", files.len());
    for file in &files {
        log::debug!("  {}", file.display());
    }
    Ok(files)
}

fn download_dir(args: &ExtractArgs) -> Result<Option<PathBuf>, CliError> {
    if args.mode != SourceMode::Download {
        return Ok(None);
    }
    if let Some(dir) = &args.local_dir {
        return Ok(Some(dir.clone()));
    }
    args.source
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_dir())
        .map(Some)
        .ok_or(CliError::MissingLocalDir)
}

fn write_summary(report: &RunReport, path: &Path) -> Result<(), CliError> {
    let summary_error = |source| CliError::Summary {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(summary_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(|e| summary_error(std::io::Error::from(e)))?;
    writer.flush().map_err(summary_error)?;
    log::info!("Run summary written to {}", path.display());
    Ok(())
}

fn export_txt(
    input: PathBuf,
    output: PathBuf,
    chunk_size: usize,
    cancel: CancellationToken,
) -> ExitCode {
    let result = with_progress(move |tx| {
        ClassificationExporter::new(&cancel, &tx)
            .with_chunk_size(chunk_size)
            .export(&input, &output)
    });
    match result {
        Some(Ok(ExportOutcome::Completed(summary))) => {
            log::info!(
                "Wrote {} points to {}",
                summary.total_points,
                summary.output.display()
            );
            ExitCode::SUCCESS
        }
        Some(Ok(ExportOutcome::Cancelled)) => {
            log::warn!("Export cancelled, partial output removed");
            ExitCode::from(EXIT_CANCELLED)
        }
        Some(Err(e)) => {
            log::error!("Export failed: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
        None => ExitCode::from(EXIT_FAILURE),
    }
}

fn run_extract(args: ExtractArgs) -> ExitCode {
    let start = Instant::now();
    log::info!("start: {:?}", args.start);
    log::info!("end: {:?}", args.end);
    log::info!("half width: {}", args.half_width);
    log::info!("corridor EPSG: {}", args.corridor_epsg);
    log::info!("output: {}", args.output.display());

    let (candidates, local_dir) = match (collect_candidates(&args), download_dir(&args)) {
        (Ok(candidates), Ok(local_dir)) => (candidates, local_dir),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let mut config = CorridorConfig::new(
        [args.start[0], args.start[1]],
        [args.end[0], args.end[1]],
        args.half_width,
        args.corridor_epsg,
        &args.output,
    );
    config.nth_point = args.nth;
    config.default_crs = args.default_epsg;
    config.chunk_size = args.chunk_size;
    config.local_dir = local_dir;

    let cancel = install_interrupt_handler();
    let worker_cancel = cancel.clone();
    let proj_data = args.proj_data.clone();
    let result = with_progress(move |tx| {
        let factory = ProjTransformerFactory::new(proj_data);
        let fetcher = CopyFetcher;
        let mut orchestrator = CorridorOrchestrator::new(config, &factory, &tx, worker_cancel);
        if orchestrator.config().local_dir.is_some() {
            orchestrator = orchestrator.with_fetcher(&fetcher);
        }
        orchestrator.run(&candidates)
    });

    let report = match result {
        Some(Ok(report)) => report,
        Some(Err(e)) => {
            log::error!("Extraction failed: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
        None => return ExitCode::from(EXIT_FAILURE),
    };

    if let Some(path) = &args.summary {
        if let Err(e) = write_summary(&report, path) {
            log::error!("Could not write summary: {}", e);
        }
    }
    log::info!("Elapsed: {:?}", start.elapsed());

    match report.outcome {
        RunOutcome::Completed => {}
        RunOutcome::NoPointsWritten => {
            log::error!("No points were written, output removed");
            return ExitCode::from(EXIT_NO_POINTS);
        }
        RunOutcome::Cancelled => {
            log::warn!("Cancelled, output removed");
            return ExitCode::from(EXIT_CANCELLED);
        }
    }

    match args.txt {
        Some(txt) => {
            let txt = txt.unwrap_or_else(|| default_output_path(&args.output));
            export_txt(args.output, txt, args.chunk_size, cancel)
        }
        None => ExitCode::SUCCESS,
    }
}

fn run_inspect(files: &[PathBuf]) -> ExitCode {
    let mut failed = false;
    for file in files {
        match inspect(file, DEFAULT_CHUNK_SIZE) {
            Ok(report) => println!("{}", report),
            Err(e) => {
                log::error!("Error inspecting {}: {}", file.display(), e);
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::from(EXIT_FAILURE)
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Command::Extract(args) => run_extract(args),
        Command::ExportTxt(args) => {
            let output = args
                .output
                .unwrap_or_else(|| default_output_path(&args.input));
            export_txt(
                args.input,
                output,
                args.chunk_size,
                install_interrupt_handler(),
            )
        }
        Command::Inspect { files } => run_inspect(&files),
    }
}
