mod classification;

pub use classification::{
    default_output_path, ClassificationExporter, ExportError, ExportOutcome, ExportSummary,
};
