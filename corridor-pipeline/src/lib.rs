pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod selector;
pub mod sourcing;

pub use error::PipelineError;
pub use filter::{ChunkFilter, FilterOutcome};
pub use orchestrator::{CorridorConfig, CorridorOrchestrator, RunOutcome, RunReport};
pub use selector::{select_files, SelectedFile};
pub use sourcing::{reconcile_local, FetchReport, FileFetcher};
