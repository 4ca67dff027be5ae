use std::time::Duration;

use serde::Serialize;

/// Counters for one input file. Created fresh per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStats {
    pub file_name: String,
    pub total_points: u64,
    pub points_scanned: u64,
    pub points_in_corridor: u64,
    pub points_written: u64,
    pub elapsed_secs: f64,
}

impl FileStats {
    pub fn new(file_name: impl Into<String>, total_points: u64) -> Self {
        Self {
            file_name: file_name.into(),
            total_points,
            ..Default::default()
        }
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed_secs = elapsed.as_secs_f64();
    }
}
