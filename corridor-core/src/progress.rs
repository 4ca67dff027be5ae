use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::stats::FileStats;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    FileStarted {
        index: usize,
        total: usize,
        name: String,
    },
    FileProgress {
        index: usize,
        total: usize,
        name: String,
        percent: u8,
    },
    FileFinished(FileStats),
    FileSkipped {
        name: String,
        reason: String,
    },
    ExportProgress {
        stage: ExportStage,
        percent: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Reading,
    Writing,
}

/// Receives progress notifications from inside the pipeline. Observers must
/// not block; the pipeline never reads anything back from them.
pub trait ProgressObserver {
    fn notify(&self, event: ProgressEvent);
}

/// Discards every notification.
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn notify(&self, _event: ProgressEvent) {}
}

/// An unbounded channel whose sending half is a [`ProgressObserver`].
pub fn progress_channel() -> (Sender<ProgressEvent>, Receiver<ProgressEvent>) {
    unbounded()
}

impl ProgressObserver for Sender<ProgressEvent> {
    fn notify(&self, event: ProgressEvent) {
        // a receiver that went away only means nobody is watching anymore
        let _ = self.send(event);
    }
}

/// Reports a percentage each time it advances by at least `interval` points
/// since the last report.
#[derive(Debug, Clone)]
pub struct PercentTracker {
    interval: u8,
    last: Option<u8>,
}

impl PercentTracker {
    pub fn new(interval: u8) -> Self {
        Self {
            interval: interval.max(1),
            last: None,
        }
    }

    pub fn update(&mut self, done: u64, total: u64) -> Option<u8> {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) as u128 * 100 / total as u128) as u8
        };
        let due = match self.last {
            None => percent >= self.interval || percent == 100,
            Some(last) => {
                percent >= last.saturating_add(self.interval) || (percent == 100 && last < 100)
            }
        };
        if due {
            self.last = Some(percent);
            Some(percent)
        } else {
            None
        }
    }
}
