//! Progress state published while a conversion runs.

use std::fmt;

/// Pipeline phase, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting,
    Recognizing,
    Saving,
    OpeningOutputs,
    CleaningUp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "Idle",
            Stage::Extracting => "Extracting images",
            Stage::Recognizing => "Recognizing text",
            Stage::Saving => "Saving document",
            Stage::OpeningOutputs => "Opening outputs",
            Stage::CleaningUp => "Cleaning up",
        };
        f.write_str(label)
    }
}

/// Images processed so far out of the total extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(done: usize, total: usize) -> Self {
        Self { done, total }
    }

    pub fn percent(&self) -> u8 {
        percent(self.done, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done >= self.total
    }
}

/// `floor(done * 100 / total)`, clamped to 100. A zero total yields 0.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total) as u64;
    (done * 100 / total as u64) as u8
}

/// Events emitted by the pipeline through its progress reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Stage(Stage),
    Progress(Progress),
}
