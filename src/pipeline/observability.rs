use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PipelineError;

/// Pipeline stages reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Schema, CRS, selection, and key-uniqueness checks.
    Preflight,
    /// Region polygon validation and repair.
    GeometryRepair,
    /// Point-in-polygon joins of subjects against regions.
    SpatialJoin,
    /// Grouped reduction of joined subjects.
    Aggregate,
    /// Attribute table joins onto the region base set.
    TableJoin,
    /// Numeric rounding of the result set.
    Rounding,
    /// Cross-region summary pass.
    Summary,
}

/// Minimal stats reported when a stage finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    /// Number of features the stage produced.
    pub output_features: usize,
}

/// Observer interface for pipeline progress and outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called when a stage starts.
    fn on_stage_started(&self, _stage: PipelineStage) {}

    /// Called when a stage finishes.
    fn on_stage_finished(&self, _stage: PipelineStage, _stats: StageStats) {}

    /// Called for non-fatal findings, e.g. a CRS mismatch between inputs.
    fn on_warning(&self, _stage: PipelineStage, _message: &str) {}

    /// Called when the run aborts.
    fn on_failure(&self, _stage: PipelineStage, _error: &PipelineError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_stage_started(&self, stage: PipelineStage) {
        for o in &self.observers {
            o.on_stage_started(stage);
        }
    }

    fn on_stage_finished(&self, stage: PipelineStage, stats: StageStats) {
        for o in &self.observers {
            o.on_stage_finished(stage, stats);
        }
    }

    fn on_warning(&self, stage: PipelineStage, message: &str) {
        for o in &self.observers {
            o.on_warning(stage, message);
        }
    }

    fn on_failure(&self, stage: PipelineStage, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(stage, error);
        }
    }
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_stage_started(&self, stage: PipelineStage) {
        eprintln!("[aggregate][start] stage={stage:?}");
    }

    fn on_stage_finished(&self, stage: PipelineStage, stats: StageStats) {
        eprintln!(
            "[aggregate][done] stage={stage:?} features={}",
            stats.output_features
        );
    }

    fn on_warning(&self, stage: PipelineStage, message: &str) {
        eprintln!("[aggregate][warn] stage={stage:?} {message}");
    }

    fn on_failure(&self, stage: PipelineStage, error: &PipelineError) {
        eprintln!("[aggregate][fail] stage={stage:?} err={error}");
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are
    /// ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_stage_started(&self, stage: PipelineStage) {
        self.append_line(&format!("{} start stage={stage:?}", unix_ts()));
    }

    fn on_stage_finished(&self, stage: PipelineStage, stats: StageStats) {
        self.append_line(&format!(
            "{} done stage={stage:?} features={}",
            unix_ts(),
            stats.output_features
        ));
    }

    fn on_warning(&self, stage: PipelineStage, message: &str) {
        self.append_line(&format!("{} warn stage={stage:?} {message}", unix_ts()));
    }

    fn on_failure(&self, stage: PipelineStage, error: &PipelineError) {
        self.append_line(&format!("{} fail stage={stage:?} err={error}", unix_ts()));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
