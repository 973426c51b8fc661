pub mod date;
pub mod error;
pub mod executor;
pub mod media;
pub mod planner;
pub mod scan;

use std::cell::Cell;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use date::CaptureTimestamp;
pub use error::{Error, Result};
pub use media::{MediaFile, MediaKind};
pub use planner::RenameOperation;

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Directory whose files are renamed
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Compute and report the plan without touching any file
    #[serde(default)]
    pub dry_run: bool,
    /// Name targets `<timestamp><ext>` without the sequence number
    #[serde(default)]
    pub no_index: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            dry_run: false,
            no_index: false,
        }
    }
}

/// A verified batch, ready to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub files_scanned: u64,
    pub operations: Vec<RenameOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub files_scanned: u64,
    pub files_planned: u64,
    pub files_renamed: u64,
    pub dry_run: bool,
    pub operations: Vec<RenameOperation>,
}

/// Type alias for progress callback: stage, current, total, message
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter; emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Cell<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        let now = Instant::now();
        Self {
            inner,
            last_emit: Cell::new(now.checked_sub(Duration::from_secs(1)).unwrap_or(now)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            if self.last_emit.get().elapsed() < Duration::from_millis(200) {
                return;
            }
            self.last_emit.set(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Scan `options.dir`, order its media and verify the resulting renames.
/// Nothing on disk is modified.
pub fn plan_directory(options: &ProcessOptions, progress_callback: &ProgressCallback<'_>) -> Result<Plan> {
    let tp = ThrottledProgress::new(progress_callback);

    let scan = scan::scan_dir(&options.dir, &tp)?;
    log::info!(
        "{} of {} files in {} are supported",
        scan.media.len(),
        scan.scanned,
        options.dir.display()
    );

    let operations = planner::plan(scan.media, options.no_index)?;
    planner::verify(&operations, |name| scan.existing.contains(name))?;

    Ok(Plan {
        files_scanned: scan.scanned,
        operations,
    })
}

/// Apply a plan produced by [`plan_directory`] for the same options.
pub fn execute(options: &ProcessOptions, plan: &Plan) -> Result<ProcessResult> {
    let files_renamed = if options.dry_run {
        0
    } else {
        executor::apply(&options.dir, &plan.operations)?
    };

    Ok(ProcessResult {
        files_scanned: plan.files_scanned,
        files_planned: plan.operations.len() as u64,
        files_renamed,
        dry_run: options.dry_run,
        operations: plan.operations.clone(),
    })
}

/// Run the full pipeline: scan, plan, verify, then rename unless dry-run.
pub fn process(options: &ProcessOptions, progress_callback: &ProgressCallback<'_>) -> Result<ProcessResult> {
    let plan = plan_directory(options, progress_callback)?;
    execute(options, &plan)
}
