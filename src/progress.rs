//! Shared scan progress.
//!
//! The scanner thread is the only writer; the progress screen polls
//! [`ScanMonitor::snapshot`] on a timer (e.g. every 100ms) and redraws.
//! Every field lives behind one lock so a snapshot is never torn.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::Node;

/// Consistent copy of the scan counters at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Entries found by the counting pass; 0 until it finishes.
    pub total_items: u64,
    /// Entries processed by the build pass.
    pub scanned_items: u64,
    pub dir_count: u64,
    pub file_count: u64,
    /// Running sum of file sizes seen so far.
    pub total_size: u64,
    /// Last path the scanner touched
    pub current_path: PathBuf,
    pub done: bool,
}

impl ProgressSnapshot {
    /// Completed fraction in `[0.0, 1.0]`. An unknown total counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total_items == 0 {
            return 1.0;
        }
        (self.scanned_items as f64 / self.total_items as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    progress: ProgressSnapshot,
    tree: Option<Node>,
}

/// Lock-guarded progress record shared between the scanner and the UI.
#[derive(Debug, Default)]
pub struct ScanMonitor {
    state: Mutex<MonitorState>,
}

impl ScanMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one directory or file entry of the build pass.
    pub fn record_entry(&self, path: &Path, is_file: bool, size: u64) {
        let mut state = self.state.lock();
        let progress = &mut state.progress;
        progress.scanned_items += 1;
        progress.current_path.clear();
        progress.current_path.push(path);
        if is_file {
            progress.file_count += 1;
            progress.total_size = progress.total_size.saturating_add(size);
        } else {
            progress.dir_count += 1;
        }
    }

    pub fn set_total(&self, total: u64) {
        self.state.lock().progress.total_items = total;
    }

    /// Flag the scan as finished.
    ///
    /// The first tree handed in is kept; later calls only re-assert `done`.
    /// `mark_done(None)` force-completes a scan the user walked away from.
    pub fn mark_done(&self, tree: Option<Node>) {
        let mut state = self.state.lock();
        state.progress.done = true;
        if state.tree.is_none() {
            state.tree = tree;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().progress.clone()
    }

    #[cfg(test)]
    fn has_tree(&self) -> bool {
        self.state.lock().tree.is_some()
    }

    /// Move the finished tree out of the monitor.
    pub fn take_tree(&self) -> Option<Node> {
        self.state.lock().tree.take()
    }
}
