//! Core library for sizetree - interactive disk usage explorer
//!
//! # Overview
//!
//! The library owns everything that has real invariants:
//!
//! - [`Scanner`]: walks a directory subtree and builds a size-aggregated,
//!   size-sorted [`Node`] tree.
//! - [`ScanMonitor`]: the lock-guarded progress record shared between the
//!   scanning thread and the progress screen.
//! - [`NavigationState`]: the drill-in/drill-out state machine over a
//!   finished tree.
//!
//! Rendering lives in the `sizetree` binary.
//!
//! # Usage
//!
//! ```no_run
//! use sizetree::{ScanConfig, Scanner};
//! use std::time::Duration;
//!
//! let scanner = Scanner::with_config(ScanConfig::default().with_entry_delay(Duration::ZERO));
//! let root = scanner.scan(".");
//! println!("{} is {}", root.name, sizetree::format_size(root.size));
//! ```

pub mod navigation;
pub mod progress;
pub mod scanner;

pub use navigation::NavigationState;
pub use progress::{ProgressSnapshot, ScanMonitor};
pub use scanner::{ScanConfig, Scanner};

// ============================================================================
// TREE MODEL
// ============================================================================

/// Represents a file or directory node in the filesystem tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    /// File length, or the sum of all descendant file sizes for directories.
    pub size: u64,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory { children: Vec<Node> },
    File { is_executable: bool },
}

impl Node {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            kind: NodeKind::Directory { children: Vec::new() },
        }
    }

    /// Create a file node; executables are detected from the name suffix.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let is_executable = is_executable_name(&name);
        Self {
            name,
            size,
            kind: NodeKind::File { is_executable },
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_executable(&self) -> bool {
        matches!(self.kind, NodeKind::File { is_executable: true })
    }

    /// Children of a directory; empty for files.
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Mutable children, `None` for files.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Stable in-place sort of the direct children by size.
    pub fn sort_children(&mut self, descending: bool) {
        if let Some(children) = self.children_mut() {
            if descending {
                children.sort_by(|a, b| b.size.cmp(&a.size));
            } else {
                children.sort_by_key(|c| c.size);
            }
        }
    }
}

fn is_executable_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".exe")
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Human readable size with binary prefixes ("512 B", "2.00 KB", "4.77 MB").
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Count with thousands separators ("1,234,567").
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Keep the rightmost part of `text` so the result fits in `width` columns,
/// marking the cut with a leading "...".
pub fn truncate_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        return text.to_string();
    }
    if width <= 3 {
        return ".".repeat(width);
    }
    let keep = width - 3;
    let tail: String = text.chars().skip(len - keep).collect();
    format!("...{tail}")
}

/// Cut `text` to `width` columns, ending with "..." when shortened.
pub fn truncate_right(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width <= 3 {
        return ".".repeat(width);
    }
    let head: String = text.chars().take(width - 3).collect();
    format!("{head}...")
}
