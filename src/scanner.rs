//! Directory scanning: count pass, build pass, size aggregation, sort.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use jwalk::WalkDir;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{Node, NodeKind, ScanMonitor};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Scanner options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Pause after every entry of the build pass so the progress screen
    /// stays animated on fast filesystems. Zero disables it.
    pub entry_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            entry_delay: Duration::from_millis(1),
        }
    }
}

impl ScanConfig {
    pub fn with_entry_delay(mut self, delay: Duration) -> Self {
        self.entry_delay = delay;
        self
    }
}

// ============================================================================
// SCANNER API
// ============================================================================

/// Disk usage scanner
///
/// Builds the tree in four strictly sequential passes. Unreadable entries
/// never fail a scan: they are skipped (directories) or recorded with
/// size 0 (files).
#[derive(Debug, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    /// Create a new Scanner instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scan a directory and return the aggregated, size-sorted root node.
    pub fn scan<P: AsRef<Path>>(&self, path: P) -> Node {
        self.build(path.as_ref(), &ScanMonitor::new())
    }

    /// Scan while reporting into `monitor`, then hand the finished tree to it.
    ///
    /// The tree is stored only once aggregation and sorting have run, so a
    /// reader of the monitor never sees a half-built tree.
    pub fn scan_into<P: AsRef<Path>>(&self, path: P, monitor: &ScanMonitor) {
        let root = self.build(path.as_ref(), monitor);
        monitor.mark_done(Some(root));
    }

    fn build(&self, root_path: &Path, monitor: &ScanMonitor) -> Node {
        let start = Instant::now();

        let total = count_entries(root_path);
        monitor.set_total(total);
        info!(root = %root_path.display(), total, "count pass finished");

        let mut root = self.build_tree(root_path, monitor);
        info!(elapsed = ?start.elapsed(), "build pass finished");

        aggregate_sizes(&mut root);
        sort_tree(&mut root);
        info!(size = root.size, elapsed = ?start.elapsed(), "scan finished");

        root
    }

    fn build_tree(&self, root_path: &Path, monitor: &ScanMonitor) -> Node {
        let mut arena = Arena::new(Node::directory(root_name(root_path)));
        let mut dirs: HashMap<PathBuf, usize> = HashMap::new();
        dirs.insert(root_path.to_path_buf(), Arena::ROOT);

        for entry in walk(root_path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth == 0 {
                continue;
            }

            let path = entry.path();
            let Some(&parent) = path.parent().and_then(|p| dirs.get(p)) else {
                debug!(path = %path.display(), "parent not in tree, skipping");
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type().is_dir() {
                let idx = arena.push(parent, Node::directory(name));
                monitor.record_entry(&path, false, 0);
                dirs.insert(path, idx);
            } else {
                let size = match entry.metadata() {
                    Ok(md) => md.len(),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "size unavailable, using 0");
                        0
                    }
                };
                arena.push(parent, Node::file(name, size));
                monitor.record_entry(&path, true, size);
            }

            if !self.config.entry_delay.is_zero() {
                thread::sleep(self.config.entry_delay);
            }
        }

        arena.into_tree()
    }
}

fn walk(root: &Path) -> WalkDir {
    WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
}

/// First pass: number of entries below `root`, used as the progress denominator.
fn count_entries(root: &Path) -> u64 {
    walk(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.depth > 0)
        .count() as u64
}

fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

/// Post-order: a directory's size is the sum of its children's sizes.
fn aggregate_sizes(node: &mut Node) -> u64 {
    if let NodeKind::Directory { children } = &mut node.kind {
        node.size = children
            .par_iter_mut()
            .map(aggregate_sizes)
            .reduce(|| 0, u64::saturating_add);
    }
    node.size
}

/// Pre-order: every directory's children by size, largest first.
fn sort_tree(node: &mut Node) {
    node.sort_children(true);
    if let Some(children) = node.children_mut() {
        children.par_iter_mut().for_each(sort_tree);
    }
}

// ============================================================================
// BUILD ARENA
// ============================================================================

/// Flat node storage used while the walk is in flight.
///
/// Nodes refer to their children by index; parents always precede their
/// children, which lets a path lookup find the parent slot of any entry.
struct Arena {
    entries: Vec<ArenaEntry>,
}

struct ArenaEntry {
    node: Node,
    children: Vec<usize>,
}

impl Arena {
    const ROOT: usize = 0;

    fn new(root: Node) -> Self {
        Self {
            entries: vec![ArenaEntry {
                node: root,
                children: Vec::new(),
            }],
        }
    }

    fn push(&mut self, parent: usize, node: Node) -> usize {
        let idx = self.entries.len();
        self.entries.push(ArenaEntry {
            node,
            children: Vec::new(),
        });
        self.entries[parent].children.push(idx);
        idx
    }

    fn into_tree(mut self) -> Node {
        self.assemble(Self::ROOT)
    }

    fn assemble(&mut self, idx: usize) -> Node {
        let child_ids = std::mem::take(&mut self.entries[idx].children);
        let mut node = std::mem::replace(&mut self.entries[idx].node, Node::file(String::new(), 0));
        if let Some(children) = node.children_mut() {
            children.extend(child_ids.into_iter().map(|c| self.assemble(c)));
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fast_scanner() -> Scanner {
        Scanner::with_config(ScanConfig::default().with_entry_delay(Duration::ZERO))
    }

    fn write_file(path: &Path, len: usize) {
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    fn child<'a>(node: &'a Node, name: &str) -> &'a Node {
        node.children()
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing child {name}"))
    }

    fn assert_sizes_consistent(node: &Node) {
        if node.is_dir() {
            let sum: u64 = node.children().iter().map(|c| c.size).sum();
            assert_eq!(node.size, sum, "size mismatch at {}", node.name);
            for c in node.children() {
                assert_sizes_consistent(c);
            }
        }
    }

    fn assert_sorted_descending(node: &Node) {
        for pair in node.children().windows(2) {
            assert!(pair[0].size >= pair[1].size, "unsorted at {}", node.name);
        }
        for c in node.children() {
            assert_sorted_descending(c);
        }
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = tempdir().unwrap();
        let root = fast_scanner().scan(dir.path());
        assert!(root.is_dir());
        assert!(root.children().is_empty());
        assert_eq!(root.size, 0);
    }

    #[test]
    fn test_aggregates_and_sorts_scenario() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("A")).unwrap();
        write_file(&dir.path().join("A").join("big.txt"), 2000);
        write_file(&dir.path().join("small.txt"), 10);

        let root = fast_scanner().scan(dir.path());

        assert_eq!(child(&root, "A").size, 2000);
        assert_eq!(root.size, 2010);
        let names: Vec<_> = root.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["A", "small.txt"]);
    }

    #[test]
    fn test_root_is_named_after_directory() {
        let dir = tempdir().unwrap();
        let root = fast_scanner().scan(dir.path());
        let expected = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(root.name, expected);
    }

    #[test]
    fn test_nested_tree_invariants() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("a/b/c")).unwrap();
        fs::create_dir_all(base.join("d/empty")).unwrap();
        write_file(&base.join("a/one.bin"), 100);
        write_file(&base.join("a/b/two.bin"), 300);
        write_file(&base.join("a/b/c/three.bin"), 50);
        write_file(&base.join("d/four.bin"), 700);
        write_file(&base.join("top.bin"), 1);

        let root = fast_scanner().scan(base);

        assert_sizes_consistent(&root);
        assert_sorted_descending(&root);
        assert_eq!(root.size, 1151);
        assert_eq!(child(&root, "a").size, 450);
        assert_eq!(child(child(&root, "d"), "empty").size, 0);
        assert_eq!(root.children()[0].name, "d");
    }

    #[test]
    fn test_hidden_entries_are_counted() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join(".hidden"), 64);

        let root = fast_scanner().scan(dir.path());
        assert_eq!(root.size, 64);
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_executable_flag_from_scan() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("run.EXE"), 500);

        let root = fast_scanner().scan(dir.path());
        let exe = child(&root, "run.EXE");
        assert!(exe.is_executable());
        assert_eq!(exe.size, 500);
    }

    #[test]
    fn test_scan_into_reports_progress_and_tree() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_file(&dir.path().join("sub/x"), 5);
        write_file(&dir.path().join("y"), 7);

        let monitor = ScanMonitor::new();
        fast_scanner().scan_into(dir.path(), &monitor);

        let snap = monitor.snapshot();
        assert!(snap.done);
        assert_eq!(snap.total_items, 3);
        assert_eq!(snap.scanned_items, 3);
        assert_eq!(snap.dir_count, 1);
        assert_eq!(snap.file_count, 2);
        assert_eq!(snap.dir_count + snap.file_count, snap.scanned_items);
        assert_eq!(snap.total_size, 12);
        assert_eq!(snap.fraction(), 1.0);

        let tree = monitor.take_tree().expect("finished tree");
        assert_eq!(tree.size, 12);
    }

    #[test]
    fn test_scan_finishing_after_forced_done_hands_over_tree() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("a.bin"), 4);
        write_file(&dir.path().join("b.bin"), 5);

        let monitor = ScanMonitor::new();
        monitor.mark_done(None);
        assert!(monitor.snapshot().done);

        fast_scanner().scan_into(dir.path(), &monitor);

        let tree = monitor.take_tree().expect("finished tree");
        assert_eq!(tree.size, 9);
        let names: Vec<_> = tree.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b.bin", "a.bin"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entries_degrade_without_failing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::create_dir(base.join("locked")).unwrap();
        write_file(&base.join("locked/hidden.bin"), 1000);
        fs::create_dir(base.join("nostat")).unwrap();
        write_file(&base.join("nostat/f.bin"), 100);
        write_file(&base.join("ok.txt"), 10);

        fs::set_permissions(base.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();
        fs::set_permissions(base.join("nostat"), fs::Permissions::from_mode(0o444)).unwrap();
        let restore = |base: &Path| {
            let _ = fs::set_permissions(base.join("locked"), fs::Permissions::from_mode(0o755));
            let _ = fs::set_permissions(base.join("nostat"), fs::Permissions::from_mode(0o755));
        };

        // Permission bits do not apply to root
        if fs::read_dir(base.join("locked")).is_ok() || fs::metadata(base.join("nostat/f.bin")).is_ok() {
            restore(base);
            return;
        }

        let monitor = ScanMonitor::new();
        fast_scanner().scan_into(base, &monitor);
        restore(base);

        let snap = monitor.snapshot();
        assert_eq!(snap.scanned_items, snap.total_items);
        assert_eq!(snap.dir_count + snap.file_count, snap.scanned_items);

        let root = monitor.take_tree().expect("finished tree");
        assert_sizes_consistent(&root);
        assert_eq!(root.size, 10);

        let locked = child(&root, "locked");
        assert!(locked.is_dir());
        assert!(locked.children().is_empty());
        assert_eq!(locked.size, 0);

        let nostat = child(&root, "nostat");
        assert_eq!(nostat.size, 0);
        assert!(nostat.children().iter().all(|c| c.size == 0));
    }

    #[test]
    fn test_arena_preserves_discovery_order() {
        let mut arena = Arena::new(Node::directory("root"));
        let sub = arena.push(Arena::ROOT, Node::directory("sub"));
        arena.push(Arena::ROOT, Node::file("f1", 1));
        arena.push(sub, Node::file("f2", 2));
        arena.push(sub, Node::file("f3", 3));

        let root = arena.into_tree();
        let names: Vec<_> = root.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["sub", "f1"]);
        let names: Vec<_> = root.children()[0].children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["f2", "f3"]);
    }
}
