//! Navigation state for tree browsing.
//!
//! The navigator owns the finished tree. The breadcrumb is kept as the path
//! of child indices from the root to the directory on screen; only that
//! directory's children are ever reordered, so indices of the ancestors in
//! the path stay valid.

use crate::Node;

/// A user intent the navigator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Up,
    Down,
    ToggleSort,
    DrillIn,
    DrillOut,
}

#[derive(Debug)]
pub struct NavigationState {
    root: Node,
    /// Child indices from the root to the current directory
    path: Vec<usize>,
    selection: usize,
    scroll_top: usize,
    sort_descending: bool,
}

impl NavigationState {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            path: Vec::new(),
            selection: 0,
            scroll_top: 0,
            sort_descending: true,
        }
    }

    /// The directory being viewed
    pub fn current(&self) -> &Node {
        self.path
            .iter()
            .try_fold(&self.root, |node, &idx| node.children().get(idx))
            .unwrap_or(&self.root)
    }

    fn current_mut(&mut self) -> Option<&mut Node> {
        self.path
            .iter()
            .try_fold(&mut self.root, |node, &idx| node.children_mut()?.get_mut(idx))
    }

    /// Names from the root down to the current directory.
    pub fn breadcrumb(&self) -> Vec<&str> {
        let mut names = vec![self.root.name.as_str()];
        let mut node = &self.root;
        for &idx in &self.path {
            match node.children().get(idx) {
                Some(child) => {
                    names.push(child.name.as_str());
                    node = child;
                }
                None => break,
            }
        }
        names
    }

    /// Number of directories on the navigation stack, root included.
    pub fn depth(&self) -> usize {
        self.path.len() + 1
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn sort_descending(&self) -> bool {
        self.sort_descending
    }

    pub fn selected(&self) -> Option<&Node> {
        self.current().children().get(self.selection)
    }

    pub fn apply(&mut self, action: NavAction) {
        match action {
            NavAction::Up => self.move_up(),
            NavAction::Down => self.move_down(),
            NavAction::ToggleSort => self.toggle_sort(),
            NavAction::DrillIn => {
                self.drill_in();
            }
            NavAction::DrillOut => {
                self.drill_out();
            }
        }
    }

    pub fn move_up(&mut self) {
        self.selection = self.selection.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        let len = self.current().children().len();
        if len > 0 {
            self.selection = (self.selection + 1).min(len - 1);
        }
    }

    /// Flip the sort order of the current directory's children.
    pub fn toggle_sort(&mut self) {
        self.sort_descending = !self.sort_descending;
        let descending = self.sort_descending;
        if let Some(dir) = self.current_mut() {
            dir.sort_children(descending);
        }
    }

    /// Enter the selected directory. Returns false when the selection is a
    /// file or the directory is empty.
    pub fn drill_in(&mut self) -> bool {
        match self.selected() {
            Some(child) if child.is_dir() => {}
            _ => return false,
        }
        self.path.push(self.selection);
        self.reset_view();
        true
    }

    /// Return to the parent directory. Returns false at the root.
    pub fn drill_out(&mut self) -> bool {
        if self.path.pop().is_none() {
            return false;
        }
        self.reset_view();
        true
    }

    fn reset_view(&mut self) {
        self.selection = 0;
        self.scroll_top = 0;
        self.sort_descending = true;
        if let Some(dir) = self.current_mut() {
            dir.sort_children(true);
        }
    }

    /// Move `scroll_top` the least amount that keeps the selection on screen.
    pub fn clamp_scroll(&mut self, visible_rows: usize) {
        let visible = visible_rows.max(1);
        if self.selection < self.scroll_top {
            self.scroll_top = self.selection;
        } else if self.selection >= self.scroll_top + visible {
            self.scroll_top = self.selection + 1 - visible;
        }
    }

    /// Children in the visible window, paired with their index.
    pub fn visible_children(&self, visible_rows: usize) -> impl Iterator<Item = (usize, &Node)> {
        self.current()
            .children()
            .iter()
            .enumerate()
            .skip(self.scroll_top)
            .take(visible_rows)
    }
}
