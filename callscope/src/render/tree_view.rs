//! Lazy tree model for interactive call-tree widgets.
//!
//! Holds only the set of expanded nodes. Rows are produced on demand by
//! walking the roots and, below them, the children of expanded nodes only,
//! so a thread with a million calls costs nothing until it is opened.
//!
//! A TUI or GUI adapts [`CallTreeView::rows`] to its own list widget and maps
//! key presses or clicks to [`CallTreeView::toggle`].

use std::collections::BTreeSet;

use crate::analysis::ThreadCallTree;
use crate::domain::{format_duration, CallId};

/// One visible line of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub call_id: CallId,
    pub depth: usize,
    pub label: String,
    pub expandable: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone)]
pub struct CallTreeView<'a> {
    tree: &'a ThreadCallTree,
    expanded: BTreeSet<CallId>,
}

impl<'a> CallTreeView<'a> {
    /// Fully collapsed view: only the roots are visible.
    #[must_use]
    pub fn new(tree: &'a ThreadCallTree) -> Self {
        Self { tree, expanded: BTreeSet::new() }
    }

    /// Expand `call_id`. Returns false for leaves and unknown calls.
    pub fn expand(&mut self, call_id: CallId) -> bool {
        if !self.tree.has_children(call_id) {
            return false;
        }
        self.expanded.insert(call_id);
        true
    }

    /// Collapse `call_id`. Expansion state below it is kept for re-opening.
    pub fn collapse(&mut self, call_id: CallId) {
        self.expanded.remove(&call_id);
    }

    /// Returns the new expansion state.
    pub fn toggle(&mut self, call_id: CallId) -> bool {
        if self.expanded.contains(&call_id) {
            self.collapse(call_id);
            false
        } else {
            self.expand(call_id)
        }
    }

    /// Expand every node whose depth is below `depth` (0 = roots only).
    pub fn expand_to_depth(&mut self, depth: usize) {
        let mut frontier: Vec<(CallId, usize)> =
            self.tree.root_calls.iter().map(|&id| (id, 0)).collect();
        while let Some((id, level)) = frontier.pop() {
            if level < depth && self.expand(id) {
                frontier.extend(self.tree.children_of(id).iter().map(|&child| (child, level + 1)));
            }
        }
    }

    #[must_use]
    pub fn is_expanded(&self, call_id: CallId) -> bool {
        self.expanded.contains(&call_id)
    }

    /// `name (duration)` for a call, or `None` if it is not in this tree.
    #[must_use]
    pub fn label(&self, call_id: CallId) -> Option<String> {
        let record = self.tree.record(call_id)?;
        let duration = record.duration().map_or_else(|| "running".to_string(), format_duration);
        Some(format!("{} ({duration})", record.qualified_name))
    }

    /// Visible rows in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        let mut pending: Vec<(CallId, usize)> =
            self.tree.root_calls.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = pending.pop() {
            let Some(label) = self.label(id) else {
                continue;
            };
            let expanded = self.is_expanded(id);
            rows.push(TreeRow {
                call_id: id,
                depth,
                label,
                expandable: self.tree.has_children(id),
                expanded,
            });
            if expanded {
                pending.extend(self.tree.children_of(id).iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        rows
    }
}
