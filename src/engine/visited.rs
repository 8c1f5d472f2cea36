// src/engine/visited.rs

use std::collections::HashSet;

use crate::engine::TaskId;

/// Identifiers already entered during one top-level invocation.
///
/// Threaded by `&mut` through the orchestrator's recursion so that a task
/// referenced from several hooks runs once, and a hook cycle terminates.
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    seen: HashSet<TaskId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as visited. Returns false if it already was.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
