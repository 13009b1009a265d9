use std::collections::VecDeque;

use crate::document::{Document, Layer, SelectedEntity};

// ============================================================================
// COMMAND TRAIT
// ============================================================================

pub trait Command: Send + Sync {
    fn undo(&self, doc: &mut Document);
    fn redo(&self, doc: &mut Document);
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;
}

// ============================================================================
// SNAPSHOT COMMAND: restores layers + selection around one applied intent
// ============================================================================

/// Layers and selection at one point in time. The composite cache is not
/// captured; restoring a snapshot always invalidates it.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    layers: Vec<Layer>,
    selected_entity: Option<SelectedEntity>,
}

impl DocumentSnapshot {
    pub fn capture(doc: &Document) -> Self {
        Self {
            layers: doc.layers.clone(),
            selected_entity: doc.selected_entity.clone(),
        }
    }

    pub fn restore_into(&self, doc: &mut Document) {
        doc.layers = self.layers.clone();
        doc.selected_entity = self.selected_entity.clone();
        doc.invalidate_cache();
    }

    fn memory_bytes(&self) -> usize {
        bincode::serialized_size(&self.layers)
            .map(|n| n as usize)
            .unwrap_or_else(|_| self.layers.len() * std::mem::size_of::<Layer>())
    }
}

pub struct SnapshotCommand {
    description: String,
    before: DocumentSnapshot,
    after: DocumentSnapshot,
}

impl SnapshotCommand {
    pub fn new(description: String, before: DocumentSnapshot, after: &Document) -> Self {
        Self {
            description,
            before,
            after: DocumentSnapshot::capture(after),
        }
    }
}

impl Command for SnapshotCommand {
    fn undo(&self, doc: &mut Document) {
        self.before.restore_into(doc);
    }

    fn redo(&self, doc: &mut Document) {
        self.after.restore_into(doc);
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn memory_size(&self) -> usize {
        self.before.memory_bytes() + self.after.memory_bytes() + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with memory limits
// ============================================================================

/// Undo/redo history with a step cap and an optional memory cap.
pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_history_size: usize,
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size,
            max_memory_bytes: Some(64 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// `None` removes the memory cap.
    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_bytes;
        self
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        // A new action invalidates everything that was undone
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);
        self.prune();
    }

    pub fn undo(&mut self, doc: &mut Document) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description();
        command.undo(doc);
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, doc: &mut Document) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description();
        command.redo(doc);
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        // Always keep the newest step, even if it alone exceeds the cap
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::EntityId;

    fn step(doc: &mut Document, history: &mut HistoryManager, name: &str) {
        let before = DocumentSnapshot::capture(doc);
        doc.layers.push(Layer::new(EntityId::from(name)));
        history.push(Box::new(SnapshotCommand::new(format!("Add {}", name), before, doc)));
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut doc = Document::new();
        let mut history = HistoryManager::new(10);
        step(&mut doc, &mut history, "a");
        step(&mut doc, &mut history, "b");

        assert_eq!(history.undo(&mut doc).as_deref(), Some("Add b"));
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(history.redo(&mut doc).as_deref(), Some("Add b"));
        assert_eq!(doc.layers.len(), 2);
        assert_eq!(history.undo_history(), vec!["Add b".to_string(), "Add a".to_string()]);
    }

    #[test]
    fn new_step_drops_redo_stack() {
        let mut doc = Document::new();
        let mut history = HistoryManager::new(10);
        step(&mut doc, &mut history, "a");
        let _ = history.undo(&mut doc);
        assert!(history.can_redo());
        assert!(!history.can_undo());
        assert_eq!(history.redo_count(), 1);
        step(&mut doc, &mut history, "c");
        assert!(!history.can_redo());
        assert!(history.can_undo());
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn count_cap_discards_oldest() {
        let mut doc = Document::new();
        let mut history = HistoryManager::new(2);
        for name in ["a", "b", "c"] {
            step(&mut doc, &mut history, name);
        }
        assert_eq!(history.undo_count(), 2);
        while history.undo(&mut doc).is_some() {}
        assert_eq!(doc.layers.len(), 1);
    }

    #[test]
    fn memory_cap_keeps_latest_step() {
        let mut doc = Document::new();
        let mut history = HistoryManager::new(100).with_memory_limit(Some(1));
        step(&mut doc, &mut history, "a");
        step(&mut doc, &mut history, "b");
        assert_eq!(history.undo_count(), 1);
        assert!(history.memory_usage() > 0);
    }

    #[test]
    fn empty_history_is_inert() {
        let mut doc = Document::new();
        let mut history = HistoryManager::default();
        assert_eq!(history.undo(&mut doc), None);
        assert_eq!(history.redo(&mut doc), None);
        history.clear();
        assert_eq!(history.memory_usage(), 0);
    }
}
