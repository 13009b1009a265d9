use std::path::PathBuf;
use uuid::Uuid;

use crate::document::{Document, EntityId};
use crate::history::{DocumentSnapshot, HistoryManager, SnapshotCommand};
use crate::ids::{IdGenerator, UuidIds};
use crate::intent::Intent;
use crate::io::{self, DocError};
use crate::settings::Settings;
use crate::store::{self, Outcome};

/// Single open document with its history and file binding.
pub struct Project {
    pub id: Uuid,
    pub document: Document,
    pub history: HistoryManager,
    ids: Box<dyn IdGenerator + Send + Sync>,
    /// `None` for unsaved/untitled documents.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, settings: &Settings) -> Self {
        Self {
            id: Uuid::new_v4(),
            document: Document::new(),
            history: history_for(settings),
            ids: Box::new(UuidIds),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    pub fn open(path: PathBuf, settings: &Settings) -> Result<Self, DocError> {
        let document = io::load_document(&path)?;
        let mut project = Self {
            id: Uuid::new_v4(),
            document,
            history: history_for(settings),
            ids: Box::new(UuidIds),
            path: Some(path),
            is_dirty: false,
            name: String::new(),
        };
        project.update_name_from_path();
        Ok(project)
    }

    /// Swap the id source, e.g. for reproducible fixtures.
    pub fn with_ids(mut self, ids: impl IdGenerator + Send + Sync + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Apply an intent, recording an undo step when it changed the document.
    pub fn dispatch(&mut self, intent: Intent) -> Outcome {
        let undoable = intent.is_undoable();
        let description = intent.description();
        let before = undoable.then(|| DocumentSnapshot::capture(&self.document));

        let outcome = store::apply(&mut self.document, intent, self.ids.as_mut());

        if outcome.is_applied()
            && let Some(before) = before
        {
            self.history.push(Box::new(SnapshotCommand::new(description, before, &self.document)));
            self.mark_dirty();
        }
        outcome
    }

    pub fn undo(&mut self) -> Option<String> {
        let done = self.history.undo(&mut self.document);
        if done.is_some() {
            self.mark_dirty();
        }
        done
    }

    pub fn redo(&mut self) -> Option<String> {
        let done = self.history.redo(&mut self.document);
        if done.is_some() {
            self.mark_dirty();
        }
        done
    }

    pub fn next_id(&mut self) -> EntityId {
        self.ids.next_id()
    }

    /// Write to `path` and bind the project to it.
    pub fn save_as(&mut self, path: PathBuf) -> Result<(), DocError> {
        io::save_document(&self.document, &path)?;
        self.path = Some(path);
        self.update_name_from_path();
        self.mark_clean();
        Ok(())
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

fn history_for(settings: &Settings) -> HistoryManager {
    HistoryManager::new(settings.max_undo_steps).with_memory_limit(settings.history_memory_limit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Coordinate, ImageDescriptor};
    use crate::ids::SequentialIds;
    use tempfile::TempDir;

    fn project() -> Project {
        Project::new_untitled(1, &Settings::default()).with_ids(SequentialIds::new("p"))
    }

    #[test]
    fn dispatch_records_undo_steps_and_marks_dirty() {
        let mut p = project();
        assert_eq!(p.display_title(), "Untitled-1");
        let _ = p.dispatch(Intent::AddLayer);
        let _ = p.dispatch(Intent::Translate { id: EntityId::from("p-1"), position: Coordinate::new(3.0, 4.0) });
        assert!(p.is_dirty);
        assert_eq!(p.display_title(), "Untitled-1*");
        assert_eq!(p.history.undo_count(), 2);

        assert!(p.undo().is_some());
        assert_eq!(p.document.layers[0].position, Coordinate::ORIGIN);
        assert!(p.undo().is_some());
        assert!(p.document.layers.is_empty());
        assert_eq!(p.document.selected_entity, None);
        assert!(p.redo().is_some());
        assert_eq!(p.document.layers.len(), 1);
    }

    #[test]
    fn ignored_and_cache_intents_skip_history() {
        let mut p = project();
        let _ = p.dispatch(Intent::Delete { id: EntityId::from("missing") });
        let _ = p.dispatch(Intent::SetImageCache { image: Some(ImageDescriptor::new("c.png", 1, 1)) });
        assert_eq!(p.history.undo_count(), 0);
        assert!(!p.is_dirty);
        assert!(p.document.image_cache.is_some());
    }

    #[test]
    fn save_as_binds_path_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.ldoc");
        let mut p = project();
        let _ = p.dispatch(Intent::AddLayer);
        p.save_as(path.clone()).unwrap();
        assert_eq!(p.display_title(), "scene.ldoc");

        let reopened = Project::open(path, &Settings::default()).unwrap();
        assert_eq!(reopened.document, p.document);
        assert_eq!(reopened.name, "scene.ldoc");
    }

    #[test]
    fn oversized_document_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crowded.ldoc");
        let mut p = project();
        for _ in 0..257 {
            let _ = p.dispatch(Intent::AddLayer);
        }
        assert!(matches!(p.save_as(path.clone()), Err(DocError::InvalidFormat(_))));
        assert!(!path.exists());
        assert_eq!(p.path, None);
        assert!(p.is_dirty);
    }
}
