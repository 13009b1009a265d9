use uuid::Uuid;

use crate::document::EntityId;

/// Source of fresh identifiers for new layers and objects.
///
/// Handed to the store on every call so that tests can swap in a
/// deterministic sequence.
pub trait IdGenerator {
    fn next_id(&mut self) -> EntityId;
}

/// Random v4 UUIDs. The default for real documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&mut self) -> EntityId {
        EntityId::new(Uuid::new_v4().to_string())
    }
}

/// `prefix-1`, `prefix-2`, ... Predictable ids for tests and fixtures.
#[derive(Clone, Debug)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> EntityId {
        let id = EntityId::new(format!("{}-{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}
