//! Where paged nodes come from

use std::collections::HashMap;
use std::fmt;

use crate::core::Error;
use crate::core::types::Result;
use crate::scene::NodeRef;

/// Produces the node for a source id. Called on the pager's blocking pool.
pub trait NodeSource: Send + Sync {
    fn load(&self, source_id: &str) -> Result<NodeRef>;
}

impl<F> NodeSource for F
where
    F: Fn(&str) -> Result<NodeRef> + Send + Sync,
{
    fn load(&self, source_id: &str) -> Result<NodeRef> {
        self(source_id)
    }
}

type Factory = Box<dyn Fn() -> NodeRef + Send + Sync>;

/// In-memory source: each id maps to a factory building a fresh node.
#[derive(Default)]
pub struct MemorySource {
    factories: HashMap<String, Factory>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for `source_id`.
    pub fn insert<F>(&mut self, source_id: impl Into<String>, factory: F)
    where
        F: Fn() -> NodeRef + Send + Sync + 'static,
    {
        self.factories.insert(source_id.into(), Box::new(factory));
    }

    pub fn with<F>(mut self, source_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> NodeRef + Send + Sync + 'static,
    {
        self.insert(source_id, factory);
        self
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.factories.contains_key(source_id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("MemorySource").field("ids", &ids).finish()
    }
}

impl NodeSource for MemorySource {
    fn load(&self, source_id: &str) -> Result<NodeRef> {
        let factory = self
            .factories
            .get(source_id)
            .ok_or_else(|| Error::Load(format!("unknown source id '{source_id}'")))?;
        Ok(factory())
    }
}
