use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::assets::decode::ImageSource;
use crate::foundation::core::ImageId;
use crate::foundation::error::{StoryResult, lock_poisoned};

/// External key-value store of original uploads, consulted by the execution context on a
/// cache miss when a request carries no image data.
pub trait OriginalsStore: Send + Sync {
    /// Source for `id`, or `None` when the store has nothing under that id.
    fn load(&self, id: &ImageId) -> StoryResult<Option<ImageSource>>;
}

/// Thread-safe in-memory originals.
#[derive(Debug, Default)]
pub struct InMemoryOriginals {
    entries: RwLock<HashMap<ImageId, ImageSource>>,
}

impl InMemoryOriginals {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an original.
    pub fn insert(&self, id: ImageId, source: ImageSource) -> StoryResult<()> {
        self.entries
            .write()
            .map_err(|_| lock_poisoned("originals"))?
            .insert(id, source);
        Ok(())
    }

    /// Remove an original; returns whether it existed.
    pub fn remove(&self, id: &ImageId) -> StoryResult<bool> {
        Ok(self
            .entries
            .write()
            .map_err(|_| lock_poisoned("originals"))?
            .remove(id)
            .is_some())
    }
}

impl OriginalsStore for InMemoryOriginals {
    fn load(&self, id: &ImageId) -> StoryResult<Option<ImageSource>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| lock_poisoned("originals"))?
            .get(id)
            .cloned())
    }
}

/// Originals stored as `<root>/<id>` files. Ids containing path separators never resolve.
#[derive(Clone, Debug)]
pub struct DirectoryOriginals {
    root: PathBuf,
}

impl DirectoryOriginals {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl OriginalsStore for DirectoryOriginals {
    fn load(&self, id: &ImageId) -> StoryResult<Option<ImageSource>> {
        let name = id.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Ok(None);
        }
        let path = self.root.join(name);
        Ok(path.is_file().then(|| ImageSource::File(path)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/originals.rs"]
mod tests;
