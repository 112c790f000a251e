use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::encode::EncodedImage;

/// URL-like reference to a displayed preview. Valid until revoked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    id: u64,
    url: String,
}

impl DisplayHandle {
    /// `storyframe://preview/<n>`.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    live: HashMap<u64, EncodedImage>,
}

/// Issues, resolves and revokes [`DisplayHandle`]s. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

impl HandleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every critical section is a single map operation, so a poisoned guard is still
        // consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an encoded image and return its handle.
    pub fn create(&self, image: EncodedImage) -> DisplayHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id, image);
        DisplayHandle {
            id,
            url: format!("storyframe://preview/{id}"),
        }
    }

    /// Image behind a live handle.
    pub fn resolve(&self, handle: &DisplayHandle) -> Option<EncodedImage> {
        self.lock().live.get(&handle.id).cloned()
    }

    /// Free a handle. Returns false if it was already revoked.
    pub fn revoke(&self, handle: &DisplayHandle) -> bool {
        self.lock().live.remove(&handle.id).is_some()
    }

    /// Number of handles not yet revoked.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/handles.rs"]
mod tests;
