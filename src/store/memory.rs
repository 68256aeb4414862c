use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Slot, TokenStore};

/// In-process store. Survives for the lifetime of the value only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Slot, String>> {
        // A panic mid-write cannot leave a half-written String behind.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.slots().get(&slot).cloned()
    }

    fn set(&self, slot: Slot, value: &str) {
        self.slots().insert(slot, value.to_owned());
    }

    fn clear(&self, slot: Slot) {
        self.slots().remove(&slot);
    }

    fn clear_all(&self) {
        self.slots().clear();
    }
}
