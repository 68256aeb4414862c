//! Durable key/value persistence for the three session slots.
//!
//! A [`TokenStore`] is a passive surface: it never validates what it holds
//! and never fails. Implementations whose backing storage is unavailable
//! silently drop writes and read back nothing, which the session treats as
//! "never authenticated".
//!
//! | Slot | Key | Value |
//! |------|-----|-------|
//! | [`Slot::AccessToken`] | `accessToken` | bearer token |
//! | [`Slot::RefreshToken`] | `refreshToken` | rotating refresh token |
//! | [`Slot::UserData`] | `userData` | JSON-serialized [`UserProfile`](crate::UserProfile) |

mod file;
mod memory;

use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;

/// One of the persisted session values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    AccessToken,
    RefreshToken,
    UserData,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::AccessToken, Slot::RefreshToken, Slot::UserData];

    /// Storage key for this slot.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
            Self::UserData => "userData",
        }
    }
}

/// Consumer-provided persistence for session values.
///
/// Writes overwrite. None of the operations report errors; storage failures
/// are logged and swallowed by the implementation.
pub trait TokenStore: Send + Sync {
    fn get(&self, slot: Slot) -> Option<String>;

    fn set(&self, slot: Slot, value: &str);

    fn clear(&self, slot: Slot);

    /// Clear every slot.
    fn clear_all(&self) {
        for slot in Slot::ALL {
            self.clear(slot);
        }
    }
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn get(&self, slot: Slot) -> Option<String> {
        (**self).get(slot)
    }

    fn set(&self, slot: Slot, value: &str) {
        (**self).set(slot, value);
    }

    fn clear(&self, slot: Slot) {
        (**self).clear(slot);
    }

    fn clear_all(&self) {
        (**self).clear_all();
    }
}

/// Store standing in for disabled storage: every read is empty and every
/// write is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStore;

impl TokenStore for DisabledStore {
    fn get(&self, _slot: Slot) -> Option<String> {
        None
    }

    fn set(&self, _slot: Slot, _value: &str) {}

    fn clear(&self, _slot: Slot) {}
}
