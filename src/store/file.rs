//! # Filesystem-backed token store
//!
//! [`FileStore`] keeps one file per slot under a base directory, so a
//! session survives process restarts:
//!
//! ```text
//! <base_dir>/
//! ├── accessToken
//! ├── refreshToken
//! └── userData
//! ```
//!
//! I/O failures are logged at `warn` and otherwise ignored. An unreadable
//! directory behaves like an empty store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Slot, TokenStore};

#[derive(Debug, Clone)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn slot_path(&self, slot: Slot) -> PathBuf {
        self.base.join(slot.key())
    }
}

impl TokenStore for FileStore {
    fn get(&self, slot: Slot) -> Option<String> {
        match std::fs::read_to_string(self.slot_path(slot)) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(error = %e, slot = slot.key(), "Token store read failed");
                None
            }
        }
    }

    fn set(&self, slot: Slot, value: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.base) {
            tracing::warn!(error = %e, path = %self.base.display(), "Token store unavailable");
            return;
        }
        // Write-then-rename so a crash never leaves a truncated value.
        let path = self.slot_path(slot);
        let tmp = path.with_extension("tmp");
        let result = std::fs::write(&tmp, value).and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::warn!(error = %e, slot = slot.key(), "Token store write failed");
            let _ = std::fs::remove_file(&tmp);
        }
    }

    fn clear(&self, slot: Slot) {
        match std::fs::remove_file(self.slot_path(slot)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, slot = slot.key(), "Token store clear failed");
            }
        }
    }
}
