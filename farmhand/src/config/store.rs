//! Shared settings store.
//!
//! [`SettingsHandle`] is the synchronous key-value store read by the engine.
//! Writers replace the whole settings value; readers take cheap snapshots and
//! can subscribe to a revision counter that is bumped on every change.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use super::keys::{SettingKey, SettingKeyError};
use super::settings::FarmSettings;

struct Inner {
    current: RwLock<Arc<FarmSettings>>,
    revision: watch::Sender<u64>,
}

/// Cloneable handle to the live farming settings.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<Inner>,
}

impl SettingsHandle {
    /// Creates a store holding `settings` (clamped).
    pub fn new(settings: FarmSettings) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(settings.clamped())),
                revision,
            }),
        }
    }

    /// Returns the current settings.
    ///
    /// The snapshot is immutable; later writes do not affect it.
    pub fn snapshot(&self) -> Arc<FarmSettings> {
        Arc::clone(&self.inner.current.read())
    }

    /// Reads one value by key.
    pub fn get(&self, key: SettingKey) -> String {
        key.get(&self.snapshot())
    }

    /// Writes one value by key (clamped) and notifies subscribers.
    pub fn set(&self, key: SettingKey, value: &str) -> Result<(), SettingKeyError> {
        let mut next = (*self.snapshot()).clone();
        key.set(&mut next, value)?;
        self.replace(next);
        Ok(())
    }

    /// Replaces every setting at once (clamped) and notifies subscribers.
    pub fn update(&self, settings: FarmSettings) {
        self.replace(settings.clamped());
    }

    /// Subscribes to change notifications.
    ///
    /// The receiver's value is a revision counter; use `has_changed()` or
    /// `changed().await` to observe writes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Current revision (number of writes so far).
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    fn replace(&self, settings: FarmSettings) {
        {
            let mut current = self.inner.current.write();
            if **current == settings {
                return;
            }
            *current = Arc::new(settings);
        }
        self.inner.revision.send_modify(|rev| *rev += 1);
        tracing::debug!(revision = self.revision(), "Farm settings updated");
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(FarmSettings::default())
    }
}

impl std::fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}
