use crate::models::ViewMode;
use crate::store::{KeyValueStore, StoreError};
use crate::utils;

pub const VIEW_MODE_KEY: &str = "dashboard-view-mode";

/// Per-user dashboard settings.
pub struct Preferences<S> {
    store: S,
    view_mode_key: String,
}

impl<S: KeyValueStore> Preferences<S> {
    pub fn new(store: S, email: &str) -> Self {
        Self {
            store,
            view_mode_key: utils::namespaced_key(email, VIEW_MODE_KEY),
        }
    }

    /// Stored as the bare string `grid` or `list`; anything else reads as grid.
    pub fn view_mode(&self) -> Result<ViewMode, StoreError> {
        Ok(self
            .store
            .get(&self.view_mode_key)?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }

    pub fn set_view_mode(&self, mode: ViewMode) -> Result<(), StoreError> {
        self.store.set(&self.view_mode_key, mode.as_str())
    }
}
