//! Named stores
//!
//! Stands in for the `/dev` directory: each attached store is reachable by
//! a well-known name, and clients open sessions on it by name or by
//! `/dev/<name>` path.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::DeviceError;
use crate::session::Session;
use crate::store::BufferStore;

/// Prefix accepted in front of device names by [`Registry::open`]
pub const DEV_PREFIX: &str = "/dev/";

/// Name → store mapping shared by device lifecycles and clients
///
/// Every client that opens a name gets full read-write access; there is no
/// per-client permission model.
pub struct Registry {
    stores: Mutex<HashMap<String, Arc<BufferStore>>>,
}

impl Registry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Make `store` reachable under `name`
    ///
    /// # Errors
    /// [`DeviceError::AlreadyExists`] if the name is taken
    pub fn attach(
        &self,
        name: &str,
        store: BufferStore,
    ) -> Result<Arc<BufferStore>, DeviceError> {
        let mut stores = self.stores.lock();
        if stores.contains_key(name) {
            return Err(DeviceError::AlreadyExists(name.to_string()));
        }

        let store = Arc::new(store);
        stores.insert(name.to_string(), Arc::clone(&store));
        debug!(name, capacity = store.capacity(), "attached store");
        Ok(store)
    }

    /// Remove `name` from the registry
    ///
    /// Sessions already open on the store keep working; the region is freed
    /// once the last of them closes.
    pub fn detach(&self, name: &str) -> Option<Arc<BufferStore>> {
        let store = self.stores.lock().remove(name);
        if store.is_some() {
            debug!(name, "detached store");
        }
        store
    }

    /// Remove `name` only while it still maps to `store`
    ///
    /// Returns `false`, leaving the registry untouched, if the name is
    /// free or attached to a different store.
    pub fn detach_if(&self, name: &str, store: &Arc<BufferStore>) -> bool {
        let mut stores = self.stores.lock();
        match stores.get(name) {
            Some(attached) if Arc::ptr_eq(attached, store) => {
                stores.remove(name);
                debug!(name, "detached store");
                true
            }
            _ => false,
        }
    }

    /// Get the store attached under `name`
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<BufferStore>> {
        self.stores.lock().get(name).cloned()
    }

    /// Open a session on the store at `path` (`name` or `/dev/name`)
    ///
    /// # Errors
    /// [`DeviceError::NotFound`] if nothing is attached under that name
    pub fn open(&self, path: &str) -> Result<Session, DeviceError> {
        let name = path.strip_prefix(DEV_PREFIX).unwrap_or(path);
        // Lock released before the session is created
        let store = self
            .lookup(name)
            .ok_or_else(|| DeviceError::NotFound(path.to_string()))?;
        Ok(store.open())
    }

    /// Names of all attached stores, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let stores = self.stores.lock();
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Detach all stores
    pub fn clear(&self) {
        self.stores.lock().clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
