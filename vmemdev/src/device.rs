//! Device lifecycle
//!
//! [`Device::init`] plays the role of loading the driver: it validates the
//! configuration, allocates the store and makes it reachable through the
//! registry. [`Device::exit`] undoes that. Both report what happened
//! through `tracing`, as a driver would through the kernel log.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::DeviceConfig;
use crate::error::{DeviceError, StoreError};
use crate::registry::Registry;
use crate::session::Session;
use crate::store::BufferStore;

/// A loaded device: one store attached to a registry under a name
///
/// The device is unloaded by [`exit`](Self::exit), or on drop.
pub struct Device {
    registry: Arc<Registry>,
    config: DeviceConfig,
    store: Arc<BufferStore>,
    loaded: bool,
}

impl Device {
    /// Allocate the store and attach it under `config.name`
    ///
    /// # Errors
    /// - [`StoreError::InvalidConfiguration`](crate::StoreError::InvalidConfiguration)
    ///   if `config.buf_size` is zero
    /// - [`StoreError::AllocationFailure`](crate::StoreError::AllocationFailure)
    ///   if the buffer cannot be allocated
    /// - [`DeviceError::AlreadyExists`] if the name is taken
    pub fn init(registry: Arc<Registry>, config: DeviceConfig) -> Result<Self, DeviceError> {
        let name = config.name.as_str();

        let store = BufferStore::new(config.buf_size).map_err(|e| {
            match e {
                StoreError::InvalidConfiguration => {
                    error!(device = name, "invalid buf_size = {}", config.buf_size);
                }
                StoreError::AllocationFailure { requested } => {
                    error!(device = name, "failed to allocate {requested} bytes");
                }
                other => error!(device = name, "failed to create store: {other}"),
            }
            DeviceError::from(e)
        })?;

        let store = registry.attach(name, store).map_err(|e| {
            error!(device = name, "registration failed: {e}");
            e
        })?;

        info!(
            device = name,
            "initialized size = {} bytes ({})",
            store.capacity(),
            config.path()
        );

        Ok(Self {
            registry,
            config,
            store,
            loaded: true,
        })
    }

    /// Open a session on this device
    #[must_use]
    pub fn open(&self) -> Session {
        self.store.open()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Path clients open, e.g. `/dev/vmemdev`
    #[must_use]
    pub fn path(&self) -> String {
        self.config.path()
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<BufferStore> {
        &self.store
    }

    /// Detach the store and unload the device
    ///
    /// Open sessions are not drained. They keep the region alive until
    /// they close, but new opens by name fail.
    pub fn exit(mut self) {
        self.unload();
    }

    fn unload(&mut self) {
        if !self.loaded {
            return;
        }
        self.loaded = false;

        let name = self.config.name.as_str();
        // The name may have been reused by another store
        if !self.registry.detach_if(name, &self.store) {
            warn!(device = name, "store was already detached");
        }

        // One reference is held by `self.store`
        let open_sessions = Arc::strong_count(&self.store) - 1;
        if open_sessions > 0 {
            warn!(device = name, open_sessions, "unloading with open sessions");
        }
        info!(device = name, "unloaded");
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device(name={}, size={}, loaded={})",
            self.config.name,
            self.store.capacity(),
            self.loaded
        )
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.unload();
    }
}
