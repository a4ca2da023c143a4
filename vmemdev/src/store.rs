//! Fixed-capacity shared byte region
//!
//! Provides the store that backs a device: one zero-filled region whose
//! size is fixed at creation, guarded by a single mutex.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::idgen::{Handle, IdGen};
use crate::session::Session;
use crate::uaccess::{UserBuffer, UserBufferMut};

/// Fixed-capacity byte region shared by all sessions
///
/// The region is only reachable through copies: [`read_at`](Self::read_at)
/// copies out, [`write_at`](Self::write_at) copies in. Positions are owned
/// by the caller (see [`Session`]), so the store itself holds no cursor.
///
/// # Thread Safety
///
/// The region is wrapped in a `parking_lot::Mutex`. Reads and writes hold
/// it only while bytes are copied; requests that start at or past the end
/// return before locking. Capacity never changes and is read without the
/// lock.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vmemdev::BufferStore;
///
/// let store = Arc::new(BufferStore::new(16).unwrap());
/// let mut session = store.open();
/// assert_eq!(session.write(b"hello").unwrap(), 5);
/// session.seek(0, vmemdev::SeekMode::Absolute).unwrap();
///
/// let mut buf = [0u8; 5];
/// assert_eq!(session.read(&mut buf).unwrap(), 5);
/// assert_eq!(&buf, b"hello");
/// ```
pub struct BufferStore {
    region: Mutex<Box<[u8]>>,
    capacity: usize,
    id_gen: IdGen,
}

impl BufferStore {
    /// Allocate a zero-filled store of `capacity` bytes
    ///
    /// # Errors
    /// - [`StoreError::InvalidConfiguration`] if `capacity` is zero
    /// - [`StoreError::AllocationFailure`] if the allocator cannot provide
    ///   the region
    pub fn new(capacity: usize) -> Result<Self, StoreError> {
        if capacity == 0 {
            return Err(StoreError::InvalidConfiguration);
        }

        let mut region = Vec::new();
        region
            .try_reserve_exact(capacity)
            .map_err(|_| StoreError::AllocationFailure {
                requested: capacity,
            })?;
        region.resize(capacity, 0);

        Ok(Self {
            region: Mutex::new(region.into_boxed_slice()),
            capacity,
            id_gen: IdGen::new(),
        })
    }

    /// Size of the region in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a new session with its cursor at 0
    #[must_use]
    pub fn open(self: &Arc<Self>) -> Session {
        let handle = Handle::new(self.id_gen.get_next());
        self.open_with_handle(handle)
    }

    /// Open a new session with an explicit handle
    #[must_use]
    pub fn open_with_handle(self: &Arc<Self>, handle: Handle) -> Session {
        Session::new(handle, Arc::clone(self))
    }

    /// Copy bytes starting at `pos` into `dst`
    ///
    /// Returns the number of bytes copied, `min(dst.len(), capacity - pos)`,
    /// or 0 when `pos` is at or past the end.
    ///
    /// # Errors
    /// [`StoreError::Fault`] if `dst` rejects the copy
    pub fn read_at<D>(&self, pos: usize, dst: &mut D) -> Result<usize, StoreError>
    where
        D: UserBufferMut + ?Sized,
    {
        let Some(to_read) = self.clamp(pos, dst.len()) else {
            return Ok(0);
        };

        let region = self.region.lock();
        // `clamp` guarantees pos + to_read <= capacity
        #[allow(clippy::indexing_slicing)]
        {
            dst.copy_to_user(&region[pos..pos + to_read])
                .map_err(|_| StoreError::Fault)?;
        }
        drop(region);

        Ok(to_read)
    }

    /// Copy bytes from `src` into the region starting at `pos`
    ///
    /// Returns the number of bytes stored, `min(src.len(), capacity - pos)`,
    /// or 0 when `pos` is at or past the end. Never grows the region.
    ///
    /// # Errors
    /// [`StoreError::Fault`] if `src` rejects the copy; the region is left
    /// unchanged
    pub fn write_at<S>(&self, pos: usize, src: &S) -> Result<usize, StoreError>
    where
        S: UserBuffer + ?Sized,
    {
        let Some(to_write) = self.clamp(pos, src.len()) else {
            return Ok(0);
        };

        let mut region = self.region.lock();
        #[allow(clippy::indexing_slicing)]
        {
            src.copy_from_user(&mut region[pos..pos + to_write])
                .map_err(|_| StoreError::Fault)?;
        }
        drop(region);

        Ok(to_write)
    }

    /// Copy the whole region out under the lock
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.region.lock().to_vec()
    }

    /// Number of bytes a transfer of `requested` bytes at `pos` may move,
    /// or `None` when `pos` is at or past the end
    fn clamp(&self, pos: usize, requested: usize) -> Option<usize> {
        if pos >= self.capacity {
            return None;
        }
        Some(requested.min(self.capacity - pos))
    }
}

impl fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferStore(capacity={})", self.capacity)
    }
}
