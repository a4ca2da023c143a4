//! Per-caller view of a buffer store
//!
//! A [`Session`] is what a client holds after opening a device. It owns
//! the cursor; the bytes live in the shared [`BufferStore`].

use std::fmt;
use std::io;
use std::os::raw::c_int;
use std::sync::Arc;

use tracing::trace;

use crate::error::StoreError;
use crate::idgen::Handle;
use crate::store::BufferStore;
use crate::uaccess::{UserBuffer, UserBufferMut};

pub use libc::{SEEK_CUR, SEEK_END, SEEK_SET};

/// Origin of a seek offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// From the start of the buffer (`SEEK_SET`)
    Absolute,
    /// From the current cursor (`SEEK_CUR`)
    RelativeToCurrent,
    /// From the end of the buffer, i.e. its capacity (`SEEK_END`)
    RelativeToEnd,
}

impl TryFrom<c_int> for SeekMode {
    type Error = StoreError;

    fn try_from(whence: c_int) -> Result<Self, Self::Error> {
        match whence {
            SEEK_SET => Ok(Self::Absolute),
            SEEK_CUR => Ok(Self::RelativeToCurrent),
            SEEK_END => Ok(Self::RelativeToEnd),
            _ => Err(StoreError::InvalidArgument),
        }
    }
}

/// A caller's connection to a store
///
/// Holds the cursor at which the next read or write happens. The cursor
/// always stays within `0..=capacity`.
///
/// # Thread Safety
///
/// - **Independent cursors**: Sessions on the same store never share a
///   cursor. Seeking takes no lock at all.
/// - **Serialized copies**: Reads and writes from different sessions
///   serialize on the store's mutex, so each transfer is all-or-nothing
///   with respect to the others.
/// - **One caller per session**: every operation takes `&mut self`, so a
///   single session cannot be driven from two threads at once. Open one
///   session per thread instead.
pub struct Session {
    handle: Handle,
    store: Arc<BufferStore>,
    cursor: usize,
}

impl Session {
    pub(crate) fn new(handle: Handle, store: Arc<BufferStore>) -> Self {
        trace!(session = %handle, "open");
        Self {
            handle,
            store,
            cursor: 0,
        }
    }

    /// Get the session's handle
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Get the store this session is bound to
    #[must_use]
    pub fn store(&self) -> &Arc<BufferStore> {
        &self.store
    }

    /// Current cursor
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes between the cursor and the end of the buffer
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.store.capacity().saturating_sub(self.cursor)
    }

    /// Read from the cursor into `buf`
    ///
    /// Returns the number of bytes read; 0 means the cursor is at the end.
    ///
    /// # Errors
    /// See [`read_into`](Self::read_into)
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        self.read_into(buf)
    }

    /// Read from the cursor into caller memory
    ///
    /// Copies `min(dst.len(), capacity - cursor)` bytes and advances the
    /// cursor by that much.
    ///
    /// # Errors
    /// [`StoreError::Fault`] if `dst` cannot be written; the cursor does not
    /// move
    pub fn read_into<D>(&mut self, dst: &mut D) -> Result<usize, StoreError>
    where
        D: UserBufferMut + ?Sized,
    {
        let n = self.store.read_at(self.cursor, dst)?;
        trace!(session = %self.handle, pos = self.cursor, requested = dst.len(), n, "read");
        self.cursor += n;
        Ok(n)
    }

    /// Read up to `len` bytes from the cursor into a new vector
    ///
    /// # Errors
    /// See [`read_into`](Self::read_into)
    pub fn read_to_vec(&mut self, len: usize) -> Result<Vec<u8>, StoreError> {
        let mut buf = vec![0u8; len.min(self.remaining())];
        let n = self.read_into(buf.as_mut_slice())?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Write `buf` at the cursor
    ///
    /// Returns the number of bytes written; 0 means the cursor is at the end
    /// and nothing more fits.
    ///
    /// # Errors
    /// See [`write_from`](Self::write_from)
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, StoreError> {
        self.write_from(buf)
    }

    /// Write caller memory at the cursor
    ///
    /// Stores `min(src.len(), capacity - cursor)` bytes and advances the
    /// cursor by that much. The buffer never grows.
    ///
    /// # Errors
    /// [`StoreError::Fault`] if `src` cannot be read; the cursor and the
    /// region are unchanged
    pub fn write_from<S>(&mut self, src: &S) -> Result<usize, StoreError>
    where
        S: UserBuffer + ?Sized,
    {
        let n = self.store.write_at(self.cursor, src)?;
        trace!(session = %self.handle, pos = self.cursor, requested = src.len(), n, "write");
        self.cursor += n;
        Ok(n)
    }

    /// Move the cursor
    ///
    /// Returns the new position.
    ///
    /// # Errors
    /// [`StoreError::InvalidArgument`] if the resulting position is negative
    /// or past the capacity; the cursor does not move
    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> Result<u64, StoreError> {
        let capacity = self.store.capacity();
        let base = match mode {
            SeekMode::Absolute => 0,
            SeekMode::RelativeToCurrent => self.cursor,
            SeekMode::RelativeToEnd => capacity,
        };

        let new_pos = isize::try_from(offset)
            .ok()
            .and_then(|offset| base.checked_add_signed(offset))
            .filter(|pos| *pos <= capacity)
            .ok_or(StoreError::InvalidArgument)?;

        trace!(session = %self.handle, from = self.cursor, to = new_pos, ?mode, "seek");
        self.cursor = new_pos;
        Ok(new_pos as u64)
    }

    /// Seek with a raw `whence` value (`SEEK_SET`, `SEEK_CUR`, `SEEK_END`)
    ///
    /// # Errors
    /// [`StoreError::InvalidArgument`] for an unknown `whence` or an
    /// out-of-range result
    pub fn seek_raw(&mut self, offset: i64, whence: c_int) -> Result<u64, StoreError> {
        let mode = SeekMode::try_from(whence)?;
        self.seek(offset, mode)
    }

    /// Detach from the store
    ///
    /// Has no effect on the store's contents. Dropping the session does the
    /// same.
    pub fn close(self) {
        trace!(session = %self.handle, "close");
    }
}

impl io::Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Session::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for Session {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Session::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Writes land in the region immediately
        Ok(())
    }
}

impl io::Seek for Session {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, mode) = match pos {
            io::SeekFrom::Start(offset) => (
                i64::try_from(offset).map_err(|_| StoreError::InvalidArgument)?,
                SeekMode::Absolute,
            ),
            io::SeekFrom::Current(offset) => (offset, SeekMode::RelativeToCurrent),
            io::SeekFrom::End(offset) => (offset, SeekMode::RelativeToEnd),
        };
        Session::seek(self, offset, mode).map_err(io::Error::from)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session(handle={}, pos={}, capacity={})",
            self.handle,
            self.cursor,
            self.store.capacity()
        )
    }
}
