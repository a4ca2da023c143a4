//! POSIX-style descriptor interface
//!
//! One [`FdTable`] per client. It maps small integer descriptors to
//! [`Session`]s and reports results the way file syscalls do: a
//! non-negative count or position on success, a negated errno on failure.

use std::collections::BTreeMap;
use std::os::raw::c_int;
use std::sync::Arc;

use tracing::debug;

use crate::error::DeviceError;
use crate::registry::Registry;
use crate::session::Session;
use crate::uaccess::{UserBuffer, UserBufferMut};

/// A client's open descriptors
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vmemdev::{BufferStore, FdTable, Registry, SEEK_SET};
///
/// let registry = Arc::new(Registry::new());
/// registry.attach("vmemdev", BufferStore::new(64).unwrap()).unwrap();
///
/// let mut fds = FdTable::new(Arc::clone(&registry));
/// let fd = fds.open("/dev/vmemdev");
/// assert!(fd >= 0);
/// assert_eq!(fds.write(fd, b"hello".as_slice()), 5);
/// assert_eq!(fds.lseek(fd, 0, SEEK_SET), 0);
///
/// // Reads are not limited to what was written: the rest is zeroes
/// let mut buf = [0u8; 8];
/// assert_eq!(fds.read(fd, buf.as_mut_slice()), 8);
/// assert_eq!(&buf, b"hello\0\0\0");
/// assert_eq!(fds.close(fd), 0);
/// ```
pub struct FdTable {
    registry: Arc<Registry>,
    /// fd → Session mapping
    table: BTreeMap<c_int, Session>,
}

impl FdTable {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            table: BTreeMap::new(),
        }
    }

    /// Open the device at `path`, returning the lowest free descriptor or
    /// `-ENOENT`
    pub fn open(&mut self, path: &str) -> c_int {
        match self.registry.open(path) {
            Ok(session) => {
                let fd = self.lowest_free_fd();
                debug!(fd, path, session = %session.handle(), "open");
                self.table.insert(fd, session);
                fd
            }
            Err(e) => {
                debug!(path, "open failed: {e}");
                -e.errno()
            }
        }
    }

    /// Read into `dst`, returning the byte count (0 at the end of the
    /// buffer), `-EBADF` or `-EFAULT`
    pub fn read<D>(&mut self, fd: c_int, dst: &mut D) -> isize
    where
        D: UserBufferMut + ?Sized,
    {
        status(
            self.session(fd)
                .and_then(|session| session.read_into(dst).map_err(DeviceError::from)),
        )
    }

    /// Write from `src`, returning the byte count (0 when the buffer is full
    /// at the cursor), `-EBADF` or `-EFAULT`
    pub fn write<S>(&mut self, fd: c_int, src: &S) -> isize
    where
        S: UserBuffer + ?Sized,
    {
        status(
            self.session(fd)
                .and_then(|session| session.write_from(src).map_err(DeviceError::from)),
        )
    }

    /// Reposition `fd`, returning the new offset, `-EBADF` or `-EINVAL`
    pub fn lseek(&mut self, fd: c_int, offset: i64, whence: c_int) -> i64 {
        match self
            .session(fd)
            .and_then(|session| session.seek_raw(offset, whence).map_err(DeviceError::from))
        {
            Ok(pos) => i64::try_from(pos).unwrap_or(i64::MAX),
            Err(e) => -i64::from(e.errno()),
        }
    }

    /// Close `fd`. Always returns 0; closing an unknown descriptor is a
    /// no-op.
    pub fn close(&mut self, fd: c_int) -> c_int {
        match self.table.remove(&fd) {
            Some(session) => {
                debug!(fd, session = %session.handle(), "close");
                session.close();
            }
            None => debug!(fd, "close on unknown fd ignored"),
        }
        0
    }

    /// Get the session behind `fd`
    #[must_use]
    pub fn get(&self, fd: c_int) -> Option<&Session> {
        self.table.get(&fd)
    }

    /// All open descriptors, ascending
    pub fn open_fds(&self) -> impl Iterator<Item = c_int> + '_ {
        self.table.keys().copied()
    }

    fn session(&mut self, fd: c_int) -> Result<&mut Session, DeviceError> {
        self.table
            .get_mut(&fd)
            .ok_or(DeviceError::BadDescriptor(fd))
    }

    fn lowest_free_fd(&self) -> c_int {
        let mut fd = 0;
        for used in self.table.keys() {
            if *used != fd {
                break;
            }
            fd += 1;
        }
        fd
    }
}

/// Byte count on success, negated errno on failure
fn status(result: Result<usize, DeviceError>) -> isize {
    match result {
        Ok(n) => isize::try_from(n).unwrap_or(isize::MAX),
        Err(e) => -(e.errno() as isize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EBADF, EINVAL, ENOENT};
    use crate::session::{SEEK_CUR, SEEK_END};
    use crate::store::BufferStore;

    fn table(capacity: usize) -> FdTable {
        let registry = Arc::new(Registry::new());
        registry
            .attach("vmemdev", BufferStore::new(capacity).unwrap())
            .unwrap();
        FdTable::new(registry)
    }

    #[test]
    fn test_open_unknown_path() {
        let mut fds = table(4);
        assert_eq!(fds.open("/dev/nope"), -ENOENT);
        assert_eq!(fds.open_fds().count(), 0);
    }

    #[test]
    fn test_lowest_free_fd_is_reused() {
        let mut fds = table(4);
        assert_eq!(fds.open("vmemdev"), 0);
        assert_eq!(fds.open("vmemdev"), 1);
        assert_eq!(fds.open("vmemdev"), 2);

        assert_eq!(fds.close(1), 0);
        assert_eq!(fds.open("vmemdev"), 1);
        assert_eq!(fds.open_fds().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_bad_descriptor() {
        let mut fds = table(4);
        let mut buf = [0u8; 4];
        assert_eq!(fds.read(5, buf.as_mut_slice()), -(EBADF as isize));
        assert_eq!(fds.write(5, b"x".as_slice()), -(EBADF as isize));
        assert_eq!(fds.lseek(5, 0, SEEK_CUR), -i64::from(EBADF));
    }

    #[test]
    fn test_lseek_errors() {
        let mut fds = table(4);
        let fd = fds.open("vmemdev");
        assert_eq!(fds.lseek(fd, 0, 42), -i64::from(EINVAL));
        assert_eq!(fds.lseek(fd, 1, SEEK_END), -i64::from(EINVAL));
        assert_eq!(fds.lseek(fd, -4, SEEK_END), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut fds = table(4);
        let fd = fds.open("vmemdev");
        assert_eq!(fds.close(fd), 0);
        assert_eq!(fds.close(fd), 0);
        assert!(fds.get(fd).is_none());
    }
}
