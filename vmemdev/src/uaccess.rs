//! Copying between the store and caller-owned memory
//!
//! The store never hands out references to its region. Reads copy out
//! through [`UserBufferMut`] and writes copy in through [`UserBuffer`].
//! A copy that cannot reach the caller's memory reports [`Fault`], which
//! the session surfaces as [`StoreError::Fault`](crate::StoreError::Fault).

use std::ptr::NonNull;

/// The caller's memory could not be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault;

/// Destination of a read
pub trait UserBufferMut {
    /// Number of bytes the caller asked for
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src` to the start of the caller's memory.
    ///
    /// `src.len()` never exceeds `self.len()`.
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault>;
}

/// Source of a write
pub trait UserBuffer {
    /// Number of bytes the caller offered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` from the start of the caller's memory.
    ///
    /// `dst.len()` never exceeds `self.len()`. On `Err`, `dst` must be
    /// left untouched: the store relies on this to keep its region intact
    /// after a failed write.
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault>;
}

impl UserBufferMut for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault> {
        let dst = self.get_mut(..src.len()).ok_or(Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserBuffer for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault> {
        let src = self.get(..dst.len()).ok_or(Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserBufferMut for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault> {
        self.as_mut_slice().copy_to_user(src)
    }
}

impl UserBuffer for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault> {
        self.as_slice().copy_from_user(dst)
    }
}

/// Raw caller memory: a pointer and a length, as received across an FFI
/// or syscall-like boundary.
///
/// A null pointer is accepted at construction and faults on every copy,
/// the way `copy_to_user` rejects an unmapped address.
#[derive(Debug)]
pub struct UserSlice {
    ptr: Option<NonNull<u8>>,
    len: usize,
}

impl UserSlice {
    /// Wrap raw caller memory.
    ///
    /// # Safety
    ///
    /// If `ptr` is non-null, it must be valid for reads and writes of `len`
    /// bytes for the lifetime of the `UserSlice`, and no other reference
    /// may access that memory while a copy is in progress.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Self {
        Self {
            ptr: NonNull::new(ptr),
            len,
        }
    }
}

impl UserBufferMut for UserSlice {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault> {
        let ptr = self.ptr.ok_or(Fault)?;
        if src.len() > self.len {
            return Err(Fault);
        }
        // SAFETY: the constructor contract guarantees `ptr` is valid for
        // `self.len` bytes and `src.len() <= self.len` was checked above.
        // `src` belongs to the store, so the ranges cannot overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
        }
        Ok(())
    }
}

impl UserBuffer for UserSlice {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault> {
        let ptr = self.ptr.ok_or(Fault)?;
        if dst.len() > self.len {
            return Err(Fault);
        }
        // SAFETY: see `copy_to_user`; `dst` is the store's region.
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr(), dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }
}

// SAFETY: `UserSlice` is a plain pointer/length pair. The constructor's
// contract makes the caller responsible for keeping the memory valid and
// unaliased; moving the pair to another thread does not change that.
unsafe impl Send for UserSlice {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_copy_to_user() {
        let mut buf = [0u8; 8];
        buf.as_mut_slice().copy_to_user(b"abc").unwrap();
        assert_eq!(&buf[..4], b"abc\0");
    }

    #[test]
    fn test_slice_copy_from_user_too_short_faults() {
        let src: &[u8] = b"ab";
        let mut dst = [7u8; 3];
        assert_eq!(src.copy_from_user(&mut dst), Err(Fault));
        assert_eq!(dst, [7u8; 3]);
    }

    #[test]
    fn test_null_user_slice_faults() {
        // SAFETY: a null pointer is never dereferenced
        let mut slice = unsafe { UserSlice::from_raw_parts(std::ptr::null_mut(), 16) };
        assert_eq!(UserBufferMut::len(&slice), 16);
        assert_eq!(slice.copy_to_user(b"data"), Err(Fault));

        let mut dst = [0u8; 4];
        assert_eq!(slice.copy_from_user(&mut dst), Err(Fault));
        assert_eq!(dst, [0u8; 4]);
    }

    #[test]
    fn test_user_slice_round_trip() {
        let mut backing = [0u8; 5];
        // SAFETY: `backing` outlives `slice` and is not accessed meanwhile
        let mut slice = unsafe { UserSlice::from_raw_parts(backing.as_mut_ptr(), backing.len()) };
        slice.copy_to_user(b"hey").unwrap();

        let mut out = [0u8; 3];
        slice.copy_from_user(&mut out).unwrap();
        drop(slice);

        assert_eq!(&out, b"hey");
        assert_eq!(&backing[..3], b"hey");
    }
}
