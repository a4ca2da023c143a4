//! Error types for the store, the device layer and configuration.
//!
//! Every error maps to a POSIX errno so the fd boundary can return the
//! negative-status codes file-like callers expect.

use std::io;
use std::os::raw::c_int;

pub use libc::{EBADF, EEXIST, EFAULT, EINVAL, ENOENT, ENOMEM};

/// Errors returned by [`BufferStore`](crate::store::BufferStore) and
/// [`Session`](crate::session::Session) operations.
///
/// End of data and a full buffer at the cursor are not errors: both are
/// reported as a successful zero-length transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Capacity was zero at creation
    #[error("invalid configuration: capacity must be positive")]
    InvalidConfiguration,

    /// Backing region could not be obtained from the allocator
    #[error("failed to allocate {requested} bytes")]
    AllocationFailure { requested: usize },

    /// Copy to or from caller memory failed
    #[error("bad address")]
    Fault,

    /// Unknown seek mode or resulting position outside the buffer
    #[error("invalid argument")]
    InvalidArgument,
}

impl StoreError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::InvalidConfiguration | Self::InvalidArgument => EINVAL,
            Self::AllocationFailure { .. } => ENOMEM,
            Self::Fault => EFAULT,
        }
    }
}

/// Errors from the registry, the device lifecycle and the fd table
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no such device: {0}")]
    NotFound(String),

    #[error("device already exists: {0}")]
    AlreadyExists(String),

    #[error("bad file descriptor: {0}")]
    BadDescriptor(c_int),
}

impl DeviceError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::Store(e) => e.errno(),
            Self::NotFound(_) => ENOENT,
            Self::AlreadyExists(_) => EEXIST,
            Self::BadDescriptor(_) => EBADF,
        }
    }
}

/// Errors from parsing device configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed parameter '{0}', expected key=value")]
    Malformed(String),

    #[error("unknown parameter '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convert errno to `std::io::ErrorKind`
#[must_use]
#[allow(clippy::match_same_arms)] // Common errno values are listed for documentation
pub fn errno_to_error_kind(errno: c_int) -> io::ErrorKind {
    match errno {
        ENOENT => io::ErrorKind::NotFound,
        EBADF | EINVAL => io::ErrorKind::InvalidInput,
        ENOMEM => io::ErrorKind::OutOfMemory,
        EEXIST => io::ErrorKind::AlreadyExists,
        EFAULT => io::ErrorKind::Other,
        _ => io::ErrorKind::Other,
    }
}

/// `strerror`-style description of an errno value
#[must_use]
pub fn errno_to_str(errno: c_int) -> &'static str {
    match errno {
        0 => "Success",
        ENOENT => "No such file or directory",
        EBADF => "Bad file descriptor",
        ENOMEM => "Cannot allocate memory",
        EFAULT => "Bad address",
        EEXIST => "File exists",
        EINVAL => "Invalid argument",
        _ => "Unknown error",
    }
}

impl From<StoreError> for io::Error {
    fn from(e: StoreError) -> Self {
        io::Error::new(errno_to_error_kind(e.errno()), e)
    }
}

impl From<DeviceError> for io::Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Store(e) => e.into(),
            other => io::Error::new(errno_to_error_kind(other.errno()), other),
        }
    }
}
