//! vmemdev: a fixed-capacity, memory-backed byte device
//!
//! One zero-filled buffer per device, shared by any number of sessions.
//! Each session reads, writes and seeks with its own cursor; transfers are
//! clamped to the buffer and serialized by a single lock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  FdTable (per client)               │
//! │  - fd → Session                     │
//! │  - negative errno results           │
//! └─────────────────────────────────────┘
//!          │ opens by name
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Registry  ◄──── Device (init/exit) │
//! │  - name → Arc<BufferStore>          │
//! └─────────────────────────────────────┘
//!          │ open()
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Session (per caller)               │
//! │  - cursor                           │
//! │  - read / write / seek              │
//! └─────────────────────────────────────┘
//!          │ read_at / write_at
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  BufferStore (shared)               │
//! │  - Mutex<Box<[u8]>>, fixed capacity │
//! └─────────────────────────────────────┘
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod fd_table;
pub mod idgen;
pub mod registry;
pub mod session;
pub mod store;
pub mod uaccess;

pub use config::{DeviceConfig, DEFAULT_BUF_SIZE, DEFAULT_NAME};
pub use device::Device;
pub use error::{errno_to_error_kind, errno_to_str, ConfigError, DeviceError, StoreError};
pub use fd_table::FdTable;
pub use idgen::{Handle, IdGen};
pub use registry::{Registry, DEV_PREFIX};
pub use session::{SeekMode, Session, SEEK_CUR, SEEK_END, SEEK_SET};
pub use store::BufferStore;
pub use uaccess::{Fault, UserBuffer, UserBufferMut, UserSlice};
