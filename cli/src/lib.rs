//! Client programs for a loaded vmemdev device
//!
//! Everything goes through an [`FdTable`], the same descriptor interface
//! an external process would use.

use std::fmt;
use std::io::{self, Write};
use std::os::raw::c_int;
use std::sync::Arc;

use tracing::{debug, info};
use vmemdev::{errno_to_str, FdTable, Registry, SEEK_END, SEEK_SET};

/// Payload written by [`run_client`]
pub const GREETING: &[u8] = b"hello, vmemdev!\n";

/// Size of the read buffer used by [`run_client`]; one byte is kept for the
/// terminating NUL
pub const READ_BUF_SIZE: usize = 1024;

/// A descriptor call returned a negative status
///
/// Displays like `perror`: `open: No such file or directory`.
#[derive(Debug)]
pub struct SyscallError {
    pub call: &'static str,
    pub errno: c_int,
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.call, errno_to_str(self.errno))
    }
}

impl std::error::Error for SyscallError {}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("client {client} found foreign bytes in its half of the buffer")]
    Corrupted { client: usize },

    #[error("client task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Turn a syscall-style return value into a `Result`
fn check(call: &'static str, ret: i64) -> Result<u64, SyscallError> {
    u64::try_from(ret).map_err(|_| SyscallError {
        call,
        // Negated errno values always fit in c_int
        errno: c_int::try_from(-ret).unwrap_or(c_int::MAX),
    })
}

/// Same as [`check`] for byte counts
fn check_len(call: &'static str, ret: isize) -> Result<usize, SyscallError> {
    usize::try_from(ret).map_err(|_| SyscallError {
        call,
        errno: c_int::try_from(-ret).unwrap_or(c_int::MAX),
    })
}

/// Write the greeting, seek back and read it again, printing what happens.
///
/// Output matches the classic device test program:
///
/// ```text
/// write 16 bytes
/// read 1023 bytes: hello, vmemdev!
/// ```
///
/// The read returns as much of the buffer as fits; like a C string, only
/// the part before the first NUL is printed.
///
/// # Errors
/// Returns an error if any descriptor call fails or the output cannot be
/// written
pub fn run_client(
    registry: &Arc<Registry>,
    path: &str,
    out: &mut impl Write,
) -> Result<(), ClientError> {
    let mut fds = FdTable::new(Arc::clone(registry));

    let fd = fds.open(path);
    check("open", i64::from(fd))?;

    let result = greet(&mut fds, fd, out);
    fds.close(fd);
    result
}

fn greet(fds: &mut FdTable, fd: c_int, out: &mut impl Write) -> Result<(), ClientError> {
    let written = check_len("write", fds.write(fd, GREETING))?;
    writeln!(out, "write {written} bytes")?;

    check("lseek", fds.lseek(fd, 0, SEEK_SET))?;

    let mut buf = [0u8; READ_BUF_SIZE];
    let n = check_len("read", fds.read(fd, &mut buf[..READ_BUF_SIZE - 1]))?;

    let text_len = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    #[allow(clippy::indexing_slicing)]
    let text = String::from_utf8_lossy(&buf[..text_len]);
    write!(out, "read {n} bytes: {text}")?;
    out.flush()?;
    Ok(())
}

/// Run two clients at once, each filling and then checking its own half of
/// the buffer.
///
/// # Errors
/// Returns an error if a descriptor call fails or a client finds bytes it
/// did not write in its half
pub async fn run_concurrent(registry: &Arc<Registry>, path: &str) -> Result<(), ClientError> {
    let mut tasks = Vec::new();
    for (client, fill) in [(0usize, b'L'), (1, b'R')] {
        let registry = Arc::clone(registry);
        let path = path.to_string();
        tasks.push(tokio::task::spawn_blocking(move || {
            fill_half(&registry, &path, client, fill)
        }));
    }

    for task in tasks {
        task.await??;
    }
    info!("concurrent clients finished without corruption");
    Ok(())
}

fn fill_half(
    registry: &Arc<Registry>,
    path: &str,
    client: usize,
    fill: u8,
) -> Result<(), ClientError> {
    let mut fds = FdTable::new(Arc::clone(registry));
    let fd = fds.open(path);
    check("open", i64::from(fd))?;

    let end = fds.lseek(fd, 0, SEEK_END);
    check("lseek", end)?;
    let half = end / 2;
    // An offset that does not fit makes lseek fail with EINVAL
    let start = i64::try_from(client).map_or(-1, |client| half * client);
    let chunk = vec![fill; usize::try_from(half).unwrap_or_default()];

    for _ in 0..8 {
        check("lseek", fds.lseek(fd, start, SEEK_SET))?;
        check_len("write", fds.write(fd, &chunk))?;
    }

    check("lseek", fds.lseek(fd, start, SEEK_SET))?;
    let mut readback = vec![0u8; chunk.len()];
    check_len("read", fds.read(fd, &mut readback))?;
    fds.close(fd);

    debug!(client, bytes = readback.len(), "readback complete");
    if readback.iter().any(|b| *b != fill) {
        return Err(ClientError::Corrupted { client });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmemdev::{BufferStore, Device, DeviceConfig};

    #[test]
    fn test_run_client_output() {
        let registry = Arc::new(Registry::new());
        let device = Device::init(Arc::clone(&registry), DeviceConfig::default()).unwrap();

        let mut out = Vec::new();
        run_client(&registry, &device.path(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "write 16 bytes\nread 1023 bytes: hello, vmemdev!\n"
        );
    }

    #[test]
    fn test_run_client_small_buffer() {
        let registry = Arc::new(Registry::new());
        registry
            .attach("tiny", BufferStore::new(5).unwrap())
            .unwrap();

        let mut out = Vec::new();
        run_client(&registry, "/dev/tiny", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "write 5 bytes\nread 5 bytes: hello"
        );
    }

    #[test]
    fn test_negative_status_becomes_syscall_error() {
        use vmemdev::error::{EBADF, EINVAL};

        assert_eq!(check("lseek", 12).unwrap(), 12);
        assert_eq!(check_len("read", 5).unwrap(), 5);

        let err = check_len("read", -(EBADF as isize)).unwrap_err();
        assert_eq!(err.errno, EBADF);
        assert_eq!(err.to_string(), "read: Bad file descriptor");

        let err = check("lseek", -i64::from(EINVAL)).unwrap_err();
        assert_eq!(err.to_string(), "lseek: Invalid argument");
    }

    #[test]
    fn test_run_client_missing_device() {
        let registry = Arc::new(Registry::new());
        let err = run_client(&registry, "/dev/vmemdev", &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "open: No such file or directory");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_concurrent() {
        let registry = Arc::new(Registry::new());
        let _device = Device::init(
            Arc::clone(&registry),
            DeviceConfig {
                buf_size: 8192,
                ..DeviceConfig::default()
            },
        )
        .unwrap();

        run_concurrent(&registry, "/dev/vmemdev").await.unwrap();

        let snapshot = registry.lookup("vmemdev").unwrap().snapshot();
        assert!(snapshot[..4096].iter().all(|b| *b == b'L'));
        assert!(snapshot[4096..].iter().all(|b| *b == b'R'));
    }
}
