//! Single-process ownership of a store directory.
//!
//! Opening a store takes an advisory exclusive lock on `facts.lock` and
//! records the owner's process id in it, so a refused open can name the
//! process holding the store. The OS releases the lock with the handle.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};
use std::path::Path;

const LOCK_FILE: &str = "facts.lock";

/// Held by an open store; dropping it releases the directory.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
    owner: u32,
}

impl StoreLock {
    /// Takes ownership of `dir` without blocking.
    ///
    /// # Errors
    /// - `WouldBlock` if the store is open elsewhere; the message names the
    ///   owning process when it can be read
    /// - `Unsupported` on platforms without file locking
    pub fn acquire(dir: &Path) -> IoResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if let Err(e) = lock_exclusive(&file) {
            if e.kind() != ErrorKind::WouldBlock {
                return Err(e);
            }
            let holder = read_owner(&mut file).map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("store is locked by another process (pid {holder})"),
            ));
        }

        let owner = std::process::id();
        file.set_len(0)?;
        file.write_all(owner.to_string().as_bytes())?;
        Ok(Self { _file: file, owner })
    }

    /// Process id recorded in the lock file.
    #[must_use]
    pub const fn owner(&self) -> u32 {
        self.owner
    }
}

fn read_owner(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> IoResult<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(());
    }
    let err = IoError::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(IoError::from(ErrorKind::WouldBlock));
    }
    Err(err)
}

#[cfg(windows)]
fn lock_exclusive(file: &File) -> IoResult<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // SAFETY: the handle belongs to `file`, which outlives the call, and a
    // zeroed OVERLAPPED selects offset 0.
    let locked = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if locked != 0 {
        return Ok(());
    }
    let err = IoError::last_os_error();
    #[allow(clippy::cast_possible_wrap)]
    let lock_violation = ERROR_LOCK_VIOLATION as i32;
    if err.raw_os_error() == Some(lock_violation) {
        return Err(IoError::from(ErrorKind::WouldBlock));
    }
    Err(err)
}

#[cfg(not(any(unix, windows)))]
fn lock_exclusive(_file: &File) -> IoResult<()> {
    Err(IoError::new(
        ErrorKind::Unsupported,
        "store locking is not supported on this platform",
    ))
}
