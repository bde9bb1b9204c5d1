//! Linux-specific memory mapping and blocking primitives

use crate::error::{FifoError, FifoResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::atomic::AtomicU32;
use tracing::warn;
use winfifo_common::shm::consts::PAGE_SIZE;

/// Round `size` up to a whole number of pages
pub fn page_align(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// Map a zeroed, page-aligned anonymous block of at least `size` bytes
pub fn create_anonymous_mmap(size: usize) -> FifoResult<MmapMut> {
    let len = page_align(size);
    MmapOptions::new()
        .len(len)
        .populate()
        .map_anon()
        .map_err(|source| FifoError::Allocation { size: len, source })
}

/// Create a new shared segment file and map it
///
/// Fails with `AlreadyExists` if the file is already present.
pub fn create_segment_mmap(path: &Path, name: &str, size: usize) -> FifoResult<MmapMut> {
    let len = page_align(size);

    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => FifoError::AlreadyExists {
                name: name.to_string(),
            },
            _ => FifoError::Io { source: e },
        })?;

    let mapped = file
        .set_len(len as u64)
        .map_err(|source| FifoError::Io { source })
        .and_then(|()| {
            unsafe { MmapOptions::new().populate().map_mut(&file) }
                .map_err(|source| FifoError::Allocation { size: len, source })
        });

    if mapped.is_err() {
        unlink_segment(path);
    }
    mapped
}

/// Remove a segment file; a failure is logged, not returned
pub fn unlink_segment(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), "failed to unlink segment: {e}");
    }
}

/// Attach to an existing segment file
pub fn attach_segment_mmap(path: &Path, name: &str) -> FifoResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FifoError::NotFound {
                name: name.to_string(),
            },
            _ => FifoError::Io { source: e },
        })?;

    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

fn futex_op(op: libc::c_int, shared: bool) -> libc::c_int {
    if shared {
        op
    } else {
        op | libc::FUTEX_PRIVATE_FLAG
    }
}

/// Sleep while `word` holds `expected`
///
/// Returns on wakeup, on `EAGAIN` (value already changed) and on `EINTR`.
/// Callers re-check the word and loop.
pub fn futex_wait(word: &AtomicU32, expected: u32, shared: bool) -> io::Result<()> {
    let rv = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            futex_op(libc::FUTEX_WAIT, shared),
            expected,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        )
    };

    if rv == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::EINTR) => Ok(()),
        _ => Err(err),
    }
}

/// Wake up to `count` sleepers blocked on `word`
pub fn futex_wake(word: &AtomicU32, count: u32, shared: bool) -> io::Result<usize> {
    let rv = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            futex_op(libc::FUTEX_WAKE, shared),
            count,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        )
    };

    if rv < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rv as usize)
}

/// Pin the calling thread to a CPU core
pub fn pin_to_cpu(cpu: usize) -> FifoResult<()> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset.set(cpu)?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_page_align() {
        assert_eq!(page_align(1), PAGE_SIZE);
        assert_eq!(page_align(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(page_align(PAGE_SIZE + 1), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_anonymous_mmap_is_zeroed_and_aligned() {
        let mmap = create_anonymous_mmap(100).unwrap();
        assert_eq!(mmap.len(), PAGE_SIZE);
        assert_eq!(mmap.as_ptr() as usize % PAGE_SIZE, 0);
        assert!(mmap.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_futex_wait_returns_when_value_differs() {
        let word = AtomicU32::new(5);
        futex_wait(&word, 4, false).unwrap();
    }

    #[test]
    fn test_futex_wake_releases_sleeper() {
        let word = Arc::new(AtomicU32::new(0));
        let sleeper = {
            let word = Arc::clone(&word);
            thread::spawn(move || {
                while word.load(Ordering::Acquire) == 0 {
                    futex_wait(&word, 0, false).unwrap();
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        word.store(1, Ordering::Release);
        futex_wake(&word, 1, false).unwrap();
        sleeper.join().unwrap();
    }

    #[test]
    fn test_failed_create_leaves_no_file() {
        let name = format!("linux_test_oversized_{}", std::process::id());
        let path = Path::new("/dev/shm").join(format!("winfifo_{name}"));

        // No file system accepts a length past i64::MAX.
        let result = create_segment_mmap(&path, &name, (1usize << 63) + 1);
        assert!(result.is_err());
        assert!(!path.exists());

        let mmap = create_segment_mmap(&path, &name, 100).unwrap();
        assert_eq!(mmap.len(), PAGE_SIZE);
        unlink_segment(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_unlink_missing_segment_is_quiet() {
        unlink_segment(Path::new("/dev/shm/winfifo_never_created"));
    }

    #[test]
    fn test_attach_missing_segment() {
        let result = attach_segment_mmap(Path::new("/dev/shm/winfifo_does_not_exist"), "x");
        assert!(matches!(result, Err(FifoError::NotFound { .. })));
    }
}
