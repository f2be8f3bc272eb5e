//! Inter-process read/write lock embedded in the table file header.
//!
//! The lock is a POSIX `pthread_rwlock_t` initialized with
//! `PTHREAD_PROCESS_SHARED`, so every process that maps the table file
//! coordinates through the same lock words.  The lock is owned by the file,
//! not by any process; it survives handle destruction and process exit.
//!
//! Acquisition returns an RAII guard that releases on drop, so the lock is
//! released on every exit path, including panics inside a locked region.

use std::cell::UnsafeCell;

use crate::retcode::DbError;

/// Process-shared multi-reader/single-writer lock living inside a shared
/// mapping.
#[repr(transparent)]
pub struct DbLock {
    raw: UnsafeCell<libc::pthread_rwlock_t>,
}

// The pthread rwlock is the cross-process synchronization primitive itself;
// concurrent access to its bytes is mediated by the pthread implementation.
unsafe impl Send for DbLock {}
unsafe impl Sync for DbLock {}

impl DbLock {
    /// Initializes the lock words in place as a process-shared rwlock.
    ///
    /// Called exactly once per table file, by the initializer, on the
    /// freshly zero-filled mapping.  Returns the pthread error number on
    /// failure.
    pub(crate) fn init_in_place(&self) -> Result<(), i32> {
        unsafe {
            let mut attr: libc::pthread_rwlockattr_t = std::mem::zeroed();
            let rc = libc::pthread_rwlockattr_init(&mut attr);
            if rc != 0 {
                return Err(rc);
            }
            let rc =
                libc::pthread_rwlockattr_setpshared(&mut attr, libc::PTHREAD_PROCESS_SHARED);
            if rc == 0 {
                let rc = libc::pthread_rwlock_init(self.raw.get(), &attr);
                libc::pthread_rwlockattr_destroy(&mut attr);
                if rc != 0 {
                    return Err(rc);
                }
                Ok(())
            } else {
                libc::pthread_rwlockattr_destroy(&mut attr);
                Err(rc)
            }
        }
    }

    /// Acquires the lock in shared mode.  Blocks until available.
    pub fn read(&self) -> Result<ReadGuard<'_>, DbError> {
        let rc = unsafe { libc::pthread_rwlock_rdlock(self.raw.get()) };
        if rc != 0 {
            return Err(DbError::LockError);
        }
        Ok(ReadGuard { lock: self })
    }

    /// Acquires the lock in exclusive mode.  Blocks until available.
    pub fn write(&self) -> Result<WriteGuard<'_>, DbError> {
        let rc = unsafe { libc::pthread_rwlock_wrlock(self.raw.get()) };
        if rc != 0 {
            return Err(DbError::LockError);
        }
        Ok(WriteGuard { lock: self })
    }

    fn unlock(&self) {
        let rc = unsafe { libc::pthread_rwlock_unlock(self.raw.get()) };
        debug_assert_eq!(rc, 0, "pthread_rwlock_unlock failed: {}", rc);
    }
}

/// Shared-mode hold on a [`DbLock`]; released on drop.
pub struct ReadGuard<'a> {
    lock: &'a DbLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Exclusive-mode hold on a [`DbLock`]; released on drop.
pub struct WriteGuard<'a> {
    lock: &'a DbLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_lock() -> Box<DbLock> {
        let lock: Box<DbLock> = Box::new(unsafe { std::mem::zeroed() });
        lock.init_in_place().unwrap();
        lock
    }

    #[test]
    fn read_then_write() {
        let lock = fresh_lock();
        {
            let _r = lock.read().unwrap();
        }
        {
            let _w = lock.write().unwrap();
        }
        // Releasing the write guard must allow new readers.
        let _r = lock.read().unwrap();
    }

    #[test]
    fn concurrent_readers_allowed() {
        let lock = fresh_lock();
        let _a = lock.read().unwrap();
        let _b = lock.read().unwrap();
    }

    #[test]
    fn guard_releases_on_panic() {
        let lock = fresh_lock();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _w = lock.write().unwrap();
            panic!("poisoned region");
        }));
        assert!(result.is_err());
        // The guard dropped during unwinding, so the lock is free again.
        let _w = lock.write().unwrap();
    }
}
