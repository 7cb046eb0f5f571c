//! Session lock
//!
//! [`SpinLock`] is a lock word with an explicit lifecycle (uninitialized,
//! free, held) for platforms that do not bring their own
//! [`IrqSafeLock`]. [`LockGuard`] releases any `IrqSafeLock` on drop so the
//! adapters cannot leave the session locked on an early return.

use dcload_hal::{ExecContext, IrqSafeLock, LockError};
use portable_atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const FREE: u8 = 1;
const HELD: u8 = 2;

/// A spinning lock word
///
/// Thread callers spin until the holder releases it. Interrupt callers get a
/// single attempt: spinning there would wait on code that cannot run.
#[derive(Debug)]
pub struct SpinLock {
    state: AtomicU8,
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl SpinLock {
    /// Create an uninitialized lock
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
        }
    }

    /// Whether the lock is currently held
    pub fn is_held(&self) -> bool {
        self.state.load(Ordering::Relaxed) == HELD
    }

    fn try_acquire(&self) -> Result<(), LockError> {
        match self
            .state
            .compare_exchange(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => Ok(()),
            Err(UNINIT) => Err(LockError::Uninitialized),
            Err(_) => Err(LockError::WouldBlock),
        }
    }
}

impl IrqSafeLock for SpinLock {
    fn init(&self) -> Result<(), LockError> {
        self.state
            .compare_exchange(UNINIT, FREE, Ordering::AcqRel, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| LockError::Init)
    }

    fn lock(&self, context: ExecContext) -> Result<(), LockError> {
        if context.is_restricted() {
            return self.try_acquire();
        }
        loop {
            match self.try_acquire() {
                Err(LockError::WouldBlock) => {
                    while self.state.load(Ordering::Relaxed) == HELD {
                        core::hint::spin_loop();
                    }
                }
                other => return other,
            }
        }
    }

    fn unlock(&self) {
        let _ = self
            .state
            .compare_exchange(HELD, FREE, Ordering::Release, Ordering::Relaxed);
    }

    fn destroy(&self) {
        self.state.store(UNINIT, Ordering::Release);
    }
}

/// Holds an [`IrqSafeLock`] until dropped
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, L: IrqSafeLock + ?Sized> {
    lock: &'a L,
}

impl<'a, L: IrqSafeLock + ?Sized> LockGuard<'a, L> {
    /// Acquire `lock` the way `context` allows
    pub fn acquire(lock: &'a L, context: ExecContext) -> Result<Self, LockError> {
        lock.lock(context)?;
        Ok(Self { lock })
    }
}

impl<L: IrqSafeLock + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
