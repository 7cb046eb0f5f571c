//! Mutual exclusion across execution contexts
//!
//! The client may be entered from ordinary code and from contexts where
//! blocking is not allowed (interrupt handlers, exception handlers). The lock
//! trait makes the difference explicit: ordinary callers may wait, restricted
//! callers get an error instead.

/// Execution context of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecContext {
    /// Normal thread context; blocking and interrupts are available
    #[default]
    Thread,
    /// Interrupt-like context; must not block, receive interrupts are masked
    Interrupt,
}

impl ExecContext {
    /// Whether waiting is forbidden in this context
    pub fn is_restricted(self) -> bool {
        matches!(self, ExecContext::Interrupt)
    }
}

/// Reports the execution context of the current caller
pub trait ContextProbe {
    /// Context the caller is running in
    fn current(&self) -> ExecContext;
}

/// A fixed context, for platforms without interrupts or for tests
impl ContextProbe for ExecContext {
    fn current(&self) -> ExecContext {
        *self
    }
}

/// Errors from lock operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockError {
    /// Lock is held and the caller may not wait
    WouldBlock,
    /// Lock was never initialized or has been destroyed
    Uninitialized,
    /// Lock could not be initialized
    Init,
}

/// Lock usable from both thread and interrupt contexts
///
/// All methods take `&self`: the lock is shared state by nature.
pub trait IrqSafeLock {
    /// Prepare the lock for use
    fn init(&self) -> Result<(), LockError>;

    /// Acquire the lock
    ///
    /// In [`ExecContext::Thread`] this may wait for the holder. In
    /// [`ExecContext::Interrupt`] it either succeeds at once or returns
    /// [`LockError::WouldBlock`].
    fn lock(&self, context: ExecContext) -> Result<(), LockError>;

    /// Release a lock acquired with [`IrqSafeLock::lock`]
    fn unlock(&self);

    /// Tear the lock down; later `lock` calls fail
    fn destroy(&self);
}

impl<T: IrqSafeLock + ?Sized> IrqSafeLock for &T {
    fn init(&self) -> Result<(), LockError> {
        (**self).init()
    }

    fn lock(&self, context: ExecContext) -> Result<(), LockError> {
        (**self).lock(context)
    }

    fn unlock(&self) {
        (**self).unlock()
    }

    fn destroy(&self) {
        (**self).destroy()
    }
}
