use std::{
    mem::ManuallyDrop,
    sync::{Mutex, MutexGuard, PoisonError},
    task::{RawWaker, RawWakerVTable, Waker},
};

/// Locks a mutex, recovering the guard if another thread panicked while holding it. Structures
/// guarded this way are consistent between statements.
pub(crate) trait MutexExt<T: ?Sized> {
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;
}
impl<T: ?Sized> MutexExt<T> for Mutex<T> {
    #[inline]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// FUTURE remove in favor of Waker::noop
#[inline(always)]
pub(crate) fn noop_waker() -> ManuallyDrop<Waker> {
    // SAFETY: the vtable functions do nothing and never dereference the data pointer
    ManuallyDrop::new(unsafe { Waker::from_raw(noop_raw_waker()) })
}
#[inline(always)]
fn noop_raw_waker() -> RawWaker {
    static VTAB: RawWakerVTable = RawWakerVTable::new(|_| noop_raw_waker(), drop, drop, drop);
    RawWaker::new(std::ptr::null(), &VTAB)
}

/// Renders a chunk of received bytes for diagnostics.
pub(crate) fn lossy_preview(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
