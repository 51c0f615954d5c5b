//! Synchronization utilities

use core::marker::PhantomData;
use core::ops::DerefMut;

use bitflags::Flags;
use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    mutex::{Mutex, MutexGuard},
};
use portable_atomic::{AtomicU32, Ordering};

/// Trait to allow for borrowing a mutable reference to the inner type
pub trait RefMutGuard<Inner>: DerefMut<Target = Inner> {}

/// General trait for types that allow locking to access an inner object
///
/// This trait allows code to be generic over multiple types that provide
/// interior mutability. This is primarily intended to allow using different
/// embassy mutex types and simplifies code by erasing the raw mutex type.
pub trait Lockable {
    /// Inner object type
    type Inner;

    /// Attempt to lock the inner object for mutable access
    fn try_lock(&self) -> Option<impl RefMutGuard<Self::Inner>>;
    /// Lock the inner object for mutable access
    fn lock(&self) -> impl Future<Output = impl RefMutGuard<Self::Inner>>;
}

impl<Inner, M: RawMutex> RefMutGuard<Inner> for MutexGuard<'_, M, Inner> {}

impl<M: RawMutex, T> Lockable for Mutex<M, T> {
    type Inner = T;

    fn try_lock(&self) -> Option<impl RefMutGuard<Self::Inner>> {
        self.try_lock().ok()
    }

    fn lock(&self) -> impl Future<Output = impl RefMutGuard<Self::Inner>> {
        self.lock()
    }
}

/// Lock-free set of [`bitflags`] flags
///
/// Any context may set flags. Consumers use [`AtomicFlags::test_and_clear`] so
/// that a set flag is observed by exactly one consumer.
pub struct AtomicFlags<F: Flags<Bits = u32>> {
    bits: AtomicU32,
    _flags: PhantomData<F>,
}

impl<F: Flags<Bits = u32>> AtomicFlags<F> {
    /// Create an empty flag set
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            _flags: PhantomData,
        }
    }

    /// Set the given flags
    pub fn set(&self, flags: F) {
        self.bits.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Clear the given flags
    pub fn clear(&self, flags: F) {
        self.bits.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Clear all flags
    pub fn clear_all(&self) {
        self.bits.store(0, Ordering::Release);
    }

    /// Returns true if all given flags are set, without consuming them
    pub fn contains(&self, flags: F) -> bool {
        F::from_bits_retain(self.bits.load(Ordering::Acquire)).contains(flags)
    }

    /// Atomically clear the given flags, returning true if all of them were set
    pub fn test_and_clear(&self, flags: F) -> bool {
        let previous = self.bits.fetch_and(!flags.bits(), Ordering::AcqRel);
        F::from_bits_retain(previous).contains(flags)
    }

    /// Snapshot of the current flags
    pub fn get(&self) -> F {
        F::from_bits_retain(self.bits.load(Ordering::Acquire))
    }
}

impl<F: Flags<Bits = u32>> Default for AtomicFlags<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct TestFlags: u32 {
            const A = 1 << 0;
            const B = 1 << 1;
        }
    }

    #[test]
    fn test_and_clear_consumes_once() {
        let flags = AtomicFlags::<TestFlags>::new();
        flags.set(TestFlags::A);
        assert!(flags.contains(TestFlags::A));
        assert!(flags.test_and_clear(TestFlags::A));
        assert!(!flags.test_and_clear(TestFlags::A));
    }

    #[test]
    fn test_and_clear_leaves_other_flags() {
        let flags = AtomicFlags::<TestFlags>::new();
        flags.set(TestFlags::A | TestFlags::B);
        assert!(flags.test_and_clear(TestFlags::B));
        assert_eq!(flags.get(), TestFlags::A);
        flags.clear_all();
        assert_eq!(flags.get(), TestFlags::empty());
    }
}
