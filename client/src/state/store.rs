//! Injectable single-threaded state container.
//!
//! DESIGN
//! ======
//! `Store<T>` is a cheap-to-clone handle to shared state, read and written
//! through closures the way UI signals are. Handles are passed explicitly to
//! the event channel and to consumers instead of living in a global.
//!
//! Not `Send`: the inbox runs on one event loop, so handler writes are
//! serialized without locking. Closures must not re-enter the same store.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub struct Store<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Store<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self { inner: Rc::new(RefCell::new(value)) }
    }

    /// Partial write: mutate in place and return whatever the closure returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.inner.borrow_mut())
    }

    /// Read without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.borrow())
    }

    /// Replace the whole value.
    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }
}

impl<T: Clone> Store<T> {
    /// Snapshot of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Store").field(&self.inner.borrow()).finish()
    }
}
