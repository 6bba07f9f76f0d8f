//! Shared one-dimensional buffers.

use core::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A labelled, shared, one-dimensional buffer.
///
/// Cloning a view shares its storage; kernels capture clones and read or write
/// through the lock. The length is fixed at construction.
///
/// # Example
///
/// ```
/// use weft_exec::View;
///
/// let view = View::<f64>::new("weights", 3);
/// view.set(1, 0.5);
/// assert_eq!(view.to_vec(), vec![0.0, 0.5, 0.0]);
/// ```
pub struct View<T> {
    label: Arc<str>,
    data: Arc<RwLock<Vec<T>>>,
}

impl<T> View<T> {
    /// Wraps `data` in a view.
    #[must_use]
    pub fn from_vec(label: impl Into<Arc<str>>, data: Vec<T>) -> Self {
        Self {
            label: label.into(),
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// The label given at construction.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if the view has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the storage for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read()
    }

    /// Locks the storage for writing.
    ///
    /// Kernels must not resize the buffer; deep copies check lengths once,
    /// when they are built.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write()
    }

    /// Returns `true` if both views share one buffer.
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Overwrites element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, value: T) {
        self.data.write()[index] = value;
    }
}

impl<T: Clone> View<T> {
    /// Returns a copy of element `index`, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.data.read().get(index).cloned()
    }

    /// Copies the contents out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.data.read().clone()
    }
}

impl<T: Clone + Default> View<T> {
    /// Creates a view of `len` default-initialized elements.
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>, len: usize) -> Self {
        Self::from_vec(label, vec![T::default(); len])
    }
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}
