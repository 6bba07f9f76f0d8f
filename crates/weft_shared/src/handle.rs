//! Maybe-reference-counted handle.
//!
//! A [`SharedHandle`] is in one of two modes, fixed when it is constructed:
//!
//! - **Managed**: the handle participates in reference counting. A control
//!   block holding an atomic count and a type-erased deleter is allocated the
//!   first time a managed handle receives a non-null pointer. The target is
//!   destroyed exactly when the last managed copy releases it.
//! - **Unmanaged**: the handle is a non-owning view. Copies are plain pointer
//!   copies and nothing is ever freed.
//!
//! A null handle ([`SharedHandle::null`], [`Default`]) is managed but has no
//! control block yet.
//!
//! # Mixed-mode assignment
//!
//! [`SharedHandle::assign`] and [`SharedHandle::assign_take`] keep the
//! destination's mode and adopt the source's pointer:
//!
//! | destination | source    | result                                                        |
//! |-------------|-----------|---------------------------------------------------------------|
//! | managed     | managed   | shares the source's control block                             |
//! | managed     | unmanaged | starts owning the pointer with a fresh block and the default deleter |
//! | unmanaged   | managed   | non-owning view; a move-assignment also releases the source   |
//! | unmanaged   | unmanaged | pointer copy                                                  |
//!
//! The managed-from-unmanaged row is surprising on purpose: a managed slot is
//! committed to ownership, so assigning a borrowed pointer into it makes the
//! slot the owner. The default deleter reclaims the target as a `Box<T>`.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

#[cfg(feature = "loom")]
use loom::sync::atomic::{AtomicUsize, Ordering, fence};

#[cfg(not(feature = "loom"))]
use core::sync::atomic::{AtomicUsize, Ordering, fence};

/// Upper bound on live managed copies before the process aborts.
const MAX_REFCOUNT: usize = isize::MAX as usize;

type Deleter<T> = Box<dyn Fn(NonNull<T>) + Send + Sync>;

struct ControlBlock<T: ?Sized> {
    count: AtomicUsize,
    deleter: Deleter<T>,
}

enum Control<T: ?Sized> {
    /// Managed, no object adopted yet.
    Uninitialized,
    /// Managed, shares this control block.
    Counted(NonNull<ControlBlock<T>>),
    /// Never counts, never frees.
    Unmanaged,
}

impl<T: ?Sized> Clone for Control<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Control<T> {}

/// A pointer to `T` that may or may not own it.
///
/// See the [module documentation](self) for the ownership model.
///
/// # Thread safety
///
/// The reference count is atomic, so copies of one handle may be dropped
/// concurrently from different threads. A single handle instance is not
/// internally synchronized; mutating it through [`assign`](Self::assign) and
/// friends needs `&mut self` like any other Rust value.
pub struct SharedHandle<T: ?Sized> {
    ptr: Option<NonNull<T>>,
    control: Control<T>,
    _owns: PhantomData<T>,
}

// SAFETY: the count is atomic and the target is only reachable through shared
// references, the same contract `Arc<T>` relies on.
unsafe impl<T: ?Sized + Send + Sync> Send for SharedHandle<T> {}

// SAFETY: see the `Send` impl above.
unsafe impl<T: ?Sized + Send + Sync> Sync for SharedHandle<T> {}

impl<T: ?Sized> SharedHandle<T> {
    /// Creates a null handle.
    ///
    /// The handle is managed: a later [`assign`](Self::assign) makes it own
    /// whatever it receives.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            control: Control::Uninitialized,
            _owns: PhantomData,
        }
    }

    /// Creates an unmanaged handle viewing `ptr`.
    ///
    /// A null `ptr` produces a null unmanaged handle.
    ///
    /// # Safety
    ///
    /// - `ptr` must stay valid for reads for as long as any handle holds it in
    ///   unmanaged mode, including handles it reaches by cloning or
    ///   assignment.
    /// - If the handle (or a copy) is ever assigned into a managed handle, the
    ///   managed handle frees the target with the default deleter, so `ptr`
    ///   must then come from [`Box::into_raw`] and must not be freed elsewhere.
    #[must_use]
    pub unsafe fn unmanaged(ptr: *mut T) -> Self {
        Self {
            ptr: NonNull::new(ptr),
            control: Control::Unmanaged,
            _owns: PhantomData,
        }
    }

    /// Returns a shared reference to the target, or `None` for a null handle.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: managed targets live while this handle holds a count; unmanaged
        // targets are kept alive by the contract of `unmanaged`.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns the raw pointer held by this handle.
    #[must_use]
    pub fn as_non_null(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Returns `true` if this handle points at nothing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Returns `true` if this handle participates in reference counting.
    ///
    /// Null handles created by [`null`](Self::null) count as managed.
    #[must_use]
    pub fn is_reference_counted(&self) -> bool {
        !matches!(self.control, Control::Unmanaged)
    }

    /// Returns the number of managed handles sharing the target.
    ///
    /// Returns 0 for a null handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is unmanaged.
    #[must_use]
    pub fn use_count(&self) -> usize {
        assert!(
            self.is_reference_counted(),
            "use_count() called on an unmanaged SharedHandle"
        );
        match self.control {
            // SAFETY: a counted handle keeps its control block alive until it
            // releases its own count.
            Control::Counted(block) => unsafe { block.as_ref() }.count.load(Ordering::Acquire),
            Control::Uninitialized | Control::Unmanaged => 0,
        }
    }

    /// Returns a mutable reference when this is the only managed handle.
    ///
    /// Returns `None` for unmanaged and null handles and whenever another
    /// managed copy exists.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let Control::Counted(block) = self.control else {
            return None;
        };
        // SAFETY: see `use_count`.
        let unique = unsafe { block.as_ref() }.count.load(Ordering::Acquire) == 1;
        if !unique {
            return None;
        }
        // SAFETY: no other managed handle exists and `&mut self` excludes
        // concurrent access through this one.
        self.ptr.map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Returns `true` if both handles point at the same address.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.ptr, other.ptr) {
            (Some(a), Some(b)) => core::ptr::addr_eq(a.as_ptr(), b.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Moves the pointer out, leaving `self` null.
    ///
    /// The reference count is relocated, not changed. A managed source goes
    /// back to the uninitialized state; an unmanaged source stays unmanaged.
    #[must_use = "dropping the taken handle releases it immediately"]
    pub fn take(&mut self) -> Self {
        let taken = Self {
            ptr: self.ptr.take(),
            control: self.control,
            _owns: PhantomData,
        };
        if self.is_reference_counted() {
            self.control = Control::Uninitialized;
        }
        taken
    }

    /// Drops this handle's share of the target.
    ///
    /// Returns `true` if this call destroyed the target. A managed handle is
    /// null afterwards; an unmanaged handle is untouched.
    fn release(&mut self) -> bool {
        let Control::Counted(block) = self.control else {
            return false;
        };
        let ptr = self.ptr.take();
        self.control = Control::Uninitialized;

        // SAFETY: see `use_count`.
        let previous = unsafe { block.as_ref() }.count.fetch_sub(1, Ordering::Release);
        if previous != 1 {
            return false;
        }
        fence(Ordering::Acquire);

        // SAFETY: the count reached zero, so no other handle can reach the block.
        let block = unsafe { Box::from_raw(block.as_ptr()) };
        if let Some(ptr) = ptr {
            (block.deleter)(ptr);
        }
        true
    }
}

impl<T: ?Sized + 'static> SharedHandle<T> {
    /// Creates a managed handle owning `boxed`.
    #[must_use]
    pub fn from_box(boxed: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(boxed));
        Self {
            ptr: Some(ptr),
            control: Control::Counted(Self::new_control_block(default_deleter::<T>())),
            _owns: PhantomData,
        }
    }

    /// Creates a managed handle that calls `deleter` on `ptr` when the last
    /// managed copy is released.
    ///
    /// A null `ptr` produces a null handle and `deleter` is dropped unused.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads until `deleter` runs, and nothing else may
    /// free it.
    #[must_use]
    pub unsafe fn from_raw_with_deleter<D>(ptr: *mut T, deleter: D) -> Self
    where
        D: Fn(NonNull<T>) + Send + Sync + 'static,
    {
        match NonNull::new(ptr) {
            Some(ptr) => Self {
                ptr: Some(ptr),
                control: Control::Counted(Self::new_control_block(Box::new(deleter))),
                _owns: PhantomData,
            },
            None => Self::null(),
        }
    }

    /// Copy-assigns `source` into `self`, keeping `self`'s mode.
    ///
    /// Whatever `self` held is released first. See the
    /// [module documentation](self) for the four mode combinations. When a
    /// managed `source` is copied into an unmanaged `self`, `source` keeps its
    /// share and `self` becomes a view of it.
    pub fn assign(&mut self, source: &Self) {
        self.release();
        match (self.is_reference_counted(), source.control) {
            (true, Control::Counted(_)) => *self = source.clone(),
            (true, Control::Uninitialized | Control::Unmanaged) => self.adopt(source.ptr),
            (false, _) => self.ptr = source.ptr,
        }
    }

    /// Move-assigns `source` into `self`, keeping `self`'s mode.
    ///
    /// `source` is null afterwards. When a managed `source` is moved into an
    /// unmanaged `self`, `source` releases its share; if that destroyed the
    /// target, `self` ends up null instead of dangling.
    pub fn assign_take(&mut self, source: &mut Self) {
        self.release();
        match (self.is_reference_counted(), source.control) {
            (true, Control::Counted(_)) => *self = source.take(),
            (true, Control::Uninitialized | Control::Unmanaged) => {
                let ptr = source.ptr.take();
                self.adopt(ptr);
            }
            (false, Control::Counted(_)) => {
                let ptr = source.ptr;
                let destroyed = source.release();
                self.ptr = if destroyed { None } else { ptr };
            }
            (false, Control::Uninitialized | Control::Unmanaged) => self.ptr = source.ptr.take(),
        }
    }

    /// Starts owning `ptr` with the default deleter. `self` must be managed
    /// and already released.
    fn adopt(&mut self, ptr: Option<NonNull<T>>) {
        self.ptr = ptr;
        self.control = match ptr {
            Some(_) => Control::Counted(Self::new_control_block(default_deleter::<T>())),
            None => Control::Uninitialized,
        };
    }

    fn new_control_block(deleter: Deleter<T>) -> NonNull<ControlBlock<T>> {
        let block = Box::new(ControlBlock {
            count: AtomicUsize::new(1),
            deleter,
        });
        NonNull::from(Box::leak(block))
    }
}

impl<T> SharedHandle<T>
where
    T: 'static,
{
    /// Creates a managed handle owning `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

fn default_deleter<T: ?Sized + 'static>() -> Deleter<T> {
    Box::new(|ptr: NonNull<T>| {
        // SAFETY: managed handles only reach the default deleter with pointers
        // produced by `Box::leak` in `from_box`, or adopted from unmanaged
        // handles whose constructor contract requires `Box::into_raw`.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    })
}

impl<T: ?Sized> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        if let Control::Counted(block) = self.control {
            // SAFETY: see `use_count`.
            let previous = unsafe { block.as_ref() }.count.fetch_add(1, Ordering::Relaxed);
            if previous > MAX_REFCOUNT {
                std::process::abort();
            }
        }
        Self {
            ptr: self.ptr,
            control: self.control,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: ?Sized> Deref for SharedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get().expect("dereferenced a null SharedHandle")
    }
}

impl<T: ?Sized> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.control {
            Control::Uninitialized => "managed (uninitialized)",
            Control::Counted(_) => "managed",
            Control::Unmanaged => "unmanaged",
        };
        let mut out = f.debug_struct("SharedHandle");
        out.field("ptr", &self.ptr.map(NonNull::as_ptr).map(|p| p.cast::<()>()))
            .field("mode", &mode);
        if self.is_reference_counted() {
            out.field("use_count", &self.use_count());
        }
        out.finish()
    }
}
