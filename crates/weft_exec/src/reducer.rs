//! Reducers combine the partial values produced by reduction and scan kernels.
//!
//! A reducer supplies an identity ([`Reducer::init`]) and an associative
//! combine step ([`Reducer::join`]). Spaces that split a range into chunks
//! reduce each chunk from the identity and then join the chunk results in
//! range order, so non-commutative reducers still see their operands in order.

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Add, Mul};
use std::sync::Arc;

use parking_lot::Mutex;

/// Identity and combine step for a reduction.
pub trait Reducer: Send + Sync + 'static {
    /// The value being reduced.
    type Value: Clone + Send + Sync + 'static;

    /// Returns the identity of [`join`](Self::join).
    fn init(&self) -> Self::Value;

    /// Folds `src` into `dst`.
    fn join(&self, dst: &mut Self::Value, src: &Self::Value);
}

/// Types with a smallest and a largest value, used as identities by [`Min`]
/// and [`Max`].
pub trait Bounded: Copy + PartialOrd + Send + Sync + 'static {
    /// The smallest value.
    const LOWEST: Self;
    /// The largest value.
    const HIGHEST: Self;
}

macro_rules! impl_bounded_int {
    ($($ty:ty),*) => {
        $(impl Bounded for $ty {
            const LOWEST: Self = <$ty>::MIN;
            const HIGHEST: Self = <$ty>::MAX;
        })*
    };
}

impl_bounded_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Bounded for f32 {
    const LOWEST: Self = f32::NEG_INFINITY;
    const HIGHEST: Self = f32::INFINITY;
}

impl Bounded for f64 {
    const LOWEST: Self = f64::NEG_INFINITY;
    const HIGHEST: Self = f64::INFINITY;
}

// ─────────────────────────────────────────────────────────────────────────────
// Builtin reducers
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! marker_reducer {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<T>(PhantomData<fn() -> T>);

        impl<T> $name<T> {
            /// Creates the reducer.
            #[must_use]
            pub const fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}<{}>", stringify!($name), core::any::type_name::<T>())
            }
        }
    };
}

marker_reducer! {
    /// Sums values, starting from zero.
    Sum
}

marker_reducer! {
    /// Multiplies values, starting from one.
    Prod
}

marker_reducer! {
    /// Keeps the smallest value, starting from [`Bounded::HIGHEST`].
    Min
}

marker_reducer! {
    /// Keeps the largest value, starting from [`Bounded::LOWEST`].
    Max
}

impl<T> Reducer for Sum<T>
where
    T: Copy + Add<Output = T> + From<u8> + Send + Sync + 'static,
{
    type Value = T;

    fn init(&self) -> T {
        T::from(0)
    }

    fn join(&self, dst: &mut T, src: &T) {
        *dst = *dst + *src;
    }
}

impl<T> Reducer for Prod<T>
where
    T: Copy + Mul<Output = T> + From<u8> + Send + Sync + 'static,
{
    type Value = T;

    fn init(&self) -> T {
        T::from(1)
    }

    fn join(&self, dst: &mut T, src: &T) {
        *dst = *dst * *src;
    }
}

impl<T: Bounded> Reducer for Min<T> {
    type Value = T;

    fn init(&self) -> T {
        T::HIGHEST
    }

    fn join(&self, dst: &mut T, src: &T) {
        if *src < *dst {
            *dst = *src;
        }
    }
}

impl<T: Bounded> Reducer for Max<T> {
    type Value = T;

    fn init(&self) -> T {
        T::LOWEST
    }

    fn join(&self, dst: &mut T, src: &T) {
        if *src > *dst {
            *dst = *src;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReduceResult
// ─────────────────────────────────────────────────────────────────────────────

/// Shared cell receiving the result of a reduction or scan kernel.
///
/// The kernel keeps one clone and writes into it every time it runs; the
/// caller keeps another and reads the latest value after submission.
pub struct ReduceResult<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> ReduceResult<T> {
    /// Creates an empty result cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Stores `value`, replacing any earlier result.
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Removes and returns the stored value.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Returns `true` once a kernel has written a value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T: Clone> ReduceResult<T> {
    /// Returns a copy of the stored value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

impl<T> Clone for ReduceResult<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for ReduceResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReduceResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReduceResult").field(&*self.slot.lock()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold<R: Reducer>(reducer: &R, values: &[R::Value]) -> R::Value {
        let mut acc = reducer.init();
        for value in values {
            reducer.join(&mut acc, value);
        }
        acc
    }

    #[test]
    fn sum_and_prod() {
        assert_eq!(fold(&Sum::<i64>::new(), &[1, 2, 3, 4]), 10);
        assert_eq!(fold(&Prod::<u32>::new(), &[1, 2, 3, 4]), 24);
        assert_eq!(fold(&Sum::<f64>::new(), &[]), 0.0);
        assert_eq!(fold(&Prod::<f64>::new(), &[]), 1.0);
    }

    #[test]
    fn min_and_max() {
        assert_eq!(fold(&Min::<i32>::new(), &[4, -2, 9]), -2);
        assert_eq!(fold(&Max::<i32>::new(), &[4, -2, 9]), 9);
        assert_eq!(fold(&Min::<u8>::new(), &[]), u8::MAX);
        assert_eq!(fold(&Max::<f32>::new(), &[]), f32::NEG_INFINITY);
    }

    #[test]
    fn reduce_result_is_shared() {
        let result = ReduceResult::new();
        let writer = result.clone();
        assert!(!result.is_set());
        writer.set(5);
        assert_eq!(result.get(), Some(5));
        assert_eq!(result.take(), Some(5));
        assert_eq!(writer.get(), None);
    }

    #[test]
    fn debug_names_the_value_type() {
        assert_eq!(format!("{:?}", Sum::<u64>::new()), "Sum<u64>");
    }
}
