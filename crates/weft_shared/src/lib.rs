//! Shared handles for weft (Layer 0).
//!
//! `weft_shared` provides [`SharedHandle`], a pointer that is either
//! reference counted (it owns its target and frees it when the last managed
//! copy goes away) or unmanaged (a plain non-owning view). Graph nodes and
//! graphs are shared through it.
//!
//! # Example
//!
//! ```
//! use weft_shared::SharedHandle;
//!
//! let first = SharedHandle::new(String::from("kernel"));
//! let second = first.clone();
//! assert_eq!(first.use_count(), 2);
//! drop(second);
//! assert_eq!(first.use_count(), 1);
//! assert_eq!(first.as_str(), "kernel");
//! ```

/// The maybe-reference-counted handle.
pub mod handle;

pub use handle::SharedHandle;
