//! Deferred task-dependency graphs for Rust.
//!
//! Describe a DAG of kernels once, then submit it as many times as needed.
//!
//! ```
//! use weft::prelude::*;
//!
//! let hits = View::<u32>::new("hits", 4);
//! let out = hits.clone();
//! let graph = create_graph(Serial, |builder| {
//!     let first = builder.then_fill("clear", &out, 0)?;
//!     let out = out.clone();
//!     first.then_parallel_for("mark", 4_usize, move |i| out.set(i, 1))?;
//!     Ok(())
//! })?;
//! graph.submit();
//! assert_eq!(hits.to_vec(), vec![1; 4]);
//! # Ok::<(), GraphError>(())
//! ```

pub use weft_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use weft_internal::prelude::*;
}
