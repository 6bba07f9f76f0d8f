//! Diamond-shaped task graph built with weft.
//!
//! ```text
//!            ┌──────────────┐
//!            │ root         │
//!            └──────┬───────┘
//!                   ▼
//!            ┌──────────────┐
//!            │ K1: fill     │
//!            └──┬────────┬──┘
//!               ▼        ▼
//!     ┌──────────────┐ ┌──────────────┐
//!     │ K2: square   │ │ K3: sum      │
//!     └──────┬───────┘ └───────┬──────┘
//!            ▼                 ▼
//!            ┌──────────────┐
//!            │ when_all     │
//!            └──────┬───────┘
//!                   ▼
//!            ┌──────────────┐
//!            │ K4: scan     │
//!            └──────────────┘
//! ```
//!
//! K1 writes `0..len` into `input`. K2 squares it into `squares` while K3 sums
//! it. K4 waits for both and scans `squares` into `prefix`.

use weft_exec::{ExecutionSpace, RangePolicy, ReduceResult, Sum, View};
use weft_graph::{Graph, GraphError, create_graph};

/// Buffers and results the diamond writes to.
#[derive(Debug, Clone)]
pub struct DiamondData {
    /// Filled by K1.
    pub input: View<u64>,
    /// Written by K2.
    pub squares: View<u64>,
    /// Exclusive prefix sums of `squares`, written by K4.
    pub prefix: View<u64>,
    /// Sum of `input`, written by K3.
    pub sum: ReduceResult<u64>,
    /// Sum of `squares`, written by K4.
    pub sum_of_squares: ReduceResult<u64>,
}

impl DiamondData {
    /// Allocates buffers of `len` elements.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            input: View::new("input", len),
            squares: View::new("squares", len),
            prefix: View::new("prefix", len),
            sum: ReduceResult::new(),
            sum_of_squares: ReduceResult::new(),
        }
    }

    /// Number of elements per buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.input.len()
    }

    /// Returns `true` for zero-length buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// Builds the diamond over `data` on `space`.
///
/// # Errors
///
/// Returns [`GraphError`] if a node cannot be stored.
pub fn build_diamond<E: ExecutionSpace>(
    space: E,
    data: &DiamondData,
) -> Result<Graph<E>, GraphError> {
    let len = data.len();
    create_graph(space, |builder| {
        let out = data.input.clone();
        let fill = builder.then_parallel_for("K1: fill", len, move |i| out.set(i, i as u64))?;

        let (src, out) = (data.input.clone(), data.squares.clone());
        let square = fill.then_parallel_for("K2: square", len, move |i| {
            let x = src.get(i).unwrap_or(0);
            out.set(i, x * x);
        })?;

        let src = data.input.clone();
        let sum = fill.then_parallel_reduce(
            "K3: sum",
            len,
            move |i, acc: &mut u64| *acc += src.get(i).unwrap_or(0),
            Sum::<u64>::new(),
            &data.sum,
        )?;

        let (src, out) = (data.squares.clone(), data.prefix.clone());
        builder.when_all((square, sum))?.then_parallel_scan(
            "K4: scan",
            RangePolicy::new(0, len),
            move |i, partial: &mut u64, is_final| {
                if is_final {
                    out.set(i, *partial);
                }
                *partial += src.get(i).unwrap_or(0);
            },
            Sum::<u64>::new(),
            &data.sum_of_squares,
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_exec::{Serial, Threads};

    fn check(data: &DiamondData) {
        let n = data.len() as u64;
        assert_eq!(data.sum.get(), Some(n * (n - 1) / 2));
        let squares: u64 = (0..n).map(|x| x * x).sum();
        assert_eq!(data.sum_of_squares.get(), Some(squares));
        let prefix = data.prefix.to_vec();
        assert_eq!(prefix[..4], [0, 0, 1, 5]);
    }

    #[test]
    fn serial_diamond() {
        let data = DiamondData::new(32);
        let graph = build_diamond(Serial, &data).expect("graph");
        assert_eq!(graph.node_count(), 6);
        graph.submit();
        check(&data);
    }

    #[test]
    fn threaded_diamond_matches() {
        let data = DiamondData::new(100);
        let graph = build_diamond(Threads::with_threads(4).expect("pool"), &data).expect("graph");
        let report = graph.submit_once();
        assert!(report.destructive);
        check(&data);
    }
}
