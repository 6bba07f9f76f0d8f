use thiserror::Error;

/// Errors raised while setting up execution spaces or strategies.
///
/// Running a configured strategy never fails; everything that can go wrong is
/// reported when the strategy or space is built.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The rayon pool backing a [`Threads`](crate::Threads) space could not be built.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// A thread-backed space was asked for zero worker threads.
    #[error("a thread pool needs at least one thread")]
    ZeroThreads,
    /// Deep copy between views of different lengths.
    #[error("deep copy extent mismatch: destination has {dst} elements, source has {src}")]
    ExtentMismatch {
        /// Destination length.
        dst: usize,
        /// Source length.
        src: usize,
    },
}
