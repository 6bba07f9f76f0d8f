//! Iteration ranges for bulk kernels.

use core::fmt;
use core::ops::Range;

/// A half-open iteration range `[begin, end)` for bulk kernels.
///
/// Spaces that split work across threads cut the range into contiguous chunks.
/// The chunk size is picked from the space's concurrency unless set with
/// [`with_chunk_size`](Self::with_chunk_size).
///
/// # Example
///
/// ```
/// use weft_exec::RangePolicy;
///
/// let policy = RangePolicy::new(0, 10).with_chunk_size(4);
/// let chunks: Vec<_> = policy.chunks(1).collect();
/// assert_eq!(chunks, vec![0..4, 4..8, 8..10]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangePolicy {
    begin: usize,
    end: usize,
    chunk_size: Option<usize>,
}

/// Chunks handed to each worker when no chunk size is set.
const CHUNKS_PER_WORKER: usize = 4;

impl RangePolicy {
    /// Creates a policy over `[begin, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `begin > end`.
    #[must_use]
    pub fn new(begin: usize, end: usize) -> Self {
        assert!(
            begin <= end,
            "RangePolicy begin ({begin}) must not exceed end ({end})"
        );
        Self {
            begin,
            end,
            chunk_size: None,
        }
    }

    /// Sets a fixed chunk size. Zero restores automatic chunking.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = (chunk_size > 0).then_some(chunk_size);
        self
    }

    /// First index.
    #[must_use]
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// One past the last index.
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// Returns `true` if the range has no indices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// The explicit chunk size, if one was set.
    #[must_use]
    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    /// The whole range.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.begin..self.end
    }

    /// Splits the range into contiguous, ordered chunks for `workers` threads.
    ///
    /// An empty range yields no chunks.
    pub fn chunks(&self, workers: usize) -> impl Iterator<Item = Range<usize>> + use<> {
        let size = self.effective_chunk_size(workers);
        let (begin, end) = (self.begin, self.end);
        (begin..end)
            .step_by(size)
            .map(move |start| start..end.min(start.saturating_add(size)))
    }

    fn effective_chunk_size(&self, workers: usize) -> usize {
        self.chunk_size.unwrap_or_else(|| {
            let pieces = workers.max(1).saturating_mul(CHUNKS_PER_WORKER);
            self.len().div_ceil(pieces).max(1)
        })
    }
}

impl From<Range<usize>> for RangePolicy {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<usize> for RangePolicy {
    fn from(len: usize) -> Self {
        Self::new(0, len)
    }
}

impl fmt::Display for RangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}
