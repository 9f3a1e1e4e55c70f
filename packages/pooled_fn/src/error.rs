use thiserror::Error;

/// Errors that can occur when taking a slot from a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool has no vacant slot and is configured not to grow.
    ///
    /// This indicates the pool was sized too small for the workload. Increase the initial slot
    /// count or enable growth.
    #[error("pool '{pool}' is exhausted: all {capacity} slots are in use and growth is disabled")]
    PoolExhausted {
        /// Name of the pool that ran out of slots.
        pool: &'static str,

        /// Total number of slots in the pool.
        capacity: usize,
    },

    /// The raw allocator refused to provide a new chunk of slots.
    #[error("pool '{pool}' could not obtain a chunk of {bytes} bytes from its raw allocator")]
    RawAllocationFailed {
        /// Name of the pool that tried to grow.
        pool: &'static str,

        /// Size of the chunk that was requested.
        bytes: usize,
    },

    /// The size of a chunk with the requested number of slots does not fit in memory.
    #[error("pool '{pool}' cannot lay out a chunk of {slots} slots: size overflows")]
    LayoutOverflow {
        /// Name of the pool that tried to grow.
        pool: &'static str,

        /// Number of slots in the chunk that could not be laid out.
        slots: usize,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
