use thiserror::Error;

/// Errors that can occur when allocating, reading or releasing buffers in a
/// [`RingBufferPool`][crate::RingBufferPool].
///
/// Running out of free space is not an error for the blocking
/// [`create_pool_buffer()`][crate::PoolProducer::create_pool_buffer] - the producer simply waits
/// for the consumer to release space. Only the non-blocking variant reports it.
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The payload is larger than the entire pool, so it can never fit no matter how much space
    /// the consumer releases. Either build a larger pool or split the payload.
    #[error("buffer of {requested} bytes can never fit into a pool with capacity {capacity}")]
    BufferTooLarge {
        /// Size of the rejected payload, in bytes.
        requested: usize,

        /// Total capacity of the pool, in bytes.
        capacity: usize,
    },

    /// The payload would fit into the pool but not right now, because the consumer has not
    /// yet released enough of the older buffers.
    #[error("buffer of {requested} bytes does not fit into the {available} bytes currently free")]
    InsufficientSpace {
        /// Size of the rejected payload, in bytes.
        requested: usize,

        /// Number of bytes that were free when the allocation was attempted.
        available: usize,
    },

    /// A buffer was released while an older buffer was still live. Buffers must be released in
    /// the same order they were created.
    #[error("buffer #{sequence} released out of order, expected buffer #{expected}")]
    OutOfOrderRelease {
        /// [Sequence number][crate::PoolBufferPointer::sequence] of the buffer the caller
        /// attempted to release.
        sequence: u64,

        /// Sequence number of the oldest live buffer, which is the only one that may be released.
        expected: u64,
    },

    /// The pointer does not describe a live buffer of this pool. It may be a default (invalid)
    /// pointer, a pointer from another pool or a pointer whose buffer was already released.
    #[error("invalid buffer pointer: {reason}")]
    InvalidPointerUse {
        /// A human-readable description of what is wrong with the pointer.
        reason: &'static str,
    },

    /// The other half of the pool has been dropped, so the pipeline is closed.
    #[error("the other half of the pool has been dropped")]
    Disconnected,
}

/// A specialized `Result` type for ring pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
