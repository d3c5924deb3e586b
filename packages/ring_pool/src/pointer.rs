/// Describes a live buffer inside a [`RingBufferPool`][crate::RingBufferPool].
///
/// The pointer is a plain value: it does not own the bytes it describes and has no behavior on
/// drop. It is created by [`PoolProducer::create_pool_buffer()`][1], handed to the consumer
/// thread through whatever ordering channel the caller uses and then consulted by
/// [`PoolConsumer::get_buffer_from_pool()`][2] any number of times, until it is retired by
/// [`PoolConsumer::remove_buffer_from_pool()`][3].
///
/// A default-constructed pointer is invalid and has size zero. The pool rejects invalid pointers,
/// pointers from other pools and pointers whose buffer was already released.
///
/// # Example
///
/// ```rust
/// use ring_pool::{PoolBufferPointer, RingBufferPool};
///
/// let (mut producer, consumer) = RingBufferPool::new(64).split();
///
/// let empty = PoolBufferPointer::default();
/// assert!(!empty.is_valid());
/// assert_eq!(empty.size(), 0);
///
/// let pointer = producer.create_pool_buffer(b"draw").unwrap();
/// let copy = pointer;
///
/// assert!(copy.is_valid());
/// assert_eq!(copy.size(), 4);
/// assert_eq!(copy, pointer);
/// # drop(consumer);
/// ```
///
/// [1]: crate::PoolProducer::create_pool_buffer
/// [2]: crate::PoolConsumer::get_buffer_from_pool
/// [3]: crate::PoolConsumer::remove_buffer_from_pool
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PoolBufferPointer {
    span: Option<Span>,
}

/// The logical byte range `[offset, offset + size)` of one buffer in one pool.
///
/// `sequence` counts the buffers created by the pool before this one. Zero-sized buffers share
/// their offset with their neighbors, so release order is tracked by sequence, not by offset.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Span {
    pub(crate) pool_id: u64,
    pub(crate) sequence: u64,
    pub(crate) offset: u64,
    pub(crate) size: usize,
}

impl PoolBufferPointer {
    pub(crate) fn new(pool_id: u64, sequence: u64, offset: u64, size: usize) -> Self {
        Self {
            span: Some(Span {
                pool_id,
                sequence,
                offset,
                size,
            }),
        }
    }

    /// Whether this pointer was ever assigned a buffer by a pool.
    ///
    /// A valid pointer stays valid after its buffer is released - validity describes the
    /// pointer itself, not the state of the buffer it points to.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.span.is_some()
    }

    /// The size of the buffer in bytes. Zero for an invalid pointer.
    #[must_use]
    pub fn size(&self) -> usize {
        self.span.map_or(0, |span| span.size)
    }

    /// The logical offset of the buffer in its pool, counted in bytes since the pool was created.
    ///
    /// This is primarily useful for diagnostics. Returns `None` for an invalid pointer.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.span.map(|span| span.offset)
    }

    /// The position of the buffer in creation order: zero for the first buffer created by its
    /// pool, one for the second and so on. Returns `None` for an invalid pointer.
    ///
    /// Buffers must be released in ascending sequence order.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.span.map(|span| span.sequence)
    }

    pub(crate) fn span(&self) -> Option<Span> {
        self.span
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;
    use std::hash::Hash;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(PoolBufferPointer: Send, Sync, Copy, Debug, Default, Eq, Hash);

    #[test]
    fn default_is_invalid_and_empty() {
        let pointer = PoolBufferPointer::default();

        assert!(!pointer.is_valid());
        assert_eq!(pointer.size(), 0);
        assert_eq!(pointer.offset(), None);
        assert_eq!(pointer.sequence(), None);
        assert_eq!(pointer.span(), None);
    }

    #[test]
    fn assigned_pointer_reports_its_range() {
        let pointer = PoolBufferPointer::new(7, 3, 128, 12);

        assert!(pointer.is_valid());
        assert_eq!(pointer.size(), 12);
        assert_eq!(pointer.offset(), Some(128));
        assert_eq!(pointer.sequence(), Some(3));
    }

    #[test]
    fn copies_compare_equal() {
        let pointer = PoolBufferPointer::new(1, 0, 0, 3);
        let copy = pointer;

        assert_eq!(pointer, copy);
        assert_ne!(pointer, PoolBufferPointer::default());
        assert_ne!(pointer, PoolBufferPointer::new(2, 0, 0, 3));

        // Same range, different buffer: a zero-sized buffer followed by another one.
        assert_ne!(
            PoolBufferPointer::new(1, 0, 0, 0),
            PoolBufferPointer::new(1, 1, 0, 0)
        );
    }
}
