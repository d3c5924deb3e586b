use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{trace, warn};

use crate::error::Result;
use crate::metrics::RELEASED;
use crate::pointer::Span;
use crate::{Error, PoolBufferPointer, PoolBufferView, PoolCore};

/// The consumer half of a [`RingBufferPool`][crate::RingBufferPool].
///
/// Only the consumer can read and release buffers. There is exactly one consumer per pool and it
/// cannot be cloned; move it to the thread that executes the recorded payloads.
///
/// # Release order
///
/// Buffers must be released with [`remove_buffer_from_pool()`][1] exactly once each, in the same
/// order they were created, and only after all reads of them are done. The borrow checker
/// enforces the last part: a [`PoolBufferView`] borrows the consumer, which must be borrowed
/// exclusively to release a buffer.
///
/// Releasing anything other than the oldest live buffer is a contract violation. The pool detects
/// it and leaves its own state untouched, then either panics (the default methods) or returns
/// an error (the `try_` methods).
///
/// Order is tracked by [sequence number][2] rather than by offset, so this also holds for
/// zero-sized buffers, which share their offset with the buffer that follows them.
///
/// [1]: Self::remove_buffer_from_pool
/// [2]: PoolBufferPointer::sequence
#[derive(Debug)]
pub struct PoolConsumer {
    core: Arc<PoolCore>,

    // Sequence number of the oldest live buffer, i.e. the only one that may be released next.
    next_sequence: u64,
}

impl PoolConsumer {
    pub(crate) fn new(core: Arc<PoolCore>) -> Self {
        Self {
            core,
            next_sequence: 0,
        }
    }

    /// The total number of bytes the pool can hold at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// The number of bytes held by buffers that have not yet been released.
    ///
    /// The value can only grow between calls on the consumer's thread, as the producer
    /// creates buffers concurrently.
    #[must_use]
    pub fn in_use(&self) -> usize {
        let (start, end) = self.offsets();
        self.core.in_use(start, end)
    }

    /// The number of bytes not held by any buffer.
    #[must_use]
    pub fn available(&self) -> usize {
        let (start, end) = self.offsets();
        self.core.available(start, end)
    }

    /// Whether the producer half has been dropped. Buffers it created before being dropped remain
    /// readable.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        !self.core.is_producer_connected()
    }

    /// Returns a read-only view over the bytes of a live buffer.
    ///
    /// The view may be requested any number of times before the buffer is released.
    ///
    /// # Panics
    ///
    /// Panics if the pointer is invalid, belongs to a different pool or describes a buffer
    /// that has already been released. Use [`try_get_buffer_from_pool()`][1] to receive an
    /// error instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingBufferPool;
    ///
    /// let (mut producer, consumer) = RingBufferPool::new(8).split();
    ///
    /// let pointer = producer.create_pool_buffer(b"clear").unwrap();
    ///
    /// let view = consumer.get_buffer_from_pool(pointer);
    /// assert_eq!(view.as_contiguous(), Some(&b"clear"[..]));
    /// ```
    ///
    /// [1]: Self::try_get_buffer_from_pool
    #[must_use]
    pub fn get_buffer_from_pool(&self, pointer: PoolBufferPointer) -> PoolBufferView<'_> {
        self.try_get_buffer_from_pool(pointer)
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Returns a read-only view over the bytes of a live buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPointerUse`] if the pointer is invalid, belongs to a different
    /// pool or describes a buffer that has already been released.
    pub fn try_get_buffer_from_pool(
        &self,
        pointer: PoolBufferPointer,
    ) -> Result<PoolBufferView<'_>> {
        let span = self.live_span(pointer)?;

        // SAFETY: We are the consumer and live_span() verified that the buffer lies within the
        // live region, which the producer never writes to. Releasing the buffer requires
        // &mut self, which cannot coexist with the view borrowing &self.
        let (first, second) = unsafe { self.core.segments(span.offset, span.size) };

        Ok(PoolBufferView::new(pointer, first, second))
    }

    /// Releases the oldest live buffer, making its space available to the producer.
    ///
    /// # Panics
    ///
    /// Panics if the pointer is not the oldest live buffer of this pool. The pool is left
    /// unchanged. Use [`try_remove_buffer_from_pool()`][1] to receive an error instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingBufferPool;
    ///
    /// let (mut producer, mut consumer) = RingBufferPool::new(8).split();
    ///
    /// let a = producer.create_pool_buffer(&[1; 4]).unwrap();
    /// let b = producer.create_pool_buffer(&[2; 4]).unwrap();
    /// assert_eq!(consumer.available(), 0);
    ///
    /// consumer.remove_buffer_from_pool(a);
    /// assert_eq!(consumer.available(), 4);
    ///
    /// consumer.remove_buffer_from_pool(b);
    /// assert_eq!(consumer.available(), 8);
    /// ```
    ///
    /// [1]: Self::try_remove_buffer_from_pool
    pub fn remove_buffer_from_pool(&mut self, pointer: PoolBufferPointer) {
        self.try_remove_buffer_from_pool(pointer)
            .unwrap_or_else(|error| panic!("{error}"));
    }

    /// Releases the oldest live buffer, making its space available to the producer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPointerUse`] if the pointer is invalid, belongs to a different
    /// pool or describes a buffer that has already been released.
    ///
    /// Returns [`Error::OutOfOrderRelease`] if the pointer describes a live buffer that is not
    /// the oldest one.
    ///
    /// In all error cases, the pool is not modified.
    pub fn try_remove_buffer_from_pool(&mut self, pointer: PoolBufferPointer) -> Result<()> {
        let span = self.live_span(pointer)?;

        if span.sequence != self.next_sequence {
            warn!(
                pool = self.core.name(),
                sequence = span.sequence,
                expected = self.next_sequence,
                "buffer released out of order"
            );

            return Err(Error::OutOfOrderRelease {
                sequence: span.sequence,
                expected: self.next_sequence,
            });
        }

        let start = self.own_start_offset();
        debug_assert_eq!(
            span.offset, start,
            "the oldest live buffer always starts at the start offset"
        );

        let size = u64::try_from(span.size).expect("usize always fits in u64");
        let new_start = start
            .checked_add(size)
            .expect("guarded by live_span() which checked the buffer ends before the end offset");

        // Release ensures that our reads of the buffer complete before the producer observes
        // the space as free and overwrites it.
        self.core.start_offset().store(new_start, Ordering::Release);
        self.core.space_freed().notify(1);

        self.next_sequence = self
            .next_sequence
            .checked_add(1)
            .expect("guarded by live_span() which checked the buffer was created by the producer");

        RELEASED.with(|e| e.observe_once());
        trace!(
            pool = self.core.name(),
            sequence = span.sequence,
            offset = span.offset,
            size = span.size,
            "buffer released"
        );

        Ok(())
    }

    /// Validates that the pointer describes a buffer of this pool that lies entirely within the
    /// live region.
    fn live_span(&self, pointer: PoolBufferPointer) -> Result<Span> {
        let Some(span) = pointer.span() else {
            return Err(self.invalid_use("pointer was never assigned a buffer"));
        };

        if span.pool_id != self.core.id() {
            return Err(self.invalid_use("pointer belongs to a different pool"));
        }

        let (start, end) = self.offsets();

        if span.sequence < self.next_sequence || span.offset < start {
            return Err(self.invalid_use("buffer has already been released"));
        }

        let size = u64::try_from(span.size).expect("usize always fits in u64");
        let span_end = span
            .offset
            .checked_add(size)
            .ok_or_else(|| self.invalid_use("buffer extends past the end of the pool"))?;

        if span_end > end {
            return Err(self.invalid_use("buffer extends past the end of the pool"));
        }

        Ok(span)
    }

    fn invalid_use(&self, reason: &'static str) -> Error {
        warn!(pool = self.core.name(), reason, "invalid buffer pointer");

        Error::InvalidPointerUse { reason }
    }

    fn offsets(&self) -> (u64, u64) {
        let start = self.own_start_offset();

        // Acquire pairs with the Release in the producer, making the bytes of every buffer up to
        // this end offset visible to us.
        let end = self.core.end_offset().load(Ordering::Acquire);
        (start, end)
    }

    fn own_start_offset(&self) -> u64 {
        // Relaxed is enough: only this thread ever writes the start offset.
        self.core.start_offset().load(Ordering::Relaxed)
    }
}

impl Drop for PoolConsumer {
    fn drop(&mut self) {
        self.core.mark_consumer_disconnected();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::RingBufferPool;

    assert_impl_all!(PoolConsumer: Send, Sync, Debug);
    assert_not_impl_any!(PoolConsumer: Clone);

    #[test]
    fn read_back_equals_written_bytes() {
        let (mut producer, consumer) = RingBufferPool::new(32).split();

        let a = producer.create_pool_buffer(b"set_blend").unwrap();
        let b = producer.create_pool_buffer(b"draw_triangles").unwrap();

        assert_eq!(consumer.get_buffer_from_pool(a).to_vec(), b"set_blend");
        assert_eq!(consumer.get_buffer_from_pool(b).to_vec(), b"draw_triangles");

        // Reading does not consume anything.
        assert_eq!(consumer.get_buffer_from_pool(a).to_vec(), b"set_blend");
        assert_eq!(consumer.in_use(), 23);
    }

    #[test]
    fn wraparound_read_back() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let first = producer.create_pool_buffer(&[0xAA; 10]).unwrap();
        consumer.remove_buffer_from_pool(first);

        let data: Vec<u8> = (1..=12).collect();
        let second = producer.create_pool_buffer(&data).unwrap();

        let view = consumer.get_buffer_from_pool(second);
        assert!(!view.is_contiguous());
        assert_eq!(view.segments(), (&data[..6], &data[6..]));
        assert_eq!(view.to_vec(), data);
    }

    #[test]
    fn release_frees_exactly_the_buffer_size() {
        let (mut producer, mut consumer) = RingBufferPool::new(20).split();

        let a = producer.create_pool_buffer(&[1; 8]).unwrap();
        let b = producer.create_pool_buffer(&[2; 5]).unwrap();
        assert_eq!(consumer.in_use() + consumer.available(), 20);
        assert_eq!(consumer.available(), 7);

        consumer.remove_buffer_from_pool(a);
        assert_eq!(consumer.available(), 15);
        assert_eq!(consumer.in_use() + consumer.available(), 20);

        consumer.remove_buffer_from_pool(b);
        assert_eq!(consumer.available(), 20);
        assert_eq!(producer.available(), 20);
    }

    #[test]
    fn reuse_after_release_does_not_touch_live_bytes() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let a = producer.create_pool_buffer(&[1; 9]).unwrap();
        let b = producer.create_pool_buffer(&[2; 7]).unwrap();

        consumer.remove_buffer_from_pool(a);

        let c = producer.create_pool_buffer(&[3; 9]).unwrap();

        assert_eq!(consumer.get_buffer_from_pool(b).to_vec(), vec![2; 7]);
        assert_eq!(consumer.get_buffer_from_pool(c).to_vec(), vec![3; 9]);
        assert_eq!(producer.available(), 0);
    }

    #[test]
    fn out_of_order_release_is_rejected_and_changes_nothing() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let a = producer.create_pool_buffer(&[1; 4]).unwrap();
        let b = producer.create_pool_buffer(&[2; 4]).unwrap();

        assert_eq!(
            consumer.try_remove_buffer_from_pool(b),
            Err(Error::OutOfOrderRelease {
                sequence: 1,
                expected: 0
            })
        );
        assert_eq!(consumer.in_use(), 8);

        consumer.remove_buffer_from_pool(a);
        consumer.remove_buffer_from_pool(b);
        assert_eq!(consumer.in_use(), 0);
    }

    #[test]
    #[should_panic]
    fn out_of_order_release_panics() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let _a = producer.create_pool_buffer(&[1; 4]).unwrap();
        let b = producer.create_pool_buffer(&[2; 4]).unwrap();

        consumer.remove_buffer_from_pool(b);
    }

    #[test]
    fn double_release_is_rejected() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let a = producer.create_pool_buffer(&[1; 4]).unwrap();
        consumer.remove_buffer_from_pool(a);

        assert!(matches!(
            consumer.try_remove_buffer_from_pool(a),
            Err(Error::InvalidPointerUse { .. })
        ));
        assert!(matches!(
            consumer.try_get_buffer_from_pool(a),
            Err(Error::InvalidPointerUse { .. })
        ));
        assert_eq!(consumer.in_use(), 0);
    }

    #[test]
    fn zero_sized_double_release_is_rejected() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let z = producer.create_pool_buffer(&[]).unwrap();
        let b = producer.create_pool_buffer(&[7; 4]).unwrap();

        consumer.remove_buffer_from_pool(z);

        assert!(matches!(
            consumer.try_remove_buffer_from_pool(z),
            Err(Error::InvalidPointerUse { .. })
        ));
        assert!(matches!(
            consumer.try_get_buffer_from_pool(z),
            Err(Error::InvalidPointerUse { .. })
        ));

        // The rejected release must not have freed the bytes of the following buffer.
        assert_eq!(consumer.in_use(), 4);
        assert_eq!(consumer.get_buffer_from_pool(b).to_vec(), vec![7; 4]);

        consumer.remove_buffer_from_pool(b);
        assert_eq!(consumer.in_use(), 0);
    }

    #[test]
    fn release_before_older_zero_sized_buffer_is_rejected() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let z = producer.create_pool_buffer(&[]).unwrap();
        let b = producer.create_pool_buffer(&[7; 4]).unwrap();

        assert_eq!(
            consumer.try_remove_buffer_from_pool(b),
            Err(Error::OutOfOrderRelease {
                sequence: 1,
                expected: 0
            })
        );
        assert_eq!(consumer.in_use(), 4);

        consumer.remove_buffer_from_pool(z);
        consumer.remove_buffer_from_pool(b);
        assert_eq!(consumer.in_use(), 0);
    }

    #[test]
    fn consecutive_zero_sized_buffers_release_in_order() {
        let (mut producer, mut consumer) = RingBufferPool::new(4).split();

        let first = producer.create_pool_buffer(&[]).unwrap();
        let second = producer.create_pool_buffer(&[]).unwrap();

        assert!(matches!(
            consumer.try_remove_buffer_from_pool(second),
            Err(Error::OutOfOrderRelease { .. })
        ));

        consumer.remove_buffer_from_pool(first);
        consumer.remove_buffer_from_pool(second);

        assert!(matches!(
            consumer.try_remove_buffer_from_pool(first),
            Err(Error::InvalidPointerUse { .. })
        ));
    }

    #[test]
    fn default_pointer_is_rejected() {
        let (_producer, mut consumer) = RingBufferPool::new(16).split();

        assert!(matches!(
            consumer.try_get_buffer_from_pool(PoolBufferPointer::default()),
            Err(Error::InvalidPointerUse { .. })
        ));
        assert!(matches!(
            consumer.try_remove_buffer_from_pool(PoolBufferPointer::default()),
            Err(Error::InvalidPointerUse { .. })
        ));
    }

    #[test]
    #[should_panic]
    fn get_with_default_pointer_panics() {
        let (_producer, consumer) = RingBufferPool::new(16).split();

        _ = consumer.get_buffer_from_pool(PoolBufferPointer::default());
    }

    #[test]
    fn pointer_from_other_pool_is_rejected() {
        let (mut producer_a, _consumer_a) = RingBufferPool::new(16).split();
        let (mut producer_b, mut consumer_b) = RingBufferPool::new(16).split();

        let foreign = producer_a.create_pool_buffer(&[1; 4]).unwrap();
        let own = producer_b.create_pool_buffer(&[2; 4]).unwrap();

        assert!(matches!(
            consumer_b.try_remove_buffer_from_pool(foreign),
            Err(Error::InvalidPointerUse { .. })
        ));

        consumer_b.remove_buffer_from_pool(own);
    }

    #[test]
    fn buffers_survive_producer_drop() {
        let (mut producer, mut consumer) = RingBufferPool::new(16).split();

        let a = producer.create_pool_buffer(b"last words").unwrap();
        drop(producer);

        assert!(consumer.is_disconnected());
        assert_eq!(consumer.get_buffer_from_pool(a).to_vec(), b"last words");
        consumer.remove_buffer_from_pool(a);
    }

    #[test]
    fn empty_buffer_reads_as_empty() {
        let (mut producer, mut consumer) = RingBufferPool::new(4).split();

        let empty = producer.create_pool_buffer(&[]).unwrap();

        assert!(consumer.get_buffer_from_pool(empty).is_empty());
        consumer.remove_buffer_from_pool(empty);
        assert_eq!(consumer.in_use(), 0);
    }
}
