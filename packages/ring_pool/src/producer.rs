use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use event_listener::Listener;
use tracing::{debug, trace};

use crate::error::Result;
use crate::metrics::{ALLOCATED_BYTES, BACKPRESSURE_WAIT_MS};
use crate::{Error, PoolBufferPointer, PoolCore};

/// The producer half of a [`RingBufferPool`][crate::RingBufferPool].
///
/// Only the producer can create buffers. There is exactly one producer per pool and it cannot be
/// cloned; move it to the thread that records payloads.
///
/// Pointers returned by the producer must reach the consumer in the order they were created.
/// Carrying them over a channel with a happens-before edge (any standard channel) is sufficient.
#[derive(Debug)]
pub struct PoolProducer {
    core: Arc<PoolCore>,

    // Sequence number of the next buffer we create.
    next_sequence: u64,
}

impl PoolProducer {
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

    /// The number of bytes held by buffers that the consumer has not yet released.
    ///
    /// The value can only shrink between calls on the producer's thread, as the consumer
    /// releases buffers concurrently.
    #[must_use]
    pub fn in_use(&self) -> usize {
        let (start, end) = self.offsets();
        self.core.in_use(start, end)
    }

    /// The number of bytes a new buffer could use right now without waiting.
    #[must_use]
    pub fn available(&self) -> usize {
        let (start, end) = self.offsets();
        self.core.available(start, end)
    }

    /// Whether the consumer half has been dropped. Once it has, no more buffers can be created.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        !self.core.is_consumer_connected()
    }

    /// Copies `data` into the pool and returns a pointer describing the new buffer.
    ///
    /// If the pool does not currently have enough free space, the call blocks until the consumer
    /// releases enough older buffers. The bytes are fully copied before the buffer is published
    /// to the consumer, so the consumer never observes a partially written buffer.
    ///
    /// An empty `data` is accepted and produces a valid pointer of size zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooLarge`] if `data` is larger than the capacity of the pool. The
    /// pool is not modified in this case.
    ///
    /// Returns [`Error::Disconnected`] if the consumer has been dropped, including while the
    /// call was waiting for space.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingBufferPool;
    ///
    /// let (mut producer, consumer) = RingBufferPool::new(8).split();
    ///
    /// let pointer = producer.create_pool_buffer(b"abc").unwrap();
    /// assert_eq!(pointer.size(), 3);
    /// assert_eq!(producer.in_use(), 3);
    ///
    /// assert!(producer.create_pool_buffer(&[0; 9]).is_err());
    /// # drop(consumer);
    /// ```
    pub fn create_pool_buffer(&mut self, data: &[u8]) -> Result<PoolBufferPointer> {
        self.core.ensure_fits_capacity(data.len())?;

        let end = self.own_end_offset();
        let mut wait_started = None;

        loop {
            if !self.core.is_consumer_connected() {
                return Err(Error::Disconnected);
            }

            if self.available_before(end) >= data.len() {
                break;
            }

            let listener = self.core.space_freed().listen();

            // Re-check after registering the listener to avoid lost wakeups.
            if self.available_before(end) >= data.len() || !self.core.is_consumer_connected() {
                continue;
            }

            if wait_started.is_none() {
                debug!(
                    pool = self.core.name(),
                    requested = data.len(),
                    in_use = self.in_use(),
                    "pool full, waiting for consumer to release space"
                );

                wait_started = Some(Instant::now());
            }

            listener.wait();
        }

        if let Some(wait_started) = wait_started {
            BACKPRESSURE_WAIT_MS.with(|e| e.observe_millis(wait_started.elapsed()));
        }

        Ok(self.commit(end, data))
    }

    /// Copies `data` into the pool if there is enough free space right now, without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooLarge`] if `data` is larger than the capacity of the pool.
    ///
    /// Returns [`Error::InsufficientSpace`] if `data` would fit into the pool but the consumer
    /// has not yet released enough space for it.
    ///
    /// Returns [`Error::Disconnected`] if the consumer has been dropped.
    ///
    /// In all error cases, the pool is not modified.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::{Error, RingBufferPool};
    ///
    /// let (mut producer, consumer) = RingBufferPool::new(8).split();
    ///
    /// producer.try_create_pool_buffer(&[1; 6]).unwrap();
    ///
    /// assert_eq!(
    ///     producer.try_create_pool_buffer(&[2; 4]),
    ///     Err(Error::InsufficientSpace {
    ///         requested: 4,
    ///         available: 2
    ///     })
    /// );
    /// # drop(consumer);
    /// ```
    pub fn try_create_pool_buffer(&mut self, data: &[u8]) -> Result<PoolBufferPointer> {
        self.core.ensure_fits_capacity(data.len())?;

        if !self.core.is_consumer_connected() {
            return Err(Error::Disconnected);
        }

        let end = self.own_end_offset();
        let available = self.available_before(end);

        if available < data.len() {
            return Err(Error::InsufficientSpace {
                requested: data.len(),
                available,
            });
        }

        Ok(self.commit(end, data))
    }

    /// Writes `data` at logical offset `end` and publishes it. The caller has verified that the
    /// space is free.
    fn commit(&mut self, end: u64, data: &[u8]) -> PoolBufferPointer {
        // SAFETY: We are the producer (guaranteed by &mut self on the only producer instance) and
        // the caller verified that [end, end + len) lies outside the live region, so the consumer
        // is not reading these bytes.
        unsafe {
            self.core.write(end, data);
        }

        let size = u64::try_from(data.len()).expect("usize always fits in u64");
        let new_end = end
            .checked_add(size)
            .expect("a u64 byte counter does not overflow in any realistic process lifetime");

        // Release ensures the consumer sees the copied bytes once it observes the new end offset.
        self.core.end_offset().store(new_end, Ordering::Release);

        let sequence = self.next_sequence;
        self.next_sequence = sequence
            .checked_add(1)
            .expect("a u64 buffer counter does not overflow in any realistic process lifetime");

        ALLOCATED_BYTES.with(|e| e.observe(data.len()));
        trace!(
            pool = self.core.name(),
            sequence,
            offset = end,
            size = data.len(),
            "buffer created"
        );

        PoolBufferPointer::new(self.core.id(), sequence, end, data.len())
    }

    fn available_before(&self, end: u64) -> usize {
        // Acquire pairs with the Release in the consumer, so we do not overwrite bytes the
        // consumer may still be reading.
        let start = self.core.start_offset().load(Ordering::Acquire);
        self.core.available(start, end)
    }

    fn offsets(&self) -> (u64, u64) {
        let end = self.own_end_offset();
        let start = self.core.start_offset().load(Ordering::Acquire);
        (start, end)
    }

    fn own_end_offset(&self) -> u64 {
        // Relaxed is enough: only this thread ever writes the end offset.
        self.core.end_offset().load(Ordering::Relaxed)
    }
}

impl Drop for PoolProducer {
    fn drop(&mut self) {
        self.core.mark_producer_disconnected();
    }
}
