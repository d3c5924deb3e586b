use std::fmt;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use event_listener::Event;
use tracing::debug;

use crate::{Error, PoolConsumer, PoolProducer, RingBufferPoolBuilder};

/// Source of process-unique pool identities, stamped into every pointer a pool creates so that a
/// pointer from one pool is rejected by another.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// A fixed-capacity circular byte store shared by exactly one producer thread and exactly one
/// consumer thread.
///
/// The pool is created in one piece and then [split][Self::split] into a [`PoolProducer`] and a
/// [`PoolConsumer`], which are moved to their respective threads. The producer copies payloads
/// into the pool, the consumer reads them and releases them in the same order they were created.
/// Released space is reused by later payloads.
///
/// # Wraparound
///
/// Payloads are never required to be contiguous in memory. A payload that crosses the physical
/// end of the storage is stored as a tail segment followed by a head segment, so no space is ever
/// skipped and every byte of capacity is usable. Readers receive such a payload as two slices via
/// [`PoolBufferView`][crate::PoolBufferView].
///
/// # Backpressure
///
/// When the pool is full, [`PoolProducer::create_pool_buffer()`] blocks until the consumer
/// releases enough space. Use [`PoolProducer::try_create_pool_buffer()`] to fail fast instead.
///
/// # Example
///
/// ```rust
/// use ring_pool::RingBufferPool;
///
/// let (mut producer, mut consumer) = RingBufferPool::new(16).split();
///
/// let first = producer.create_pool_buffer(&[1; 10]).unwrap();
/// consumer.remove_buffer_from_pool(first);
///
/// // This payload crosses the physical end of the storage.
/// let second = producer.create_pool_buffer(&[2; 12]).unwrap();
///
/// let view = consumer.get_buffer_from_pool(second);
/// assert!(!view.is_contiguous());
/// assert_eq!(view.to_vec(), vec![2; 12]);
/// ```
#[derive(Debug)]
pub struct RingBufferPool {
    core: Arc<PoolCore>,
}

impl RingBufferPool {
    /// Creates a pool that can hold `capacity` bytes at once.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::builder().capacity(capacity).build()
    }

    /// Starts building a new [`RingBufferPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the capacity.
    pub fn builder() -> RingBufferPoolBuilder {
        RingBufferPoolBuilder::new()
    }

    #[must_use]
    pub(crate) fn new_inner(capacity: usize, name: Option<String>) -> Self {
        Self {
            core: Arc::new(PoolCore::new(capacity, name)),
        }
    }

    /// The total number of bytes the pool can hold at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// The name given to the pool via the builder, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.core.name()
    }

    /// Splits the pool into its producer and consumer halves.
    ///
    /// Each half is meant to be owned by one thread. The storage is freed when both halves
    /// have been dropped.
    #[must_use]
    pub fn split(self) -> (PoolProducer, PoolConsumer) {
        (
            PoolProducer::new(Arc::clone(&self.core)),
            PoolConsumer::new(self.core),
        )
    }
}

/// State shared between the two halves of a pool.
///
/// `end_offset` is written only by the producer and `start_offset` only by the consumer. Both are
/// logical counters that never wrap; the physical position of a logical offset is
/// `offset % capacity`. The bytes in `[start_offset, end_offset)` are live and belong to the
/// consumer, all other bytes belong to the producer.
pub(crate) struct PoolCore {
    id: u64,
    name: Option<String>,
    capacity: usize,

    /// First byte of `capacity` bytes obtained from a leaked boxed slice and reclaimed on drop.
    /// We never hold a Rust reference to the whole storage because the two halves access
    /// disjoint parts of it concurrently.
    storage: NonNull<u8>,

    start_offset: AtomicU64,
    end_offset: AtomicU64,

    /// Notified whenever the producer may be able to make progress: after a release and when
    /// the consumer disconnects.
    space_freed: Event,

    producer_connected: AtomicBool,
    consumer_connected: AtomicBool,
}

// SAFETY: The storage pointer is uniquely owned by the core. Access to the bytes behind it is
// partitioned between the producer and the consumer by the atomic offsets, so there is never
// a conflicting access from two threads.
unsafe impl Send for PoolCore {}
// SAFETY: See above. All shared mutable state other than the storage is atomic.
unsafe impl Sync for PoolCore {}

impl PoolCore {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    fn new(capacity: usize, name: Option<String>) -> Self {
        assert!(capacity > 0, "RingBufferPool must have non-zero capacity");

        let storage = Box::into_raw(vec![0_u8; capacity].into_boxed_slice());

        // SAFETY: Box::into_raw never returns a null pointer.
        let storage = unsafe { NonNull::new_unchecked(storage.cast::<u8>()) };

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        debug!(pool_id = id, name = name.as_deref(), capacity, "ring buffer pool created");

        Self {
            id,
            name,
            capacity,
            storage,
            start_offset: AtomicU64::new(0),
            end_offset: AtomicU64::new(0),
            space_freed: Event::new(),
            producer_connected: AtomicBool::new(true),
            consumer_connected: AtomicBool::new(true),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn start_offset(&self) -> &AtomicU64 {
        &self.start_offset
    }

    pub(crate) fn end_offset(&self) -> &AtomicU64 {
        &self.end_offset
    }

    pub(crate) fn space_freed(&self) -> &Event {
        &self.space_freed
    }

    pub(crate) fn ensure_fits_capacity(&self, size: usize) -> Result<(), Error> {
        if size > self.capacity {
            return Err(Error::BufferTooLarge {
                requested: size,
                capacity: self.capacity,
            });
        }

        Ok(())
    }

    /// Number of bytes in the live region `[start, end)`.
    pub(crate) fn in_use(&self, start: u64, end: u64) -> usize {
        let in_use = end
            .checked_sub(start)
            .expect("start offset never advances past end offset");

        usize::try_from(in_use).expect("live region never exceeds capacity, which is a usize")
    }

    /// Number of bytes outside the live region `[start, end)`.
    pub(crate) fn available(&self, start: u64, end: u64) -> usize {
        self.capacity
            .checked_sub(self.in_use(start, end))
            .expect("live region never exceeds capacity")
    }

    pub(crate) fn mark_producer_disconnected(&self) {
        // Release pairs with the Acquire in is_producer_connected() so the consumer sees every
        // buffer published before the producer went away.
        self.producer_connected.store(false, Ordering::Release);
    }

    pub(crate) fn is_producer_connected(&self) -> bool {
        self.producer_connected.load(Ordering::Acquire)
    }

    #[cfg_attr(test, mutants::skip)] // Removing this causes hangs (producer waits forever).
    pub(crate) fn mark_consumer_disconnected(&self) {
        self.consumer_connected.store(false, Ordering::Release);

        // Wake up a producer that may be waiting for space that will now never come.
        self.space_freed.notify(1);
    }

    pub(crate) fn is_consumer_connected(&self) -> bool {
        self.consumer_connected.load(Ordering::Acquire)
    }

    /// Maps the logical range `[offset, offset + size)` to physical storage, returning the
    /// physical index of the first byte, the length of the segment up to the end of the storage
    /// and the length of the segment that wraps around to the start of the storage.
    fn locate(&self, offset: u64, size: usize) -> (usize, usize, usize) {
        debug_assert!(size <= self.capacity);

        let capacity = u64::try_from(self.capacity).expect("usize always fits in u64");
        let start = usize::try_from(
            offset
                .checked_rem(capacity)
                .expect("capacity is never zero"),
        )
        .expect("remainder is less than capacity, which is a usize");

        let until_end = self
            .capacity
            .checked_sub(start)
            .expect("physical index is always less than capacity");

        let first_len = size.min(until_end);
        let second_len = size
            .checked_sub(first_len)
            .expect("first segment is never longer than the whole range");

        (start, first_len, second_len)
    }

    /// Copies `data` into the logical range starting at `offset`, splitting the copy in two if
    /// the range crosses the physical end of the storage.
    ///
    /// # Safety
    ///
    /// The caller must be the producer and the range `[offset, offset + data.len())` must lie
    /// outside the live region, so no reader can observe the bytes while they are written.
    pub(crate) unsafe fn write(&self, offset: u64, data: &[u8]) {
        let (start, first_len, second_len) = self.locate(offset, data.len());
        let (head, tail) = data.split_at(first_len);
        debug_assert_eq!(tail.len(), second_len);

        // SAFETY: locate() guarantees start + first_len <= capacity, so the destination is within
        // the storage. The source is a caller-owned slice that cannot overlap the storage because
        // we never hand out mutable access to the storage.
        unsafe {
            ptr::copy_nonoverlapping(head.as_ptr(), self.storage.as_ptr().add(start), first_len);
        }

        // SAFETY: second_len <= start because the whole range is no longer than capacity, so the
        // wrapped segment fits before the first segment and does not overlap it.
        unsafe {
            ptr::copy_nonoverlapping(tail.as_ptr(), self.storage.as_ptr(), second_len);
        }
    }

    /// Returns the bytes of the logical range `[offset, offset + size)` as up to two slices in
    /// logical order. The second slice is empty unless the range wraps around.
    ///
    /// # Safety
    ///
    /// The caller must be the consumer, the range must lie within the live region and the
    /// caller must not release it while the returned slices are alive.
    pub(crate) unsafe fn segments(&self, offset: u64, size: usize) -> (&[u8], &[u8]) {
        let (start, first_len, second_len) = self.locate(offset, size);

        // SAFETY: The range is within the storage (see locate()) and the producer does not write
        // to live bytes, so nothing mutates them for the lifetime of the slice.
        let first = unsafe { slice::from_raw_parts(self.storage.as_ptr().add(start), first_len) };

        // SAFETY: As above, for the wrapped part at the start of the storage.
        let second = unsafe { slice::from_raw_parts(self.storage.as_ptr(), second_len) };

        (first, second)
    }
}

impl Drop for PoolCore {
    fn drop(&mut self) {
        let storage = ptr::slice_from_raw_parts_mut(self.storage.as_ptr(), self.capacity);

        // SAFETY: The pointer came from Box::into_raw() of a boxed slice of exactly this length
        // and we are the last owner of the core, so nobody else is accessing the storage.
        drop(unsafe { Box::from_raw(storage) });
    }
}

impl fmt::Debug for PoolCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("start_offset", &self.start_offset.load(Ordering::Relaxed))
            .field("end_offset", &self.end_offset.load(Ordering::Relaxed))
            .field("producer_connected", &self.is_producer_connected())
            .field("consumer_connected", &self.is_consumer_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(RingBufferPool: Send, Sync, Debug);
    assert_not_impl_any!(RingBufferPool: Clone);

    #[test]
    fn new_pool_is_empty() {
        let core = PoolCore::new(16, None);

        assert_eq!(core.capacity(), 16);
        assert_eq!(core.in_use(0, 0), 0);
        assert_eq!(core.available(0, 0), 16);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        drop(RingBufferPool::new(0));
    }

    #[test]
    fn pools_get_distinct_ids() {
        let a = PoolCore::new(4, None);
        let b = PoolCore::new(4, None);

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn locate_without_wrap() {
        let core = PoolCore::new(16, None);

        assert_eq!(core.locate(0, 16), (0, 16, 0));
        assert_eq!(core.locate(3, 5), (3, 5, 0));
        assert_eq!(core.locate(16 + 3, 5), (3, 5, 0));
    }

    #[test]
    fn locate_with_wrap() {
        let core = PoolCore::new(16, None);

        assert_eq!(core.locate(10, 12), (10, 6, 6));
        assert_eq!(core.locate(15, 16), (15, 1, 15));
    }

    #[test]
    fn locate_empty_range() {
        let core = PoolCore::new(16, None);

        assert_eq!(core.locate(16, 0), (0, 0, 0));
    }

    #[test]
    fn write_then_read_across_wrap() {
        let core = PoolCore::new(8, None);
        let data = [1, 2, 3, 4, 5];

        // SAFETY: Single-threaded test, nothing else accesses the storage.
        unsafe { core.write(6, &data) };

        // SAFETY: As above, and we do not write while the slices are alive.
        let (first, second) = unsafe { core.segments(6, data.len()) };

        assert_eq!(first, &[1, 2]);
        assert_eq!(second, &[3, 4, 5]);
    }

    #[test]
    fn accounting_tracks_live_region() {
        let core = PoolCore::new(10, None);

        assert_eq!(core.in_use(20, 27), 7);
        assert_eq!(core.available(20, 27), 3);
        assert_eq!(core.available(20, 30), 0);
    }

    #[test]
    fn too_large_is_rejected() {
        let core = PoolCore::new(10, None);

        assert_eq!(core.ensure_fits_capacity(10), Ok(()));
        assert_eq!(
            core.ensure_fits_capacity(11),
            Err(Error::BufferTooLarge {
                requested: 11,
                capacity: 10
            })
        );
    }

    #[test]
    fn consumer_disconnect_is_visible() {
        let core = PoolCore::new(4, None);
        assert!(core.is_consumer_connected());
        assert!(core.is_producer_connected());

        core.mark_consumer_disconnected();
        assert!(!core.is_consumer_connected());

        core.mark_producer_disconnected();
        assert!(!core.is_producer_connected());
    }

    #[test]
    fn split_shares_one_pool() {
        let pool = RingBufferPool::builder().capacity(12).name("split").build();
        let (producer, consumer) = pool.split();

        assert_eq!(producer.capacity(), 12);
        assert_eq!(consumer.capacity(), 12);
    }
}
