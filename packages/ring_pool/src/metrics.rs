//! Metrics for the ring buffer pool.
//!
//! The producer side records allocation sizes and time spent waiting for space, the consumer
//! side records releases. The events are per-thread, which matches the fixed thread roles.

use nm::{Event, Magnitude};

/// Histogram buckets for the size of allocated buffers in bytes.
///
/// Command payloads range from a few bytes (state toggles) to large vertex uploads.
const ALLOCATED_BYTES_BUCKETS: &[Magnitude] = &[
    16, 64, 256, 1024, 4096, 16_384, 65_536, 262_144, 1_048_576,
];

/// Histogram buckets for the time the producer spends blocked on a full pool, in milliseconds.
const BACKPRESSURE_WAIT_MS_BUCKETS: &[Magnitude] = &[0, 1, 2, 5, 10, 20, 50, 100, 200, 500, 1000];

thread_local! {
    /// Event for observing each buffer created in any pool.
    ///
    /// The magnitude is the buffer size in bytes.
    pub(crate) static ALLOCATED_BYTES: Event = Event::builder()
        .name("ring_pool_allocated_bytes")
        .histogram(ALLOCATED_BYTES_BUCKETS)
        .build();

    /// Event for observing each buffer released back to any pool.
    pub(crate) static RELEASED: Event = Event::builder()
        .name("ring_pool_released")
        .build();

    /// Event for observing how long the producer was blocked before space became available.
    ///
    /// Only allocations that had to wait are observed.
    pub(crate) static BACKPRESSURE_WAIT_MS: Event = Event::builder()
        .name("ring_pool_backpressure_wait_ms")
        .histogram(BACKPRESSURE_WAIT_MS_BUCKETS)
        .build();
}
