use crate::RingBufferPool;

/// Builder for creating an instance of [`RingBufferPool`].
///
/// [`RingBufferPool::new()`][1] is enough when all you need is a capacity. Use the builder to
/// also give the pool a name, which shows up in log events and `Debug` output and makes it easier
/// to tell pools apart when an application runs more than one pipeline.
///
/// # Examples
///
/// ```
/// use ring_pool::RingBufferPool;
///
/// let pool = RingBufferPool::builder()
///     .capacity(4 * 1024 * 1024)
///     .name("gl_commands")
///     .build();
///
/// assert_eq!(pool.capacity(), 4 * 1024 * 1024);
/// assert_eq!(pool.name(), Some("gl_commands"));
/// ```
///
/// [1]: RingBufferPool::new
#[derive(Debug)]
#[must_use]
pub struct RingBufferPoolBuilder {
    capacity: Option<usize>,
    name: Option<String>,
}

impl RingBufferPoolBuilder {
    pub(crate) fn new() -> Self {
        Self {
            capacity: None,
            name: None,
        }
    }

    /// Sets the total number of bytes the pool can hold at once.
    ///
    /// This is also the largest payload the pool can ever accept.
    pub fn capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Sets a name for the pool, used to identify it in log events and `Debug` output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the pool with the specified configuration, allocating its storage.
    ///
    /// # Panics
    ///
    /// Panics if no capacity has been set using [`capacity()`](Self::capacity) or if the capacity
    /// is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use ring_pool::RingBufferPool;
    ///
    /// let pool = RingBufferPool::builder().capacity(1024).build();
    /// ```
    #[must_use]
    pub fn build(self) -> RingBufferPool {
        let capacity = self
            .capacity
            .expect("capacity must be set using .capacity() before calling .build()");

        RingBufferPool::new_inner(capacity, self.name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(RingBufferPoolBuilder: Send, Sync, Debug);

    #[test]
    fn builds_with_capacity_and_name() {
        let pool = RingBufferPoolBuilder::new()
            .capacity(32)
            .name("commands")
            .build();

        assert_eq!(pool.capacity(), 32);
        assert_eq!(pool.name(), Some("commands"));
    }

    #[test]
    fn name_is_optional() {
        let pool = RingBufferPoolBuilder::new().capacity(8).build();

        assert_eq!(pool.name(), None);
    }

    #[test]
    #[should_panic]
    fn panics_without_capacity() {
        drop(RingBufferPoolBuilder::new().name("nameless").build());
    }

    #[test]
    #[should_panic]
    fn panics_with_zero_capacity() {
        drop(RingBufferPoolBuilder::new().capacity(0).build());
    }
}
