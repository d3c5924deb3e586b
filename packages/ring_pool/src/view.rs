use std::iter::{Chain, Copied};
use std::slice;

use crate::PoolBufferPointer;

/// Read-only access to the bytes of one buffer in a [`RingBufferPool`][crate::RingBufferPool].
///
/// Returned by [`PoolConsumer::get_buffer_from_pool()`][1]. A buffer that crosses the physical
/// end of the pool storage is exposed as two segments in logical order; the pool never makes a
/// contiguous scratch copy on your behalf. Use [`as_contiguous()`][2] to take the fast path when
/// the buffer did not wrap and [`to_vec()`][3] or [`copy_to_slice()`][4] otherwise.
///
/// The view borrows the consumer, so the buffer cannot be released while the view is alive.
///
/// [1]: crate::PoolConsumer::get_buffer_from_pool
/// [2]: Self::as_contiguous
/// [3]: Self::to_vec
/// [4]: Self::copy_to_slice
#[derive(Clone, Copy, Debug)]
pub struct PoolBufferView<'a> {
    pointer: PoolBufferPointer,
    first: &'a [u8],
    second: &'a [u8],
}

impl<'a> PoolBufferView<'a> {
    pub(crate) fn new(pointer: PoolBufferPointer, first: &'a [u8], second: &'a [u8]) -> Self {
        Self {
            pointer,
            first,
            second,
        }
    }

    /// The pointer this view was obtained from.
    #[must_use]
    pub fn pointer(&self) -> PoolBufferPointer {
        self.pointer
    }

    /// The number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pointer.size()
    }

    /// Whether the buffer has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the buffer is stored as a single segment.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.second.is_empty()
    }

    /// The whole buffer as one slice, if it did not wrap around the end of the pool storage.
    #[must_use]
    pub fn as_contiguous(&self) -> Option<&'a [u8]> {
        self.is_contiguous().then_some(self.first)
    }

    /// The buffer as two slices that yield the buffer bytes when concatenated.
    ///
    /// The second slice is empty unless the buffer wrapped around the end of the pool storage.
    #[must_use]
    pub fn segments(&self) -> (&'a [u8], &'a [u8]) {
        (self.first, self.second)
    }

    /// Iterates over the bytes of the buffer in order.
    pub fn iter(&self) -> Chain<Copied<slice::Iter<'a, u8>>, Copied<slice::Iter<'a, u8>>> {
        self.first.iter().copied().chain(self.second.iter().copied())
    }

    /// Copies the buffer into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(self.first);
        bytes.extend_from_slice(self.second);
        bytes
    }

    /// Copies the buffer into `destination`.
    ///
    /// # Panics
    ///
    /// Panics if `destination` is not exactly as long as the buffer.
    pub fn copy_to_slice(&self, destination: &mut [u8]) {
        assert_eq!(
            destination.len(),
            self.len(),
            "destination must be exactly as long as the buffer"
        );

        let (head, tail) = destination.split_at_mut(self.first.len());
        head.copy_from_slice(self.first);
        tail.copy_from_slice(self.second);
    }
}

impl<'a> IntoIterator for &PoolBufferView<'a> {
    type Item = u8;
    type IntoIter = Chain<Copied<slice::Iter<'a, u8>>, Copied<slice::Iter<'a, u8>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
