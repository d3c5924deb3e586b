#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A bounded circular byte pool for handing variable-size payloads from one producer thread to
//! one consumer thread.
//!
//! This crate provides [`RingBufferPool`], a fixed-capacity staging area that decouples the
//! recording of payloads from their execution. A typical user is a threaded renderer: the
//! producer thread serializes draw commands into the pool without allocating, the consumer
//! thread later reads them in order and releases them, reclaiming space as it goes.
//!
//! # Key features
//!
//! - **Fixed capacity**: Storage is allocated once when the pool is created.
//! - **Lock-free**: The two threads synchronize through a pair of atomic offsets only.
//! - **Backpressure**: A producer that runs out of space waits for the consumer instead of
//!   dropping data. A non-blocking variant is available when waiting is not acceptable.
//! - **No wasted space**: Payloads that cross the physical end of the storage are split in two
//!   instead of skipping to the start, so the whole capacity is always usable.
//! - **Checked contract**: Reading or releasing a pointer that is not live in the pool, or
//!   releasing buffers out of order, is detected and never corrupts the pool.
//!
//! # Roles
//!
//! A pool is [split][RingBufferPool::split] into a [`PoolProducer`] and a [`PoolConsumer`].
//! Neither can be cloned, which keeps the pool to exactly one thread on each side.
//!
//! The producer returns a [`PoolBufferPointer`] for every payload. The caller is responsible for
//! delivering the pointers to the consumer in the order they were created, for example over a
//! standard channel. The consumer reads each payload through a [`PoolBufferView`] and then
//! releases it, again in creation order.
//!
//! # Example
//!
//! ```rust
//! use std::sync::mpsc;
//! use std::thread;
//!
//! use ring_pool::RingBufferPool;
//!
//! let (mut producer, mut consumer) = RingBufferPool::new(64).split();
//! let (sender, receiver) = mpsc::channel();
//!
//! let recorder = thread::spawn(move || {
//!     for frame in 0..100_u32 {
//!         let pointer = producer.create_pool_buffer(&frame.to_le_bytes()).unwrap();
//!         sender.send(pointer).unwrap();
//!     }
//! });
//!
//! for (expected, pointer) in receiver.iter().enumerate() {
//!     let mut bytes = [0; 4];
//!     consumer.get_buffer_from_pool(pointer).copy_to_slice(&mut bytes);
//!     assert_eq!(u32::from_le_bytes(bytes) as usize, expected);
//!
//!     consumer.remove_buffer_from_pool(pointer);
//! }
//!
//! recorder.join().unwrap();
//! ```

mod builder;
mod consumer;
mod error;
mod metrics;
mod pointer;
mod pool;
mod producer;
mod view;

pub use builder::*;
pub use consumer::*;
pub use error::Error;
pub use pointer::PoolBufferPointer;
pub(crate) use pool::PoolCore;
pub use pool::RingBufferPool;
pub use producer::*;
pub use view::*;
