//! Basic usage example for `RingBufferPool`.
//!
//! This example walks through the lifecycle of a few buffers on a single thread, including one
//! that wraps around the end of the pool storage.

use ring_pool::{PoolBufferPointer, RingBufferPool};

fn main() {
    let pool = RingBufferPool::builder()
        .capacity(16)
        .name("example")
        .build();

    println!("Created pool with capacity: {}", pool.capacity());

    let (mut producer, mut consumer) = pool.split();

    let first = producer
        .create_pool_buffer(b"0123456789")
        .expect("10 bytes fit into an empty pool of 16 bytes");

    println!("First buffer: {first:?}, in use: {}", producer.in_use());

    consumer.remove_buffer_from_pool(first);

    println!("Released first buffer, in use: {}", consumer.in_use());

    // The pool storage ends after 6 more bytes, so this payload continues at the start.
    let second = producer
        .create_pool_buffer(b"abcdefghijkl")
        .expect("12 bytes fit after the first buffer was released");

    let view = consumer.get_buffer_from_pool(second);
    let (head, tail) = view.segments();

    println!(
        "Second buffer is stored as {} + {} bytes: {:?}",
        head.len(),
        tail.len(),
        String::from_utf8_lossy(&view.to_vec())
    );

    consumer.remove_buffer_from_pool(second);

    // Pointers are plain values. A default pointer is never valid.
    let empty = PoolBufferPointer::default();
    println!("Default pointer valid: {}", empty.is_valid());

    match consumer.try_get_buffer_from_pool(empty) {
        Ok(_) => unreachable!("the pool rejects invalid pointers"),
        Err(error) => println!("Reading a default pointer fails: {error}"),
    }
}
