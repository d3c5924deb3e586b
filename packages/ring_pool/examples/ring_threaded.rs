//! A producer thread records variable-size commands while a consumer thread executes them.
//!
//! The pool is deliberately small so the producer regularly has to wait for the consumer. The
//! debug-level log events show each time that happens.

use std::sync::mpsc;
use std::thread;

use ring_pool::RingBufferPool;
use tracing::Level;

const COMMAND_COUNT: u32 = 1000;

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let (mut producer, mut consumer) = RingBufferPool::builder()
        .capacity(1024)
        .name("commands")
        .build()
        .split();

    let (sender, receiver) = mpsc::channel();

    let recorder = thread::spawn(move || {
        for index in 0..COMMAND_COUNT {
            // A command is its index followed by a variable amount of vertex data.
            let vertex_count = usize::try_from(index % 61).expect("small value fits usize");
            let mut command = index.to_le_bytes().to_vec();
            let command_len = vertex_count
                .checked_mul(4)
                .and_then(|vertex_bytes| vertex_bytes.checked_add(command.len()))
                .expect("at most 60 vertices of 4 bytes each");
            command.resize(command_len, 0xCD);

            let pointer = producer
                .create_pool_buffer(&command)
                .expect("consumer keeps running until all commands are received");

            sender
                .send(pointer)
                .expect("consumer keeps running until all commands are received");
        }
    });

    let mut executed_bytes: usize = 0;

    for pointer in receiver {
        let view = consumer.get_buffer_from_pool(pointer);
        executed_bytes = executed_bytes
            .checked_add(view.len())
            .expect("total command size fits in usize");

        consumer.remove_buffer_from_pool(pointer);
    }

    recorder.join().expect("recorder thread does not panic");

    println!("Executed {COMMAND_COUNT} commands totaling {executed_bytes} bytes");
}
