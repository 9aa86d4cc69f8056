//! Benchmarks for the per-transfer hot paths in homeshare-core.
//!
//! - Reassembling a 20 MiB file (the reference size ceiling) from 1 MiB chunks.
//! - Encoding one 1 MiB chunk frame (base64 + JSON).
//! - Assigning display names in a busy registry.
//!
//! Run with `cargo bench -p homeshare-core`.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use homeshare_core::{
    assemble_chunks, encode_event, split_chunks, ClientEvent, NameBook, TransferId,
};

const MIB: usize = 1024 * 1024;

fn bench_assemble_20_mib(c: &mut Criterion) {
    let payload = vec![0xA5u8; 20 * MIB];
    let slots: Vec<Option<Vec<u8>>> = split_chunks(&payload, MIB)
        .map(|chunk| Some(chunk.to_vec()))
        .collect();

    c.bench_function("assemble_chunks_20_mib", |b| {
        b.iter(|| assemble_chunks(black_box(&slots).iter().flatten()))
    });
}

fn bench_encode_chunk_frame(c: &mut Criterion) {
    let event = ClientEvent::Chunk {
        transfer_id: TransferId::from("bench-1"),
        chunk_index: 0,
        chunk_bytes: vec![0x5Au8; MIB],
        is_last: false,
    };

    c.bench_function("encode_chunk_frame_1_mib", |b| {
        b.iter(|| encode_event(black_box(&event)))
    });
}

fn bench_name_assignment(c: &mut Criterion) {
    c.bench_function("name_book_assign_100", |b| {
        b.iter(|| {
            let mut book = NameBook::new();
            for id in 0..100u32 {
                black_box(book.unique_for(&id));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_assemble_20_mib,
    bench_encode_chunk_frame,
    bench_name_assignment
);
criterion_main!(benches);
