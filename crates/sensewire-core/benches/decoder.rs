//! Decoder benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sensewire_core::{decode_packet, gesture, SensorRegistry};

fn stroke_packet() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&1i32.to_le_bytes());
    buf.extend_from_slice(&(gesture::STROKE_POINT_COUNT as i32).to_le_bytes());
    for i in 0..gesture::STROKE_POINT_COUNT {
        buf.push(i as u8);
        buf.push((255 - i) as u8);
    }
    buf
}

fn decode_benchmark(c: &mut Criterion) {
    let schema = gesture::stroke_schema().unwrap();
    let packet = stroke_packet();

    c.bench_function("decode_stroke_packet", |b| {
        b.iter(|| black_box(decode_packet(&schema, black_box(&packet)).unwrap()))
    });
}

fn registry_benchmark(c: &mut Criterion) {
    let mut registry = SensorRegistry::new();
    registry
        .register_passive(gesture::stroke_schema().unwrap())
        .unwrap();
    registry
        .register_passive(gesture::prediction_schema().unwrap())
        .unwrap();
    let packet = stroke_packet();

    c.bench_function("ingest_stroke_packet", |b| {
        b.iter(|| {
            black_box(
                registry
                    .on_raw_buffer(gesture::STROKE_SENSOR, black_box(&packet))
                    .unwrap(),
            )
        })
    });

    c.bench_function("ingest_prediction_packet", |b| {
        b.iter(|| {
            black_box(
                registry
                    .on_raw_buffer(gesture::PREDICTION_SENSOR, black_box(&[3u8]))
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, decode_benchmark, registry_benchmark);
criterion_main!(benches);
