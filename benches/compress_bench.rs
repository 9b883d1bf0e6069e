//! Benchmarks for the per-message compression runtimes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tether_compress::bzip::{self, Bzip2Offer, PerMessageBzip2};
use tether_compress::deflate::DeflateOffer;
use tether_integration_tests::{deflate_message, negotiated_deflate_pair};

fn wamp_like_payload(size: usize) -> Vec<u8> {
    // repetitive JSON-ish content, the shape WAMP messages actually have
    let unit = br#"[36,5512315355,4429313566,{},["Hello, world!"],{"topic":"com.myapp.topic1"}]"#;
    unit.iter().copied().cycle().take(size).collect()
}

fn bench_deflate_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("deflate_compress");
    for size in [256usize, 4 * 1024, 64 * 1024] {
        let payload = wamp_like_payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            BenchmarkId::new("context_takeover", size),
            &payload,
            |b, payload| {
                let (mut client, _) = negotiated_deflate_pair(DeflateOffer::default(), false);
                b.iter(|| deflate_message(&mut client, payload));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("no_context_takeover", size),
            &payload,
            |b, payload| {
                let (mut client, _) = negotiated_deflate_pair(DeflateOffer::default(), true);
                b.iter(|| deflate_message(&mut client, payload));
            },
        );
    }
    group.finish();
}

fn bench_deflate_roundtrip(c: &mut Criterion) {
    let payload = wamp_like_payload(16 * 1024);
    c.bench_function("deflate_roundtrip_16k", |b| {
        let (mut client, mut server) = negotiated_deflate_pair(DeflateOffer::default(), false);
        b.iter(|| {
            let wire = deflate_message(&mut client, &payload);
            server.start_decompress_message();
            let restored = server.decompress_message_data(&wire).unwrap();
            server.end_decompress_message().unwrap();
            restored
        });
    });
}

fn bench_bzip2_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("bzip2_compress");
    for size in [4 * 1024usize, 64 * 1024] {
        let payload = wamp_like_payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            let accept = bzip::accept_offer(Bzip2Offer::default());
            let mut server = PerMessageBzip2::from_offer_accept(true, &accept);
            b.iter(|| {
                server.start_compress_message();
                let mut wire = server.compress_message_data(payload).unwrap();
                wire.extend(server.end_compress_message().unwrap());
                wire
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_deflate_compress,
    bench_deflate_roundtrip,
    bench_bzip2_compress
);
criterion_main!(benches);
