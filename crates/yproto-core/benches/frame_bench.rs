use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use yproto_core::{DocStep, Envelope, Target};

fn bench_envelope_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_encode");

    for size in [64usize, 256, 1024, 16 * 1024, 64 * 1024] {
        let payload = vec![0xAAu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("update_{size}_bytes"), |b| {
            b.iter(|| {
                let mut env = Envelope::new(
                    "bench-doc",
                    false,
                    Target::Doc(DocStep::Update(black_box(payload.clone()))),
                );
                black_box(env.encoded().len())
            })
        });
    }

    group.finish();
}

fn bench_envelope_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_decode");

    for size in [64usize, 256, 1024, 16 * 1024, 64 * 1024] {
        let payload = vec![0xBBu8; size];
        let mut env = Envelope::new("bench-doc", false, Target::Doc(DocStep::Update(payload)));
        let bytes = env.encoded().to_vec();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(format!("update_{size}_bytes"), |b| {
            b.iter(|| black_box(Envelope::decode(black_box(&bytes)).unwrap()))
        });
    }

    group.finish();
}

fn bench_message_id(c: &mut Criterion) {
    let mut env = Envelope::new(
        "bench-doc",
        false,
        Target::Doc(DocStep::Update(vec![0xCC; 4096])),
    );
    c.bench_function("message_id_4096_bytes", |b| {
        env.invalidate();
        b.iter(|| black_box(env.id()))
    });
}

criterion_group!(
    benches,
    bench_envelope_encode,
    bench_envelope_decode,
    bench_message_id
);
criterion_main!(benches);
