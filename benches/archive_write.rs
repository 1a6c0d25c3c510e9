use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gong_rs::{assign_offsets, Archive, Entry, FormatDescriptor, MemoryFs};
use rand::Rng;

fn random_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill(&mut data[..]);
    data
}

/// Fill a fresh in-memory filesystem with `count` sources of `size` bytes
fn sources(count: usize, size: usize) -> MemoryFs {
    let fs = MemoryFs::new();
    for i in 0..count {
        fs.write_file(format!("/src/{}.bin", i), random_payload(size));
    }
    fs
}

fn bench_write_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_batch");

    for size in [1024usize, 64 * 1024, 512 * 1024] {
        let count = 32;
        group.throughput(Throughput::Bytes((count * size) as u64));
        group.bench_with_input(BenchmarkId::new("assets_32", size), &size, |b, &size| {
            let fs = sources(count, size);
            b.iter(|| {
                fs.remove("/bench.gong");
                let mut archive = Archive::create_in(fs.clone(), "/bench.gong").unwrap();
                for i in 0..count {
                    archive.stage(format!("asset-{}", i), format!("/src/{}.bin", i)).unwrap();
                }
                archive.write().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_incremental_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_append");

    // Each write rewrites every packed payload, so cost grows with archive size
    for packed in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::new("packed", packed), &packed, |b, &packed| {
            let fs = sources(packed + 1, 4 * 1024);
            let mut archive = Archive::create_in(fs.clone(), "/bench.gong").unwrap();
            for i in 0..packed {
                archive.stage(format!("asset-{}", i), format!("/src/{}.bin", i)).unwrap();
            }
            archive.write().unwrap();
            drop(archive);
            let base = fs.read_file("/bench.gong").unwrap();

            b.iter(|| {
                fs.write_file("/bench.gong", base.clone());
                let mut archive = Archive::load_in(fs.clone(), "/bench.gong").unwrap();
                archive.stage("extra", format!("/src/{}.bin", packed)).unwrap();
                archive.write().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_offset_assignment(c: &mut Criterion) {
    let format = FormatDescriptor::v1();
    let mut entries: Vec<Entry> = (0..10_000)
        .map(|i| Entry::new(format!("asset-{}", i), format!("asset-{}.bin", i), 4096))
        .collect();

    c.bench_function("assign_offsets_10k", |b| {
        b.iter(|| assign_offsets(&format, entries.iter_mut()).unwrap());
    });
}

criterion_group!(
    benches,
    bench_write_batch,
    bench_incremental_append,
    bench_offset_assignment
);
criterion_main!(benches);
