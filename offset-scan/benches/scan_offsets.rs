#![allow(clippy::arithmetic_side_effects)]

use {
    agave_offset_scan::{availability, OffsetScannerBuilder, ScanMode},
    criterion::{criterion_group, criterion_main, BenchmarkId, Criterion},
    rand::Rng,
    std::{fs::File, io::Write, os::unix::fs::FileExt},
};

const FILE_LEN: usize = 64 * 1024 * 1024;
const NUM_READS: usize = 100;

// Random reads of a large comma separated file, like a parser sampling records from a blob.
fn create_blob() -> tempfile::NamedTempFile {
    let mut rng = rand::rng();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut block = vec![0u8; 1024 * 1024];
    for _ in 0..FILE_LEN / block.len() {
        block
            .iter_mut()
            .for_each(|b| *b = if rng.random_ratio(1, 8) { b',' } else { b'x' });
        file.write_all(&block).unwrap();
    }
    file.flush().unwrap();
    file
}

fn random_offsets(chunk_size: usize) -> Vec<i64> {
    let mut rng = rand::rng();
    (0..NUM_READS)
        .map(|_| rng.random_range(0..(FILE_LEN - chunk_size) as i64))
        .collect()
}

fn pread_scan(file: &File, offsets: &[i64], buf: &mut [u8]) -> u64 {
    offsets
        .iter()
        .map(|&offset| {
            let read = file.read_at(buf, offset as u64).unwrap();
            buf[..read].iter().filter(|&&b| b == b',').count() as u64
        })
        .sum()
}

fn bench_random_reads(c: &mut Criterion) {
    if !availability::is_supported() {
        eprintln!("io_uring is not available, skipping benchmarks");
        return;
    }
    let blob = create_blob();
    let mut group = c.benchmark_group("random_reads");
    for chunk_size in [4096usize, 10240, 65536] {
        group.bench_function(BenchmarkId::new("pread", chunk_size), |b| {
            let file = File::open(blob.path()).unwrap();
            let mut buf = vec![0u8; chunk_size];
            b.iter(|| pread_scan(&file, &random_offsets(chunk_size), &mut buf))
        });

        for mode in [ScanMode::Baseline, ScanMode::Optimized] {
            let scanner = OffsetScannerBuilder::new().mode(mode).build();
            let mut buffer = vec![0u8; chunk_size * NUM_READS];
            let name = format!("{mode:?}").to_lowercase();
            let probe = scanner.scan_into(blob.path(), &[0], chunk_size as u32, &mut buffer);
            if let Err(err) = probe {
                eprintln!("{name} scans unavailable, skipping: {err}");
                continue;
            }
            group.bench_function(BenchmarkId::new(name, chunk_size), |b| {
                b.iter(|| {
                    scanner
                        .scan_into(
                            blob.path(),
                            &random_offsets(chunk_size),
                            chunk_size as u32,
                            &mut buffer,
                        )
                        .unwrap()
                        .aggregate
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_random_reads);
criterion_main!(benches);
