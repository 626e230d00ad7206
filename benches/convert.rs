use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use encoding_processor::{Converter, ConverterConfig, Detector, DetectorConfig, Encoding};
use std::hint::black_box;

const MIB: usize = 1024 * 1024;

fn sample_text(bytes: usize) -> String {
    let line = "The quick brown fox 敏捷的棕色狐狸 跳过了 懒狗 Grüße\n";
    line.repeat(bytes / line.len() + 1)
}

/// Chunked conversion across chunk sizes for a fixed 8 MiB payload
fn bench_chunk_sizes(c: &mut Criterion) {
    let text = sample_text(8 * MIB);
    let gb18030 = encoding_rs::GB18030.encode(&text).0.into_owned();
    let mut group = c.benchmark_group("convert_chunked");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(gb18030.len() as u64));

    for chunk in [64 * 1024, MIB, 4 * MIB, 16 * MIB] {
        let converter = Converter::new(ConverterConfig::default().with_chunk_size(chunk));
        group.bench_with_input(BenchmarkId::new("gb18030_to_utf8", chunk), &gb18030, |b, data| {
            b.iter(|| {
                converter
                    .convert(black_box(data), Encoding::GB18030, Encoding::UTF8)
                    .expect("conversion should succeed")
            });
        });
    }
    group.finish();
}

/// Single-pass conversion for common encoding pairs
fn bench_pairs(c: &mut Criterion) {
    let text = sample_text(MIB);
    let converter = Converter::default();
    let mut group = c.benchmark_group("convert_pairs");
    group.throughput(Throughput::Bytes(text.len() as u64));

    for target in [Encoding::UTF16LE, Encoding::GBK, Encoding::UTF32BE] {
        group.bench_function(format!("utf8_to_{}", target.name()), |b| {
            b.iter(|| {
                converter
                    .convert(black_box(text.as_bytes()), Encoding::UTF8, target)
                    .expect("conversion should succeed")
            });
        });
    }
    group.finish();
}

/// Uncached detection of a legacy-encoded sample
fn bench_detect(c: &mut Criterion) {
    let text = sample_text(16 * 1024);
    let gbk = encoding_rs::GBK.encode(&text).0.into_owned();
    let detector = Detector::new(DetectorConfig::default().without_cache())
        .expect("default config is valid");

    c.bench_function("detect_gbk_8k_sample", |b| {
        b.iter(|| detector.detect(black_box(&gbk)));
    });
}

criterion_group!(benches, bench_chunk_sizes, bench_pairs, bench_detect);
criterion_main!(benches);
