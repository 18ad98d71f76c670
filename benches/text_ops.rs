use std::ops::Range;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use fast_text::{ConversionOptions, Encoding, TextValue, Units, decode, encode_to_vec};

const LATIN: &str = "Le cœur a ses raisons que la raison ne connaît point. ";
const MIXED: &str = "naïve café, 東京 ☕, Ελληνικά and plain ASCII text. ";

fn sample(piece: &str, repeat: usize) -> String {
    piece.repeat(repeat)
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("text::append");
    for (label, piece) in [("narrow", "ascii only "), ("wide", "東京 ")] {
        group.throughput(Throughput::Bytes((piece.len() * 1000) as u64));
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut text = TextValue::new();
                for _ in 0..1000 {
                    text.append_str(piece).expect("append");
                }
                criterion::black_box(text);
            });
        });
    }
    group.finish();
}

fn bench_replace_ranges(c: &mut Criterion) {
    let base = TextValue::from(sample(LATIN, 64).as_str());
    let ranges: Vec<Range<usize>> = (0..base.len().saturating_sub(3))
        .step_by(97)
        .map(|start| start..start + 3)
        .collect();
    let mut group = c.benchmark_group("text::replace_ranges");

    for (label, insertion) in [("shrink", "x"), ("grow", "xxxxxxxx"), ("promote", "\u{2615}")] {
        let units: Vec<u16> = insertion.encode_utf16().collect();
        group.bench_function(label, |b| {
            b.iter_batched(
                || base.clone(),
                |mut text| {
                    text.replace_ranges(&ranges, Units::Wide(&units)).expect("replace");
                    criterion::black_box(text);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_conversion(c: &mut Criterion) {
    let options = ConversionOptions::new();
    let mut group = c.benchmark_group("text::conversion");

    for (label, input) in [("ascii", sample("plain ASCII text. ", 256)), ("mixed", sample(MIXED, 64))] {
        let bytes = input.into_bytes();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_function(format!("decode_utf8/{label}"), |b| {
            b.iter(|| criterion::black_box(decode(&bytes, Encoding::UTF8, &options).expect("decode")));
        });

        let text = decode(&bytes, Encoding::UTF8, &options).expect("decode");
        group.bench_function(format!("encode_utf16/{label}"), |b| {
            b.iter(|| criterion::black_box(encode_to_vec(&text, .., Encoding::UTF16LE, &options).expect("encode")));
        });
    }

    let latin = decode(sample(LATIN, 64).as_bytes(), Encoding::UTF8, &options).expect("decode");
    group.bench_function("encode_mac_roman", |b| {
        b.iter(|| criterion::black_box(encode_to_vec(&latin, .., Encoding::MAC_ROMAN, &options).expect("encode")));
    });
    group.finish();
}

criterion_group!(benches, bench_append, bench_replace_ranges, bench_conversion);
criterion_main!(benches);
