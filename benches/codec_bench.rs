use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use multimon_igate::codec::{decode, encode_line, Charset, Frame};
use multimon_igate::filter::{default_reject_paths, PathFilter};

const POSITION: &[u8] = b"DL1ABC-9>APRS,WIDE1-1,WIDE2-1:!4903.50N/07201.75W>Mobile via multimon-ng";

fn long_frame() -> Frame {
    Frame::new(
        "DL1ABC-9",
        "APRS",
        vec!["WIDE1-1".into(), "WIDE2-1".into()],
        "x".repeat(600),
    )
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(POSITION.len() as u64));

    group.bench_function("decode_position", |b| {
        b.iter(|| decode(black_box(POSITION), Charset::Latin1).unwrap());
    });

    let frame = decode(POSITION, Charset::Latin1).unwrap();
    group.bench_function("encode_position", |b| {
        b.iter(|| encode_line(black_box(&frame), Charset::Latin1));
    });

    let long = long_frame();
    group.bench_function("encode_truncated", |b| {
        b.iter(|| encode_line(black_box(&long), Charset::Latin1));
    });

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let filter = PathFilter::new("N0CALL-10", true, default_reject_paths(), true);
    let frame = decode(POSITION, Charset::Latin1).unwrap();

    c.bench_function("filter_apply", |b| {
        b.iter(|| {
            let mut frame = frame.clone();
            filter.apply(black_box(&mut frame))
        });
    });
}

criterion_group!(benches, bench_codec, bench_filter);
criterion_main!(benches);
