//! Benchmarks for index resolution, decoding and packing.
//!
//! Run with: cargo bench --package ncfile
//! Or: cargo bench --package ncfile --bench access_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ncfile::{
    nc_index, pack_anchored, pack_centered, AttributeValue, Attributes, IndexExpr, IndexResolver, IndexTerm,
    PackTarget, TypedArray, ValueCodec,
};
use test_utils::{create_temperature_field, with_gaps};

// =============================================================================
// INDEX RESOLUTION BENCHMARKS
// =============================================================================

fn bench_index_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_resolution");
    let resolver = IndexResolver::new("temp", &[24, 721, 1440]);

    group.bench_function("address", |b| b.iter(|| resolver.resolve(black_box(&IndexExpr::Address(123_456)))));

    let point = IndexExpr::point(&[3, -1, 700]);
    group.bench_function("point", |b| b.iter(|| resolver.resolve(black_box(&point))));

    let block = nc_index![0usize, 100usize..200, ..];
    group.bench_function("block_compact", |b| b.iter(|| resolver.resolve(black_box(&block))));

    let strided = IndexExpr::Terms(vec![
        IndexTerm::Full,
        IndexTerm::slice(0, 360, 2),
        IndexTerm::slice(0, 720, 2),
    ]);
    group.bench_function("block_strided", |b| b.iter(|| resolver.resolve(black_box(&strided))));

    let grid = IndexExpr::Terms(vec![
        IndexTerm::List(vec![0, 6, 12, 18]),
        IndexTerm::Full,
        IndexTerm::Index(0),
    ]);
    group.bench_function("grid", |b| b.iter(|| resolver.resolve(black_box(&grid))));

    group.finish();
}

// =============================================================================
// DECODING BENCHMARKS
// =============================================================================

fn packed_codec() -> ValueCodec {
    let mut attrs = Attributes::new();
    attrs.insert("scale_factor", AttributeValue::Double(vec![0.01]));
    attrs.insert("add_offset", AttributeValue::Double(vec![273.15]));
    attrs.insert("_FillValue", AttributeValue::Short(vec![-32767]));
    attrs.insert("missing_value", AttributeValue::Short(vec![-32766]));
    ValueCodec::from_attributes(&attrs)
}

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding");
    let codec = packed_codec();

    for size in [64usize, 256, 1024] {
        let shape = [size, size];
        let raw = TypedArray::from_f64(
            ncfile::PhysicalType::Short,
            &create_temperature_field(&shape).mapv(|v| (v - 273.15) * 10.0),
        )
        .unwrap();

        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("decode_short", size), &raw, |b, raw| {
            b.iter(|| codec.decode(black_box(raw)))
        });

        let decoded = codec.decode(&raw);
        group.bench_with_input(BenchmarkId::new("encode_short", size), &decoded, |b, decoded| {
            b.iter(|| codec.encode(black_box(decoded), ncfile::PhysicalType::Short))
        });
    }

    group.finish();
}

// =============================================================================
// PACKING BENCHMARKS
// =============================================================================

fn bench_packing(c: &mut Criterion) {
    let mut group = c.benchmark_group("packing");
    let values = with_gaps(&create_temperature_field(&[512, 512]), 97);
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("anchored_short", |b| {
        b.iter(|| pack_anchored(black_box(&values), PackTarget::Short))
    });
    group.bench_function("centered_short", |b| {
        b.iter(|| pack_centered(black_box(&values), PackTarget::Short))
    });
    group.bench_function("anchored_byte", |b| {
        b.iter(|| pack_anchored(black_box(&values), PackTarget::Byte))
    });

    group.finish();
}

criterion_group!(benches, bench_index_resolution, bench_decoding, bench_packing);
criterion_main!(benches);
