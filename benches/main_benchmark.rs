use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ctxfloat::{self as cf, Context, Float, RoundingMode};

fn high_precision(bits: usize) -> Context {
    Context::new()
        .with_precision(bits)
        .unwrap()
        .with_rounding(RoundingMode::NearestTiesToEven)
}

fn bench_div(c: &mut Criterion) {
    let ctx = high_precision(2000);
    let a = Float::from_u64(1);
    let b = Float::from_u64(7);
    c.bench_function("div_2000_bits", |bench| {
        bench.iter(|| black_box(cf::div_with(&a, &b, &ctx).unwrap()))
    });
}

fn bench_sqrt(c: &mut Criterion) {
    let ctx = high_precision(2000);
    let two = Float::from_u64(2);
    c.bench_function("sqrt_2000_bits", |bench| {
        bench.iter(|| black_box(cf::sqrt_with(&two, &ctx).unwrap()))
    });
}

fn bench_powi(c: &mut Criterion) {
    let ctx = high_precision(500);
    let x = Float::from_f64(1.0000001);
    c.bench_function("powi_500_bits", |bench| {
        bench.iter(|| black_box(cf::powi_with(&x, 100_000, &ctx).unwrap()))
    });
}

fn bench_parse(c: &mut Criterion) {
    let ctx = high_precision(2000);
    c.bench_function("parse_2000_bits", |bench| {
        bench.iter(|| {
            black_box(
                cf::parse_with("3.14159265358979323846264338327950288", &ctx)
                    .unwrap(),
            )
        })
    });
}

fn bench_scoped_add(c: &mut Criterion) {
    let a = Float::from_f64(0.1);
    let b = Float::from_f64(0.2);
    c.bench_function("scoped_add_fp128", |bench| {
        bench.iter(|| {
            let _scope = cf::with_context(&ctxfloat::FP128);
            black_box(cf::add(&a, &b).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_div,
    bench_sqrt,
    bench_powi,
    bench_parse,
    bench_scoped_add
);
criterion_main!(benches);
