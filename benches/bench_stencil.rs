#![allow(
    clippy::tests_outside_test_module,
    clippy::unwrap_used,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use stencil::Engine;


const INVOICE: &str = include_str!("invoice.tmpl");

fn stencil_benchmark(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.set_trim_blocks(true);
    engine.add_template("header", orders::HEADER).unwrap();
    engine.add_template("invoice", INVOICE).unwrap();

    let orders = orders::generate_orders(100);

    let mut group = c.benchmark_group("Invoice");
    group.sample_size(50);

    group.bench_function("stencil_render", |b| {
        b.iter(|| {
            for order in &orders {
                black_box(engine.render_named("invoice", order).unwrap());
            }
        });
    });

    group.bench_function("stencil_parse", |b| {
        b.iter(|| black_box(engine.parse(INVOICE).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, stencil_benchmark);
criterion_main!(benches);
