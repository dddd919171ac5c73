// Performance benchmarks for meta parameter fan-out
//
// Run with: cargo bench --bench fanout_bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam::channel;
use fxrack_core::domain::{
    ControlRegistry, Effect, EffectKnobParameterManifest, EffectManifest, EffectSlot, LinkType,
    RackConfig, SoftTakeover,
};
use std::hint::black_box;
use std::sync::Arc;

fn linked_effect(knobs: usize) -> Arc<Effect> {
    let mut manifest = EffectManifest::new("bench.effect", "1.0", "Bench");
    for i in 0..knobs {
        manifest = manifest.with_knob(
            EffectKnobParameterManifest::new(&format!("k{i}"), &format!("Knob {i}"), 0.0, 1.0, 0.5)
                .with_link(LinkType::Linked, i % 2 == 1),
        );
    }
    Effect::shared(Arc::new(manifest))
}

fn bench_meta_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("meta_fanout");

    for knobs in [1usize, 4, 16] {
        let registry = ControlRegistry::new();
        let (tx, _rx) = channel::unbounded();
        let mut slot = EffectSlot::new(0, 0, &RackConfig::default(), &registry, tx);
        slot.load_effect(Some(linked_effect(knobs)));

        group.bench_with_input(BenchmarkId::from_parameter(knobs), &knobs, |b, _| {
            let mut value = 0.0;
            b.iter(|| {
                value = if value >= 1.0 { 0.0 } else { value + 0.01 };
                slot.set_meta_parameter(black_box(value), true);
            });
        });
    }

    group.finish();
}

fn bench_engine_reads(c: &mut Criterion) {
    let registry = ControlRegistry::new();
    let (tx, _rx) = channel::unbounded();
    let mut slot = EffectSlot::new(0, 0, &RackConfig::default(), &registry, tx);
    slot.load_effect(Some(linked_effect(16)));
    let engine = slot.engine_slot();

    c.bench_function("engine_read_16_knobs", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for index in 0..16 {
                sum += engine.knob_value(black_box(index)).unwrap_or(0.0);
            }
            black_box(sum);
        });
    });
}

fn bench_soft_takeover(c: &mut Criterion) {
    let mut takeover = SoftTakeover::default();

    c.bench_function("soft_takeover_ignore", |b| {
        let mut value = 0.0;
        b.iter(|| {
            value = if value >= 1.0 { 0.0 } else { value + 0.005 };
            black_box(takeover.ignore(black_box(value)));
        });
    });
}

criterion_group!(benches, bench_meta_fanout, bench_engine_reads, bench_soft_takeover);
criterion_main!(benches);
