use bevy::prelude::*;
use control_core::{
    build_headless_app, resolver::resolve_domains, run_tick_at, ControlClaim, ControlClaims,
    ControlDomains, ControlLink, SelfGovernance,
};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn synthetic_links(count: usize) -> Vec<ControlLink> {
    (0..count)
        .map(|index| {
            let claim = ControlClaim::new(
                Entity::from_raw(index as u32 + 1),
                ControlDomains::from_raw(1 << (index % 8)),
            )
            .with_pressure(1.0 + (index % 13) as f32)
            .with_legitimacy((index % 5) as f32 * 0.2)
            .with_hostility((index % 3) as f32 * 0.4)
            .with_consent((index % 7) as f32 * 0.1);
            ControlLink::from_claim(&claim)
        })
        .collect()
}

fn bench_resolve_domains(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_domains");
    let governance = SelfGovernance::default();

    for count in [4usize, 16, 64, 256, 1024] {
        let links = synthetic_links(count);
        group.bench_with_input(BenchmarkId::new("links", count), &links, |b, links| {
            let mut out = Vec::new();
            b.iter(|| {
                resolve_domains(&governance, black_box(links), &mut out);
                black_box(out.len())
            })
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for bodies in [16usize, 128, 512] {
        group.bench_with_input(BenchmarkId::new("bodies", bodies), &bodies, |b, &bodies| {
            b.iter_batched(
                || {
                    let mut app = build_headless_app();
                    let controllers: Vec<Entity> =
                        (0..4).map(|_| app.world.spawn_empty().id()).collect();
                    for body in 0..bodies {
                        let claims = controllers
                            .iter()
                            .enumerate()
                            .map(|(slot, &controller)| {
                                ControlClaim::new(controller, ControlDomains::from_raw(0b111))
                                    .with_pressure(((body + slot) % 9) as f32)
                                    .with_legitimacy(0.5)
                            })
                            .collect();
                        app.world.spawn(ControlClaims(claims));
                    }
                    app
                },
                |mut app| {
                    run_tick_at(&mut app, 1);
                    run_tick_at(&mut app, 2);
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(resolver_benches, bench_resolve_domains, bench_pipeline);
criterion_main!(resolver_benches);
