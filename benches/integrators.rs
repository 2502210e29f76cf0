//! Benchmarks for the CPU integration strategies.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lorenz_flow::{
    Bounds, FrameInput, Integrator, Parameters, Particle, ParticleSimulation, PingPongSimulation,
    Rk4, Rk4Simulation, SingleStep, Vec2, Vec3,
};

fn frame(index: u64) -> FrameInput {
    FrameInput {
        params: Parameters::default(),
        mouse: Vec2::new(10.0, 5.0),
        bounds: Bounds::default(),
        frame: index,
    }
}

fn bench_single_particle(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    let input = frame(0);
    let start = Particle {
        position: Vec3::new(1.0, 1.0, 1.0),
        velocity: Vec3::ZERO,
    };

    group.bench_function("rk4", |b| {
        b.iter(|| {
            let mut p = start;
            Rk4.advance(&mut p, black_box(&input));
            black_box(p)
        })
    });

    group.bench_function("single_step", |b| {
        b.iter(|| {
            let mut p = start;
            SingleStep.advance(&mut p, black_box(&input));
            black_box(p)
        })
    });

    group.finish();
}

fn bench_simulation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    let bounds = Bounds::default();

    for count in [10_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::new("rk4", count), &count, |b, &count| {
            let mut sim = Rk4Simulation::new(count, &bounds.seed, Some(1));
            let mut index = 0;
            b.iter(|| {
                index += 1;
                black_box(sim.step(&frame(index)))
            })
        });

        group.bench_with_input(BenchmarkId::new("ping_pong", count), &count, |b, &count| {
            let mut sim = PingPongSimulation::new(count, &bounds.seed, Some(1));
            let mut index = 0;
            b.iter(|| {
                index += 1;
                black_box(sim.step(&frame(index)))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_particle, bench_simulation_step);
criterion_main!(benches);
