//! End-to-end checks of the CPU simulations through the public API.

use lorenz_flow::field::{derivative, pointer_perturbation};
use lorenz_flow::{
    cpu_simulation, Bounds, DoubleBuffer, FrameInput, Integrator, Parameters, Particle,
    ParticleSet, ParticleSimulation, PingPongSimulation, Rk4, Rk4Simulation, Strategy, Vec2, Vec3,
};

fn frame(params: Parameters, mouse: Vec2, index: u64) -> FrameInput {
    FrameInput {
        params,
        mouse,
        bounds: Bounds::default(),
        frame: index,
    }
}

fn assert_in_bounds(set: &ParticleSet, half_extent: f32) {
    for (i, p) in set.iter().enumerate() {
        assert!(
            p.position.abs().max_element() <= half_extent,
            "particle {} escaped: {:?}",
            i,
            p.position
        );
    }
}

#[test]
fn test_every_strategy_stays_in_bounds() {
    // Large rho and a strong pointer push particles out every frame.
    let params = Parameters {
        rho: 250.0,
        dt: 0.02,
        mouse_force: 500.0,
        vortex_force: 500.0,
        mouse_radius: 1.0,
        damping: 1.05,
        ..Parameters::default()
    };
    let bounds = Bounds::default();

    for strategy in [Strategy::Rk4, Strategy::SingleStep] {
        let mut sim = cpu_simulation(strategy, 2_000, &bounds, Some(3)).expect("cpu strategy");
        for i in 0..200 {
            sim.step(&frame(params, Vec2::new(20.0, -10.0), i));
            assert_in_bounds(sim.particles(), bounds.half_extent);
        }
    }
    assert!(cpu_simulation(Strategy::Gpu, 10, &bounds, None).is_none());
}

#[test]
fn test_small_cube_seeds_inside_bounds() {
    let bounds = Bounds {
        half_extent: 20.0,
        ..Bounds::default()
    };
    for strategy in [Strategy::Rk4, Strategy::SingleStep] {
        let mut sim = cpu_simulation(strategy, 5_000, &bounds, Some(8)).expect("cpu strategy");
        assert_in_bounds(sim.particles(), bounds.half_extent);

        sim.reset(5_000, &bounds.seed_volume());
        assert_in_bounds(sim.particles(), bounds.half_extent);
    }
}

#[test]
fn test_canonical_orbit_stays_bounded() {
    let params = Parameters {
        dt: 0.01,
        damping: 1.0,
        mouse_force: 0.0,
        vortex_force: 0.0,
        ..Parameters::default()
    };
    let input = frame(params, Vec2::ZERO, 0);
    let mut p = Particle {
        position: Vec3::ONE,
        velocity: Vec3::ZERO,
    };
    for _ in 0..10_000 {
        Rk4.advance(&mut p, &input);
        assert!(p.position.is_finite());
        assert!(p.position.abs().max_element() < 100.0);
    }
}

#[test]
fn test_reset_allocates_exact_length() {
    let bounds = Bounds::default();
    let mut rk4 = Rk4Simulation::new(10, &bounds.seed, Some(1));
    let mut ping_pong = PingPongSimulation::new(10, &bounds.seed, Some(1));

    for n in [0, 1, 777, 5_000] {
        rk4.reset(n, &bounds.seed);
        ping_pong.reset(n, &bounds.seed);
        for sim in [&rk4 as &dyn ParticleSimulation, &ping_pong] {
            assert_eq!(sim.len(), n);
            assert_eq!(sim.particles().positions().len(), 3 * n);
            assert_eq!(sim.particles().velocities().len(), 3 * n);
        }
    }
}

#[test]
fn test_swap_publishes_written_buffer() {
    let mut buffers = DoubleBuffer::new(vec![1, 2, 3], vec![0, 0, 0]);
    {
        let (current, next) = buffers.split();
        for (dst, src) in next.iter_mut().zip(current) {
            *dst = src * 10;
        }
    }
    buffers.swap();
    assert_eq!(buffers.current(), &vec![10, 20, 30]);

    let bounds = Bounds::default();
    let mut sim = PingPongSimulation::new(256, &bounds.seed, Some(9));
    let before = sim.particles().clone();
    sim.step(&frame(Parameters::default(), Vec2::ZERO, 0));
    assert_eq!(sim.particles(), sim.buffers().current());
    assert_eq!(sim.buffers().next(), &before);
}

#[test]
fn test_attraction_points_at_pointer_without_vortex() {
    let params = Parameters {
        vortex_force: 0.0,
        ..Parameters::default()
    };
    let mouse = Vec2::new(5.0, 2.0);
    let position = Vec3::new(1.0, -1.0, 30.0);
    let force = pointer_perturbation(position, &params, mouse, 15.0);

    let expected = (mouse - position.truncate()).normalize();
    let direction = force.truncate().normalize();
    assert!((direction - expected).length() < 1e-5);
    assert_eq!(force.z, 0.0);
}

#[test]
fn test_origin_is_fixed_point() {
    let d = derivative(Vec3::ZERO, &Parameters::default(), Vec2::splat(1e6), 15.0);
    assert_eq!(d, Vec3::ZERO);
}

#[test]
fn test_seeded_runs_match() {
    let bounds = Bounds::default();
    let params = Parameters {
        rho: 120.0,
        ..Parameters::default()
    };
    let run = || {
        let mut sim = Rk4Simulation::new(500, &bounds.seed, Some(42));
        for i in 0..50 {
            sim.step(&frame(params, Vec2::new(-5.0, 5.0), i));
        }
        sim.particles().clone()
    };
    assert_eq!(run(), run());
}
