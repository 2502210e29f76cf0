//! Simulation loop and the builder that runs it in a window.
//!
//! One call to [`ParticleSimulation::step`] is one presented frame: snapshot,
//! integrate every particle, apply the boundary policy, publish. `dt` is a
//! free parameter; nothing here looks at the wall clock.

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::boundary::{Bounds, SeedVolume};
use crate::error::SimulationError;
use crate::integrator::{single_step, Integrator, Rk4};
use crate::params::{Config, Parameters, Strategy};
use crate::particles::{DoubleBuffer, Particle, ParticleSet};
use crate::window::App;
use winit::event_loop::{ControlFlow, EventLoop};

/// Immutable per-frame snapshot handed to the integrators.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    pub params: Parameters,
    /// Pointer in world units (xy plane).
    pub mouse: Vec2,
    pub bounds: Bounds,
    /// Frame counter, used to decorrelate re-seed positions between frames.
    pub frame: u64,
}

impl FrameInput {
    /// Pointer influence radius in world units.
    #[inline]
    pub fn mouse_radius(&self) -> f32 {
        self.bounds.mouse_radius(&self.params)
    }
}

/// A CPU-side particle simulation.
///
/// `reset` and `step` both take `&mut self`, so a reset can never overlap an
/// integration pass.
pub trait ParticleSimulation: Send {
    /// Reallocate to `count` particles drawn from `seed`.
    fn reset(&mut self, count: usize, seed: &SeedVolume);

    /// Advance every particle once. Returns how many were re-seeded.
    fn step(&mut self, frame: &FrameInput) -> usize;

    /// The set to render: the one the last step wrote.
    fn particles(&self) -> &ParticleSet;

    fn len(&self) -> usize {
        self.particles().len()
    }

    fn is_empty(&self) -> bool {
        self.particles().is_empty()
    }
}

pub(crate) fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// RK4 with the pull-and-swirl pointer field, updated in place.
///
/// Integration is a rayon map (particles share no state); the boundary pass
/// that follows is sequential because it draws from one seeded RNG.
pub struct Rk4Simulation {
    particles: ParticleSet,
    rng: ChaCha8Rng,
}

impl Rk4Simulation {
    pub fn new(count: usize, seed_volume: &SeedVolume, seed: Option<u64>) -> Self {
        let mut rng = make_rng(seed);
        let particles = ParticleSet::seeded(count, seed_volume, &mut rng);
        Self { particles, rng }
    }
}

impl ParticleSimulation for Rk4Simulation {
    fn reset(&mut self, count: usize, seed: &SeedVolume) {
        self.particles.reset(count, seed, &mut self.rng);
    }

    fn step(&mut self, frame: &FrameInput) -> usize {
        let (positions, velocities) = self.particles.arrays_mut();
        positions
            .par_chunks_exact_mut(3)
            .zip(velocities.par_chunks_exact_mut(3))
            .for_each(|(pos, vel)| {
                let mut p = Particle {
                    position: glam::Vec3::from_slice(pos),
                    velocity: glam::Vec3::from_slice(vel),
                };
                Rk4.advance(&mut p, frame);
                p.position.write_to_slice(pos);
                p.velocity.write_to_slice(vel);
            });

        let mut reseeded = 0;
        for i in 0..self.particles.len() {
            let mut p = self.particles.get(i);
            if frame.bounds.enforce(&mut p, &mut self.rng) {
                self.particles.set(i, p);
                reseeded += 1;
            }
        }
        reseeded
    }

    fn particles(&self) -> &ParticleSet {
        &self.particles
    }
}

/// The single-step kernel on the CPU, ping-ponging two particle sets.
///
/// Each pass reads only `current` and writes only `next`, then swaps. Escaped
/// particles are re-seeded inside the kernel from a per-particle hash, exactly
/// as the compute shader does it.
pub struct PingPongSimulation {
    buffers: DoubleBuffer<ParticleSet>,
    rng: ChaCha8Rng,
}

impl PingPongSimulation {
    pub fn new(count: usize, seed_volume: &SeedVolume, seed: Option<u64>) -> Self {
        let mut rng = make_rng(seed);
        let initial = ParticleSet::seeded(count, seed_volume, &mut rng);
        Self {
            buffers: DoubleBuffer::new(initial.clone(), initial),
            rng,
        }
    }

    pub fn buffers(&self) -> &DoubleBuffer<ParticleSet> {
        &self.buffers
    }
}

impl ParticleSimulation for PingPongSimulation {
    fn reset(&mut self, count: usize, seed: &SeedVolume) {
        let initial = ParticleSet::seeded(count, seed, &mut self.rng);
        self.buffers.replace(initial.clone(), initial);
    }

    fn step(&mut self, frame: &FrameInput) -> usize {
        let frame_index = frame.frame as u32;
        let (current, next) = self.buffers.split();
        let (positions, velocities) = next.arrays_mut();

        let reseeded = positions
            .par_chunks_exact_mut(3)
            .zip(velocities.par_chunks_exact_mut(3))
            .enumerate()
            .map(|(i, (pos, vel))| {
                let mut p = single_step(current.get(i), frame);
                let escaped = frame.bounds.enforce_hashed(&mut p, i as u32, frame_index);
                p.position.write_to_slice(pos);
                p.velocity.write_to_slice(vel);
                escaped
            })
            .filter(|&escaped| escaped)
            .count();

        self.buffers.swap();
        reseeded
    }

    fn particles(&self) -> &ParticleSet {
        self.buffers.current()
    }
}

/// CPU simulation for `strategy`, or `None` when it runs on the GPU.
pub fn cpu_simulation(
    strategy: Strategy,
    count: usize,
    bounds: &Bounds,
    seed: Option<u64>,
) -> Option<Box<dyn ParticleSimulation>> {
    let volume = bounds.seed_volume();
    match strategy {
        Strategy::Rk4 => Some(Box::new(Rk4Simulation::new(count, &volume, seed))),
        Strategy::SingleStep => Some(Box::new(PingPongSimulation::new(count, &volume, seed))),
        Strategy::Gpu => None,
    }
}

/// Builder for the interactive visualization.
///
/// ```ignore
/// Simulation::new()
///     .with_strategy(Strategy::Gpu)
///     .with_parameters(Parameters { particle_count: 200_000, ..Default::default() })
///     .run()?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Simulation {
    config: Config,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the initial live parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.config.parameters = parameters;
        self
    }

    /// Choose the integration strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the bounding cube and seed volumes.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.config.bounds = bounds;
        self
    }

    /// Fix the RNG seed for reproducible initial state.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the window and run until it is closed.
    pub fn run(self) -> Result<(), SimulationError> {
        log::info!(
            "starting {} simulation with {} particles",
            self.config.strategy,
            self.config.parameters.particle_count
        );

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.config);
        event_loop.run_app(&mut app)?;
        app.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn input(params: Parameters, frame: u64) -> FrameInput {
        FrameInput {
            params,
            mouse: Vec2::ZERO,
            bounds: Bounds::default(),
            frame,
        }
    }

    fn all_in_bounds(set: &ParticleSet, bounds: &Bounds) -> bool {
        set.iter().all(|p| !bounds.escaped(p.position))
    }

    #[test]
    fn test_rk4_never_leaves_bounds_under_extreme_step() {
        let params = Parameters {
            dt: 0.2,
            rho: 180.0,
            damping: 1.2,
            ..Parameters::default()
        };
        let bounds = Bounds::default();
        let mut sim = Rk4Simulation::new(500, &bounds.seed, Some(1));

        let mut total = 0;
        for frame in 0..50 {
            total += sim.step(&input(params, frame));
            assert!(all_in_bounds(sim.particles(), &bounds));
        }
        assert!(total > 0);
    }

    #[test]
    fn test_ping_pong_never_leaves_bounds_under_extreme_step() {
        let params = Parameters {
            dt: 0.1,
            sigma: 40.0,
            ..Parameters::default()
        };
        let bounds = Bounds::default();
        let mut sim = PingPongSimulation::new(500, &bounds.seed, Some(1));

        for frame in 0..50 {
            sim.step(&input(params, frame));
            assert!(all_in_bounds(sim.particles(), &bounds));
        }
    }

    #[test]
    fn test_nan_parameters_are_contained_by_reseed() {
        let params = Parameters {
            rho: f32::NAN,
            ..Parameters::default()
        };
        let bounds = Bounds::default();
        let mut sim = Rk4Simulation::new(64, &bounds.seed, Some(5));
        let reseeded = sim.step(&input(params, 0));

        assert_eq!(reseeded, 64);
        assert!(sim.particles().iter().all(|p| p.velocity == Vec3::ZERO));
        assert!(all_in_bounds(sim.particles(), &bounds));
    }

    #[test]
    fn test_reset_replaces_particle_count() {
        let bounds = Bounds::default();
        for mut sim in [
            cpu_simulation(Strategy::Rk4, 300, &bounds, Some(2)).unwrap(),
            cpu_simulation(Strategy::SingleStep, 300, &bounds, Some(2)).unwrap(),
        ] {
            assert_eq!(sim.len(), 300);
            sim.step(&input(Parameters::default(), 0));

            sim.reset(41, &bounds.seed);
            assert_eq!(sim.particles().positions().len(), 41 * 3);
            assert_eq!(sim.particles().velocities().len(), 41 * 3);

            sim.step(&input(Parameters::default(), 1));
            assert_eq!(sim.len(), 41);
        }
        assert!(cpu_simulation(Strategy::Gpu, 10, &bounds, None).is_none());
    }

    #[test]
    fn test_ping_pong_publishes_written_buffer() {
        let bounds = Bounds::default();
        let mut sim = PingPongSimulation::new(128, &bounds.seed, Some(9));
        let frame = input(Parameters::default(), 3);

        let before = sim.particles().clone();
        let expected: ParticleSet = before
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut q = single_step(p, &frame);
                bounds.enforce_hashed(&mut q, i as u32, 3);
                q
            })
            .collect();

        let slot_before = sim.buffers().current_slot();
        sim.step(&frame);
        assert_ne!(sim.buffers().current_slot(), slot_before);
        assert_eq!(sim.particles(), &expected);
        assert_eq!(sim.buffers().next(), &before);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let bounds = Bounds::default();
        let mut a = Rk4Simulation::new(200, &bounds.seed, Some(42));
        let mut b = Rk4Simulation::new(200, &bounds.seed, Some(42));
        for frame in 0..20 {
            a.step(&input(Parameters::default(), frame));
            b.step(&input(Parameters::default(), frame));
        }
        assert_eq!(a.particles(), b.particles());
    }

    #[test]
    fn test_builder_collects_config() {
        let sim = Simulation::new()
            .with_strategy(Strategy::SingleStep)
            .with_seed(11)
            .with_parameters(Parameters {
                particle_count: 9,
                ..Parameters::default()
            });
        assert_eq!(sim.config().strategy, Strategy::SingleStep);
        assert_eq!(sim.config().seed, Some(11));
        assert_eq!(sim.config().parameters.particle_count, 9);
    }
}
