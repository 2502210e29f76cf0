//! Per-particle time stepping.
//!
//! Both integrators write the new velocity, scale it by `damping`, then move
//! the particle by `velocity * dt`. The boundary policy runs afterwards and is
//! not part of either integrator.

use crate::field::{derivative, lorenz, pointer_pull};
use crate::particles::Particle;
use crate::simulation::FrameInput;

/// Advances one particle by one step.
///
/// Implementations must depend only on the particle and the frame snapshot so
/// they can be mapped over particles in parallel.
pub trait Integrator: Send + Sync {
    fn advance(&self, particle: &mut Particle, frame: &FrameInput);
}

/// Classical 4th-order Runge-Kutta over the full field (attractor, pull and
/// swirl). The pointer terms are re-evaluated at every stage position.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rk4;

impl Integrator for Rk4 {
    #[inline]
    fn advance(&self, particle: &mut Particle, frame: &FrameInput) {
        let params = &frame.params;
        let radius = frame.mouse_radius();
        let f = |s| derivative(s, params, frame.mouse, radius);

        let dt = params.dt;
        let s = particle.position;
        let k1 = f(s);
        let k2 = f(s + k1 * (dt * 0.5));
        let k3 = f(s + k2 * (dt * 0.5));
        let k4 = f(s + k3 * dt);

        let velocity = (k1 + 2.0 * k2 + 2.0 * k3 + k4) / 6.0 * params.damping;
        particle.velocity = velocity;
        particle.position = s + velocity * dt;
    }
}

/// One field evaluation per step, no stage weighting.
///
/// This is the CPU form of the compute kernel in `integrate.wgsl`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleStep;

impl Integrator for SingleStep {
    #[inline]
    fn advance(&self, particle: &mut Particle, frame: &FrameInput) {
        *particle = single_step(*particle, frame);
    }
}

/// Pure kernel: state in, state out.
#[inline]
pub fn single_step(particle: Particle, frame: &FrameInput) -> Particle {
    let params = &frame.params;
    let s = particle.position;
    let pull = pointer_pull(s, params, frame.mouse, frame.mouse_radius());
    let velocity = (lorenz(s, params) + pull) * params.damping;

    Particle {
        position: s + velocity * params.dt,
        velocity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Bounds;
    use crate::params::Parameters;
    use glam::{Vec2, Vec3};

    fn frame(params: Parameters) -> FrameInput {
        FrameInput {
            params,
            mouse: Vec2::new(1.0e6, 1.0e6),
            bounds: Bounds::default(),
            frame: 0,
        }
    }

    #[test]
    fn test_rk4_matches_exponential_decay() {
        // sigma = 1, rho = 0 keeps x = y = 0, leaving dz = -z.
        let input = frame(Parameters {
            sigma: 1.0,
            rho: 0.0,
            beta: 1.0,
            dt: 0.1,
            damping: 1.0,
            ..Parameters::default()
        });
        let mut p = Particle {
            position: Vec3::new(0.0, 0.0, 1.0),
            velocity: Vec3::ZERO,
        };
        for _ in 0..10 {
            Rk4.advance(&mut p, &input);
        }
        assert!((p.position.z - (-1.0f32).exp()).abs() < 1e-5);
        assert_eq!(p.position.x, 0.0);
    }

    #[test]
    fn test_rk4_canonical_orbit_stays_bounded() {
        let input = frame(Parameters {
            dt: 0.01,
            damping: 1.0,
            mouse_force: 0.0,
            vortex_force: 0.0,
            ..Parameters::default()
        });
        let mut p = Particle {
            position: Vec3::ONE,
            velocity: Vec3::ZERO,
        };
        for _ in 0..10_000 {
            Rk4.advance(&mut p, &input);
            assert!(p.position.is_finite());
            assert!(p.position.abs().max_element() < 60.0);
        }
        // The orbit settles onto the butterfly, not onto a fixed point.
        assert!(p.velocity.length() > 0.1);
    }

    #[test]
    fn test_damping_scales_velocity() {
        let p0 = Particle {
            position: Vec3::new(3.0, -2.0, 20.0),
            velocity: Vec3::ZERO,
        };
        let mut undamped = p0;
        let mut damped = p0;
        let with_damping = |damping| {
            frame(Parameters {
                damping,
                ..Parameters::default()
            })
        };
        Rk4.advance(&mut undamped, &with_damping(1.0));
        Rk4.advance(&mut damped, &with_damping(0.5));

        assert!((damped.velocity - undamped.velocity * 0.5).length() < 1e-3);
    }

    #[test]
    fn test_single_step_is_one_field_evaluation() {
        let params = Parameters {
            dt: 0.02,
            damping: 0.9,
            ..Parameters::default()
        };
        let input = frame(params);
        let p0 = Particle {
            position: Vec3::new(2.0, 5.0, 10.0),
            velocity: Vec3::new(100.0, 100.0, 100.0),
        };

        let p1 = single_step(p0, &input);
        let expected_v = lorenz(p0.position, &params) * 0.9;
        assert!((p1.velocity - expected_v).length() < 1e-4);
        assert!((p1.position - (p0.position + expected_v * 0.02)).length() < 1e-4);

        let mut via_trait = p0;
        SingleStep.advance(&mut via_trait, &input);
        assert_eq!(via_trait, p1);
    }

    #[test]
    fn test_single_step_pulls_toward_pointer() {
        let params = Parameters {
            sigma: 0.0,
            rho: 0.0,
            beta: 0.0,
            dt: 0.1,
            damping: 1.0,
            mouse_force: 5.0,
            ..Parameters::default()
        };
        let input = FrameInput {
            mouse: Vec2::new(10.0, 0.0),
            ..frame(params)
        };
        let p = single_step(
            Particle {
                position: Vec3::new(0.0, 0.0, 4.0),
                velocity: Vec3::ZERO,
            },
            &input,
        );
        assert!((p.velocity - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
        assert!((p.position - Vec3::new(0.5, 0.0, 4.0)).length() < 1e-5);
    }
}
