//! The vector field particles follow.
//!
//! [`lorenz`] is the classical attractor and is never altered. The pointer
//! adds a planar perturbation on top of it: [`pointer_perturbation`] (pull and
//! swirl, evaluated at every RK4 stage) or the cheaper [`pointer_pull`] used by
//! the single-evaluation kernel.
//!
//! All pointer terms ignore `z` and never produce a `z` component.

use glam::{Vec2, Vec3};

use crate::params::Parameters;

/// Lorenz vector field at `p`.
///
/// ```text
/// dx = σ(y − x)
/// dy = x(ρ − z) − y
/// dz = xy − βz
/// ```
#[inline]
pub fn lorenz(p: Vec3, params: &Parameters) -> Vec3 {
    Vec3::new(
        params.sigma * (p.y - p.x),
        p.x * (params.rho - p.z) - p.y,
        p.x * p.y - params.beta * p.z,
    )
}

/// Attraction toward and rotation around the pointer.
///
/// Both magnitudes fall off as `force / (d + 1)`; the `+ 1` keeps the field
/// finite at the pointer itself. Zero outside `radius` (world units).
#[inline]
pub fn pointer_perturbation(p: Vec3, params: &Parameters, mouse: Vec2, radius: f32) -> Vec3 {
    let dx = p.x - mouse.x;
    let dy = p.y - mouse.y;
    let d = (dx * dx + dy * dy).sqrt();

    if d < radius {
        let (sin, cos) = dy.atan2(dx).sin_cos();
        let attraction = params.mouse_force / (d + 1.0);
        let vortex = params.vortex_force / (d + 1.0);

        Vec3::new(
            -cos * attraction + sin * vortex,
            -sin * attraction - cos * vortex,
            0.0,
        )
    } else {
        Vec3::ZERO
    }
}

/// Full derivative for the RK4 integrator: attractor plus pointer terms.
#[inline]
pub fn derivative(p: Vec3, params: &Parameters, mouse: Vec2, radius: f32) -> Vec3 {
    lorenz(p, params) + pointer_perturbation(p, params, mouse, radius)
}

/// Uniform-magnitude pull toward the pointer, no swirl.
///
/// Used by the single-step kernel, which evaluates the field once per frame.
/// Zero outside `radius` and exactly on the pointer.
#[inline]
pub fn pointer_pull(p: Vec3, params: &Parameters, mouse: Vec2, radius: f32) -> Vec3 {
    let to_mouse = mouse - p.truncate();
    let d = to_mouse.length();

    if d < radius && d > 0.0 {
        (to_mouse / d * params.mouse_force).extend(0.0)
    } else {
        Vec3::ZERO
    }
}
