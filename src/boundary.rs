//! Bounding cube, seed volumes and the escape/re-seed policy.
//!
//! The Lorenz system is chaotic and a large `dt` or extreme coefficients send
//! particles off to infinity (or to NaN). Any particle found outside the cube
//! after a step is put back at a random point near the origin with zero
//! velocity, so nothing ever stays out of bounds across a step boundary.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::Parameters;
use crate::particles::Particle;

/// Box particles are spawned into on reset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedVolume {
    pub center: Vec3,
    pub half_extent: Vec3,
    /// Each velocity component is drawn from `[-max_speed, max_speed]`.
    pub max_speed: f32,
}

impl Default for SeedVolume {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 0.0, 25.0),
            half_extent: Vec3::new(25.0, 25.0, 12.5),
            max_speed: 0.25,
        }
    }
}

impl SeedVolume {
    /// Draw one particle uniformly from the volume.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        Particle {
            position: self.center + symmetric(rng) * self.half_extent,
            velocity: symmetric(rng) * self.max_speed,
        }
    }
}

/// Half-extent of the simulation cube plus the re-seed policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bounds {
    /// Cube from `-half_extent` to `+half_extent` on every axis.
    pub half_extent: f32,
    /// Escaped particles re-enter inside this (smaller) cube around the origin.
    pub reseed_extent: f32,
    /// Initial distribution used by `reset`.
    pub seed: SeedVolume,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            half_extent: 50.0,
            reseed_extent: 25.0,
            seed: SeedVolume::default(),
        }
    }
}

impl Bounds {
    /// Pointer influence radius in world units.
    #[inline]
    pub fn mouse_radius(&self, params: &Parameters) -> f32 {
        params.mouse_radius * self.half_extent
    }

    /// The seed volume cut down to the cube, so reset never spawns a
    /// particle that is already out of bounds.
    pub fn seed_volume(&self) -> SeedVolume {
        let limit = Vec3::splat(self.half_extent);
        let lo = (self.seed.center - self.seed.half_extent).clamp(-limit, limit);
        let hi = (self.seed.center + self.seed.half_extent).clamp(-limit, limit);
        SeedVolume {
            center: (lo + hi) * 0.5,
            half_extent: (hi - lo) * 0.5,
            ..self.seed
        }
    }

    /// Re-seed half-extent, never larger than the cube itself.
    #[inline]
    pub fn reseed_half_extent(&self) -> f32 {
        self.reseed_extent.min(self.half_extent)
    }

    /// True if any axis exceeds the half-extent. NaN counts as escaped.
    #[inline]
    pub fn escaped(&self, position: Vec3) -> bool {
        !position
            .abs()
            .cmple(Vec3::splat(self.half_extent))
            .all()
    }

    /// A fresh particle inside the re-seed cube, at rest.
    pub fn reseed<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        Particle {
            position: symmetric(rng) * self.reseed_half_extent(),
            velocity: Vec3::ZERO,
        }
    }

    /// Apply the policy to one particle. Returns whether it was re-seeded.
    #[inline]
    pub fn enforce<R: Rng + ?Sized>(&self, particle: &mut Particle, rng: &mut R) -> bool {
        if self.escaped(particle.position) {
            *particle = self.reseed(rng);
            true
        } else {
            false
        }
    }

    /// Same policy with the hash-based generator the compute kernel uses.
    ///
    /// Stateless, so it can run inside a data-parallel map.
    #[inline]
    pub fn enforce_hashed(&self, particle: &mut Particle, index: u32, frame: u32) -> bool {
        if self.escaped(particle.position) {
            let unit = hash_unit3(index, frame);
            *particle = Particle {
                position: (unit * 2.0 - Vec3::ONE) * self.reseed_half_extent(),
                velocity: Vec3::ZERO,
            };
            true
        } else {
            false
        }
    }
}

/// Vector with each component uniform in `[-1, 1)`.
fn symmetric<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - Vec3::ONE
}

/// PCG hash. Must stay identical to `pcg` in `integrate.wgsl`.
#[inline]
pub fn pcg(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Three values in `[0, 1)` derived from a particle index and frame number.
///
/// Must stay identical to `hash_unit3` in `integrate.wgsl`.
#[inline]
pub fn hash_unit3(index: u32, frame: u32) -> Vec3 {
    let h0 = pcg(index ^ pcg(frame));
    let h1 = pcg(h0);
    let h2 = pcg(h1);
    Vec3::new(to_unit(h0), to_unit(h1), to_unit(h2))
}

#[inline]
fn to_unit(h: u32) -> f32 {
    (h >> 8) as f32 / 16_777_216.0
}
