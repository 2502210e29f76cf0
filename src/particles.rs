//! Particle storage.
//!
//! Positions and velocities live in two parallel flat `f32` arrays
//! (`[x0, y0, z0, x1, ...]`). The position array is uploaded to the GPU as a
//! vertex buffer without any repacking.

use glam::Vec3;
use rand::Rng;

use crate::boundary::SeedVolume;

/// One particle's state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Fixed-size set of particles stored as two parallel arrays.
///
/// `positions.len() == velocities.len() == 3 * len()` always holds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleSet {
    positions: Vec<f32>,
    velocities: Vec<f32>,
}

impl ParticleSet {
    /// `count` particles at rest at the origin.
    pub fn zeroed(count: usize) -> Self {
        Self {
            positions: vec![0.0; count * 3],
            velocities: vec![0.0; count * 3],
        }
    }

    /// `count` particles drawn from `volume`.
    pub fn seeded<R: Rng + ?Sized>(count: usize, volume: &SeedVolume, rng: &mut R) -> Self {
        let mut set = Self {
            positions: Vec::with_capacity(count * 3),
            velocities: Vec::with_capacity(count * 3),
        };
        for _ in 0..count {
            let p = volume.sample(rng);
            set.positions.extend_from_slice(&p.position.to_array());
            set.velocities.extend_from_slice(&p.velocity.to_array());
        }
        set
    }

    /// Replace every particle with `count` freshly seeded ones.
    ///
    /// Both arrays are reallocated; nothing from the previous count survives.
    pub fn reset<R: Rng + ?Sized>(&mut self, count: usize, volume: &SeedVolume, rng: &mut R) {
        *self = Self::seeded(count, volume, rng);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Particle {
        let i = index * 3;
        Particle {
            position: Vec3::from_slice(&self.positions[i..i + 3]),
            velocity: Vec3::from_slice(&self.velocities[i..i + 3]),
        }
    }

    #[inline]
    pub fn set(&mut self, index: usize, particle: Particle) {
        let i = index * 3;
        particle.position.write_to_slice(&mut self.positions[i..i + 3]);
        particle.velocity.write_to_slice(&mut self.velocities[i..i + 3]);
    }

    /// Flat `[x, y, z, ...]` positions, ready for upload.
    #[inline]
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    #[inline]
    pub fn velocities(&self) -> &[f32] {
        &self.velocities
    }

    /// Mutable views of both arrays, for per-particle parallel iteration.
    #[inline]
    pub fn arrays_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.positions, &mut self.velocities)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Particle> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

impl FromIterator<Particle> for ParticleSet {
    fn from_iter<I: IntoIterator<Item = Particle>>(iter: I) -> Self {
        let mut set = ParticleSet::default();
        for p in iter {
            set.positions.extend_from_slice(&p.position.to_array());
            set.velocities.extend_from_slice(&p.velocity.to_array());
        }
        set
    }
}

/// Which of the two slots is current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }

    #[inline]
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Two slots and a parity flag.
///
/// An integration pass reads [`current`](Self::current) and writes
/// [`next`](Self::next); [`swap`](Self::swap) then flips the flag so the slot
/// just written becomes current. Nothing is copied.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    a: T,
    b: T,
    current: Slot,
}

impl<T> DoubleBuffer<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            current: Slot::A,
        }
    }

    #[inline]
    pub fn current_slot(&self) -> Slot {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &T {
        self.slot(self.current)
    }

    #[inline]
    pub fn next(&self) -> &T {
        self.slot(self.current.other())
    }

    #[inline]
    pub fn slot(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    /// Read-only current and writable next, borrowed together.
    #[inline]
    pub fn split(&mut self) -> (&T, &mut T) {
        match self.current {
            Slot::A => (&self.a, &mut self.b),
            Slot::B => (&self.b, &mut self.a),
        }
    }

    /// Exchange the roles of the two slots.
    #[inline]
    pub fn swap(&mut self) {
        self.current = self.current.other();
    }

    /// Replace both slots, e.g. after a resize. Slot A becomes current.
    ///
    /// The old slots are dropped before this returns.
    pub fn replace(&mut self, a: T, b: T) {
        self.a = a;
        self.b = b;
        self.current = Slot::A;
    }

    /// Both slots, for reallocation or teardown.
    pub fn slots_mut(&mut self) -> [&mut T; 2] {
        [&mut self.a, &mut self.b]
    }
}
