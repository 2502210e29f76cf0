//! # lorenz-flow
//!
//! Interactive Lorenz attractor particle field. Tens of thousands of
//! particles are advanced through the Lorenz system every frame, pushed
//! around by the pointer, and drawn as additive point sprites.
//!
//! ## Quick Start
//!
//! ```ignore
//! use lorenz_flow::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     Simulation::new()
//!         .with_strategy(Strategy::Gpu)
//!         .with_parameters(Parameters {
//!             particle_count: 200_000,
//!             ..Parameters::default()
//!         })
//!         .run()
//! }
//! ```
//!
//! ## Strategies
//!
//! | Strategy | Integrator | Pointer field | Where |
//! |----------|------------|---------------|-------|
//! | [`Strategy::Rk4`] | classical RK4, in place | attraction + vortex | CPU (rayon) |
//! | [`Strategy::SingleStep`] | one evaluation, ping-pong | uniform pull | CPU (rayon) |
//! | [`Strategy::Gpu`] | one evaluation, ping-pong | uniform pull | WGSL compute |
//!
//! Every strategy applies the same boundary policy: a particle that leaves
//! the cube `[-half_extent, half_extent]^3` (or goes non-finite) is re-seeded
//! near the origin with zero velocity. See [`Bounds`].
//!
//! ## Headless use
//!
//! The CPU simulations do not need a window:
//!
//! ```ignore
//! let bounds = Bounds::default();
//! let mut sim = Rk4Simulation::new(10_000, &bounds.seed, Some(7));
//! let frame = FrameInput {
//!     params: Parameters::default(),
//!     mouse: Vec2::ZERO,
//!     bounds,
//!     frame: 0,
//! };
//! sim.step(&frame);
//! ```

pub mod boundary;
pub mod error;
pub mod field;
pub mod gpu;
pub mod integrator;
pub mod interaction;
pub mod params;
pub mod particles;
mod simulation;
pub mod time;
mod window;

pub use boundary::{Bounds, SeedVolume};
pub use error::{ConfigError, GpuError, SimulationError};
pub use glam::{Vec2, Vec3};
pub use integrator::{Integrator, Rk4, SingleStep};
pub use interaction::{Command, InteractionState, Pointer};
pub use params::{Config, Parameters, Strategy};
pub use particles::{DoubleBuffer, Particle, ParticleSet, Slot};
pub use simulation::{
    cpu_simulation, FrameInput, ParticleSimulation, PingPongSimulation, Rk4Simulation, Simulation,
};
pub use window::EXPORT_PATH;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::boundary::{Bounds, SeedVolume};
    pub use crate::error::SimulationError;
    pub use crate::params::{Config, Parameters, Strategy};
    pub use crate::simulation::{FrameInput, ParticleSimulation, Simulation};
    pub use crate::{Vec2, Vec3};
}
