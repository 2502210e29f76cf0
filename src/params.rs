//! Live simulation parameters and the on-disk configuration.
//!
//! [`Parameters`] is the flat record the parameter panel edits and the core
//! polls once per frame. It is `Copy`: every frame works on its own snapshot
//! and never holds on to the caller's value.
//!
//! ```ignore
//! let params = Parameters { rho: 99.96, ..Parameters::default() };
//! println!("{}", params.to_json()?);
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::boundary::Bounds;
use crate::error::ConfigError;

/// Attractor coefficients, step size, interaction and render scalars.
///
/// None of these are validated. A negative `dt` or a `damping` above one is
/// allowed and simply produces an unstable picture.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parameters {
    pub sigma: f32,
    pub rho: f32,
    pub beta: f32,
    /// Integration step. Not derived from wall-clock time.
    pub dt: f32,
    pub particle_count: u32,
    /// Rendered point diameter in pixels.
    pub particle_size: f32,
    pub particle_brightness: f32,
    pub mouse_force: f32,
    /// Tangential force around the pointer. Ignored by the single-step kernel.
    pub vortex_force: f32,
    /// Influence radius as a fraction of the bounding half-extent.
    pub mouse_radius: f32,
    /// Velocity multiplier applied every step.
    pub damping: f32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
            dt: 0.005,
            particle_count: 20_000,
            particle_size: 2.0,
            particle_brightness: 0.6,
            mouse_force: 40.0,
            vortex_force: 25.0,
            mouse_radius: 0.3,
            damping: 0.99,
        }
    }
}

impl Parameters {
    /// Serialize the snapshot as a flat, pretty-printed JSON record.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record produced by [`Parameters::to_json`].
    ///
    /// Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Particle count as a `usize` for buffer sizing.
    #[inline]
    pub fn count(&self) -> usize {
        self.particle_count as usize
    }
}

/// How particles are advanced each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Four field evaluations per particle on the CPU, with the vortex term.
    #[default]
    Rk4,
    /// One field evaluation per particle on the CPU, ping-ponging two sets.
    SingleStep,
    /// The single-step kernel as a WGSL compute shader over GPU buffers.
    Gpu,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Rk4, Strategy::SingleStep, Strategy::Gpu];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Rk4 => "rk4",
            Strategy::SingleStep => "single-step",
            Strategy::Gpu => "gpu",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// Everything the binary reads at startup.
///
/// The parameter fields are flattened, so an exported [`Parameters`] record
/// is a valid config file on its own.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub parameters: Parameters,
    pub strategy: Strategy,
    pub bounds: Bounds,
    /// Fixed RNG seed. `None` seeds from the system clock.
    pub seed: Option<u64>,
}

impl Config {
    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
