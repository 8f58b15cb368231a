// src/utils/config.rs
use crate::utils::errors::SimError;

/// Largest grid resolution. Contribution entries store cell coordinates in 14 bits.
pub const MAX_GRID_RES: usize = 1 << 14;

/// How gravitational acceleration falls off with distance.
///
/// Both laws are finite at zero distance and fall off with distance beyond
/// their near-field cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceLaw {
    /// `G·m / d²` per unit mass, clamped to `max_accel`, along the unit direction.
    /// Sources at exactly zero distance contribute nothing.
    ClampedInverseSquare { max_accel: f32 },
    /// `G·m·d⃗ / max(d, epsilon)³`.
    SoftenedInverseCube { epsilon: f32 },
}

impl Default for ForceLaw {
    fn default() -> Self {
        ForceLaw::ClampedInverseSquare { max_accel: 1.0 }
    }
}

/// Where the per-column force and integration work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// Columns run one after another on the calling thread.
    Inline,
    /// One task per column on a dedicated priority thread pool.
    ThreadPool { threads: usize },
    /// Columns are spread over the global rayon pool.
    Rayon,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::Inline
    }
}

/// The physics inputs every column task needs. Copied into each step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    pub gravity: f32,
    pub force_law: ForceLaw,
    pub black_hole: Option<BlackHole>,
}

/// A fixed, high-mass attractor at a given position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackHole {
    pub x: f32,
    pub y: f32,
    pub mass: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Cells per side of the square grid.
    pub grid_res: usize,
    /// Maximum number of stars a single cell holds.
    pub cell_capacity: usize,
    /// Number of aggregation levels above the star level.
    pub levels: usize,
    /// Stars placed by `create`.
    pub initial_stars: usize,
    /// Maximum number of sources in one cell's contribution list.
    pub max_contributions: usize,
    /// Maximum number of stars that may change cell in a single step.
    pub max_transits: usize,
    pub gravity: f32,
    pub force_law: ForceLaw,
    pub black_hole_mass: f32,
    pub black_hole_enabled: bool,
    pub executor: Executor,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_res: 64,
            cell_capacity: 1200,
            levels: 5,
            initial_stars: 15_000,
            max_contributions: 512,
            max_transits: 15_000 / 20,
            gravity: 0.0001,
            force_law: ForceLaw::default(),
            black_hole_mass: 2000.0,
            black_hole_enabled: false,
            executor: Executor::Inline,
            seed: 0x5EED,
        }
    }
}

impl SimulationConfig {
    pub fn new(
        grid_res: Option<usize>,
        cell_capacity: Option<usize>,
        levels: Option<usize>,
        initial_stars: Option<usize>,
        executor: Option<Executor>,
    ) -> Self {
        let default = Self::default();
        let initial_stars = initial_stars.unwrap_or(default.initial_stars);
        Self {
            grid_res: grid_res.unwrap_or(default.grid_res),
            cell_capacity: cell_capacity.unwrap_or(default.cell_capacity),
            levels: levels.unwrap_or(default.levels),
            initial_stars,
            max_transits: (initial_stars / 20).max(default.max_transits),
            executor: executor.unwrap_or(default.executor),
            ..default
        }
    }

    /// Returns the config with the executor replaced.
    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    /// Width, in cells, of one node at the top aggregation level.
    pub fn top_block_size(&self) -> usize {
        1 << self.levels.saturating_sub(1)
    }

    pub fn physics(&self) -> PhysicsParams {
        PhysicsParams {
            gravity: self.gravity,
            force_law: self.force_law,
            black_hole: self.black_hole_enabled.then_some(BlackHole {
                x: 0.0,
                y: 0.0,
                mass: self.black_hole_mass,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.levels == 0 || self.levels > 8 {
            return Err(SimError::InvalidConfig(format!(
                "levels must be in 1..=8, got {}",
                self.levels
            )));
        }
        if self.grid_res == 0 || self.grid_res % self.top_block_size() != 0 {
            return Err(SimError::InvalidConfig(format!(
                "grid_res {} must be a positive multiple of {}",
                self.grid_res,
                self.top_block_size()
            )));
        }
        if self.grid_res > MAX_GRID_RES {
            return Err(SimError::InvalidConfig(format!(
                "grid_res {} exceeds {}, the largest coordinate a contribution entry can encode",
                self.grid_res, MAX_GRID_RES
            )));
        }
        if self.cell_capacity == 0 || self.max_contributions == 0 || self.max_transits == 0 {
            return Err(SimError::InvalidConfig("capacities must be positive".to_string()));
        }
        if !self.gravity.is_finite() || self.gravity < 0.0 {
            return Err(SimError::InvalidConfig(format!("gravity {} is not usable", self.gravity)));
        }
        if !self.black_hole_mass.is_finite() || self.black_hole_mass < 0.0 {
            return Err(SimError::InvalidConfig("black hole mass must be non-negative".to_string()));
        }
        match self.force_law {
            ForceLaw::ClampedInverseSquare { max_accel } if !(max_accel > 0.0) => Err(
                SimError::InvalidConfig("max_accel must be positive".to_string()),
            ),
            ForceLaw::SoftenedInverseCube { epsilon } if !(epsilon > 0.0) => Err(
                SimError::InvalidConfig("epsilon must be positive".to_string()),
            ),
            _ => Ok(()),
        }
    }
}
