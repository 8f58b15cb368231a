//! The owned simulation state and the operations a driver loop calls on it.
//!
//! # Example
//!
//! ```
//! use rs_starfield::simulation::SimulationWorld;
//! use rs_starfield::utils::SimulationConfig;
//!
//! let config = SimulationConfig::new(Some(16), Some(256), Some(3), Some(500), None);
//! let mut world = SimulationWorld::new(config).expect("Failed to build world");
//! world.create().expect("Failed to place stars");
//! assert_eq!(world.total_count(), 500);
//!
//! let report = world.step(1.0 / 120.0).expect("Step failed");
//! assert_eq!(report.stars + report.escaped + report.rejected, 500);
//! ```
use std::f32::consts::TAU;
use std::mem;
use std::sync::{mpsc, Arc};
use std::time::Instant;

use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::aggregation::{Aggregate, Pyramid};
use crate::contributions::ContributionTable;
use crate::grid::{Cell, CellBounds, Grid, StarId, StarRecord, StarRef};
use crate::simulation::migration::{migrate, MigrationReport};
use crate::simulation::step::{apply_update, integrate_column, ColumnUpdate, StepFrame};
use crate::threading::{Priority, ThreadPool};
use crate::utils::{Executor, HaltonDisc, PhysicsParams, SimError, SimulationConfig};

/// Summary of one [`SimulationWorld::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Stars in the grid after the step.
    pub stars: usize,
    pub migrated: usize,
    pub escaped: usize,
    pub rejected: usize,
}

impl StepReport {
    fn new(stars: usize, migration: MigrationReport) -> Self {
        Self {
            stars,
            migrated: migration.migrated,
            escaped: migration.escaped,
            rejected: migration.rejected,
        }
    }
}

/// Grid, pyramid, contribution lists and the optional worker pool of one
/// independent star field.
///
/// Mutating operations take `&mut self`, so none can overlap a step in flight.
pub struct SimulationWorld {
    config: SimulationConfig,
    grid: Grid,
    pyramid: Arc<Pyramid>,
    contributions: Arc<ContributionTable>,
    pool: Option<ThreadPool>,
    selected: Option<StarId>,
    black_hole: bool,
    rng: StdRng,
}

impl SimulationWorld {
    /// Validates `config`, partitions the grid and precomputes every cell's
    /// contribution list. Starts a worker pool for [`Executor::ThreadPool`].
    ///
    /// The grid starts empty; call [`SimulationWorld::create`] to populate it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for an unusable configuration,
    /// [`SimError::ContributionOverflow`] if the grid needs longer contribution
    /// lists than `max_contributions`, and [`SimError::ThreadSpawn`] if the pool
    /// cannot start.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let grid = Grid::new(config.grid_res, config.cell_capacity);
        let pyramid = Pyramid::new(&grid, config.levels);
        let contributions =
            ContributionTable::build(config.grid_res, config.levels, config.max_contributions)?;
        let pool = match config.executor {
            Executor::ThreadPool { threads } => Some(ThreadPool::new(threads)?),
            Executor::Inline | Executor::Rayon => None,
        };
        info!(
            "Star field ready: {}x{} cells, {} levels, executor {:?}",
            config.grid_res, config.grid_res, config.levels, config.executor
        );
        Ok(Self {
            grid,
            pyramid: Arc::new(pyramid),
            contributions: Arc::new(contributions),
            pool,
            selected: None,
            black_hole: config.black_hole_enabled,
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    /// Replaces all stars with `initial_stars` stars at rest, spread evenly over a
    /// disc around the origin, and rebuilds the pyramid. Returns the number placed.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::CellFull`] if the distribution overfills a cell. The
    /// world is left empty in that case.
    pub fn create(&mut self) -> Result<usize, SimError> {
        self.grid.clear();
        self.selected = None;
        let scale = self.config.grid_res as f32 / 2.4;
        let mut placed = 0;
        for (x, y) in HaltonDisc::new().take(self.config.initial_stars) {
            match self.grid.add_star(x * scale, y * scale, 0.0, 0.0, None) {
                Ok(Some(_)) => placed += 1,
                Ok(None) => {}
                Err(e) => {
                    self.grid.clear();
                    self.refresh_derived();
                    return Err(e);
                }
            }
        }
        self.refresh_derived();
        info!(
            "Created {} stars in {} cells, max cell load {}/{}",
            placed,
            self.grid.cells().len(),
            self.grid.max_load(),
            self.grid.capacity()
        );
        Ok(placed)
    }

    /// Adds one star. Returns `Ok(None)` when the position lies outside the domain.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::CellFull`] when the covering cell is at capacity.
    pub fn add_star(&mut self, px: f32, py: f32, vx: f32, vy: f32) -> Result<Option<StarRef>, SimError> {
        self.grid.add_star(px, py, vx, vy, None)
    }

    /// Injects `count` stars uniformly over a disc of `radius` around
    /// `(center_x, center_y)`, all moving with `(vel_x, vel_y)`.
    ///
    /// With `with_rotation`, each star also gets the circular orbital speed
    /// `sqrt(G·M / r)` around the disc center, where `M` is the mass of the whole
    /// system after the spawn (including the black hole when enabled).
    ///
    /// Stars that land outside the domain or in a full cell are skipped. Returns
    /// the number placed.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        count: usize,
        center_x: f32,
        center_y: f32,
        vel_x: f32,
        vel_y: f32,
        radius: f32,
        with_rotation: bool,
    ) -> usize {
        let physics = self.physics();
        let mut mass = (self.grid.total_count() + count) as f32;
        if let Some(hole) = physics.black_hole {
            mass += hole.mass;
        }

        let mut placed = 0;
        let mut full = 0;
        for _ in 0..count {
            let r = radius * self.rng.random::<f32>().sqrt();
            let angle = TAU * self.rng.random::<f32>();
            let (sin, cos) = angle.sin_cos();
            let (mut vx, mut vy) = (vel_x, vel_y);
            if with_rotation {
                let speed = (physics.gravity * mass / r.max(0.5)).sqrt();
                vx -= sin * speed;
                vy += cos * speed;
            }
            match self.grid.add_star(center_x + r * cos, center_y + r * sin, vx, vy, None) {
                Ok(Some(_)) => placed += 1,
                Ok(None) => {}
                Err(_) => full += 1,
            }
        }
        if full > 0 {
            warn!("Spawn skipped {} stars that landed in full cells", full);
        }
        debug!("Spawned {} of {} stars around {},{}", placed, count, center_x, center_y);
        placed
    }

    /// Removes every star.
    pub fn clear(&mut self) {
        debug!("Clearing {} stars", self.grid.total_count());
        self.grid.clear();
        self.selected = None;
    }

    /// Removes the stars of one cell and returns how many were removed.
    pub fn clear_cell(&mut self, cx: usize, cy: usize) -> usize {
        self.grid.clear_cell(cx, cy)
    }

    /// Selects the star nearest to `(x, y)` within the cell under that point.
    /// Returns false, and keeps no selection, if that cell is empty.
    pub fn select(&mut self, x: f32, y: f32) -> bool {
        self.selected = self
            .grid
            .nearest_star(x, y)
            .and_then(|at| self.grid.star(at))
            .map(|star| star.id);
        debug!("Selected {:?} near {},{}", self.selected, x, y);
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<StarId> {
        self.selected
    }

    /// Current state of the selected star, found by identity.
    pub fn tracked_star(&self) -> Option<StarRecord> {
        let at = self.grid.find(self.selected?)?;
        self.grid.star(at)
    }

    pub fn total_count(&self) -> usize {
        self.grid.total_count()
    }

    /// Flips the central black hole on or off and returns the new state.
    pub fn toggle_black_hole(&mut self) -> bool {
        self.black_hole = !self.black_hole;
        info!("Black hole {}", if self.black_hole { "on" } else { "off" });
        self.black_hole
    }

    pub fn set_black_hole(&mut self, enabled: bool) {
        self.black_hole = enabled;
    }

    pub fn black_hole_enabled(&self) -> bool {
        self.black_hole
    }

    pub fn physics(&self) -> PhysicsParams {
        SimulationConfig { black_hole_enabled: self.black_hole, ..self.config }.physics()
    }

    /// Advances every star by `dt` seconds.
    ///
    /// Rebuilds the pyramid from the current positions, integrates all columns on
    /// the configured executor, installs the results and migrates stars that left
    /// their cells.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::StepIncomplete`] if a column task failed (the grid keeps
    /// its pre-step state), or [`SimError::MigrationOverflow`] if more than
    /// `max_transits` stars changed cell (positions are already advanced and the
    /// crossing stars stay flagged in their old cells).
    pub fn step(&mut self, dt: f32) -> Result<StepReport, SimError> {
        let started = Instant::now();
        self.refresh_derived();

        let res = self.grid.res();
        let frame = Arc::new(StepFrame {
            grid: mem::take(&mut self.grid),
            pyramid: Arc::clone(&self.pyramid),
            contributions: Arc::clone(&self.contributions),
            physics: self.physics(),
        });

        let updates = match (&self.pool, self.config.executor) {
            (Some(pool), _) => run_on_pool(pool, &frame, dt),
            (None, Executor::Rayon) => Ok((0..res)
                .into_par_iter()
                .map(|cx| integrate_column(&frame, cx, dt))
                .collect()),
            (None, _) => Ok((0..res).map(|cx| integrate_column(&frame, cx, dt)).collect()),
        };

        self.grid = Arc::unwrap_or_clone(frame).grid;
        let updates = updates?;
        if updates.len() != res {
            return Err(SimError::StepIncomplete { missing: res - updates.len() });
        }
        for update in updates {
            apply_update(&mut self.grid, update);
        }

        let migration = migrate(&mut self.grid, self.config.max_transits)?;
        let report = StepReport::new(self.grid.total_count(), migration);
        trace!("Step {:?} took {:?}", report, started.elapsed());
        Ok(report)
    }

    /// Static bounds of every cell, column-major.
    pub fn cell_bounds(&self) -> impl Iterator<Item = CellBounds> + '_ {
        self.grid.cells().iter().map(|cell: &Cell| cell.bounds)
    }

    /// Positions of all stars.
    pub fn star_positions(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.grid.positions()
    }

    /// Aggregates of a pyramid level (1-based), as of the last rebuild. Empty
    /// for level 0 or a level above the top.
    pub fn aggregates(&self, level: usize) -> &[Aggregate] {
        if level == 0 || level > self.pyramid.num_levels() {
            return &[];
        }
        self.pyramid.level(level)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    pub fn contributions(&self) -> &ContributionTable {
        &self.contributions
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Stops the worker pool, if any, after its queued work is done.
    pub fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.shutdown();
        }
    }

    fn refresh_derived(&mut self) {
        self.grid.update_centers_of_mass();
        Arc::make_mut(&mut self.pyramid).rebuild(&self.grid);
    }
}

/// Submits one task per column, heavier columns first, and collects their
/// results once the pool is idle again.
fn run_on_pool(pool: &ThreadPool, frame: &Arc<StepFrame>, dt: f32) -> Result<Vec<ColumnUpdate>, SimError> {
    let res = frame.grid.res();
    let mean = frame.grid.total_count() as f32 / res.max(1) as f32;
    let (tx, rx) = mpsc::channel();

    let mut submitted = Ok(());
    for cx in 0..res {
        let load: usize = frame.grid.column(cx).iter().map(Cell::len).sum();
        let priority = if load as f32 > mean { Priority::High } else { Priority::Medium };
        let frame = Arc::clone(frame);
        let tx = tx.clone();
        let job = move || {
            let _ = tx.send(integrate_column(&frame, cx, dt));
        };
        if let Err(err) = pool.submit(job, priority) {
            submitted = Err(err);
            break;
        }
    }
    drop(tx);
    pool.wait_all();
    submitted?;

    let mut updates: Vec<ColumnUpdate> = rx.try_iter().collect();
    updates.sort_by_key(|u| u.cx);
    Ok(updates)
}
