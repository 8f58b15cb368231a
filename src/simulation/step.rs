//! One integration pass over the grid, split into independent column jobs.
//!
//! A [`StepFrame`] is the read-only input of the parallel phase: last step's star
//! positions, the freshly rebuilt pyramid and the contribution table. Column jobs
//! never write into it. Each job returns a [`ColumnUpdate`] holding the column's
//! tentative positions, new velocities and crossing flags, which are copied into
//! the live grid once every job has finished.
use std::sync::Arc;

use crate::aggregation::Pyramid;
use crate::contributions::ContributionTable;
use crate::forces::{accumulate, gather_sources, SourceBatch};
use crate::grid::{CrossingFlags, Grid};
use crate::utils::PhysicsParams;

#[derive(Debug, Clone)]
pub struct StepFrame {
    pub grid: Grid,
    pub pyramid: Arc<Pyramid>,
    pub contributions: Arc<ContributionTable>,
    pub physics: PhysicsParams,
}

/// Integrated state of the stars of one cell, in the cell's star order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellUpdate {
    pub qx: Vec<f32>,
    pub qy: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub crossing: Vec<CrossingFlags>,
}

impl CellUpdate {
    fn with_capacity(n: usize) -> Self {
        Self {
            qx: Vec::with_capacity(n),
            qy: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
            crossing: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.qx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qx.is_empty()
    }
}

/// Results for the cells `(cx, 0..res)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnUpdate {
    pub cx: usize,
    pub cells: Vec<CellUpdate>,
}

/// Advances every star of cell `(cx, cy)` by `dt`: `v += a·dt`, `q = p + v·dt`.
/// Stars whose `q` leaves the cell bounds are flagged for migration.
pub fn integrate_cell(frame: &StepFrame, cx: usize, cy: usize, dt: f32, batch: &mut SourceBatch) -> CellUpdate {
    let cell = frame.grid.cell(cx, cy);
    let n = cell.len();
    let mut update = CellUpdate::with_capacity(n);
    if n == 0 {
        return update;
    }

    gather_sources(
        &frame.grid,
        &frame.pyramid,
        frame.contributions.get(cx, cy),
        &frame.physics,
        batch,
    );

    for i in 0..n {
        let (px, py) = (cell.px[i], cell.py[i]);
        let (ax, ay) = accumulate(px, py, batch, &frame.physics);
        let vx = cell.vx[i] + ax * dt;
        let vy = cell.vy[i] + ay * dt;
        let qx = px + vx * dt;
        let qy = py + vy * dt;
        update.qx.push(qx);
        update.qy.push(qy);
        update.vx.push(vx);
        update.vy.push(vy);
        update.crossing.push(cell.bounds.crossing_of(qx, qy));
    }
    update
}

/// Runs [`integrate_cell`] over one grid column, reusing one source buffer.
pub fn integrate_column(frame: &StepFrame, cx: usize, dt: f32) -> ColumnUpdate {
    let mut batch = SourceBatch::default();
    let cells = (0..frame.grid.res())
        .map(|cy| integrate_cell(frame, cx, cy, dt, &mut batch))
        .collect();
    ColumnUpdate { cx, cells }
}

/// Copies a column's results into the live grid.
pub fn apply_update(grid: &mut Grid, update: ColumnUpdate) {
    let cx = update.cx;
    for (cy, result) in update.cells.into_iter().enumerate() {
        let cell = grid.cell_mut(cx, cy);
        debug_assert_eq!(cell.len(), result.len(), "cell {},{} changed during the step", cx, cy);
        cell.px.copy_from_slice(&result.qx);
        cell.py.copy_from_slice(&result.qy);
        cell.vx.copy_from_slice(&result.vx);
        cell.vy.copy_from_slice(&result.vy);
        for (status, crossing) in cell.status.iter_mut().zip(result.crossing) {
            status.crossing = crossing;
        }
    }
}
