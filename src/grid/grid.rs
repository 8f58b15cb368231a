//! The fixed grid of cells tiling the square simulation domain.
//!
//! A grid of resolution `res` covers `[-res/2, res/2]` on both axes with unit
//! square cells. Cells are stored column-major: cell `(cx, cy)` lives at index
//! `cx * res + cy`, so one grid column is a contiguous slice.
use log::debug;

use crate::grid::cell::{Cell, CellBounds, StarId, StarRecord};
use crate::utils::SimError;

/// Tolerance used when checking that a star lies inside its cell.
pub const CONTAINMENT_EPS: f32 = 1e-5;

/// Location of one star: its cell and its index inside that cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarRef {
    pub cx: usize,
    pub cy: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Grid {
    res: usize,
    capacity: usize,
    cells: Vec<Cell>,
    next_id: u32,
}

/// Center coordinate of cell column (or row) `c` in a grid of resolution `res`.
#[inline]
pub fn cell_to_pos(c: usize, res: usize) -> f32 {
    c as f32 - (res as f32 - 1.0) / 2.0
}

/// Cell column (or row) covering coordinate `p`. May lie outside `0..res`.
#[inline]
pub fn pos_to_cell(p: f32, res: usize) -> i64 {
    (p + res as f32 / 2.0).floor() as i64
}

impl Grid {
    /// Partitions the domain into `res * res` empty cells with static bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_starfield::grid::Grid;
    ///
    /// let grid = Grid::new(4, 16);
    /// assert_eq!(grid.cell(0, 0).bounds.x, [-2.0, -1.0]);
    /// assert_eq!(grid.locate(0.0, 0.0), Some((2, 2)));
    /// assert_eq!(grid.locate(2.5, 0.0), None);
    /// ```
    pub fn new(res: usize, capacity: usize) -> Self {
        let mut cells = Vec::with_capacity(res * res);
        for cx in 0..res {
            for cy in 0..res {
                let (x, y) = (cell_to_pos(cx, res), cell_to_pos(cy, res));
                let bounds = CellBounds { x: [x - 0.5, x + 0.5], y: [y - 0.5, y + 0.5] };
                cells.push(Cell::new(bounds, capacity));
            }
        }
        let grid = Self { res, capacity, cells, next_id: 0 };
        if res > 0 {
            let center = grid.cell(res / 2, res / 2);
            debug!("center cell has x range {},{}", center.bounds.x[0], center.bounds.x[1]);
            debug!("px 0.0 falls in cx {}", pos_to_cell(0.0, res));
        }
        grid
    }

    pub fn res(&self) -> usize {
        self.res
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn index(&self, cx: usize, cy: usize) -> usize {
        cx * self.res + cy
    }

    pub fn cell(&self, cx: usize, cy: usize) -> &Cell {
        &self.cells[self.index(cx, cy)]
    }

    pub fn cell_mut(&mut self, cx: usize, cy: usize) -> &mut Cell {
        let i = self.index(cx, cy);
        &mut self.cells[i]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// The cells `(cx, 0..res)` of one grid column.
    pub fn column(&self, cx: usize) -> &[Cell] {
        &self.cells[cx * self.res..(cx + 1) * self.res]
    }

    /// Maps a position to the cell covering it, or `None` outside the domain.
    pub fn locate(&self, px: f32, py: f32) -> Option<(usize, usize)> {
        if !px.is_finite() || !py.is_finite() {
            return None;
        }
        let range = 0..self.res as i64;
        let (cx, cy) = (pos_to_cell(px, self.res), pos_to_cell(py, self.res));
        if range.contains(&cx) && range.contains(&cy) {
            Some((cx as usize, cy as usize))
        } else {
            None
        }
    }

    fn fresh_id(&mut self) -> StarId {
        let id = StarId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Places a star in the cell covering `(px, py)`.
    ///
    /// Returns `Ok(None)` when the position is outside the domain. A fresh identity
    /// is assigned when `id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::CellFull`] when the target cell is at capacity.
    pub fn add_star(
        &mut self,
        px: f32,
        py: f32,
        vx: f32,
        vy: f32,
        id: Option<StarId>,
    ) -> Result<Option<StarRef>, SimError> {
        let Some((cx, cy)) = self.locate(px, py) else {
            return Ok(None);
        };
        if self.cell(cx, cy).len() >= self.capacity {
            return Err(SimError::CellFull { cx, cy, capacity: self.capacity });
        }
        let id = id.unwrap_or_else(|| self.fresh_id());
        let index = self.cell_mut(cx, cy).push(px, py, vx, vy, id);
        Ok(Some(StarRef { cx, cy, index }))
    }

    /// Removes a star in O(1): the cell's last star takes its slot.
    pub fn remove_at(&mut self, cx: usize, cy: usize, index: usize) -> Result<StarRecord, SimError> {
        if cx >= self.res || cy >= self.res || index >= self.cell(cx, cy).len() {
            return Err(SimError::InvalidStar { cx, cy, index });
        }
        Ok(self.cell_mut(cx, cy).swap_remove(index))
    }

    pub fn star(&self, at: StarRef) -> Option<StarRecord> {
        if at.cx >= self.res || at.cy >= self.res {
            return None;
        }
        self.cell(at.cx, at.cy).star(at.index)
    }

    /// Removes every star. Identities keep counting up.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(Cell::clear);
    }

    /// Removes the stars of one cell and returns how many were removed.
    pub fn clear_cell(&mut self, cx: usize, cy: usize) -> usize {
        if cx >= self.res || cy >= self.res {
            return 0;
        }
        let cell = self.cell_mut(cx, cy);
        let removed = cell.len();
        cell.clear();
        removed
    }

    pub fn total_count(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }

    /// Highest star count of any cell.
    pub fn max_load(&self) -> usize {
        self.cells.iter().map(Cell::len).max().unwrap_or(0)
    }

    pub fn update_centers_of_mass(&mut self) {
        self.cells.iter_mut().for_each(Cell::update_center_of_mass);
    }

    /// The star nearest to `(x, y)` among the stars of the cell covering that point.
    pub fn nearest_star(&self, x: f32, y: f32) -> Option<StarRef> {
        let (cx, cy) = self.locate(x, y)?;
        let cell = self.cell(cx, cy);
        let mut best: Option<(usize, f32)> = None;
        for (i, (&px, &py)) in cell.px.iter().zip(&cell.py).enumerate() {
            let dsqr = (px - x) * (px - x) + (py - y) * (py - y);
            if best.map_or(true, |(_, d)| dsqr < d) {
                best = Some((i, dsqr));
            }
        }
        best.map(|(index, _)| StarRef { cx, cy, index })
    }

    /// Locates a star by identity.
    pub fn find(&self, id: StarId) -> Option<StarRef> {
        self.cells.iter().enumerate().find_map(|(i, cell)| {
            let index = cell.status.iter().position(|s| s.id == id)?;
            Some(StarRef { cx: i / self.res, cy: i % self.res, index })
        })
    }

    /// Checks that every star lies within its cell's bounds (±`eps`).
    /// Returns the first offending star.
    pub fn check_containment(&self, eps: f32) -> Result<(), StarRef> {
        for (i, cell) in self.cells.iter().enumerate() {
            for (index, (&px, &py)) in cell.px.iter().zip(&cell.py).enumerate() {
                if !cell.bounds.contains(px, py, eps) {
                    return Err(StarRef { cx: i / self.res, cy: i % self.res, index });
                }
            }
        }
        Ok(())
    }

    /// Iterates over all star positions, column by column.
    pub fn positions(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.cells
            .iter()
            .flat_map(|cell| cell.px.iter().copied().zip(cell.py.iter().copied()))
    }
}
