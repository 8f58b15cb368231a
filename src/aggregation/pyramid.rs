//! Multilevel summary of the grid used as the far-field mass model.
//!
//! Level 1 holds one aggregate per cell. Each level above halves the resolution:
//! an aggregate at level `L` summarizes the 2×2 block of level `L-1` aggregates
//! beneath it, so it covers a `2^(L-1)`-cell square. Aggregate `(x, y)` of a level
//! with resolution `res` is stored at index `x * res + y`, matching the grid's
//! column-major cell order.
use crate::grid::{CellBounds, Grid};

/// Count and center of mass of a square block of cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub count: u32,
    pub cx: f32,
    pub cy: f32,
    /// Static x range covered by the block.
    pub rngx: [f32; 2],
    /// Static y range covered by the block.
    pub rngy: [f32; 2],
}

impl Aggregate {
    fn empty(bounds: CellBounds) -> Self {
        let (cx, cy) = bounds.center();
        Self { count: 0, cx, cy, rngx: bounds.x, rngy: bounds.y }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone)]
pub struct Pyramid {
    grid_res: usize,
    /// `levels[l - 1]` holds level `l`.
    levels: Vec<Vec<Aggregate>>,
    max_counts: Vec<u32>,
}

impl Pyramid {
    /// Allocates `num_levels` levels over `grid` and fills in every block's
    /// static range. Counts start at zero until the first [`Pyramid::rebuild`].
    pub fn new(grid: &Grid, num_levels: usize) -> Self {
        let grid_res = grid.res();
        let mut levels = Vec::with_capacity(num_levels);
        for level in 1..=num_levels {
            let res = grid_res >> (level - 1);
            let size = 1usize << (level - 1);
            let mut aggregates = Vec::with_capacity(res * res);
            for x in 0..res {
                for y in 0..res {
                    let lo = grid.cell(x * size, y * size).bounds;
                    let hi = grid.cell(x * size + size - 1, y * size + size - 1).bounds;
                    aggregates.push(Aggregate::empty(CellBounds {
                        x: [lo.x[0], hi.x[1]],
                        y: [lo.y[0], hi.y[1]],
                    }));
                }
            }
            levels.push(aggregates);
        }
        Self { grid_res, levels, max_counts: vec![0; num_levels] }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Aggregates per side at `level` (1-based).
    pub fn resolution(&self, level: usize) -> usize {
        self.grid_res >> (level - 1)
    }

    /// Width in cells of one aggregate at `level`.
    pub fn block_size(level: usize) -> usize {
        1 << (level - 1)
    }

    /// All aggregates of `level` (1-based), column-major.
    pub fn level(&self, level: usize) -> &[Aggregate] {
        &self.levels[level - 1]
    }

    pub fn get(&self, level: usize, x: usize, y: usize) -> &Aggregate {
        &self.levels[level - 1][x * self.resolution(level) + y]
    }

    /// Highest aggregate count seen at each level during the last rebuild.
    pub fn max_counts(&self) -> &[u32] {
        &self.max_counts
    }

    /// Rebuilds every level bottom-up from the current star positions.
    pub fn rebuild(&mut self, grid: &Grid) {
        self.aggregate_cells(grid);
        for level in 2..=self.num_levels() {
            self.max_counts[level - 1] = self.aggregate_level(level);
        }
    }

    /// Writes level 1: one aggregate per cell with the mean star position, or the
    /// cell's midpoint when it holds no stars.
    pub fn aggregate_cells(&mut self, grid: &Grid) {
        let mut highest = 0;
        for (aggregate, cell) in self.levels[0].iter_mut().zip(grid.cells()) {
            let (cx, cy) = cell.mean_position();
            aggregate.count = cell.len() as u32;
            aggregate.cx = cx;
            aggregate.cy = cy;
            highest = highest.max(aggregate.count);
        }
        if let Some(max) = self.max_counts.first_mut() {
            *max = highest;
        }
    }

    /// Combines each 2×2 block of `level - 1` into one aggregate of `level`,
    /// weighting child centers by their counts. Returns the highest count written.
    pub fn aggregate_level(&mut self, level: usize) -> u32 {
        assert!(level >= 2 && level <= self.num_levels(), "level {} out of range", level);
        let res = self.resolution(level);
        let child_res = res * 2;
        let (below, above) = self.levels.split_at_mut(level - 1);
        let children = &below[level - 2];
        let parents = &mut above[0];

        let mut highest = 0;
        for x in 0..res {
            for y in 0..res {
                let quad = [
                    &children[(2 * x) * child_res + 2 * y],
                    &children[(2 * x) * child_res + 2 * y + 1],
                    &children[(2 * x + 1) * child_res + 2 * y],
                    &children[(2 * x + 1) * child_res + 2 * y + 1],
                ];
                let count: u32 = quad.iter().map(|c| c.count).sum();
                let mut sx = 0.0;
                let mut sy = 0.0;
                for child in quad {
                    sx += child.count as f32 * child.cx;
                    sy += child.count as f32 * child.cy;
                }
                let parent = &mut parents[x * res + y];
                parent.count = count;
                if count > 0 {
                    let scl = 1.0 / count as f32;
                    parent.cx = sx * scl;
                    parent.cy = sy * scl;
                } else {
                    parent.cx = (parent.rngx[0] + parent.rngx[1]) / 2.0;
                    parent.cy = (parent.rngy[0] + parent.rngy[1]) / 2.0;
                }
                highest = highest.max(count);
            }
        }
        highest
    }
}
