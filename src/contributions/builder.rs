//! Per-cell lists of force sources, fixed by the grid geometry.
//!
//! For a target cell, the pyramid is walked top-down. A node at level `L` whose
//! block lies at least `required_distance(L)` cells away from the target (on either
//! axis) is accepted as a single point mass. Otherwise it is split into its four
//! children one level down. Level-1 nodes that are still too close become
//! level-0 sources: the individual stars of that cell.
//!
//! The walk depends only on cell coordinates, never on star positions, so each
//! cell's list is built once and reused every step.
use log::info;

use crate::aggregation::Pyramid;
use crate::utils::SimError;

/// One entry of a contribution list: a `(level, x, y)` triple.
///
/// Level 0 names a single cell whose stars act individually; levels `1..` name
/// the aggregate at `(x, y)` of that pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Source {
    pub level: u8,
    pub x: u16,
    pub y: u16,
}

impl Source {
    pub fn stars(x: usize, y: usize) -> Self {
        Self { level: 0, x: x as u16, y: y as u16 }
    }

    pub fn aggregate(level: usize, x: usize, y: usize) -> Self {
        Self { level: level as u8, x: x as u16, y: y as u16 }
    }

    pub fn is_stars(&self) -> bool {
        self.level == 0
    }

    /// Packs the triple into one word: 4 bits of level, 14 bits each of x and y.
    pub fn encode(&self) -> u32 {
        ((self.level as u32) << 28) | ((self.x as u32 & 0x3fff) << 14) | (self.y as u32 & 0x3fff)
    }

    pub fn decode(word: u32) -> Self {
        Self {
            level: (word >> 28) as u8,
            x: ((word >> 14) & 0x3fff) as u16,
            y: (word & 0x3fff) as u16,
        }
    }

    /// Cells `[x0, x1) × [y0, y1)` covered by this source.
    pub fn cell_span(&self) -> ([usize; 2], [usize; 2]) {
        let size = if self.level == 0 { 1 } else { Pyramid::block_size(self.level as usize) };
        let (x, y) = (self.x as usize * size, self.y as usize * size);
        ([x, x + size], [y, y + size])
    }
}

/// Width in cells of a node at `level`. Level 0 and level 1 both span one cell.
pub fn cell_size(level: usize) -> usize {
    if level == 0 { 1 } else { 1 << (level - 1) }
}

/// Minimum distance, in cells, at which a node of `level` is used as a whole:
/// 0, 2, 4, 8, ... for levels 0, 1, 2, 3, ...
pub fn required_distance(level: usize) -> usize {
    if level == 0 { 0 } else { 1 << level }
}

/// The sources visible from one cell, grouped by ascending level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributionInfo {
    sources: Vec<Source>,
    /// `offsets[l]..offsets[l + 1]` is the slice of level `l` sources.
    offsets: Vec<usize>,
}

impl ContributionInfo {
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources of a single level.
    pub fn level(&self, level: usize) -> &[Source] {
        match (self.offsets.get(level), self.offsets.get(level + 1)) {
            (Some(&lo), Some(&hi)) => &self.sources[lo..hi],
            _ => &[],
        }
    }

    /// Near cells whose stars act individually.
    pub fn near_cells(&self) -> &[Source] {
        self.level(0)
    }

    pub fn encoded(&self) -> impl Iterator<Item = u32> + '_ {
        self.sources.iter().map(Source::encode)
    }
}

/// Contribution lists for every cell of a grid, indexed like the grid's cells.
#[derive(Debug, Clone)]
pub struct ContributionTable {
    grid_res: usize,
    infos: Vec<ContributionInfo>,
}

impl ContributionTable {
    /// Builds the list of every cell of a `grid_res`-sized grid over `levels`
    /// aggregation levels.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ContributionOverflow`] if any cell needs more than
    /// `max_contributions` sources.
    pub fn build(grid_res: usize, levels: usize, max_contributions: usize) -> Result<Self, SimError> {
        let mut infos = Vec::with_capacity(grid_res * grid_res);
        for cx in 0..grid_res {
            for cy in 0..grid_res {
                infos.push(build_for_cell(grid_res, levels, cx, cy, max_contributions)?);
            }
        }
        let table = Self { grid_res, infos };
        let (min, max, mean) = table.stats();
        info!(
            "Contribution lists built for {} cells: {}..{} sources, mean {:.1}",
            grid_res * grid_res,
            min,
            max,
            mean
        );
        Ok(table)
    }

    pub fn get(&self, cx: usize, cy: usize) -> &ContributionInfo {
        &self.infos[cx * self.grid_res + cy]
    }

    /// Smallest, largest and mean list length.
    pub fn stats(&self) -> (usize, usize, f64) {
        let lens = self.infos.iter().map(ContributionInfo::len);
        let min = lens.clone().min().unwrap_or(0);
        let max = lens.clone().max().unwrap_or(0);
        let mean = if self.infos.is_empty() {
            0.0
        } else {
            lens.sum::<usize>() as f64 / self.infos.len() as f64
        };
        (min, max, mean)
    }
}

/// Computes the contribution list of cell `(cx, cy)`.
pub fn build_for_cell(
    grid_res: usize,
    levels: usize,
    cx: usize,
    cy: usize,
    max_contributions: usize,
) -> Result<ContributionInfo, SimError> {
    let mut buckets: Vec<Vec<Source>> = vec![Vec::new(); levels + 1];
    let top_res = grid_res >> (levels - 1);
    for x in 0..top_res {
        for y in 0..top_res {
            collect(levels, x, y, cx, cy, &mut buckets);
        }
    }

    let needed: usize = buckets.iter().map(Vec::len).sum();
    if needed > max_contributions {
        return Err(SimError::ContributionOverflow { cx, cy, needed, capacity: max_contributions });
    }

    let mut info = ContributionInfo {
        sources: Vec::with_capacity(needed),
        offsets: Vec::with_capacity(levels + 2),
    };
    for bucket in buckets {
        info.offsets.push(info.sources.len());
        info.sources.extend(bucket);
    }
    info.offsets.push(info.sources.len());
    Ok(info)
}

fn collect(level: usize, x: usize, y: usize, cx: usize, cy: usize, buckets: &mut [Vec<Source>]) {
    let size = cell_size(level);
    let dist = required_distance(level);
    let (xx, yy) = ((x * size) as i64, (y * size) as i64);
    let (cx, cy, size_i, dist) = (cx as i64, cy as i64, size as i64, dist as i64);

    let far_enough = xx >= cx + dist
        || xx + size_i - 1 <= cx - dist
        || yy >= cy + dist
        || yy + size_i - 1 <= cy - dist;

    if far_enough {
        buckets[level].push(Source::aggregate(level, x, y));
    } else if level > 1 {
        for (dx, dy) in [(0, 0), (1, 0), (1, 1), (0, 1)] {
            collect(level - 1, 2 * x + dx, 2 * y + dy, cx as usize, cy as usize, buckets);
        }
    } else {
        buckets[0].push(Source::stars(x, y));
    }
}
