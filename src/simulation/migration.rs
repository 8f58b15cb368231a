use log::{trace, warn};

use crate::grid::{Grid, StarRecord};
use crate::utils::SimError;

/// What happened to the stars that crossed their cell bounds in one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Stars moved into the cell covering their new position.
    pub migrated: usize,
    /// Stars that left the simulated square and were dropped.
    pub escaped: usize,
    /// Stars dropped because their destination cell was full.
    pub rejected: usize,
}

/// Stars flagged with a boundary crossing, across the whole grid.
pub fn count_crossings(grid: &Grid) -> usize {
    grid.cells()
        .iter()
        .map(|cell| cell.status.iter().filter(|s| !s.crossing.is_empty()).count())
        .sum()
}

/// Moves every flagged star into the cell covering its position, keeping its
/// velocity and identity.
///
/// All flagged stars are extracted before any is reinserted, so a star is never
/// examined twice.
///
/// # Errors
///
/// Returns [`SimError::MigrationOverflow`] if more than `max_transits` stars are
/// flagged. The grid is left untouched in that case.
pub fn migrate(grid: &mut Grid, max_transits: usize) -> Result<MigrationReport, SimError> {
    let needed = count_crossings(grid);
    if needed > max_transits {
        return Err(SimError::MigrationOverflow { needed, capacity: max_transits });
    }

    let mut transits: Vec<StarRecord> = Vec::with_capacity(needed);
    for cell in grid.cells_mut() {
        // Walk backwards: swap-removal only pulls in stars already visited.
        for i in (0..cell.len()).rev() {
            if !cell.status[i].crossing.is_empty() {
                transits.push(cell.swap_remove(i));
            }
        }
    }

    let mut report = MigrationReport::default();
    for star in transits {
        match grid.add_star(star.px, star.py, star.vx, star.vy, Some(star.id)) {
            Ok(Some(_)) => report.migrated += 1,
            Ok(None) => {
                trace!("{} left the domain at {},{}", star.id, star.px, star.py);
                report.escaped += 1;
            }
            Err(err) => {
                warn!("Dropping {}: {}", star.id, err);
                report.rejected += 1;
            }
        }
    }
    Ok(report)
}
