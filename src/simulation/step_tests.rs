use std::sync::Arc;

use approx::assert_relative_eq;

use crate::aggregation::Pyramid;
use crate::contributions::ContributionTable;
use crate::forces::SourceBatch;
use crate::grid::{CrossingFlags, Grid, StarId};
use crate::simulation::*;
use crate::utils::{ForceLaw, PhysicsParams, SimError};

fn physics() -> PhysicsParams {
    PhysicsParams {
        gravity: 0.0001,
        force_law: ForceLaw::ClampedInverseSquare { max_accel: 1.0 },
        black_hole: None,
    }
}

fn frame_for(grid: Grid) -> StepFrame {
    let mut pyramid = Pyramid::new(&grid, 3);
    pyramid.rebuild(&grid);
    let contributions = ContributionTable::build(grid.res(), 3, 512).unwrap();
    StepFrame {
        grid,
        pyramid: Arc::new(pyramid),
        contributions: Arc::new(contributions),
        physics: physics(),
    }
}

/// Integrates every column of `grid` inline and migrates, like one world step.
fn advance(grid: Grid, dt: f32, max_transits: usize) -> (Grid, Result<MigrationReport, SimError>) {
    let frame = frame_for(grid);
    let updates: Vec<ColumnUpdate> = (0..frame.grid.res()).map(|cx| integrate_column(&frame, cx, dt)).collect();
    let mut grid = frame.grid;
    for update in updates {
        apply_update(&mut grid, update);
    }
    let report = migrate(&mut grid, max_transits);
    (grid, report)
}

#[test]
fn test_lone_star_moves_in_a_straight_line() {
    let mut grid = Grid::new(8, 16);
    grid.add_star(0.45, 0.25, 1.0, -0.5, None).unwrap();
    let frame = frame_for(grid);
    let mut batch = SourceBatch::default();
    let update = integrate_cell(&frame, 4, 4, 0.1, &mut batch);
    assert_eq!(update.len(), 1);
    assert_eq!(update.vx[0], 1.0);
    assert_eq!(update.vy[0], -0.5);
    assert_relative_eq!(update.qx[0], 0.55, max_relative = 1e-6);
    assert_relative_eq!(update.qy[0], 0.2, max_relative = 1e-6);
    assert!(update.crossing[0].is_empty());
}

#[test]
fn test_integration_reads_only_the_frame() {
    let mut grid = Grid::new(8, 16);
    grid.add_star(0.2, 0.5, 0.0, 0.0, None).unwrap();
    grid.add_star(0.8, 0.5, 0.0, 0.0, None).unwrap();
    let frame = frame_for(grid);
    let update = integrate_column(&frame, 4, 1.0);

    // The frame still holds the old positions.
    assert_eq!(frame.grid.cell(4, 4).px, vec![0.2, 0.8]);

    let cell = &update.cells[4];
    let expected = 0.0001 / (0.6f32 * 0.6);
    assert_relative_eq!(cell.vx[0], expected, max_relative = 1e-4);
    assert_relative_eq!(cell.vx[1], -expected, max_relative = 1e-4);
    assert_eq!(cell.vy, vec![0.0, 0.0]);
    assert!(update.cells.iter().enumerate().all(|(cy, c)| cy == 4 || c.is_empty()));
}

#[test]
fn test_crossing_flags_are_written_back() {
    let mut grid = Grid::new(8, 16);
    grid.add_star(0.95, 0.05, 1.0, -1.0, None).unwrap();
    let frame = frame_for(grid);
    let update = integrate_column(&frame, 4, 0.1);
    let mut grid = frame.grid;
    apply_update(&mut grid, update);
    let cell = grid.cell(4, 4);
    assert_eq!(cell.status[0].crossing, CrossingFlags::HI_X | CrossingFlags::LO_Y);
    assert!(cell.has_crossings());
    assert_eq!(count_crossings(&grid), 1);
}

#[test]
fn test_migration_preserves_identity_and_velocity() {
    let mut grid = Grid::new(8, 16);
    let at = grid.add_star(0.45, 0.0, 10.0, 0.0, None).unwrap().unwrap();
    let id = grid.star(at).unwrap().id;
    grid.add_star(0.5, 0.5, 0.0, 0.0, None).unwrap();

    let (grid, report) = advance(grid, 0.1, 10);
    assert_eq!(report.unwrap(), MigrationReport { migrated: 1, escaped: 0, rejected: 0 });

    let moved = grid.find(id).unwrap();
    assert_eq!((moved.cx, moved.cy), (5, 4));
    let star = grid.star(moved).unwrap();
    assert_relative_eq!(star.vx, 10.0, max_relative = 1e-4);
    assert!(grid.cell(5, 4).status[moved.index].crossing.is_empty());
    assert_eq!(grid.cell(4, 4).len(), 1);
    assert!(grid.check_containment(1e-5).is_ok());
}

#[test]
fn test_fast_star_can_skip_cells() {
    let mut grid = Grid::new(8, 16);
    grid.add_star(-3.5, -3.5, 60.0, 0.0, Some(StarId(77))).unwrap();
    let (grid, report) = advance(grid, 0.1, 10);
    assert_eq!(report.unwrap().migrated, 1);
    let at = grid.find(StarId(77)).unwrap();
    assert_eq!((at.cx, at.cy), (6, 0));
}

#[test]
fn test_star_leaving_the_domain_escapes() {
    let mut grid = Grid::new(8, 16);
    grid.add_star(3.9, 0.0, 10.0, 0.0, None).unwrap();
    let (grid, report) = advance(grid, 0.1, 10);
    assert_eq!(report.unwrap(), MigrationReport { migrated: 0, escaped: 1, rejected: 0 });
    assert_eq!(grid.total_count(), 0);
}

#[test]
fn test_full_destination_rejects_star() {
    let mut grid = Grid::new(8, 1);
    grid.add_star(1.5, 0.2, 0.0, 0.0, None).unwrap();
    grid.add_star(0.5, 0.2, 10.0, 0.0, None).unwrap();
    let (grid, report) = advance(grid, 0.1, 10);
    assert_eq!(report.unwrap().rejected, 1);
    assert_eq!(grid.total_count(), 1);
}

#[test]
fn test_migration_overflow_leaves_grid_untouched() {
    let mut grid = Grid::new(8, 16);
    grid.add_star(0.9, 0.5, 10.0, 0.0, None).unwrap();
    grid.add_star(-0.9, 0.5, -10.0, 0.0, None).unwrap();
    let (grid, report) = advance(grid, 0.1, 1);
    assert_eq!(report, Err(SimError::MigrationOverflow { needed: 2, capacity: 1 }));
    assert_eq!(grid.total_count(), 2);
    assert_eq!(count_crossings(&grid), 2);
}
