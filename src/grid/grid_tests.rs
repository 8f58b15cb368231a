use approx::assert_relative_eq;
use crate::grid::{cell_to_pos, pos_to_cell, CellBounds, CrossingFlags, Grid, StarId, StarRef, CONTAINMENT_EPS};
use crate::utils::SimError;

#[test]
fn test_coordinate_mapping_round_trip() {
    let res = 64;
    for c in 0..res {
        let center = cell_to_pos(c, res);
        assert_eq!(pos_to_cell(center, res), c as i64);
        assert_eq!(pos_to_cell(center - 0.49, res), c as i64);
        assert_eq!(pos_to_cell(center + 0.49, res), c as i64);
    }
    assert_eq!(pos_to_cell(0.0, res), 32);
    assert_eq!(pos_to_cell(-32.0, res), 0);
    assert_eq!(pos_to_cell(-32.01, res), -1);
    assert_eq!(pos_to_cell(32.0, res), 64);
}

#[test]
fn test_cells_tile_the_domain() {
    let grid = Grid::new(8, 4);
    assert_eq!(grid.cells().len(), 64);
    let first = grid.cell(0, 0).bounds;
    let last = grid.cell(7, 7).bounds;
    assert_eq!(first.x, [-4.0, -3.0]);
    assert_eq!(first.y, [-4.0, -3.0]);
    assert_eq!(last.x, [3.0, 4.0]);
    assert_eq!(last.y, [3.0, 4.0]);
    for cx in 0..7 {
        assert_eq!(grid.cell(cx, 0).bounds.x[1], grid.cell(cx + 1, 0).bounds.x[0]);
    }
    for cell in grid.cells() {
        assert!(cell.is_empty());
    }
}

#[test]
fn test_column_slice_is_contiguous() {
    let grid = Grid::new(8, 4);
    let column = grid.column(3);
    assert_eq!(column.len(), 8);
    for (cy, cell) in column.iter().enumerate() {
        assert_eq!(cell.bounds, grid.cell(3, cy).bounds);
    }
}

#[test]
fn test_add_star_places_in_covering_cell() {
    let mut grid = Grid::new(8, 4);
    let at = grid.add_star(1.25, -2.75, 0.5, -0.5, None).unwrap().expect("inside the domain");
    assert_eq!((at.cx, at.cy), (5, 1));
    let star = grid.star(at).unwrap();
    assert_eq!(star.px, 1.25);
    assert_eq!(star.vy, -0.5);
    assert!(grid.cell(5, 1).bounds.contains(star.px, star.py, 0.0));
    assert_eq!(grid.total_count(), 1);
}

#[test]
fn test_add_star_assigns_monotonic_ids_and_keeps_given_id() {
    let mut grid = Grid::new(8, 4);
    let a = grid.add_star(0.1, 0.1, 0.0, 0.0, None).unwrap().unwrap();
    let b = grid.add_star(0.2, 0.1, 0.0, 0.0, None).unwrap().unwrap();
    let c = grid.add_star(0.3, 0.1, 0.0, 0.0, Some(StarId(99))).unwrap().unwrap();
    assert_eq!(grid.star(a).unwrap().id, StarId(0));
    assert_eq!(grid.star(b).unwrap().id, StarId(1));
    assert_eq!(grid.star(c).unwrap().id, StarId(99));
    let d = grid.add_star(0.4, 0.1, 0.0, 0.0, None).unwrap().unwrap();
    assert_eq!(grid.star(d).unwrap().id, StarId(2));
}

#[test]
fn test_add_star_outside_domain_is_silently_refused() {
    let mut grid = Grid::new(8, 4);
    assert_eq!(grid.add_star(4.5, 0.0, 0.0, 0.0, None), Ok(None));
    assert_eq!(grid.add_star(0.0, -4.01, 0.0, 0.0, None), Ok(None));
    assert_eq!(grid.add_star(f32::NAN, 0.0, 0.0, 0.0, None), Ok(None));
    assert_eq!(grid.add_star(f32::INFINITY, 0.0, 0.0, 0.0, None), Ok(None));
    assert_eq!(grid.total_count(), 0);
}

#[test]
fn test_add_star_into_full_cell_fails_cleanly() {
    let mut grid = Grid::new(8, 3);
    for i in 0..3 {
        assert!(grid.add_star(0.1 + 0.1 * i as f32, 0.5, 0.0, 0.0, None).unwrap().is_some());
    }
    let result = grid.add_star(0.9, 0.5, 0.0, 0.0, None);
    assert_eq!(result, Err(SimError::CellFull { cx: 4, cy: 4, capacity: 3 }));
    assert_eq!(grid.cell(4, 4).len(), 3);
    // Neighbouring cells still accept stars.
    assert!(grid.add_star(1.1, 0.5, 0.0, 0.0, None).unwrap().is_some());
}

#[test]
fn test_remove_at_moves_last_star_into_slot() {
    let mut grid = Grid::new(8, 8);
    for i in 0..4 {
        grid.add_star(0.1 * (i + 1) as f32, 0.5, i as f32, -(i as f32), None).unwrap();
    }
    let removed = grid.remove_at(4, 4, 1).unwrap();
    assert_eq!(removed.id, StarId(1));
    assert_eq!(removed.vx, 1.0);

    let cell = grid.cell(4, 4);
    assert_eq!(cell.len(), 3);
    // The former last star (id 3) now occupies index 1, with its velocity.
    assert_eq!(cell.status[1].id, StarId(3));
    assert_eq!(cell.vx[1], 3.0);
    assert_eq!(cell.vy[1], -3.0);
    assert_relative_eq!(cell.px[1], 0.4);
}

#[test]
fn test_remove_at_rejects_bad_index() {
    let mut grid = Grid::new(8, 8);
    grid.add_star(0.5, 0.5, 0.0, 0.0, None).unwrap();
    assert_eq!(grid.remove_at(4, 4, 1), Err(SimError::InvalidStar { cx: 4, cy: 4, index: 1 }));
    assert!(grid.remove_at(8, 0, 0).is_err());
}

#[test]
fn test_clear_and_clear_cell() {
    let mut grid = Grid::new(8, 8);
    grid.add_star(0.5, 0.5, 0.0, 0.0, None).unwrap();
    grid.add_star(0.6, 0.5, 0.0, 0.0, None).unwrap();
    grid.add_star(-2.5, 0.5, 0.0, 0.0, None).unwrap();
    assert_eq!(grid.clear_cell(4, 4), 2);
    assert_eq!(grid.total_count(), 1);
    assert_eq!(grid.clear_cell(99, 0), 0);
    grid.clear();
    assert_eq!(grid.total_count(), 0);
    // Identities keep counting after a clear.
    let at = grid.add_star(0.5, 0.5, 0.0, 0.0, None).unwrap().unwrap();
    assert_eq!(grid.star(at).unwrap().id, StarId(3));
}

#[test]
fn test_center_of_mass_and_extent() {
    let mut grid = Grid::new(8, 8);
    grid.add_star(0.2, 0.4, 0.0, 0.0, None).unwrap();
    grid.add_star(0.8, 0.6, 0.0, 0.0, None).unwrap();
    grid.update_centers_of_mass();

    let cell = grid.cell(4, 4);
    let (cx, cy) = cell.center_of_mass();
    assert_relative_eq!(cx, 0.5, epsilon = 1e-6);
    assert_relative_eq!(cy, 0.5, epsilon = 1e-6);
    let extent = cell.extent();
    assert_eq!(extent.x, [0.2, 0.8]);
    assert_eq!(extent.y, [0.4, 0.6]);

    // Empty cells fall back to their midpoint.
    let empty = grid.cell(0, 0);
    assert_eq!(empty.center_of_mass(), empty.bounds.center());
}

#[test]
fn test_nearest_star_searches_covering_cell() {
    let mut grid = Grid::new(8, 8);
    grid.add_star(0.1, 0.1, 0.0, 0.0, None).unwrap();
    grid.add_star(0.9, 0.9, 0.0, 0.0, None).unwrap();
    let near = grid.nearest_star(0.7, 0.8).expect("cell has stars");
    assert_eq!(grid.star(near).unwrap().id, StarId(1));
    assert!(grid.nearest_star(-3.5, -3.5).is_none(), "empty cell yields nothing");
    assert!(grid.nearest_star(100.0, 0.0).is_none());
}

#[test]
fn test_find_by_identity() {
    let mut grid = Grid::new(8, 8);
    grid.add_star(-3.5, 2.5, 0.0, 0.0, None).unwrap();
    grid.add_star(1.5, -0.5, 0.0, 0.0, None).unwrap();
    assert_eq!(grid.find(StarId(1)), Some(StarRef { cx: 5, cy: 3, index: 0 }));
    assert_eq!(grid.find(StarId(7)), None);
}

#[test]
fn test_check_containment_reports_stray_star() {
    let mut grid = Grid::new(8, 8);
    grid.add_star(0.5, 0.5, 0.0, 0.0, None).unwrap();
    assert!(grid.check_containment(CONTAINMENT_EPS).is_ok());
    grid.cell_mut(4, 4).px[0] = 1.5;
    assert_eq!(grid.check_containment(CONTAINMENT_EPS), Err(StarRef { cx: 4, cy: 4, index: 0 }));
}

#[test]
fn test_crossing_flags_from_bounds() {
    let bounds = CellBounds { x: [0.0, 1.0], y: [0.0, 1.0] };
    assert!(bounds.crossing_of(0.5, 0.5).is_empty());
    assert!(bounds.crossing_of(1.0, 0.0).is_empty(), "edges are inside");
    let flags = bounds.crossing_of(-0.1, 1.2);
    assert!(flags.contains(CrossingFlags::LO_X));
    assert!(flags.contains(CrossingFlags::HI_Y));
    assert!(!flags.contains(CrossingFlags::HI_X));
    assert_eq!(flags.bits(), 0b1001);
    assert_eq!(bounds.crossing_of(2.0, -1.0), CrossingFlags::HI_X | CrossingFlags::LO_Y);
}
