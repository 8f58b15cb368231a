//! End-to-end behaviour of whole steps on a populated world.
use crate::grid::{Grid, StarId};
use crate::simulation::SimulationWorld;
use crate::utils::{Executor, SimError, SimulationConfig, SUBSTEP};

fn config(executor: Executor) -> SimulationConfig {
    SimulationConfig::new(Some(32), Some(256), Some(4), Some(3000), Some(executor))
}

fn populated(executor: Executor) -> SimulationWorld {
    let mut world = SimulationWorld::new(config(executor)).unwrap();
    world.create().unwrap();
    world
}

/// Every star as `(id, px, py, vx, vy)` in grid order.
fn snapshot(grid: &Grid) -> Vec<(StarId, f32, f32, f32, f32)> {
    grid.cells()
        .iter()
        .flat_map(|cell| {
            (0..cell.len()).map(move |i| (cell.status[i].id, cell.px[i], cell.py[i], cell.vx[i], cell.vy[i]))
        })
        .collect()
}

#[test]
fn test_star_count_is_conserved() {
    let mut world = populated(Executor::Inline);
    let before = world.total_count();
    for _ in 0..30 {
        let report = world.step(SUBSTEP).unwrap();
        assert_eq!(report.escaped, 0);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.stars, before);
    }
    assert_eq!(world.total_count(), before);
}

#[test]
fn test_stars_stay_in_their_cells_between_steps() {
    let mut world = populated(Executor::Inline);
    for _ in 0..10 {
        world.step(SUBSTEP).unwrap();
        assert_eq!(world.grid().check_containment(1e-5), Ok(()));
        assert!(world.grid().cells().iter().all(|cell| !cell.has_crossings()));
    }
}

#[test]
fn test_pyramid_tracks_the_grid() {
    let mut world = populated(Executor::Inline);
    world.step(SUBSTEP).unwrap();
    world.step(SUBSTEP).unwrap();
    // The pyramid reflects the positions at the start of the last step.
    let counts: Vec<u32> = (1..=4).map(|l| world.aggregates(l).iter().map(|a| a.count).sum()).collect();
    assert_eq!(counts, vec![3000; 4]);
    let top = world.aggregates(4);
    for (i, aggregate) in top.iter().enumerate() {
        if aggregate.count > 0 {
            let eps = 1e-4;
            assert!(aggregate.cx >= aggregate.rngx[0] - eps && aggregate.cx <= aggregate.rngx[1] + eps, "aggregate {}", i);
            assert!(aggregate.cy >= aggregate.rngy[0] - eps && aggregate.cy <= aggregate.rngy[1] + eps, "aggregate {}", i);
        }
    }
}

#[test]
fn test_executors_agree_bit_for_bit() {
    let mut inline = populated(Executor::Inline);
    let mut pooled = populated(Executor::ThreadPool { threads: 4 });
    let mut rayon = populated(Executor::Rayon);
    assert_eq!(snapshot(inline.grid()), snapshot(pooled.grid()));

    for _ in 0..5 {
        let a = inline.step(SUBSTEP).unwrap();
        let b = pooled.step(SUBSTEP).unwrap();
        let c = rayon.step(SUBSTEP).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }
    let expected = snapshot(inline.grid());
    assert_eq!(snapshot(pooled.grid()), expected);
    assert_eq!(snapshot(rayon.grid()), expected);
}

#[test]
fn test_two_stars_fall_toward_each_other() {
    let mut world = SimulationWorld::new(config(Executor::Inline)).unwrap();
    let left = world.add_star(-6.3, 0.5, 0.0, 0.0).unwrap().unwrap();
    let right = world.add_star(6.3, 0.5, 0.0, 0.0).unwrap().unwrap();
    let left_id = world.grid().star(left).unwrap().id;
    let right_id = world.grid().star(right).unwrap().id;

    world.step(SUBSTEP).unwrap();
    let l = world.grid().star(world.grid().find(left_id).unwrap()).unwrap();
    let r = world.grid().star(world.grid().find(right_id).unwrap()).unwrap();
    assert!(l.vx > 0.0, "left star should move right, vx = {}", l.vx);
    assert!(r.vx < 0.0, "right star should move left, vx = {}", r.vx);
    assert_eq!(l.vx, -r.vx);

    for _ in 0..200 {
        world.step(SUBSTEP).unwrap();
    }
    assert_eq!(world.total_count(), 2);
}

#[test]
fn test_star_crosses_into_neighbour() {
    let mut world = SimulationWorld::new(config(Executor::Inline)).unwrap();
    let at = world.add_star(0.99, 0.5, 2.0, 0.0).unwrap().unwrap();
    let id = world.grid().star(at).unwrap().id;
    assert_eq!((at.cx, at.cy), (16, 16));

    let report = world.step(SUBSTEP).unwrap();
    assert_eq!(report.migrated, 1);
    let moved = world.grid().find(id).unwrap();
    assert_eq!((moved.cx, moved.cy), (17, 16));
    assert_eq!(world.grid().star(moved).unwrap().vx, 2.0);
    assert!(world.grid().cell(16, 16).is_empty());
}

#[test]
fn test_full_cell_refuses_more_stars() {
    let mut world = SimulationWorld::new(config(Executor::Inline)).unwrap();
    for i in 0..256 {
        let offset = i as f32 / 512.0;
        assert!(world.add_star(0.1 + offset, 0.1 + offset, 0.0, 0.0).unwrap().is_some());
    }
    let err = world.add_star(0.5, 0.5, 0.0, 0.0).unwrap_err();
    assert_eq!(err, SimError::CellFull { cx: 16, cy: 16, capacity: 256 });
    assert_eq!(world.total_count(), 256);
    // Neighbouring cells are unaffected.
    assert!(world.add_star(1.5, 0.5, 0.0, 0.0).unwrap().is_some());
}

#[test]
fn test_too_many_transits_is_an_error() {
    let mut config = config(Executor::Inline);
    config.max_transits = 1;
    let mut world = SimulationWorld::new(config).unwrap();
    world.add_star(0.9, 0.5, 30.0, 0.0).unwrap();
    world.add_star(-0.9, 0.5, -30.0, 0.0).unwrap();
    assert_eq!(
        world.step(SUBSTEP),
        Err(SimError::MigrationOverflow { needed: 2, capacity: 1 })
    );
}
