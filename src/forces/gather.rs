use crate::aggregation::Pyramid;
use crate::contributions::ContributionInfo;
use crate::forces::kernels::SourceBatch;
use crate::grid::Grid;
use crate::utils::PhysicsParams;

/// Fills `batch` with every point mass acting on the stars of one cell.
///
/// Near cells contribute their stars at unit mass, including the target cell's
/// own stars (a star's pull on itself is zero). Far sources contribute their
/// aggregate center of mass weighted by its star count; empty aggregates are
/// skipped. The black hole, when present, is appended last.
pub fn gather_sources(
    grid: &Grid,
    pyramid: &Pyramid,
    info: &ContributionInfo,
    physics: &PhysicsParams,
    batch: &mut SourceBatch,
) {
    batch.clear();
    for source in info.sources() {
        let (x, y) = (source.x as usize, source.y as usize);
        if source.is_stars() {
            let cell = grid.cell(x, y);
            batch.extend_stars(&cell.px, &cell.py);
        } else {
            let aggregate = pyramid.get(source.level as usize, x, y);
            if aggregate.count > 0 {
                batch.push(aggregate.cx, aggregate.cy, aggregate.count as f32);
            }
        }
    }
    if let Some(hole) = physics.black_hole {
        batch.push(hole.x, hole.y, hole.mass);
    }
    batch.pad();
}
