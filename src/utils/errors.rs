use std::fmt;
use std::error::Error;

/// Represents errors that can occur while building or advancing a star field.
///
/// Capacity variants indicate that a fixed-size store (a cell, a contribution list,
/// or the per-step migration buffer) was sized too small for the workload.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A star was placed into a cell that already holds `capacity` stars.
    CellFull { cx: usize, cy: usize, capacity: usize },
    /// A cell needs more force sources than the contribution list can hold.
    ContributionOverflow { cx: usize, cy: usize, needed: usize, capacity: usize },
    /// More stars crossed their cell bounds in one step than the migration buffer holds.
    MigrationOverflow { needed: usize, capacity: usize },
    /// A star index does not refer to a live star of the given cell.
    InvalidStar { cx: usize, cy: usize, index: usize },
    /// The configuration failed validation.
    InvalidConfig(String),
    /// Work was submitted to a thread pool that is shutting down.
    PoolShutDown,
    /// The operating system refused to start a worker thread.
    ThreadSpawn(String),
    /// Some column tasks of a step produced no result (a worker task panicked).
    StepIncomplete { missing: usize },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::CellFull { cx, cy, capacity } => {
                write!(f, "Cell {},{} is at capacity ({} stars)", cx, cy, capacity)
            }
            SimError::ContributionOverflow { cx, cy, needed, capacity } => write!(
                f,
                "Cell {},{} needs {} force sources, contribution list holds {}",
                cx, cy, needed, capacity
            ),
            SimError::MigrationOverflow { needed, capacity } => write!(
                f,
                "{} stars crossed cell bounds, migration buffer holds {}",
                needed, capacity
            ),
            SimError::InvalidStar { cx, cy, index } => {
                write!(f, "No star at index {} in cell {},{}", index, cx, cy)
            }
            SimError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            SimError::PoolShutDown => write!(f, "Thread pool is shutting down"),
            SimError::ThreadSpawn(msg) => write!(f, "Failed to start worker thread: {}", msg),
            SimError::StepIncomplete { missing } => {
                write!(f, "Step aborted: {} column tasks did not finish", missing)
            }
        }
    }
}

impl Error for SimError {}
