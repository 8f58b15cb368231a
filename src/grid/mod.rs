mod cell;
#[allow(clippy::module_inception)]
mod grid;

pub use cell::*;
pub use grid::*;

#[cfg(test)]
mod grid_tests;
