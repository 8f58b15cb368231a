mod migration;
mod step;
mod world;

pub use migration::*;
pub use step::*;
pub use world::*;

#[cfg(test)]
mod step_tests;
#[cfg(test)]
mod scenario_tests;
