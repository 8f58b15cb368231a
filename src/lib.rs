//! Real-time 2D gravity on a static grid.
//!
//! Stars live in the cells of a fixed square grid. Each step, a multilevel
//! pyramid summarizes the grid, every cell pulls forces from a precomputed list of
//! near cells and far aggregates, and stars that left their cell are migrated.
pub mod utils;
pub mod threading;
pub mod grid;
pub mod aggregation;
pub mod contributions;
pub mod forces;
pub mod simulation;

/// ### General helper function
/// - Asserts that two floating point numbers are approximately equal.
///
/// ### Arguments
///
/// * `a` - The first floating point number.
/// * `b` - The second floating point number.
/// * `epsilon` - The maximum difference between `a` and `b` for them to be considered equal.
/// * `optional_message` - An optional message to display if the assertion fails.
///
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64, optional_message: Option<&str>) {
    match optional_message {
        Some(message) => assert!((a - b).abs() < epsilon, "a: {:?},\nb: {:?},\nepsilon: {:?},\n message: {:?}", a, b, epsilon, message),
        None => assert!((a - b).abs() < epsilon, "Expected {} to be approximately equal to {} (epsilon: {})", a, b, epsilon),
    }
}
