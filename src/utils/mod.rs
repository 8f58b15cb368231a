pub mod errors;
pub mod config;
pub mod math_helpers;

pub use errors::*;
pub use config::*;
pub use math_helpers::*;
