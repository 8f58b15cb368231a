mod pyramid;

pub use pyramid::*;
