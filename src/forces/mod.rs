mod gather;
mod kernels;

pub use gather::*;
pub use kernels::*;
