mod task;
mod thread_pool;

pub use task::*;
pub use thread_pool::*;
