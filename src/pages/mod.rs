// Page pool

mod pool;

pub use pool::*;
