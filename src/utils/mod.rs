// Utilities

mod env;

pub use env::*;
