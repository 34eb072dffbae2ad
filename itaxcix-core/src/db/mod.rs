//! Local preference store (SQLite)

mod pool;

pub use pool::*;
