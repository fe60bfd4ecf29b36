//! Database module for PostgreSQL persistence.

mod lookup;
mod pool;
mod rows;

pub use lookup::*;
pub use pool::*;
pub use rows::*;
