//! Request handlers for planning and table metadata.

mod plan;
mod tables;

pub use plan::*;
pub use tables::*;
