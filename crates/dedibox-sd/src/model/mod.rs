//! Discovery domain types: upstream server detail and emitted targets.

pub mod detail;
pub mod target;

pub use detail::*;
pub use target::*;
