//! Label policies: turn server metadata into Prometheus target labels.

pub mod flatten;
pub mod naming;
pub mod policy;

pub use policy::*;
