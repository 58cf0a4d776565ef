//! Power flow attribution
//!
//! Turns the four aggregate readings reported by a site (solar, grid, home,
//! battery) into directional flows between those nodes. Pure and stateless:
//! computed fresh on every telemetry poll, never stored.

pub mod model;
pub mod snapshot;

pub use model::{compute, FlowDecomposition};
pub use snapshot::PowerSnapshot;
