//! Exact risk evaluation with binary decision diagrams.

pub mod manager;
pub mod system;

pub use manager::{BddManager, BddRef};
pub use system::{discovery_order, BddConfig, BddError, SystemBdd};
