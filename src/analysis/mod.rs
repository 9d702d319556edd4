//! Analysis modules.
//!
//! Polynomial fitting, zone classification and the trajectory engine
//! built on top of them.

pub mod polyfit;
pub mod trajectory;
pub mod zones;

pub use trajectory::{compute_trajectory, TrendPolicy};
