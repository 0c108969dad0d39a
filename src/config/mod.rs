//! # fitsbuf Configuration Module
//!
//! Centralizes the engine's configuration constants. Interdependent values
//! are grouped together in [`constants`] and checked with compile-time
//! assertions so they cannot drift apart.

pub mod constants;
pub use constants::*;
