//! Helper utilities for integration tests.

pub mod inputs;

pub use inputs::*;
