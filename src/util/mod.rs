//! Utility modules: caller-level timeout.

pub mod timeout;
