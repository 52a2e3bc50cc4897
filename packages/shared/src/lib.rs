//! Shared utilities for Hiroba (logging, time helpers).

pub mod logger;
pub mod time;
