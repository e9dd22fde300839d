//! Public API surface of the install engine

pub mod config;
pub mod context;
pub mod result;
