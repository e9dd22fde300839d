//! Concrete collaborator implementations

pub mod macos;
