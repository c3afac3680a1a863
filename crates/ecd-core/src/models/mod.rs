//! Configuration and declaration data models.

pub mod config;
pub mod declaration;
