//! Centralized constants for the hpa-transfer project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod controller;
pub mod state;
pub mod transfer;
