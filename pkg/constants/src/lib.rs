//! Centralized constants for the netset project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod annotations;
pub mod controller;
pub mod finalizers;
pub mod labels;
pub mod state;
