//! Shared library for Truthlens modules
//!
//! Provides the domain model (truth reports, lifecycle statuses, restaurant
//! keys), the pure score-blending algorithm, configuration resolution, and
//! the event bus shared between the server and its tests.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod scoring;

pub use error::{Error, Result};
