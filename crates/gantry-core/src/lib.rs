//! Domain model for Gantry.
//!
//! This crate defines the application state that the storage layer
//! persists and reconstructs:
//! - Applications and releases
//! - Process formations
//! - Container image references
//! - The env-file codec

mod app;
pub mod env;
mod formation;
mod image;

pub use app::{App, Environment, Release};
pub use env::{EnvError, EnvResult};
pub use formation::{Formation, Process};
pub use image::{ImageError, ImageRef};
