//! Repsense Core - Fundamental types for pose tracking
//!
//! This crate defines the types shared by every layer of the engine:
//! - Landmarks and landmark frames (33-point body topology)
//! - Joint specifications, joint tables and angle maps
//! - Frame time supplied by the host with every frame
//! - Error types for configuration and reference handling

pub mod error;
pub mod joint;
pub mod landmark;
pub mod time;

pub use error::*;
pub use joint::*;
pub use landmark::*;
pub use time::*;
