//! Repsense Test Harness - Synthetic subjects and end-to-end scenarios
//!
//! This crate provides:
//! - Estimator noise (jitter, occlusion, dropped detections)
//! - A seeded synthetic subject rendering scripted joint-angle trajectories
//! - Scenario runs of a live session against that subject

pub mod noise;
pub mod scenario;
pub mod simulator;

pub use noise::*;
pub use scenario::*;
pub use simulator::*;
