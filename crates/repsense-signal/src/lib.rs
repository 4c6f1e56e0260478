//! Repsense Signal - Smoothing and phase tracking over scalar signals
//!
//! This crate implements the temporal layer of the engine:
//! - EMA smoothing, one state per tracked signal, seeded by the first sample
//! - Phase rules mapping smoothed signals to candidate phases
//! - Hysteresis-gated phase machines that commit only stable candidates
//! - Limb sets running one machine per limb with configurable rep credit

pub mod ema;
pub mod limbs;
pub mod machine;
pub mod phase;

pub use ema::*;
pub use limbs::*;
pub use machine::*;
pub use phase::*;
