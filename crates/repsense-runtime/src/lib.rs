//! Repsense Runtime - Session engine
//!
//! A session is the single authoritative holder of live exercise state.
//! Each frame runs to completion before the next is accepted:
//! 1. Drop landmarks below the visibility floor
//! 2. Extract joint angles through the joint table
//! 3. Smooth angles per joint
//! 4. Compare against the saved reference (distance, near-match, score)
//! 5. Align the reference onto the live frame for overlays
//! 6. Drive the per-limb phase machines and credit repetitions
//! 7. Notify observers of phase changes and repetitions
//!
//! Hosts subscribe to `SessionEvent`s instead of reading engine state
//! through UI-owned cells.

pub mod config;
pub mod observer;
pub mod session;
pub mod shared;
pub mod telemetry;

pub use config::*;
pub use observer::*;
pub use session::*;
pub use shared::*;
pub use telemetry::*;
