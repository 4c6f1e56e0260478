//! Repsense Pose - Geometry over landmark frames
//!
//! Pose here means joint angles, not pixels:
//! - Angle at a vertex from three landmarks
//! - Angle maps extracted through a static joint table
//! - Comparison of live angles against a saved reference
//! - Similarity alignment of a saved reference onto the live frame
//! - Reference poses frozen from a landmark frame

pub mod align;
pub mod angle;
pub mod compare;
pub mod reference;

pub use align::*;
pub use angle::*;
pub use compare::*;
pub use reference::*;
