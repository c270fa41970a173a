//! Parameter grid handling.
//!
//! - CSV grid reading + collision checks (`reader`)
//! - bracketing over a discrete reference axis (`bracket`)
//! - the process-wide reference lattice and its interpolation corners (`reference`)

pub mod bracket;
pub mod reader;
pub mod reference;

pub use bracket::*;
pub use reader::*;
pub use reference::*;
