//! Moving between extrusion paths: travel moves, combing around printed
//! material and the state shared by consecutive moves.

mod comb;
mod context;
mod travel;

pub use comb::{BoundaryComb, CombRouter};
pub use context::ExtrusionContext;
pub use travel::TravelPath;
