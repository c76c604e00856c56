//! Toolpath planning for fused filament printers. A [`scene::File`] of
//! placed meshes is sliced into layers of nested perimeter rings, filled,
//! scheduled and turned into printer instructions by [`pipeline::Pipeline`].

use nalgebra::{Vector2, Vector3};

pub mod extruder;
pub mod gcode;
pub mod kernel;
pub mod layer;
pub mod mesh;
pub mod nesting;
pub mod path;
pub mod pipeline;
pub mod scene;
pub mod schedule;
pub mod slicer;
pub mod strategy;
pub mod toolpath;
pub mod transform;

pub type Pos = Vector3<f64>;
pub type Point = Vector2<f64>;
/// A closed polygon. The last point connects back to the first and is not
/// repeated.
pub type Outline = Vec<Point>;
