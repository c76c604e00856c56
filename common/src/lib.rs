pub mod config;
pub mod gcode;
pub mod misc;
