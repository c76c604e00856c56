mod file;
mod line;

pub use file::{File, WriteOptions};
pub use line::{format_instruction, parse_instruction};

const COMMENT: char = ';';
