use std::io::Write;

use anyhow::Result;
use tracing::debug;

use common::gcode::Instruction;

use crate::{format_instruction, parse_instruction, COMMENT};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct File {
    pub instructions: Vec<Instruction>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WriteOptions {
    /// Append the description of each command as a comment.
    pub verbose: bool,
    /// Strip comments, including from raw lines, and drop lines left empty.
    pub delete_comments: bool,
}

impl File {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }
}

impl File {
    pub fn serialize<W: Write>(&self, writer: &mut W, options: WriteOptions) -> Result<()> {
        let verbose = options.verbose && !options.delete_comments;
        let mut lines = 0;

        for instruction in &self.instructions {
            let mut line = format_instruction(instruction, verbose);
            if options.delete_comments {
                if let Some(idx) = line.find(COMMENT) {
                    line.truncate(idx);
                }
                let trimmed = line.trim_end().len();
                line.truncate(trimmed);
                if line.is_empty() {
                    continue;
                }
            }

            writeln!(writer, "{line}")?;
            lines += 1;
        }

        debug!("Wrote {lines} lines of gcode");
        Ok(())
    }

    pub fn to_text(&self, options: WriteOptions) -> String {
        let mut out = Vec::new();
        // Writing into a Vec can not fail.
        let _ = self.serialize(&mut out, options);
        String::from_utf8_lossy(&out).into_owned()
    }

    pub fn deserialize(text: &str) -> Result<Self> {
        let instructions = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_instruction)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { instructions })
    }
}
