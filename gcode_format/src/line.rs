use anyhow::{bail, Context, Result};

use common::gcode::{Arg, Code, Instruction};

use crate::COMMENT;

const CODES: [Code; 9] = [
    Code::AbsolutePositioning,
    Code::UnitsMillimeters,
    Code::StartAtHome,
    Code::ResetExtruder,
    Code::LinearMove,
    Code::ExtruderOn,
    Code::ExtruderOff,
    Code::AbsoluteExtrusion,
    Code::RelativeExtrusion,
];

/// Formats one instruction as a line of text, without the line ending.
pub fn format_instruction(instruction: &Instruction, verbose: bool) -> String {
    match instruction {
        Instruction::Raw(line) => line.clone(),
        Instruction::Command { code, args } => {
            let mut out = code.code().to_owned();
            for arg in args {
                out.push(' ');
                out.push(arg.axis);
                out.push_str(&format_value(arg.value));
            }

            if verbose {
                out.push_str(" ; ");
                out.push_str(code.description());
            }

            out
        }
    }
}

/// Parses a line produced by [`format_instruction`]. Lines that are not one
/// of the known commands come back as raw lines.
pub fn parse_instruction(line: &str) -> Result<Instruction> {
    let body = match line.find(COMMENT) {
        Some(idx) => &line[..idx],
        None => line,
    };

    let mut words = body.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(Instruction::raw(line));
    };
    let Some(code) = CODES.iter().find(|x| x.code() == first) else {
        return Ok(Instruction::raw(line));
    };

    let mut args = Vec::new();
    for word in words {
        let mut chars = word.chars();
        let Some(axis) = chars.next() else { continue };
        if !axis.is_ascii_alphabetic() {
            bail!("Malformed word `{word}` in `{line}`");
        }

        let value = chars
            .as_str()
            .parse::<f64>()
            .with_context(|| format!("Invalid value in `{word}`"))?;
        args.push(Arg { axis, value });
    }

    Ok(Instruction::Command { code: *code, args })
}

fn format_value(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }

    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_move() {
        let inst = Instruction::linear_move()
            .with('X', 10.0, 3)
            .with('Y', 2.5, 3)
            .with('Z', 0.2, 3)
            .with('F', 1800.0, 3)
            .with('E', 0.03326, 4);

        assert_eq!(
            format_instruction(&inst, false),
            "G1 X10 Y2.5 Z0.2 F1800 E0.0333"
        );
        assert_eq!(
            format_instruction(&Instruction::new(Code::ExtruderOff), true),
            "M103 ; Turn extruder off"
        );
    }

    #[test]
    fn parse_back() {
        let line = "G1 X-1.5 Y2 E0.25 ; Linear move";
        let inst = parse_instruction(line).unwrap();
        assert!(inst.is(Code::LinearMove));
        assert_eq!(inst.arg('X'), Some(-1.5));
        assert_eq!(inst.arg('E'), Some(0.25));

        assert_eq!(
            parse_instruction("; custom start").unwrap(),
            Instruction::raw("; custom start")
        );
        assert_eq!(parse_instruction("M117 hi").unwrap(), Instruction::raw("M117 hi"));
        assert!(parse_instruction("G1 X1 *5").is_err());
    }
}
