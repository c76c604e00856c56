//! Symbolic printer instructions. Planning code builds these and the output
//! writer turns them into text.

use crate::misc::round_to;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    AbsolutePositioning,
    UnitsMillimeters,
    StartAtHome,
    ResetExtruder,
    LinearMove,
    ExtruderOn,
    ExtruderOff,
    AbsoluteExtrusion,
    RelativeExtrusion,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arg {
    pub axis: char,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Command { code: Code, args: Vec<Arg> },
    /// A line copied verbatim from a user supplied start or end file.
    Raw(String),
}

impl Code {
    pub fn code(&self) -> &'static str {
        match self {
            Code::AbsolutePositioning => "G90",
            Code::UnitsMillimeters => "G21",
            Code::StartAtHome => "G28",
            Code::ResetExtruder => "G92",
            Code::LinearMove => "G1",
            Code::ExtruderOn => "M101",
            Code::ExtruderOff => "M103",
            Code::AbsoluteExtrusion => "M82",
            Code::RelativeExtrusion => "M83",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Code::AbsolutePositioning => "Set absolute positioning",
            Code::UnitsMillimeters => "Set units to millimeters",
            Code::StartAtHome => "Move to origin",
            Code::ResetExtruder => "Reset extruder distance",
            Code::LinearMove => "Linear move",
            Code::ExtruderOn => "Turn extruder on",
            Code::ExtruderOff => "Turn extruder off",
            Code::AbsoluteExtrusion => "Use absolute extrusion distances",
            Code::RelativeExtrusion => "Use relative extrusion distances",
        }
    }
}

impl Instruction {
    pub fn new(code: Code) -> Self {
        Self::Command {
            code,
            args: Vec::new(),
        }
    }

    pub fn linear_move() -> Self {
        Self::new(Code::LinearMove)
    }

    pub fn raw(line: impl Into<String>) -> Self {
        Self::Raw(line.into())
    }

    /// Appends an axis word, rounding its value to `places` decimals.
    pub fn with(mut self, axis: char, value: f64, places: u32) -> Self {
        if let Self::Command { args, .. } = &mut self {
            args.push(Arg {
                axis,
                value: round_to(value, places),
            });
        }
        self
    }

    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Command { code, .. } => Some(*code),
            Self::Raw(_) => None,
        }
    }

    pub fn args(&self) -> &[Arg] {
        match self {
            Self::Command { args, .. } => args,
            Self::Raw(_) => &[],
        }
    }

    pub fn arg(&self, axis: char) -> Option<f64> {
        self.args()
            .iter()
            .find(|arg| arg.axis == axis)
            .map(|arg| arg.value)
    }

    pub fn is(&self, code: Code) -> bool {
        self.code() == Some(code)
    }
}
