use std::fmt;

use crate::cpu::op::Op;
use crate::cpu::parameter::{Parameter, ParameterSet};
use crate::cpu::segment::Segment;

/// one decoded instruction; the single currency shared by the disassembler
/// and the interpreter
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub command: Op,
    pub params: ParameterSet,
    /// encoded length in bytes, prefix bytes included
    pub length: u8,
    /// one-shot segment override in force for this instruction
    pub segment_prefix: Segment,
    /// REP/REPNZ prefix
    pub repeat: RepeatMode,
    /// LOCK prefix
    pub lock: bool,
    /// size keyword NASM needs in front of the destination operand
    pub dst_size: SizeHint,
    /// size keyword NASM needs in front of the source operand
    pub src_size: SizeHint,
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction::new2(op, Parameter::None, Parameter::None)
    }

    pub fn new1(op: Op, dst: Parameter) -> Self {
        Instruction::new2(op, dst, Parameter::None)
    }

    pub fn new2(op: Op, dst: Parameter, src: Parameter) -> Self {
        Instruction {
            command: op,
            params: ParameterSet { dst, src },
            length: 0,
            segment_prefix: Segment::Default,
            repeat: RepeatMode::None,
            lock: false,
            dst_size: SizeHint::None,
            src_size: SizeHint::None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.lock {
            write!(f, "LOCK ")?;
        }
        write!(f, "{}{}", self.repeat.as_str(), self.command)?;
        if !self.params.dst.is_none() {
            write!(f, " {}{}", self.dst_size.as_str(), self.params.dst)?;
            if !self.params.src.is_none() {
                write!(f, ", {}{}", self.src_size.as_str(), self.params.src)?;
            }
        }
        Ok(())
    }
}

/// explicit operand size keyword for encodings NASM cannot infer a size for
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SizeHint {
    None,
    Byte,
    Word,
    Far,
}

impl SizeHint {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeHint::None => "",
            SizeHint::Byte => "byte ",
            SizeHint::Word => "word ",
            SizeHint::Far => "far ",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RepeatMode {
    None,
    Repz,
    Repnz,
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::None => "",
            RepeatMode::Repz => "REPZ ",
            RepeatMode::Repnz => "REPNZ ",
        }
    }
}

/// layout of the mod/reg/rm byte
#[derive(Debug)]
pub struct ModRegRm {
    /// "mod" is the proper name but a reserved keyword
    pub md: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRegRm {
    pub fn parse(b: u8) -> Self {
        ModRegRm {
            md: b >> 6,
            reg: (b >> 3) & 0b111,
            rm: b & 0b111,
        }
    }
}
