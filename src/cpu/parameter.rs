use std::fmt;

use crate::cpu::register::{AMode, R};
use crate::cpu::segment::Segment;

/// operand width selected by the w bit
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    pub fn max(self) -> u16 {
        match self {
            Width::Byte => 0xFF,
            Width::Word => 0xFFFF,
        }
    }

    pub fn sign_bit(self) -> u16 {
        match self {
            Width::Byte => 0x80,
            Width::Word => 0x8000,
        }
    }
}

/// the destination and source operands of an instruction
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParameterSet {
    pub dst: Parameter,
    pub src: Parameter,
}

/// One decoded operand, shared by the text and execution backends. Memory
/// operands carry the segment override in force when they were decoded
/// (`Segment::Default` when none was).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Parameter {
    /// 8-bit general purpose register
    Reg8(R),
    /// 16-bit general purpose register
    Reg16(R),
    /// segment register
    SReg16(R),

    /// unsigned immediate, rendered in unsigned decimal
    Imm8(u8),
    Imm16(u16),
    /// signed immediate, rendered in signed decimal
    ImmS8(i8),
    ImmS16(i16),
    /// short-jump displacement, rendered relative to $
    Rel8(i8),
    /// inter-segment pointer, rendered `segment:offset`
    Ptr16Imm(u16, u16),

    /// byte memory operand at a direct address
    Ptr8(Segment, u16),
    Ptr8Amode(Segment, AMode),
    Ptr8AmodeS8(Segment, AMode, i8),
    Ptr8AmodeS16(Segment, AMode, i16),

    /// word memory operand at a direct address
    Ptr16(Segment, u16),
    Ptr16Amode(Segment, AMode),
    Ptr16AmodeS8(Segment, AMode, i8),
    Ptr16AmodeS16(Segment, AMode, i16),

    None,
}

impl Parameter {
    pub fn width(&self) -> Width {
        match *self {
            Parameter::Reg8(_)
            | Parameter::Imm8(_)
            | Parameter::ImmS8(_)
            | Parameter::Rel8(_)
            | Parameter::Ptr8(_, _)
            | Parameter::Ptr8Amode(_, _)
            | Parameter::Ptr8AmodeS8(_, _, _)
            | Parameter::Ptr8AmodeS16(_, _, _) => Width::Byte,
            _ => Width::Word,
        }
    }

    pub fn is_imm(&self) -> bool {
        match *self {
            Parameter::Imm8(_)
            | Parameter::Imm16(_)
            | Parameter::ImmS8(_)
            | Parameter::ImmS16(_) => true,
            _ => false,
        }
    }

    pub fn is_memory(&self) -> bool {
        match *self {
            Parameter::Ptr8(_, _)
            | Parameter::Ptr8Amode(_, _)
            | Parameter::Ptr8AmodeS8(_, _, _)
            | Parameter::Ptr8AmodeS16(_, _, _)
            | Parameter::Ptr16(_, _)
            | Parameter::Ptr16Amode(_, _)
            | Parameter::Ptr16AmodeS8(_, _, _)
            | Parameter::Ptr16AmodeS16(_, _, _) => true,
            _ => false,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Parameter::None
    }
}

/// segment override text in front of a memory operand
fn seg_prefix(seg: Segment) -> &'static str {
    match seg {
        Segment::Default => "",
        Segment::ES => "ES:",
        Segment::CS => "CS:",
        Segment::SS => "SS:",
        Segment::DS => "DS:",
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Parameter::Reg8(r) | Parameter::Reg16(r) | Parameter::SReg16(r) => {
                write!(f, "{}", r)
            }

            Parameter::Imm8(imm) => write!(f, "{}", imm),
            Parameter::Imm16(imm) => write!(f, "{}", imm),
            Parameter::ImmS8(imm) => write!(f, "{}", imm),
            Parameter::ImmS16(imm) => write!(f, "{}", imm),

            // short jumps count from the start of the 2-byte instruction
            Parameter::Rel8(disp) => {
                let k = i32::from(disp) + 2;
                if k == 0 {
                    write!(f, "$+0")
                } else if k < 0 {
                    write!(f, "${}+0", k)
                } else {
                    write!(f, "$+{}+0", k)
                }
            }

            Parameter::Ptr16Imm(seg, off) => write!(f, "{}:{}", seg, off),

            Parameter::Ptr8(seg, addr) | Parameter::Ptr16(seg, addr) => {
                write!(f, "{}[{}]", seg_prefix(seg), addr)
            }
            Parameter::Ptr8Amode(seg, amode) | Parameter::Ptr16Amode(seg, amode) => {
                write!(f, "{}[{}]", seg_prefix(seg), amode)
            }
            Parameter::Ptr8AmodeS8(seg, amode, disp)
            | Parameter::Ptr16AmodeS8(seg, amode, disp) => {
                write!(f, "{}[{} + {}]", seg_prefix(seg), amode, disp)
            }
            Parameter::Ptr8AmodeS16(seg, amode, disp)
            | Parameter::Ptr16AmodeS16(seg, amode, disp) => {
                write!(f, "{}[{} + {}]", seg_prefix(seg), amode, disp)
            }

            Parameter::None => write!(f, ""),
        }
    }
}
