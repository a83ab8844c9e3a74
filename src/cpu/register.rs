use std::fmt;

use crate::cpu::flags::Flags;

#[cfg(test)]
#[path = "./register_test.rs"]
mod register_test;

/// a 16-bit general purpose register with addressable high/low halves
#[derive(Copy, Clone, Default)]
pub struct Register16 {
    pub val: u16,
}

impl Register16 {
    pub fn set_hi(&mut self, val: u8) {
        self.val = (self.val & 0xFF) | (u16::from(val) << 8);
    }
    pub fn set_lo(&mut self, val: u8) {
        self.val = (self.val & 0xFF00) | u16::from(val);
    }
    pub fn lo_u8(&self) -> u8 {
        (self.val & 0xFF) as u8
    }
    pub fn hi_u8(&self) -> u8 {
        (self.val >> 8) as u8
    }
}

/// every register operand the 8086 can name
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum R {
    AL, CL, DL, BL, AH, CH, DH, BH,
    AX, CX, DX, BX, SP, BP, SI, DI,
    ES, CS, SS, DS,
}

impl R {
    /// storage slot inside RegisterState (gpr slot for general registers,
    /// sreg slot for segment registers)
    pub fn index(self) -> usize {
        match self {
            R::AL | R::AH | R::AX | R::ES => 0,
            R::CL | R::CH | R::CX | R::CS => 1,
            R::DL | R::DH | R::DX | R::SS => 2,
            R::BL | R::BH | R::BX | R::DS => 3,
            R::SP => 4,
            R::BP => 5,
            R::SI => 6,
            R::DI => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            R::AL => "AL", R::CL => "CL", R::DL => "DL", R::BL => "BL",
            R::AH => "AH", R::CH => "CH", R::DH => "DH", R::BH => "BH",
            R::AX => "AX", R::CX => "CX", R::DX => "DX", R::BX => "BX",
            R::SP => "SP", R::BP => "BP", R::SI => "SI", R::DI => "DI",
            R::ES => "ES", R::CS => "CS", R::SS => "SS", R::DS => "DS",
        }
    }
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 8-bit register from a 3-bit reg/rm field
pub fn r8(v: u8) -> R {
    match v & 0b111 {
        0 => R::AL,
        1 => R::CL,
        2 => R::DL,
        3 => R::BL,
        4 => R::AH,
        5 => R::CH,
        6 => R::DH,
        _ => R::BH,
    }
}

/// 16-bit register from a 3-bit reg/rm field
pub fn r16(v: u8) -> R {
    match v & 0b111 {
        0 => R::AX,
        1 => R::CX,
        2 => R::DX,
        3 => R::BX,
        4 => R::SP,
        5 => R::BP,
        6 => R::SI,
        _ => R::DI,
    }
}

/// segment register from a 2-bit sr field
pub fn sr(v: u8) -> R {
    match v & 0b11 {
        0 => R::ES,
        1 => R::CS,
        2 => R::SS,
        _ => R::DS,
    }
}

/// the eight effective-address base formulas selected by r/m
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AMode {
    BXSI, BXDI, BPSI, BPDI, SI, DI, BP, BX,
}

impl AMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AMode::BXSI => "BX + SI",
            AMode::BXDI => "BX + DI",
            AMode::BPSI => "BP + SI",
            AMode::BPDI => "BP + DI",
            AMode::SI => "SI",
            AMode::DI => "DI",
            AMode::BP => "BP",
            AMode::BX => "BX",
        }
    }

    /// BP-based formulas address the stack segment by default
    pub fn uses_bp(self) -> bool {
        match self {
            AMode::BPSI | AMode::BPDI | AMode::BP => true,
            _ => false,
        }
    }
}

impl fmt::Display for AMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// addressing mode from a 3-bit r/m field
pub fn amode(v: u8) -> AMode {
    match v & 0b111 {
        0 => AMode::BXSI,
        1 => AMode::BXDI,
        2 => AMode::BPSI,
        3 => AMode::BPDI,
        4 => AMode::SI,
        5 => AMode::DI,
        6 => AMode::BP,
        _ => AMode::BX,
    }
}

/// the architectural register state: general registers, segment registers,
/// instruction pointer and status flags
#[derive(Clone, Default)]
pub struct RegisterState {
    pub gpr: [Register16; 8],
    pub sreg: [u16; 4],
    pub ip: u16,
    pub flags: Flags,
}

impl RegisterState {
    pub fn get_r8(&self, r: R) -> u8 {
        match r {
            R::AL | R::CL | R::DL | R::BL => self.gpr[r.index()].lo_u8(),
            R::AH | R::CH | R::DH | R::BH => self.gpr[r.index()].hi_u8(),
            _ => panic!("get_r8 on {:?}", r),
        }
    }

    pub fn set_r8(&mut self, r: R, val: u8) {
        match r {
            R::AL | R::CL | R::DL | R::BL => self.gpr[r.index()].set_lo(val),
            R::AH | R::CH | R::DH | R::BH => self.gpr[r.index()].set_hi(val),
            _ => panic!("set_r8 on {:?}", r),
        }
    }

    pub fn get_r16(&self, r: R) -> u16 {
        match r {
            R::ES | R::CS | R::SS | R::DS => self.sreg[r.index()],
            R::AX | R::CX | R::DX | R::BX | R::SP | R::BP | R::SI | R::DI => {
                self.gpr[r.index()].val
            }
            _ => panic!("get_r16 on {:?}", r),
        }
    }

    pub fn set_r16(&mut self, r: R, val: u16) {
        match r {
            R::ES | R::CS | R::SS | R::DS => self.sreg[r.index()] = val,
            R::AX | R::CX | R::DX | R::BX | R::SP | R::BP | R::SI | R::DI => {
                self.gpr[r.index()].val = val
            }
            _ => panic!("set_r16 on {:?}", r),
        }
    }
}

impl fmt::Display for RegisterState {
    /// the one-line snapshot used by the simulation trace
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "AX:0x{:04x} BX:0x{:04x} CX:0x{:04x} DX:0x{:04x} SP:0x{:04x} BP:0x{:04x} SI:0x{:04x} DI:0x{:04x} IP:0x{:04x} CS:0x{:04x} DS:0x{:04x} SS:0x{:04x} ES:0x{:04x} F:{}",
            self.get_r16(R::AX),
            self.get_r16(R::BX),
            self.get_r16(R::CX),
            self.get_r16(R::DX),
            self.get_r16(R::SP),
            self.get_r16(R::BP),
            self.get_r16(R::SI),
            self.get_r16(R::DI),
            self.ip,
            self.get_r16(R::CS),
            self.get_r16(R::DS),
            self.get_r16(R::SS),
            self.get_r16(R::ES),
            self.flags.field(),
        )
    }
}
