use crate::cpu::instruction::{Instruction, ModRegRm, RepeatMode, SizeHint};
use crate::cpu::op::Op;
use crate::cpu::parameter::{Parameter, ParameterSet, Width};
use crate::cpu::register::{amode, r16, r8, sr, R};
use crate::cpu::segment::Segment;
use crate::error::EmuError;
use crate::memory::MMU;

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

/// Source of instruction bytes. The disassembler decodes straight from the
/// input image; the interpreter fetches through CS:IP. Both feed the same
/// decoder through this seam.
pub trait CodeStream {
    fn read_u8(&mut self) -> Result<u8, EmuError>;
    /// position of the next byte; used for failure tagging and for computing
    /// relative branch targets
    fn pos(&self) -> u32;
}

/// decodes from a raw byte slice; running off the end is a decode failure
pub struct SliceCode<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceCode<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceCode { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl CodeStream for SliceCode<'_> {
    fn read_u8(&mut self) -> Result<u8, EmuError> {
        if self.pos >= self.data.len() {
            return Err(EmuError::PrematureEndOfStream(self.pos as u32));
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn pos(&self) -> u32 {
        self.pos as u32
    }
}

/// fetches code through a segment:offset cursor; the offset wraps at 16 bits
pub struct MemoryCode<'a> {
    mmu: &'a MMU,
    seg: u16,
    offset: u16,
}

impl<'a> MemoryCode<'a> {
    pub fn new(mmu: &'a MMU, seg: u16, offset: u16) -> Self {
        MemoryCode { mmu, seg, offset }
    }
}

impl CodeStream for MemoryCode<'_> {
    fn read_u8(&mut self) -> Result<u8, EmuError> {
        let b = self.mmu.read_u8(self.seg, self.offset);
        self.offset = self.offset.wrapping_add(1);
        Ok(b)
    }

    fn pos(&self) -> u32 {
        u32::from(self.offset)
    }
}

/// ADD/OR/ADC/SBB/AND/SUB/XOR/CMP, in encoding order; selected by bits 5-3
/// of the primary byte or by the reg field of the 0x80 group
const ALU_OPS: [Op; 8] = [
    Op::Add,
    Op::Or,
    Op::Adc,
    Op::Sbb,
    Op::And,
    Op::Sub,
    Op::Xor,
    Op::Cmp,
];

/// the sixteen condition codes of 0111tttn
const JCC_OPS: [Op; 16] = [
    Op::Jo,
    Op::Jno,
    Op::Jb,
    Op::Jae,
    Op::Je,
    Op::Jne,
    Op::Jbe,
    Op::Ja,
    Op::Js,
    Op::Jns,
    Op::Jp,
    Op::Jpo,
    Op::Jl,
    Op::Jge,
    Op::Jle,
    Op::Jg,
];

fn width(b: u8) -> Width {
    if b & 1 != 0 {
        Width::Word
    } else {
        Width::Byte
    }
}

fn size_hint(w: Width) -> SizeHint {
    match w {
        Width::Byte => SizeHint::Byte,
        Width::Word => SizeHint::Word,
    }
}

/// register operand from a 3-bit field plus width, the `w_shifted | reg3`
/// index algebra of the encoding
fn reg_param(w: Width, idx: u8) -> Parameter {
    match w {
        Width::Byte => Parameter::Reg8(r8(idx)),
        Width::Word => Parameter::Reg16(r16(idx)),
    }
}

/// the accumulator at the given width
fn acc_param(w: Width) -> Parameter {
    match w {
        Width::Byte => Parameter::Reg8(R::AL),
        Width::Word => Parameter::Reg16(R::AX),
    }
}

fn ptr_direct(w: Width, seg: Segment, addr: u16) -> Parameter {
    match w {
        Width::Byte => Parameter::Ptr8(seg, addr),
        Width::Word => Parameter::Ptr16(seg, addr),
    }
}

#[derive(Clone, Default)]
pub struct Decoder;

impl Decoder {
    /// decodes the next instruction from the stream, prefixes included
    pub fn get_instruction<S: CodeStream>(&self, stream: &mut S) -> Result<Instruction, EmuError> {
        let start = stream.pos() as u16;
        let mut op = Instruction::new(Op::Uninitialized);
        loop {
            let b = stream.read_u8()?;
            match b {
                0x26 => op.segment_prefix = Segment::ES,
                0x2E => op.segment_prefix = Segment::CS,
                0x36 => op.segment_prefix = Segment::SS,
                0x3E => op.segment_prefix = Segment::DS,
                0xF0 => op.lock = true,
                0xF2 => op.repeat = RepeatMode::Repnz,
                0xF3 => op.repeat = RepeatMode::Repz,
                _ => {
                    self.decode(stream, &mut op, b)?;
                    break;
                }
            }
        }
        op.length = (stream.pos() as u16).wrapping_sub(start) as u8;
        Ok(op)
    }

    /// primary byte dispatch
    fn decode<S: CodeStream>(
        &self,
        stream: &mut S,
        op: &mut Instruction,
        b: u8,
    ) -> Result<(), EmuError> {
        let seg = op.segment_prefix;
        match b {
            // ADD/OR/ADC/SBB/AND/SUB/XOR/CMP: reg <-> r/m and imm -> accumulator
            0x00..=0x05 | 0x08..=0x0D | 0x10..=0x15 | 0x18..=0x1D | 0x20..=0x25 | 0x28..=0x2D
            | 0x30..=0x35 | 0x38..=0x3D => {
                op.command = ALU_OPS[usize::from(b >> 3) & 7];
                match b & 0b111 {
                    0b100 => {
                        op.params.dst = Parameter::Reg8(R::AL);
                        op.params.src = Parameter::ImmS8(stream.read_u8()? as i8);
                    }
                    0b101 => {
                        op.params.dst = Parameter::Reg16(R::AX);
                        op.params.src = Parameter::ImmS16(self.read_u16(stream)? as i16);
                    }
                    _ => op.params = self.rm_r(stream, seg, width(b), b & 0b10 != 0)?,
                }
            }

            // ADD/OR/ADC/SBB/AND/SUB/XOR/CMP imm -> r/m; reg selects the operation
            0x80..=0x83 => {
                let x = self.read_modrm(stream)?;
                op.command = ALU_OPS[usize::from(x.reg)];
                let w = width(b);
                let rm = self.rm_param(stream, &x, seg, w)?;
                // only 0x81 carries a full word immediate; 0x83 sign-extends a byte
                op.params.src = if b == 0x81 {
                    Parameter::ImmS16(self.read_u16(stream)? as i16)
                } else {
                    Parameter::ImmS8(stream.read_u8()? as i8)
                };
                if rm.is_memory() {
                    op.src_size = size_hint(w);
                }
                op.params.dst = rm;
            }

            // PUSH/POP segment register
            0x06 | 0x0E | 0x16 | 0x1E => {
                op.command = Op::Push;
                op.params.dst = Parameter::SReg16(sr(b >> 3));
            }
            0x07 | 0x0F | 0x17 | 0x1F => {
                op.command = Op::Pop;
                op.params.dst = Parameter::SReg16(sr(b >> 3));
            }

            0x27 => op.command = Op::Daa,
            0x2F => op.command = Op::Das,
            0x37 => op.command = Op::Aaa,
            0x3F => op.command = Op::Aas,

            0x40..=0x47 => {
                op.command = Op::Inc;
                op.params.dst = Parameter::Reg16(r16(b));
            }
            0x48..=0x4F => {
                op.command = Op::Dec;
                op.params.dst = Parameter::Reg16(r16(b));
            }
            0x50..=0x57 => {
                op.command = Op::Push;
                op.params.dst = Parameter::Reg16(r16(b));
            }
            0x58..=0x5F => {
                op.command = Op::Pop;
                op.params.dst = Parameter::Reg16(r16(b));
            }

            // short conditional jumps
            0x70..=0x7F => {
                op.command = JCC_OPS[usize::from(b) & 0xF];
                op.params.dst = Parameter::Rel8(stream.read_u8()? as i8);
            }

            // TEST r/m, reg
            0x84 | 0x85 => {
                op.command = Op::Test;
                let x = self.read_modrm(stream)?;
                let w = width(b);
                op.params.dst = self.rm_param(stream, &x, seg, w)?;
                op.params.src = reg_param(w, x.reg);
            }

            // XCHG reg, r/m
            0x86 | 0x87 => {
                op.command = Op::Xchg;
                let x = self.read_modrm(stream)?;
                let w = width(b);
                let rm = self.rm_param(stream, &x, seg, w)?;
                op.params.dst = reg_param(w, x.reg);
                op.params.src = rm;
            }

            // MOV reg <-> r/m
            0x88..=0x8B => {
                op.command = Op::Mov;
                op.params = self.rm_r(stream, seg, width(b), b & 0b10 != 0)?;
            }

            // MOV r/m16 <- sreg, MOV sreg <- r/m16
            0x8C | 0x8E => {
                op.command = Op::Mov;
                let x = self.read_modrm(stream)?;
                if x.reg & 0b100 != 0 {
                    return Err(EmuError::InvalidParameters(
                        stream.pos().wrapping_sub(1),
                        "invalid segment register",
                    ));
                }
                let rm = self.rm_param(stream, &x, seg, Width::Word)?;
                let sreg = Parameter::SReg16(sr(x.reg));
                if b == 0x8C {
                    op.params = ParameterSet { dst: rm, src: sreg };
                } else {
                    op.params = ParameterSet { dst: sreg, src: rm };
                }
            }

            // LEA reg16, mem
            0x8D => {
                op.command = Op::Lea;
                let x = self.read_modrm(stream)?;
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm_param(stream, &x, seg, Width::Word)?;
            }

            // POP r/m16
            0x8F => {
                op.command = Op::Pop;
                let x = self.read_modrm(stream)?;
                if x.reg != 0 {
                    return Err(EmuError::InvalidParameters(
                        stream.pos().wrapping_sub(1),
                        "invalid instruction in register portion",
                    ));
                }
                let rm = self.rm_param(stream, &x, seg, Width::Word)?;
                if rm.is_memory() {
                    op.dst_size = SizeHint::Word;
                }
                op.params.dst = rm;
            }

            // XCHG AX, reg
            0x90..=0x97 => {
                op.command = Op::Xchg;
                op.params.dst = Parameter::Reg16(R::AX);
                op.params.src = Parameter::Reg16(r16(b));
            }

            0x98 => op.command = Op::Cbw,
            0x99 => op.command = Op::Cwd,

            // CALL far direct
            0x9A => {
                op.command = Op::CallFar;
                let offset = self.read_u16(stream)?;
                let segment = self.read_u16(stream)?;
                op.params.dst = Parameter::Ptr16Imm(segment, offset);
            }

            0x9B => op.command = Op::Wait,
            0x9C => op.command = Op::Pushf,
            0x9D => op.command = Op::Popf,
            0x9E => op.command = Op::Sahf,
            0x9F => op.command = Op::Lahf,

            // MOV accumulator <-> direct memory
            0xA0 | 0xA1 => {
                op.command = Op::Mov;
                let w = width(b);
                let addr = self.read_u16(stream)?;
                op.params.dst = acc_param(w);
                op.params.src = ptr_direct(w, seg, addr);
            }
            0xA2 | 0xA3 => {
                op.command = Op::Mov;
                let w = width(b);
                let addr = self.read_u16(stream)?;
                op.params.dst = ptr_direct(w, seg, addr);
                op.params.src = acc_param(w);
            }

            0xA4 => op.command = Op::Movsb,
            0xA5 => op.command = Op::Movsw,
            0xA6 => op.command = Op::Cmpsb,
            0xA7 => op.command = Op::Cmpsw,

            // TEST accumulator, imm
            0xA8 | 0xA9 => {
                op.command = Op::Test;
                let w = width(b);
                op.params.dst = acc_param(w);
                op.params.src = self.imm_signed(stream, w)?;
            }

            0xAA => op.command = Op::Stosb,
            0xAB => op.command = Op::Stosw,
            0xAC => op.command = Op::Lodsb,
            0xAD => op.command = Op::Lodsw,
            0xAE => op.command = Op::Scasb,
            0xAF => op.command = Op::Scasw,

            // MOV reg, imm
            0xB0..=0xB7 => {
                op.command = Op::Mov;
                op.params.dst = Parameter::Reg8(r8(b));
                op.params.src = Parameter::Imm8(stream.read_u8()?);
            }
            0xB8..=0xBF => {
                op.command = Op::Mov;
                op.params.dst = Parameter::Reg16(r16(b));
                op.params.src = Parameter::Imm16(self.read_u16(stream)?);
            }

            // RET, intra and inter segment, with and without stack adjust
            0xC2 => {
                op.command = Op::Retn;
                op.params.dst = Parameter::Imm16(self.read_u16(stream)?);
            }
            0xC3 => op.command = Op::Retn,
            0xCA => {
                op.command = Op::Retf;
                op.params.dst = Parameter::Imm16(self.read_u16(stream)?);
            }
            0xCB => op.command = Op::Retf,

            // LES/LDS reg16, mem
            0xC4 | 0xC5 => {
                op.command = if b == 0xC4 { Op::Les } else { Op::Lds };
                let x = self.read_modrm(stream)?;
                op.params.dst = Parameter::Reg16(r16(x.reg));
                op.params.src = self.rm_param(stream, &x, seg, Width::Word)?;
            }

            // MOV r/m, imm
            0xC6 | 0xC7 => {
                op.command = Op::Mov;
                let x = self.read_modrm(stream)?;
                if x.reg != 0 {
                    return Err(EmuError::InvalidParameters(
                        stream.pos().wrapping_sub(1),
                        "invalid instruction in register portion",
                    ));
                }
                let w = width(b);
                let rm = self.rm_param(stream, &x, seg, w)?;
                op.params.src = self.imm_signed(stream, w)?;
                if rm.is_memory() {
                    op.src_size = size_hint(w);
                }
                op.params.dst = rm;
            }

            0xCC => op.command = Op::Int3,
            0xCD => {
                op.command = Op::Int;
                op.params.dst = Parameter::Imm8(stream.read_u8()?);
            }
            0xCE => op.command = Op::Into,
            0xCF => op.command = Op::Iret,

            // ROL/ROR/RCL/RCR/SHL/SHR/SAR; count is 1 or CL
            0xD0..=0xD3 => {
                let x = self.read_modrm(stream)?;
                op.command = match x.reg {
                    0 => Op::Rol,
                    1 => Op::Ror,
                    2 => Op::Rcl,
                    3 => Op::Rcr,
                    4 => Op::Shl,
                    5 => Op::Shr,
                    7 => Op::Sar,
                    _ => return Err(EmuError::InvalidInstruction(stream.pos().wrapping_sub(1))),
                };
                let w = width(b);
                let rm = self.rm_param(stream, &x, seg, w)?;
                if rm.is_memory() {
                    op.dst_size = size_hint(w);
                }
                op.params.dst = rm;
                op.params.src = if b & 0b10 != 0 {
                    Parameter::Reg8(R::CL)
                } else {
                    Parameter::Imm8(1)
                };
            }

            // AAM/AAD carry a literal 0x0A operand byte
            0xD4 | 0xD5 => {
                op.command = if b == 0xD4 { Op::Aam } else { Op::Aad };
                if stream.read_u8()? != 0x0A {
                    return Err(EmuError::InvalidParameters(
                        stream.pos().wrapping_sub(1),
                        "missing 0x0A literal",
                    ));
                }
            }

            0xD7 => op.command = Op::Xlat,

            // coprocessor escape; low 3 opcode bits and the reg field form a
            // 6-bit external opcode
            0xD8..=0xDF => {
                op.command = Op::Esc;
                let x = self.read_modrm(stream)?;
                op.params.dst = Parameter::Imm8((b & 0b111) << 3 | x.reg);
                op.params.src = self.rm_param(stream, &x, seg, Width::Word)?;
            }

            0xE0 => {
                op.command = Op::Loopne;
                op.params.dst = Parameter::Rel8(stream.read_u8()? as i8);
            }
            0xE1 => {
                op.command = Op::Loope;
                op.params.dst = Parameter::Rel8(stream.read_u8()? as i8);
            }
            0xE2 => {
                op.command = Op::Loop;
                op.params.dst = Parameter::Rel8(stream.read_u8()? as i8);
            }
            0xE3 => {
                op.command = Op::Jcxz;
                op.params.dst = Parameter::Rel8(stream.read_u8()? as i8);
            }

            // IN/OUT, fixed and variable port
            0xE4 | 0xE5 => {
                op.command = Op::In;
                op.params.dst = acc_param(width(b));
                op.params.src = Parameter::Imm8(stream.read_u8()?);
            }
            0xE6 | 0xE7 => {
                op.command = Op::Out;
                op.params.dst = Parameter::Imm8(stream.read_u8()?);
                op.params.src = acc_param(width(b));
            }
            0xEC | 0xED => {
                op.command = Op::In;
                op.params.dst = acc_param(width(b));
                op.params.src = Parameter::Reg16(R::DX);
            }
            0xEE | 0xEF => {
                op.command = Op::Out;
                op.params.dst = Parameter::Reg16(R::DX);
                op.params.src = acc_param(width(b));
            }

            // CALL/JMP near direct; the stored target is absolute
            0xE8 | 0xE9 => {
                op.command = if b == 0xE8 { Op::CallNear } else { Op::JmpNear };
                let disp = self.read_u16(stream)?;
                op.params.dst = Parameter::Imm16((stream.pos() as u16).wrapping_add(disp));
            }
            // JMP far direct: offset word first, segment word second
            0xEA => {
                op.command = Op::JmpFar;
                let offset = self.read_u16(stream)?;
                let segment = self.read_u16(stream)?;
                op.params.dst = Parameter::Ptr16Imm(segment, offset);
            }
            0xEB => {
                op.command = Op::JmpShort;
                op.params.dst = Parameter::Rel8(stream.read_u8()? as i8);
            }

            0xF4 => op.command = Op::Hlt,
            0xF5 => op.command = Op::Cmc,

            // TEST/NOT/NEG/MUL/IMUL/DIV/IDIV r/m
            0xF6 | 0xF7 => {
                let x = self.read_modrm(stream)?;
                let w = width(b);
                op.command = match x.reg {
                    0 => Op::Test,
                    2 => Op::Not,
                    3 => Op::Neg,
                    4 => Op::Mul,
                    5 => Op::Imul,
                    6 => Op::Div,
                    7 => Op::Idiv,
                    _ => return Err(EmuError::InvalidInstruction(stream.pos().wrapping_sub(1))),
                };
                let rm = self.rm_param(stream, &x, seg, w)?;
                if x.reg == 0 {
                    op.params.src = self.imm_signed(stream, w)?;
                    if rm.is_memory() {
                        op.src_size = size_hint(w);
                    }
                } else if rm.is_memory() {
                    op.dst_size = size_hint(w);
                }
                op.params.dst = rm;
            }

            0xF8 => op.command = Op::Clc,
            0xF9 => op.command = Op::Stc,
            0xFA => op.command = Op::Cli,
            0xFB => op.command = Op::Sti,
            0xFC => op.command = Op::Cld,
            0xFD => op.command = Op::Std,

            // INC/DEC/CALL/CALL far/JMP/JMP far/PUSH r/m
            0xFE | 0xFF => {
                let x = self.read_modrm(stream)?;
                let wide = b & 1 != 0;
                if x.reg == 0b111 || (!wide && x.reg & 0b110 != 0) {
                    return Err(EmuError::InvalidInstruction(stream.pos().wrapping_sub(1)));
                }
                let w = width(b);
                let rm = self.rm_param(stream, &x, seg, w)?;
                let mem = rm.is_memory();
                op.command = match x.reg {
                    0 => Op::Inc,
                    1 => Op::Dec,
                    2 => Op::CallNear,
                    3 => Op::CallFar,
                    4 => Op::JmpNear,
                    5 => Op::JmpFar,
                    _ => Op::Push,
                };
                match x.reg {
                    // near transfers need no size keyword
                    2 | 4 => {}
                    // far transfers through memory are size-ambiguous
                    3 | 5 => {
                        if mem {
                            op.dst_size = SizeHint::Far;
                        }
                    }
                    _ => {
                        if mem {
                            op.dst_size = size_hint(w);
                        }
                    }
                }
                op.params.dst = rm;
            }

            _ => return Err(EmuError::InvalidInstruction(stream.pos().wrapping_sub(1))),
        }
        Ok(())
    }

    fn read_u16<S: CodeStream>(&self, stream: &mut S) -> Result<u16, EmuError> {
        let lo = stream.read_u8()?;
        let hi = stream.read_u8()?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    fn read_modrm<S: CodeStream>(&self, stream: &mut S) -> Result<ModRegRm, EmuError> {
        Ok(ModRegRm::parse(stream.read_u8()?))
    }

    fn imm_signed<S: CodeStream>(&self, stream: &mut S, w: Width) -> Result<Parameter, EmuError> {
        Ok(match w {
            Width::Byte => Parameter::ImmS8(stream.read_u8()? as i8),
            Width::Word => Parameter::ImmS16(self.read_u16(stream)? as i16),
        })
    }

    /// the common reg <-> r/m parameter pair; `reg_is_dst` is the d bit
    fn rm_r<S: CodeStream>(
        &self,
        stream: &mut S,
        seg: Segment,
        w: Width,
        reg_is_dst: bool,
    ) -> Result<ParameterSet, EmuError> {
        let x = self.read_modrm(stream)?;
        let rm = self.rm_param(stream, &x, seg, w)?;
        let reg = reg_param(w, x.reg);
        Ok(if reg_is_dst {
            ParameterSet { dst: reg, src: rm }
        } else {
            ParameterSet { dst: rm, src: reg }
        })
    }

    /// The effective-address resolver: turns mod/r/m plus any displacement
    /// into a register or memory operand. Memory operands carry the segment
    /// override in force.
    fn rm_param<S: CodeStream>(
        &self,
        stream: &mut S,
        x: &ModRegRm,
        seg: Segment,
        w: Width,
    ) -> Result<Parameter, EmuError> {
        match x.md {
            0b00 => {
                // r/m 110 is a 16-bit direct address instead of [BP]
                if x.rm == 0b110 {
                    let addr = self.read_u16(stream)?;
                    return Ok(ptr_direct(w, seg, addr));
                }
                Ok(match w {
                    Width::Byte => Parameter::Ptr8Amode(seg, amode(x.rm)),
                    Width::Word => Parameter::Ptr16Amode(seg, amode(x.rm)),
                })
            }
            0b01 => {
                let disp = stream.read_u8()? as i8;
                Ok(match w {
                    Width::Byte => Parameter::Ptr8AmodeS8(seg, amode(x.rm), disp),
                    Width::Word => Parameter::Ptr16AmodeS8(seg, amode(x.rm), disp),
                })
            }
            0b10 => {
                let disp = self.read_u16(stream)? as i16;
                Ok(match w {
                    Width::Byte => Parameter::Ptr8AmodeS16(seg, amode(x.rm), disp),
                    Width::Word => Parameter::Ptr16AmodeS16(seg, amode(x.rm), disp),
                })
            }
            _ => Ok(reg_param(w, x.rm)),
        }
    }
}
