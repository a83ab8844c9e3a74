use crate::cpu::cycles::{ea_cycles, Cycles};
use crate::cpu::instruction::Instruction;
use crate::cpu::op::Op;
use crate::cpu::parameter::{Parameter, Width};
use crate::cpu::register::R;
use crate::cpu::CPU;
use crate::error::EmuError;
use crate::memory::{phys, MMU};

#[cfg(test)]
#[path = "./interpreter_test.rs"]
mod interpreter_test;

/// how an instruction touches its memory operand, for the odd-address
/// penalty rule
#[derive(Copy, Clone, PartialEq)]
enum Access {
    Read,
    Write,
    ReadWrite,
}

impl CPU {
    /// Executes one decoded instruction against the given memory. IP is moved
    /// past the instruction up front; branch handlers overwrite it. Returns
    /// the cycle cost of the step.
    pub fn execute(&mut self, mmu: &mut MMU, op: &Instruction) -> Result<Cycles, EmuError> {
        let addr = phys(self.get_r16(R::CS), self.regs.ip);
        self.regs.ip = self.regs.ip.wrapping_add(u16::from(op.length));
        self.instruction_count += 1;
        let cycles = self.dispatch(mmu, op, addr)?;
        self.cycle_count += cycles.total();
        Ok(cycles)
    }

    fn dispatch(&mut self, mmu: &mut MMU, op: &Instruction, addr: u32) -> Result<Cycles, EmuError> {
        match op.command {
            Op::Mov => {
                let v = self.read_parameter_value(mmu, &op.params.src);
                self.write_parameter(mmu, &op.params.dst, v);
                Ok(self.mov_cycles(op))
            }

            Op::Add | Op::Adc | Op::Sub | Op::Sbb | Op::And | Op::Or | Op::Xor => {
                let w = op.params.dst.width();
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = self.read_parameter_value(mmu, &op.params.src);
                let res = match op.command {
                    Op::Add => self.add(dst, src, w),
                    Op::Adc => self.adc(dst, src, w),
                    Op::Sub => self.sub(dst, src, w),
                    Op::Sbb => self.sbb(dst, src, w),
                    Op::And => {
                        let res = dst & src & w.max();
                        self.logic_flags(res, w);
                        res
                    }
                    Op::Or => {
                        let res = (dst | src) & w.max();
                        self.logic_flags(res, w);
                        res
                    }
                    _ => {
                        let res = (dst ^ src) & w.max();
                        self.logic_flags(res, w);
                        res
                    }
                };
                self.write_parameter(mmu, &op.params.dst, res);
                Ok(self.alu_cycles(op))
            }

            // CMP is SUB with the writeback suppressed
            Op::Cmp => {
                let w = op.params.dst.width();
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = self.read_parameter_value(mmu, &op.params.src);
                self.sub(dst, src, w);
                Ok(self.cmp_cycles(op))
            }

            Op::Test => {
                let w = op.params.dst.width();
                let dst = self.read_parameter_value(mmu, &op.params.dst);
                let src = self.read_parameter_value(mmu, &op.params.src);
                let res = dst & src & w.max();
                self.logic_flags(res, w);
                Ok(self.test_cycles(op))
            }

            Op::Inc | Op::Dec => {
                let w = op.params.dst.width();
                let v = self.read_parameter_value(mmu, &op.params.dst);
                let res = if op.command == Op::Inc {
                    self.inc(v, w)
                } else {
                    self.dec(v, w)
                };
                self.write_parameter(mmu, &op.params.dst, res);
                let reg_cycles = if w == Width::Word { 2 } else { 3 };
                Ok(self.rm_cost(&op.params.dst, reg_cycles, 15, Access::ReadWrite))
            }

            // NOT touches no flags
            Op::Not => {
                let w = op.params.dst.width();
                let v = self.read_parameter_value(mmu, &op.params.dst);
                self.write_parameter(mmu, &op.params.dst, !v & w.max());
                Ok(self.rm_cost(&op.params.dst, 3, 16, Access::ReadWrite))
            }

            Op::Neg => {
                let w = op.params.dst.width();
                let v = self.read_parameter_value(mmu, &op.params.dst);
                let res = self.sub(0, v, w);
                self.write_parameter(mmu, &op.params.dst, res);
                Ok(self.rm_cost(&op.params.dst, 3, 16, Access::ReadWrite))
            }

            Op::Xchg => {
                let a = self.read_parameter_value(mmu, &op.params.dst);
                let b = self.read_parameter_value(mmu, &op.params.src);
                self.write_parameter(mmu, &op.params.dst, b);
                self.write_parameter(mmu, &op.params.src, a);
                if op.params.src.is_memory() {
                    Ok(self.rm_cost(&op.params.src, 4, 17, Access::ReadWrite))
                } else if op.params.dst == Parameter::Reg16(R::AX) {
                    Ok(Cycles::base(3))
                } else {
                    Ok(Cycles::base(4))
                }
            }

            Op::Push => {
                let v = self.read_parameter_value(mmu, &op.params.dst);
                self.push16(mmu, v);
                Ok(match op.params.dst {
                    Parameter::SReg16(_) => Cycles::base(10),
                    Parameter::Reg16(_) => Cycles::base(11),
                    ref p => self.rm_cost(p, 11, 16, Access::Read),
                })
            }

            Op::Pop => {
                let v = self.pop16(mmu);
                self.write_parameter(mmu, &op.params.dst, v);
                Ok(match op.params.dst {
                    Parameter::SReg16(_) | Parameter::Reg16(_) => Cycles::base(8),
                    ref p => self.rm_cost(p, 8, 17, Access::Write),
                })
            }

            Op::Pushf => {
                let flags = self.regs.flags.u16();
                self.push16(mmu, flags);
                Ok(Cycles::base(10))
            }

            Op::Popf => {
                let v = self.pop16(mmu);
                self.regs.flags.set_u16(v);
                Ok(Cycles::base(8))
            }

            Op::Sahf => {
                let ah = self.get_r8(R::AH);
                self.regs.flags.set_lo8(ah);
                Ok(Cycles::base(4))
            }

            Op::Lahf => {
                let flags = (self.regs.flags.u16() & 0xFF) as u8;
                self.set_r8(R::AH, flags);
                Ok(Cycles::base(4))
            }

            Op::Xlat => {
                let seg = self.get_r16(op.segment_prefix.as_register());
                let off = self
                    .get_r16(R::BX)
                    .wrapping_add(u16::from(self.get_r8(R::AL)));
                let v = mmu.read_u8(seg, off);
                self.set_r8(R::AL, v);
                Ok(Cycles::base(11))
            }

            Op::Lea => {
                if !op.params.src.is_memory() {
                    return Err(EmuError::InvalidParameters(addr, "memory operand required"));
                }
                let (_, off) = self.parameter_address(&op.params.src);
                self.write_parameter(mmu, &op.params.dst, off);
                Ok(Cycles {
                    base: 2,
                    ea: ea_cycles(&op.params.src),
                    penalty: 0,
                })
            }

            // offset word at the effective address, segment word after it
            Op::Lds | Op::Les => {
                if !op.params.src.is_memory() {
                    return Err(EmuError::InvalidParameters(addr, "memory operand required"));
                }
                let (seg, off) = self.parameter_address(&op.params.src);
                let value = mmu.read_u16(seg, off);
                let selector = mmu.read_u16(seg, off.wrapping_add(2));
                self.write_parameter(mmu, &op.params.dst, value);
                let target = if op.command == Op::Lds { R::DS } else { R::ES };
                self.set_r16(target, selector);
                Ok(Cycles {
                    base: 16,
                    ea: ea_cycles(&op.params.src),
                    penalty: self.mem_penalty(&op.params.src, Access::Read),
                })
            }

            Op::Cbw => {
                let al = self.get_r8(R::AL);
                self.set_r16(R::AX, al as i8 as i16 as u16);
                Ok(Cycles::base(2))
            }

            Op::Cwd => {
                let dx = if self.get_r16(R::AX) & 0x8000 != 0 {
                    0xFFFF
                } else {
                    0
                };
                self.set_r16(R::DX, dx);
                Ok(Cycles::base(5))
            }

            Op::Jo | Op::Jno | Op::Jb | Op::Jae | Op::Je | Op::Jne | Op::Jbe | Op::Ja | Op::Js
            | Op::Jns | Op::Jp | Op::Jpo | Op::Jl | Op::Jge | Op::Jle | Op::Jg => {
                let taken = self.condition(op.command);
                if taken {
                    self.jump_rel8(op);
                }
                Ok(Cycles::base(if taken { 16 } else { 4 }))
            }

            Op::Loop | Op::Loope | Op::Loopne => {
                let cx = self.get_r16(R::CX).wrapping_sub(1);
                self.set_r16(R::CX, cx);
                let zero = self.regs.flags.zero;
                let (taken, base) = match op.command {
                    Op::Loop => (cx != 0, [5, 17]),
                    Op::Loopne => (cx != 0 && !zero, [6, 18]),
                    _ => (cx != 0 && zero, [7, 19]),
                };
                if taken {
                    self.jump_rel8(op);
                }
                Ok(Cycles::base(base[taken as usize]))
            }

            Op::Jcxz => {
                let taken = self.get_r16(R::CX) == 0;
                if taken {
                    self.jump_rel8(op);
                }
                Ok(Cycles::base(if taken { 18 } else { 6 }))
            }

            Op::JmpShort => {
                self.jump_rel8(op);
                Ok(Cycles::base(15))
            }

            Op::JmpNear => match op.params.dst {
                Parameter::Imm16(target) => {
                    self.regs.ip = target;
                    Ok(Cycles::base(15))
                }
                ref p => {
                    self.regs.ip = self.read_parameter_value(mmu, p);
                    Ok(self.rm_cost(p, 11, 18, Access::Read))
                }
            },

            Op::CallNear => {
                let target = match op.params.dst {
                    Parameter::Imm16(target) => target,
                    ref p => self.read_parameter_value(mmu, p),
                };
                let ret = self.regs.ip;
                self.push16(mmu, ret);
                self.regs.ip = target;
                Ok(match op.params.dst {
                    Parameter::Imm16(_) => Cycles::base(15),
                    ref p => self.rm_cost(p, 16, 21, Access::Read),
                })
            }

            Op::JmpFar | Op::CallFar => {
                let far_call = op.command == Op::CallFar;
                let (segment, offset, cycles) = match op.params.dst {
                    Parameter::Ptr16Imm(segment, offset) => {
                        (segment, offset, Cycles::base(if far_call { 28 } else { 15 }))
                    }
                    ref p if p.is_memory() => {
                        let (sv, o) = self.parameter_address(p);
                        let offset = mmu.read_u16(sv, o);
                        let segment = mmu.read_u16(sv, o.wrapping_add(2));
                        let base = if far_call { 37 } else { 24 };
                        (
                            segment,
                            offset,
                            Cycles {
                                base,
                                ea: ea_cycles(p),
                                penalty: self.mem_penalty(p, Access::Read),
                            },
                        )
                    }
                    _ => {
                        return Err(EmuError::Unsupported(
                            addr,
                            "inter-segment transfer through a register",
                        ))
                    }
                };
                if far_call {
                    let cs = self.get_r16(R::CS);
                    let ip = self.regs.ip;
                    self.push16(mmu, cs);
                    self.push16(mmu, ip);
                }
                self.set_r16(R::CS, segment);
                self.regs.ip = offset;
                Ok(cycles)
            }

            Op::Retn => {
                self.regs.ip = self.pop16(mmu);
                if let Parameter::Imm16(n) = op.params.dst {
                    let sp = self.get_r16(R::SP).wrapping_add(n);
                    self.set_r16(R::SP, sp);
                    Ok(Cycles::base(12))
                } else {
                    Ok(Cycles::base(8))
                }
            }

            Op::Retf => {
                self.regs.ip = self.pop16(mmu);
                let cs = self.pop16(mmu);
                self.set_r16(R::CS, cs);
                if let Parameter::Imm16(n) = op.params.dst {
                    let sp = self.get_r16(R::SP).wrapping_add(n);
                    self.set_r16(R::SP, sp);
                    Ok(Cycles::base(17))
                } else {
                    Ok(Cycles::base(18))
                }
            }

            Op::Clc => {
                self.regs.flags.carry = false;
                Ok(Cycles::base(2))
            }
            Op::Stc => {
                self.regs.flags.carry = true;
                Ok(Cycles::base(2))
            }
            Op::Cmc => {
                self.regs.flags.carry = !self.regs.flags.carry;
                Ok(Cycles::base(2))
            }
            Op::Cli => {
                self.regs.flags.interrupt = false;
                Ok(Cycles::base(2))
            }
            Op::Sti => {
                self.regs.flags.interrupt = true;
                Ok(Cycles::base(2))
            }
            Op::Cld => {
                self.regs.flags.direction = false;
                Ok(Cycles::base(2))
            }
            Op::Std => {
                self.regs.flags.direction = true;
                Ok(Cycles::base(2))
            }

            Op::Hlt => Ok(Cycles::base(2)),
            Op::Wait => Ok(Cycles::base(3)),

            // no coprocessor attached; the operand fetch still happens
            Op::Esc => Ok(if op.params.src.is_memory() {
                Cycles {
                    base: 8,
                    ea: ea_cycles(&op.params.src),
                    penalty: self.mem_penalty(&op.params.src, Access::Read),
                }
            } else {
                Cycles::base(2)
            }),

            Op::In | Op::Out => Err(EmuError::Unsupported(
                addr,
                "port I/O execution not implemented",
            )),
            Op::Int | Op::Int3 | Op::Into | Op::Iret => Err(EmuError::Unsupported(
                addr,
                "interrupt execution not implemented",
            )),
            Op::Mul | Op::Imul | Op::Div | Op::Idiv => Err(EmuError::Unsupported(
                addr,
                "multiply/divide execution not implemented",
            )),
            Op::Rol | Op::Ror | Op::Rcl | Op::Rcr | Op::Shl | Op::Shr | Op::Sar => Err(
                EmuError::Unsupported(addr, "shift/rotate execution not implemented"),
            ),
            Op::Movsb | Op::Movsw | Op::Cmpsb | Op::Cmpsw | Op::Scasb | Op::Scasw | Op::Lodsb
            | Op::Lodsw | Op::Stosb | Op::Stosw => Err(EmuError::Unsupported(
                addr,
                "string primitive execution not implemented",
            )),
            Op::Aaa | Op::Aas | Op::Aam | Op::Aad | Op::Daa | Op::Das => Err(EmuError::Unsupported(
                addr,
                "decimal adjust execution not implemented",
            )),

            Op::Uninitialized => Err(EmuError::InvalidInstruction(addr)),
        }
    }

    fn condition(&self, op: Op) -> bool {
        let f = &self.regs.flags;
        match op {
            Op::Jo => f.overflow,
            Op::Jno => !f.overflow,
            Op::Jb => f.carry,
            Op::Jae => !f.carry,
            Op::Je => f.zero,
            Op::Jne => !f.zero,
            Op::Jbe => f.carry || f.zero,
            Op::Ja => !f.carry && !f.zero,
            Op::Js => f.sign,
            Op::Jns => !f.sign,
            Op::Jp => f.parity,
            Op::Jpo => !f.parity,
            Op::Jl => f.sign != f.overflow,
            Op::Jge => f.sign == f.overflow,
            Op::Jle => f.sign != f.overflow || f.zero,
            Op::Jg => f.sign == f.overflow && !f.zero,
            _ => unreachable!(),
        }
    }

    /// IP is already past the instruction; add the signed displacement
    fn jump_rel8(&mut self, op: &Instruction) {
        if let Parameter::Rel8(disp) = op.params.dst {
            self.regs.ip = self.regs.ip.wrapping_add(disp as i16 as u16);
        }
    }

    fn add(&mut self, dst: u16, src: u16, w: Width) -> u16 {
        let max = u32::from(w.max());
        let a = u32::from(dst) & max;
        let b = u32::from(src) & max;
        let sum = a + b;
        let res = (sum & max) as u16;
        let sign = u32::from(w.sign_bit());
        self.regs.flags.carry = sum > max;
        self.regs.flags.auxiliary_carry = (a & 0xF) + (b & 0xF) > 0xF;
        self.regs.flags.overflow = (u32::from(res) ^ a) & (u32::from(res) ^ b) & sign != 0;
        self.regs.flags.set_szp(res, w);
        res
    }

    /// subtraction is addition of the two's-complement negation, with the
    /// carry and nibble-borrow tests replacing the additive ones
    fn sub(&mut self, dst: u16, src: u16, w: Width) -> u16 {
        let neg = (src ^ w.max()).wrapping_add(1) & w.max();
        let res = self.add(dst, neg, w);
        let a = dst & w.max();
        let b = src & w.max();
        self.regs.flags.carry = a < b;
        self.regs.flags.auxiliary_carry = (a & 0xF) < (b & 0xF);
        res
    }

    fn adc(&mut self, dst: u16, src: u16, w: Width) -> u16 {
        let max = u32::from(w.max());
        let a = u32::from(dst) & max;
        let b = u32::from(src) & max;
        let c = u32::from(self.regs.flags.carry);
        let sum = a + b + c;
        let res = (sum & max) as u16;
        let sign = u32::from(w.sign_bit());
        self.regs.flags.carry = sum > max;
        self.regs.flags.auxiliary_carry = (a & 0xF) + (b & 0xF) + c > 0xF;
        self.regs.flags.overflow = !(a ^ b) & (a ^ u32::from(res)) & sign != 0;
        self.regs.flags.set_szp(res, w);
        res
    }

    fn sbb(&mut self, dst: u16, src: u16, w: Width) -> u16 {
        let max = u32::from(w.max());
        let a = u32::from(dst) & max;
        let b = u32::from(src) & max;
        let c = u32::from(self.regs.flags.carry);
        let res = (a.wrapping_sub(b).wrapping_sub(c) & max) as u16;
        let sign = u32::from(w.sign_bit());
        self.regs.flags.carry = b + c > a;
        self.regs.flags.auxiliary_carry = (b & 0xF) + c > (a & 0xF);
        self.regs.flags.overflow = (a ^ b) & (a ^ u32::from(res)) & sign != 0;
        self.regs.flags.set_szp(res, w);
        res
    }

    /// AND/OR/XOR/TEST: CF, OF and AF cleared, SZP from the result
    fn logic_flags(&mut self, res: u16, w: Width) {
        self.regs.flags.carry = false;
        self.regs.flags.overflow = false;
        self.regs.flags.auxiliary_carry = false;
        self.regs.flags.set_szp(res, w);
    }

    /// INC and DEC leave the carry flag untouched
    fn inc(&mut self, v: u16, w: Width) -> u16 {
        let carry = self.regs.flags.carry;
        let res = self.add(v, 1, w);
        self.regs.flags.carry = carry;
        res
    }

    fn dec(&mut self, v: u16, w: Width) -> u16 {
        let carry = self.regs.flags.carry;
        let res = self.sub(v, 1, w);
        self.regs.flags.carry = carry;
        res
    }

    /// base cost of a r/m operand, plus EA time and odd-address penalty when
    /// it lives in memory
    fn rm_cost(&self, p: &Parameter, reg_cycles: usize, mem_cycles: usize, access: Access) -> Cycles {
        if !p.is_memory() {
            return Cycles::base(reg_cycles);
        }
        Cycles {
            base: mem_cycles,
            ea: ea_cycles(p),
            penalty: self.mem_penalty(p, access),
        }
    }

    /// a word access at an odd offset costs 4 extra cycles, 8 when the
    /// operand is both read and written
    fn mem_penalty(&self, p: &Parameter, access: Access) -> usize {
        if !p.is_memory() || p.width() != Width::Word {
            return 0;
        }
        let (_, off) = self.parameter_address(p);
        if off & 1 == 0 {
            return 0;
        }
        match access {
            Access::ReadWrite => 8,
            _ => 4,
        }
    }

    fn mov_cycles(&self, op: &Instruction) -> Cycles {
        let p = &op.params;
        // the accumulator <-> direct memory encodings carry the address in
        // the instruction and pay no EA time
        if (is_acc(&p.dst) && is_direct(&p.src)) || (is_acc(&p.src) && is_direct(&p.dst)) {
            let (mem, access) = if p.dst.is_memory() {
                (&p.dst, Access::Write)
            } else {
                (&p.src, Access::Read)
            };
            return Cycles {
                base: 10,
                ea: 0,
                penalty: self.mem_penalty(mem, access),
            };
        }
        if p.src.is_imm() {
            return self.rm_cost(&p.dst, 4, 10, Access::Write);
        }
        if p.dst.is_memory() {
            self.rm_cost(&p.dst, 2, 9, Access::Write)
        } else {
            self.rm_cost(&p.src, 2, 8, Access::Read)
        }
    }

    fn alu_cycles(&self, op: &Instruction) -> Cycles {
        let p = &op.params;
        if p.src.is_imm() {
            return self.rm_cost(&p.dst, 4, 17, Access::ReadWrite);
        }
        if p.dst.is_memory() {
            self.rm_cost(&p.dst, 3, 16, Access::ReadWrite)
        } else {
            self.rm_cost(&p.src, 3, 9, Access::Read)
        }
    }

    fn cmp_cycles(&self, op: &Instruction) -> Cycles {
        let p = &op.params;
        if p.src.is_imm() {
            return self.rm_cost(&p.dst, 4, 10, Access::Read);
        }
        if p.dst.is_memory() {
            self.rm_cost(&p.dst, 3, 9, Access::Read)
        } else {
            self.rm_cost(&p.src, 3, 9, Access::Read)
        }
    }

    fn test_cycles(&self, op: &Instruction) -> Cycles {
        let p = &op.params;
        if p.src.is_imm() {
            if is_acc(&p.dst) {
                return Cycles::base(4);
            }
            return self.rm_cost(&p.dst, 5, 11, Access::Read);
        }
        self.rm_cost(&p.dst, 3, 9, Access::Read)
    }
}

fn is_acc(p: &Parameter) -> bool {
    match *p {
        Parameter::Reg8(R::AL) | Parameter::Reg16(R::AX) => true,
        _ => false,
    }
}

fn is_direct(p: &Parameter) -> bool {
    match *p {
        Parameter::Ptr8(_, _) | Parameter::Ptr16(_, _) => true,
        _ => false,
    }
}
