use crate::cpu::{Cycles, Instruction, MemoryCode, Op, CPU, R};
use crate::disasm::instruction_line;
use crate::error::EmuError;
use crate::memory::{phys, MEMORY_SIZE, MMU};

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// physical address of the reset vector, where execution begins
pub const RESET_VECTOR: u32 = 0xF_FFF0;

const HLT: u8 = 0xF4;

/// far JMP 0:0, planted at the reset vector for incomplete images
const TRAMPOLINE: [u8; 5] = [0xEA, 0x00, 0x00, 0x00, 0x00];

/// the outcome of one executed instruction
#[derive(Debug)]
pub struct Step {
    pub instruction: Instruction,
    pub cycles: Cycles,
    pub halted: bool,
}

/// One emulator instance: a CPU plus the 1 MiB address space it runs in.
pub struct Machine {
    pub cpu: CPU,
    pub mmu: MMU,
}

impl Machine {
    pub fn default() -> Self {
        Machine {
            cpu: CPU::default(),
            mmu: MMU::default(),
        }
    }

    /// returns registers, flags and memory to their reset values
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.mmu.clear();
    }

    /// Copies a program image to physical address 0. An `incomplete` image is
    /// a bare code fragment: it gets a HLT byte appended (unless it already
    /// ends in one) and a far JMP 0:0 planted at the reset vector, so that
    /// execution starting at FFFF:0000 dispatches straight to the image.
    pub fn load_program(&mut self, data: &[u8], incomplete: bool) -> Result<(), EmuError> {
        if data.len() > MEMORY_SIZE {
            return Err(EmuError::MemoryWrite("program image larger than memory"));
        }
        self.mmu.write_phys(0, data);
        if incomplete {
            if data.last() != Some(&HLT) {
                if data.len() == MEMORY_SIZE {
                    return Err(EmuError::MemoryWrite("no room for the halt byte"));
                }
                self.mmu.write_u8_phys(data.len() as u32, HLT);
            }
            self.mmu.write_phys(RESET_VECTOR, &TRAMPOLINE);
        }
        Ok(())
    }

    /// Fetches, decodes and executes one instruction at CS:IP. Failures are
    /// tagged with the physical address of the instruction.
    pub fn step(&mut self) -> Result<Step, EmuError> {
        let cs = self.cpu.get_r16(R::CS);
        let ip = self.cpu.regs.ip;
        let addr = phys(cs, ip);
        let instruction = {
            let mut code = MemoryCode::new(&self.mmu, cs, ip);
            self.cpu
                .decoder
                .get_instruction(&mut code)
                .map_err(|e| e.at(addr))?
        };
        let cycles = self.cpu.execute(&mut self.mmu, &instruction)?;
        let halted = instruction.command == Op::Hlt;
        Ok(Step {
            instruction,
            cycles,
            halted,
        })
    }

    /// runs until HLT; fails on the first invalid or unsupported instruction
    pub fn run(&mut self) -> Result<(), EmuError> {
        loop {
            if self.step()?.halted {
                return Ok(());
            }
        }
    }

    /// One trace line for an executed step: the register snapshot after the
    /// instruction, its disassembly, and the cycle accounting. The breakdown
    /// parenthesis appears only when an EA or penalty term contributed.
    pub fn trace_line(&self, step: &Step) -> String {
        let c = &step.cycles;
        let mut line = format!(
            "{} ; {} +{} = {}",
            self.cpu.regs,
            instruction_line(&step.instruction),
            c.total(),
            self.cpu.cycle_count,
        );
        if c.ea != 0 || c.penalty != 0 {
            line.push_str(&format!(" ({}", c.base));
            if c.ea != 0 {
                line.push_str(&format!(" + {}ea", c.ea));
            }
            if c.penalty != 0 {
                line.push_str(&format!(" + {}p", c.penalty));
            }
            line.push(')');
        }
        line
    }
}
