use crate::cpu::{Decoder, Instruction, SliceCode};
use crate::error::EmuError;

#[cfg(test)]
#[path = "./disasm_test.rs"]
mod disasm_test;

/// one listing line: the instruction text plus its encoded length
pub fn instruction_line(instr: &Instruction) -> String {
    format!("{} ; {}bytes", instr, instr.length)
}

/// Disassembles a whole instruction stream, one instruction per line. The
/// result carries no trailing newline. Fails on the first invalid or
/// truncated instruction, tagged with its byte offset.
pub fn disassemble(data: &[u8]) -> Result<String, EmuError> {
    let decoder = Decoder::default();
    let mut stream = SliceCode::new(data);
    let mut out = String::new();
    while !stream.is_empty() {
        let instr = decoder.get_instruction(&mut stream)?;
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&instruction_line(&instr));
    }
    Ok(out)
}
