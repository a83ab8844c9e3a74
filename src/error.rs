quick_error! {
    /// A terminal decode or execution failure, tagged with the position where
    /// it was detected: a byte offset into the input stream when
    /// disassembling, a physical code address when simulating.
    #[derive(Debug, Clone, PartialEq)]
    pub enum EmuError {
        /// the primary byte or an extension subopcode is not a defined instruction
        InvalidInstruction(pos: u32) {
            display("Position {}: invalid instruction", pos)
        }
        /// a modR/M field violates the opcode's constraints
        InvalidParameters(pos: u32, cause: &'static str) {
            display("Position {}: invalid parameters ({})", pos, cause)
        }
        /// the byte stream ended before the instruction was complete
        PrematureEndOfStream(pos: u32) {
            display("Position {}: reached end of instruction stream while decoding", pos)
        }
        /// the instruction is recognized but its execution is not implemented
        Unsupported(pos: u32, cause: &'static str) {
            display("Position {}: unsupported function ({})", pos, cause)
        }
        /// the loader rejected the program image
        MemoryWrite(cause: &'static str) {
            display("memory write rejected ({})", cause)
        }
    }
}

impl EmuError {
    /// Re-tags the failure position. The interpreter uses this to report the
    /// physical address of the failing instruction instead of a raw stream
    /// offset.
    pub fn at(self, pos: u32) -> EmuError {
        match self {
            EmuError::InvalidInstruction(_) => EmuError::InvalidInstruction(pos),
            EmuError::InvalidParameters(_, cause) => EmuError::InvalidParameters(pos, cause),
            EmuError::PrematureEndOfStream(_) => EmuError::PrematureEndOfStream(pos),
            EmuError::Unsupported(_, cause) => EmuError::Unsupported(pos, cause),
            other => other,
        }
    }
}
