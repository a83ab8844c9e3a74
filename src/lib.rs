#[macro_use]
extern crate quick_error;

#[cfg(test)]
extern crate pretty_assertions;

pub mod cpu;
pub mod disasm;
pub mod error;
pub mod machine;
pub mod memory;
pub mod nasm;
