use std::fmt;

use crate::cpu::register::R;

/// Segment selector for a memory operand. `Default` stands for "no override
/// in force": it resolves to SS for BP-based effective addresses and to DS
/// everywhere else.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Segment {
    Default,
    ES,
    CS,
    SS,
    DS,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Default | Segment::DS => "DS",
            Segment::ES => "ES",
            Segment::CS => "CS",
            Segment::SS => "SS",
        }
    }

    pub fn as_register(self) -> R {
        match self {
            Segment::Default | Segment::DS => R::DS,
            Segment::ES => R::ES,
            Segment::CS => R::CS,
            Segment::SS => R::SS,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
