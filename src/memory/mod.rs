pub use self::mmu::*;
mod mmu;
