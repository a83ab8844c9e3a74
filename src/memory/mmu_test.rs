use pretty_assertions::assert_eq;

use crate::memory::{phys, MMU};

#[test]
fn computes_physical_addresses() {
    assert_eq!(0x00000, phys(0x0000, 0x0000));
    assert_eq!(0x01234, phys(0x0000, 0x1234));
    assert_eq!(0x10004, phys(0x1000, 0x0004));
    assert_eq!(0xFFFF0, phys(0xFFFF, 0x0000));
    // the sum wraps at 20 bits
    assert_eq!(0x0FFEF, phys(0xFFFF, 0xFFFF));
}

#[test]
fn words_are_little_endian() {
    let mut mmu = MMU::default();
    mmu.write_u16(0x0000, 0x1234, 0xABCD);
    assert_eq!(0xCD, mmu.read_u8(0x0000, 0x1234));
    assert_eq!(0xAB, mmu.read_u8(0x0000, 0x1235));
    assert_eq!(0xABCD, mmu.read_u16(0x0000, 0x1234));
}

#[test]
fn word_offset_wraps_inside_the_segment() {
    let mut mmu = MMU::default();
    mmu.write_u16(0x1000, 0xFFFF, 0xABCD);
    assert_eq!(0xCD, mmu.read_u8(0x1000, 0xFFFF));
    assert_eq!(0xAB, mmu.read_u8(0x1000, 0x0000));
    assert_eq!(0xABCD, mmu.read_u16(0x1000, 0xFFFF));
}

#[test]
fn clear_zeroes_everything() {
    let mut mmu = MMU::default();
    mmu.write_u8_phys(0x12345, 0xFF);
    mmu.clear();
    assert_eq!(0, mmu.read_u8_phys(0x12345));
}
