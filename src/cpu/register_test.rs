use pretty_assertions::assert_eq;

use crate::cpu::register::{r16, r8, sr, R, RegisterState};

#[test]
fn byte_halves_are_isolated() {
    let mut regs = RegisterState::default();
    regs.set_r16(R::AX, 0x1234);
    regs.set_r8(R::AL, 0x99);
    assert_eq!(0x1299, regs.get_r16(R::AX));
    regs.set_r8(R::AH, 0x55);
    assert_eq!(0x5599, regs.get_r16(R::AX));
    assert_eq!(0x99, regs.get_r8(R::AL));
    regs.set_r16(R::AX, 0xABCD);
    assert_eq!(0xAB, regs.get_r8(R::AH));
    assert_eq!(0xCD, regs.get_r8(R::AL));
}

#[test]
fn field_indices_map_to_registers() {
    assert_eq!(R::AL, r8(0));
    assert_eq!(R::BH, r8(7));
    assert_eq!(R::AX, r16(0));
    assert_eq!(R::BX, r16(3));
    assert_eq!(R::DI, r16(7));
    assert_eq!(R::ES, sr(0));
    assert_eq!(R::DS, sr(3));
}

#[test]
fn snapshot_format() {
    let mut regs = RegisterState::default();
    regs.set_r16(R::AX, 0xABCD);
    regs.set_r16(R::CS, 0xFFFF);
    regs.ip = 0x0100;
    regs.flags.zero = true;
    regs.flags.carry = true;
    assert_eq!(
        "AX:0xabcd BX:0x0000 CX:0x0000 DX:0x0000 SP:0x0000 BP:0x0000 SI:0x0000 DI:0x0000 IP:0x0100 CS:0xffff DS:0x0000 SS:0x0000 ES:0x0000 F:     Z  C",
        format!("{}", regs)
    );
}
