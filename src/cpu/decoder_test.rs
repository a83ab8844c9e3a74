use pretty_assertions::assert_eq;

use crate::cpu::decoder::{Decoder, SliceCode};
use crate::cpu::instruction::{Instruction, RepeatMode};
use crate::cpu::op::Op;
use crate::cpu::parameter::Parameter;
use crate::cpu::register::{AMode, R};
use crate::cpu::segment::Segment;
use crate::error::EmuError;

fn decode_one(data: &[u8]) -> Instruction {
    let decoder = Decoder::default();
    let mut stream = SliceCode::new(data);
    decoder.get_instruction(&mut stream).unwrap()
}

fn decode_err(data: &[u8]) -> EmuError {
    let decoder = Decoder::default();
    let mut stream = SliceCode::new(data);
    decoder.get_instruction(&mut stream).unwrap_err()
}

#[test]
fn decodes_mov_reg_reg() {
    let op = decode_one(&[0x89, 0xD9]); // mov cx,bx
    assert_eq!(Op::Mov, op.command);
    assert_eq!(Parameter::Reg16(R::CX), op.params.dst);
    assert_eq!(Parameter::Reg16(R::BX), op.params.src);
    assert_eq!(2, op.length);
}

#[test]
fn decodes_effective_addresses() {
    let op = decode_one(&[0x8B, 0x46, 0x00]); // mov ax,[bp+0]
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(
        Parameter::Ptr16AmodeS8(Segment::Default, AMode::BP, 0),
        op.params.src
    );
    assert_eq!(3, op.length);

    let op = decode_one(&[0x8A, 0x80, 0x00, 0x80]); // mov al,[bx+si-0x8000]
    assert_eq!(Parameter::Reg8(R::AL), op.params.dst);
    assert_eq!(
        Parameter::Ptr8AmodeS16(Segment::Default, AMode::BXSI, -0x8000),
        op.params.src
    );
    assert_eq!(4, op.length);
}

#[test]
fn decodes_direct_addresses() {
    // mod 00, r/m 110 is a direct address, not [BP]
    let op = decode_one(&[0x8B, 0x06, 0x34, 0x12]);
    assert_eq!(Parameter::Ptr16(Segment::Default, 0x1234), op.params.src);

    // and so is the accumulator form
    let op = decode_one(&[0xA1, 0x34, 0x12]);
    assert_eq!(Parameter::Reg16(R::AX), op.params.dst);
    assert_eq!(Parameter::Ptr16(Segment::Default, 0x1234), op.params.src);
    assert_eq!(3, op.length);
}

#[test]
fn segment_override_is_carried_into_the_operand() {
    let op = decode_one(&[0x26, 0x8B, 0x04]); // mov ax,[es:si]
    assert_eq!(3, op.length);
    assert_eq!(Segment::ES, op.segment_prefix);
    assert_eq!(Parameter::Ptr16Amode(Segment::ES, AMode::SI), op.params.src);
}

#[test]
fn near_branch_targets_are_absolute() {
    let op = decode_one(&[0xE8, 0x05, 0x00]);
    assert_eq!(Op::CallNear, op.command);
    assert_eq!(Parameter::Imm16(0x0008), op.params.dst);

    // a negative displacement wraps at 16 bits
    let op = decode_one(&[0xE9, 0xFB, 0xFF]);
    assert_eq!(Op::JmpNear, op.command);
    assert_eq!(Parameter::Imm16(0xFFFE), op.params.dst);
}

#[test]
fn far_direct_reads_offset_then_segment() {
    let op = decode_one(&[0xEA, 0x34, 0x12, 0x00, 0x80]);
    assert_eq!(Op::JmpFar, op.command);
    assert_eq!(Parameter::Ptr16Imm(0x8000, 0x1234), op.params.dst);
    assert_eq!(5, op.length);
}

#[test]
fn sign_extended_immediates_stay_one_byte() {
    let op = decode_one(&[0x83, 0xC7, 0xC6]); // add di,-58
    assert_eq!(Op::Add, op.command);
    assert_eq!(Parameter::Reg16(R::DI), op.params.dst);
    assert_eq!(Parameter::ImmS8(-58), op.params.src);
    assert_eq!(3, op.length);

    let op = decode_one(&[0x81, 0xC7, 0x40, 0xFE]); // add di,-448
    assert_eq!(Parameter::ImmS16(-448), op.params.src);
    assert_eq!(4, op.length);
}

#[test]
fn group_subopcodes_select_the_operation() {
    assert_eq!(Op::Neg, decode_one(&[0xF7, 0xD8]).command);
    assert_eq!(Op::Not, decode_one(&[0xF7, 0xD1]).command);
    assert_eq!(Op::Mul, decode_one(&[0xF6, 0xE3]).command);
    assert_eq!(Op::Shl, decode_one(&[0xD1, 0xE0]).command);
    assert_eq!(Op::Sar, decode_one(&[0xD0, 0xF8]).command);
    assert_eq!(Op::Push, decode_one(&[0xFF, 0x37]).command);
    assert_eq!(Op::CallFar, decode_one(&[0xFF, 0x18]).command);
}

#[test]
fn rejects_unknown_primary_bytes() {
    assert_eq!(EmuError::InvalidInstruction(0), decode_err(&[0x60]));
    assert_eq!(EmuError::InvalidInstruction(0), decode_err(&[0xD6]));
    // prefixes count toward the failing position
    assert_eq!(EmuError::InvalidInstruction(1), decode_err(&[0xF0, 0x60]));
}

#[test]
fn rejects_invalid_group_subopcodes() {
    assert_eq!(EmuError::InvalidInstruction(1), decode_err(&[0xF6, 0x08]));
    assert_eq!(EmuError::InvalidInstruction(1), decode_err(&[0xD0, 0x30]));
    assert_eq!(EmuError::InvalidInstruction(1), decode_err(&[0xFF, 0x38]));
    // the byte-wide group only defines INC and DEC
    assert_eq!(EmuError::InvalidInstruction(1), decode_err(&[0xFE, 0x10]));
}

#[test]
fn rejects_invalid_parameter_fields() {
    assert_eq!(
        EmuError::InvalidParameters(1, "invalid instruction in register portion"),
        decode_err(&[0x8F, 0x08])
    );
    assert_eq!(
        EmuError::InvalidParameters(1, "invalid instruction in register portion"),
        decode_err(&[0xC6, 0x0F, 0x00])
    );
    assert_eq!(
        EmuError::InvalidParameters(1, "invalid segment register"),
        decode_err(&[0x8E, 0xE0])
    );
    assert_eq!(
        EmuError::InvalidParameters(1, "missing 0x0A literal"),
        decode_err(&[0xD4, 0x0B])
    );
}

#[test]
fn reports_truncated_instructions() {
    assert_eq!(EmuError::PrematureEndOfStream(1), decode_err(&[0x89]));
    assert_eq!(EmuError::PrematureEndOfStream(2), decode_err(&[0xB8, 0xCD]));
    assert_eq!(EmuError::PrematureEndOfStream(1), decode_err(&[0x26]));
}

#[test]
fn rep_and_lock_prefixes_attach_to_the_instruction() {
    let op = decode_one(&[0xF3, 0xA4]);
    assert_eq!(Op::Movsb, op.command);
    assert_eq!(RepeatMode::Repz, op.repeat);
    assert_eq!(2, op.length);

    let op = decode_one(&[0xF0, 0x01, 0x07]); // lock add [bx],ax
    assert!(op.lock);
    assert_eq!(Op::Add, op.command);
    assert_eq!(3, op.length);
}
