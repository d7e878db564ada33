//! Target ISA definitions.
//!
//! The ledger VM is a flat-memory machine with no operand stack. Its
//! addressable unit is one 8-byte little-endian word; code is deployed in
//! 256-byte pages. Instructions are variable-length:
//!
//! - opcode: 1 byte
//! - word address operand: 4 bytes LE (a word index into data memory)
//! - code address operand: 4 bytes LE (a byte offset into code)
//! - immediate: 8 bytes LE
//! - branch offset: 1 signed byte, relative to the branch instruction start
//! - external-function selector: 2 bytes LE
//!
//! This catalogue lists exactly the instructions the emitter produces; the
//! disassembler walks the same table, so the two stay in 1:1 correspondence
//! by construction.

pub mod isa;
pub mod layout;

pub use isa::{ApiFun, Opcode, OperandKind, ALL_API_FUNS, ALL_OPCODES};
pub use layout::{
    MAX_CODE_BYTES, MAX_CODE_PAGES, MAX_DATA_PAGES, MAX_DATA_WORDS, PAGE_BYTES, PAGE_WORDS,
    WORD_BYTES,
};
