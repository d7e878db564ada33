//! ATC code generator: abstract instruction streams to ledger-VM machine code.
//!
//! # Architecture
//!
//! The backend takes a [`ContractUnit`](atc_ir::ContractUnit) from the
//! front-end and produces a flat little-endian code image plus symbol tables:
//!
//! 1. [`alloc`] walks the field declarations and assigns every persistent
//!    word its address, reserves the two prologue words, and fixes the
//!    shared temp-region base.
//! 2. [`stack`] simulates the source operand stack per method, deciding for
//!    each value which address or literal it resolves to, and drives the
//!    [`emit`] buffer. Recognized base-API calls go through the closed
//!    [`intrinsics`] table.
//! 3. [`link`] lays the fixed dispatch prologue at offset 0, concatenates
//!    the method buffers, and backfills every pending call site in a second
//!    pass.
//!
//! Errors never abort compilation: they accumulate in an
//! [`ErrorSink`](atc_ir::ErrorSink) and the caller gets the full set next to
//! whatever partial output exists.

pub mod alloc;
pub mod compiler;
pub mod emit;
pub mod intrinsics;
pub mod link;
pub mod stack;

pub use alloc::{DataLayout, FieldSlot, TempAlloc, RESERVED_LAST_TX, RESERVED_LAST_TX_TIMESTAMP};
pub use compiler::{compile, CompileOutput, CompilerContext};
pub use emit::CodeBuf;
pub use link::{CompiledProgram, PendingCall, PROLOGUE_BYTES};
