//! ATC disassembler.
//!
//! Walks a compiled program's flat code image opcode-by-opcode — the opcode
//! table is the same exhaustive catalogue the emitter uses, so the two can
//! never drift — and renders one instruction per line:
//!
//! ```text
//! ^declare balance
//! ^declare lastTxTimestamp
//! ...
//! l0000: JMP_SUB :constructor
//! l0005: SET_PCS
//! l0006: EXT_FUN_DAT A_TO_TX_AFTER_TIMESTAMP $lastTxTimestamp
//! ```
//!
//! Operand sigils: `@addr` read-write, `$addr` read-only, `#literal`
//! immediate, `:label` jump/call target. Addresses resolve back to field and
//! method names through the program's symbol tables. The only contract of
//! this crate is round-trip fidelity: an operand's kind and value are never
//! misrepresented.

use thiserror::Error;

mod decode;
mod listing;

pub use decode::{decode, DecodedInstr, DecodedOperand};
pub use listing::disassemble;

/// Decoding failures. A well-linked program never produces these; they guard
/// against truncated or foreign images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisasmError {
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("truncated instruction at offset {offset}: `{mnemonic}` needs {needed} bytes")]
    Truncated {
        offset: usize,
        mnemonic: &'static str,
        needed: usize,
    },
}
