//! Two-pass linking into the final flat code image.
//!
//! Pass 1 lays the fixed-size dispatch prologue at offset 0 and concatenates
//! the method buffers in declaration order, recording each method's entry
//! address. Pass 2 re-emits the prologue with the real constructor/handler
//! entries and copies the method buffers with every pending call site
//! backfilled. Two passes always suffice: every address operand has a fixed
//! encoding width, so re-emission never changes a buffer's length.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use atc_ir::{CompileError, METHOD_CONSTRUCTOR, METHOD_TX_RECEIVED};
use atc_isa::{ApiFun, Opcode, MAX_CODE_BYTES, MAX_DATA_WORDS};

use crate::alloc::{DataLayout, RESERVED_LAST_TX, RESERVED_LAST_TX_TIMESTAMP};
use crate::compiler::CompilerContext;
use crate::emit::CodeBuf;

/// An unresolved call reference inside one method's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub target: String,
    /// Offset of the 4-byte address operand inside the caller's buffer.
    pub patch_offset: usize,
}

/// One compiled method, before and after linking.
#[derive(Debug, Clone)]
pub struct MethodCode {
    pub name: String,
    pub buf: CodeBuf,
    pub pending: Vec<PendingCall>,
    /// Byte offset of the method in the final image; set by pass 1.
    pub entry: Option<u32>,
}

/// Byte size of the dispatch prologue. Constant by construction — it
/// references only field addresses and two method entries, all of fixed
/// encoding width.
pub const PROLOGUE_BYTES: usize = 42;

/// Where the dispatch loop re-enters, just past the constructor call.
const PROLOGUE_LOOP: u32 = 6;

/// The final artifact: flat code image plus symbol tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Flat little-endian code image, prologue first.
    pub code: Vec<u8>,
    /// Field name → word address. Includes the two reserved prologue words.
    pub field_symbols: BTreeMap<String, u32>,
    /// Method name → entry byte offset in `code`.
    pub method_symbols: BTreeMap<String, u32>,
    /// Total allocated data words (fields, reserved words, temp high-water).
    pub data_words: u32,
    /// One symbol per allocated data word, in address order.
    pub data_names: Vec<String>,
    /// SHA-256 of `code`; the deploy fingerprint.
    pub code_hash: [u8; 32],
}

impl CompiledProgram {
    pub fn code_hash_hex(&self) -> String {
        self.code_hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Emit the dispatch prologue.
///
/// Run once from offset 0: call the constructor, mark the resume point,
/// then loop forever — fetch the next transaction after the last dispatched
/// timestamp, finish the activation when there is none, otherwise advance
/// the timestamp and hand the transaction to `txReceived`.
fn emit_prologue(layout: &DataLayout, ctor_entry: u32, handler_entry: u32) -> CodeBuf {
    let mut buf = CodeBuf::new();
    buf.jump(Opcode::JmpSub, ctor_entry);
    buf.op(Opcode::SetPcs);
    buf.ext_fun_dat(ApiFun::ATxAfterTimestamp, layout.last_tx_timestamp);
    buf.ext_fun_ret(ApiFun::GetA1, layout.last_tx);
    buf.op_addr(Opcode::FizDat, layout.last_tx);
    buf.ext_fun_ret(ApiFun::GetTimestampForTxInA, layout.last_tx_timestamp);
    buf.jump(Opcode::JmpSub, handler_entry);
    buf.jump(Opcode::JmpAdr, PROLOGUE_LOOP);
    debug_assert_eq!(buf.len(), PROLOGUE_BYTES);
    buf
}

/// Run both passes over the compiled methods and produce the final image.
pub fn link(ctx: &mut CompilerContext<'_>) -> CompiledProgram {
    // The prologue always calls a constructor; synthesize an empty one when
    // the contract declares none.
    if !ctx.methods.iter().any(|m| m.name == METHOD_CONSTRUCTOR) {
        let mut buf = CodeBuf::new();
        buf.op(Opcode::RetSub);
        ctx.methods.push(MethodCode {
            name: METHOD_CONSTRUCTOR.to_string(),
            buf,
            pending: Vec::new(),
            entry: None,
        });
    }

    // ── Pass 1: layout ───────────────────────────────────────────────────
    let mut offset = PROLOGUE_BYTES;
    for m in &mut ctx.methods {
        m.entry = Some(offset as u32);
        offset += m.buf.len();
    }

    let entries: BTreeMap<String, u32> = ctx
        .methods
        .iter()
        .map(|m| (m.name.clone(), m.entry.unwrap_or(0)))
        .collect();

    let ctor_entry = entries.get(METHOD_CONSTRUCTOR).copied().unwrap_or(0);
    let handler_entry = match entries.get(METHOD_TX_RECEIVED) {
        Some(&e) => e,
        None => {
            ctx.errors.push(CompileError::MissingHandler {
                handler: METHOD_TX_RECEIVED.to_string(),
            });
            0
        }
    };

    // ── Pass 2: re-emit prologue, copy buffers, backfill call sites ──────
    let mut code = emit_prologue(&ctx.layout, ctor_entry, handler_entry).into_bytes();
    let mut patch_errors = Vec::new();
    for m in &ctx.methods {
        let mut bytes = m.buf.bytes().to_vec();
        for call in &m.pending {
            match entries.get(&call.target) {
                Some(&target) => {
                    bytes[call.patch_offset..call.patch_offset + 4]
                        .copy_from_slice(&target.to_le_bytes());
                }
                None => patch_errors.push(CompileError::UnresolvedCall {
                    target: call.target.clone(),
                    method: m.name.clone(),
                }),
            }
        }
        code.extend_from_slice(&bytes);
    }
    for e in patch_errors {
        ctx.errors.push(e);
    }

    // ── Budgets ──────────────────────────────────────────────────────────
    if code.len() > MAX_CODE_BYTES {
        ctx.errors.push(CompileError::CodeBudgetExceeded {
            size: code.len(),
            max: MAX_CODE_BYTES,
        });
    }
    let data_words = ctx.layout.temp_base + ctx.temp_high_water;
    if data_words > MAX_DATA_WORDS {
        ctx.errors.push(CompileError::DataBudgetExceeded {
            words: data_words,
            max: MAX_DATA_WORDS,
        });
    }

    let mut field_symbols = ctx.layout.symbols();
    field_symbols.insert(
        RESERVED_LAST_TX_TIMESTAMP.to_string(),
        ctx.layout.last_tx_timestamp,
    );
    field_symbols.insert(RESERVED_LAST_TX.to_string(), ctx.layout.last_tx);

    let code_hash: [u8; 32] = Sha256::digest(&code).into();
    CompiledProgram {
        code,
        field_symbols,
        method_symbols: entries,
        data_words,
        data_names: data_names(&ctx.layout, data_words),
        code_hash,
    }
}

/// One symbol per allocated word: field words (suffixed past the first),
/// the two reserved words, then generated temp names.
fn data_names(layout: &DataLayout, data_words: u32) -> Vec<String> {
    let mut names = Vec::with_capacity(data_words as usize);
    for slot in layout.fields() {
        names.push(slot.name.clone());
        for k in 1..slot.words {
            names.push(format!("{}_{k}", slot.name));
        }
    }
    names.push(RESERVED_LAST_TX_TIMESTAMP.to_string());
    names.push(RESERVED_LAST_TX.to_string());
    for addr in layout.temp_base..data_words {
        names.push(format!("var{addr:02}"));
    }
    names
}
