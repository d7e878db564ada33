//! The intrinsic dispatch table.
//!
//! A fixed, closed mapping from `(declared receiver type, method name)` to a
//! code-generation rule. The simulator consults this table before the user
//! method map; anything matching neither is a reference error.
//!
//! Extending the recognized base API means adding a row here — the rule
//! shapes in [`IntrinsicKind`] cover every emission pattern the VM's
//! external functions need, and the executor in [`crate::stack`] contains no
//! per-method branching of its own.

use atc_ir::ValueType;
use atc_isa::ApiFun;

/// Emission rule shapes. Each documents which operands it pops (receiver
/// included), which temps it allocates and which selectors it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicKind {
    /// Push the reserved `lastTx` word; nothing emitted — the prologue
    /// already materialized it.
    CurrentTx,
    /// Push the reserved `lastTxTimestamp` word; nothing emitted.
    CurrentTxTimestamp,
    /// `EXT_FUN_RET fun → temp`; pushes the temp.
    ChainQuery(ApiFun),
    /// `EXT_FUN B_TO_ADDRESS_OF_CREATOR`; `EXT_FUN_RET GET_B1 → temp`.
    CreatorAddress,
    /// Pops amount and address: `SET_B1 $addr`; `SEND_TO_ADDRESS_IN_B $amount`.
    SendAmount,
    /// Pops address: `SET_B1 $addr`; `SEND_ALL_TO_ADDRESS_IN_B`.
    SendBalance,
    /// Pops a 4-word message and an address: B1 := addr, A := msg,
    /// `SEND_A_TO_ADDRESS_IN_B`.
    SendMessage,
    /// Pops a 4-word value: A := value, `SHA256_A_TO_B`, B → 4 consecutive
    /// temps; pushes the 4-word temp.
    Sha256,
    /// Receiver is a Tx handle: `SET_A1 $tx`; `EXT_FUN_RET fun → temp`.
    TxQuery(ApiFun),
    /// `SET_A1 $tx`; `B_TO_ADDRESS_OF_TX_IN_A`; `GET_B1 → temp`.
    TxSender,
    /// `SET_A1 $tx`; `MESSAGE_FROM_TX_IN_A_TO_B`; B → 4 consecutive temps.
    TxMessage,
    /// Branch-around-increment: temp := (receiver >= arg) as 0/1.
    CmpGe,
    /// Branch-around-increment: temp := (receiver <= arg) as 0/1.
    CmpLe,
    /// `EXT_FUN_RET_DAT_2 ADD_MINUTES_TO_TIMESTAMP @temp $ts $minutes`.
    AddMinutes,
}

/// A resolved row of the dispatch table.
#[derive(Debug, Clone)]
pub struct Intrinsic {
    pub name: &'static str,
    /// Arguments popped, receiver not counted.
    pub args: u8,
    pub kind: IntrinsicKind,
}

/// The closed base-API table. Rows are `(owner, name, popped args, rule)`.
pub static TABLE: &[(ValueType, &str, u8, IntrinsicKind)] = &[
    // ── Contract base class ──────────────────────────────────────────────
    (ValueType::Contract, "getCurrentTx", 0, IntrinsicKind::CurrentTx),
    (ValueType::Contract, "getCurrentTxTimestamp", 0, IntrinsicKind::CurrentTxTimestamp),
    (ValueType::Contract, "getBlockTimestamp", 0, IntrinsicKind::ChainQuery(ApiFun::GetBlockTimestamp)),
    (ValueType::Contract, "getCreationTimestamp", 0, IntrinsicKind::ChainQuery(ApiFun::GetCreationTimestamp)),
    (ValueType::Contract, "getCurrentBalance", 0, IntrinsicKind::ChainQuery(ApiFun::GetCurrentBalance)),
    (ValueType::Contract, "getCreator", 0, IntrinsicKind::CreatorAddress),
    (ValueType::Contract, "sendAmount", 2, IntrinsicKind::SendAmount),
    (ValueType::Contract, "sendBalance", 1, IntrinsicKind::SendBalance),
    (ValueType::Contract, "sendMessage", 2, IntrinsicKind::SendMessage),
    (ValueType::Contract, "performSha256", 1, IntrinsicKind::Sha256),
    // ── Tx handles ───────────────────────────────────────────────────────
    (ValueType::Tx, "getAmount", 0, IntrinsicKind::TxQuery(ApiFun::GetAmountForTxInA)),
    (ValueType::Tx, "getTimestamp", 0, IntrinsicKind::TxQuery(ApiFun::GetTimestampForTxInA)),
    (ValueType::Tx, "getSenderAddress", 0, IntrinsicKind::TxSender),
    (ValueType::Tx, "getMessage", 0, IntrinsicKind::TxMessage),
    // ── Timestamps ───────────────────────────────────────────────────────
    (ValueType::Timestamp, "ge", 1, IntrinsicKind::CmpGe),
    (ValueType::Timestamp, "le", 1, IntrinsicKind::CmpLe),
    (ValueType::Timestamp, "addMinutes", 1, IntrinsicKind::AddMinutes),
];

/// Look up a rule for `(receiver type, method name)`.
pub fn lookup(owner: &ValueType, name: &str) -> Option<Intrinsic> {
    TABLE
        .iter()
        .find(|(o, n, _, _)| o == owner && *n == name)
        .map(|(_, n, args, kind)| Intrinsic {
            name: *n,
            args: *args,
            kind: *kind,
        })
}
