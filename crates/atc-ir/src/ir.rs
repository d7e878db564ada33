//! The abstract instruction stream and contract declaration model.
//!
//! This is the backend's input contract: the front-end parses the source
//! language's own bytecode and hands over one ordered [`Instr`] stream per
//! method, plus the contract's field declarations in order. Nothing in this
//! module knows about target addresses or opcodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name the front-end gives the contract constructor method.
pub const METHOD_CONSTRUCTOR: &str = "constructor";

/// Name of the default transaction handler the dispatch prologue routes to.
pub const METHOD_TX_RECEIVED: &str = "txReceived";

/// The base type every contract must extend.
pub const EXPECTED_PARENT: &str = "Contract";

/// Maximum number of parameters a contract method may declare.
pub const MAX_METHOD_ARITY: u8 = 3;

// ══════════════════════════════════════════════════════════════════════════════
// Value types
// ══════════════════════════════════════════════════════════════════════════════

/// Declared static type of a field or a method receiver.
///
/// The target VM has exactly one value shape — the 8-byte word — so a type
/// here determines only (a) how many words a field occupies and (b) which
/// intrinsic methods a receiver exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Int,
    Long,
    /// Block-time handle; one word.
    Timestamp,
    /// Transaction handle; one word.
    Tx,
    /// Account address handle; one word.
    Address,
    /// The 256-bit multi-word value type; four consecutive words.
    Register,
    /// The contract's own class (receiver of user methods and base-API calls).
    Contract,
    /// Anything the backend does not model. Unsupported as a field type.
    Other(String),
}

impl ValueType {
    /// Words a field of this type occupies, or `None` if the type cannot be
    /// a contract field.
    pub fn word_width(&self) -> Option<u32> {
        match self {
            ValueType::Boolean
            | ValueType::Int
            | ValueType::Long
            | ValueType::Timestamp
            | ValueType::Tx
            | ValueType::Address => Some(1),
            ValueType::Register => Some(4),
            ValueType::Contract | ValueType::Other(_) => None,
        }
    }

    /// Map a declared type name from the front-end onto a [`ValueType`].
    ///
    /// `contract_name` is the user's own class, which resolves to
    /// [`ValueType::Contract`] just like the base class does.
    pub fn from_name(name: &str, contract_name: &str) -> ValueType {
        match name {
            "boolean" => ValueType::Boolean,
            "int" => ValueType::Int,
            "long" => ValueType::Long,
            "Timestamp" => ValueType::Timestamp,
            "Tx" => ValueType::Tx,
            "Address" => ValueType::Address,
            "Register" => ValueType::Register,
            n if n == contract_name || n == EXPECTED_PARENT => ValueType::Contract,
            other => ValueType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Int => write!(f, "int"),
            ValueType::Long => write!(f, "long"),
            ValueType::Timestamp => write!(f, "Timestamp"),
            ValueType::Tx => write!(f, "Tx"),
            ValueType::Address => write!(f, "Address"),
            ValueType::Register => write!(f, "Register"),
            ValueType::Contract => write!(f, "Contract"),
            ValueType::Other(name) => write!(f, "{name}"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Instructions
// ══════════════════════════════════════════════════════════════════════════════

/// A constant pushed by the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Long(i64),
    /// String literal; packed into a single word at materialization time.
    Str(String),
    Null,
}

/// Binary arithmetic operators. Left/right operand order is significant for
/// `Sub`, `Div` and `Mod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// Comparison/jump forms the front-end may emit.
///
/// These are carried through the IR but never lowered: general control flow
/// is outside the backend's scope. The simulator reports each occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfCmpEq,
    IfCmpNe,
    IfCmpLt,
    IfCmpGe,
    IfCmpGt,
    IfCmpLe,
    Goto,
}

impl BranchKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BranchKind::IfEq => "ifeq",
            BranchKind::IfNe => "ifne",
            BranchKind::IfLt => "iflt",
            BranchKind::IfGe => "ifge",
            BranchKind::IfGt => "ifgt",
            BranchKind::IfLe => "ifle",
            BranchKind::IfCmpEq => "if_cmpeq",
            BranchKind::IfCmpNe => "if_cmpne",
            BranchKind::IfCmpLt => "if_cmplt",
            BranchKind::IfCmpGe => "if_cmpge",
            BranchKind::IfCmpGt => "if_cmpgt",
            BranchKind::IfCmpLe => "if_cmple",
            BranchKind::Goto => "goto",
        }
    }
}

/// One abstract instruction inside a method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// Push a constant onto the simulated stack.
    Push(Const),
    /// Push local slot `n`. Slot 0 is the receiver.
    LoadLocal(u16),
    /// Pop into local slot `n`.
    StoreLocal(u16),
    /// Pop the receiver, push the address of the named field.
    GetField(String),
    /// Pop value and receiver, write the value into the named field.
    PutField(String),
    /// Pop right then left, push the result.
    Arith(ArithOp),
    /// Pop one operand, push its negation.
    Neg,
    /// Duplicate the top descriptor (aliased, not copied).
    Dup,
    /// General control flow; not lowered by this backend.
    Branch { kind: BranchKind, target: i32 },
    /// Invoke `owner.name` with `argc` arguments (receiver not counted).
    Invoke {
        owner: String,
        name: String,
        argc: u8,
    },
    /// Return from the method. Contract methods return nothing.
    Return,
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations
// ══════════════════════════════════════════════════════════════════════════════

/// A contract-level persistent field, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: ValueType,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A contract method and its instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    /// Declared parameter count (receiver not counted). At most
    /// [`MAX_METHOD_ARITY`].
    pub arity: u8,
    /// Local slot count including the receiver slot, as the front-end
    /// reports it.
    pub max_locals: u16,
    pub body: Vec<Instr>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, arity: u8, max_locals: u16, body: Vec<Instr>) -> Self {
        Self {
            name: name.into(),
            arity,
            max_locals,
            body,
        }
    }
}

/// One contract as delivered by the front-end: field declarations in order,
/// then the per-method instruction streams.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractUnit {
    pub name: String,
    /// Name of the declared superclass; must be [`EXPECTED_PARENT`].
    pub parent: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_width_by_type() {
        assert_eq!(ValueType::Long.word_width(), Some(1));
        assert_eq!(ValueType::Boolean.word_width(), Some(1));
        assert_eq!(ValueType::Address.word_width(), Some(1));
        assert_eq!(ValueType::Register.word_width(), Some(4));
        assert_eq!(ValueType::Contract.word_width(), None);
        assert_eq!(ValueType::Other("String".into()).word_width(), None);
    }

    #[test]
    fn type_from_name_resolves_own_class_to_contract() {
        assert_eq!(
            ValueType::from_name("Escrow", "Escrow"),
            ValueType::Contract
        );
        assert_eq!(
            ValueType::from_name("Contract", "Escrow"),
            ValueType::Contract
        );
        assert_eq!(ValueType::from_name("long", "Escrow"), ValueType::Long);
        assert_eq!(
            ValueType::from_name("HashMap", "Escrow"),
            ValueType::Other("HashMap".into())
        );
    }
}
