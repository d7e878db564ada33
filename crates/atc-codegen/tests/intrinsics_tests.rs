//! Integration tests for the intrinsic dispatch table.
//!
//! Each recognized `(receiver type, method)` pair must emit exactly the
//! instruction sequence its table rule declares — and nothing outside the
//! table may compile.

use atc_codegen::{compile, CompiledProgram};
use atc_ir::{CompileError, ContractUnit, FieldDecl, Instr, MethodDecl, ValueType};
use atc_isa::{ApiFun, Opcode};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn contract(fields: Vec<FieldDecl>, body: Vec<Instr>) -> ContractUnit {
    ContractUnit {
        name: "Vault".to_string(),
        parent: "Contract".to_string(),
        fields,
        methods: vec![MethodDecl::new("txReceived", 0, 1, body)],
    }
}

fn this() -> Instr {
    Instr::LoadLocal(0)
}

fn call(owner: &str, name: &str, argc: u8) -> Instr {
    Instr::Invoke {
        owner: owner.to_string(),
        name: name.to_string(),
        argc,
    }
}

fn compile_clean(unit: &ContractUnit) -> CompiledProgram {
    let out = compile(unit);
    assert!(
        !out.errors.has_errors(),
        "unexpected errors: {:?}",
        out.errors.errors
    );
    out.program
}

/// Bytes of the handler method (declared first, constructor synthesized
/// after it).
fn handler_bytes(program: &CompiledProgram) -> &[u8] {
    let start = program.method_symbols["txReceived"] as usize;
    let end = program.method_symbols["constructor"] as usize;
    &program.code[start..end]
}

/// Expected-bytes builder mirroring the emitter's encoding.
#[derive(Default)]
struct Expect(Vec<u8>);

impl Expect {
    fn op(mut self, op: Opcode) -> Self {
        self.0.push(op as u8);
        self
    }
    fn addr(mut self, addr: u32) -> Self {
        self.0.extend_from_slice(&addr.to_le_bytes());
        self
    }
    fn off(mut self, off: i8) -> Self {
        self.0.push(off as u8);
        self
    }
    fn fun(mut self, fun: ApiFun) -> Self {
        self.0.extend_from_slice(&fun.selector().to_le_bytes());
        self
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Contract base class
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn current_tx_reads_the_reserved_word_for_free() {
    // txAmount = getCurrentTx().getAmount()
    let unit = contract(
        vec![FieldDecl::new("txAmount", ValueType::Long)],
        vec![
            this(),
            this(),
            call("Vault", "getCurrentTx", 0),
            call("Tx", "getAmount", 0),
            Instr::PutField("txAmount".into()),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);

    // Field 0; reserved 1, 2; temp base 3. getCurrentTx emits nothing — the
    // Tx query reads the reserved word directly.
    let expected = Expect::default()
        .op(Opcode::ExtFunDat)
        .fun(ApiFun::SetA1)
        .addr(2)
        .op(Opcode::ExtFunRet)
        .fun(ApiFun::GetAmountForTxInA)
        .addr(3)
        .op(Opcode::SetDat)
        .addr(0)
        .addr(3)
        .op(Opcode::RetSub)
        .0;
    assert_eq!(handler_bytes(&program), &expected[..]);
}

#[test]
fn send_balance_sets_b_then_sends_all() {
    let unit = contract(
        vec![FieldDecl::new("beneficiary", ValueType::Address)],
        vec![
            this(),
            this(),
            Instr::GetField("beneficiary".into()),
            call("Vault", "sendBalance", 1),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);
    let expected = Expect::default()
        .op(Opcode::ExtFunDat)
        .fun(ApiFun::SetB1)
        .addr(0)
        .op(Opcode::ExtFun)
        .fun(ApiFun::SendAllToAddressInB)
        .op(Opcode::RetSub)
        .0;
    assert_eq!(handler_bytes(&program), &expected[..]);
}

#[test]
fn send_amount_pops_amount_then_address() {
    let unit = contract(
        vec![
            FieldDecl::new("amount", ValueType::Long),
            FieldDecl::new("beneficiary", ValueType::Address),
        ],
        vec![
            this(),
            this(),
            Instr::GetField("amount".into()),
            this(),
            Instr::GetField("beneficiary".into()),
            call("Vault", "sendAmount", 2),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);
    let expected = Expect::default()
        .op(Opcode::ExtFunDat)
        .fun(ApiFun::SetB1)
        .addr(1)
        .op(Opcode::ExtFunDat)
        .fun(ApiFun::SendToAddressInB)
        .addr(0)
        .op(Opcode::RetSub)
        .0;
    assert_eq!(handler_bytes(&program), &expected[..]);
}

#[test]
fn sha256_spans_four_consecutive_words() {
    let unit = contract(
        vec![
            FieldDecl::new("message", ValueType::Register),
            FieldDecl::new("digest", ValueType::Register),
        ],
        vec![
            this(),
            this(),
            Instr::GetField("message".into()),
            call("Vault", "performSha256", 1),
            Instr::PutField("digest".into()),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);

    // message at 0..=3, digest at 4..=7, reserved 8, 9, temps from 10.
    let mut expected = Expect::default()
        .op(Opcode::ExtFunDat2)
        .fun(ApiFun::SetA1A2)
        .addr(0)
        .addr(1)
        .op(Opcode::ExtFunDat2)
        .fun(ApiFun::SetA3A4)
        .addr(2)
        .addr(3)
        .op(Opcode::ExtFun)
        .fun(ApiFun::Sha256AToB)
        .op(Opcode::ExtFunRet)
        .fun(ApiFun::GetB1)
        .addr(10)
        .op(Opcode::ExtFunRet)
        .fun(ApiFun::GetB2)
        .addr(11)
        .op(Opcode::ExtFunRet)
        .fun(ApiFun::GetB3)
        .addr(12)
        .op(Opcode::ExtFunRet)
        .fun(ApiFun::GetB4)
        .addr(13);
    // The 256-bit store into `digest` copies word by word.
    for k in 0..4 {
        expected = expected.op(Opcode::SetDat).addr(4 + k).addr(10 + k);
    }
    let expected = expected.op(Opcode::RetSub).0;
    assert_eq!(handler_bytes(&program), &expected[..]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Timestamp comparisons — branch-around-increment
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn timestamp_ge_is_clear_branch_increment() {
    let unit = contract(
        vec![
            FieldDecl::new("deadline", ValueType::Timestamp),
            FieldDecl::new("now", ValueType::Timestamp),
            FieldDecl::new("expired", ValueType::Long),
        ],
        vec![
            this(),
            this(),
            Instr::GetField("now".into()),
            this(),
            Instr::GetField("deadline".into()),
            call("Timestamp", "ge", 1),
            Instr::PutField("expired".into()),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);

    // Fields 0..2, reserved 3, 4, temp at 5. The result is zeroed, BLT
    // (the negation of ge) skips the increment: 10 + 5 bytes forward.
    let expected = Expect::default()
        .op(Opcode::ClrDat)
        .addr(5)
        .op(Opcode::Blt)
        .addr(1)
        .addr(0)
        .off(15)
        .op(Opcode::IncDat)
        .addr(5)
        .op(Opcode::SetDat)
        .addr(2)
        .addr(5)
        .op(Opcode::RetSub)
        .0;
    assert_eq!(handler_bytes(&program), &expected[..]);
}

#[test]
fn timestamp_le_branches_on_greater() {
    let unit = contract(
        vec![
            FieldDecl::new("a", ValueType::Timestamp),
            FieldDecl::new("b", ValueType::Timestamp),
            FieldDecl::new("r", ValueType::Long),
        ],
        vec![
            this(),
            this(),
            Instr::GetField("a".into()),
            this(),
            Instr::GetField("b".into()),
            call("Timestamp", "le", 1),
            Instr::PutField("r".into()),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);
    let bytes = handler_bytes(&program);
    assert_eq!(bytes[5], Opcode::Bgt as u8);
    // Operand order: receiver first, argument second.
    assert_eq!(u32::from_le_bytes(bytes[6..10].try_into().unwrap()), 0);
    assert_eq!(u32::from_le_bytes(bytes[10..14].try_into().unwrap()), 1);
}

#[test]
fn add_minutes_uses_the_two_input_return_form() {
    let unit = contract(
        vec![
            FieldDecl::new("start", ValueType::Timestamp),
            FieldDecl::new("grace", ValueType::Long),
            FieldDecl::new("deadline", ValueType::Timestamp),
        ],
        vec![
            this(),
            this(),
            Instr::GetField("start".into()),
            this(),
            Instr::GetField("grace".into()),
            call("Timestamp", "addMinutes", 1),
            Instr::PutField("deadline".into()),
            Instr::Return,
        ],
    );
    let program = compile_clean(&unit);
    let expected = Expect::default()
        .op(Opcode::ExtFunRetDat2)
        .fun(ApiFun::AddMinutesToTimestamp)
        .addr(5)
        .addr(0)
        .addr(1)
        .op(Opcode::SetDat)
        .addr(2)
        .addr(5)
        .op(Opcode::RetSub)
        .0;
    assert_eq!(handler_bytes(&program), &expected[..]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Closed-set enforcement
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_value_type_method_is_rejected() {
    let unit = contract(
        vec![FieldDecl::new("t", ValueType::Timestamp)],
        vec![
            this(),
            Instr::GetField("t".into()),
            call("Timestamp", "gt", 1),
            Instr::Return,
        ],
    );
    let out = compile(&unit);
    assert!(out.errors.errors.iter().any(|e| matches!(
        e,
        CompileError::UnknownMethod { owner, name, .. } if owner == "Timestamp" && name == "gt"
    )));
}

#[test]
fn wrong_arity_on_a_known_intrinsic_is_rejected() {
    let unit = contract(
        vec![FieldDecl::new("t", ValueType::Timestamp)],
        vec![
            this(),
            Instr::GetField("t".into()),
            call("Timestamp", "ge", 2),
            Instr::Return,
        ],
    );
    let out = compile(&unit);
    assert!(out
        .errors
        .errors
        .iter()
        .any(|e| matches!(e, CompileError::UnknownMethod { name, .. } if name == "ge")));
}

#[test]
fn sha256_of_a_single_word_is_a_width_error() {
    let unit = contract(
        vec![FieldDecl::new("x", ValueType::Long)],
        vec![
            this(),
            this(),
            Instr::GetField("x".into()),
            call("Vault", "performSha256", 1),
            Instr::Return,
        ],
    );
    let out = compile(&unit);
    assert!(out
        .errors
        .errors
        .iter()
        .any(|e| matches!(e, CompileError::WidthMismatch { .. })));
}
