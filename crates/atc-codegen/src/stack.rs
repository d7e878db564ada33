//! Per-method operand-stack simulation.
//!
//! The target machine has no operand stack, so the backend simulates the
//! source one: every pushed value is tracked as an [`Operand`] descriptor
//! and only *materialized* — given a concrete word address — at the moment
//! an instruction consumes it as an address. Field reads are free (field
//! storage *is* an address); constants cost one `SET_VAL` (or `CLR_DAT` for
//! zero) into a fresh scratch word.
//!
//! Descriptors live behind `Rc<RefCell<_>>` so a duplicated value is two
//! stack slots denoting *one* descriptor: materializing either view is
//! visible through the other, which keeps later stores through an alias
//! coherent.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use atc_ir::{ArithOp, CompileError, Const, Instr, MethodDecl, ValueType};
use atc_isa::{ApiFun, Opcode};

use crate::alloc::TempAlloc;
use crate::compiler::CompilerContext;
use crate::emit::CodeBuf;
use crate::intrinsics::{self, Intrinsic, IntrinsicKind};
use crate::link::{MethodCode, PendingCall};

/// A value on the simulated stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Local slot; slot 0 is the receiver and has no address.
    Local(u16),
    /// A materialized value: `words` consecutive data words at `addr`.
    Addr { addr: u32, words: u32 },
    /// A literal not yet given an address.
    Const(i64),
}

/// Shared descriptor handle; `Dup` clones the `Rc`, not the operand.
pub type OperandRef = Rc<RefCell<Operand>>;

/// Compile one method body into a [`MethodCode`] buffer.
pub fn compile_method<'u>(ctx: &mut CompilerContext<'u>, decl: &MethodDecl) -> MethodCode {
    debug!(
        "compiling method `{}` ({} instructions)",
        decl.name,
        decl.body.len()
    );
    let local_words = u32::from(decl.max_locals.saturating_sub(1));
    let mut mc = MethodCompiler {
        temps: TempAlloc::new(ctx.layout.temp_base, local_words),
        ctx,
        decl,
        stack: Vec::new(),
        buf: CodeBuf::new(),
        pending: Vec::new(),
    };
    for instr in &decl.body {
        mc.visit(instr);
    }
    mc.finish()
}

struct MethodCompiler<'a, 'u> {
    ctx: &'a mut CompilerContext<'u>,
    decl: &'a MethodDecl,
    stack: Vec<OperandRef>,
    temps: TempAlloc,
    buf: CodeBuf,
    pending: Vec<PendingCall>,
}

impl<'a, 'u> MethodCompiler<'a, 'u> {
    fn finish(self) -> MethodCode {
        if self.buf.exceeds_budget() {
            self.ctx.errors.push(CompileError::CodeBudgetExceeded {
                size: self.buf.len(),
                max: atc_isa::MAX_CODE_BYTES,
            });
        }
        if self.temps.words_used() > self.ctx.temp_high_water {
            self.ctx.temp_high_water = self.temps.words_used();
        }
        MethodCode {
            name: self.decl.name.clone(),
            buf: self.buf,
            pending: self.pending,
            entry: None,
        }
    }

    fn err(&mut self, error: CompileError) {
        self.ctx.errors.push(error);
    }

    // ── Stack plumbing ───────────────────────────────────────────────────

    fn push(&mut self, op: Operand) {
        self.stack.push(Rc::new(RefCell::new(op)));
    }

    fn pop(&mut self) -> Option<OperandRef> {
        let popped = self.stack.pop();
        if popped.is_none() {
            self.err(CompileError::StackUnderflow {
                method: self.decl.name.clone(),
            });
        }
        popped
    }

    /// Resolve an operand to a single-word address, materializing constants
    /// into fresh scratch words. Mutates the shared descriptor so aliased
    /// views resolve to the same address.
    fn resolve_word(&mut self, op: &OperandRef) -> Option<u32> {
        let current = op.borrow().clone();
        match current {
            Operand::Addr { addr, words: 1 } => Some(addr),
            Operand::Addr { .. } => {
                self.err(CompileError::WidthMismatch {
                    method: self.decl.name.clone(),
                });
                None
            }
            Operand::Local(0) => {
                self.err(CompileError::ReceiverNotAddressable {
                    name: "this".to_string(),
                    method: self.decl.name.clone(),
                });
                None
            }
            Operand::Local(slot) => Some(self.temps.local(slot)),
            Operand::Const(value) => {
                let addr = self.temps.alloc();
                if value == 0 {
                    self.buf.op_addr(Opcode::ClrDat, addr);
                } else {
                    self.buf.set_val(addr, value);
                }
                *op.borrow_mut() = Operand::Addr { addr, words: 1 };
                Some(addr)
            }
        }
    }

    /// Resolve an operand that must already be a 4-word value.
    fn resolve_wide(&mut self, op: &OperandRef) -> Option<u32> {
        let current = op.borrow().clone();
        match current {
            Operand::Addr { addr, words: 4 } => Some(addr),
            _ => {
                self.err(CompileError::WidthMismatch {
                    method: self.decl.name.clone(),
                });
                None
            }
        }
    }

    /// Emit `dst := op` without materializing `op` into its own temp.
    fn set_into(&mut self, dst: u32, op: &OperandRef) {
        let current = op.borrow().clone();
        match current {
            Operand::Const(0) => self.buf.op_addr(Opcode::ClrDat, dst),
            Operand::Const(value) => self.buf.set_val(dst, value),
            Operand::Addr { addr, words: 1 } => self.buf.op_addr_addr(Opcode::SetDat, dst, addr),
            Operand::Addr { .. } => self.err(CompileError::WidthMismatch {
                method: self.decl.name.clone(),
            }),
            Operand::Local(0) => self.err(CompileError::ReceiverNotAddressable {
                name: "this".to_string(),
                method: self.decl.name.clone(),
            }),
            Operand::Local(slot) => {
                let src = self.temps.local(slot);
                self.buf.op_addr_addr(Opcode::SetDat, dst, src);
            }
        }
    }

    // ── Instruction visitor ──────────────────────────────────────────────

    fn visit(&mut self, instr: &Instr) {
        match instr {
            Instr::Push(c) => {
                let value = self.pack_const(c);
                self.push(Operand::Const(value));
            }
            Instr::LoadLocal(slot) => self.push(Operand::Local(*slot)),
            Instr::StoreLocal(slot) => self.store_local(*slot),
            Instr::GetField(name) => self.get_field(name),
            Instr::PutField(name) => self.put_field(name),
            Instr::Arith(op) => self.arith(*op),
            Instr::Neg => self.neg(),
            Instr::Dup => self.dup(),
            Instr::Branch { kind, .. } => {
                warn!(
                    "method `{}`: `{}` is not lowered; general control flow is out of scope",
                    self.decl.name,
                    kind.mnemonic()
                );
                self.err(CompileError::NotLowered {
                    instr: kind.mnemonic().to_string(),
                    method: self.decl.name.clone(),
                });
            }
            Instr::Invoke { owner, name, argc } => self.invoke(owner, name, *argc),
            Instr::Return => self.buf.op(Opcode::RetSub),
        }
    }

    /// Pack a front-end constant into one word. Strings take up to 8 bytes,
    /// little-endian; `null` is 0.
    fn pack_const(&mut self, c: &Const) -> i64 {
        match c {
            Const::Long(v) => *v,
            Const::Null => 0,
            Const::Str(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > 8 {
                    self.err(CompileError::StringTooLong {
                        literal: s.clone(),
                        method: self.decl.name.clone(),
                    });
                    return 0;
                }
                let mut word = [0u8; 8];
                word[..bytes.len()].copy_from_slice(bytes);
                i64::from_le_bytes(word)
            }
        }
    }

    fn store_local(&mut self, slot: u16) {
        let Some(value) = self.pop() else { return };
        if slot == 0 {
            self.err(CompileError::ReceiverNotAddressable {
                name: "this".to_string(),
                method: self.decl.name.clone(),
            });
            return;
        }
        let dst = self.temps.local(slot);
        self.set_into(dst, &value);
    }

    fn field_slot(&self, name: &str) -> Option<(u32, u32)> {
        self.ctx.layout.field(name).map(|s| (s.addr, s.words))
    }

    fn get_field(&mut self, name: &str) {
        let _receiver = self.pop();
        match self.field_slot(name) {
            Some((addr, words)) => self.push(Operand::Addr { addr, words }),
            None => {
                self.err(CompileError::UnknownField {
                    field: name.to_string(),
                    method: self.decl.name.clone(),
                });
                self.push(Operand::Const(0));
            }
        }
    }

    fn put_field(&mut self, name: &str) {
        let Some(value) = self.pop() else { return };
        let _receiver = self.pop();
        let Some((addr, words)) = self.field_slot(name) else {
            self.err(CompileError::UnknownField {
                field: name.to_string(),
                method: self.decl.name.clone(),
            });
            return;
        };
        if words == 1 {
            self.set_into(addr, &value);
        } else {
            // 256-bit store: word-by-word copy from another wide value.
            let Some(src) = self.resolve_wide(&value) else {
                return;
            };
            for k in 0..words {
                self.buf.op_addr_addr(Opcode::SetDat, addr + k, src + k);
            }
        }
    }

    fn arith(&mut self, op: ArithOp) {
        let Some(right) = self.pop() else { return };
        let Some(left) = self.pop() else { return };
        let Some(right_addr) = self.resolve_word(&right) else {
            return;
        };
        // ret := left, then ret OP= right. Left-then-right is load-bearing
        // for sub, div and mod.
        let ret = self.temps.alloc();
        self.set_into(ret, &left);
        let opcode = match op {
            ArithOp::Add => Opcode::AddDat,
            ArithOp::Sub => Opcode::SubDat,
            ArithOp::Mul => Opcode::MulDat,
            ArithOp::Div => Opcode::DivDat,
            ArithOp::Mod => Opcode::ModDat,
        };
        self.buf.op_addr_addr(opcode, ret, right_addr);
        self.push(Operand::Addr {
            addr: ret,
            words: 1,
        });
    }

    fn neg(&mut self) {
        let Some(value) = self.pop() else { return };
        let Some(addr) = self.resolve_word(&value) else {
            return;
        };
        let ret = self.temps.alloc();
        self.buf.op_addr(Opcode::ClrDat, ret);
        self.buf.op_addr_addr(Opcode::SubDat, ret, addr);
        self.push(Operand::Addr {
            addr: ret,
            words: 1,
        });
    }

    fn dup(&mut self) {
        match self.stack.last() {
            Some(top) => {
                let alias = Rc::clone(top);
                self.stack.push(alias);
            }
            None => self.err(CompileError::StackUnderflow {
                method: self.decl.name.clone(),
            }),
        }
    }

    // ── Invocation ───────────────────────────────────────────────────────

    fn invoke(&mut self, owner: &str, name: &str, argc: u8) {
        let owner_ty = ValueType::from_name(owner, &self.ctx.unit.name);
        if let Some(intr) = intrinsics::lookup(&owner_ty, name) {
            if intr.args != argc {
                self.unknown_method(owner, name);
                return;
            }
            self.emit_intrinsic(&intr);
        } else if owner_ty == ValueType::Contract
            && self.ctx.unit.methods.iter().any(|m| m.name == name)
        {
            self.user_call(name, argc);
        } else {
            self.unknown_method(owner, name);
        }
    }

    fn unknown_method(&mut self, owner: &str, name: &str) {
        self.err(CompileError::UnknownMethod {
            owner: owner.to_string(),
            name: name.to_string(),
            method: self.decl.name.clone(),
        });
    }

    /// Call a method of the contract itself: copy arguments into the
    /// callee's local-slot addresses, then emit the call with a placeholder
    /// target to be backfilled by the linker.
    fn user_call(&mut self, name: &str, argc: u8) {
        for slot in (1..=u32::from(argc)).rev() {
            let Some(arg) = self.pop() else { return };
            let dst = self.ctx.layout.temp_base + slot - 1;
            self.set_into(dst, &arg);
        }
        let _receiver = self.pop();
        let patch_offset = self.buf.jump(Opcode::JmpSub, 0);
        self.pending.push(PendingCall {
            target: name.to_string(),
            patch_offset,
        });
    }

    // ── Intrinsic rules ──────────────────────────────────────────────────

    fn emit_intrinsic(&mut self, intr: &Intrinsic) {
        match intr.kind {
            IntrinsicKind::CurrentTx => {
                let _receiver = self.pop();
                let addr = self.ctx.layout.last_tx;
                self.push(Operand::Addr { addr, words: 1 });
            }
            IntrinsicKind::CurrentTxTimestamp => {
                let _receiver = self.pop();
                let addr = self.ctx.layout.last_tx_timestamp;
                self.push(Operand::Addr { addr, words: 1 });
            }
            IntrinsicKind::ChainQuery(fun) => {
                let _receiver = self.pop();
                let ret = self.temps.alloc();
                self.buf.ext_fun_ret(fun, ret);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 1,
                });
            }
            IntrinsicKind::CreatorAddress => {
                let _receiver = self.pop();
                self.buf.ext_fun(ApiFun::BToAddressOfCreator);
                let ret = self.temps.alloc();
                self.buf.ext_fun_ret(ApiFun::GetB1, ret);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 1,
                });
            }
            IntrinsicKind::SendAmount => {
                let Some(addr_op) = self.pop() else { return };
                let Some(amount_op) = self.pop() else { return };
                let _receiver = self.pop();
                let Some(addr) = self.resolve_word(&addr_op) else {
                    return;
                };
                let Some(amount) = self.resolve_word(&amount_op) else {
                    return;
                };
                self.buf.ext_fun_dat(ApiFun::SetB1, addr);
                self.buf.ext_fun_dat(ApiFun::SendToAddressInB, amount);
            }
            IntrinsicKind::SendBalance => {
                let Some(addr_op) = self.pop() else { return };
                let _receiver = self.pop();
                let Some(addr) = self.resolve_word(&addr_op) else {
                    return;
                };
                self.buf.ext_fun_dat(ApiFun::SetB1, addr);
                self.buf.ext_fun(ApiFun::SendAllToAddressInB);
            }
            IntrinsicKind::SendMessage => {
                let Some(addr_op) = self.pop() else { return };
                let Some(msg_op) = self.pop() else { return };
                let _receiver = self.pop();
                let Some(addr) = self.resolve_word(&addr_op) else {
                    return;
                };
                let Some(msg) = self.resolve_wide(&msg_op) else {
                    return;
                };
                self.buf.ext_fun_dat(ApiFun::SetB1, addr);
                self.buf.ext_fun_dat2(ApiFun::SetA1A2, msg, msg + 1);
                self.buf.ext_fun_dat2(ApiFun::SetA3A4, msg + 2, msg + 3);
                self.buf.ext_fun(ApiFun::SendAToAddressInB);
            }
            IntrinsicKind::Sha256 => {
                let Some(msg_op) = self.pop() else { return };
                let _receiver = self.pop();
                let Some(msg) = self.resolve_wide(&msg_op) else {
                    return;
                };
                self.buf.ext_fun_dat2(ApiFun::SetA1A2, msg, msg + 1);
                self.buf.ext_fun_dat2(ApiFun::SetA3A4, msg + 2, msg + 3);
                self.buf.ext_fun(ApiFun::Sha256AToB);
                let ret = self.temps.alloc_wide(4);
                self.buf.ext_fun_ret(ApiFun::GetB1, ret);
                self.buf.ext_fun_ret(ApiFun::GetB2, ret + 1);
                self.buf.ext_fun_ret(ApiFun::GetB3, ret + 2);
                self.buf.ext_fun_ret(ApiFun::GetB4, ret + 3);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 4,
                });
            }
            IntrinsicKind::TxQuery(fun) => {
                let Some(tx_op) = self.pop() else { return };
                let Some(tx) = self.resolve_word(&tx_op) else {
                    return;
                };
                self.buf.ext_fun_dat(ApiFun::SetA1, tx);
                let ret = self.temps.alloc();
                self.buf.ext_fun_ret(fun, ret);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 1,
                });
            }
            IntrinsicKind::TxSender => {
                let Some(tx_op) = self.pop() else { return };
                let Some(tx) = self.resolve_word(&tx_op) else {
                    return;
                };
                self.buf.ext_fun_dat(ApiFun::SetA1, tx);
                self.buf.ext_fun(ApiFun::BToAddressOfTxInA);
                let ret = self.temps.alloc();
                self.buf.ext_fun_ret(ApiFun::GetB1, ret);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 1,
                });
            }
            IntrinsicKind::TxMessage => {
                let Some(tx_op) = self.pop() else { return };
                let Some(tx) = self.resolve_word(&tx_op) else {
                    return;
                };
                self.buf.ext_fun_dat(ApiFun::SetA1, tx);
                self.buf.ext_fun(ApiFun::MessageFromTxInAToB);
                let ret = self.temps.alloc_wide(4);
                self.buf.ext_fun_ret(ApiFun::GetB1, ret);
                self.buf.ext_fun_ret(ApiFun::GetB2, ret + 1);
                self.buf.ext_fun_ret(ApiFun::GetB3, ret + 2);
                self.buf.ext_fun_ret(ApiFun::GetB4, ret + 3);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 4,
                });
            }
            IntrinsicKind::CmpGe => self.compare(Opcode::Blt),
            IntrinsicKind::CmpLe => self.compare(Opcode::Bgt),
            IntrinsicKind::AddMinutes => {
                let Some(minutes_op) = self.pop() else { return };
                let Some(ts_op) = self.pop() else { return };
                let Some(minutes) = self.resolve_word(&minutes_op) else {
                    return;
                };
                let Some(ts) = self.resolve_word(&ts_op) else {
                    return;
                };
                let ret = self.temps.alloc();
                self.buf
                    .ext_fun_ret_dat2(ApiFun::AddMinutesToTimestamp, ret, ts, minutes);
                self.push(Operand::Addr {
                    addr: ret,
                    words: 1,
                });
            }
        }
    }

    /// Branch-around-increment: the result word is zeroed, the branch skips
    /// the increment exactly when its own condition holds, so the increment
    /// runs when the comparison being compiled holds. `skip_op` is the
    /// negation of the compiled comparison (`BLT` for `ge`, `BGT` for `le`).
    fn compare(&mut self, skip_op: Opcode) {
        let Some(right_op) = self.pop() else { return };
        let Some(left_op) = self.pop() else { return };
        let Some(right) = self.resolve_word(&right_op) else {
            return;
        };
        let Some(left) = self.resolve_word(&left_op) else {
            return;
        };
        let ret = self.temps.alloc();
        self.buf.op_addr(Opcode::ClrDat, ret);
        let skip = (skip_op.encoded_len() + Opcode::IncDat.encoded_len()) as i8;
        self.buf.branch(skip_op, left, right, skip);
        self.buf.op_addr(Opcode::IncDat, ret);
        self.push(Operand::Addr {
            addr: ret,
            words: 1,
        });
    }
}
