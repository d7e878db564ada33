//! Byte-level instruction emission.
//!
//! [`CodeBuf`] is purely mechanical: one call per instruction shape, each
//! appending the opcode byte and its little-endian operands. Emission never
//! validates semantics; callers that need to patch an operand later (call
//! sites) get its cursor position back.

use atc_isa::{ApiFun, Opcode, MAX_CODE_BYTES};

/// A growable method (or prologue) code buffer.
#[derive(Debug, Clone, Default)]
pub struct CodeBuf {
    bytes: Vec<u8>,
}

impl CodeBuf {
    pub fn new() -> CodeBuf {
        CodeBuf::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// True once the buffer alone exceeds the code-page budget.
    pub fn exceeds_budget(&self) -> bool {
        self.bytes.len() > MAX_CODE_BYTES
    }

    // ── Raw pieces ───────────────────────────────────────────────────────

    fn opcode(&mut self, op: Opcode) {
        self.bytes.push(op as u8);
    }

    fn addr(&mut self, addr: u32) {
        self.bytes.extend_from_slice(&addr.to_le_bytes());
    }

    fn imm(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn fun(&mut self, fun: ApiFun) {
        self.bytes.extend_from_slice(&fun.selector().to_le_bytes());
    }

    // ── Instruction shapes ───────────────────────────────────────────────

    /// `RET_SUB`, `FIN_IMD`, `SET_PCS`.
    pub fn op(&mut self, op: Opcode) {
        self.opcode(op);
    }

    /// `CLR_DAT`, `INC_DAT`, `FIZ_DAT` — one address operand.
    pub fn op_addr(&mut self, op: Opcode, addr: u32) {
        self.opcode(op);
        self.addr(addr);
    }

    /// `SET_DAT` and the arithmetic ops — destination then source.
    pub fn op_addr_addr(&mut self, op: Opcode, dst: u32, src: u32) {
        self.opcode(op);
        self.addr(dst);
        self.addr(src);
    }

    /// `SET_VAL @dst #imm`.
    pub fn set_val(&mut self, dst: u32, value: i64) {
        self.opcode(Opcode::SetVal);
        self.addr(dst);
        self.imm(value);
    }

    /// `JMP_SUB`/`JMP_ADR`. Returns the cursor position of the 4-byte code
    /// address, for call-site patching.
    pub fn jump(&mut self, op: Opcode, target: u32) -> usize {
        self.opcode(op);
        let at = self.bytes.len();
        self.addr(target);
        at
    }

    /// Conditional branch; `off` is relative to the instruction start.
    pub fn branch(&mut self, op: Opcode, a: u32, b: u32, off: i8) {
        self.opcode(op);
        self.addr(a);
        self.addr(b);
        self.bytes.push(off as u8);
    }

    pub fn ext_fun(&mut self, fun: ApiFun) {
        self.opcode(Opcode::ExtFun);
        self.fun(fun);
    }

    pub fn ext_fun_dat(&mut self, fun: ApiFun, input: u32) {
        self.opcode(Opcode::ExtFunDat);
        self.fun(fun);
        self.addr(input);
    }

    pub fn ext_fun_dat2(&mut self, fun: ApiFun, in1: u32, in2: u32) {
        self.opcode(Opcode::ExtFunDat2);
        self.fun(fun);
        self.addr(in1);
        self.addr(in2);
    }

    pub fn ext_fun_ret(&mut self, fun: ApiFun, out: u32) {
        self.opcode(Opcode::ExtFunRet);
        self.fun(fun);
        self.addr(out);
    }

    pub fn ext_fun_ret_dat2(&mut self, fun: ApiFun, out: u32, in1: u32, in2: u32) {
        self.opcode(Opcode::ExtFunRetDat2);
        self.fun(fun);
        self.addr(out);
        self.addr(in1);
        self.addr(in2);
    }

    /// Overwrite a previously emitted 4-byte code address.
    pub fn patch_code_addr(&mut self, at: usize, target: u32) {
        self.bytes[at..at + 4].copy_from_slice(&target.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_val_encoding() {
        let mut buf = CodeBuf::new();
        buf.set_val(4, -2);
        assert_eq!(buf.len(), Opcode::SetVal.encoded_len());
        assert_eq!(buf.bytes()[0], 0x01);
        assert_eq!(&buf.bytes()[1..5], &4u32.to_le_bytes());
        assert_eq!(&buf.bytes()[5..13], &(-2i64).to_le_bytes());
    }

    #[test]
    fn jump_returns_operand_offset_and_patches() {
        let mut buf = CodeBuf::new();
        buf.op(Opcode::RetSub);
        let at = buf.jump(Opcode::JmpSub, 0);
        assert_eq!(at, 2);
        buf.patch_code_addr(at, 0x0102_0304);
        assert_eq!(&buf.bytes()[2..6], &0x0102_0304u32.to_le_bytes());
    }

    #[test]
    fn branch_offset_is_one_signed_byte() {
        let mut buf = CodeBuf::new();
        buf.branch(Opcode::Blt, 1, 2, 15);
        assert_eq!(buf.len(), Opcode::Blt.encoded_len());
        assert_eq!(buf.bytes()[9], 15);

        let mut buf = CodeBuf::new();
        buf.branch(Opcode::Bgt, 1, 2, -3);
        assert_eq!(buf.bytes()[9], 0xfd);
    }

    #[test]
    fn ext_fun_selector_is_le() {
        let mut buf = CodeBuf::new();
        buf.ext_fun_ret(ApiFun::GetBlockTimestamp, 9);
        assert_eq!(buf.bytes()[0], 0x35);
        assert_eq!(&buf.bytes()[1..3], &0x0300u16.to_le_bytes());
        assert_eq!(&buf.bytes()[3..7], &9u32.to_le_bytes());
    }
}
