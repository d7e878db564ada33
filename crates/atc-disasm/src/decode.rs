//! Structured decoding of the flat code image.

use atc_isa::{Opcode, OperandKind};

use crate::DisasmError;

/// One decoded operand, tagged with the kind the opcode table declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedOperand {
    /// Read-write word address.
    Dst(u32),
    /// Read-only word address.
    Src(u32),
    /// 8-byte immediate.
    Imm(i64),
    /// Absolute byte offset into code.
    Code(u32),
    /// Signed offset relative to the instruction start.
    BranchOff(i8),
    /// External-function selector.
    Fun(u16),
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstr {
    /// Byte offset of the opcode in the image.
    pub offset: usize,
    pub op: Opcode,
    pub operands: Vec<DecodedOperand>,
}

/// Decode an entire code image. Fails on the first unknown opcode or
/// truncated instruction — partial decodes would misrepresent the program.
pub fn decode(code: &[u8]) -> Result<Vec<DecodedInstr>, DisasmError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < code.len() {
        let op = Opcode::try_from(code[pos]).map_err(|opcode| DisasmError::UnknownOpcode {
            opcode,
            offset: pos,
        })?;
        let len = op.encoded_len();
        if pos + len > code.len() {
            return Err(DisasmError::Truncated {
                offset: pos,
                mnemonic: op.mnemonic(),
                needed: len,
            });
        }

        let mut cursor = pos + 1;
        let mut operands = Vec::with_capacity(op.operands().len());
        for kind in op.operands() {
            operands.push(read_operand(*kind, code, &mut cursor));
        }
        out.push(DecodedInstr {
            offset: pos,
            op,
            operands,
        });
        pos += len;
    }
    Ok(out)
}

fn read_operand(kind: OperandKind, code: &[u8], cursor: &mut usize) -> DecodedOperand {
    let at = *cursor;
    *cursor += kind.width();
    match kind {
        OperandKind::DstAddr => DecodedOperand::Dst(read_u32(code, at)),
        OperandKind::SrcAddr => DecodedOperand::Src(read_u32(code, at)),
        OperandKind::CodeAddr => DecodedOperand::Code(read_u32(code, at)),
        OperandKind::Imm => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&code[at..at + 8]);
            DecodedOperand::Imm(i64::from_le_bytes(bytes))
        }
        OperandKind::BranchOff => DecodedOperand::BranchOff(code[at] as i8),
        OperandKind::FunSel => {
            DecodedOperand::Fun(u16::from_le_bytes([code[at], code[at + 1]]))
        }
    }
}

fn read_u32(code: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&code[at..at + 4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_opcode() {
        assert_eq!(
            decode(&[0xff]),
            Err(DisasmError::UnknownOpcode {
                opcode: 0xff,
                offset: 0
            })
        );
    }

    #[test]
    fn rejects_truncated_tail() {
        // SET_VAL needs 13 bytes; give it 3.
        let err = decode(&[0x01, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            DisasmError::Truncated {
                offset: 0,
                mnemonic: "SET_VAL",
                needed: 13
            }
        );
    }

    #[test]
    fn decodes_back_to_back_instructions() {
        // CLR_DAT @2 ; RET_SUB
        let mut code = vec![0x03];
        code.extend_from_slice(&2u32.to_le_bytes());
        code.push(0x13);
        let instrs = decode(&code).unwrap();
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].operands, vec![DecodedOperand::Dst(2)]);
        assert_eq!(instrs[1].offset, 5);
        assert!(instrs[1].operands.is_empty());
    }
}
