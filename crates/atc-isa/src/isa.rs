//! Opcode catalogue and external-function selectors.

use std::fmt;

// ══════════════════════════════════════════════════════════════════════════════
// Operand kinds
// ══════════════════════════════════════════════════════════════════════════════

/// Kind of one encoded operand. The kind fixes both the byte width and the
/// sigil the disassembler renders (`@`, `$`, `#`, `:`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Read-write word address (`@addr`), 4 bytes LE.
    DstAddr,
    /// Read-only word address (`$addr`), 4 bytes LE.
    SrcAddr,
    /// 8-byte LE immediate (`#literal`).
    Imm,
    /// Byte offset into code (`:label`), 4 bytes LE.
    CodeAddr,
    /// Signed 1-byte offset relative to the instruction start.
    BranchOff,
    /// 2-byte LE external-function selector.
    FunSel,
}

impl OperandKind {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            OperandKind::DstAddr | OperandKind::SrcAddr | OperandKind::CodeAddr => 4,
            OperandKind::Imm => 8,
            OperandKind::BranchOff => 1,
            OperandKind::FunSel => 2,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Opcodes
// ══════════════════════════════════════════════════════════════════════════════

/// Every instruction the backend can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// SET_VAL @dst #imm ; dst = imm
    SetVal = 0x01,
    /// SET_DAT @dst $src ; dst = src
    SetDat = 0x02,
    /// CLR_DAT @dst ; dst = 0
    ClrDat = 0x03,
    /// INC_DAT @dst ; dst += 1
    IncDat = 0x04,
    /// ADD_DAT @dst $src ; dst += src
    AddDat = 0x06,
    /// SUB_DAT @dst $src ; dst -= src
    SubDat = 0x07,
    /// MUL_DAT @dst $src ; dst *= src
    MulDat = 0x08,
    /// DIV_DAT @dst $src ; dst /= src
    DivDat = 0x09,
    /// JMP_SUB :target ; push the return address and jump
    JmpSub = 0x12,
    /// RET_SUB ; return to the pushed address
    RetSub = 0x13,
    /// MOD_DAT @dst $src ; dst %= src
    ModDat = 0x16,
    /// JMP_ADR :target ; unconditional jump
    JmpAdr = 0x1a,
    /// BGT $a $b ±off ; branch if a > b
    Bgt = 0x1f,
    /// BLT $a $b ±off ; branch if a < b
    Blt = 0x20,
    /// FIZ_DAT $addr ; finish this activation if addr is zero
    FizDat = 0x26,
    /// FIN_IMD ; finish this activation
    FinImd = 0x28,
    /// SET_PCS ; set the resume point to the current program counter
    SetPcs = 0x30,
    /// EXT_FUN sel ; external function, no data operands
    ExtFun = 0x32,
    /// EXT_FUN_DAT sel $in ; external function, one input word
    ExtFunDat = 0x33,
    /// EXT_FUN_DAT_2 sel $in1 $in2 ; external function, two input words
    ExtFunDat2 = 0x34,
    /// EXT_FUN_RET sel @out ; external function writing one output word
    ExtFunRet = 0x35,
    /// EXT_FUN_RET_DAT_2 sel @out $in1 $in2 ; two inputs, one output
    ExtFunRetDat2 = 0x37,
}

/// All opcodes, for exhaustive table walks (round-trip tests, listings).
pub const ALL_OPCODES: &[Opcode] = &[
    Opcode::SetVal,
    Opcode::SetDat,
    Opcode::ClrDat,
    Opcode::IncDat,
    Opcode::AddDat,
    Opcode::SubDat,
    Opcode::MulDat,
    Opcode::DivDat,
    Opcode::JmpSub,
    Opcode::RetSub,
    Opcode::ModDat,
    Opcode::JmpAdr,
    Opcode::Bgt,
    Opcode::Blt,
    Opcode::FizDat,
    Opcode::FinImd,
    Opcode::SetPcs,
    Opcode::ExtFun,
    Opcode::ExtFunDat,
    Opcode::ExtFunDat2,
    Opcode::ExtFunRet,
    Opcode::ExtFunRetDat2,
];

impl Opcode {
    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::SetVal => "SET_VAL",
            Opcode::SetDat => "SET_DAT",
            Opcode::ClrDat => "CLR_DAT",
            Opcode::IncDat => "INC_DAT",
            Opcode::AddDat => "ADD_DAT",
            Opcode::SubDat => "SUB_DAT",
            Opcode::MulDat => "MUL_DAT",
            Opcode::DivDat => "DIV_DAT",
            Opcode::JmpSub => "JMP_SUB",
            Opcode::RetSub => "RET_SUB",
            Opcode::ModDat => "MOD_DAT",
            Opcode::JmpAdr => "JMP_ADR",
            Opcode::Bgt => "BGT",
            Opcode::Blt => "BLT",
            Opcode::FizDat => "FIZ_DAT",
            Opcode::FinImd => "FIN_IMD",
            Opcode::SetPcs => "SET_PCS",
            Opcode::ExtFun => "EXT_FUN",
            Opcode::ExtFunDat => "EXT_FUN_DAT",
            Opcode::ExtFunDat2 => "EXT_FUN_DAT_2",
            Opcode::ExtFunRet => "EXT_FUN_RET",
            Opcode::ExtFunRetDat2 => "EXT_FUN_RET_DAT_2",
        }
    }

    /// Operand kinds in encoding order.
    pub const fn operands(self) -> &'static [OperandKind] {
        use OperandKind::*;
        match self {
            Opcode::SetVal => &[DstAddr, Imm],
            Opcode::SetDat => &[DstAddr, SrcAddr],
            Opcode::ClrDat | Opcode::IncDat => &[DstAddr],
            Opcode::AddDat
            | Opcode::SubDat
            | Opcode::MulDat
            | Opcode::DivDat
            | Opcode::ModDat => &[DstAddr, SrcAddr],
            Opcode::JmpSub | Opcode::JmpAdr => &[CodeAddr],
            Opcode::RetSub | Opcode::FinImd | Opcode::SetPcs => &[],
            Opcode::Bgt | Opcode::Blt => &[SrcAddr, SrcAddr, BranchOff],
            Opcode::FizDat => &[SrcAddr],
            Opcode::ExtFun => &[FunSel],
            Opcode::ExtFunDat => &[FunSel, SrcAddr],
            Opcode::ExtFunDat2 => &[FunSel, SrcAddr, SrcAddr],
            Opcode::ExtFunRet => &[FunSel, DstAddr],
            Opcode::ExtFunRetDat2 => &[FunSel, DstAddr, SrcAddr, SrcAddr],
        }
    }

    /// Total encoded length of one instruction, opcode byte included.
    pub const fn encoded_len(self) -> usize {
        let mut len = 1;
        let ops = self.operands();
        let mut i = 0;
        while i < ops.len() {
            len += ops[i].width();
            i += 1;
        }
        len
    }
}

impl TryFrom<u8> for Opcode {
    /// The unrecognized opcode byte.
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let op = match value {
            0x01 => Opcode::SetVal,
            0x02 => Opcode::SetDat,
            0x03 => Opcode::ClrDat,
            0x04 => Opcode::IncDat,
            0x06 => Opcode::AddDat,
            0x07 => Opcode::SubDat,
            0x08 => Opcode::MulDat,
            0x09 => Opcode::DivDat,
            0x12 => Opcode::JmpSub,
            0x13 => Opcode::RetSub,
            0x16 => Opcode::ModDat,
            0x1a => Opcode::JmpAdr,
            0x1f => Opcode::Bgt,
            0x20 => Opcode::Blt,
            0x26 => Opcode::FizDat,
            0x28 => Opcode::FinImd,
            0x30 => Opcode::SetPcs,
            0x32 => Opcode::ExtFun,
            0x33 => Opcode::ExtFunDat,
            0x34 => Opcode::ExtFunDat2,
            0x35 => Opcode::ExtFunRet,
            0x37 => Opcode::ExtFunRetDat2,
            other => return Err(other),
        };
        Ok(op)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// External functions
// ══════════════════════════════════════════════════════════════════════════════

/// External-function selectors the VM exposes.
///
/// Selector ranges follow the VM's convention: 0x01xx manipulates the A/B
/// super-registers, 0x02xx hashes, 0x03xx queries the chain, 0x04xx moves
/// balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ApiFun {
    GetA1 = 0x0100,
    GetA2 = 0x0101,
    GetA3 = 0x0102,
    GetA4 = 0x0103,
    GetB1 = 0x0104,
    GetB2 = 0x0105,
    GetB3 = 0x0106,
    GetB4 = 0x0107,
    SetA1 = 0x0110,
    SetA2 = 0x0111,
    SetA3 = 0x0112,
    SetA4 = 0x0113,
    SetA1A2 = 0x0114,
    SetA3A4 = 0x0115,
    SetB1 = 0x0116,
    SetB2 = 0x0117,
    ClrA = 0x0120,
    ClrB = 0x0121,
    Sha256AToB = 0x0204,
    GetBlockTimestamp = 0x0300,
    GetCreationTimestamp = 0x0301,
    GetLastBlockTimestamp = 0x0302,
    ATxAfterTimestamp = 0x0304,
    GetTypeForTxInA = 0x0305,
    GetAmountForTxInA = 0x0306,
    GetTimestampForTxInA = 0x0307,
    MessageFromTxInAToB = 0x0309,
    BToAddressOfTxInA = 0x030a,
    BToAddressOfCreator = 0x030b,
    GetCurrentBalance = 0x0400,
    SendToAddressInB = 0x0402,
    SendAllToAddressInB = 0x0403,
    SendAToAddressInB = 0x0405,
    AddMinutesToTimestamp = 0x0406,
}

/// All selectors, for decode tables and listings.
pub const ALL_API_FUNS: &[ApiFun] = &[
    ApiFun::GetA1,
    ApiFun::GetA2,
    ApiFun::GetA3,
    ApiFun::GetA4,
    ApiFun::GetB1,
    ApiFun::GetB2,
    ApiFun::GetB3,
    ApiFun::GetB4,
    ApiFun::SetA1,
    ApiFun::SetA2,
    ApiFun::SetA3,
    ApiFun::SetA4,
    ApiFun::SetA1A2,
    ApiFun::SetA3A4,
    ApiFun::SetB1,
    ApiFun::SetB2,
    ApiFun::ClrA,
    ApiFun::ClrB,
    ApiFun::Sha256AToB,
    ApiFun::GetBlockTimestamp,
    ApiFun::GetCreationTimestamp,
    ApiFun::GetLastBlockTimestamp,
    ApiFun::ATxAfterTimestamp,
    ApiFun::GetTypeForTxInA,
    ApiFun::GetAmountForTxInA,
    ApiFun::GetTimestampForTxInA,
    ApiFun::MessageFromTxInAToB,
    ApiFun::BToAddressOfTxInA,
    ApiFun::BToAddressOfCreator,
    ApiFun::GetCurrentBalance,
    ApiFun::SendToAddressInB,
    ApiFun::SendAllToAddressInB,
    ApiFun::SendAToAddressInB,
    ApiFun::AddMinutesToTimestamp,
];

impl ApiFun {
    /// The 2-byte wire selector.
    pub const fn selector(self) -> u16 {
        self as u16
    }

    /// Listing name.
    pub const fn name(self) -> &'static str {
        match self {
            ApiFun::GetA1 => "GET_A1",
            ApiFun::GetA2 => "GET_A2",
            ApiFun::GetA3 => "GET_A3",
            ApiFun::GetA4 => "GET_A4",
            ApiFun::GetB1 => "GET_B1",
            ApiFun::GetB2 => "GET_B2",
            ApiFun::GetB3 => "GET_B3",
            ApiFun::GetB4 => "GET_B4",
            ApiFun::SetA1 => "SET_A1",
            ApiFun::SetA2 => "SET_A2",
            ApiFun::SetA3 => "SET_A3",
            ApiFun::SetA4 => "SET_A4",
            ApiFun::SetA1A2 => "SET_A1_A2",
            ApiFun::SetA3A4 => "SET_A3_A4",
            ApiFun::SetB1 => "SET_B1",
            ApiFun::SetB2 => "SET_B2",
            ApiFun::ClrA => "CLR_A",
            ApiFun::ClrB => "CLR_B",
            ApiFun::Sha256AToB => "SHA256_A_TO_B",
            ApiFun::GetBlockTimestamp => "GET_BLOCK_TIMESTAMP",
            ApiFun::GetCreationTimestamp => "GET_CREATION_TIMESTAMP",
            ApiFun::GetLastBlockTimestamp => "GET_LAST_BLOCK_TIMESTAMP",
            ApiFun::ATxAfterTimestamp => "A_TO_TX_AFTER_TIMESTAMP",
            ApiFun::GetTypeForTxInA => "GET_TYPE_FOR_TX_IN_A",
            ApiFun::GetAmountForTxInA => "GET_AMOUNT_FOR_TX_IN_A",
            ApiFun::GetTimestampForTxInA => "GET_TIMESTAMP_FOR_TX_IN_A",
            ApiFun::MessageFromTxInAToB => "MESSAGE_FROM_TX_IN_A_TO_B",
            ApiFun::BToAddressOfTxInA => "B_TO_ADDRESS_OF_TX_IN_A",
            ApiFun::BToAddressOfCreator => "B_TO_ADDRESS_OF_CREATOR",
            ApiFun::GetCurrentBalance => "GET_CURRENT_BALANCE",
            ApiFun::SendToAddressInB => "SEND_TO_ADDRESS_IN_B",
            ApiFun::SendAllToAddressInB => "SEND_ALL_TO_ADDRESS_IN_B",
            ApiFun::SendAToAddressInB => "SEND_A_TO_ADDRESS_IN_B",
            ApiFun::AddMinutesToTimestamp => "ADD_MINUTES_TO_TIMESTAMP",
        }
    }
}

impl TryFrom<u16> for ApiFun {
    /// The unrecognized selector.
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        ALL_API_FUNS
            .iter()
            .copied()
            .find(|f| f.selector() == value)
            .ok_or(value)
    }
}
