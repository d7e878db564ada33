//! Textual listing generation.

use std::collections::BTreeMap;
use std::fmt::Write;

use atc_codegen::CompiledProgram;
use atc_isa::ApiFun;

use crate::decode::{decode, DecodedOperand};
use crate::DisasmError;

/// Render a compiled program as a deterministic labeled listing: one
/// `^declare` line per allocated data word, then one line per instruction.
pub fn disassemble(program: &CompiledProgram) -> Result<String, DisasmError> {
    let instrs = decode(&program.code)?;

    // entry offset → method name, for `:label` resolution.
    let methods: BTreeMap<u32, &str> = program
        .method_symbols
        .iter()
        .map(|(name, &entry)| (entry, name.as_str()))
        .collect();

    let mut out = String::new();
    for name in &program.data_names {
        let _ = writeln!(out, "^declare {name}");
    }

    for instr in &instrs {
        let _ = write!(out, "l{:04x}: {}", instr.offset, instr.op.mnemonic());
        for operand in &instr.operands {
            let _ = write!(out, " {}", render(program, &methods, instr.offset, *operand));
        }
        out.push('\n');
    }
    Ok(out)
}

fn render(
    program: &CompiledProgram,
    methods: &BTreeMap<u32, &str>,
    instr_offset: usize,
    operand: DecodedOperand,
) -> String {
    match operand {
        DecodedOperand::Dst(addr) => format!("@{}", word_name(program, addr)),
        DecodedOperand::Src(addr) => format!("${}", word_name(program, addr)),
        DecodedOperand::Imm(value) => format!("#{value}"),
        DecodedOperand::Code(target) => format!(":{}", code_label(methods, target)),
        DecodedOperand::BranchOff(off) => {
            let target = instr_offset as i64 + i64::from(off);
            format!(":l{target:04x}")
        }
        DecodedOperand::Fun(selector) => match ApiFun::try_from(selector) {
            Ok(fun) => fun.name().to_string(),
            Err(raw) => format!("0x{raw:04x}"),
        },
    }
}

/// A data word's symbol, or the bare address when the tables don't know it.
fn word_name(program: &CompiledProgram, addr: u32) -> String {
    match program.data_names.get(addr as usize) {
        Some(name) => name.clone(),
        None => addr.to_string(),
    }
}

fn code_label(methods: &BTreeMap<u32, &str>, target: u32) -> String {
    match methods.get(&target) {
        Some(name) => (*name).to_string(),
        None => format!("l{target:04x}"),
    }
}
