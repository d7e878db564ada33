//! Compilation orchestration.
//!
//! [`compile`] runs the whole pipeline for one contract: allocate the data
//! layout, simulate every method body, link. All shared mutable state lives
//! in an explicit [`CompilerContext`] passed by reference through the
//! stages; nothing is ambient.

use log::debug;

use atc_ir::{CompileError, ContractUnit, ErrorSink, MAX_METHOD_ARITY};

use crate::alloc::DataLayout;
use crate::link::{self, CompiledProgram, MethodCode};
use crate::stack;

/// Shared compiler state for one contract.
///
/// The temp high-water mark is the *maximum* scratch usage over all methods,
/// not the sum — per-method temp regions share one base and overlap.
pub struct CompilerContext<'a> {
    pub unit: &'a ContractUnit,
    pub layout: DataLayout,
    pub methods: Vec<MethodCode>,
    pub errors: ErrorSink,
    pub temp_high_water: u32,
}

/// The result of one compile: the (possibly partial) program plus every
/// error encountered. The program is deployable only when the error list is
/// empty.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub program: CompiledProgram,
    pub errors: ErrorSink,
}

impl CompileOutput {
    pub fn is_deployable(&self) -> bool {
        !self.errors.has_errors()
    }
}

/// Compile one contract into a linked program.
///
/// Never aborts early: every stage records its errors and carries on, so the
/// caller sees the full error set in one pass.
pub fn compile(unit: &ContractUnit) -> CompileOutput {
    let mut errors = ErrorSink::new();
    let layout = DataLayout::build(unit, &mut errors);
    debug!(
        "contract `{}`: {} field words, temp base {}",
        unit.name,
        layout.temp_base - 2,
        layout.temp_base
    );

    let mut ctx = CompilerContext {
        unit,
        layout,
        methods: Vec::new(),
        errors,
        temp_high_water: 0,
    };

    for decl in &unit.methods {
        if decl.arity > MAX_METHOD_ARITY {
            ctx.errors.push(CompileError::ArityExceeded {
                method: decl.name.clone(),
                arity: decl.arity,
                max: MAX_METHOD_ARITY,
            });
            continue;
        }
        let code = stack::compile_method(&mut ctx, decl);
        ctx.methods.push(code);
    }

    let program = link::link(&mut ctx);
    CompileOutput {
        program,
        errors: ctx.errors,
    }
}
