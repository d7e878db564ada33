//! Backend error types.
//!
//! Errors are collected, not thrown: every stage records problems into an
//! [`ErrorSink`] and keeps going, so one compile surfaces the full error set.
//! Deployment tooling consumes these as JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of errors stored before only the total is counted.
pub const MAX_STORED_ERRORS: usize = 20;

/// Error category, used by callers that triage rather than print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Wrong/missing base type, missing handler, malformed method body.
    Structural,
    /// Unsupported field type, arity violation, literal that does not fit.
    Type,
    /// Unknown field/method name, unresolved call target after linking.
    Reference,
    /// Emitted output exceeds a page budget.
    Capacity,
    /// A construct the backend deliberately does not lower.
    Unsupported,
}

/// A problem detected during compilation.
///
/// Every variant names the offending entity so a caller can act on the
/// message without parsing it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum CompileError {
    #[error("contract `{contract}` must extend `{expected}`, found `{found}`")]
    WrongParent {
        contract: String,
        expected: String,
        found: String,
    },

    #[error("contract has no `{handler}` method for the prologue to dispatch to")]
    MissingHandler { handler: String },

    #[error("operand stack underflow in method `{method}`")]
    StackUnderflow { method: String },

    #[error("field `{field}` has unsupported type `{ty}`")]
    UnsupportedFieldType { field: String, ty: String },

    #[error("method `{method}` declares {arity} parameters; at most {max} are allowed")]
    ArityExceeded { method: String, arity: u8, max: u8 },

    #[error("string literal `{literal}` in method `{method}` does not fit in one word")]
    StringTooLong { literal: String, method: String },

    #[error("operand width mismatch on a 256-bit value in method `{method}`")]
    WidthMismatch { method: String },

    #[error("unknown field `{field}` referenced from method `{method}`")]
    UnknownField { field: String, method: String },

    #[error("unrecognized method `{owner}.{name}` called from `{method}`")]
    UnknownMethod {
        owner: String,
        name: String,
        method: String,
    },

    #[error("call target `{target}` from method `{method}` has no entry address")]
    UnresolvedCall { target: String, method: String },

    #[error("code size {size} bytes exceeds the {max}-byte budget")]
    CodeBudgetExceeded { size: usize, max: usize },

    #[error("data size {words} words exceeds the {max}-word budget")]
    DataBudgetExceeded { words: u32, max: u32 },

    #[error("instruction `{instr}` in method `{method}` cannot be lowered")]
    NotLowered { instr: String, method: String },

    #[error("receiver of `{name}` in method `{method}` has no address")]
    ReceiverNotAddressable { name: String, method: String },
}

impl CompileError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::WrongParent { .. }
            | CompileError::MissingHandler { .. }
            | CompileError::StackUnderflow { .. } => ErrorKind::Structural,
            CompileError::UnsupportedFieldType { .. }
            | CompileError::ArityExceeded { .. }
            | CompileError::StringTooLong { .. }
            | CompileError::WidthMismatch { .. } => ErrorKind::Type,
            CompileError::UnknownField { .. }
            | CompileError::UnknownMethod { .. }
            | CompileError::UnresolvedCall { .. } => ErrorKind::Reference,
            CompileError::CodeBudgetExceeded { .. }
            | CompileError::DataBudgetExceeded { .. } => ErrorKind::Capacity,
            CompileError::NotLowered { .. } | CompileError::ReceiverNotAddressable { .. } => {
                ErrorKind::Unsupported
            }
        }
    }
}

/// Collects [`CompileError`]s across all compilation stages.
///
/// Stores at most [`MAX_STORED_ERRORS`] but always counts the true total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorSink {
    pub errors: Vec<CompileError>,
    pub total: usize,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error, respecting the storage cap.
    pub fn push(&mut self, error: CompileError) {
        if self.errors.len() < MAX_STORED_ERRORS {
            self.errors.push(error);
        }
        self.total += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.total > 0
    }

    /// Consume the sink, yielding the stored errors.
    pub fn into_errors(self) -> Vec<CompileError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification() {
        let e = CompileError::WrongParent {
            contract: "C".into(),
            expected: "Contract".into(),
            found: "Object".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Structural);

        let e = CompileError::UnknownMethod {
            owner: "Contract".into(),
            name: "frobnicate".into(),
            method: "txReceived".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Reference);

        let e = CompileError::CodeBudgetExceeded {
            size: 4096,
            max: 2560,
        };
        assert_eq!(e.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn sink_caps_storage_but_counts_all() {
        let mut sink = ErrorSink::new();
        for i in 0..25 {
            sink.push(CompileError::UnknownField {
                field: format!("f{i}"),
                method: "txReceived".into(),
            });
        }
        assert_eq!(sink.errors.len(), MAX_STORED_ERRORS);
        assert_eq!(sink.total, 25);
        assert!(sink.has_errors());
    }

    #[test]
    fn error_serializes_with_tag() {
        let e = CompileError::ArityExceeded {
            method: "setup".into(),
            arity: 4,
            max: 3,
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"error\":\"arity_exceeded\""));
        let back: CompileError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
