//! Persistent and scratch address allocation.
//!
//! Data memory is laid out once per contract:
//!
//! ```text
//! word 0 ..            — fields, in declaration order, width per type
//! next two words       — reserved: last dispatched tx timestamp, last tx
//! temp_base ..         — shared per-method scratch region
//! ```
//!
//! The temp region is *shared*: every method's scratch addresses are seeded
//! from the same base and overlap deliberately, because the VM never runs
//! two methods of one contract concurrently.

use std::collections::BTreeMap;

use atc_ir::{CompileError, ContractUnit, ErrorSink, EXPECTED_PARENT};

/// Symbol name of the reserved "last dispatched transaction timestamp" word.
pub const RESERVED_LAST_TX_TIMESTAMP: &str = "lastTxTimestamp";

/// Symbol name of the reserved "last dispatched transaction" word.
pub const RESERVED_LAST_TX: &str = "lastTx";

/// One allocated field: its first word address and its width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: String,
    pub addr: u32,
    pub words: u32,
}

/// The contract's fixed data-memory layout.
#[derive(Debug, Clone)]
pub struct DataLayout {
    slots: Vec<FieldSlot>,
    /// Reserved word read/written by the dispatch prologue.
    pub last_tx_timestamp: u32,
    /// Reserved word holding the transaction currently being dispatched.
    pub last_tx: u32,
    /// First word of the shared scratch region.
    pub temp_base: u32,
}

impl DataLayout {
    /// Allocate addresses for every declared field, in order.
    ///
    /// Unsupported field types and a wrong superclass are recorded and
    /// skipped; allocation always runs to completion.
    pub fn build(unit: &ContractUnit, errors: &mut ErrorSink) -> DataLayout {
        if unit.parent != EXPECTED_PARENT {
            errors.push(CompileError::WrongParent {
                contract: unit.name.clone(),
                expected: EXPECTED_PARENT.to_string(),
                found: unit.parent.clone(),
            });
        }

        let mut slots = Vec::with_capacity(unit.fields.len());
        let mut next = 0u32;
        for field in &unit.fields {
            match field.ty.word_width() {
                Some(words) => {
                    slots.push(FieldSlot {
                        name: field.name.clone(),
                        addr: next,
                        words,
                    });
                    next += words;
                }
                None => errors.push(CompileError::UnsupportedFieldType {
                    field: field.name.clone(),
                    ty: field.ty.to_string(),
                }),
            }
        }

        let last_tx_timestamp = next;
        let last_tx = next + 1;
        DataLayout {
            slots,
            last_tx_timestamp,
            last_tx,
            temp_base: next + 2,
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn fields(&self) -> &[FieldSlot] {
        &self.slots
    }

    /// Field symbol table: name → first word address.
    pub fn symbols(&self) -> BTreeMap<String, u32> {
        self.slots
            .iter()
            .map(|s| (s.name.clone(), s.addr))
            .collect()
    }
}

/// Per-method scratch allocation cursor.
///
/// Seeded from the shared [`DataLayout::temp_base`]; local slots occupy the
/// front of the region, scratch temps follow. A fresh `TempAlloc` is created
/// for every method compilation — the cursor is never carried across
/// methods.
#[derive(Debug, Clone)]
pub struct TempAlloc {
    base: u32,
    next: u32,
}

impl TempAlloc {
    /// `local_words` is the number of addressable local slots (the receiver
    /// slot excluded); scratch allocation starts after them.
    pub fn new(base: u32, local_words: u32) -> TempAlloc {
        TempAlloc {
            base,
            next: local_words,
        }
    }

    /// Address of local slot `slot` (slot 0, the receiver, has no address).
    pub fn local(&self, slot: u16) -> u32 {
        debug_assert!(slot > 0);
        self.base + u32::from(slot) - 1
    }

    /// Allocate one fresh scratch word.
    pub fn alloc(&mut self) -> u32 {
        let addr = self.base + self.next;
        self.next += 1;
        addr
    }

    /// Allocate `words` consecutive scratch words; returns the first.
    pub fn alloc_wide(&mut self, words: u32) -> u32 {
        let addr = self.base + self.next;
        self.next += words;
        addr
    }

    /// Words consumed so far (locals + scratch), for the data high-water mark.
    pub fn words_used(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atc_ir::{FieldDecl, ValueType};

    fn unit(fields: Vec<FieldDecl>) -> ContractUnit {
        ContractUnit {
            name: "Sample".into(),
            parent: EXPECTED_PARENT.into(),
            fields,
            methods: vec![],
        }
    }

    #[test]
    fn fields_are_contiguous_with_declared_widths() {
        let mut errors = ErrorSink::new();
        let layout = DataLayout::build(
            &unit(vec![
                FieldDecl::new("a", ValueType::Long),
                FieldDecl::new("hash", ValueType::Register),
                FieldDecl::new("b", ValueType::Boolean),
            ]),
            &mut errors,
        );
        assert!(!errors.has_errors());
        assert_eq!(layout.field("a").unwrap().addr, 0);
        assert_eq!(layout.field("hash").unwrap().addr, 1);
        assert_eq!(layout.field("hash").unwrap().words, 4);
        assert_eq!(layout.field("b").unwrap().addr, 5);
        assert_eq!(layout.last_tx_timestamp, 6);
        assert_eq!(layout.last_tx, 7);
        assert_eq!(layout.temp_base, 8);
    }

    #[test]
    fn unsupported_field_type_is_recorded_not_fatal() {
        let mut errors = ErrorSink::new();
        let layout = DataLayout::build(
            &unit(vec![
                FieldDecl::new("ok", ValueType::Long),
                FieldDecl::new("bad", ValueType::Other("String".into())),
                FieldDecl::new("also_ok", ValueType::Address),
            ]),
            &mut errors,
        );
        assert_eq!(errors.total, 1);
        assert!(layout.field("bad").is_none());
        assert_eq!(layout.field("also_ok").unwrap().addr, 1);
    }

    #[test]
    fn wrong_parent_is_a_structural_error() {
        let mut errors = ErrorSink::new();
        let mut u = unit(vec![]);
        u.parent = "Object".into();
        DataLayout::build(&u, &mut errors);
        assert_eq!(errors.errors.len(), 1);
        assert!(matches!(
            errors.errors[0],
            CompileError::WrongParent { .. }
        ));
    }

    #[test]
    fn temp_alloc_scratch_follows_locals() {
        let mut t = TempAlloc::new(10, 2);
        assert_eq!(t.local(1), 10);
        assert_eq!(t.local(2), 11);
        assert_eq!(t.alloc(), 12);
        assert_eq!(t.alloc_wide(4), 13);
        assert_eq!(t.alloc(), 17);
        assert_eq!(t.words_used(), 8);
    }
}
