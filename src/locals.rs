//! The local variable model.
//!
//! Bytecode reuses local slots for unrelated variables with disjoint live
//! ranges, so a slot index alone does not identify a variable. Each
//! contiguous live range becomes one [`LocalInstance`], handed out behind an
//! `Rc`; two accesses name the same variable iff they resolve to the same
//! instance (`Rc::ptr_eq`), never by comparing slot indices.

use std::rc::Rc;

use crate::error::BodyError;
use crate::ir::{Insn, InsnSeq};
use crate::sig::{self, MethodSig, TypeSig};

/// One local variable: a slot paired with one contiguous live range.
///
/// `start`/`end` are sequence indices; `end` is exclusive.
#[derive(Debug)]
pub struct LocalInstance {
    pub slot: u16,
    pub name: String,
    pub ty: TypeSig,
    pub start: usize,
    pub end: usize,
}

impl LocalInstance {
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Identity comparison; the only meaningful equality between instances.
    pub fn same(a: &Rc<LocalInstance>, b: &Rc<LocalInstance>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

/// A declared local-variable-table row, as supplied by the external reader.
#[derive(Clone, Debug)]
pub struct LocalTableEntry {
    pub slot: u16,
    pub start_pc: u16,
    pub length: u16,
    pub name: String,
    pub descriptor: String,
}

/// Per-method mapping from (slot, position) to variable instances.
#[derive(Debug, Default)]
pub struct Locals {
    /// Instances per slot, ordered by range start.
    slots: Vec<Vec<Rc<LocalInstance>>>,
}

impl Locals {
    /// Build the model for one method.
    ///
    /// Parameter slots get whole-method instances seeded from the
    /// descriptor. Remaining slots use declared table rows when present and
    /// fall back to first-store/last-use inference otherwise.
    pub fn build(
        seq: &InsnSeq,
        class_name: &str,
        method_sig: &MethodSig,
        is_static: bool,
        table: &[LocalTableEntry],
    ) -> Result<Locals, BodyError> {
        let mut locals = Locals::default();
        let method_end = seq.len().max(1);

        let named = |slot: u16| -> Option<&LocalTableEntry> {
            table.iter().find(|e| e.slot == slot && e.start_pc == 0)
        };

        let mut slot = 0u16;
        if !is_static {
            let name = named(0).map(|e| e.name.clone()).unwrap_or_else(|| "this".into());
            locals.insert(Rc::new(LocalInstance {
                slot: 0,
                name,
                ty: TypeSig::Object(class_name.into()),
                start: 0,
                end: method_end,
            }))?;
            slot = 1;
        }
        for (i, param) in method_sig.params.iter().enumerate() {
            let name = named(slot)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| format!("param{}", i));
            locals.insert(Rc::new(LocalInstance {
                slot,
                name,
                ty: param.clone(),
                start: 0,
                end: method_end,
            }))?;
            slot += if param.is_wide() { 2 } else { 1 };
        }

        // Declared ranges for non-parameter slots; rows with start_pc 0 on a
        // parameter slot were already consumed as parameter names above.
        for row in table {
            if row.start_pc == 0 && locals.has_slot(row.slot) {
                continue;
            }
            let start = seq.index_of_pos(row.start_pc as u32);
            let end = seq
                .index_of_pos(row.start_pc as u32 + row.length as u32)
                .max(start + 1);
            locals.insert(Rc::new(LocalInstance {
                slot: row.slot,
                name: row.name.clone(),
                ty: sig::parse_type(&row.descriptor)?,
                start,
                end,
            }))?;
        }

        locals.infer_remaining(seq, method_end);
        Ok(locals)
    }

    fn has_slot(&self, slot: u16) -> bool {
        self.slots
            .get(slot as usize)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// One inferred instance per slot that has accesses but no declared or
    /// parameter instance: first store to last use.
    fn infer_remaining(&mut self, seq: &InsnSeq, method_end: usize) {
        let mut seen: Vec<(u16, usize, usize, TypeSig)> = Vec::new();
        for (index, entry) in seq.entries().iter().enumerate() {
            let (slot, ty) = match &entry.insn {
                Insn::LocalLoad { slot, ty } | Insn::LocalStore { slot, ty } => {
                    (*slot, ty.clone())
                }
                Insn::Iinc { slot, .. } => (*slot, TypeSig::Int),
                _ => continue,
            };
            if self.has_slot(slot) {
                continue;
            }
            match seen.iter_mut().find(|(s, ..)| *s == slot) {
                Some((_, _, last, _)) => *last = index,
                None => seen.push((slot, index, index, ty)),
            }
        }
        for (slot, first, last, ty) in seen {
            let instance = Rc::new(LocalInstance {
                slot,
                name: format!("var{}", slot),
                ty,
                start: first,
                end: (last + 1).min(method_end),
            });
            // Inferred slots cannot overlap: one instance per slot.
            let _ = self.insert(instance);
        }
    }

    fn insert(&mut self, instance: Rc<LocalInstance>) -> Result<(), BodyError> {
        let slot = instance.slot as usize;
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, Vec::new);
        }
        let ranges = &mut self.slots[slot];
        for existing in ranges.iter() {
            if instance.start < existing.end && existing.start < instance.end {
                return Err(BodyError::OverlappingLocals { slot: instance.slot });
            }
        }
        ranges.push(instance);
        ranges.sort_by_key(|i| i.start);
        Ok(())
    }

    /// The instance live for a read of `slot` at sequence index `pos`.
    pub fn resolve(&self, slot: u16, pos: usize) -> Result<Rc<LocalInstance>, BodyError> {
        self.slots
            .get(slot as usize)
            .and_then(|ranges| ranges.iter().find(|i| i.contains(pos)))
            .cloned()
            .ok_or(BodyError::UnresolvedLocal { slot, pos })
    }

    /// Like [`Locals::resolve`] but for a store: a declared scope opens just
    /// after its defining store, so the entry after the store wins.
    pub fn resolve_store(&self, slot: u16, pos: usize) -> Result<Rc<LocalInstance>, BodyError> {
        self.resolve(slot, pos + 1)
            .or_else(|_| self.resolve(slot, pos))
            .map_err(|_| BodyError::UnresolvedLocal { slot, pos })
    }

    /// All instances, ordered by slot then range start.
    pub fn instances(&self) -> impl Iterator<Item = &Rc<LocalInstance>> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::decode_bytes;
    use crate::raw::{Constant, ConstantResolver};

    struct EmptyPool;

    impl ConstantResolver for EmptyPool {
        fn constant(&self, _: u16) -> Option<Constant> {
            None
        }
        fn class_name(&self, _: u16) -> Option<String> {
            None
        }
        fn field_ref(&self, _: u16) -> Option<(String, String, String)> {
            None
        }
        fn method_ref(&self, _: u16) -> Option<(String, String, String)> {
            None
        }
        fn dynamic_ref(&self, _: u16) -> Option<(String, String)> {
            None
        }
    }

    fn sig_of(desc: &str) -> MethodSig {
        sig::parse_method(desc).unwrap()
    }

    #[test]
    fn parameters_cover_the_whole_method() {
        // static (II)I: iload_0; iload_1; iadd; ireturn
        let seq = decode_bytes(&[0x1a, 0x1b, 0x60, 0xac], &EmptyPool).unwrap();
        let locals = Locals::build(&seq, "test/Sample", &sig_of("(II)I"), true, &[]).unwrap();
        let a = locals.resolve(0, 0).unwrap();
        let b = locals.resolve(1, 1).unwrap();
        assert_eq!(a.name, "param0");
        assert_eq!(b.name, "param1");
        assert!(LocalInstance::same(&a, &locals.resolve(0, 3).unwrap()));
    }

    #[test]
    fn wide_parameters_take_two_slots() {
        // static (JI)V
        let seq = decode_bytes(&[0xb1], &EmptyPool).unwrap();
        let locals = Locals::build(&seq, "test/Sample", &sig_of("(JI)V"), false, &[]).unwrap();
        // this=0, long=1..2, int=3
        let this = locals.resolve(0, 0).unwrap();
        assert_eq!(this.name, "this");
        assert_eq!(this.ty, TypeSig::Object("test/Sample".into()));
        assert_eq!(locals.resolve(1, 0).unwrap().ty, TypeSig::Long);
        assert_eq!(locals.resolve(3, 0).unwrap().ty, TypeSig::Int);
    }

    #[test]
    fn same_slot_disjoint_ranges_are_distinct_instances() {
        // static ()V: iconst_0; istore_0; iconst_1; istore_0; return
        let seq = decode_bytes(&[0x03, 0x3b, 0x04, 0x3b, 0xb1], &EmptyPool).unwrap();
        let table = [
            LocalTableEntry {
                slot: 0,
                start_pc: 2,
                length: 2,
                name: "first".into(),
                descriptor: "I".into(),
            },
            LocalTableEntry {
                slot: 0,
                start_pc: 4,
                length: 1,
                name: "second".into(),
                descriptor: "I".into(),
            },
        ];
        let locals = Locals::build(&seq, "test/Sample", &sig_of("()V"), true, &table).unwrap();
        let first = locals.resolve_store(0, 1).unwrap();
        let second = locals.resolve_store(0, 3).unwrap();
        assert_eq!(first.name, "first");
        assert_eq!(second.name, "second");
        assert!(!LocalInstance::same(&first, &second));
        // Same range resolves to the same instance.
        assert!(LocalInstance::same(&first, &locals.resolve(0, 2).unwrap()));
    }

    #[test]
    fn overlapping_declared_ranges_are_rejected() {
        let seq = decode_bytes(&[0x03, 0x3b, 0x04, 0x3b, 0xb1], &EmptyPool).unwrap();
        let table = [
            LocalTableEntry {
                slot: 0,
                start_pc: 1,
                length: 3,
                name: "a".into(),
                descriptor: "I".into(),
            },
            LocalTableEntry {
                slot: 0,
                start_pc: 2,
                length: 3,
                name: "b".into(),
                descriptor: "I".into(),
            },
        ];
        let err = Locals::build(&seq, "test/Sample", &sig_of("()V"), true, &table).unwrap_err();
        assert_eq!(err, BodyError::OverlappingLocals { slot: 0 });
    }

    #[test]
    fn inference_covers_undeclared_slots() {
        // static ()I: iconst_2; istore_0; iload_0; ireturn
        let seq = decode_bytes(&[0x05, 0x3b, 0x1a, 0xac], &EmptyPool).unwrap();
        let locals = Locals::build(&seq, "test/Sample", &sig_of("()I"), true, &[]).unwrap();
        let var = locals.resolve(0, 2).unwrap();
        assert_eq!(var.name, "var0");
        assert_eq!(var.ty, TypeSig::Int);
        assert!(LocalInstance::same(&var, &locals.resolve_store(0, 1).unwrap()));
        assert!(locals.resolve(9, 0).is_err());
    }
}
