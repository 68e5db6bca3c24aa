//! Statement-boundary segmentation by stack-balance analysis.
//!
//! A complete statement returns the virtual operand stack to the depth it
//! had before the statement began. Scanning backward from the end of a range
//! and accumulating each instruction's stack delta therefore finds the
//! earliest point at which the suffix balances to zero: that point is where
//! the range's last statement begins.

use crate::ir::effect;
use crate::ir::Entry;

/// Index at which the last statement in `entries` begins.
///
/// The scan starts from the final instruction's own delta; the boundary is
/// the entry just after the position where the running total reaches zero.
/// When no zero crossing exists the whole range is one statement.
pub fn start_of_last_statement(entries: &[Entry]) -> usize {
    if entries.is_empty() {
        return 0;
    }
    let mut required = effect::delta(&entries[entries.len() - 1].insn);
    for index in (0..entries.len() - 1).rev() {
        if required == 0 {
            return index + 1;
        }
        required += effect::delta(&entries[index].insn);
    }
    0
}

/// True when the range consumes values that must already be on the stack
/// before it starts — i.e. it is a trailing expression fragment, not a
/// self-contained statement list.
pub fn has_starting_requirement(entries: &[Entry]) -> bool {
    let mut size = 0i32;
    for entry in entries {
        size += effect::delta(&entry.insn);
        if size < 0 {
            return true;
        }
    }
    false
}

/// True when the range holds only meta markers and no actual logic. Such
/// ranges are discarded rather than emitted as empty statements.
pub fn is_empty_of_logic(entries: &[Entry]) -> bool {
    entries.iter().all(|e| e.insn.is_meta())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Insn};
    use crate::sig::TypeSig;

    fn seq(insns: Vec<Insn>) -> Vec<Entry> {
        insns
            .into_iter()
            .enumerate()
            .map(|(i, insn)| Entry { insn, pos: i as u32 })
            .collect()
    }

    fn load(slot: u16) -> Insn {
        Insn::LocalLoad { slot, ty: TypeSig::Int }
    }

    fn store(slot: u16) -> Insn {
        Insn::LocalStore { slot, ty: TypeSig::Int }
    }

    #[test]
    fn whole_range_is_one_statement() {
        // load a; load b; add; areturn — never balances before the start
        let entries = seq(vec![load(0), load(1), Insn::Op(BinaryOp::Add), Insn::ValueReturn]);
        assert_eq!(start_of_last_statement(&entries), 0);
    }

    #[test]
    fn boundary_after_balanced_prefix() {
        // [load a; store b] [load b; areturn]
        let entries = seq(vec![load(0), store(1), load(1), Insn::ValueReturn]);
        assert_eq!(start_of_last_statement(&entries), 2);

        // The prefix is itself a complete statement.
        assert_eq!(start_of_last_statement(&entries[..2]), 0);
    }

    #[test]
    fn suffix_balance_is_zero_at_boundary() {
        let entries = seq(vec![
            load(0),
            store(1),
            load(1),
            load(0),
            Insn::Op(BinaryOp::Mul),
            store(2),
        ]);
        let boundary = start_of_last_statement(&entries);
        assert_eq!(boundary, 2);
        let suffix_delta: i32 = entries[boundary..]
            .iter()
            .map(|e| crate::ir::effect::delta(&e.insn))
            .sum();
        assert_eq!(suffix_delta, 0);
    }

    #[test]
    fn starting_requirement_iff_negative_prefix_sum() {
        // store with nothing pushed first needs a value from before the range
        let entries = seq(vec![store(0)]);
        assert!(has_starting_requirement(&entries));

        // balanced range
        let entries = seq(vec![load(0), store(1)]);
        assert!(!has_starting_requirement(&entries));

        // dips negative in the middle even though the total ends positive
        let entries = seq(vec![store(1), load(1), load(0)]);
        assert!(has_starting_requirement(&entries));
    }

    #[test]
    fn meta_only_range_has_no_logic() {
        let entries = seq(vec![Insn::Label(0), Insn::Label(3)]);
        assert!(is_empty_of_logic(&entries));
        // The zero-balanced suffix starts right away; callers discard the
        // range via is_empty_of_logic before the boundary matters.
        assert_eq!(start_of_last_statement(&entries), 1);

        let entries = seq(vec![Insn::Label(0), Insn::Return]);
        assert!(!is_empty_of_logic(&entries));
    }

    #[test]
    fn labels_stay_with_the_preceding_statement() {
        let entries = seq(vec![
            load(0),
            store(1),
            Insn::Label(9),
            load(1),
            Insn::ValueReturn,
        ]);
        // The label is stack neutral, so the last statement starts at the
        // load following it.
        assert_eq!(start_of_last_statement(&entries), 3);
    }
}
