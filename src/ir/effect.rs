//! The stack-effect table: how many virtual-stack values each IR
//! instruction consumes and produces.
//!
//! Pure and total over the closed [`Insn`] set — an instruction kind the
//! table cannot describe is unrepresentable by construction. Invocations are
//! the only kinds that need their payload: one pop per declared parameter
//! (plus the receiver for instance invokes), one push iff the declared
//! return is non-void.

use super::Insn;

/// Count of values consumed from the virtual stack.
pub fn requirements(insn: &Insn) -> u32 {
    match insn {
        Insn::Label(_)
        | Insn::IntConst(_)
        | Insn::LongConst(_)
        | Insn::FloatConst(_)
        | Insn::DoubleConst(_)
        | Insn::NullConst
        | Insn::Push(_)
        | Insn::LocalLoad { .. }
        | Insn::GetStatic(_)
        | Insn::New(_)
        | Insn::Iinc { .. }
        | Insn::Goto(_)
        | Insn::Return => 0,

        Insn::LocalStore { .. }
        | Insn::GetField(_)
        | Insn::PutStatic(_)
        | Insn::NewArray(_)
        | Insn::ArrayLength
        | Insn::Neg
        | Insn::Cast(_)
        | Insn::InstanceOf(_)
        | Insn::Dup
        | Insn::Pop
        | Insn::IfEq(_)
        | Insn::IfNe(_)
        | Insn::Switch { .. }
        | Insn::ValueReturn
        | Insn::Throw
        | Insn::MonitorEnter
        | Insn::MonitorExit => 1,

        Insn::ArrayLoad
        | Insn::PutField(_)
        | Insn::Op(_)
        | Insn::Cmp
        | Insn::DupX1
        | Insn::Dup2
        | Insn::Swap
        | Insn::IfCmp { .. } => 2,

        Insn::ArrayStore | Insn::DupX2 | Insn::Dup2X1 => 3,
        Insn::Dup2X2 => 4,

        Insn::MultiNewArray { dims, .. } => *dims as u32,

        Insn::Invoke { method, .. } => method.sig.param_count() as u32 + 1,
        Insn::InvokeStatic(method) => method.sig.param_count() as u32,
        Insn::InvokeDynamic(dynref) => dynref.sig.param_count() as u32,
    }
}

/// Count of values pushed to the virtual stack.
pub fn results(insn: &Insn) -> u32 {
    match insn {
        Insn::Label(_)
        | Insn::LocalStore { .. }
        | Insn::ArrayStore
        | Insn::PutField(_)
        | Insn::PutStatic(_)
        | Insn::Pop
        | Insn::Iinc { .. }
        | Insn::IfEq(_)
        | Insn::IfNe(_)
        | Insn::IfCmp { .. }
        | Insn::Goto(_)
        | Insn::Switch { .. }
        | Insn::Return
        | Insn::ValueReturn
        | Insn::Throw
        | Insn::MonitorEnter
        | Insn::MonitorExit => 0,

        Insn::IntConst(_)
        | Insn::LongConst(_)
        | Insn::FloatConst(_)
        | Insn::DoubleConst(_)
        | Insn::NullConst
        | Insn::Push(_)
        | Insn::LocalLoad { .. }
        | Insn::ArrayLoad
        | Insn::GetField(_)
        | Insn::GetStatic(_)
        | Insn::New(_)
        | Insn::NewArray(_)
        | Insn::MultiNewArray { .. }
        | Insn::ArrayLength
        | Insn::Op(_)
        | Insn::Neg
        | Insn::Cmp
        | Insn::Cast(_)
        | Insn::InstanceOf(_) => 1,

        Insn::Dup | Insn::Swap => 2,
        Insn::DupX1 => 3,
        Insn::DupX2 | Insn::Dup2 => 4,
        Insn::Dup2X1 => 5,
        Insn::Dup2X2 => 6,

        Insn::Invoke { method, .. } => method.sig.returns_value() as u32,
        Insn::InvokeStatic(method) => method.sig.returns_value() as u32,
        Insn::InvokeDynamic(dynref) => dynref.sig.returns_value() as u32,
    }
}

/// Net change in virtual-stack depth.
pub fn delta(insn: &Insn) -> i32 {
    results(insn) as i32 - requirements(insn) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, MethodRef};
    use crate::sig;

    fn method_ref(desc: &str) -> MethodRef {
        MethodRef {
            owner: "Test".into(),
            name: "m".into(),
            desc: desc.into(),
            sig: sig::parse_method(desc).unwrap(),
        }
    }

    #[test]
    fn simple_effects() {
        assert_eq!(delta(&Insn::IntConst(4)), 1);
        assert_eq!(delta(&Insn::Op(BinaryOp::Add)), -1);
        assert_eq!(delta(&Insn::LocalStore { slot: 0, ty: sig::TypeSig::Int }), -1);
        assert_eq!(delta(&Insn::Label(0)), 0);
        assert_eq!(delta(&Insn::Swap), 0);
    }

    #[test]
    fn dup_family_adds_copies() {
        assert_eq!(delta(&Insn::Dup), 1);
        assert_eq!(delta(&Insn::DupX1), 1);
        assert_eq!(delta(&Insn::DupX2), 1);
        assert_eq!(delta(&Insn::Dup2), 2);
        assert_eq!(delta(&Insn::Dup2X1), 2);
        assert_eq!(delta(&Insn::Dup2X2), 2);
    }

    #[test]
    fn invoke_effects_follow_descriptor() {
        let instance = Insn::Invoke {
            kind: crate::ir::InvokeKind::Virtual,
            method: method_ref("(II)I"),
        };
        assert_eq!(requirements(&instance), 3); // receiver + two params
        assert_eq!(results(&instance), 1);

        let void_static = Insn::InvokeStatic(method_ref("(Ljava/lang/String;)V"));
        assert_eq!(requirements(&void_static), 1);
        assert_eq!(results(&void_static), 0);
    }
}
