//! The simplified decompiler IR.
//!
//! The ~200 JVM opcodes condense to a much smaller closed set once operand
//! payloads are resolved against the constant pool: every `iconst_*` /
//! `bipush` / `ldc`-of-int becomes [`Insn::IntConst`], every typed load
//! becomes [`Insn::LocalLoad`], and so on. Jump targets are rewritten from
//! byte offsets to sequence indices pointing at [`Insn::Label`] markers,
//! which are the only stack-neutral meta entries in a sequence.

pub mod effect;

use std::collections::HashMap;
use std::fmt;

use crate::error::DecodeError;
use crate::raw::{Constant, ConstantResolver, RawInsn};
use crate::sig::{self, MethodSig, TypeSig};

/// A resolved field reference.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRef {
    /// Internal name of the declaring class.
    pub owner: String,
    pub name: String,
    pub ty: TypeSig,
}

/// A resolved method reference.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub desc: String,
    pub sig: MethodSig,
}

/// An `invokedynamic` call site.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicRef {
    pub name: String,
    pub desc: String,
    pub sig: MethodSig,
}

/// Instance invocation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Interface,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// Java source token for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
        }
    }
}

/// Comparison operators for conditional branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl CompareOp {
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
        }
    }
}

/// One decoded IR operation. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub enum Insn {
    /// Branch-target marker; no runtime effect.
    Label(u32),

    IntConst(i32),
    LongConst(i64),
    FloatConst(f32),
    DoubleConst(f64),
    NullConst,
    /// A string or class constant from the pool.
    Push(Constant),

    LocalLoad { slot: u16, ty: TypeSig },
    LocalStore { slot: u16, ty: TypeSig },
    ArrayLoad,
    ArrayStore,

    GetField(FieldRef),
    PutField(FieldRef),
    GetStatic(FieldRef),
    PutStatic(FieldRef),

    Invoke { kind: InvokeKind, method: MethodRef },
    InvokeStatic(MethodRef),
    InvokeDynamic(DynamicRef),

    New(String),
    NewArray(TypeSig),
    MultiNewArray { ty: TypeSig, dims: u8 },
    ArrayLength,

    Op(BinaryOp),
    Neg,
    /// lcmp / fcmp* / dcmp*: pushes -1, 0 or 1.
    Cmp,
    Cast(TypeSig),
    InstanceOf(TypeSig),

    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Pop,
    Swap,

    Iinc { slot: u16, amount: i16 },

    /// Branch when the popped value is zero. Target is a sequence index.
    IfEq(usize),
    /// Branch when the popped value is non-zero.
    IfNe(usize),
    /// Branch comparing the two popped values.
    IfCmp { op: CompareOp, target: usize },
    Goto(usize),
    Switch { cases: Vec<(i32, usize)>, default: usize },

    Return,
    ValueReturn,
    Throw,
    MonitorEnter,
    MonitorExit,
}

impl Insn {
    /// True for markers with no runtime effect.
    pub fn is_meta(&self) -> bool {
        matches!(self, Insn::Label(_))
    }

    /// True for control-transfer instructions.
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Insn::IfEq(_)
                | Insn::IfNe(_)
                | Insn::IfCmp { .. }
                | Insn::Goto(_)
                | Insn::Switch { .. }
        )
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Label(addr) => write!(f, "L{}:", addr),
            Insn::IntConst(v) => write!(f, "iconst {}", v),
            Insn::LongConst(v) => write!(f, "lconst {}", v),
            Insn::FloatConst(v) => write!(f, "fconst {}", v),
            Insn::DoubleConst(v) => write!(f, "dconst {}", v),
            Insn::NullConst => write!(f, "push null"),
            Insn::Push(Constant::String(s)) => write!(f, "push \"{}\"", s),
            Insn::Push(c) => write!(f, "push {:?}", c),
            Insn::LocalLoad { slot, .. } => write!(f, "local_load {}", slot),
            Insn::LocalStore { slot, .. } => write!(f, "local_store {}", slot),
            Insn::ArrayLoad => write!(f, "array_load"),
            Insn::ArrayStore => write!(f, "array_store"),
            Insn::GetField(r) => write!(f, "getfield {}.{}", r.owner, r.name),
            Insn::PutField(r) => write!(f, "putfield {}.{}", r.owner, r.name),
            Insn::GetStatic(r) => write!(f, "getstatic {}.{}", r.owner, r.name),
            Insn::PutStatic(r) => write!(f, "putstatic {}.{}", r.owner, r.name),
            Insn::Invoke { method, .. } => {
                write!(f, "invoke {}.{}{}", method.owner, method.name, method.desc)
            }
            Insn::InvokeStatic(m) => write!(f, "invokestatic {}.{}{}", m.owner, m.name, m.desc),
            Insn::InvokeDynamic(d) => write!(f, "invokedynamic {}{}", d.name, d.desc),
            Insn::New(owner) => write!(f, "new {}", owner),
            Insn::NewArray(ty) => write!(f, "newarray {}", ty),
            Insn::MultiNewArray { ty, dims } => write!(f, "multinewarray {} dims={}", ty, dims),
            Insn::ArrayLength => write!(f, "arraylength"),
            Insn::Op(op) => write!(f, "op {}", op.symbol()),
            Insn::Neg => write!(f, "neg"),
            Insn::Cmp => write!(f, "cmp"),
            Insn::Cast(ty) => write!(f, "cast {}", ty),
            Insn::InstanceOf(ty) => write!(f, "instanceof {}", ty),
            Insn::Dup => write!(f, "dup"),
            Insn::DupX1 => write!(f, "dup_x1"),
            Insn::DupX2 => write!(f, "dup_x2"),
            Insn::Dup2 => write!(f, "dup2"),
            Insn::Dup2X1 => write!(f, "dup2_x1"),
            Insn::Dup2X2 => write!(f, "dup2_x2"),
            Insn::Pop => write!(f, "pop"),
            Insn::Swap => write!(f, "swap"),
            Insn::Iinc { slot, amount } => write!(f, "iinc {} {}", slot, amount),
            Insn::IfEq(t) => write!(f, "ifeq -> {}", t),
            Insn::IfNe(t) => write!(f, "ifne -> {}", t),
            Insn::IfCmp { op, target } => write!(f, "if_cmp{} -> {}", op.symbol(), target),
            Insn::Goto(t) => write!(f, "goto -> {}", t),
            Insn::Switch { cases, default } => {
                write!(f, "switch default -> {}", default)?;
                for (value, target) in cases {
                    write!(f, ", {} -> {}", value, target)?;
                }
                Ok(())
            }
            Insn::Return => write!(f, "return"),
            Insn::ValueReturn => write!(f, "areturn"),
            Insn::Throw => write!(f, "throw"),
            Insn::MonitorEnter => write!(f, "monitorenter"),
            Insn::MonitorExit => write!(f, "monitorexit"),
        }
    }
}

/// One sequence entry: an instruction tagged with its original byte offset.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub insn: Insn,
    pub pos: u32,
}

/// A method's decoded instruction sequence.
///
/// Entry order matches execution order of the original linear byte stream.
/// Read-only after [`decode`].
#[derive(Clone, Debug, PartialEq)]
pub struct InsnSeq {
    entries: Vec<Entry>,
}

impl InsnSeq {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<Entry>) -> Self {
        InsnSeq { entries }
    }

    /// Index of the first entry at or after the given byte offset.
    pub fn index_of_pos(&self, pos: u32) -> usize {
        self.entries
            .iter()
            .position(|e| e.pos >= pos)
            .unwrap_or(self.entries.len())
    }
}

impl fmt::Display for InsnSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{:>5}: {}", entry.pos, entry.insn)?;
        }
        Ok(())
    }
}

fn branch_targets(code: &[(u32, RawInsn)]) -> Vec<u32> {
    let mut targets = Vec::new();
    for (addr, insn) in code {
        let rel16 = |off: i16| (*addr as i64 + off as i64) as u32;
        let rel32 = |off: i32| (*addr as i64 + off as i64) as u32;
        match insn {
            RawInsn::IfEq(o)
            | RawInsn::IfNe(o)
            | RawInsn::IfLt(o)
            | RawInsn::IfGe(o)
            | RawInsn::IfGt(o)
            | RawInsn::IfLe(o)
            | RawInsn::IfICmpEq(o)
            | RawInsn::IfICmpNe(o)
            | RawInsn::IfICmpLt(o)
            | RawInsn::IfICmpGe(o)
            | RawInsn::IfICmpGt(o)
            | RawInsn::IfICmpLe(o)
            | RawInsn::IfACmpEq(o)
            | RawInsn::IfACmpNe(o)
            | RawInsn::IfNull(o)
            | RawInsn::IfNonNull(o)
            | RawInsn::Goto(o) => targets.push(rel16(*o)),
            RawInsn::GotoW(o) => targets.push(rel32(*o)),
            RawInsn::TableSwitch { default, offsets, .. } => {
                targets.push(rel32(*default));
                targets.extend(offsets.iter().map(|o| rel32(*o)));
            }
            RawInsn::LookupSwitch { default, pairs, .. } => {
                targets.push(rel32(*default));
                targets.extend(pairs.iter().map(|(_, o)| rel32(*o)));
            }
            _ => {}
        }
    }
    targets.sort_unstable();
    targets.dedup();
    targets
}

struct Decoder<'a> {
    pool: &'a dyn ConstantResolver,
    entries: Vec<Entry>,
    labels: HashMap<u32, usize>,
}

impl<'a> Decoder<'a> {
    fn push(&mut self, insn: Insn, pos: u32) {
        self.entries.push(Entry { insn, pos });
    }

    fn constant(&self, index: u16) -> Result<Constant, DecodeError> {
        self.pool
            .constant(index)
            .ok_or(DecodeError::BadConstant { index })
    }

    fn class_name(&self, index: u16) -> Result<String, DecodeError> {
        self.pool
            .class_name(index)
            .ok_or(DecodeError::BadConstant { index })
    }

    /// Class entries name either a plain class or an array descriptor.
    fn class_type(&self, index: u16) -> Result<TypeSig, DecodeError> {
        let name = self.class_name(index)?;
        if name.starts_with('[') {
            sig::parse_type(&name)
        } else {
            Ok(TypeSig::Object(name))
        }
    }

    fn field_ref(&self, index: u16) -> Result<FieldRef, DecodeError> {
        let (owner, name, desc) = self
            .pool
            .field_ref(index)
            .ok_or(DecodeError::BadConstant { index })?;
        Ok(FieldRef { owner, name, ty: sig::parse_type(&desc)? })
    }

    fn method_ref(&self, index: u16) -> Result<MethodRef, DecodeError> {
        let (owner, name, desc) = self
            .pool
            .method_ref(index)
            .ok_or(DecodeError::BadConstant { index })?;
        let sig = sig::parse_method(&desc)?;
        Ok(MethodRef { owner, name, desc, sig })
    }
}

/// Build an [`InsnSeq`] from addressed raw instructions, resolving payloads
/// through the reader's constant pool.
pub fn decode(
    code: &[(u32, RawInsn)],
    pool: &dyn ConstantResolver,
) -> Result<InsnSeq, DecodeError> {
    use RawInsn as R;

    let targets = branch_targets(code);
    let mut d = Decoder { pool, entries: Vec::new(), labels: HashMap::new() };

    for (addr, raw) in code {
        let addr = *addr;
        if targets.binary_search(&addr).is_ok() {
            d.labels.insert(addr, d.entries.len());
            d.push(Insn::Label(addr), addr);
        }
        // Branch targets stay as byte addresses here; they are rewritten to
        // sequence indices once all labels are placed.
        let rel16 = |off: &i16| (addr as i64 + *off as i64) as usize;
        let rel32 = |off: &i32| (addr as i64 + *off as i64) as usize;
        let load = |slot: u16, ty: TypeSig| Insn::LocalLoad { slot, ty };
        let store = |slot: u16, ty: TypeSig| Insn::LocalStore { slot, ty };
        let object = || TypeSig::Object("java/lang/Object".into());

        let insn = match raw {
            R::Nop => continue,
            R::AConstNull => Insn::NullConst,
            R::IConstM1 => Insn::IntConst(-1),
            R::IConst0 => Insn::IntConst(0),
            R::IConst1 => Insn::IntConst(1),
            R::IConst2 => Insn::IntConst(2),
            R::IConst3 => Insn::IntConst(3),
            R::IConst4 => Insn::IntConst(4),
            R::IConst5 => Insn::IntConst(5),
            R::LConst0 => Insn::LongConst(0),
            R::LConst1 => Insn::LongConst(1),
            R::FConst0 => Insn::FloatConst(0.0),
            R::FConst1 => Insn::FloatConst(1.0),
            R::FConst2 => Insn::FloatConst(2.0),
            R::DConst0 => Insn::DoubleConst(0.0),
            R::DConst1 => Insn::DoubleConst(1.0),
            R::BiPush(v) => Insn::IntConst(*v as i32),
            R::SiPush(v) => Insn::IntConst(*v as i32),
            R::Ldc(idx) => constant_insn(d.constant(*idx as u16)?),
            R::LdcW(idx) | R::Ldc2W(idx) => constant_insn(d.constant(*idx)?),

            R::ILoad(n) => load(*n as u16, TypeSig::Int),
            R::LLoad(n) => load(*n as u16, TypeSig::Long),
            R::FLoad(n) => load(*n as u16, TypeSig::Float),
            R::DLoad(n) => load(*n as u16, TypeSig::Double),
            R::ALoad(n) => load(*n as u16, object()),
            R::ILoadWide(n) => load(*n, TypeSig::Int),
            R::LLoadWide(n) => load(*n, TypeSig::Long),
            R::FLoadWide(n) => load(*n, TypeSig::Float),
            R::DLoadWide(n) => load(*n, TypeSig::Double),
            R::ALoadWide(n) => load(*n, object()),
            R::ILoad0 => load(0, TypeSig::Int),
            R::ILoad1 => load(1, TypeSig::Int),
            R::ILoad2 => load(2, TypeSig::Int),
            R::ILoad3 => load(3, TypeSig::Int),
            R::LLoad0 => load(0, TypeSig::Long),
            R::LLoad1 => load(1, TypeSig::Long),
            R::LLoad2 => load(2, TypeSig::Long),
            R::LLoad3 => load(3, TypeSig::Long),
            R::FLoad0 => load(0, TypeSig::Float),
            R::FLoad1 => load(1, TypeSig::Float),
            R::FLoad2 => load(2, TypeSig::Float),
            R::FLoad3 => load(3, TypeSig::Float),
            R::DLoad0 => load(0, TypeSig::Double),
            R::DLoad1 => load(1, TypeSig::Double),
            R::DLoad2 => load(2, TypeSig::Double),
            R::DLoad3 => load(3, TypeSig::Double),
            R::ALoad0 => load(0, object()),
            R::ALoad1 => load(1, object()),
            R::ALoad2 => load(2, object()),
            R::ALoad3 => load(3, object()),

            R::IALoad | R::LALoad | R::FALoad | R::DALoad | R::AALoad | R::BALoad
            | R::CALoad | R::SALoad => Insn::ArrayLoad,

            R::IStore(n) => store(*n as u16, TypeSig::Int),
            R::LStore(n) => store(*n as u16, TypeSig::Long),
            R::FStore(n) => store(*n as u16, TypeSig::Float),
            R::DStore(n) => store(*n as u16, TypeSig::Double),
            R::AStore(n) => store(*n as u16, object()),
            R::IStoreWide(n) => store(*n, TypeSig::Int),
            R::LStoreWide(n) => store(*n, TypeSig::Long),
            R::FStoreWide(n) => store(*n, TypeSig::Float),
            R::DStoreWide(n) => store(*n, TypeSig::Double),
            R::AStoreWide(n) => store(*n, object()),
            R::IStore0 => store(0, TypeSig::Int),
            R::IStore1 => store(1, TypeSig::Int),
            R::IStore2 => store(2, TypeSig::Int),
            R::IStore3 => store(3, TypeSig::Int),
            R::LStore0 => store(0, TypeSig::Long),
            R::LStore1 => store(1, TypeSig::Long),
            R::LStore2 => store(2, TypeSig::Long),
            R::LStore3 => store(3, TypeSig::Long),
            R::FStore0 => store(0, TypeSig::Float),
            R::FStore1 => store(1, TypeSig::Float),
            R::FStore2 => store(2, TypeSig::Float),
            R::FStore3 => store(3, TypeSig::Float),
            R::DStore0 => store(0, TypeSig::Double),
            R::DStore1 => store(1, TypeSig::Double),
            R::DStore2 => store(2, TypeSig::Double),
            R::DStore3 => store(3, TypeSig::Double),
            R::AStore0 => store(0, object()),
            R::AStore1 => store(1, object()),
            R::AStore2 => store(2, object()),
            R::AStore3 => store(3, object()),

            R::IAStore | R::LAStore | R::FAStore | R::DAStore | R::AAStore | R::BAStore
            | R::CAStore | R::SAStore => Insn::ArrayStore,

            R::Pop => Insn::Pop,
            // In the value-per-slot model a wide value is one entry.
            R::Pop2 => Insn::Pop,
            R::Dup => Insn::Dup,
            R::DupX1 => Insn::DupX1,
            R::DupX2 => Insn::DupX2,
            R::Dup2 => Insn::Dup2,
            R::Dup2X1 => Insn::Dup2X1,
            R::Dup2X2 => Insn::Dup2X2,
            R::Swap => Insn::Swap,

            R::IAdd | R::LAdd | R::FAdd | R::DAdd => Insn::Op(BinaryOp::Add),
            R::ISub | R::LSub | R::FSub | R::DSub => Insn::Op(BinaryOp::Sub),
            R::IMul | R::LMul | R::FMul | R::DMul => Insn::Op(BinaryOp::Mul),
            R::IDiv | R::LDiv | R::FDiv | R::DDiv => Insn::Op(BinaryOp::Div),
            R::IRem | R::LRem | R::FRem | R::DRem => Insn::Op(BinaryOp::Rem),
            R::IShl | R::LShl => Insn::Op(BinaryOp::Shl),
            R::IShr | R::LShr => Insn::Op(BinaryOp::Shr),
            R::IUshr | R::LUshr => Insn::Op(BinaryOp::Ushr),
            R::IAnd | R::LAnd => Insn::Op(BinaryOp::And),
            R::IOr | R::LOr => Insn::Op(BinaryOp::Or),
            R::IXor | R::LXor => Insn::Op(BinaryOp::Xor),
            R::INeg | R::LNeg | R::FNeg | R::DNeg => Insn::Neg,
            R::IInc { index, value } => Insn::Iinc { slot: *index as u16, amount: *value as i16 },
            R::IIncWide { index, value } => Insn::Iinc { slot: *index, amount: *value },

            R::I2l | R::F2l | R::D2l => Insn::Cast(TypeSig::Long),
            R::I2f | R::L2f | R::D2f => Insn::Cast(TypeSig::Float),
            R::I2d | R::L2d | R::F2d => Insn::Cast(TypeSig::Double),
            R::L2i | R::F2i | R::D2i => Insn::Cast(TypeSig::Int),
            R::I2b => Insn::Cast(TypeSig::Byte),
            R::I2c => Insn::Cast(TypeSig::Char),
            R::I2s => Insn::Cast(TypeSig::Short),

            R::LCmp | R::FCmpL | R::FCmpG | R::DCmpL | R::DCmpG => Insn::Cmp,

            R::IfEq(o) => Insn::IfEq(rel16(o)),
            R::IfNe(o) => Insn::IfNe(rel16(o)),
            // Unary numeric branches compare against an injected zero.
            R::IfLt(o) => {
                d.push(Insn::IntConst(0), addr);
                Insn::IfCmp { op: CompareOp::Lt, target: rel16(o) }
            }
            R::IfGe(o) => {
                d.push(Insn::IntConst(0), addr);
                Insn::IfCmp { op: CompareOp::Ge, target: rel16(o) }
            }
            R::IfGt(o) => {
                d.push(Insn::IntConst(0), addr);
                Insn::IfCmp { op: CompareOp::Gt, target: rel16(o) }
            }
            R::IfLe(o) => {
                d.push(Insn::IntConst(0), addr);
                Insn::IfCmp { op: CompareOp::Le, target: rel16(o) }
            }
            R::IfNull(o) => {
                d.push(Insn::NullConst, addr);
                Insn::IfCmp { op: CompareOp::Eq, target: rel16(o) }
            }
            R::IfNonNull(o) => {
                d.push(Insn::NullConst, addr);
                Insn::IfCmp { op: CompareOp::Ne, target: rel16(o) }
            }
            R::IfICmpEq(o) | R::IfACmpEq(o) => {
                Insn::IfCmp { op: CompareOp::Eq, target: rel16(o) }
            }
            R::IfICmpNe(o) | R::IfACmpNe(o) => {
                Insn::IfCmp { op: CompareOp::Ne, target: rel16(o) }
            }
            R::IfICmpLt(o) => Insn::IfCmp { op: CompareOp::Lt, target: rel16(o) },
            R::IfICmpGe(o) => Insn::IfCmp { op: CompareOp::Ge, target: rel16(o) },
            R::IfICmpGt(o) => Insn::IfCmp { op: CompareOp::Gt, target: rel16(o) },
            R::IfICmpLe(o) => Insn::IfCmp { op: CompareOp::Le, target: rel16(o) },
            R::Goto(o) => Insn::Goto(rel16(o)),
            R::GotoW(o) => Insn::Goto(rel32(o)),
            R::TableSwitch { default, low, offsets, .. } => Insn::Switch {
                cases: offsets
                    .iter()
                    .enumerate()
                    .map(|(i, o)| (low + i as i32, rel32(o)))
                    .collect(),
                default: rel32(default),
            },
            R::LookupSwitch { default, pairs, .. } => Insn::Switch {
                cases: pairs.iter().map(|(v, o)| (*v, rel32(o))).collect(),
                default: rel32(default),
            },

            R::IReturn | R::LReturn | R::FReturn | R::DReturn | R::AReturn => Insn::ValueReturn,
            R::Return => Insn::Return,
            R::AThrow => Insn::Throw,

            R::GetStatic(idx) => Insn::GetStatic(d.field_ref(*idx)?),
            R::PutStatic(idx) => Insn::PutStatic(d.field_ref(*idx)?),
            R::GetField(idx) => Insn::GetField(d.field_ref(*idx)?),
            R::PutField(idx) => Insn::PutField(d.field_ref(*idx)?),
            R::InvokeVirtual(idx) => {
                Insn::Invoke { kind: InvokeKind::Virtual, method: d.method_ref(*idx)? }
            }
            R::InvokeSpecial(idx) => {
                Insn::Invoke { kind: InvokeKind::Special, method: d.method_ref(*idx)? }
            }
            R::InvokeInterface { index, .. } => {
                Insn::Invoke { kind: InvokeKind::Interface, method: d.method_ref(*index)? }
            }
            R::InvokeStatic(idx) => Insn::InvokeStatic(d.method_ref(*idx)?),
            R::InvokeDynamic { index, .. } => {
                let (name, desc) = pool
                    .dynamic_ref(*index)
                    .ok_or(DecodeError::BadConstant { index: *index })?;
                let sig = sig::parse_method(&desc)?;
                Insn::InvokeDynamic(DynamicRef { name, desc, sig })
            }

            R::New(idx) => Insn::New(d.class_name(*idx)?),
            R::NewArray(atype) => Insn::NewArray(
                sig::newarray_type(*atype)
                    .ok_or(DecodeError::BadConstant { index: *atype as u16 })?,
            ),
            R::ANewArray(idx) => Insn::NewArray(d.class_type(*idx)?),
            R::MultiANewArray { index, dimensions } => {
                Insn::MultiNewArray { ty: d.class_type(*index)?, dims: *dimensions }
            }
            R::ArrayLength => Insn::ArrayLength,
            R::CheckCast(idx) => Insn::Cast(d.class_type(*idx)?),
            R::InstanceOf(idx) => Insn::InstanceOf(d.class_type(*idx)?),
            R::MonitorEnter => Insn::MonitorEnter,
            R::MonitorExit => Insn::MonitorExit,

            R::Jsr(_) | R::JsrW(_) | R::Ret(_) | R::RetWide(_) => {
                return Err(DecodeError::Subroutine { offset: addr });
            }
        };
        d.push(insn, addr);
    }

    // Rewrite branch targets from byte addresses to label indices.
    let labels = d.labels;
    let resolve = |target: usize| -> Result<usize, DecodeError> {
        labels
            .get(&(target as u32))
            .copied()
            .ok_or(DecodeError::BadBranchTarget { target: target as u32 })
    };
    for entry in &mut d.entries {
        match &mut entry.insn {
            Insn::IfEq(t) | Insn::IfNe(t) | Insn::Goto(t) | Insn::IfCmp { target: t, .. } => {
                *t = resolve(*t)?;
            }
            Insn::Switch { cases, default } => {
                *default = resolve(*default)?;
                for (_, t) in cases {
                    *t = resolve(*t)?;
                }
            }
            _ => {}
        }
    }

    Ok(InsnSeq { entries: d.entries })
}

fn constant_insn(c: Constant) -> Insn {
    match c {
        Constant::Int(v) => Insn::IntConst(v),
        Constant::Long(v) => Insn::LongConst(v),
        Constant::Float(v) => Insn::FloatConst(v),
        Constant::Double(v) => Insn::DoubleConst(v),
        other => Insn::Push(other),
    }
}

/// Convenience: read and decode a code array in one step.
pub fn decode_bytes(bytes: &[u8], pool: &dyn ConstantResolver) -> Result<InsnSeq, DecodeError> {
    decode(&crate::raw::read_code(bytes)?, pool)
}
