//! The staged decompilation pipeline.
//!
//! Passes run in a fixed order over one class at a time: metadata first,
//! then per-method body construction, then cleanup. A method whose body
//! cannot be built is replaced by a placeholder comment and logged; the
//! failure never escapes the class-level call. Only decode-table gaps
//! (opcodes the engine cannot represent) abort the whole run.

use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, warn};

use crate::ast::{BlockKind, StatementBlock, Stmt};
use crate::error::{BodyError, DecodeError};
use crate::flow;
use crate::ir;
use crate::locals::{LocalInstance, LocalTableEntry, Locals};
use crate::raw::ConstantResolver;
use crate::sig::{self, MethodSig, TypeSig};

bitflags! {
    /// JVM method access and property flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// One method as supplied by the external bytecode reader.
#[derive(Clone, Debug)]
pub struct MethodSource {
    pub name: String,
    pub descriptor: String,
    pub flags: MethodFlags,
    /// The Code attribute's code array; absent for abstract and native
    /// methods.
    pub code: Option<Vec<u8>>,
    pub local_table: Vec<LocalTableEntry>,
}

/// One class as supplied by the external bytecode reader. The constant pool
/// stays behind the [`ConstantResolver`] seam.
#[derive(Clone, Debug)]
pub struct ClassSource {
    /// Internal name, e.g. `com/example/Foo`.
    pub name: String,
    pub methods: Vec<MethodSource>,
}

/// A decompiled method.
#[derive(Clone, Debug)]
pub struct MethodEntry {
    pub name: String,
    pub descriptor: String,
    pub sig: MethodSig,
    pub flags: MethodFlags,
    /// `None` for methods without code.
    pub body: Option<StatementBlock>,
    /// The method's variable instances, ordered by slot then range start.
    /// Statements in the body hold these same `Rc`s.
    pub locals: Vec<Rc<LocalInstance>>,
}

/// A decompiled class.
#[derive(Clone, Debug)]
pub struct ClassEntry {
    pub name: String,
    pub methods: Vec<MethodEntry>,
}

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct Options {
    /// Append the decoded instruction dump to placeholder comments.
    pub dump_instructions_on_failure: bool,
    /// Keep compiler-generated (synthetic and bridge) methods.
    pub include_synthetic: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { dump_instructions_on_failure: false, include_synthetic: false }
    }
}

/// One pipeline stage. Stages run in fixed order and none may be skipped.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        class: &ClassSource,
        pool: &dyn ConstantResolver,
        entry: &mut ClassEntry,
        options: &Options,
    ) -> Result<(), DecodeError>;
}

/// Collects method metadata: names, descriptors, flags, parsed signatures.
pub struct MethodInfoPass;

impl Pass for MethodInfoPass {
    fn name(&self) -> &'static str {
        "method-info"
    }

    fn run(
        &self,
        class: &ClassSource,
        _pool: &dyn ConstantResolver,
        entry: &mut ClassEntry,
        options: &Options,
    ) -> Result<(), DecodeError> {
        for method in &class.methods {
            if method.flags.contains(MethodFlags::SYNTHETIC) && !options.include_synthetic {
                continue;
            }
            // An unparseable descriptor is reported when the body is built;
            // the metadata entry carries an empty signature until then.
            let sig = sig::parse_method(&method.descriptor)
                .unwrap_or(MethodSig { params: Vec::new(), ret: TypeSig::Void });
            entry.methods.push(MethodEntry {
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                sig,
                flags: method.flags,
                body: None,
                locals: Vec::new(),
            });
        }
        Ok(())
    }
}

/// Builds each method's body: decode, segment, build, structure.
pub struct MethodBodyPass;

fn build_method_body(
    class_name: &str,
    method: &MethodSource,
    code: &[u8],
    pool: &dyn ConstantResolver,
) -> Result<(StatementBlock, Vec<Rc<LocalInstance>>), BodyError> {
    let sig = sig::parse_method(&method.descriptor)?;
    let seq = ir::decode_bytes(code, pool)?;
    let locals = Locals::build(
        &seq,
        class_name,
        &sig,
        method.flags.contains(MethodFlags::STATIC),
        &method.local_table,
    )?;
    let body = flow::build_body(&seq, &locals)?;
    Ok((body, locals.instances().cloned().collect()))
}

fn placeholder_body(
    method: &MethodSource,
    pool: &dyn ConstantResolver,
    error: &BodyError,
    options: &Options,
) -> StatementBlock {
    let mut lines = vec![format!("failed to decompile: {}", error)];
    if options.dump_instructions_on_failure {
        if let Some(code) = &method.code {
            match ir::decode_bytes(code, pool) {
                Ok(seq) => lines.extend(seq.to_string().lines().map(str::to_owned)),
                Err(_) => lines.push(format!("code: {:02x?}", code)),
            }
        }
    }
    StatementBlock::new(BlockKind::MethodBody, vec![Stmt::Comment { lines }])
}

impl Pass for MethodBodyPass {
    fn name(&self) -> &'static str {
        "method-body"
    }

    fn run(
        &self,
        class: &ClassSource,
        pool: &dyn ConstantResolver,
        entry: &mut ClassEntry,
        options: &Options,
    ) -> Result<(), DecodeError> {
        for built in &mut entry.methods {
            let source = class
                .methods
                .iter()
                .find(|m| m.name == built.name && m.descriptor == built.descriptor);
            let Some(source) = source else { continue };
            let Some(code) = &source.code else { continue };

            match build_method_body(&class.name, source, code, pool) {
                Ok((body, locals)) => {
                    built.body = Some(body);
                    built.locals = locals;
                }
                Err(BodyError::Decode(e)) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("failed to decompile {}.{}: {}", class.name, built.name, e);
                    built.body = Some(placeholder_body(source, pool, &e, options));
                }
            }
        }
        Ok(())
    }
}

/// Final tidying of the built class entry.
pub struct CleanupPass;

impl Pass for CleanupPass {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn run(
        &self,
        _class: &ClassSource,
        _pool: &dyn ConstantResolver,
        entry: &mut ClassEntry,
        options: &Options,
    ) -> Result<(), DecodeError> {
        if !options.include_synthetic {
            entry.methods.retain(|m| !m.flags.contains(MethodFlags::BRIDGE));
        }
        // The compiler-mandated trailing return of a void method carries no
        // source meaning.
        for method in &mut entry.methods {
            if method.sig.ret != TypeSig::Void {
                continue;
            }
            if let Some(body) = &mut method.body {
                if matches!(body.statements.last(), Some(Stmt::Return { value: None })) {
                    body.statements.pop();
                }
            }
        }
        Ok(())
    }
}

/// The decompiler: a fixed pass list plus shared read-only options.
pub struct Decompiler {
    passes: Vec<Box<dyn Pass>>,
    options: Options,
}

impl Decompiler {
    pub fn new(options: Options) -> Self {
        Decompiler {
            passes: vec![
                Box::new(MethodInfoPass),
                Box::new(MethodBodyPass),
                Box::new(CleanupPass),
            ],
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Decompile one class. Per-method failures are contained; only fatal
    /// decode errors surface here.
    pub fn decompile_class(
        &self,
        class: &ClassSource,
        pool: &dyn ConstantResolver,
    ) -> Result<ClassEntry, DecodeError> {
        let mut entry = ClassEntry { name: class.name.clone(), methods: Vec::new() };
        for pass in &self.passes {
            debug!("pass {} on {}", pass.name(), class.name);
            pass.run(class, pool, &mut entry, &self.options)?;
        }
        Ok(entry)
    }

    /// Decompile a batch. Classes are independent units sharing only the
    /// read-only options.
    pub fn decompile_all(
        &self,
        classes: &[(ClassSource, &dyn ConstantResolver)],
    ) -> Result<Vec<ClassEntry>, DecodeError> {
        classes
            .iter()
            .map(|(class, pool)| self.decompile_class(class, *pool))
            .collect()
    }
}

impl Default for Decompiler {
    fn default() -> Self {
        Decompiler::new(Options::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Constant;

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

    fn method(name: &str, descriptor: &str, code: Vec<u8>) -> MethodSource {
        MethodSource {
            name: name.into(),
            descriptor: descriptor.into(),
            flags: MethodFlags::PUBLIC | MethodFlags::STATIC,
            code: Some(code),
            local_table: Vec::new(),
        }
    }

    fn class(methods: Vec<MethodSource>) -> ClassSource {
        ClassSource { name: "test/Sample".into(), methods }
    }

    #[test]
    fn sibling_methods_survive_a_body_failure() {
        // "bad" stores with nothing on the stack; "good" is a + b.
        let class = class(vec![
            method("good", "(II)I", vec![0x1a, 0x1b, 0x60, 0xac]),
            method("bad", "()V", vec![0x3b, 0xb1]),
        ]);
        let entry = Decompiler::default().decompile_class(&class, &EmptyPool).unwrap();
        assert_eq!(entry.methods.len(), 2);

        let good = &entry.methods[0];
        assert!(matches!(
            good.body.as_ref().unwrap().statements[0],
            Stmt::Return { value: Some(_) }
        ));

        let bad = &entry.methods[1];
        let body = bad.body.as_ref().unwrap();
        assert_eq!(body.statements.len(), 1, "placeholder is exactly one comment");
        match &body.statements[0] {
            Stmt::Comment { lines } => assert!(lines[0].contains("stack underflow")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failure_dump_lists_decoded_instructions() {
        let class = class(vec![method("bad", "()V", vec![0x3b, 0xb1])]);
        let options = Options { dump_instructions_on_failure: true, ..Options::default() };
        let entry = Decompiler::new(options).decompile_class(&class, &EmptyPool).unwrap();
        match &entry.methods[0].body.as_ref().unwrap().statements[0] {
            Stmt::Comment { lines } => {
                assert!(lines.len() > 1);
                assert!(lines.iter().any(|l| l.contains("local_store 0")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unsupported_opcodes_abort_the_run() {
        // jsr is a decode-table gap, not a per-method failure
        let class = class(vec![method("sub", "()V", vec![0xa8, 0x00, 0x03, 0xb1])]);
        let err = Decompiler::default().decompile_class(&class, &EmptyPool).unwrap_err();
        assert_eq!(err, DecodeError::Subroutine { offset: 0 });
    }

    #[test]
    fn synthetic_methods_are_skipped_by_default() {
        let mut synthetic = method("lambda$0", "()V", vec![0xb1]);
        synthetic.flags |= MethodFlags::SYNTHETIC;
        let class = class(vec![synthetic, method("kept", "()V", vec![0xb1])]);

        let entry = Decompiler::default().decompile_class(&class, &EmptyPool).unwrap();
        assert_eq!(entry.methods.len(), 1);
        assert_eq!(entry.methods[0].name, "kept");

        let options = Options { include_synthetic: true, ..Options::default() };
        let entry = Decompiler::new(options).decompile_class(&class, &EmptyPool).unwrap();
        assert_eq!(entry.methods.len(), 2);
    }

    #[test]
    fn cleanup_strips_the_trailing_void_return() {
        let class = class(vec![method("empty", "()V", vec![0xb1])]);
        let entry = Decompiler::default().decompile_class(&class, &EmptyPool).unwrap();
        assert!(entry.methods[0].body.as_ref().unwrap().statements.is_empty());
    }

    #[test]
    fn methods_without_code_have_no_body() {
        let mut native = method("native", "()V", Vec::new());
        native.code = None;
        native.flags |= MethodFlags::NATIVE;
        let entry = Decompiler::default()
            .decompile_class(&class(vec![native]), &EmptyPool)
            .unwrap();
        assert!(entry.methods[0].body.is_none());
    }
}
