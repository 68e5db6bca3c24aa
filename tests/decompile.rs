use std::rc::Rc;

use declass::ast::{Expr, Stmt};
use declass::emit;
use declass::pipeline::{MethodFlags, Options};
use declass::raw::{Constant, ConstantResolver};
use declass::{decompile, ClassSource, Decompiler, MethodSource};

/// A small constant pool double covering the indices the tests reference.
struct TestPool;

impl ConstantResolver for TestPool {
    fn constant(&self, index: u16) -> Option<Constant> {
        match index {
            3 => Some(Constant::String("hi".into())),
            _ => None,
        }
    }

    fn class_name(&self, index: u16) -> Option<String> {
        match index {
            4 => Some("java/lang/Object".into()),
            _ => None,
        }
    }

    fn field_ref(&self, index: u16) -> Option<(String, String, String)> {
        match index {
            1 => Some((
                "java/lang/System".into(),
                "out".into(),
                "Ljava/io/PrintStream;".into(),
            )),
            _ => None,
        }
    }

    fn method_ref(&self, index: u16) -> Option<(String, String, String)> {
        match index {
            2 => Some((
                "java/io/PrintStream".into(),
                "println".into(),
                "(Ljava/lang/String;)V".into(),
            )),
            5 => Some(("java/lang/Object".into(), "<init>".into(), "()V".into())),
            _ => None,
        }
    }

    fn dynamic_ref(&self, _: u16) -> Option<(String, String)> {
        None
    }
}

fn static_method(name: &str, descriptor: &str, code: Vec<u8>) -> MethodSource {
    MethodSource {
        name: name.into(),
        descriptor: descriptor.into(),
        flags: MethodFlags::PUBLIC | MethodFlags::STATIC,
        code: Some(code),
        local_table: Vec::new(),
    }
}

fn sample(methods: Vec<MethodSource>) -> ClassSource {
    ClassSource { name: "test/Sample".into(), methods }
}

// ---- Statement shapes ----

#[test]
fn add_method_is_a_single_return_statement() {
    // iload_0; iload_1; iadd; ireturn
    let class = sample(vec![static_method("add", "(II)I", vec![0x1a, 0x1b, 0x60, 0xac])]);
    let entry = decompile(&class, &TestPool).unwrap();

    let body = entry.methods[0].body.as_ref().unwrap();
    assert_eq!(body.statements.len(), 1);

    let text = emit::emit_class(&entry);
    assert!(text.contains("return param0 + param1;"), "got:\n{}", text);
}

#[test]
fn store_then_use_splits_into_two_statements() {
    // iload_0; istore_1; iload_1; ireturn
    let class = sample(vec![static_method("pass", "(I)I", vec![0x1a, 0x3c, 0x1b, 0xac])]);
    let entry = decompile(&class, &TestPool).unwrap();

    let body = entry.methods[0].body.as_ref().unwrap();
    assert_eq!(body.statements.len(), 2);
    let assigned = match &body.statements[0] {
        Stmt::LocalAssign { local, .. } => Rc::clone(local),
        other => panic!("unexpected {:?}", other),
    };
    match &body.statements[1] {
        Stmt::Return { value: Some(value) } => match &**value {
            Expr::LocalAccess(local) => assert!(Rc::ptr_eq(local, &assigned)),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }

    let text = emit::emit_class(&entry);
    assert!(text.contains("int var1 = param0;"), "got:\n{}", text);
    assert!(text.contains("return var1;"), "got:\n{}", text);
}

#[test]
fn array_length_reads_as_a_length_field() {
    // aload_0; arraylength; ireturn
    let class = sample(vec![static_method("size", "([I)I", vec![0x2a, 0xbe, 0xac])]);
    let entry = decompile(&class, &TestPool).unwrap();

    let text = emit::emit_class(&entry);
    assert!(text.contains("return param0.length;"), "got:\n{}", text);
}

#[test]
fn void_invoke_becomes_an_expression_statement() {
    // getstatic System.out; ldc "hi"; invokevirtual println; return
    let class = sample(vec![static_method(
        "greet",
        "()V",
        vec![0xb2, 0x00, 0x01, 0x12, 0x03, 0xb6, 0x00, 0x02, 0xb1],
    )]);
    let entry = decompile(&class, &TestPool).unwrap();

    let text = emit::emit_class(&entry);
    assert!(
        text.contains("java.lang.System.out.println(\"hi\");"),
        "got:\n{}",
        text
    );
}

#[test]
fn constructor_calls_collapse_into_new() {
    // new Object; dup; invokespecial <init>; astore_1; return
    let class = sample(vec![static_method(
        "make",
        "()V",
        vec![0xbb, 0x00, 0x04, 0x59, 0xb7, 0x00, 0x05, 0x4c, 0xb1],
    )]);
    let entry = decompile(&class, &TestPool).unwrap();

    let body = entry.methods[0].body.as_ref().unwrap();
    assert_eq!(body.statements.len(), 1);
    match &body.statements[0] {
        Stmt::LocalAssign { value, .. } => {
            assert!(matches!(&**value, Expr::New { .. }), "unexpected {:?}", value)
        }
        other => panic!("unexpected {:?}", other),
    }

    let text = emit::emit_class(&entry);
    assert!(text.contains("Object var1 = new Object();"), "got:\n{}", text);
}

// ---- Control flow ----

#[test]
fn branch_and_loop_round_trip_to_source() {
    // abs-ish: if (a == 0) { return 0; } return 1;
    let if_method = static_method(
        "sign",
        "(I)I",
        vec![0x1a, 0x9a, 0x00, 0x05, 0x03, 0xac, 0x04, 0xac],
    );
    // while (i < 10) { i = i + 1; } return;
    let loop_method = static_method(
        "count",
        "(I)V",
        vec![
            0xa7, 0x00, 0x07, 0x1a, 0x04, 0x60, 0x3b, 0x1a, 0x10, 0x0a, 0xa1, 0xff, 0xf9, 0xb1,
        ],
    );
    let class = sample(vec![if_method, loop_method]);
    let entry = decompile(&class, &TestPool).unwrap();
    let text = emit::emit_class(&entry);

    assert!(text.contains("if (param0 == 0) {"), "got:\n{}", text);
    assert!(text.contains("while (param0 < 10) {"), "got:\n{}", text);
    assert!(text.contains("param0 = param0 + 1;"), "got:\n{}", text);
}

#[test]
fn value_branches_collapse_into_a_ternary() {
    // return a == 0 ? 1 : 2;
    let class = sample(vec![static_method(
        "pick",
        "(I)I",
        vec![0x1a, 0x9a, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x05, 0xac],
    )]);
    let entry = decompile(&class, &TestPool).unwrap();

    let text = emit::emit_class(&entry);
    assert!(text.contains("return param0 == 0 ? 1 : 2;"), "got:\n{}", text);
}

// ---- Failure containment ----

#[test]
fn underflow_is_contained_to_the_failing_method() {
    let _ = env_logger::builder().is_test(true).try_init();

    let class = sample(vec![
        // istore_0 with an empty stack
        static_method("broken", "()V", vec![0x3b, 0xb1]),
        static_method("fine", "(II)I", vec![0x1a, 0x1b, 0x60, 0xac]),
    ]);
    let entry = decompile(&class, &TestPool).unwrap();
    assert_eq!(entry.methods.len(), 2);

    let broken = entry.methods[0].body.as_ref().unwrap();
    assert_eq!(broken.statements.len(), 1);
    assert!(matches!(broken.statements[0], Stmt::Comment { .. }));

    let fine = entry.methods[1].body.as_ref().unwrap();
    assert!(matches!(fine.statements[0], Stmt::Return { value: Some(_) }));
}

#[test]
fn failure_dump_option_appends_instructions() {
    let class = sample(vec![static_method("broken", "()V", vec![0x3b, 0xb1])]);
    let options = Options { dump_instructions_on_failure: true, ..Options::default() };
    let entry = Decompiler::new(options).decompile_class(&class, &TestPool).unwrap();

    let text = emit::emit_class(&entry);
    assert!(text.contains("failed to decompile"), "got:\n{}", text);
    assert!(text.contains("local_store 0"), "got:\n{}", text);
}

// ---- Determinism ----

#[test]
fn two_runs_emit_identical_source() {
    let class = sample(vec![
        static_method("add", "(II)I", vec![0x1a, 0x1b, 0x60, 0xac]),
        static_method(
            "sign",
            "(I)I",
            vec![0x1a, 0x9a, 0x00, 0x05, 0x03, 0xac, 0x04, 0xac],
        ),
        static_method(
            "count",
            "(I)V",
            vec![
                0xa7, 0x00, 0x07, 0x1a, 0x04, 0x60, 0x3b, 0x1a, 0x10, 0x0a, 0xa1, 0xff, 0xf9,
                0xb1,
            ],
        ),
    ]);

    let first = emit::emit_class(&decompile(&class, &TestPool).unwrap());
    let second = emit::emit_class(&decompile(&class, &TestPool).unwrap());
    assert_eq!(first, second);
}
