//! End-to-end scenarios: closures, global calls, prototype methods and
//! native argument handling.

use std::cell::RefCell;
use std::rc::Rc;

use lumen::{Compiler, Engine, LumenError, RuntimeError, Value};
use lumen_compiler::Storage;
use lumen_syntax::build::*;
use lumen_syntax::{BinaryOp, FunctionNode, Node, NodeKind, VarId};

fn function_of(node: &Node) -> &FunctionNode {
    match &node.kind {
        NodeKind::Function(func) => func,
        other => panic!("expected a function, found {other:?}"),
    }
}

/// Every resolved occurrence of `name` below `node`.
fn occurrences(node: &Node, name: &str, out: &mut Vec<VarId>) {
    match &node.kind {
        NodeKind::Identifier(ident) if &*ident.name == name => out.extend(ident.var),
        NodeKind::Function(func) => func.body.iter().for_each(|n| occurrences(n, name, out)),
        NodeKind::Call { target, args } => {
            occurrences(target, name, out);
            args.iter().for_each(|n| occurrences(n, name, out));
        }
        NodeKind::Return(Some(value)) => occurrences(value, name, out),
        NodeKind::Var {
            init: Some(init), ..
        } => occurrences(init, name, out),
        NodeKind::Binary { lhs, rhs, .. } => {
            occurrences(lhs, name, out);
            occurrences(rhs, name, out);
        }
        NodeKind::Block(statements) => statements.iter().for_each(|n| occurrences(n, name, out)),
        _ => {}
    }
}

#[test]
fn scenario_a_closure_returns_captured_variable() {
    let mut program = program(vec![
        function_decl(
            "outer",
            &[],
            vec![
                var("x", Some(num(1.0))),
                function_decl("inner", &[], vec![ret(Some(ident("x")))]),
                ret(Some(ident("inner"))),
            ],
        ),
        call(call(ident("outer"), vec![]), vec![]),
    ]);
    let compilation = Compiler::compile(&mut program).unwrap();

    let outer = function_of(&program.body[0]);
    let scopes = &compilation.scopes;
    let x = scopes.scope(outer.scope.unwrap()).lookup_own("x").unwrap();
    assert!(scopes.var(x).is_closed_over());
    assert_eq!(scopes.var(x).storage, Storage::Closure);

    let mut engine = Engine::new();
    let unit = engine.load(compilation.unit);
    assert_eq!(engine.run(unit).unwrap(), Value::Number(1.0));
}

#[test]
fn scenario_b_undeclared_call_fails_only_at_runtime() {
    let mut program = program(vec![call(ident("foo"), vec![num(1.0), num(2.0)])]);
    let compilation = Compiler::compile(&mut program).unwrap();

    let mut found = Vec::new();
    occurrences(&program.body[0], "foo", &mut found);
    assert_eq!(found.len(), 1);
    assert!(compilation.scopes.var(found[0]).is_global());

    let mut engine = Engine::new();
    let unit = engine.load(compilation.unit);
    let err = engine.run(unit).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::NotCallable {
            what: "foo".to_string()
        }
    );

    // Defining the global afterwards makes the same unit succeed.
    engine.register_native_fn("foo", 2, |call| {
        Ok(Value::Number(call.arg(0).to_number() + call.arg(1).to_number()))
    });
    assert_eq!(engine.run(unit).unwrap(), Value::Number(3.0));
}

#[test]
fn scenario_c_method_found_on_prototype() {
    let mut engine = Engine::new();
    let value = engine
        .eval(program(vec![
            var(
                "proto",
                Some(object(vec![(
                    "method",
                    function_expr(None, &[], vec![ret(Some(this()))]),
                )])),
            ),
            var(
                "obj",
                Some(method_call(ident("Object"), "create", vec![ident("proto")])),
            ),
            binary(
                BinaryOp::StrictEqual,
                method_call(ident("obj"), "method", vec![]),
                ident("obj"),
            ),
        ]))
        .unwrap();
    assert_eq!(value, Value::Bool(true));

    let value = engine
        .eval(program(vec![method_call(ident("obj"), "hasOwnProperty", vec![string("method")])]))
        .unwrap();
    assert_eq!(value, Value::Bool(false));
}

#[test]
fn scenario_d_missing_native_argument_is_undefined() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let mut engine = Engine::new();
    engine.register_native_fn("probe", 1, move |call| {
        log.borrow_mut().push(call.arg(0));
        Ok(Value::Number(call.arg_count() as f64))
    });

    let value = engine
        .eval(program(vec![call(ident("probe"), vec![])]))
        .unwrap();
    assert_eq!(value, Value::Number(0.0));
    assert_eq!(*seen.borrow(), vec![Value::Undefined]);

    let length = engine
        .eval(program(vec![member(ident("probe"), "length")]))
        .unwrap();
    assert_eq!(length, Value::Number(1.0));
}

#[test]
fn undeclared_name_is_one_global_record_at_every_depth() {
    let mut program = program(vec![
        call(ident("g"), vec![]),
        function_decl(
            "a",
            &[],
            vec![
                call(ident("g"), vec![]),
                function_decl("b", &[], vec![ret(Some(ident("g")))]),
            ],
        ),
    ]);
    let compilation = Compiler::compile(&mut program).unwrap();

    let mut found = Vec::new();
    for node in &program.body {
        occurrences(node, "g", &mut found);
    }
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|var| *var == found[0]));
    assert!(compilation.scopes.var(found[0]).is_global());
}

#[test]
fn nested_reads_resolve_to_the_declaration() {
    let mut program = program(vec![function_decl(
        "f",
        &["p"],
        vec![function_decl(
            "g",
            &[],
            vec![function_decl("h", &[], vec![ret(Some(ident("p")))])],
        )],
    )]);
    let compilation = Compiler::compile(&mut program).unwrap();

    let f = function_of(&program.body[0]);
    let declared = compilation
        .scopes
        .scope(f.scope.unwrap())
        .lookup_own("p")
        .unwrap();
    let mut found = Vec::new();
    occurrences(&program.body[0], "p", &mut found);
    assert_eq!(found, vec![declared]);
    assert!(compilation.scopes.var(declared).is_closed_over());
}

#[test]
fn counter_closures_share_their_environment() {
    let mut engine = Engine::new();
    let value = engine
        .eval(program(vec![
            function_decl(
                "counter",
                &[],
                vec![
                    var("n", Some(num(0.0))),
                    ret(Some(object(vec![
                        (
                            "inc",
                            function_expr(
                                None,
                                &[],
                                vec![ret(Some(assign(ident("n"), add(ident("n"), num(1.0)))))],
                            ),
                        ),
                        ("get", function_expr(None, &[], vec![ret(Some(ident("n")))])),
                    ]))),
                ],
            ),
            var("c", Some(call(ident("counter"), vec![]))),
            method_call(ident("c"), "inc", vec![]),
            method_call(ident("c"), "inc", vec![]),
            method_call(ident("c"), "get", vec![]),
        ]))
        .unwrap();
    assert_eq!(value, Value::Number(2.0));
}

#[test]
fn unsupported_construct_aborts_compilation() {
    let mut engine = Engine::new();
    let err = engine
        .eval(program(vec![with(
            object(vec![]),
            function_decl("f", &[], vec![]),
        )]))
        .unwrap_err();
    assert!(matches!(err, LumenError::Compile(_)));
}
