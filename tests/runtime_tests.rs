//! Runtime behaviour: prototypes, evaluation order, `with`, exceptions and
//! native errors.

use std::cell::RefCell;
use std::rc::Rc;

use lumen::{CacheMode, Engine, EngineConfig, LumenError, NativeFn, RuntimeError, Value};
use lumen_core::{JsObject, PropertyDescriptor, PropertyFlags};
use lumen_syntax::build::*;
use lumen_syntax::{BinaryOp, Node, UnaryOp};

fn eval(engine: &mut Engine, body: Vec<Node>) -> Value {
    engine.eval(program(body)).unwrap()
}

fn mul(lhs: Node, rhs: Node) -> Node {
    binary(BinaryOp::Mul, lhs, rhs)
}

// ============================================================================
// Prototypes
// ============================================================================

#[test]
fn delete_exposes_prototype_value() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            function_decl("read", &["o"], vec![ret(Some(member(ident("o"), "v")))]),
            var("p", Some(object(vec![("v", num(1.0))]))),
            var("o", Some(method_call(ident("Object"), "create", vec![ident("p")]))),
            assign(member(ident("o"), "v"), num(2.0)),
            var("first", Some(call(ident("read"), vec![ident("o")]))),
            var("deleted", Some(delete(member(ident("o"), "v")))),
            var("second", Some(call(ident("read"), vec![ident("o")]))),
            add(mul(ident("first"), num(10.0)), ident("second")),
        ],
    );
    assert_eq!(value, Value::Number(21.0));
    assert_eq!(engine.global("deleted").unwrap(), Value::Bool(true));
}

#[test]
fn absent_member_reads_undefined() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![unary(UnaryOp::Typeof, member(object(vec![]), "missing"))],
    );
    assert_eq!(value, Value::string("undefined"));
}

#[test]
fn non_deletable_property_survives_delete() {
    let mut engine = Engine::new();
    let realm = engine.realm();
    let object = engine
        .heap_mut()
        .allocate(JsObject::with_prototype(Some(realm.object_prototype)));
    engine.heap_mut().define_property(
        object,
        "fixed",
        PropertyDescriptor::data(Value::Number(1.0), PropertyFlags::ENUMERABLE),
    );
    engine.set_global("o", Value::Object(object));

    let value = eval(
        &mut engine,
        vec![
            var("deleted", Some(delete(member(ident("o"), "fixed")))),
            assign(member(ident("o"), "fixed"), num(5.0)),
            member(ident("o"), "fixed"),
        ],
    );
    assert_eq!(value, Value::Number(1.0));
    assert_eq!(engine.global("deleted").unwrap(), Value::Bool(false));
}

#[test]
fn accessors_run_with_receiver() {
    let mut engine = Engine::new();
    let realm = engine.realm();
    let stored = Rc::new(RefCell::new(Value::Undefined));

    let getter = realm.native_function(
        engine.heap_mut(),
        NativeFn::new("get", 0, |call| Ok(call.this().clone())),
    );
    let sink = Rc::clone(&stored);
    let setter = realm.native_function(
        engine.heap_mut(),
        NativeFn::new("set", 1, move |call| {
            *sink.borrow_mut() = call.arg(0);
            Ok(Value::Undefined)
        }),
    );
    let object = engine
        .heap_mut()
        .allocate(JsObject::with_prototype(Some(realm.object_prototype)));
    engine.heap_mut().define_property(
        object,
        "self",
        PropertyDescriptor::Accessor {
            getter: Some(getter),
            setter: Some(setter),
            flags: PropertyFlags::ENUMERABLE,
        },
    );
    engine.set_global("o", Value::Object(object));

    let value = eval(
        &mut engine,
        vec![
            assign(member(ident("o"), "self"), num(9.0)),
            binary(BinaryOp::StrictEqual, member(ident("o"), "self"), ident("o")),
        ],
    );
    assert_eq!(value, Value::Bool(true));
    assert_eq!(*stored.borrow(), Value::Number(9.0));
}

// ============================================================================
// Evaluation order
// ============================================================================

fn tracing_engine(mode: CacheMode) -> (Engine, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let mut engine = Engine::with_config(EngineConfig::new().with_cache_mode(mode));
    engine.register_native_fn("trace", 2, move |call| {
        sink.borrow_mut().push(call.arg(0).to_string());
        Ok(call.arg(1))
    });
    (engine, log)
}

#[test]
fn receiver_then_arguments_left_to_right() {
    for mode in [CacheMode::Enabled, CacheMode::AlwaysRebind, CacheMode::Disabled] {
        let (mut engine, log) = tracing_engine(mode);
        let value = eval(
            &mut engine,
            vec![
                var(
                    "o",
                    Some(object(vec![(
                        "b",
                        function_expr(None, &["x", "y"], vec![ret(Some(add(ident("x"), ident("y"))))]),
                    )])),
                ),
                function_decl(
                    "run",
                    &[],
                    vec![ret(Some(method_call(
                        call(ident("trace"), vec![string("a"), ident("o")]),
                        "b",
                        vec![
                            call(ident("trace"), vec![string("c"), num(1.0)]),
                            call(ident("trace"), vec![string("d"), num(2.0)]),
                        ],
                    )))],
                ),
                call(ident("run"), vec![]),
                call(ident("run"), vec![]),
            ],
        );
        assert_eq!(value, Value::Number(3.0));
        assert_eq!(*log.borrow(), vec!["a", "c", "d", "a", "c", "d"], "{mode:?}");
    }
}

#[test]
fn assignment_evaluates_object_before_value() {
    let (mut engine, log) = tracing_engine(CacheMode::Enabled);
    eval(
        &mut engine,
        vec![
            var("o", Some(object(vec![]))),
            assign(
                member(call(ident("trace"), vec![string("object"), ident("o")]), "p"),
                call(ident("trace"), vec![string("value"), num(1.0)]),
            ),
        ],
    );
    assert_eq!(*log.borrow(), vec!["object", "value"]);
}

// ============================================================================
// with
// ============================================================================

#[test]
fn with_calls_method_with_object_as_receiver() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            var(
                "o",
                Some(object(vec![
                    ("k", num(4.0)),
                    (
                        "get",
                        function_expr(None, &[], vec![ret(Some(member(this(), "k")))]),
                    ),
                ])),
            ),
            with(ident("o"), block(vec![call(ident("get"), vec![])])),
        ],
    );
    assert_eq!(value, Value::Number(4.0));
}

#[test]
fn with_reads_and_writes_fall_through_to_scope_chain() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            function_decl(
                "f",
                &["o"],
                vec![
                    var("local", Some(num(1.0))),
                    with(
                        ident("o"),
                        block(vec![
                            // `x` is a property of `o`, `local` is not.
                            assign(ident("x"), add(ident("x"), ident("local"))),
                            assign(ident("local"), num(10.0)),
                        ]),
                    ),
                    ret(Some(add(member(ident("o"), "x"), ident("local")))),
                ],
            ),
            call(ident("f"), vec![object(vec![("x", num(5.0))])]),
        ],
    );
    assert_eq!(value, Value::Number(16.0));
}

#[test]
fn with_unbound_name_reaches_global_object() {
    let mut engine = Engine::new();
    engine.register_native_fn("seven", 0, |_| Ok(Value::Number(7.0)));
    let value = eval(
        &mut engine,
        vec![with(object(vec![]), block(vec![call(ident("seven"), vec![])]))],
    );
    assert_eq!(value, Value::Number(7.0));
}

#[test]
fn with_on_primitive_is_a_type_error() {
    let mut engine = Engine::new();
    let err = engine
        .eval(program(vec![with(num(1.0), block(vec![]))]))
        .unwrap_err();
    assert!(matches!(
        err,
        LumenError::Runtime(RuntimeError::TypeError { .. })
    ));
}

#[test]
fn closure_created_inside_with_sees_the_object() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            var("o", Some(object(vec![("v", num(1.0))]))),
            var("f", None),
            with(
                ident("o"),
                block(vec![assign(
                    ident("f"),
                    function_expr(None, &[], vec![ret(Some(ident("v")))]),
                )]),
            ),
            assign(member(ident("o"), "v"), num(2.0)),
            call(ident("f"), vec![]),
        ],
    );
    assert_eq!(value, Value::Number(2.0));
}

// ============================================================================
// Exceptions
// ============================================================================

#[test]
fn thrown_values_are_caught_unchanged() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![try_catch(
            block(vec![throw(string("boom")), num(1.0)]),
            Some("e"),
            block(vec![ident("e")]),
        )],
    );
    assert_eq!(value, Value::string("boom"));
}

#[test]
fn catch_parameter_does_not_alias_function_variable() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            function_decl(
                "f",
                &[],
                vec![
                    var("e", Some(num(1.0))),
                    try_catch(block(vec![throw(num(2.0))]), Some("e"), block(vec![])),
                    ret(Some(ident("e"))),
                ],
            ),
            call(ident("f"), vec![]),
        ],
    );
    assert_eq!(value, Value::Number(1.0));
}

#[test]
fn top_level_catch_parameter_is_not_a_global() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            try_catch(block(vec![throw(num(2.0))]), Some("e"), block(vec![])),
            ident("e"),
        ],
    );
    assert_eq!(value, Value::Undefined);
    let global = engine.global_object();
    assert!(!engine.heap().get(global).unwrap().has_own("e"));
}

#[test]
fn closure_captures_top_level_catch_parameter() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            var("f", None),
            try_catch(
                block(vec![throw(num(5.0))]),
                Some("e"),
                block(vec![assign(
                    ident("f"),
                    function_expr(None, &[], vec![ret(Some(ident("e")))]),
                )]),
            ),
            call(ident("f"), vec![]),
        ],
    );
    assert_eq!(value, Value::Number(5.0));
}

#[test]
fn engine_errors_become_error_objects() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![try_catch(
            block(vec![call(ident("missing"), vec![])]),
            Some("e"),
            block(vec![add(
                add(member(ident("e"), "name"), string(": ")),
                member(ident("e"), "message"),
            )]),
        )],
    );
    assert_eq!(value, Value::string("TypeError: missing is not a function"));
}

#[test]
fn native_errors_unwind_like_throw() {
    let mut engine = Engine::new();
    engine.register_native_fn("fail", 0, |_| {
        Err(RuntimeError::Thrown(Value::string("native")))
    });
    let value = eval(
        &mut engine,
        vec![
            function_decl("inner", &[], vec![call(ident("fail"), vec![]), ret(Some(num(1.0)))]),
            try_catch(
                block(vec![call(ident("inner"), vec![])]),
                Some("e"),
                block(vec![ident("e")]),
            ),
        ],
    );
    assert_eq!(value, Value::string("native"));
}

#[test]
fn uncaught_native_error_propagates_unchanged() {
    let mut engine = Engine::new();
    engine.register_native_fn("fail", 0, |_| Err(RuntimeError::type_error("host says no")));
    let err = engine
        .eval(program(vec![call(ident("fail"), vec![])]))
        .unwrap_err();
    assert_eq!(
        err,
        LumenError::Runtime(RuntimeError::type_error("host says no"))
    );
}

#[test]
fn eval_is_present_but_unsupported() {
    let mut engine = Engine::new();
    let err = engine
        .eval(program(vec![call(ident("eval"), vec![string("1")])]))
        .unwrap_err();
    assert!(matches!(
        err,
        LumenError::Runtime(RuntimeError::TypeError { .. })
    ));
    let length = eval(&mut engine, vec![member(ident("eval"), "length")]);
    assert_eq!(length, Value::Number(1.0));
}

#[test]
fn runaway_recursion_is_a_range_error() {
    let mut engine = Engine::with_config(EngineConfig::new().with_max_call_depth(32));
    let recurse = function_decl("r", &[], vec![ret(Some(call(ident("r"), vec![])))]);
    let err = engine
        .eval(program(vec![recurse.clone(), call(ident("r"), vec![])]))
        .unwrap_err();
    assert_eq!(
        err,
        LumenError::Runtime(RuntimeError::StackOverflow { depth: 32 })
    );

    let value = eval(
        &mut engine,
        vec![
            recurse,
            try_catch(
                block(vec![call(ident("r"), vec![])]),
                Some("e"),
                block(vec![member(ident("e"), "name")]),
            ),
        ],
    );
    assert_eq!(value, Value::string("RangeError"));
}

// ============================================================================
// Operators and control flow
// ============================================================================

#[test]
fn named_function_expression_recurses_through_its_name() {
    let mut engine = Engine::new();
    let factorial = function_expr(
        Some("fact"),
        &["n"],
        vec![
            if_else(
                binary(BinaryOp::LessEqual, ident("n"), num(1.0)),
                ret(Some(num(1.0))),
                None,
            ),
            ret(Some(mul(
                ident("n"),
                call(
                    ident("fact"),
                    vec![binary(BinaryOp::Sub, ident("n"), num(1.0))],
                ),
            ))),
        ],
    );
    let value = eval(
        &mut engine,
        vec![
            var("f", Some(factorial)),
            call(ident("f"), vec![num(5.0)]),
        ],
    );
    assert_eq!(value, Value::Number(120.0));
    assert_eq!(engine.global("fact").unwrap(), Value::Undefined);
}

#[test]
fn function_expression_name_is_the_function_itself() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            var(
                "f",
                Some(function_expr(Some("g"), &[], vec![ret(Some(ident("g")))])),
            ),
            binary(
                BinaryOp::StrictEqual,
                call(ident("f"), vec![]),
                ident("f"),
            ),
        ],
    );
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn string_operands_coerce_like_number_literals() {
    let mut engine = Engine::new();
    let hex = eval(&mut engine, vec![mul(string("0x10"), num(1.0))]);
    assert_eq!(hex, Value::Number(16.0));
    let Value::Number(inf) = eval(&mut engine, vec![mul(string("inf"), num(1.0))]) else {
        panic!("expected a number");
    };
    assert!(inf.is_nan());
}

#[test]
fn object_loosely_equals_its_display_string() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![binary(
            BinaryOp::Equal,
            object(vec![]),
            string("[object Object]"),
        )],
    );
    assert_eq!(value, Value::Bool(true));
}

#[test]
fn while_loop_accumulates() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![
            function_decl(
                "sum",
                &["n"],
                vec![
                    var("total", Some(num(0.0))),
                    while_loop(
                        binary(BinaryOp::Greater, ident("n"), num(0.0)),
                        block(vec![
                            assign(ident("total"), add(ident("total"), ident("n"))),
                            assign(ident("n"), binary(BinaryOp::Sub, ident("n"), num(1.0))),
                        ]),
                    ),
                    ret(Some(ident("total"))),
                ],
            ),
            call(ident("sum"), vec![num(10.0)]),
        ],
    );
    assert_eq!(value, Value::Number(55.0));
}

#[test]
fn logical_operators_yield_deciding_operand() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![binary(
            BinaryOp::LogicalOr,
            binary(BinaryOp::LogicalAnd, num(0.0), call(ident("never"), vec![])),
            string("fallback"),
        )],
    );
    assert_eq!(value, Value::string("fallback"));
}

#[test]
fn typeof_distinguishes_functions() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![add(
            add(
                unary(UnaryOp::Typeof, ident("eval")),
                unary(UnaryOp::Typeof, object(vec![])),
            ),
            unary(UnaryOp::Typeof, null()),
        )],
    );
    assert_eq!(value, Value::string("functionobjectobject"));
}

#[test]
fn string_length_and_prototype_methods_on_primitives() {
    let mut engine = Engine::new();
    let value = eval(
        &mut engine,
        vec![add(
            member(string("héllo"), "length"),
            method_call(num(2.0), "valueOf", vec![]),
        )],
    );
    assert_eq!(value, Value::Number(7.0));
}

#[test]
fn member_of_undefined_is_a_type_error() {
    let mut engine = Engine::new();
    let err = engine
        .eval(program(vec![member(undefined(), "x")]))
        .unwrap_err();
    assert!(matches!(
        err,
        LumenError::Runtime(RuntimeError::TypeError { .. })
    ));
}

// ============================================================================
// Heap
// ============================================================================

#[test]
fn collect_garbage_frees_unreachable_objects_only() {
    let mut engine = Engine::new();
    let held = eval(
        &mut engine,
        vec![
            var("keep", Some(object(vec![("v", num(1.0))]))),
            var(
                "read",
                Some(function_expr(
                    None,
                    &[],
                    vec![ret(Some(member(ident("keep"), "v")))],
                )),
            ),
            var("i", Some(num(0.0))),
            while_loop(
                binary(BinaryOp::Less, ident("i"), num(10.0)),
                block(vec![
                    var("t", Some(object(vec![]))),
                    assign(ident("i"), add(ident("i"), num(1.0))),
                ]),
            ),
            object(vec![("held", boolean(true))]),
        ],
    );
    let dropped = eval(&mut engine, vec![object(vec![])]);

    let freed = engine.collect_garbage(std::slice::from_ref(&held));
    assert!(freed >= 10, "freed {freed}");
    assert!(engine.heap().get(held.as_object().unwrap()).is_some());
    assert!(engine.heap().get(dropped.as_object().unwrap()).is_none());

    let read = engine.global("read").unwrap();
    let global = Value::Object(engine.global_object());
    assert_eq!(engine.call(&read, global, &[]).unwrap(), Value::Number(1.0));
    assert_eq!(engine.collect_garbage(&[held]), 0);
}
