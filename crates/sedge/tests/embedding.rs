//! Host-facing behavior: exceptions with tracebacks, compatibility flags,
//! trace hooks, and the parse entry points.

use sedge::{
    CallKind, Compat, ExecMode, Interp, StatementBudget, StringInput, Value,
};

#[test]
fn uncaught_errors_render_with_location_and_traceback() {
    let mut interp = Interp::new(Compat::default());
    let err = interp
        .global_eval("function inner() {\n  throw new TypeError('boom');\n}\nfunction outer() { return inner(); }\nouter();")
        .unwrap_err();
    assert_eq!(err.message, "TypeError: boom");
    assert_eq!(err.location.map(|l| l.line), Some(2));
    let names: Vec<&str> = err.frames.iter().map(|f| f.callee.as_str()).collect();
    assert_eq!(names, vec!["outer", "inner"]);
    assert!(err.frames.iter().all(|f| f.kind == CallKind::Call));
}

#[test]
fn construct_frames_are_tagged() {
    let mut interp = Interp::new(Compat::default());
    let err = interp
        .global_eval("function Boom() { throw 'c'; }\nnew Boom();")
        .unwrap_err();
    assert_eq!(err.frames.len(), 1);
    assert_eq!(err.frames[0].kind, CallKind::Construct);
}

#[test]
fn parse_errors_carry_the_line() {
    let mut interp = Interp::new(Compat::default());
    let mut input = StringInput::new("var a = 1;\nvar = 2;");
    let err = interp.parse_program(&mut input).unwrap_err();
    assert_eq!(err.line, 2);
}

#[test]
fn eval_parse_errors_become_catchable_syntax_errors() {
    let mut interp = Interp::new(Compat::default());
    let v = interp
        .global_eval("var got = ''; try { eval('var ='); } catch (e) { got = e.name; } got")
        .unwrap();
    let Value::Str(s) = v else { panic!("expected string") };
    assert_eq!(s.to_utf8().unwrap(), "SyntaxError");
}

#[test]
fn undefdef_flag_reads_undefined_instead_of_throwing() {
    let mut strict = Interp::new(Compat::default());
    assert!(strict.global_eval("missing").is_err());

    let mut lenient = Interp::new(Compat::UNDEFDEF);
    let v = lenient.global_eval("typeof (missing)").unwrap();
    let Value::Str(s) = v else { panic!("expected string") };
    assert_eq!(s.to_utf8().unwrap(), "undefined");
    assert!(matches!(lenient.global_eval("missing").unwrap(), Value::Undefined));
}

#[test]
fn proto_visibility_is_gated_on_js_flags() {
    let mut plain = Interp::new(Compat::default());
    assert!(matches!(plain.global_eval("({}).__proto__").unwrap(), Value::Undefined));

    let mut netscape = Interp::new(Compat::JS12);
    let v = netscape
        .global_eval("({}).__proto__ === Object.prototype")
        .unwrap();
    assert!(matches!(v, Value::Bool(true)));
}

#[test]
fn ext1_enables_signed_hex_to_number() {
    let mut plain = Interp::new(Compat::default());
    let v = plain.global_eval("isNaN(+'-0x10')").unwrap();
    assert!(matches!(v, Value::Bool(true)));

    let mut ext = Interp::new(Compat::EXT1);
    let v = ext.global_eval("+'-0x10'").unwrap();
    assert!(matches!(v, Value::Number(n) if n == -16.0));
}

#[test]
fn statement_budget_aborts_runaway_scripts() {
    for mode in [ExecMode::TreeWalk, ExecMode::Bytecode] {
        let mut interp = Interp::new(Compat::default());
        interp.set_exec_mode(mode);
        interp.set_tracer(Box::new(StatementBudget::new(100)));
        let err = interp.global_eval("while (true) { }").unwrap_err();
        assert!(err.message.contains("RangeError"), "{mode:?}: {}", err.message);
    }
}

#[test]
fn recursion_guard_throws_range_error() {
    let mut interp = Interp::new(Compat::default());
    interp.set_max_call_depth(64);
    let v = interp
        .global_eval("var got = ''; function f() { return f(); } try { f(); } catch (e) { got = e.name; } got")
        .unwrap();
    let Value::Str(s) = v else { panic!("expected string") };
    assert_eq!(s.to_utf8().unwrap(), "RangeError");
}

#[test]
fn parse_function_builds_a_callable() {
    let mut interp = Interp::new(Compat::default());
    let mut params = StringInput::new("a, b");
    let mut body = StringInput::new("return a * b;");
    let program = interp.parse_function(None, &mut params, &mut body).unwrap();
    let f = interp.instantiate_program(&program);

    // call directly through the embedding surface
    let this = interp.global();
    let v = interp
        .call(f, this, &[Value::Number(6.0), Value::Number(7.0)])
        .expect("call succeeds");
    assert!(matches!(v, Value::Number(n) if n == 42.0));

    // and from script, after installing it on Global
    let name = interp.intern_str("mul");
    let global = interp.global();
    interp
        .put(global, name, Value::Object(f), sedge::Attr::empty())
        .expect("put succeeds");
    let v = interp.global_eval("mul(4, 5)").unwrap();
    assert!(matches!(v, Value::Number(n) if n == 20.0));
}

#[test]
fn host_object_operations_mirror_the_internal_methods() {
    let mut interp = Interp::new(Compat::default());
    let Value::Object(o) = interp.global_eval("({a: 1})").unwrap() else {
        panic!("expected object");
    };
    let a = interp.intern_str("a");
    let b = interp.intern_str("b");

    assert!(interp.has_property(o, a));
    interp.put(o, b, Value::Bool(true), sedge::Attr::empty()).unwrap();
    assert!(matches!(interp.get(o, b).unwrap(), Value::Bool(true)));
    assert!(interp.delete(o, a));
    assert!(!interp.has_property(o, a));
}

#[test]
fn programs_are_reusable() {
    let mut interp = Interp::new(Compat::default());
    let mut input = StringInput::new("counter = (typeof counter == 'undefined' ? 0 : counter) + 1; counter");
    let program = interp.parse_program(&mut input).unwrap();
    let first = interp.run_program(&program).unwrap();
    let second = interp.run_program(&program).unwrap();
    assert!(matches!(first, Value::Number(n) if n == 1.0));
    assert!(matches!(second, Value::Number(n) if n == 2.0));
}

#[test]
fn multiple_interpreters_are_independent() {
    let mut a = Interp::new(Compat::default());
    let mut b = Interp::new(Compat::default());
    a.global_eval("var shared = 1;").unwrap();
    let v = b.global_eval("typeof shared").unwrap();
    let Value::Str(s) = v else { panic!("expected string") };
    assert_eq!(s.to_utf8().unwrap(), "undefined");
}
