//! End-to-end scenarios run on both execution engines.
//!
//! The tree-walker is the reference; every script here also runs through
//! the bytecode VM and the two results must agree exactly (same type, same
//! value, NaN treated as equal to itself).

use sedge::{Compat, ExecMode, Interp, Value};

fn run_with(mode: ExecMode, src: &str) -> Value {
    let mut interp = Interp::new(Compat::default());
    interp.set_exec_mode(mode);
    interp
        .global_eval(src)
        .unwrap_or_else(|e| panic!("{mode:?} failed on {src}: {e}"))
}

fn agree(src: &str) -> Value {
    let tree = run_with(ExecMode::TreeWalk, src);
    let vm = run_with(ExecMode::Bytecode, src);
    assert!(
        same_value(&tree, &vm),
        "engines disagree on {src}: tree={tree:?} vm={vm:?}"
    );
    tree
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => (x.is_nan() && y.is_nan()) || x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        // distinct interpreters, so object identity cannot be compared
        (Value::Object(_), Value::Object(_)) => true,
        _ => false,
    }
}

fn num(src: &str) -> f64 {
    match agree(src) {
        Value::Number(n) => n,
        other => panic!("expected number from {src}, got {other:?}"),
    }
}

fn text(src: &str) -> String {
    match agree(src) {
        Value::Str(s) => s.to_utf8().unwrap(),
        other => panic!("expected string from {src}, got {other:?}"),
    }
}

fn boolean(src: &str) -> bool {
    match agree(src) {
        Value::Bool(b) => b,
        other => panic!("expected boolean from {src}, got {other:?}"),
    }
}

#[test]
fn var_declarations_and_addition() {
    assert_eq!(num("var a = 1, b = 2; a + b"), 3.0);
}

#[test]
fn string_concatenation_associativity() {
    assert_eq!(text("'a' + 1 + 2"), "a12");
    assert_eq!(text("1 + 2 + 'a'"), "3a");
}

#[test]
fn typeof_and_reference_errors() {
    assert_eq!(text("typeof undeclared"), "undefined");
    for mode in [ExecMode::TreeWalk, ExecMode::Bytecode] {
        let mut interp = Interp::new(Compat::default());
        interp.set_exec_mode(mode);
        let err = interp.global_eval("undeclared").unwrap_err();
        assert!(err.message.contains("ReferenceError"), "{mode:?}: {}", err.message);
    }
}

#[test]
fn equality_matrix() {
    assert!(!boolean("NaN == NaN"));
    assert!(boolean("NaN !== NaN"));
    assert!(boolean("null == undefined"));
    assert!(!boolean("null === undefined"));
    assert!(boolean("0 == -0"));
    assert!(boolean("1 == '1'"));
    assert!(!boolean("1 === '1'"));
}

#[test]
fn for_loop_accumulates() {
    assert_eq!(text("var s = ''; for (var i = 0; i < 3; i++) s += i; s"), "012");
}

#[test]
fn try_catch_finally_completion() {
    // completion value is the catch's, with finally observed via effect
    assert_eq!(
        text("var log = ''; function f() { try { throw 'x'; } catch (e) { return e; } finally { log += 'f'; } } f() + '/' + log"),
        "x/f"
    );
}

#[test]
fn closures_share_their_activation() {
    let src = "var mk = function () { var x = 1; return function () { return x++; }; };\n\
               var next = mk(); next() * 10 + next()";
    assert_eq!(num(src), 12.0);
}

#[test]
fn relational_comparisons() {
    assert!(boolean("'abc' < 'abd'"));
    assert!(boolean("'10' < '9'"));
    assert!(!boolean("10 < 9"));
    assert!(!boolean("NaN < 1"));
    assert!(!boolean("NaN >= 1"));
}

#[test]
fn object_literals_insert_left_to_right() {
    assert_eq!(num("({a: 1, b: 2}).a + ({a: 1, b: 2}).b"), 3.0);
    assert_eq!(text("var keys = ''; var o = {b: 1, a: 2, c: 3}; for (var k in o) keys += k; keys"), "bac");
}

#[test]
fn eval_defines_on_global() {
    assert_eq!(num("eval('var x = 42; x')"), 42.0);
    assert_eq!(num("eval('var y = 7; y'); y"), 7.0);
}

#[test]
fn more_operator_coverage() {
    assert_eq!(num("5 % 3"), 2.0);
    assert_eq!(num("-5 % 3"), -2.0);
    assert_eq!(num("1 << 5"), 32.0);
    assert_eq!(num("-8 >> 1"), -4.0);
    assert_eq!(num("-8 >>> 28"), 15.0);
    assert_eq!(num("(6 & 3) + (6 | 3) + (6 ^ 3)"), 14.0);
    assert_eq!(num("~5"), -6.0);
    assert_eq!(num("+'12'"), 12.0);
    assert_eq!(num("-'12'"), -12.0);
    assert!(boolean("!''"));
    assert_eq!(text("typeof 1 + typeof ''"), "numberstring");
}

#[test]
fn conditional_and_logical_values() {
    assert_eq!(num("true ? 1 : 2"), 1.0);
    assert_eq!(num("0 || 5"), 5.0);
    assert_eq!(num("3 || 5"), 3.0);
    assert_eq!(num("0 && 5"), 0.0);
    assert_eq!(text("'a' && 'b'"), "b");
}

#[test]
fn member_and_index_access_agree() {
    assert_eq!(num("var o = {x: 3}; o['x'] + o.x"), 6.0);
    assert_eq!(num("var a = [10, 20, 30]; a[1] + a.length"), 23.0);
    assert_eq!(num("var a = [1, , 3]; a.length"), 3.0);
}

#[test]
fn switch_fallthrough() {
    assert_eq!(
        num("var n = 0; switch (2) { case 1: n += 1; case 2: n += 2; case 3: n += 4; break; default: n += 8; } n"),
        6.0
    );
    assert_eq!(num("var n = 0; switch (99) { case 1: n = 1; break; default: n = 42; } n"), 42.0);
    // tests after default still match first
    assert_eq!(num("var n = 0; switch (3) { case 1: n = 1; break; default: n = 9; break; case 3: n = 3; } n"), 3.0);
}

#[test]
fn with_statement_scoping() {
    assert_eq!(num("var o = {x: 5}; var x = 1; var r; with (o) { r = x; x = 7; } r + o.x + x"), 13.0);
}

#[test]
fn labelled_jumps() {
    let src = "var n = 0; outer: for (var i = 0; i < 3; i++) { inner: for (var j = 0; j < 3; j++) { if (j > i) continue outer; if (i == 2) break outer; n++; } } n";
    assert_eq!(num(src), 3.0);
    assert_eq!(num("var n = 1; blk: { n = 2; break blk; n = 3; } n"), 2.0);
}

#[test]
fn do_while_runs_at_least_once() {
    assert_eq!(num("var n = 0; do { n++; } while (false); n"), 1.0);
    assert_eq!(num("var n = 0; do n++; while (n < 5); n"), 5.0);
}

#[test]
fn for_in_is_delete_safe() {
    let src = "var o = {a: 1, b: 2, c: 3}; var visited = ''; for (var k in o) { visited += k; delete o.b; delete o.c; } visited";
    let seen = text(src);
    assert!(seen.starts_with('a'));
    assert!(seen.len() <= 2, "deleted names must be skipped, saw {seen}");
}

#[test]
fn for_in_var_form_with_initializer() {
    assert_eq!(text("var o = {q: 1}; for (var k = 'seed' in o) ; k"), "q");
}

#[test]
fn constructors_and_prototypes() {
    assert_eq!(num("function P(x) { this.x = x; } P.prototype.d = 10; var p = new P(4); p.x + p.d"), 14.0);
    assert!(boolean("function P() {} new P() instanceof P"));
    assert!(boolean("function P() {} !({} instanceof P)"));
    assert_eq!(num("function R() { return { x: 9 }; } new R().x"), 9.0);
}

#[test]
fn nested_try_finally_override_matrix() {
    // finally's break beats the try's throw
    assert_eq!(
        num("var n = 0; while (true) { try { throw 'x'; } finally { n = 5; break; } } n"),
        5.0
    );
    // finally's return beats the catch's return
    assert_eq!(
        num("function f() { try { throw 1; } catch (e) { return 2; } finally { return 3; } } f()"),
        3.0
    );
    // normal finally preserves the try completion
    assert_eq!(num("function f() { try { return 1; } finally { var x = 0; } } f()"), 1.0);
    // rethrow after finally runs
    assert_eq!(
        text("var log = ''; try { try { throw 'inner'; } finally { log += 'F'; } } catch (e) { log += e; } log"),
        "Finner"
    );
}

#[test]
fn throw_non_error_values() {
    assert_eq!(num("try { throw 42; } catch (e) { e }"), 42.0);
    assert_eq!(text("try { throw { code: 'E' }; } catch (e) { e.code }"), "E");
}

#[test]
fn catch_binding_is_scoped_to_the_handler() {
    assert_eq!(
        text("var e = 'outer'; try { throw 'caught'; } catch (e) { } e"),
        "outer"
    );
}

#[test]
fn completion_values_chain_through_statements() {
    assert_eq!(num("1; ;"), 1.0);
    assert_eq!(num("if (true) { 4; } else { 5; }"), 4.0);
    assert_eq!(num("var i = 0; while (i < 3) { i++; 9; }"), 9.0);
    assert_eq!(text("lbl: { 'inner'; break lbl; }"), "inner");
}

#[test]
fn arguments_object_behavior() {
    assert_eq!(num("function f() { return arguments.length; } f(1, 2, 3)"), 3.0);
    assert_eq!(num("function f(a, b) { b = 5; return arguments[1]; } f(1, 2)"), 5.0);
    assert_eq!(
        num("function f() { return arguments.callee === f ? 1 : 0; } f()"),
        1.0
    );
}

#[test]
fn recursion_through_named_expression() {
    assert_eq!(num("(function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); })(6)"), 720.0);
}

#[test]
fn number_formatting_round_trip() {
    assert_eq!(text("'' + 0.1"), "0.1");
    assert_eq!(text("'' + 1e21"), "1e+21");
    assert_eq!(text("'' + 123456789012345680000"), "123456789012345680000");
    assert_eq!(text("'' + 0.0000001"), "1e-7");
    assert_eq!(text("'' + -0"), "0");
    assert_eq!(text("'' + 1 / 0"), "Infinity");
    assert_eq!(text("'' + 0 / 0"), "NaN");
}

#[test]
fn regex_literals_carry_source_and_flags() {
    assert_eq!(text("/a+b/gi.source"), "a+b");
    assert_eq!(text("/a+b/gi.flags"), "gi");
    assert_eq!(num("var re = /x/; re.lastIndex"), 0.0);
    assert_eq!(text("typeof /x/"), "object");
}

#[test]
fn comma_and_void() {
    assert_eq!(num("(1, 2, 3)"), 3.0);
    assert_eq!(text("typeof void 0"), "undefined");
}

#[test]
fn deep_member_chains() {
    assert_eq!(num("var o = {a: {b: {c: 41}}}; o.a.b.c + 1"), 42.0);
    assert_eq!(num("var o = {f: function () { return this.n; }, n: 8}; o['f']()"), 8.0);
}
