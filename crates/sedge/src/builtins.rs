//! The host objects §15 obliges the core to provide: the Global object's
//! value properties and functions, the Object/Function/Array/String/
//! Boolean/Number constructors with their prototypes, and the Error class
//! family.
//!
//! These are deliberately minimal — constructible and callable with the
//! behavior the engine itself relies on (ToObject wrappers, DefaultValue's
//! `valueOf`/`toString` probes, array literals, error throwing) — not the
//! full method suites, which are out of scope.

use crate::{
    error::{ErrorKind, RunResult},
    heap::ObjectId,
    input::StringInput,
    intern::WellKnown,
    interp::Interp,
    object::{Attr, Class, NativeFn, NativeFunc, Object, ObjectData},
    printer,
    string::{JsString, JsStringBuilder},
    value::{self, Value},
};

/// Attributes of built-in properties: visible but not enumerable.
const BUILTIN: Attr = Attr::DONT_ENUM;
/// Attributes of the fixed value properties (`NaN`, `Infinity`, …).
const PINNED: Attr = Attr::DONT_ENUM.union(Attr::DONT_DELETE);

/// Populates the Global object and the prototypes allocated by
/// [`Interp::new`].
pub(crate) fn install(interp: &mut Interp) {
    install_object_prototype(interp);
    install_function_prototype(interp);
    install_wrapper_prototypes(interp);
    install_array_prototype(interp);
    install_error_prototypes(interp);
    install_global(interp);
}

fn define(interp: &mut Interp, on: ObjectId, name: WellKnown, value: Value, attrs: Attr) {
    interp.heap.get_mut(on).define(name.into(), value, attrs);
}

fn method(interp: &mut Interp, on: ObjectId, name: WellKnown, length: u8, call: NativeFn) {
    let f = interp.new_native(name.into(), length, call, None);
    define(interp, on, name, Value::Object(f), BUILTIN);
}

/// Installs a constructor whose call and construct behaviors may differ
/// (`String(v)` converts while `new String(v)` wraps).
fn constructor2(
    interp: &mut Interp,
    name: WellKnown,
    length: u8,
    call: NativeFn,
    construct: NativeFn,
    proto: ObjectId,
) -> ObjectId {
    let ctor = interp.new_native(name.into(), length, call, Some(construct));
    define(
        interp,
        ctor,
        WellKnown::Prototype,
        Value::Object(proto),
        Attr::READ_ONLY | Attr::DONT_ENUM | Attr::DONT_DELETE,
    );
    define(interp, proto, WellKnown::Constructor, Value::Object(ctor), BUILTIN);
    let global = interp.global;
    define(interp, global, name, Value::Object(ctor), BUILTIN);
    ctor
}

fn constructor(interp: &mut Interp, name: WellKnown, length: u8, call: NativeFn, proto: ObjectId) -> ObjectId {
    let ctor = interp.new_native(name.into(), length, call, Some(call));
    define(
        interp,
        ctor,
        WellKnown::Prototype,
        Value::Object(proto),
        Attr::READ_ONLY | Attr::DONT_ENUM | Attr::DONT_DELETE,
    );
    define(interp, proto, WellKnown::Constructor, Value::Object(ctor), BUILTIN);
    let global = interp.global;
    define(interp, global, name, Value::Object(ctor), BUILTIN);
    ctor
}

fn install_object_prototype(interp: &mut Interp) {
    let proto = interp.protos.object;
    method(interp, proto, WellKnown::ToString, 0, object_proto_to_string);
    method(interp, proto, WellKnown::ValueOf, 0, object_proto_value_of);
    method(interp, proto, WellKnown::HasOwnProperty, 1, object_proto_has_own_property);
}

fn install_function_prototype(interp: &mut Interp) {
    // Function.prototype is itself callable and returns undefined
    let proto = interp.protos.function;
    interp.heap.get_mut(proto).data = ObjectData::Native(NativeFunc {
        name: WellKnown::EmptyString.into(),
        length: 0,
        call: function_proto_call,
        construct: None,
    });
    method(interp, proto, WellKnown::ToString, 0, function_proto_to_string);
}

fn install_wrapper_prototypes(interp: &mut Interp) {
    let string_proto = interp.protos.string;
    method(interp, string_proto, WellKnown::ToString, 0, string_proto_value_of);
    method(interp, string_proto, WellKnown::ValueOf, 0, string_proto_value_of);

    let boolean_proto = interp.protos.boolean;
    method(interp, boolean_proto, WellKnown::ToString, 0, boolean_proto_to_string);
    method(interp, boolean_proto, WellKnown::ValueOf, 0, boolean_proto_value_of);

    let number_proto = interp.protos.number;
    method(interp, number_proto, WellKnown::ToString, 0, number_proto_to_string);
    method(interp, number_proto, WellKnown::ValueOf, 0, number_proto_value_of);
}

fn install_array_prototype(interp: &mut Interp) {
    let proto = interp.protos.array;
    method(interp, proto, WellKnown::ToString, 0, array_proto_join);
    method(interp, proto, WellKnown::Join, 1, array_proto_join);
    define(
        interp,
        proto,
        WellKnown::Length,
        Value::Number(0.0),
        Attr::DONT_ENUM | Attr::DONT_DELETE,
    );
}

/// The well-known name of each error class, in [`ErrorKind::ALL`] order.
const ERROR_NAMES: [WellKnown; 7] = [
    WellKnown::Error,
    WellKnown::EvalError,
    WellKnown::RangeError,
    WellKnown::ReferenceError,
    WellKnown::SyntaxError,
    WellKnown::TypeError,
    WellKnown::UriError,
];

fn install_error_prototypes(interp: &mut Interp) {
    for (i, &name) in ERROR_NAMES.iter().enumerate() {
        let proto = interp.protos.errors[i];
        let class_name = JsString::from_str_slice(name.text());
        define(interp, proto, WellKnown::Name, Value::Str(class_name), BUILTIN);
        define(
            interp,
            proto,
            WellKnown::Message,
            Value::Str(JsString::empty()),
            BUILTIN,
        );
        method(interp, proto, WellKnown::ToString, 0, error_proto_to_string);
        constructor(interp, name, 1, error_construct, proto);
    }
}

fn install_global(interp: &mut Interp) {
    let global = interp.global;
    define(interp, global, WellKnown::NaN, Value::Number(f64::NAN), PINNED);
    define(interp, global, WellKnown::Infinity, Value::Number(f64::INFINITY), PINNED);
    define(interp, global, WellKnown::Undefined, Value::Undefined, PINNED);

    let eval_fn = interp.new_native(WellKnown::Eval.into(), 1, global_eval_fn, None);
    define(interp, global, WellKnown::Eval, Value::Object(eval_fn), BUILTIN);
    interp.eval_fn = eval_fn;

    method(interp, global, WellKnown::ParseInt, 2, global_parse_int);
    method(interp, global, WellKnown::ParseFloat, 1, global_parse_float);
    method(interp, global, WellKnown::IsNaN, 1, global_is_nan);
    method(interp, global, WellKnown::IsFinite, 1, global_is_finite);

    let object_proto = interp.protos.object;
    constructor(interp, WellKnown::ObjectCtor, 1, object_construct, object_proto);
    let function_proto = interp.protos.function;
    constructor(interp, WellKnown::FunctionCtor, 1, function_construct, function_proto);
    let array_proto = interp.protos.array;
    constructor(interp, WellKnown::ArrayCtor, 1, array_construct, array_proto);
    let string_proto = interp.protos.string;
    constructor2(interp, WellKnown::StringCtor, 1, string_call, string_construct, string_proto);
    let boolean_proto = interp.protos.boolean;
    constructor2(interp, WellKnown::BooleanCtor, 1, boolean_call, boolean_construct, boolean_proto);
    let number_proto = interp.protos.number;
    constructor2(interp, WellKnown::NumberCtor, 1, number_call, number_construct, number_proto);
}

// ----- Object -----

fn object_proto_to_string(interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    let class: &'static str = interp.heap.get(this).class.into();
    let mut b = JsStringBuilder::new();
    b.append_str("[object ");
    b.append_str(class);
    b.append_str("]");
    Ok(Value::Str(b.build()))
}

fn object_proto_value_of(_interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    Ok(Value::Object(this))
}

fn object_proto_has_own_property(
    interp: &mut Interp,
    _callee: ObjectId,
    this: ObjectId,
    args: &[Value],
) -> RunResult<Value> {
    let name = args.first().cloned().unwrap_or(Value::Undefined);
    let name = interp.to_string_value(&name)?;
    let name = interp.intern(&name);
    Ok(Value::Bool(interp.heap.get(this).has_own(name)))
}

/// `Object(v)` and `new Object(v)` behave identically (§15.2.1/.2).
fn object_construct(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    match args.first() {
        None | Some(Value::Undefined | Value::Null) => Ok(Value::Object(interp.new_object())),
        Some(v) => Ok(Value::Object(interp.to_object(v)?)),
    }
}

// ----- Function -----

fn function_proto_call(_interp: &mut Interp, _callee: ObjectId, _this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    // §15.3.4: accepts any arguments, returns undefined
    Ok(Value::Undefined)
}

fn function_proto_to_string(interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    match &interp.heap.get(this).data {
        ObjectData::Function(f) => {
            let text = printer::print_function(&f.ast, &interp.interner, f.def);
            Ok(Value::Str(JsString::from_str_slice(&text)))
        }
        ObjectData::Native(n) => {
            let mut b = JsStringBuilder::new();
            b.append_str("function ");
            b.append(interp.interner.get(n.name));
            b.append_str("() { [native code] }");
            Ok(Value::Str(b.build()))
        }
        _ => Err(interp.type_error("Function.prototype.toString called on a non-function")),
    }
}

/// `Function(p1, …, pn, body)` (§15.3.2.1): parameters and body arrive as
/// strings and parse into a fresh function closing over Global.
fn function_construct(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let mut params = String::new();
    let mut body = String::new();
    if let Some((last, init)) = args.split_last() {
        for (i, arg) in init.iter().enumerate() {
            if i > 0 {
                params.push(',');
            }
            let text = interp.to_string_value(arg)?;
            params.push_str(&text.to_string());
        }
        let text = interp.to_string_value(last)?;
        body = text.to_string();
    }

    let name = Some(WellKnown::Anonymous.into());
    let mut params_input = StringInput::new(&params);
    let mut body_input = StringInput::new(&body);
    let program = match interp.parse_function(name, &mut params_input, &mut body_input) {
        Ok(p) => p,
        Err(e) => return Err(interp.parse_error_value(&e)),
    };
    Ok(Value::Object(interp.instantiate_program(&program)))
}

// ----- Array -----

fn array_construct(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let array = interp.new_array();
    let length_key = WellKnown::Length.into();
    if let [Value::Number(n)] = args {
        // a single numeric argument is a length (§15.4.2.2)
        let len = value::to_uint32(*n);
        if f64::from(len) != *n {
            return Err(interp.range_error("invalid array length"));
        }
        interp.put(array, length_key, Value::Number(f64::from(len)), Attr::empty())?;
        return Ok(Value::Object(array));
    }
    for (i, item) in args.iter().enumerate() {
        let name = interp.interner.intern_index(i as u32);
        interp.put(array, name, item.clone(), Attr::empty())?;
    }
    Ok(Value::Object(array))
}

fn array_proto_join(interp: &mut Interp, _callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let separator = match args.first() {
        None | Some(Value::Undefined) => JsString::from_str_slice(","),
        Some(v) => interp.to_string_value(v)?,
    };
    let length_key = WellKnown::Length.into();
    let len = interp.get(this, length_key)?;
    let len = value::to_uint32(interp.to_number(&len)?);

    let mut b = JsStringBuilder::new();
    for i in 0..len {
        if i > 0 {
            b.append(&separator);
        }
        let name = interp.interner.intern_index(i);
        let item = interp.get(this, name)?;
        if !item.is_nullish() {
            let text = interp.to_string_value(&item)?;
            b.append(&text);
        }
    }
    Ok(Value::Str(b.build()))
}

// ----- String / Boolean / Number wrappers -----

/// `String(v)` converts (§15.5.1).
fn string_call(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let s = match args.first() {
        None => JsString::empty(),
        Some(v) => interp.to_string_value(v)?,
    };
    Ok(Value::Str(s))
}

/// `new String(v)` wraps (§15.5.2).
fn string_construct(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let s = match args.first() {
        None => JsString::empty(),
        Some(v) => interp.to_string_value(v)?,
    };
    Ok(Value::Object(interp.new_string_object(s)))
}

fn string_proto_value_of(interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    match &interp.heap.get(this).data {
        ObjectData::StringBox(s) => Ok(Value::Str(s.clone())),
        _ => Err(interp.type_error("String.prototype.valueOf called on a non-String object")),
    }
}

/// `Boolean(v)` converts (§15.6.1).
fn boolean_call(_interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Bool(args.first().is_some_and(Value::to_boolean)))
}

/// `new Boolean(v)` wraps (§15.6.2).
fn boolean_construct(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let b = args.first().is_some_and(Value::to_boolean);
    let proto = interp.protos.boolean;
    Ok(Value::Object(interp.heap.alloc(Object::with_data(
        Class::Boolean,
        Some(proto),
        ObjectData::BoolBox(b),
    ))))
}

fn boolean_proto_value_of(interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    match &interp.heap.get(this).data {
        ObjectData::BoolBox(b) => Ok(Value::Bool(*b)),
        _ => Err(interp.type_error("Boolean.prototype.valueOf called on a non-Boolean object")),
    }
}

fn boolean_proto_to_string(interp: &mut Interp, callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value> {
    match boolean_proto_value_of(interp, callee, this, args)? {
        Value::Bool(true) => Ok(Value::Str(JsString::from_str_slice("true"))),
        _ => Ok(Value::Str(JsString::from_str_slice("false"))),
    }
}

/// `Number(v)` converts (§15.7.1).
fn number_call(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let n = match args.first() {
        None => 0.0,
        Some(v) => interp.to_number(v)?,
    };
    Ok(Value::Number(n))
}

/// `new Number(v)` wraps (§15.7.2).
fn number_construct(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let n = match args.first() {
        None => 0.0,
        Some(v) => interp.to_number(v)?,
    };
    let proto = interp.protos.number;
    Ok(Value::Object(interp.heap.alloc(Object::with_data(
        Class::Number,
        Some(proto),
        ObjectData::NumberBox(n),
    ))))
}

fn number_proto_value_of(interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    match &interp.heap.get(this).data {
        ObjectData::NumberBox(n) => Ok(Value::Number(*n)),
        _ => Err(interp.type_error("Number.prototype.valueOf called on a non-Number object")),
    }
}

fn number_proto_to_string(interp: &mut Interp, callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let Value::Number(n) = number_proto_value_of(interp, callee, this, args)? else {
        unreachable!("valueOf returns a number")
    };
    Ok(Value::Str(value::number_to_string(n)))
}

// ----- Error family -----

fn error_construct(interp: &mut Interp, callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let kind = match &interp.heap.get(callee).data {
        ObjectData::Native(n) => {
            let name = n.name;
            ERROR_NAMES
                .iter()
                .position(|&w| crate::intern::StringId::from(w) == name)
                .map_or(ErrorKind::Error, |i| ErrorKind::ALL[i])
        }
        _ => ErrorKind::Error,
    };
    let message = match args.first() {
        None | Some(Value::Undefined) => None,
        Some(v) => Some(interp.to_string_value(v)?),
    };
    let id = interp.make_error(kind, "");
    if let Some(message) = message {
        interp
            .heap
            .get_mut(id)
            .define(WellKnown::Message.into(), Value::Str(message), Attr::DONT_ENUM);
    } else {
        interp.heap.get_mut(id).remove(WellKnown::Message.into());
    }
    Ok(Value::Object(id))
}

fn error_proto_to_string(interp: &mut Interp, _callee: ObjectId, this: ObjectId, _args: &[Value]) -> RunResult<Value> {
    let name = interp.get(this, WellKnown::Name.into())?;
    let name = interp.to_string_value(&name)?;
    let message = interp.get(this, WellKnown::Message.into())?;
    let message = interp.to_string_value(&message)?;
    let mut b = JsStringBuilder::new();
    b.append(&name);
    if !message.is_empty() {
        b.append_str(": ");
        b.append(&message);
    }
    Ok(Value::Str(b.build()))
}

// ----- global functions -----

/// The callable behind `Global.eval`. Script calls are recognized by
/// identity at the call site and routed with the caller's context; this
/// body is only reached by host-side invocation, which gets the global
/// context (§15.1.2.1).
fn global_eval_fn(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let ctx = interp.global_context();
    interp.direct_eval(&ctx, args.first())
}

/// parseInt (§15.1.2.2).
fn global_parse_int(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let input = args.first().cloned().unwrap_or(Value::Undefined);
    let s = interp.to_string_value(&input)?;
    let radix = match args.get(1) {
        None | Some(Value::Undefined) => 0,
        Some(v) => interp.to_int32(v)?,
    };

    let units = s.units();
    let mut i = 0;
    while i < units.len() && value::is_str_whitespace(units[i]) {
        i += 1;
    }
    let mut sign = 1.0;
    if i < units.len() && (units[i] == u16::from(b'+') || units[i] == u16::from(b'-')) {
        if units[i] == u16::from(b'-') {
            sign = -1.0;
        }
        i += 1;
    }

    let mut radix = radix;
    let mut strip_prefix = true;
    match radix {
        0 => radix = 10,
        16 => {}
        _ => strip_prefix = false,
    }
    if !(2..=36).contains(&radix) && radix != 10 {
        return Ok(Value::Number(f64::NAN));
    }
    if strip_prefix
        && i + 1 < units.len()
        && units[i] == u16::from(b'0')
        && (units[i + 1] == u16::from(b'x') || units[i + 1] == u16::from(b'X'))
    {
        i += 2;
        radix = 16;
    }

    let mut value = 0.0f64;
    let mut digits = 0;
    while i < units.len() {
        let Some(d) = digit_value(units[i]) else { break };
        if i32::from(d) >= radix {
            break;
        }
        value = value * f64::from(radix) + f64::from(d);
        digits += 1;
        i += 1;
    }
    if digits == 0 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(sign * value))
}

fn digit_value(unit: u16) -> Option<u8> {
    match unit {
        0x30..=0x39 => Some((unit - 0x30) as u8),
        0x41..=0x5a => Some((unit - 0x41 + 10) as u8),
        0x61..=0x7a => Some((unit - 0x61 + 10) as u8),
        _ => None,
    }
}

/// parseFloat (§15.1.2.3): the longest StrDecimalLiteral prefix.
fn global_parse_float(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let input = args.first().cloned().unwrap_or(Value::Undefined);
    let s = interp.to_string_value(&input)?;
    let text: String = char::decode_utf16(s.units().iter().copied())
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    let trimmed = text.trim_start_matches(|c: char| c.is_whitespace());

    // scan the longest valid literal prefix
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut seen_digits = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if trimmed[end..].starts_with("Infinity") {
        let v: f64 = if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        return Ok(Value::Number(v));
    }
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digits = true;
                end += 1;
            }
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                end += 1;
            }
            b'e' | b'E' if seen_digits && !seen_exp => {
                // only take the exponent if digits follow
                let mut probe = end + 1;
                if matches!(bytes.get(probe), Some(b'+' | b'-')) {
                    probe += 1;
                }
                if bytes.get(probe).is_some_and(u8::is_ascii_digit) {
                    seen_exp = true;
                    end = probe;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    if !seen_digits {
        return Ok(Value::Number(f64::NAN));
    }
    let parsed = trimmed[..end].parse::<f64>().unwrap_or(f64::NAN);
    Ok(Value::Number(parsed))
}

fn global_is_nan(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let v = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Bool(interp.to_number(&v)?.is_nan()))
}

fn global_is_finite(interp: &mut Interp, _callee: ObjectId, _this: ObjectId, args: &[Value]) -> RunResult<Value> {
    let v = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Bool(interp.to_number(&v)?.is_finite()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::compat::Compat;

    fn eval(src: &str) -> Value {
        let mut i = Interp::new(Compat::default());
        i.global_eval(src).expect("script runs")
    }

    fn eval_str(src: &str) -> String {
        match eval(src) {
            Value::Str(s) => s.to_utf8().unwrap(),
            other => panic!("expected string from {src}, got {other:?}"),
        }
    }

    fn eval_num(src: &str) -> f64 {
        match eval(src) {
            Value::Number(n) => n,
            other => panic!("expected number from {src}, got {other:?}"),
        }
    }

    #[test]
    fn object_to_string_reports_class() {
        assert_eq!(eval_str("({}).toString()"), "[object Object]");
        assert_eq!(eval_str("[].toString === Object.prototype.toString ? 'same' : 'own'"), "own");
    }

    #[test]
    fn has_own_property_ignores_the_prototype() {
        assert_eq!(eval_str("({a: 1}).hasOwnProperty('a') + '/' + ({}).hasOwnProperty('toString')"), "true/false");
    }

    #[test]
    fn error_constructors_build_matching_names() {
        assert_eq!(eval_str("new TypeError('x').toString()"), "TypeError: x");
        assert_eq!(eval_str("new Error().toString()"), "Error");
        assert_eq!(eval_str("new RangeError('r').name"), "RangeError");
    }

    #[test]
    fn thrown_builtin_errors_are_catchable_objects() {
        assert_eq!(
            eval_str("var got = ''; try { null.x; } catch (e) { got = e.name; } got"),
            "TypeError"
        );
    }

    #[test]
    fn array_literal_and_join() {
        assert_eq!(eval_str("[1, 2, 3].join('-')"), "1-2-3");
        assert_eq!(eval_str("'' + [1, , 3]"), "1,,3");
        assert_eq!(eval_num("[1, 2, 3].length"), 3.0);
        assert_eq!(eval_num("new Array(5).length"), 5.0);
        assert_eq!(eval_num("new Array(1, 2).length"), 2.0);
    }

    #[test]
    fn parse_int_radix_handling() {
        assert_eq!(eval_num("parseInt('42')"), 42.0);
        assert_eq!(eval_num("parseInt('  -17 trailing')"), -17.0);
        assert_eq!(eval_num("parseInt('0xFF')"), 255.0);
        assert_eq!(eval_num("parseInt('ff', 16)"), 255.0);
        assert_eq!(eval_num("parseInt('101', 2)"), 5.0);
        assert!(eval_num("parseInt('zzz')").is_nan());
    }

    #[test]
    fn parse_float_prefix() {
        assert_eq!(eval_num("parseFloat('3.25rest')"), 3.25);
        assert_eq!(eval_num("parseFloat('1e2!')"), 100.0);
        assert!(eval_num("parseFloat('e5')").is_nan());
        assert_eq!(eval_num("parseFloat('-Infinity')"), f64::NEG_INFINITY);
    }

    #[test]
    fn is_nan_is_finite_coerce() {
        assert_eq!(eval_str("isNaN('abc') + '/' + isFinite('12')"), "true/true");
    }

    #[test]
    fn function_constructor_parses_params_and_body() {
        assert_eq!(eval_num("new Function('a', 'b', 'return a + b;')(2, 3)"), 5.0);
        assert_eq!(eval_num("Function('return 7;')()"), 7.0);
    }

    #[test]
    fn wrapper_value_of_round_trips() {
        assert_eq!(eval_num("new Number(6) * 7"), 42.0);
        assert_eq!(eval_str("new String('hi') + '!'"), "hi!");
        assert_eq!(eval_str("new Boolean(false).toString()"), "false");
    }

    #[test]
    fn function_to_string_decompiles() {
        let text = eval_str("(function add(a, b) { return a + b; }).toString()");
        assert!(text.starts_with("function add(a, b)"), "got: {text}");
        assert_eq!(eval_str("parseInt.toString()"), "function parseInt() { [native code] }");
    }

    #[test]
    fn any_call_to_the_eval_object_inherits_the_caller_context() {
        // the distinguished eval object is recognized by identity at the
        // call site, so even an aliased call sees the caller's scope
        assert_eq!(
            eval_num("var x = 1; function f() { var x = 9; var e = eval; return e('x'); } f()"),
            9.0
        );
    }
}
