//! Abstract type conversions and comparisons over full values (§9, §11.8.5,
//! §11.9).
//!
//! Everything here may re-enter script through DefaultValue, so these are
//! interpreter methods. The conversions that never touch the object graph
//! (ToBoolean, the numeric narrowings, the §9.8.1 number printer) live in
//! `value.rs`.

use crate::{
    compat::Compat,
    error::RunResult,
    heap::ObjectId,
    interp::Interp,
    object::{Class, Object, ObjectData},
    protocol::Hint,
    string::JsString,
    value::{self, Value},
};

impl Interp {
    /// ToPrimitive (§9.1): identity on primitives, DefaultValue on objects.
    pub fn to_primitive(&mut self, v: &Value, hint: Hint) -> RunResult<Value> {
        match v {
            Value::Object(id) => self.default_value(*id, hint),
            other => Ok(other.clone()),
        }
    }

    /// ToNumber (§9.3).
    pub fn to_number(&mut self, v: &Value) -> RunResult<f64> {
        Ok(match v {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Number(n) => *n,
            Value::Str(s) => value::string_to_number(s, self.compat.contains(Compat::EXT1)),
            Value::Object(id) => {
                let prim = self.default_value(*id, Hint::Number)?;
                self.to_number(&prim)?
            }
        })
    }

    /// ToInteger (§9.4).
    pub fn to_integer(&mut self, v: &Value) -> RunResult<f64> {
        Ok(value::to_integer(self.to_number(v)?))
    }

    /// ToInt32 (§9.5).
    pub fn to_int32(&mut self, v: &Value) -> RunResult<i32> {
        Ok(value::to_int32(self.to_number(v)?))
    }

    /// ToUint32 (§9.6).
    pub fn to_uint32(&mut self, v: &Value) -> RunResult<u32> {
        Ok(value::to_uint32(self.to_number(v)?))
    }

    /// ToString (§9.8).
    pub fn to_string_value(&mut self, v: &Value) -> RunResult<JsString> {
        Ok(match v {
            Value::Undefined => JsString::from_str_slice("undefined"),
            Value::Null => JsString::from_str_slice("null"),
            Value::Bool(true) => JsString::from_str_slice("true"),
            Value::Bool(false) => JsString::from_str_slice("false"),
            Value::Number(n) => value::number_to_string(*n),
            Value::Str(s) => s.clone(),
            Value::Object(id) => {
                let prim = self.default_value(*id, Hint::String)?;
                self.to_string_value(&prim)?
            }
        })
    }

    /// ToObject (§9.9): wraps primitives, throws on undefined/null.
    pub fn to_object(&mut self, v: &Value) -> RunResult<ObjectId> {
        match v {
            Value::Undefined => Err(self.type_error("cannot convert undefined to an object")),
            Value::Null => Err(self.type_error("cannot convert null to an object")),
            Value::Bool(b) => {
                let proto = self.protos.boolean;
                Ok(self
                    .heap
                    .alloc(Object::with_data(Class::Boolean, Some(proto), ObjectData::BoolBox(*b))))
            }
            Value::Number(n) => {
                let proto = self.protos.number;
                Ok(self
                    .heap
                    .alloc(Object::with_data(Class::Number, Some(proto), ObjectData::NumberBox(*n))))
            }
            Value::Str(s) => Ok(self.new_string_object(s.clone())),
            Value::Object(id) => Ok(*id),
        }
    }

    /// Allocates a String wrapper object with its `length` property.
    pub(crate) fn new_string_object(&mut self, s: JsString) -> ObjectId {
        let proto = self.protos.string;
        let len = s.len();
        let id = self
            .heap
            .alloc(Object::with_data(Class::String, Some(proto), ObjectData::StringBox(s)));
        self.heap.get_mut(id).define(
            crate::intern::WellKnown::Length.into(),
            Value::Number(len as f64),
            crate::object::Attr::READ_ONLY | crate::object::Attr::DONT_ENUM | crate::object::Attr::DONT_DELETE,
        );
        id
    }

    /// The `typeof` operator's classification (§11.4.3).
    pub fn type_of(&self, v: &Value) -> &'static str {
        match v {
            Value::Object(id) => {
                if self.heap.get(*id).is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
            other => value::primitive_type_name(other),
        }
    }

    /// The `+` operator (§11.6.1): the one polymorphic binary operator.
    /// String-ness is decided after ToPrimitive with no hint.
    pub fn add_values(&mut self, left: &Value, right: &Value) -> RunResult<Value> {
        let lp = self.to_primitive(left, Hint::None)?;
        let rp = self.to_primitive(right, Hint::None)?;
        if let Value::Str(_) = lp {
            let l = self.to_string_value(&lp)?;
            let r = self.to_string_value(&rp)?;
            return Ok(Value::Str(JsString::concat(&l, &r)));
        }
        if let Value::Str(_) = rp {
            let l = self.to_string_value(&lp)?;
            let r = self.to_string_value(&rp)?;
            return Ok(Value::Str(JsString::concat(&l, &r)));
        }
        let l = self.to_number(&lp)?;
        let r = self.to_number(&rp)?;
        Ok(Value::Number(l + r))
    }

    /// The abstract relational comparison (§11.8.5): `Some(x < y)`, or
    /// `None` when a NaN makes the comparison undefined.
    pub fn less_than(&mut self, left: &Value, right: &Value) -> RunResult<Option<bool>> {
        let lp = self.to_primitive(left, Hint::Number)?;
        let rp = self.to_primitive(right, Hint::Number)?;
        if let (Value::Str(a), Value::Str(b)) = (&lp, &rp) {
            return Ok(Some(a.compare(b) == std::cmp::Ordering::Less));
        }
        let x = self.to_number(&lp)?;
        let y = self.to_number(&rp)?;
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    /// The abstract equality comparison (§11.9.3).
    pub fn loose_equals(&mut self, left: &Value, right: &Value) -> RunResult<bool> {
        use Value as V;
        Ok(match (left, right) {
            // same-type fast paths
            (V::Undefined | V::Null, V::Undefined | V::Null) => true,
            (V::Number(a), V::Number(b)) => a == b,
            (V::Str(a), V::Str(b)) => a == b,
            (V::Bool(a), V::Bool(b)) => a == b,
            (V::Object(a), V::Object(b)) => a == b,

            // Number <-> String
            (V::Number(a), V::Str(b)) => {
                *a == value::string_to_number(b, self.compat.contains(Compat::EXT1))
            }
            (V::Str(a), V::Number(b)) => {
                value::string_to_number(a, self.compat.contains(Compat::EXT1)) == *b
            }

            // Boolean operands coerce through ToNumber first
            (V::Bool(a), other) => {
                let n = Value::Number(if *a { 1.0 } else { 0.0 });
                self.loose_equals(&n, other)?
            }
            (other, V::Bool(b)) => {
                let n = Value::Number(if *b { 1.0 } else { 0.0 });
                self.loose_equals(other, &n)?
            }

            // Object <-> primitive goes through ToPrimitive
            (V::Object(id), other @ (V::Number(_) | V::Str(_))) => {
                let prim = self.default_value(*id, Hint::None)?;
                self.loose_equals(&prim, other)?
            }
            (other @ (V::Number(_) | V::Str(_)), V::Object(id)) => {
                let prim = self.default_value(*id, Hint::None)?;
                self.loose_equals(other, &prim)?
            }

            _ => false,
        })
    }

    /// The strict equality comparison (§11.9.6): no coercion at all.
    pub fn strict_equals(&self, left: &Value, right: &Value) -> bool {
        std::mem::discriminant(left) == std::mem::discriminant(right) && left.same_type_equals(right)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::intern::WellKnown;

    fn interp() -> Interp {
        Interp::new(Compat::default())
    }

    fn s(text: &str) -> Value {
        Value::Str(JsString::from_str_slice(text))
    }

    #[test]
    fn loose_equality_table() {
        let mut i = interp();
        assert!(i.loose_equals(&Value::Null, &Value::Undefined).unwrap());
        assert!(!i.loose_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)).unwrap());
        assert!(i.loose_equals(&Value::Number(0.0), &Value::Number(-0.0)).unwrap());
        assert!(i.loose_equals(&Value::Number(1.0), &s("1")).unwrap());
        assert!(i.loose_equals(&Value::Bool(true), &s("1")).unwrap());
        assert!(!i.loose_equals(&Value::Null, &Value::Number(0.0)).unwrap());
    }

    #[test]
    fn strict_equality_never_coerces() {
        let i = interp();
        assert!(!i.strict_equals(&Value::Null, &Value::Undefined));
        assert!(!i.strict_equals(&Value::Number(1.0), &s("1")));
        assert!(i.strict_equals(&s("a"), &s("a")));
        assert!(!i.strict_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
    }

    #[test]
    fn relational_on_strings_is_code_unit_order() {
        let mut i = interp();
        assert_eq!(i.less_than(&s("abc"), &s("abd")).unwrap(), Some(true));
        assert_eq!(i.less_than(&s("10"), &s("9")).unwrap(), Some(true));
        assert_eq!(i.less_than(&Value::Number(10.0), &Value::Number(9.0)).unwrap(), Some(false));
        assert_eq!(i.less_than(&Value::Number(f64::NAN), &Value::Number(1.0)).unwrap(), None);
    }

    #[test]
    fn add_prefers_strings() {
        let mut i = interp();
        let Value::Str(out) = i.add_values(&s("a"), &Value::Number(1.0)).unwrap() else {
            panic!("expected string");
        };
        assert_eq!(out.to_utf8().unwrap(), "a1");
        let Value::Number(out) = i.add_values(&Value::Number(1.0), &Value::Number(2.0)).unwrap() else {
            panic!("expected number");
        };
        assert_eq!(out, 3.0);
    }

    #[test]
    fn to_object_rejects_nullish() {
        let mut i = interp();
        assert!(i.to_object(&Value::Undefined).is_err());
        assert!(i.to_object(&Value::Null).is_err());
        let id = i.to_object(&s("abc")).unwrap();
        let len = i.get(id, WellKnown::Length.into()).unwrap();
        assert!(matches!(len, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn default_value_consults_wrapper_payload() {
        // primitive wrappers get valueOf from their prototypes at init
        let mut i = interp();
        let id = i.to_object(&Value::Number(42.0)).unwrap();
        let n = i.to_number(&Value::Object(id)).unwrap();
        assert_eq!(n, 42.0);
    }
}
