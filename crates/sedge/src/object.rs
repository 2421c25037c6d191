//! Object records: property maps, attributes, classes, and per-kind payloads.
//!
//! An [`Object`] is a native property bag plus an [`ObjectData`] payload that
//! selects any specialized internal-method behavior (function objects, host
//! natives, the `arguments` object, primitive wrappers). The internal methods
//! themselves (Get, Put, DefaultValue, …) walk prototype chains and may call
//! back into script, so they live on the interpreter; see `protocol.rs`.

use std::rc::Rc;

use bitflags::bitflags;
use indexmap::IndexMap;
use strum::{Display, IntoStaticStr};

use crate::{
    ast::{Ast, FunctionId},
    error::RunResult,
    heap::ObjectId,
    intern::StringId,
    interp::Interp,
    scope::ScopeChain,
    string::JsString,
    value::Value,
};

bitflags! {
    /// Property attributes (§8.6.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attr: u8 {
        /// The property's value cannot be changed by [[Put]].
        const READ_ONLY = 1 << 0;
        /// The property is skipped by for-in enumeration.
        const DONT_ENUM = 1 << 1;
        /// The property cannot be removed by [[Delete]].
        const DONT_DELETE = 1 << 2;
    }
}

/// A named property slot.
#[derive(Debug, Clone)]
pub struct Property {
    pub value: Value,
    pub attrs: Attr,
}

/// The [[Class]] of an object (§8.6.2).
///
/// The display form is the string observed through
/// `Object.prototype.toString`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Class {
    Object,
    Function,
    Array,
    String,
    Boolean,
    Number,
    Error,
    Arguments,
    RegExp,
    /// Activation objects are spec machinery and never escape to script
    /// through `Object.prototype.toString`, but they still carry a class.
    Activation,
    #[strum(serialize = "global")]
    Global,
}

/// Signature of a host-native function.
///
/// `callee` is the function object being invoked (so a native can read its
/// own properties), `this` the resolved this-object.
pub type NativeFn = fn(&mut Interp, callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value>;

/// Payload of a host-exposed native function object.
#[derive(Clone)]
pub struct NativeFunc {
    /// Name reported in tracebacks and `Function.prototype.toString`.
    pub name: StringId,
    /// Value of the `length` property.
    pub length: u8,
    pub call: NativeFn,
    /// Natives are constructors only when they opt in; a plain native has no
    /// [[Construct]] and `new` on it throws TypeError.
    pub construct: Option<NativeFn>,
}

impl std::fmt::Debug for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunc")
            .field("name", &self.name)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Payload of a script function object: the syntactic descriptor plus the
/// scope chain captured at evaluation of the function expression or
/// declaration (§13.2).
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub ast: Rc<Ast>,
    pub def: FunctionId,
    pub scope: ScopeChain,
}

/// Payload of an `arguments` object (§10.1.8).
///
/// Index `i` with a `Some` slot shares storage with that formal parameter
/// on the activation object; reading or writing `arguments[i]` reads or
/// writes the formal. Deleting such an index severs the join (the slot
/// becomes `None`). Extra actual arguments are ordinary own properties.
#[derive(Debug, Clone)]
pub struct ArgumentsData {
    pub activation: ObjectId,
    pub formals: Vec<Option<StringId>>,
}

/// Per-kind payload selecting specialized internal-method behavior.
#[derive(Debug, Clone, Default)]
pub enum ObjectData {
    /// Plain native property bag; default internal methods throughout.
    #[default]
    Plain,
    /// Script function: callable, constructible, has [[HasInstance]].
    Function(FunctionData),
    /// Host native function.
    Native(NativeFunc),
    /// The `arguments` object of an active call.
    Arguments(ArgumentsData),
    /// Primitive wrappers keep their [[Value]] out of the property map.
    BoolBox(bool),
    NumberBox(f64),
    StringBox(JsString),
}

/// An object record: class, optional prototype, own properties in insertion
/// order, and payload.
#[derive(Debug)]
pub struct Object {
    pub class: Class,
    pub prototype: Option<ObjectId>,
    props: IndexMap<StringId, Property, ahash::RandomState>,
    pub data: ObjectData,
}

impl Object {
    /// Creates an object with the given class and prototype and no own
    /// properties.
    #[must_use]
    pub fn new(class: Class, prototype: Option<ObjectId>) -> Self {
        Self {
            class,
            prototype,
            props: IndexMap::default(),
            data: ObjectData::Plain,
        }
    }

    /// Creates an object with a payload.
    #[must_use]
    pub fn with_data(class: Class, prototype: Option<ObjectId>, data: ObjectData) -> Self {
        Self {
            class,
            prototype,
            props: IndexMap::default(),
            data,
        }
    }

    /// Reads an own property slot.
    #[must_use]
    pub fn own(&self, name: StringId) -> Option<&Property> {
        self.props.get(&name)
    }

    /// Mutable own property slot.
    #[must_use]
    pub fn own_mut(&mut self, name: StringId) -> Option<&mut Property> {
        self.props.get_mut(&name)
    }

    /// True when the object has an own property of that name.
    #[must_use]
    pub fn has_own(&self, name: StringId) -> bool {
        self.props.contains_key(&name)
    }

    /// Creates or overwrites an own property, replacing value *and*
    /// attributes. This is the raw slot write used by object construction
    /// and declaration binding; [[Put]]-with-CanPut lives on the
    /// interpreter.
    pub fn define(&mut self, name: StringId, value: Value, attrs: Attr) {
        self.props.insert(name, Property { value, attrs });
    }

    /// Removes an own property slot regardless of attributes.
    ///
    /// Uses `shift_remove` to preserve the insertion order of the remaining
    /// properties, which is the enumeration order.
    pub fn remove(&mut self, name: StringId) -> bool {
        self.props.shift_remove(&name).is_some()
    }

    /// Own property names with their DontEnum bit, in insertion order.
    /// This is the object's [[Enumerator]] over own properties.
    pub fn own_keys(&self) -> impl Iterator<Item = (StringId, bool)> + '_ {
        self.props
            .iter()
            .map(|(&name, prop)| (name, prop.attrs.contains(Attr::DONT_ENUM)))
    }

    /// Number of own properties.
    #[must_use]
    pub fn own_len(&self) -> usize {
        self.props.len()
    }

    /// The function payload, if this is a script function.
    #[must_use]
    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.data {
            ObjectData::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The native payload, if this is a host native.
    #[must_use]
    pub fn as_native(&self) -> Option<&NativeFunc> {
        match &self.data {
            ObjectData::Native(n) => Some(n),
            _ => None,
        }
    }

    /// True when the object has a [[Call]] method.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self.data, ObjectData::Function(_) | ObjectData::Native(_))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::intern::WellKnown;

    #[test]
    fn define_then_own_reads_back() {
        let mut o = Object::new(Class::Object, None);
        o.define(WellKnown::Length.into(), Value::Number(3.0), Attr::DONT_ENUM);
        let prop = o.own(WellKnown::Length.into()).unwrap();
        assert!(matches!(prop.value, Value::Number(n) if n == 3.0));
        assert!(prop.attrs.contains(Attr::DONT_ENUM));
    }

    #[test]
    fn remove_preserves_insertion_order() {
        let mut o = Object::new(Class::Object, None);
        o.define(WellKnown::Name.into(), Value::Null, Attr::empty());
        o.define(WellKnown::Message.into(), Value::Null, Attr::empty());
        o.define(WellKnown::Length.into(), Value::Null, Attr::empty());
        assert!(o.remove(WellKnown::Message.into()));
        let keys: Vec<StringId> = o.own_keys().map(|(name, _)| name).collect();
        assert_eq!(keys, vec![WellKnown::Name.into(), WellKnown::Length.into()]);
    }

    #[test]
    fn class_display_matches_spec_strings() {
        assert_eq!(Class::Object.to_string(), "Object");
        assert_eq!(Class::Global.to_string(), "global");
    }
}
