//! String interning for property names and identifiers.
//!
//! Property lookup, scope lookup, and enumeration all key on [`StringId`]
//! rather than on string contents, so two interned strings with equal
//! contents are the *same* id. This gives reference-equality semantics for
//! interned strings and makes the enumeration order of §12.6 (identity
//! order) deterministic: ids are handed out in first-intern order.
//!
//! A fixed set of well-known names (the counterpart of a process-wide static
//! table) is interned at construction time at stable ids, so hot paths can
//! refer to `"length"`, `"prototype"` and friends without a map probe.

use ahash::AHashMap;
use strum::{EnumCount, FromRepr, IntoStaticStr};

use crate::string::JsString;

/// Index into the interner's string table.
///
/// `u32` keeps `Value` and property maps small; four billion distinct names
/// is far more than any script produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Reconstructs a `StringId` from a raw index, as stored in bytecode
    /// operands. The caller is responsible for validity.
    #[inline]
    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }
}

/// Names known at compile time and interned at fixed ids.
///
/// The discriminant *is* the `StringId`, so conversion is free. Keep new
/// variants at the end; reordering changes ids baked into compiled bytecode
/// within a session (harmless across sessions, since nothing persists).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum WellKnown {
    #[strum(serialize = "")]
    EmptyString,

    // Property names the core reads and writes directly.
    Length,
    Prototype,
    Constructor,
    Arguments,
    Callee,
    ToString,
    ValueOf,
    HasOwnProperty,
    Message,
    Name,
    Join,
    Source,
    LastIndex,
    #[strum(serialize = "__proto__")]
    Proto,

    // Global function and constructor names.
    Eval,
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    #[strum(serialize = "Object")]
    ObjectCtor,
    #[strum(serialize = "Function")]
    FunctionCtor,
    #[strum(serialize = "Array")]
    ArrayCtor,
    #[strum(serialize = "String")]
    StringCtor,
    #[strum(serialize = "Boolean")]
    BooleanCtor,
    #[strum(serialize = "Number")]
    NumberCtor,

    // Error class names (§15.11), also used as the `name` property.
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    #[strum(serialize = "URIError")]
    UriError,

    // Literal spellings and `typeof` results.
    Undefined,
    Null,
    True,
    False,
    #[strum(serialize = "NaN")]
    NaN,
    Infinity,
    #[strum(serialize = "object")]
    TypeofObject,
    #[strum(serialize = "boolean")]
    TypeofBoolean,
    #[strum(serialize = "number")]
    TypeofNumber,
    #[strum(serialize = "string")]
    TypeofString,
    #[strum(serialize = "function")]
    TypeofFunction,

    // Miscellaneous.
    Anonymous,
    Flags,
}

impl WellKnown {
    /// The name's text.
    #[must_use]
    pub fn text(self) -> &'static str {
        self.into()
    }
}

impl From<WellKnown> for StringId {
    #[inline]
    fn from(w: WellKnown) -> Self {
        Self(w as u32)
    }
}

/// Per-interpreter intern table.
///
/// Owned by the interpreter; ids are only meaningful within the interpreter
/// that produced them.
#[derive(Debug)]
pub struct Interner {
    table: Vec<JsString>,
    map: AHashMap<JsString, StringId>,
}

impl Interner {
    /// Creates an interner with every [`WellKnown`] name pre-interned at its
    /// discriminant id.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Self {
            table: Vec::with_capacity(WellKnown::COUNT + 64),
            map: AHashMap::with_capacity(WellKnown::COUNT + 64),
        };
        for repr in 0..WellKnown::COUNT as u32 {
            let name = WellKnown::from_repr(repr).expect("contiguous discriminants");
            let id = interner.intern_str(name.text());
            debug_assert_eq!(id.index(), repr as usize);
        }
        interner
    }

    /// Interns a string, returning the id of the canonical copy.
    pub fn intern(&mut self, s: &JsString) -> StringId {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        let id = StringId(self.table.len() as u32);
        self.table.push(s.clone());
        self.map.insert(s.clone(), id);
        id
    }

    /// Interns a Rust string slice.
    pub fn intern_str(&mut self, s: &str) -> StringId {
        self.intern(&JsString::from_str_slice(s))
    }

    /// Interns the decimal rendering of an array index.
    pub fn intern_index(&mut self, index: u32) -> StringId {
        let mut buf = itoa::Buffer::new();
        self.intern_str(buf.format(index))
    }

    /// Returns the canonical string for an id.
    ///
    /// # Panics
    /// Panics on an id from a different interner.
    #[must_use]
    pub fn get(&self, id: StringId) -> &JsString {
        &self.table[id.index()]
    }

    /// Looks up an already-interned string without inserting.
    #[must_use]
    pub fn lookup(&self, s: &JsString) -> Option<StringId> {
        self.map.get(s).copied()
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Always false: the well-known set is interned at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

/// Tiny decimal formatter so `intern_index` avoids a heap `String`.
mod itoa {
    pub struct Buffer {
        bytes: [u8; 10],
    }

    impl Buffer {
        pub fn new() -> Self {
            Self { bytes: [0; 10] }
        }

        pub fn format(&mut self, mut n: u32) -> &str {
            let mut i = self.bytes.len();
            loop {
                i -= 1;
                self.bytes[i] = b'0' + (n % 10) as u8;
                n /= 10;
                if n == 0 {
                    break;
                }
            }
            std::str::from_utf8(&self.bytes[i..]).expect("ascii digits")
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn well_known_ids_are_stable() {
        let interner = Interner::new();
        assert_eq!(interner.get(WellKnown::Length.into()).to_utf8().unwrap(), "length");
        assert_eq!(interner.get(WellKnown::UriError.into()).to_utf8().unwrap(), "URIError");
        assert_eq!(interner.get(WellKnown::EmptyString.into()).len(), 0);
    }

    #[test]
    fn equal_contents_same_id() {
        let mut interner = Interner::new();
        let a = interner.intern(&JsString::from_str_slice("answer"));
        let b = interner.intern_str("answer");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_contents_distinct_ids() {
        let mut interner = Interner::new();
        let a = interner.intern_str("a");
        let b = interner.intern_str("b");
        assert_ne!(a, b);
    }

    #[test]
    fn intern_index_matches_decimal_spelling() {
        let mut interner = Interner::new();
        let by_index = interner.intern_index(4294967295);
        let by_str = interner.intern_str("4294967295");
        assert_eq!(by_index, by_str);
    }

    #[test]
    fn pre_interned_names_hit_the_same_slot() {
        let mut interner = Interner::new();
        let id = interner.intern_str("prototype");
        assert_eq!(id, StringId::from(WellKnown::Prototype));
    }
}

