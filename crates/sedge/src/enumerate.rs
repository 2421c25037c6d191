//! Property enumeration for `for…in` (§12.6.4).
//!
//! The snapshot is computed *before* iteration starts: (name, depth,
//! dontenum) triples are collected from the object and its whole prototype
//! chain, sorted by name identity then depth, and reduced so the
//! shallowest occurrence of each name decides — if that occurrence is
//! DontEnum the name is dropped entirely, even when a deeper enumerable
//! property of the same name exists.
//!
//! Deletions during iteration must be honored, so the iterator re-checks
//! [[HasProperty]] as it hands out each name; insertions mid-loop are not
//! required to be observed and never are.

use crate::{
    heap::{Heap, ObjectId},
    intern::StringId,
    interp::Interp,
};

/// Snapshot of the enumerable property names of `object`, in name-identity
/// order (deterministic within an interpreter: `StringId`s are handed out
/// in first-intern order).
#[must_use]
pub(crate) fn enumerate(heap: &Heap, object: ObjectId) -> Vec<StringId> {
    let mut triples: Vec<(StringId, u32, bool)> = Vec::new();
    let mut depth = 0u32;
    let mut cursor = Some(object);
    while let Some(id) = cursor {
        let obj = heap.get(id);
        for (name, dontenum) in obj.own_keys() {
            triples.push((name, depth, dontenum));
        }
        cursor = obj.prototype;
        depth += 1;
    }

    // identity primary, shallowest first secondary
    triples.sort_by_key(|&(name, d, _)| (name, d));

    let mut names = Vec::with_capacity(triples.len());
    let mut current: Option<StringId> = None;
    for (name, _, dontenum) in triples {
        if current == Some(name) {
            continue;
        }
        current = Some(name);
        if !dontenum {
            names.push(name);
        }
    }
    names
}

/// An in-progress `for…in` iteration: the pre-computed snapshot plus the
/// delete-safety re-check.
#[derive(Debug)]
pub(crate) struct Enumerator {
    object: ObjectId,
    names: Vec<StringId>,
    next: usize,
}

impl Enumerator {
    pub(crate) fn new(heap: &Heap, object: ObjectId) -> Self {
        Self {
            object,
            names: enumerate(heap, object),
            next: 0,
        }
    }
}

impl Interp {
    /// Steps an enumerator, skipping names the object no longer has.
    pub(crate) fn enum_next(&mut self, e: &mut Enumerator) -> Option<StringId> {
        while e.next < e.names.len() {
            let name = e.names[e.next];
            e.next += 1;
            if self.has_property(e.object, name) {
                return Some(name);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        compat::Compat,
        object::{Attr, Class, Object},
        value::Value,
    };

    fn named(i: &mut Interp, s: &str) -> StringId {
        i.intern_str(s)
    }

    #[test]
    fn shallow_dontenum_hides_deeper_enumerable() {
        let mut i = Interp::new(Compat::default());
        let proto = i.new_object();
        let x = named(&mut i, "x");
        i.heap.get_mut(proto).define(x, Value::Number(1.0), Attr::empty());

        let child = i.heap.alloc(Object::new(Class::Object, Some(proto)));
        i.heap.get_mut(child).define(x, Value::Number(2.0), Attr::DONT_ENUM);

        assert_eq!(enumerate(&i.heap, child), vec![]);
    }

    #[test]
    fn prototype_properties_are_enumerated_once() {
        let mut i = Interp::new(Compat::default());
        let proto = i.new_object();
        let a = named(&mut i, "a");
        let b = named(&mut i, "b");
        i.heap.get_mut(proto).define(a, Value::Number(1.0), Attr::empty());

        let child = i.heap.alloc(Object::new(Class::Object, Some(proto)));
        i.heap.get_mut(child).define(a, Value::Number(2.0), Attr::empty());
        i.heap.get_mut(child).define(b, Value::Number(3.0), Attr::empty());

        let mut names = enumerate(&i.heap, child);
        names.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn deleted_names_are_skipped_by_the_iterator() {
        let mut i = Interp::new(Compat::default());
        let o = i.new_object();
        let a = named(&mut i, "a");
        let b = named(&mut i, "b");
        i.heap.get_mut(o).define(a, Value::Number(1.0), Attr::empty());
        i.heap.get_mut(o).define(b, Value::Number(2.0), Attr::empty());

        let mut e = Enumerator::new(&i.heap, o);
        let first = i.enum_next(&mut e).unwrap();
        // delete the other property mid-iteration
        let other = if first == a { b } else { a };
        assert!(i.delete(o, other));
        assert_eq!(i.enum_next(&mut e), None);
    }
}
