//! Object arena.
//!
//! Every ECMAScript object lives in a flat arena owned by the interpreter
//! and is addressed by a stable [`ObjectId`] handle. Objects are never freed
//! individually; the whole arena is dropped with the interpreter. This is
//! the handle-arena ownership model: prototype chains, scope chains and
//! closures may form arbitrary cycles without any reference-counting
//! discipline, because handles carry no ownership.

use crate::object::Object;

/// Stable handle to an object in the interpreter's arena.
///
/// `u32` keeps [`Value`](crate::value::Value) at two words. Handles are only
/// meaningful within the interpreter that allocated them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena of all live objects.
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Object>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(64),
        }
    }

    /// Moves an object into the arena and returns its handle.
    pub fn alloc(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.slots.len() as u32);
        self.slots.push(object);
        id
    }

    /// Shared access to an object.
    ///
    /// # Panics
    /// Panics on a handle from a different interpreter.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ObjectId) -> &Object {
        &self.slots[id.index()]
    }

    /// Mutable access to an object.
    ///
    /// # Panics
    /// Panics on a handle from a different interpreter.
    #[inline]
    #[must_use]
    pub fn get_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.slots[id.index()]
    }

    /// Number of objects allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
