//! The object protocol: the internal methods of §8.6.2.
//!
//! Every operation dispatches over the object's [`ObjectData`] payload
//! before falling back to the native property-bag behavior. Only three
//! payloads specialize anything: `arguments` objects forward mapped indices
//! to their activation (§10.1.8), arrays maintain the `length` invariant
//! (§15.4.5.1), and function payloads supply Call/Construct/HasInstance.

use crate::{
    error::{ErrorKind, RunResult},
    heap::ObjectId,
    intern::{StringId, WellKnown},
    interp::Interp,
    object::{Attr, Class, ObjectData},
    scope::ScopeChain,
    string::JsString,
    value::{Reference, Value, to_uint32},
};

/// Hint for [`Interp::default_value`] / ToPrimitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
    /// No hint behaves as Number (§8.6.2.6; the Date exception is out of
    /// scope here).
    None,
}

/// Parses a canonical array index: decimal digits with no leading zero
/// (except "0" itself) below 2³²−1.
#[must_use]
pub(crate) fn array_index(s: &JsString) -> Option<u32> {
    let units = s.units();
    if units.is_empty() || units.len() > 10 {
        return None;
    }
    if units[0] == u16::from(b'0') && units.len() > 1 {
        return None;
    }
    let mut value: u64 = 0;
    for &unit in units {
        if !(0x30..=0x39).contains(&unit) {
            return None;
        }
        value = value * 10 + u64::from(unit - 0x30);
    }
    (value < u64::from(u32::MAX)).then(|| value as u32)
}

impl Interp {
    /// The activation slot an `arguments` index is joined to, if any.
    fn arguments_mapped(&self, id: ObjectId, name: StringId) -> Option<(ObjectId, StringId)> {
        let ObjectData::Arguments(args) = &self.heap.get(id).data else {
            return None;
        };
        let index = array_index(self.interner.get(name))? as usize;
        let formal = args.formals.get(index).copied().flatten()?;
        Some((args.activation, formal))
    }

    /// [[Get]] (§8.6.2.1).
    pub fn get(&mut self, id: ObjectId, name: StringId) -> RunResult<Value> {
        if let Some((activation, formal)) = self.arguments_mapped(id, name) {
            return self.get(activation, formal);
        }
        if self.compat.any_js() && name == WellKnown::Proto.into() {
            // Netscape __proto__ exposure
            return Ok(match self.heap.get(id).prototype {
                Some(proto) => Value::Object(proto),
                None => Value::Null,
            });
        }
        let mut cursor = Some(id);
        while let Some(o) = cursor {
            let obj = self.heap.get(o);
            if let Some(prop) = obj.own(name) {
                return Ok(prop.value.clone());
            }
            cursor = obj.prototype;
        }
        Ok(Value::Undefined)
    }

    /// [[CanPut]] (§8.6.2.3): the shallowest own property of that name
    /// decides; absence everywhere allows the write.
    pub fn can_put(&self, id: ObjectId, name: StringId) -> bool {
        let mut cursor = Some(id);
        while let Some(o) = cursor {
            let obj = self.heap.get(o);
            if let Some(prop) = obj.own(name) {
                return !prop.attrs.contains(Attr::READ_ONLY);
            }
            cursor = obj.prototype;
        }
        true
    }

    /// [[Put]] (§8.6.2.2): updates or creates the own property, silently
    /// doing nothing when CanPut denies the write. `attrs` only applies to
    /// a newly created property.
    pub fn put(&mut self, id: ObjectId, name: StringId, value: Value, attrs: Attr) -> RunResult<()> {
        if let Some((activation, formal)) = self.arguments_mapped(id, name) {
            return self.put(activation, formal, value, attrs);
        }
        if !self.can_put(id, name) {
            return Ok(());
        }
        if self.heap.get(id).class == Class::Array {
            return self.array_put(id, name, value, attrs);
        }
        match self.heap.get_mut(id).own_mut(name) {
            Some(prop) => prop.value = value,
            None => self.heap.get_mut(id).define(name, value, attrs),
        }
        Ok(())
    }

    /// Array [[Put]] with the §15.4.5.1 length coupling.
    fn array_put(&mut self, id: ObjectId, name: StringId, value: Value, attrs: Attr) -> RunResult<()> {
        let length_key: StringId = WellKnown::Length.into();
        if name == length_key {
            let numeric = self.to_number(&value)?;
            let new_len = to_uint32(numeric);
            if f64::from(new_len) != numeric {
                return Err(self.range_error("invalid array length"));
            }
            // truncate: drop own index properties at or beyond the new length
            let doomed: Vec<StringId> = self
                .heap
                .get(id)
                .own_keys()
                .map(|(key, _)| key)
                .filter(|key| array_index(self.interner.get(*key)).is_some_and(|i| i >= new_len))
                .collect();
            for key in doomed {
                self.heap.get_mut(id).remove(key);
            }
            if let Some(prop) = self.heap.get_mut(id).own_mut(length_key) {
                prop.value = Value::Number(f64::from(new_len));
            }
            return Ok(());
        }

        match self.heap.get_mut(id).own_mut(name) {
            Some(prop) => prop.value = value,
            None => self.heap.get_mut(id).define(name, value, attrs),
        }
        if let Some(index) = array_index(self.interner.get(name)) {
            let current = match self.heap.get(id).own(length_key) {
                Some(prop) => match prop.value {
                    Value::Number(n) => to_uint32(n),
                    _ => 0,
                },
                None => 0,
            };
            if index >= current
                && let Some(prop) = self.heap.get_mut(id).own_mut(length_key)
            {
                prop.value = Value::Number(f64::from(index) + 1.0);
            }
        }
        Ok(())
    }

    /// [[HasProperty]] (§8.6.2.4).
    pub fn has_property(&self, id: ObjectId, name: StringId) -> bool {
        if let ObjectData::Arguments(args) = &self.heap.get(id).data
            && let Some(index) = array_index(self.interner.get(name))
            && args.formals.get(index as usize).copied().flatten().is_some()
        {
            return true;
        }
        let mut cursor = Some(id);
        while let Some(o) = cursor {
            let obj = self.heap.get(o);
            if obj.has_own(name) {
                return true;
            }
            cursor = obj.prototype;
        }
        false
    }

    /// [[Delete]] (§8.6.2.5): own properties only.
    pub fn delete(&mut self, id: ObjectId, name: StringId) -> bool {
        if let ObjectData::Arguments(args) = &mut self.heap.get_mut(id).data {
            // severing the index→formal join is all a delete does here
            if let Some(index) = array_index(self.interner.get(name)).map(|i| i as usize)
                && args.formals.get(index).copied().flatten().is_some()
            {
                args.formals[index] = None;
                return true;
            }
        }
        let obj = self.heap.get_mut(id);
        match obj.own(name) {
            None => true,
            Some(prop) if prop.attrs.contains(Attr::DONT_DELETE) => false,
            Some(_) => obj.remove(name),
        }
    }

    /// [[DefaultValue]] (§8.6.2.6): consult `valueOf`/`toString` in hint
    /// order, taking the first primitive result.
    pub fn default_value(&mut self, id: ObjectId, hint: Hint) -> RunResult<Value> {
        let (first, second): (StringId, StringId) = match hint {
            Hint::String => (WellKnown::ToString.into(), WellKnown::ValueOf.into()),
            Hint::Number | Hint::None => (WellKnown::ValueOf.into(), WellKnown::ToString.into()),
        };
        for method in [first, second] {
            let candidate = self.get(id, method)?;
            if let Value::Object(f) = candidate
                && self.heap.get(f).is_callable()
            {
                let result = self.call(f, id, &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("cannot convert object to a primitive value"))
    }

    /// [[HasInstance]] (§15.3.5.3): walks the candidate's prototype chain
    /// looking for the function's `prototype` object.
    pub fn has_instance(&mut self, func: ObjectId, value: &Value) -> RunResult<bool> {
        let callable = {
            let obj = self.heap.get(func);
            match &obj.data {
                ObjectData::Function(_) => true,
                ObjectData::Native(n) => n.construct.is_some(),
                _ => false,
            }
        };
        if !callable {
            return Err(self.type_error("instanceof target is not a constructor"));
        }
        let Value::Object(mut candidate) = *value else {
            return Ok(false);
        };
        let target = self.get(func, WellKnown::Prototype.into())?;
        let Value::Object(target) = target else {
            return Err(self.type_error("constructor has no object prototype"));
        };
        loop {
            let Some(proto) = self.heap.get(candidate).prototype else {
                return Ok(false);
            };
            if proto == target {
                return Ok(true);
            }
            candidate = proto;
        }
    }

    /// [[Call]] with traceback, depth guard, and the tracer hook. Pushes a
    /// frame around the invocation and carries it into any error raised
    /// inside, so tracebacks reflect the frames live at throw time.
    pub fn call(&mut self, callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value> {
        self.enter_frame(callee, crate::error::CallKind::Call)?;
        let result = self.dispatch_call(callee, this, args);
        self.leave_frame();
        result
    }

    fn dispatch_call(&mut self, callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value> {
        match &self.heap.get(callee).data {
            ObjectData::Function(_) => self.call_function(callee, this, args),
            ObjectData::Native(n) => {
                let f = n.call;
                f(self, callee, this, args)
            }
            _ => Err(self.type_error("value is not a function")),
        }
    }

    /// [[Construct]] (§13.2.2): allocate the instance, wire its prototype,
    /// run the body, keep an explicit object result over the fresh
    /// instance.
    pub fn construct(&mut self, callee: ObjectId, args: &[Value]) -> RunResult<Value> {
        self.enter_frame(callee, crate::error::CallKind::Construct)?;
        let result = self.dispatch_construct(callee, args);
        self.leave_frame();
        result
    }

    fn dispatch_construct(&mut self, callee: ObjectId, args: &[Value]) -> RunResult<Value> {
        match &self.heap.get(callee).data {
            ObjectData::Function(_) => {
                let proto = match self.get(callee, WellKnown::Prototype.into())? {
                    Value::Object(p) => p,
                    _ => self.protos.object,
                };
                let instance = self
                    .heap
                    .alloc(crate::object::Object::new(Class::Object, Some(proto)));
                let result = self.call_function(callee, instance, args)?;
                Ok(match result {
                    Value::Object(id) => Value::Object(id),
                    _ => Value::Object(instance),
                })
            }
            ObjectData::Native(n) => match n.construct {
                Some(ctor) => ctor(self, callee, self.global, args),
                None => Err(self.type_error("value is not a constructor")),
            },
            _ => Err(self.type_error("value is not a constructor")),
        }
    }

    fn enter_frame(&mut self, callee: ObjectId, kind: crate::error::CallKind) -> RunResult<()> {
        if self.call_depth >= self.max_call_depth {
            return Err(self.throw_error(ErrorKind::RangeError, "too much recursion"));
        }
        self.call_depth += 1;
        let name = self.callee_name(callee);
        self.traceback.push(crate::error::TracebackFrame {
            callee: name,
            location: self.current_loc,
            kind,
        });
        let text = name.map(|id| self.interner.get(id).to_string());
        self.tracer.on_call(text.as_deref(), self.call_depth);
        Ok(())
    }

    fn leave_frame(&mut self) {
        self.traceback.pop();
        self.call_depth -= 1;
        self.tracer.on_return(self.call_depth);
    }

    fn callee_name(&self, callee: ObjectId) -> Option<StringId> {
        match &self.heap.get(callee).data {
            ObjectData::Function(f) => f.ast.function(f.def).name,
            ObjectData::Native(n) => Some(n.name),
            _ => None,
        }
    }

    // ----- references and scope (§8.7, §10.1.4) -----

    /// Walks the scope chain front-to-back; the first object answering
    /// [[HasProperty]] becomes the reference base. An exhausted chain
    /// produces a null-base reference.
    pub(crate) fn scope_lookup(&self, scope: &ScopeChain, name: StringId) -> Reference {
        for object in scope.iter() {
            if self.has_property(object, name) {
                return Reference {
                    base: Some(object),
                    property: name,
                };
            }
        }
        crate::scope::unresolved(name)
    }

    /// GetValue (§8.7.1) on a reference.
    pub(crate) fn reference_get(&mut self, r: &Reference) -> RunResult<Value> {
        match r.base {
            Some(base) => self.get(base, r.property),
            None => {
                if self.compat.contains(crate::compat::Compat::UNDEFDEF) {
                    Ok(Value::Undefined)
                } else {
                    let name = self.interner.get(r.property).to_string();
                    Err(self.reference_error(&format!("{name} is not defined")))
                }
            }
        }
    }

    /// PutValue (§8.7.2) on a reference: a null base writes to Global.
    pub(crate) fn reference_put(&mut self, r: &Reference, value: Value) -> RunResult<()> {
        let target = r.base.unwrap_or(self.global);
        self.put(target, r.property, value, Attr::empty())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::compat::Compat;

    fn interp() -> Interp {
        Interp::new(Compat::default())
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut i = interp();
        let o = i.new_object();
        let name = i.intern_str("answer");
        i.put(o, name, Value::Number(42.0), Attr::empty()).unwrap();
        assert!(matches!(i.get(o, name).unwrap(), Value::Number(n) if n == 42.0));
        assert!(i.has_property(o, name));
    }

    #[test]
    fn get_walks_the_prototype_chain() {
        let mut i = interp();
        let proto = i.new_object();
        let name = i.intern_str("shared");
        i.put(proto, name, Value::Bool(true), Attr::empty()).unwrap();
        let child = i.heap.alloc(crate::object::Object::new(Class::Object, Some(proto)));
        assert!(matches!(i.get(child, name).unwrap(), Value::Bool(true)));
        assert!(i.has_property(child, name));
        // but delete only touches own properties
        assert!(i.delete(child, name));
        assert!(i.has_property(child, name));
    }

    #[test]
    fn readonly_on_prototype_blocks_shadowing_put() {
        let mut i = interp();
        let proto = i.new_object();
        let name = i.intern_str("frozen");
        {
            let obj = i.heap.get_mut(proto);
            obj.define(name, Value::Number(1.0), Attr::READ_ONLY);
        }
        let child = i.heap.alloc(crate::object::Object::new(Class::Object, Some(proto)));
        assert!(!i.can_put(child, name));
        i.put(child, name, Value::Number(2.0), Attr::empty()).unwrap();
        assert!(!i.heap.get(child).has_own(name), "write was silently dropped");
    }

    #[test]
    fn dont_delete_protects_properties() {
        let mut i = interp();
        let o = i.new_object();
        let name = i.intern_str("pinned");
        {
            let obj = i.heap.get_mut(o);
            obj.define(name, Value::Null, Attr::DONT_DELETE);
        }
        assert!(!i.delete(o, name));
        assert!(i.has_property(o, name));
    }

    #[test]
    fn array_length_grows_and_truncates() {
        let mut i = interp();
        let a = i.new_array();
        let idx5 = i.interner.intern_str("5");
        i.put(a, idx5, Value::Bool(true), Attr::empty()).unwrap();
        let len_key: StringId = WellKnown::Length.into();
        assert!(matches!(i.get(a, len_key).unwrap(), Value::Number(n) if n == 6.0));

        i.put(a, len_key, Value::Number(2.0), Attr::empty()).unwrap();
        assert!(!i.has_property(a, idx5), "truncation removed the element");
        assert!(matches!(i.get(a, len_key).unwrap(), Value::Number(n) if n == 2.0));
    }

    #[test]
    fn array_index_parsing() {
        assert_eq!(array_index(&JsString::from_str_slice("0")), Some(0));
        assert_eq!(array_index(&JsString::from_str_slice("42")), Some(42));
        assert_eq!(array_index(&JsString::from_str_slice("007")), None);
        assert_eq!(array_index(&JsString::from_str_slice("-1")), None);
        assert_eq!(array_index(&JsString::from_str_slice("4294967295")), None);
    }

    #[test]
    fn scope_lookup_front_to_back() {
        let mut i = interp();
        let inner = i.new_object();
        let name = i.intern_str("x");
        i.put(inner, name, Value::Number(1.0), Attr::empty()).unwrap();
        i.put(i.global, name, Value::Number(2.0), Attr::empty()).unwrap();
        let chain = ScopeChain::root(i.global).push(inner);
        let r = i.scope_lookup(&chain, name);
        assert_eq!(r.base, Some(inner), "front of chain shadows Global");

        let missing = i.intern_str("missing");
        let r = i.scope_lookup(&chain, missing);
        assert!(r.base.is_none());
    }
}
