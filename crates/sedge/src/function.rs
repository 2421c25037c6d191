//! Function objects and call semantics (§10, §13).
//!
//! Evaluating a function expression or declaration creates a Function
//! object that captures the scope chain *at creation time*. Calling one
//! builds an activation object, binds formals and `arguments`, splices the
//! activation onto the captured chain, instantiates hoisted declarations
//! and `var` names, and then runs the body through whichever engine the
//! interpreter is configured with.

use std::rc::Rc;

use crate::{
    ast::{Ast, FunctionId},
    error::RunResult,
    eval::{Completion, CompletionKind},
    heap::ObjectId,
    intern::WellKnown,
    interp::{ExecMode, Interp},
    object::{ArgumentsData, Attr, Class, FunctionData, Object, ObjectData},
    scope::{Context, ScopeChain},
    value::Value,
};

/// Whether a body runs as a function call or as program/eval code; the
/// two differ in how completion values surface (§13.2.1 vs §14).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    Function,
    Program,
}

impl Interp {
    /// Creates a Function object over a descriptor and a captured scope
    /// chain (§13.2), wiring up `length`, `prototype` and
    /// `prototype.constructor`.
    pub(crate) fn instantiate_function(&mut self, ast: &Rc<Ast>, def: FunctionId, scope: &ScopeChain) -> ObjectId {
        let func_proto = self.protos.function;
        let nparams = ast.function(def).params.len();
        let data = ObjectData::Function(FunctionData {
            ast: Rc::clone(ast),
            def,
            scope: scope.clone(),
        });
        let id = self.heap.alloc(Object::with_data(Class::Function, Some(func_proto), data));

        self.heap.get_mut(id).define(
            WellKnown::Length.into(),
            Value::Number(nparams as f64),
            Attr::READ_ONLY | Attr::DONT_ENUM | Attr::DONT_DELETE,
        );

        // every function gets a fresh prototype object whose `constructor`
        // points back (§13.2 steps 9-11)
        let proto = self.new_object();
        self.heap
            .get_mut(proto)
            .define(WellKnown::Constructor.into(), Value::Object(id), Attr::DONT_ENUM);
        self.heap
            .get_mut(id)
            .define(WellKnown::Prototype.into(), Value::Object(proto), Attr::DONT_DELETE);
        id
    }

    /// Evaluates a named function expression (§13: `function fact(n) {…}`
    /// in expression position): the name is bound read-only in a one-entry
    /// scope object spliced in front of the captured chain, so the body can
    /// recurse by name without leaking the binding outward.
    pub(crate) fn instantiate_named_expression(
        &mut self,
        ast: &Rc<Ast>,
        def: FunctionId,
        scope: &ScopeChain,
    ) -> ObjectId {
        let Some(name) = ast.function(def).name else {
            return self.instantiate_function(ast, def, scope);
        };
        let binding = self.new_object();
        let inner = scope.push(binding);
        let func = self.instantiate_function(ast, def, &inner);
        self.heap
            .get_mut(binding)
            .define(name, Value::Object(func), Attr::READ_ONLY | Attr::DONT_DELETE);
        func
    }

    /// [[Call]] of a script function (§13.2.1 / §10.1.6 / §10.1.8).
    pub(crate) fn call_function(&mut self, callee: ObjectId, this: ObjectId, args: &[Value]) -> RunResult<Value> {
        let (ast, def, captured) = {
            let data = self.heap.get(callee).as_function().expect("script function payload");
            (Rc::clone(&data.ast), data.def, data.scope.clone())
        };

        // activation object: formals first, missing ones undefined
        let activation = self.heap.alloc(Object::new(Class::Activation, None));
        {
            let params: Vec<_> = ast.function(def).params.clone();
            let obj = self.heap.get_mut(activation);
            for (i, &param) in params.iter().enumerate() {
                let value = args.get(i).cloned().unwrap_or(Value::Undefined);
                obj.define(param, value, Attr::DONT_DELETE);
            }
        }

        // the arguments object joins indices below the formal count to the
        // activation's bindings; extras become plain own properties
        let arguments = self.make_arguments(&ast, def, callee, activation, args);
        self.heap.get_mut(activation).define(
            WellKnown::Arguments.into(),
            Value::Object(arguments),
            Attr::DONT_DELETE,
        );

        let ctx = Context {
            this,
            scope: captured.push(activation),
            variable: activation,
            var_attrs: Attr::DONT_DELETE,
        };

        let completion = self.run_body(&ast, def, &ctx, Attr::DONT_DELETE, BodyKind::Function)?;
        // §13.2.1: only an explicit `return` produces a call value
        Ok(match completion.kind {
            CompletionKind::Return => completion.value.unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        })
    }

    fn make_arguments(
        &mut self,
        ast: &Rc<Ast>,
        def: FunctionId,
        callee: ObjectId,
        activation: ObjectId,
        args: &[Value],
    ) -> ObjectId {
        let params = &ast.function(def).params;
        let mapped = args.len().min(params.len());
        let formals: Vec<_> = (0..args.len())
            .map(|i| (i < mapped).then(|| params[i]))
            .collect();

        let proto = self.protos.object;
        // [[Class]] of the arguments object is "Object" (§10.1.8)
        let id = self.heap.alloc(Object::with_data(
            Class::Object,
            Some(proto),
            ObjectData::Arguments(ArgumentsData { activation, formals }),
        ));

        let mut extra_names = Vec::new();
        for i in mapped..args.len() {
            extra_names.push((self.interner.intern_index(i as u32), args[i].clone()));
        }
        let length_val = Value::Number(args.len() as f64);
        let obj = self.heap.get_mut(id);
        obj.define(WellKnown::Length.into(), length_val, Attr::DONT_ENUM);
        obj.define(WellKnown::Callee.into(), Value::Object(callee), Attr::DONT_ENUM);
        for (name, value) in extra_names {
            self.heap.get_mut(id).define(name, value, Attr::DONT_ENUM);
        }
        id
    }

    /// Declaration binding and body execution shared by function calls,
    /// program code, and eval code (§10.1.3). Returns the body's raw
    /// completion; callers decide what a Return or a chained statement
    /// value means in their context.
    pub(crate) fn run_body(
        &mut self,
        ast: &Rc<Ast>,
        def: FunctionId,
        ctx: &Context,
        var_attrs: Attr,
        kind: BodyKind,
    ) -> RunResult<Completion> {
        // hoisted function declarations first; they win over plain vars of
        // the same name
        let fdecls: Vec<FunctionId> = ast.function(def).fdecls.clone();
        for fid in fdecls {
            let func = self.instantiate_function(ast, fid, &ctx.scope);
            let name = ast.function(fid).name.expect("declarations are named");
            self.heap.get_mut(ctx.variable).define(name, Value::Object(func), var_attrs);
        }

        // var-declared names initialize to undefined unless already present
        let vars: Vec<_> = ast.function(def).vars.clone();
        for name in vars {
            if !self.heap.get(ctx.variable).has_own(name) {
                self.heap.get_mut(ctx.variable).define(name, Value::Undefined, var_attrs);
            }
        }

        match self.mode {
            ExecMode::TreeWalk => {
                let body: Vec<_> = ast.function(def).body.clone();
                self.eval_statements(ast, ctx, &body)
            }
            ExecMode::Bytecode => self.vm_run_function(ast, def, ctx, kind == BodyKind::Program),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::compat::Compat;

    #[test]
    fn function_objects_carry_length_and_prototype() {
        let mut i = Interp::new(Compat::default());
        let program = i
            .parse_program(&mut crate::input::StringInput::new("function f(a, b) { return a; }"))
            .unwrap();
        i.run_program(&program).unwrap();

        let name = i.intern_str("f");
        let Value::Object(f) = i.get(i.global, name).unwrap() else {
            panic!("f must be installed on Global");
        };
        let len = i.get(f, WellKnown::Length.into()).unwrap();
        assert!(matches!(len, Value::Number(n) if n == 2.0));

        let Value::Object(proto) = i.get(f, WellKnown::Prototype.into()).unwrap() else {
            panic!("prototype object expected");
        };
        let ctor = i.get(proto, WellKnown::Constructor.into()).unwrap();
        assert!(matches!(ctor, Value::Object(id) if id == f));
    }

    #[test]
    fn arguments_join_formal_parameters() {
        let mut i = Interp::new(Compat::default());
        let v = i
            .global_eval("function f(a) { arguments[0] = 9; return a; } f(1);")
            .unwrap();
        assert!(matches!(v, Value::Number(n) if n == 9.0));

        let v = i
            .global_eval("function g(a) { a = 7; return arguments[0]; } g(1);")
            .unwrap();
        assert!(matches!(v, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn extra_arguments_live_on_the_arguments_object() {
        let mut i = Interp::new(Compat::default());
        let v = i
            .global_eval("function f(a) { return arguments.length * 10 + arguments[2]; } f(1, 2, 3);")
            .unwrap();
        assert!(matches!(v, Value::Number(n) if n == 33.0));
    }

    #[test]
    fn named_function_expression_sees_its_own_name() {
        let mut i = Interp::new(Compat::default());
        let v = i
            .global_eval("var f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }; f(5);")
            .unwrap();
        assert!(matches!(v, Value::Number(n) if n == 120.0));
        // the name must not leak into the enclosing scope
        let v = i.global_eval("typeof fact;").unwrap();
        let Value::Str(s) = v else { panic!("typeof returns a string") };
        assert_eq!(s.to_utf8().unwrap(), "undefined");
    }
}
