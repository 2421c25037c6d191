//! The tree-walking evaluator: runtime semantics of §11–§14.
//!
//! Expression evaluators produce an [`Operand`] — a plain value or a
//! Reference — and never a completion; statement evaluators produce a
//! [`Completion`] and never a Reference. Throws travel on the `Err`
//! channel. These three channels together are the whole control-flow
//! story: there is no hidden state to unwind, so `with` scopes, catch
//! scopes and enumerators release on every exit path by construction.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    ast::{Ast, BinaryOp, ForInLeft, LogicalOp, NodeId, NodeKind, UnaryOp, UpdateOp},
    enumerate::Enumerator,
    error::{CodeLoc, ErrorKind, RunResult},
    interp::Interp,
    object::{Attr, Class},
    scope::Context,
    string::JsString,
    value::{self, Reference, Value},
};

/// The result of evaluating an expression: a value, or a reference that
/// GetValue/PutValue, `delete` and `typeof` consume.
#[derive(Debug, Clone)]
pub(crate) enum Operand {
    Val(Value),
    Ref(Reference),
}

/// How a statement finished (§8.9 minus Throw, which is the `Err` side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompletionKind {
    Normal,
    Break(NodeId),
    Continue(NodeId),
    Return,
}

/// A statement completion: the kind plus the §12 chained value.
#[derive(Debug, Clone)]
pub(crate) struct Completion {
    pub kind: CompletionKind,
    pub value: Option<Value>,
}

impl Completion {
    pub(crate) fn normal() -> Self {
        Self {
            kind: CompletionKind::Normal,
            value: None,
        }
    }

    pub(crate) fn normal_with(value: Value) -> Self {
        Self {
            kind: CompletionKind::Normal,
            value: Some(value),
        }
    }

    fn is_normal(&self) -> bool {
        self.kind == CompletionKind::Normal
    }
}

/// How one loop-body iteration affects its loop.
enum LoopFlow {
    /// Keep iterating (normal completion, or continue targeting this loop).
    Next,
    /// Leave the loop normally (break targeting this loop).
    Done,
    /// An outward completion (return, or a jump to an outer statement).
    Out(Completion),
}

impl Interp {
    /// GetValue over an operand.
    pub(crate) fn operand_value(&mut self, operand: &Operand) -> RunResult<Value> {
        match operand {
            Operand::Val(v) => Ok(v.clone()),
            Operand::Ref(r) => self.reference_get(r),
        }
    }

    /// PutValue over an operand; writing through a non-reference is a
    /// ReferenceError (§8.7.2).
    pub(crate) fn operand_put(&mut self, operand: &Operand, value: Value) -> RunResult<()> {
        match operand {
            Operand::Ref(r) => self.reference_put(r, value),
            Operand::Val(_) => Err(self.reference_error("invalid assignment target")),
        }
    }

    /// Statement-list evaluation with §12.1 completion-value chaining: an
    /// abrupt completion with no value of its own inherits the last value
    /// produced by an earlier statement.
    pub(crate) fn eval_statements(&mut self, ast: &Rc<Ast>, ctx: &Context, list: &[NodeId]) -> RunResult<Completion> {
        let mut chained: Option<Value> = None;
        for &stmt in list {
            let mut c = self.eval_stmt(ast, ctx, stmt)?;
            if c.value.is_none() {
                c.value = chained.clone();
            } else {
                chained = c.value.clone();
            }
            if !c.is_normal() {
                return Ok(c);
            }
        }
        Ok(Completion {
            kind: CompletionKind::Normal,
            value: chained,
        })
    }

    pub(crate) fn eval_stmt(&mut self, ast: &Rc<Ast>, ctx: &Context, id: NodeId) -> RunResult<Completion> {
        let loc = CodeLoc { line: ast.line(id) };
        self.current_loc = loc;
        if !self.tracer.on_statement(loc) {
            return Err(self.throw_error(ErrorKind::RangeError, "script execution aborted by trace hook"));
        }

        match ast.kind(id).clone() {
            NodeKind::Block(stmts) => self.eval_statements(ast, ctx, &stmts),
            NodeKind::Empty | NodeKind::FunctionDecl(_) => Ok(Completion::normal()),
            NodeKind::ExprStmt(expr) => {
                let v = self.eval_value(ast, ctx, expr)?;
                Ok(Completion::normal_with(v))
            }
            NodeKind::VarStmt(decls) => {
                // the names were bound at entry; only initializers run here
                for decl in &decls {
                    if let Some(init) = decl.init {
                        let value = self.eval_value(ast, ctx, init)?;
                        let r = self.scope_lookup(&ctx.scope, decl.name);
                        self.reference_put(&r, value)?;
                    }
                }
                Ok(Completion::normal())
            }
            NodeKind::If { test, cons, alt } => {
                let t = self.eval_value(ast, ctx, test)?;
                if t.to_boolean() {
                    self.eval_stmt(ast, ctx, cons)
                } else if let Some(alt) = alt {
                    self.eval_stmt(ast, ctx, alt)
                } else {
                    Ok(Completion::normal())
                }
            }
            NodeKind::DoWhile { body, test } => self.eval_do_while(ast, ctx, id, body, test),
            NodeKind::While { test, body } => self.eval_while(ast, ctx, id, test, body),
            NodeKind::For { init, test, step, body } => self.eval_for(ast, ctx, id, init, test, step, body),
            NodeKind::ForIn { left, object, body } => self.eval_for_in(ast, ctx, id, &left, object, body),
            NodeKind::Continue { target, .. } => Ok(Completion {
                kind: CompletionKind::Continue(target),
                value: None,
            }),
            NodeKind::Break { target, .. } => Ok(Completion {
                kind: CompletionKind::Break(target),
                value: None,
            }),
            NodeKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_value(ast, ctx, expr)?,
                    None => Value::Undefined,
                };
                Ok(Completion {
                    kind: CompletionKind::Return,
                    value: Some(value),
                })
            }
            NodeKind::With { object, body } => {
                let v = self.eval_value(ast, ctx, object)?;
                let obj = self.to_object(&v)?;
                let inner = ctx.with_scope_front(obj);
                // the pushed scope dies with `inner` on every exit path
                self.eval_stmt(ast, &inner, body)
            }
            NodeKind::Switch { disc, cases } => self.eval_switch(ast, ctx, id, disc, &cases),
            NodeKind::Labelled { body, .. } => {
                let c = self.eval_stmt(ast, ctx, body)?;
                if c.kind == CompletionKind::Break(id) {
                    return Ok(Completion {
                        kind: CompletionKind::Normal,
                        value: c.value,
                    });
                }
                Ok(c)
            }
            NodeKind::Throw(expr) => {
                let value = self.eval_value(ast, ctx, expr)?;
                Err(self.throw_value(value))
            }
            NodeKind::Try { block, catch, finally } => {
                let tried = self.eval_try_block(ast, ctx, block, catch.as_ref());
                let Some(finally) = finally else {
                    return tried;
                };
                let f = self.eval_stmt(ast, ctx, finally)?;
                if !f.is_normal() {
                    // a non-normal finally supersedes everything, including
                    // an exception from the try block
                    return Ok(f);
                }
                tried
            }
            _ => {
                // an expression node in statement position is a parser bug
                unreachable!("statement evaluator reached expression node {:?}", ast.kind(id))
            }
        }
    }

    /// The try block plus optional catch clause, without finally handling.
    fn eval_try_block(
        &mut self,
        ast: &Rc<Ast>,
        ctx: &Context,
        block: NodeId,
        catch: Option<&crate::ast::CatchClause>,
    ) -> RunResult<Completion> {
        match self.eval_stmt(ast, ctx, block) {
            Ok(c) => Ok(c),
            Err(err) => {
                let Some(clause) = catch else {
                    return Err(err);
                };
                // §12.14: the caught value is bound DontDelete in a fresh
                // one-entry scope object pushed for the handler's duration
                let binding = self.new_object();
                self.heap.get_mut(binding).define(clause.name, err.value, Attr::DONT_DELETE);
                let inner = ctx.with_scope_front(binding);
                self.eval_stmt(ast, &inner, clause.body)
            }
        }
    }

    fn eval_while(&mut self, ast: &Rc<Ast>, ctx: &Context, me: NodeId, test: NodeId, body: NodeId) -> RunResult<Completion> {
        let mut chained: Option<Value> = None;
        loop {
            let t = self.eval_value(ast, ctx, test)?;
            if !t.to_boolean() {
                break;
            }
            match self.loop_body(ast, ctx, me, body, &mut chained)? {
                LoopFlow::Next => {}
                LoopFlow::Done => break,
                LoopFlow::Out(c) => return Ok(c),
            }
        }
        Ok(Completion {
            kind: CompletionKind::Normal,
            value: chained,
        })
    }

    fn eval_do_while(&mut self, ast: &Rc<Ast>, ctx: &Context, me: NodeId, body: NodeId, test: NodeId) -> RunResult<Completion> {
        let mut chained: Option<Value> = None;
        loop {
            match self.loop_body(ast, ctx, me, body, &mut chained)? {
                LoopFlow::Next => {}
                LoopFlow::Done => break,
                LoopFlow::Out(c) => return Ok(c),
            }
            let t = self.eval_value(ast, ctx, test)?;
            if !t.to_boolean() {
                break;
            }
        }
        Ok(Completion {
            kind: CompletionKind::Normal,
            value: chained,
        })
    }

    #[expect(clippy::too_many_arguments, reason = "the grammar has four moving parts")]
    fn eval_for(
        &mut self,
        ast: &Rc<Ast>,
        ctx: &Context,
        me: NodeId,
        init: Option<NodeId>,
        test: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) -> RunResult<Completion> {
        if let Some(init) = init {
            // the init slot holds a var or expression *statement*; its
            // value does not join the chain (§12.6.3)
            self.eval_stmt(ast, ctx, init)?;
        }
        let mut chained: Option<Value> = None;
        loop {
            if let Some(test) = test {
                let t = self.eval_value(ast, ctx, test)?;
                if !t.to_boolean() {
                    break;
                }
            }
            match self.loop_body(ast, ctx, me, body, &mut chained)? {
                LoopFlow::Next => {}
                LoopFlow::Done => break,
                LoopFlow::Out(c) => return Ok(c),
            }
            if let Some(step) = step {
                self.eval_value(ast, ctx, step)?;
            }
        }
        Ok(Completion {
            kind: CompletionKind::Normal,
            value: chained,
        })
    }

    fn eval_for_in(
        &mut self,
        ast: &Rc<Ast>,
        ctx: &Context,
        me: NodeId,
        left: &ForInLeft,
        object: NodeId,
        body: NodeId,
    ) -> RunResult<Completion> {
        // a var form's initializer runs once, before the list expression
        if let ForInLeft::Var { name, init: Some(init) } = left {
            let value = self.eval_value(ast, ctx, *init)?;
            let r = self.scope_lookup(&ctx.scope, *name);
            self.reference_put(&r, value)?;
        }

        let list = self.eval_value(ast, ctx, object)?;
        let obj = self.to_object(&list)?;
        let mut enumerator = Enumerator::new(&self.heap, obj);

        let mut chained: Option<Value> = None;
        while let Some(name) = self.enum_next(&mut enumerator) {
            let key = Value::Str(self.interner.get(name).clone());
            match left {
                ForInLeft::Expr(lhs) => {
                    // the LHS reference is re-evaluated on every iteration
                    let r = self.eval_expr(ast, ctx, *lhs)?;
                    self.operand_put(&r, key)?;
                }
                ForInLeft::Var { name: var_name, .. } => {
                    let r = self.scope_lookup(&ctx.scope, *var_name);
                    self.reference_put(&r, key)?;
                }
            }
            match self.loop_body(ast, ctx, me, body, &mut chained)? {
                LoopFlow::Next => {}
                LoopFlow::Done => break,
                LoopFlow::Out(c) => return Ok(c),
            }
        }
        Ok(Completion {
            kind: CompletionKind::Normal,
            value: chained,
        })
    }

    /// Runs one loop-body iteration and classifies its completion against
    /// the loop's own node id.
    fn loop_body(
        &mut self,
        ast: &Rc<Ast>,
        ctx: &Context,
        me: NodeId,
        body: NodeId,
        chained: &mut Option<Value>,
    ) -> RunResult<LoopFlow> {
        let c = self.eval_stmt(ast, ctx, body)?;
        if c.value.is_some() {
            *chained = c.value.clone();
        }
        Ok(match c.kind {
            CompletionKind::Normal => LoopFlow::Next,
            CompletionKind::Continue(target) if target == me => LoopFlow::Next,
            CompletionKind::Break(target) if target == me => LoopFlow::Done,
            _ => LoopFlow::Out(c),
        })
    }

    fn eval_switch(
        &mut self,
        ast: &Rc<Ast>,
        ctx: &Context,
        me: NodeId,
        disc: NodeId,
        cases: &[crate::ast::SwitchCase],
    ) -> RunResult<Completion> {
        let d = self.eval_value(ast, ctx, disc)?;

        // find the matching clause: tests in source order, default last
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = case.test {
                let t = self.eval_value(ast, ctx, test)?;
                if self.strict_equals(&d, &t) {
                    start = Some(i);
                    break;
                }
            }
        }
        if start.is_none() {
            start = cases.iter().position(|c| c.test.is_none());
        }
        let Some(start) = start else {
            return Ok(Completion::normal());
        };

        // fall through from the matched clause
        let mut chained: Option<Value> = None;
        for case in &cases[start..] {
            for &stmt in &case.body {
                let mut c = self.eval_stmt(ast, ctx, stmt)?;
                if c.value.is_none() {
                    c.value = chained.clone();
                } else {
                    chained = c.value.clone();
                }
                if c.kind == CompletionKind::Break(me) {
                    return Ok(Completion {
                        kind: CompletionKind::Normal,
                        value: c.value,
                    });
                }
                if !c.is_normal() {
                    return Ok(c);
                }
            }
        }
        Ok(Completion {
            kind: CompletionKind::Normal,
            value: chained,
        })
    }

    // ----- expressions -----

    pub(crate) fn eval_value(&mut self, ast: &Rc<Ast>, ctx: &Context, id: NodeId) -> RunResult<Value> {
        let operand = self.eval_expr(ast, ctx, id)?;
        self.operand_value(&operand)
    }

    pub(crate) fn eval_expr(&mut self, ast: &Rc<Ast>, ctx: &Context, id: NodeId) -> RunResult<Operand> {
        Ok(match ast.kind(id).clone() {
            NodeKind::This => Operand::Val(Value::Object(ctx.this)),
            NodeKind::Ident(name) => Operand::Ref(self.scope_lookup(&ctx.scope, name)),
            NodeKind::Number(n) => Operand::Val(Value::Number(n)),
            NodeKind::StrLit(s) => Operand::Val(Value::Str(s)),
            NodeKind::NullLit => Operand::Val(Value::Null),
            NodeKind::BoolLit(b) => Operand::Val(Value::Bool(b)),
            NodeKind::Regex { body, flags } => Operand::Val(Value::Object(self.new_regex(&body, &flags))),
            NodeKind::ArrayLit(elements) => {
                let array = self.new_array();
                for (i, element) in elements.iter().enumerate() {
                    if let Some(e) = element {
                        let v = self.eval_value(ast, ctx, *e)?;
                        let name = self.interner.intern_index(i as u32);
                        self.put(array, name, v, Attr::empty())?;
                    }
                }
                // trailing elisions still extend the length
                let len_name = crate::intern::WellKnown::Length.into();
                self.put(array, len_name, Value::Number(elements.len() as f64), Attr::empty())?;
                Operand::Val(Value::Object(array))
            }
            NodeKind::ObjectLit(props) => {
                let object = self.new_object();
                // keys are inserted left-to-right; insertion order is
                // enumeration order
                for (name, expr) in props {
                    let v = self.eval_value(ast, ctx, expr)?;
                    self.put(object, name, v, Attr::empty())?;
                }
                Operand::Val(Value::Object(object))
            }
            NodeKind::FunctionExpr(def) => {
                Operand::Val(Value::Object(self.instantiate_named_expression(ast, def, &ctx.scope)))
            }
            NodeKind::Member { object, name } => {
                let base = self.eval_value(ast, ctx, object)?;
                let base = self.to_object(&base)?;
                Operand::Ref(Reference {
                    base: Some(base),
                    property: name,
                })
            }
            NodeKind::Index { object, index } => {
                let base = self.eval_value(ast, ctx, object)?;
                let key = self.eval_value(ast, ctx, index)?;
                let base = self.to_object(&base)?;
                let key = self.to_string_value(&key)?;
                let property = self.interner.intern(&key);
                Operand::Ref(Reference {
                    base: Some(base),
                    property,
                })
            }
            NodeKind::New { callee, args } => {
                let f = self.eval_value(ast, ctx, callee)?;
                let argv = self.eval_arguments(ast, ctx, &args)?;
                let Value::Object(f) = f else {
                    return Err(self.type_error("new target is not a constructor"));
                };
                Operand::Val(self.construct(f, &argv)?)
            }
            NodeKind::Call { callee, args } => {
                let target = self.eval_expr(ast, ctx, callee)?;
                let f = self.operand_value(&target)?;
                let argv = self.eval_arguments(ast, ctx, &args)?;

                // the this-value comes from the reference base, except that
                // activation bases are erased (§10.1.6)
                let this = match &target {
                    Operand::Ref(Reference { base: Some(base), .. })
                        if self.heap.get(*base).class != Class::Activation =>
                    {
                        *base
                    }
                    _ => self.global,
                };

                let Value::Object(f) = f else {
                    let shown = value::describe_primitive(&f);
                    return Err(self.type_error(&format!("{shown} is not a function")));
                };
                if f == self.eval_fn {
                    // the distinguished Global.eval runs in the caller's
                    // context (§15.1.2.1 direct-eval routing)
                    return Ok(Operand::Val(self.direct_eval(ctx, argv.first())?));
                }
                Operand::Val(self.call(f, this, &argv)?)
            }
            NodeKind::Postfix { op, expr } => {
                let r = self.eval_expr(ast, ctx, expr)?;
                let old = self.operand_value(&r)?;
                let old = self.to_number(&old)?;
                let delta = if op == UpdateOp::Inc { 1.0 } else { -1.0 };
                self.operand_put(&r, Value::Number(old + delta))?;
                Operand::Val(Value::Number(old))
            }
            NodeKind::Unary { op, expr } => self.eval_unary(ast, ctx, op, expr)?,
            NodeKind::Binary { op, left, right } => {
                let l = self.eval_value(ast, ctx, left)?;
                let r = self.eval_value(ast, ctx, right)?;
                Operand::Val(self.binary_op(op, &l, &r)?)
            }
            NodeKind::Logical { op, left, right } => {
                let l = self.eval_value(ast, ctx, left)?;
                let short = match op {
                    LogicalOp::And => !l.to_boolean(),
                    LogicalOp::Or => l.to_boolean(),
                };
                if short {
                    Operand::Val(l)
                } else {
                    Operand::Val(self.eval_value(ast, ctx, right)?)
                }
            }
            NodeKind::Cond { test, cons, alt } => {
                let t = self.eval_value(ast, ctx, test)?;
                let branch = if t.to_boolean() { cons } else { alt };
                Operand::Val(self.eval_value(ast, ctx, branch)?)
            }
            NodeKind::Assign { target, op, value } => {
                let r = self.eval_expr(ast, ctx, target)?;
                let result = match op {
                    None => self.eval_value(ast, ctx, value)?,
                    Some(op) => {
                        // compound: GetValue the target before the RHS runs
                        let old = self.operand_value(&r)?;
                        let rhs = self.eval_value(ast, ctx, value)?;
                        self.binary_op(op, &old, &rhs)?
                    }
                };
                self.operand_put(&r, result.clone())?;
                Operand::Val(result)
            }
            NodeKind::Comma { left, right } => {
                self.eval_value(ast, ctx, left)?;
                Operand::Val(self.eval_value(ast, ctx, right)?)
            }
            other => unreachable!("expression evaluator reached statement node {other:?}"),
        })
    }

    fn eval_arguments(&mut self, ast: &Rc<Ast>, ctx: &Context, args: &[NodeId]) -> RunResult<Vec<Value>> {
        let mut argv: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len());
        for &arg in args {
            argv.push(self.eval_value(ast, ctx, arg)?);
        }
        Ok(argv.into_vec())
    }

    fn eval_unary(&mut self, ast: &Rc<Ast>, ctx: &Context, op: UnaryOp, expr: NodeId) -> RunResult<Operand> {
        Ok(Operand::Val(match op {
            UnaryOp::Delete => {
                let r = self.eval_expr(ast, ctx, expr)?;
                match r {
                    Operand::Ref(Reference {
                        base: Some(base),
                        property,
                    }) => Value::Bool(self.delete(base, property)),
                    // unresolved references and plain values delete to true
                    _ => Value::Bool(true),
                }
            }
            UnaryOp::Void => {
                self.eval_value(ast, ctx, expr)?;
                Value::Undefined
            }
            UnaryOp::TypeOf => {
                let r = self.eval_expr(ast, ctx, expr)?;
                let name = match &r {
                    // typeof tolerates unresolved names instead of throwing
                    Operand::Ref(Reference { base: None, .. }) => "undefined",
                    _ => {
                        let v = self.operand_value(&r)?;
                        self.type_of(&v)
                    }
                };
                Value::Str(JsString::from_str_slice(name))
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let r = self.eval_expr(ast, ctx, expr)?;
                let old = self.operand_value(&r)?;
                let old = self.to_number(&old)?;
                let delta = if op == UnaryOp::PreInc { 1.0 } else { -1.0 };
                let new = Value::Number(old + delta);
                self.operand_put(&r, new.clone())?;
                new
            }
            UnaryOp::Plus => {
                let v = self.eval_value(ast, ctx, expr)?;
                Value::Number(self.to_number(&v)?)
            }
            UnaryOp::Minus => {
                let v = self.eval_value(ast, ctx, expr)?;
                Value::Number(-self.to_number(&v)?)
            }
            UnaryOp::BitNot => {
                let v = self.eval_value(ast, ctx, expr)?;
                Value::Number(f64::from(!self.to_int32(&v)?))
            }
            UnaryOp::Not => {
                let v = self.eval_value(ast, ctx, expr)?;
                Value::Bool(!v.to_boolean())
            }
        }))
    }

    /// Shared §11.5–§11.10 binary operator semantics, used by the
    /// tree-walker, compound assignment, and the bytecode VM.
    pub(crate) fn binary_op(&mut self, op: BinaryOp, l: &Value, r: &Value) -> RunResult<Value> {
        use BinaryOp as B;
        Ok(match op {
            B::Mul => Value::Number(self.to_number(l)? * self.to_number(r)?),
            B::Div => Value::Number(self.to_number(l)? / self.to_number(r)?),
            B::Mod => Value::Number(crate::ast::ecma_rem(self.to_number(l)?, self.to_number(r)?)),
            B::Sub => Value::Number(self.to_number(l)? - self.to_number(r)?),
            B::Add => self.add_values(l, r)?,
            B::Shl => {
                let x = self.to_int32(l)?;
                let n = self.to_uint32(r)? & 31;
                Value::Number(f64::from(x << n))
            }
            B::Shr => {
                let x = self.to_int32(l)?;
                let n = self.to_uint32(r)? & 31;
                Value::Number(f64::from(x >> n))
            }
            B::Ushr => {
                let x = self.to_uint32(l)?;
                let n = self.to_uint32(r)? & 31;
                Value::Number(f64::from(x >> n))
            }
            B::Lt => Value::Bool(self.less_than(l, r)?.unwrap_or(false)),
            B::Gt => Value::Bool(self.less_than(r, l)?.unwrap_or(false)),
            B::Le => Value::Bool(!self.less_than(r, l)?.unwrap_or(true)),
            B::Ge => Value::Bool(!self.less_than(l, r)?.unwrap_or(true)),
            B::In => {
                let Value::Object(obj) = r else {
                    return Err(self.type_error("'in' right operand is not an object"));
                };
                let name = self.to_string_value(l)?;
                let name = self.interner.intern(&name);
                Value::Bool(self.has_property(*obj, name))
            }
            B::InstanceOf => {
                let Value::Object(f) = r else {
                    return Err(self.type_error("instanceof right operand is not an object"));
                };
                Value::Bool(self.has_instance(*f, l)?)
            }
            B::Eq => Value::Bool(self.loose_equals(l, r)?),
            B::Ne => Value::Bool(!self.loose_equals(l, r)?),
            B::StrictEq => Value::Bool(self.strict_equals(l, r)),
            B::StrictNe => Value::Bool(!self.strict_equals(l, r)),
            B::BitAnd => Value::Number(f64::from(self.to_int32(l)? & self.to_int32(r)?)),
            B::BitXor => Value::Number(f64::from(self.to_int32(l)? ^ self.to_int32(r)?)),
            B::BitOr => Value::Number(f64::from(self.to_int32(l)? | self.to_int32(r)?)),
        })
    }

    /// Direct eval (§15.1.2.1): a string argument parses as a program and
    /// runs in the *caller's* context; eval-declared variables are
    /// deletable (empty var-attrs, §10.2.2).
    pub(crate) fn direct_eval(&mut self, ctx: &Context, arg: Option<&Value>) -> RunResult<Value> {
        let Some(arg) = arg else {
            return Ok(Value::Undefined);
        };
        let Value::Str(source) = arg else {
            return Ok(arg.clone());
        };
        let text = source
            .to_utf8()
            .map_err(|_| self.throw_error(ErrorKind::SyntaxError, "eval source is not valid UTF-16"))?;
        let mut input = crate::input::StringInput::new(&text);
        let program = match crate::parser::parse_program(&mut input, &mut self.interner, self.compat) {
            Ok((ast, body)) => (Rc::new(ast), body),
            Err(e) => return Err(self.parse_error_value(&e)),
        };
        let mut eval_ctx = ctx.clone();
        eval_ctx.var_attrs = Attr::empty();
        let completion = self.run_body(
            &program.0,
            program.1,
            &eval_ctx,
            Attr::empty(),
            crate::function::BodyKind::Program,
        )?;
        Ok(completion.value.unwrap_or(Value::Undefined))
    }
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

    fn eval_num(src: &str) -> f64 {
        match eval(src) {
            Value::Number(n) => n,
            other => panic!("expected number from {src}, got {other:?}"),
        }
    }

    fn eval_str(src: &str) -> String {
        match eval(src) {
            Value::Str(s) => s.to_utf8().unwrap(),
            other => panic!("expected string from {src}, got {other:?}"),
        }
    }

    fn eval_bool(src: &str) -> bool {
        match eval(src) {
            Value::Bool(b) => b,
            other => panic!("expected boolean from {src}, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_and_completion_value() {
        assert_eq!(eval_num("var a = 1, b = 2; a + b"), 3.0);
    }

    #[test]
    fn add_associativity_decides_concatenation() {
        assert_eq!(eval_str("'a' + 1 + 2"), "a12");
        assert_eq!(eval_str("1 + 2 + 'a'"), "3a");
    }

    #[test]
    fn typeof_undeclared_vs_read() {
        assert_eq!(eval_str("typeof undeclared"), "undefined");
        let mut i = Interp::new(Compat::default());
        let err = i.global_eval("undeclared").unwrap_err();
        assert!(err.message.contains("ReferenceError"), "got: {}", err.message);
    }

    #[test]
    fn equality_scenarios() {
        assert!(!eval_bool("NaN == NaN"));
        assert!(eval_bool("NaN !== NaN"));
        assert!(eval_bool("null == undefined"));
        assert!(!eval_bool("null === undefined"));
    }

    #[test]
    fn loop_accumulation() {
        assert_eq!(eval_str("var s = ''; for (var i = 0; i < 3; i++) s += i; s"), "012");
    }

    #[test]
    fn closure_over_activation() {
        let src = "var next = (function () { var x = 1; return function () { return x++; }; })();\n\
                   var first = next(); var second = next(); first * 10 + second";
        assert_eq!(eval_num(src), 12.0);
    }

    #[test]
    fn string_relational() {
        assert!(eval_bool("'abc' < 'abd'"));
        assert!(eval_bool("'10' < '9'"));
        assert!(!eval_bool("10 < 9"));
    }

    #[test]
    fn object_literal_member_access() {
        assert_eq!(eval_num("({a: 1, b: 2}).a + ({a: 1, b: 2}).b"), 3.0);
    }

    #[test]
    fn switch_fallthrough_and_break() {
        assert_eq!(
            eval_num("var n = 0; switch (2) { case 1: n += 1; case 2: n += 2; case 3: n += 4; break; case 4: n += 8; } n"),
            6.0
        );
        assert_eq!(eval_num("switch (9) { case 1: 1; break; default: 42; } "), 42.0);
    }

    #[test]
    fn with_scope_pushes_and_pops() {
        assert_eq!(eval_num("var o = {x: 5}; var x = 1; var r; with (o) { r = x; } r + x"), 6.0);
    }

    #[test]
    fn labelled_break_out_of_nested_loops() {
        let src = "var n = 0; outer: for (var i = 0; i < 3; i++) { for (var j = 0; j < 3; j++) { if (j == 1) continue outer; if (i == 2) break outer; n += 1; } } n";
        assert_eq!(eval_num(src), 2.0);
    }

    #[test]
    fn try_finally_runs_and_overrides() {
        // finally observes but does not replace the try value
        assert_eq!(
            eval_str("var log = ''; function f() { try { throw 'x'; } catch (e) { return e; } finally { log += 'f'; } } f() + log"),
            "xf"
        );
        // non-normal finally supersedes, swallowing the exception
        assert_eq!(
            eval_num("function g() { try { throw 'boom'; } finally { return 7; } } g()"),
            7.0
        );
    }

    #[test]
    fn delete_and_in_operators() {
        assert!(eval_bool("var o = {a: 1}; delete o.a; !('a' in o)"));
        assert!(!eval_bool("var o = {}; delete undefinedName; false"));
    }

    #[test]
    fn for_in_skips_deleted_properties() {
        let src = "var o = {a: 1, b: 2, c: 3}; var seen = ''; for (var k in o) { seen += k; delete o.c; } seen.length";
        let n = eval_num(src);
        assert!(n <= 3.0, "deleted property must not be visited twice, saw length {n}");
    }

    #[test]
    fn direct_eval_inherits_scope() {
        assert_eq!(eval_num("eval('var x = 42; x')"), 42.0);
        assert_eq!(eval_num("var y = 1; function f() { var y = 9; return eval('y'); } f()"), 9.0);
        // eval with a non-string argument returns it unchanged
        assert_eq!(eval_num("eval(7)"), 7.0);
    }

    #[test]
    fn compound_assignment_orders_getvalue_first() {
        assert_eq!(eval_str("var s = 'a'; s += 'b'; s"), "ab");
        assert_eq!(eval_num("var n = 8; n >>= 2; n"), 2.0);
    }

    #[test]
    fn prefix_and_postfix_updates() {
        assert_eq!(eval_num("var i = 5; i++ * 10 + i"), 56.0);
        assert_eq!(eval_num("var i = 5; ++i * 10 + i"), 66.0);
    }

    #[test]
    fn this_binding_through_member_calls() {
        assert_eq!(
            eval_num("var o = {v: 3, get: function () { return this.v; }}; o.get()"),
            3.0
        );
    }

    #[test]
    fn constructor_and_instanceof() {
        assert!(eval_bool(
            "function Point(x) { this.x = x; } var p = new Point(4); p instanceof Point"
        ));
        assert_eq!(eval_num("function Point(x) { this.x = x; } new Point(4).x"), 4.0);
    }

    #[test]
    fn uncaught_throw_carries_location() {
        let mut i = Interp::new(Compat::default());
        let err = i.global_eval("var a = 1;\nthrow 'bad';").unwrap_err();
        assert_eq!(err.location.map(|l| l.line), Some(2));
    }
}
