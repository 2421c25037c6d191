//! AST to bytecode.
//!
//! Statements compile to straight-line code with explicit block-scope
//! instructions; break/continue/return compile to `End`-to-depth teardowns
//! followed by branches, so every scoped acquisition (with-scope, catch
//! scope, enumerator, try frame) is released on every exit path by the
//! VM's teardown machinery rather than by compiler bookkeeping at each
//! site.
//!
//! Jump targets arrive from the parser as resolved node indices; the
//! compiler maps them to patch lists while the target statement is open.

use ahash::AHashMap;

use crate::{
    ast::{Ast, BinaryOp, ForInLeft, FunctionId, LogicalOp, NodeId, NodeKind, UnaryOp, UpdateOp},
    compat::Compat,
    intern::{Interner, StringId, WellKnown},
    value::Value,
};

use super::{
    builder::{CodeBuilder, Patch},
    code::Code,
    op::Opcode,
};

/// Compiles one function body (or program) to bytecode.
pub(crate) fn compile_function(
    ast: &Ast,
    def: FunctionId,
    interner: &mut Interner,
    compat: Compat,
    keep_completions: bool,
) -> Code {
    let mut compiler = Compiler {
        ast,
        interner,
        compat,
        b: CodeBuilder::new(),
        targets: AHashMap::new(),
        return_patches: Vec::new(),
        keep_completions,
    };
    let body = &ast.function(def).body;
    for &stmt in body {
        compiler.stmt(stmt);
    }
    let epilogue = compiler.b.here();
    for patch in std::mem::take(&mut compiler.return_patches) {
        compiler.b.patch_to(patch, epilogue);
    }
    compiler.b.build(keep_completions, ast.filename.clone())
}

/// Open jump-target bookkeeping for a loop, switch, or labelled
/// statement.
struct JumpTarget {
    break_patches: Vec<Patch>,
    continue_patches: Vec<Patch>,
    /// Backward continue address, when the landing site precedes the body.
    continue_addr: Option<u32>,
    /// Block depth outside the statement (breaks tear down to here).
    break_depth: i32,
    /// Block depth inside the body (continues stay inside enumeration
    /// frames).
    continue_depth: i32,
}

struct Compiler<'a> {
    ast: &'a Ast,
    interner: &'a mut Interner,
    compat: Compat,
    b: CodeBuilder,
    targets: AHashMap<NodeId, JumpTarget>,
    return_patches: Vec<Patch>,
    keep_completions: bool,
}

impl Compiler<'_> {
    fn ext1(&self) -> bool {
        self.compat.contains(Compat::EXT1)
    }

    fn name_literal(&mut self, name: StringId) {
        let text = self.interner.get(name).clone();
        self.b.emit_literal(&Value::Str(text));
    }

    // ----- statements -----

    fn stmt(&mut self, id: NodeId) {
        self.b.emit_arg(Opcode::Loc, self.ast.line(id));
        match self.ast.kind(id).clone() {
            NodeKind::Block(stmts) => {
                for stmt in stmts {
                    self.stmt(stmt);
                }
            }
            NodeKind::Empty | NodeKind::FunctionDecl(_) => {}
            NodeKind::ExprStmt(expr) => {
                self.value(expr);
                if self.keep_completions {
                    self.b.emit(Opcode::SetC);
                } else {
                    self.b.emit(Opcode::Pop);
                }
            }
            NodeKind::VarStmt(decls) => {
                for decl in decls {
                    self.name_literal(decl.name);
                    match decl.init {
                        Some(init) => {
                            self.value(init);
                            self.b.emit(Opcode::PutVar);
                        }
                        None => self.b.emit(Opcode::Var),
                    }
                }
            }
            NodeKind::If { test, cons, alt } => {
                self.value(test);
                self.b.emit(Opcode::ToBoolean);
                let to_then = self.b.emit_branch(Opcode::BTrue);
                if let Some(alt) = alt {
                    self.stmt(alt);
                }
                let to_end = self.b.emit_branch(Opcode::BAlways);
                self.b.patch(to_then);
                self.stmt(cons);
                self.b.patch(to_end);
            }
            NodeKind::While { test, body } => {
                let depth = self.b.block_depth();
                let test_addr = self.b.here();
                self.targets.insert(
                    id,
                    JumpTarget {
                        break_patches: Vec::new(),
                        continue_patches: Vec::new(),
                        continue_addr: Some(test_addr),
                        break_depth: depth,
                        continue_depth: depth,
                    },
                );
                self.value(test);
                self.b.emit(Opcode::ToBoolean);
                let to_body = self.b.emit_branch(Opcode::BTrue);
                let to_end = self.b.emit_branch(Opcode::BAlways);
                self.b.patch(to_body);
                self.stmt(body);
                self.b.emit_branch_to(Opcode::BAlways, test_addr);
                self.b.patch(to_end);
                self.finish_target(id);
            }
            NodeKind::DoWhile { body, test } => {
                let depth = self.b.block_depth();
                let body_addr = self.b.here();
                self.targets.insert(
                    id,
                    JumpTarget {
                        break_patches: Vec::new(),
                        continue_patches: Vec::new(),
                        continue_addr: None,
                        break_depth: depth,
                        continue_depth: depth,
                    },
                );
                self.stmt(body);
                // continue lands on the test
                let test_addr = self.b.here();
                if let Some(t) = self.targets.get_mut(&id) {
                    t.continue_addr = Some(test_addr);
                    for patch in std::mem::take(&mut t.continue_patches) {
                        self.b.patch_to(patch, test_addr);
                    }
                }
                self.value(test);
                self.b.emit(Opcode::ToBoolean);
                self.b.emit_branch_to(Opcode::BTrue, body_addr);
                self.finish_target(id);
            }
            NodeKind::For { init, test, step, body } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                let depth = self.b.block_depth();
                let test_addr = self.b.here();
                self.targets.insert(
                    id,
                    JumpTarget {
                        break_patches: Vec::new(),
                        continue_patches: Vec::new(),
                        continue_addr: None,
                        break_depth: depth,
                        continue_depth: depth,
                    },
                );
                let exit = test.map(|test| {
                    self.value(test);
                    self.b.emit(Opcode::ToBoolean);
                    let to_body = self.b.emit_branch(Opcode::BTrue);
                    let to_end = self.b.emit_branch(Opcode::BAlways);
                    self.b.patch(to_body);
                    to_end
                });
                self.stmt(body);
                // continue lands on the step (or straight back at the test)
                let step_addr = self.b.here();
                if let Some(t) = self.targets.get_mut(&id) {
                    t.continue_addr = Some(step_addr);
                    for patch in std::mem::take(&mut t.continue_patches) {
                        self.b.patch_to(patch, step_addr);
                    }
                }
                if let Some(step) = step {
                    self.value(step);
                    self.b.emit(Opcode::Pop);
                }
                self.b.emit_branch_to(Opcode::BAlways, test_addr);
                if let Some(to_end) = exit {
                    self.b.patch(to_end);
                }
                self.finish_target(id);
            }
            NodeKind::ForIn { left, object, body } => self.for_in(id, &left, object, body),
            NodeKind::Continue { target, .. } => {
                let (depth, addr) = {
                    let t = self.targets.get(&target).expect("parser resolved continue target");
                    (t.continue_depth, t.continue_addr)
                };
                self.b.end_for_jump(depth);
                match addr {
                    Some(addr) => self.b.emit_branch_to(Opcode::BAlways, addr),
                    None => {
                        let patch = self.b.emit_branch(Opcode::BAlways);
                        self.targets
                            .get_mut(&target)
                            .expect("target still open")
                            .continue_patches
                            .push(patch);
                    }
                }
            }
            NodeKind::Break { target, .. } => {
                let depth = self.targets.get(&target).expect("parser resolved break target").break_depth;
                self.b.end_for_jump(depth);
                let patch = self.b.emit_branch(Opcode::BAlways);
                self.targets
                    .get_mut(&target)
                    .expect("target still open")
                    .break_patches
                    .push(patch);
            }
            NodeKind::Return(expr) => {
                match expr {
                    Some(expr) => self.value(expr),
                    None => self.b.emit_literal(&Value::Undefined),
                }
                self.b.emit(Opcode::SetC);
                self.b.end_for_jump(0);
                let patch = self.b.emit_branch(Opcode::BAlways);
                self.return_patches.push(patch);
            }
            NodeKind::With { object, body } => {
                let depth = self.b.block_depth();
                self.value(object);
                self.b.emit(Opcode::ToObject);
                self.b.emit(Opcode::SWith);
                self.stmt(body);
                self.b.end_to(depth);
            }
            NodeKind::Switch { disc, cases } => self.switch(id, disc, &cases),
            NodeKind::Labelled { body, .. } => {
                let depth = self.b.block_depth();
                self.targets.insert(
                    id,
                    JumpTarget {
                        break_patches: Vec::new(),
                        continue_patches: Vec::new(),
                        continue_addr: None,
                        break_depth: depth,
                        continue_depth: depth,
                    },
                );
                self.stmt(body);
                self.finish_target(id);
            }
            NodeKind::Throw(expr) => {
                self.value(expr);
                self.b.emit(Opcode::Throw);
            }
            NodeKind::Try { block, catch, finally } => self.try_stmt(block, catch.as_ref(), finally),
            other => unreachable!("statement compiler reached expression node {other:?}"),
        }
    }

    fn finish_target(&mut self, id: NodeId) {
        let target = self.targets.remove(&id).expect("target was registered");
        for patch in target.break_patches {
            self.b.patch(patch);
        }
        for patch in target.continue_patches {
            self.b.patch(patch);
        }
    }

    fn for_in(&mut self, id: NodeId, left: &ForInLeft, object: NodeId, body: NodeId) {
        if let ForInLeft::Var { name, init: Some(init) } = left {
            self.name_literal(*name);
            self.value(*init);
            self.b.emit(Opcode::PutVar);
        }

        let depth = self.b.block_depth();
        self.value(object);
        self.b.emit(Opcode::ToObject);
        self.b.emit(Opcode::SEnum);

        let top = self.b.here();
        self.targets.insert(
            id,
            JumpTarget {
                break_patches: Vec::new(),
                continue_patches: Vec::new(),
                continue_addr: Some(top),
                break_depth: depth,
                continue_depth: depth + 1,
            },
        );
        let to_body = self.b.emit_branch(Opcode::BEnum);
        // exhausted: release the enumerator and leave
        self.b.end_for_jump(depth);
        let to_end = self.b.emit_branch(Opcode::BAlways);

        self.b.patch(to_body);
        // stack: [name]; build the target reference and assign
        match left {
            ForInLeft::Expr(lhs) => self.operand(*lhs),
            ForInLeft::Var { name, .. } => {
                self.name_literal(*name);
                self.b.emit(Opcode::Lookup);
            }
        }
        self.b.emit(Opcode::Exch);
        self.b.emit(Opcode::PutValue);
        self.stmt(body);
        self.b.emit_branch_to(Opcode::BAlways, top);

        self.b.patch(to_end);
        self.finish_target(id);
        self.b.assume_block(depth);
    }

    fn switch(&mut self, id: NodeId, disc: NodeId, cases: &[crate::ast::SwitchCase]) {
        let depth = self.b.block_depth();
        self.targets.insert(
            id,
            JumpTarget {
                break_patches: Vec::new(),
                continue_patches: Vec::new(),
                continue_addr: None,
                break_depth: depth,
                continue_depth: depth,
            },
        );

        self.value(disc);
        // dispatch: strict-compare against each case test in source order
        let mut test_jumps = Vec::new();
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = case.test {
                self.b.emit(Opcode::Dup);
                self.value(test);
                self.b.emit(Opcode::Seq);
                let hit = self.b.emit_branch(Opcode::BTrue);
                test_jumps.push((i, hit));
            }
        }
        self.b.emit(Opcode::Pop);
        let to_default = self.b.emit_branch(Opcode::BAlways);

        // per-case trampolines drop the kept discriminant before entering
        // the shared fall-through bodies
        let mut body_jumps = Vec::new();
        for (i, hit) in test_jumps {
            self.b.patch(hit);
            self.b.assume_stack(1);
            self.b.emit(Opcode::Pop);
            body_jumps.push((i, self.b.emit_branch(Opcode::BAlways)));
        }

        let mut default_addr = None;
        for (i, case) in cases.iter().enumerate() {
            let addr = self.b.here();
            if case.test.is_none() {
                default_addr = Some(addr);
            }
            for (j, patch) in &body_jumps {
                if *j == i {
                    self.b.patch_to(*patch, addr);
                }
            }
            for &stmt in &case.body {
                self.stmt(stmt);
            }
        }

        match default_addr {
            Some(addr) => self.b.patch_to(to_default, addr),
            None => self.b.patch(to_default),
        }
        self.finish_target(id);
    }

    fn try_stmt(&mut self, block: NodeId, catch: Option<&crate::ast::CatchClause>, finally: Option<NodeId>) {
        let depth = self.b.block_depth();

        let finally_parts = finally.map(|f| {
            let handle = self.b.open_finally();
            let to_finally = self.b.emit_branch(Opcode::STryF);
            (f, handle, to_finally)
        });
        let inner_depth = self.b.block_depth();

        let catch_parts = catch.map(|clause| {
            self.name_literal(clause.name);
            let to_handler = self.b.emit_branch(Opcode::STryC);
            (clause, to_handler)
        });

        self.stmt(block);

        if let Some((clause, to_handler)) = catch_parts {
            self.b.end_to(inner_depth);
            let to_after = self.b.emit_branch(Opcode::BAlways);
            self.b.patch(to_handler);
            // the handler runs under the catch-scope frame the unwinder
            // installed in place of the try frame
            self.b.assume_block(inner_depth + 1);
            self.stmt(clause.body);
            self.b.end_to(inner_depth);
            self.b.patch(to_after);
        }

        if let Some((f, handle, to_finally)) = finally_parts {
            self.b.end_to(depth);
            let to_done = self.b.emit_branch(Opcode::BAlways);
            let body_addr = self.b.here();
            self.b.set_finally_body(handle, body_addr);
            self.b.patch(to_finally);
            self.b.assume_block(depth + 1);
            self.stmt(f);
            let end_addr = self.b.here();
            self.b.set_finally_end(handle, end_addr);
            self.b.end_to(depth);
            self.b.patch(to_done);
        }
    }

    // ----- expressions -----

    /// Compiles an expression leaving a plain value on the stack.
    fn value(&mut self, id: NodeId) {
        // constant-expression folding: observational only, keyed on the
        // memoized per-node predicate
        if !matches!(
            self.ast.kind(id),
            NodeKind::Number(_) | NodeKind::StrLit(_) | NodeKind::BoolLit(_) | NodeKind::NullLit
        ) && let Some(folded) = self.ast.const_value(id, self.ext1())
        {
            self.b.emit_literal(&folded);
            return;
        }
        self.operand(id);
        if matches!(
            self.ast.kind(id),
            NodeKind::Ident(_) | NodeKind::Member { .. } | NodeKind::Index { .. }
        ) {
            self.b.emit(Opcode::GetValue);
        }
    }

    /// Compiles an expression leaving an operand on the stack: a Reference
    /// for identifier and member forms, a value otherwise.
    fn operand(&mut self, id: NodeId) {
        match self.ast.kind(id).clone() {
            NodeKind::This => self.b.emit(Opcode::This),
            NodeKind::Ident(name) => {
                self.name_literal(name);
                self.b.emit(Opcode::Lookup);
            }
            NodeKind::Number(n) => self.b.emit_literal(&Value::Number(n)),
            NodeKind::StrLit(s) => self.b.emit_literal(&Value::Str(s)),
            NodeKind::NullLit => self.b.emit_literal(&Value::Null),
            NodeKind::BoolLit(v) => self.b.emit_literal(&Value::Bool(v)),
            NodeKind::Regex { body, flags } => {
                self.b.emit_literal(&Value::Str(body));
                self.b.emit_literal(&Value::Str(flags));
                self.b.emit(Opcode::Regexp);
            }
            NodeKind::ArrayLit(elements) => {
                self.b.emit(Opcode::Array);
                for (i, element) in elements.iter().enumerate() {
                    if let Some(e) = *element {
                        self.b.emit(Opcode::Dup);
                        let name = self.interner.intern_index(i as u32);
                        self.name_literal(name);
                        self.b.emit(Opcode::Ref);
                        self.value(e);
                        self.b.emit(Opcode::PutValue);
                    }
                }
                self.b.emit(Opcode::Dup);
                self.name_literal(WellKnown::Length.into());
                self.b.emit(Opcode::Ref);
                self.b.emit_literal(&Value::Number(elements.len() as f64));
                self.b.emit(Opcode::PutValue);
            }
            NodeKind::ObjectLit(props) => {
                self.b.emit(Opcode::Object);
                for (name, expr) in props {
                    self.b.emit(Opcode::Dup);
                    self.name_literal(name);
                    self.b.emit(Opcode::Ref);
                    self.value(expr);
                    self.b.emit(Opcode::PutValue);
                }
            }
            NodeKind::FunctionExpr(def) => self.b.emit_func(def),
            NodeKind::Member { object, name } => {
                self.value(object);
                self.b.emit(Opcode::ToObject);
                self.name_literal(name);
                self.b.emit(Opcode::Ref);
            }
            NodeKind::Index { object, index } => {
                // the subscript evaluates before the base coerces (§11.2.1
                // step order), so ToObject happens under an Exch pair
                self.value(object);
                self.value(index);
                self.b.emit(Opcode::ToString);
                self.b.emit(Opcode::Exch);
                self.b.emit(Opcode::ToObject);
                self.b.emit(Opcode::Exch);
                self.b.emit(Opcode::Ref);
            }
            NodeKind::New { callee, args } => {
                self.value(callee);
                let argc = args.len() as u16;
                for arg in args {
                    self.value(arg);
                }
                self.b.emit_call(Opcode::New, argc);
            }
            NodeKind::Call { callee, args } => {
                // the callee stays a Reference so the VM can derive `this`
                self.operand(callee);
                let argc = args.len() as u16;
                for arg in args {
                    self.value(arg);
                }
                self.b.emit_call(Opcode::Call, argc);
            }
            NodeKind::Postfix { op, expr } => {
                self.operand(expr);
                self.b.emit(Opcode::Dup);
                self.b.emit(Opcode::GetValue);
                self.b.emit(Opcode::ToNumber);
                self.b.emit(Opcode::Dup);
                self.b.emit_literal(&Value::Number(1.0));
                self.b.emit(match op {
                    UpdateOp::Inc => Opcode::Add,
                    UpdateOp::Dec => Opcode::Sub,
                });
                self.b.emit(Opcode::Roll3);
                self.b.emit(Opcode::Exch);
                self.b.emit(Opcode::PutValue);
            }
            NodeKind::Unary { op, expr } => self.unary(op, expr),
            NodeKind::Binary { op, left, right } => {
                self.value(left);
                self.value(right);
                match op {
                    BinaryOp::Ne => {
                        self.b.emit(Opcode::Eq);
                        self.b.emit(Opcode::Not);
                    }
                    BinaryOp::StrictNe => {
                        self.b.emit(Opcode::Seq);
                        self.b.emit(Opcode::Not);
                    }
                    other => self.b.emit(binary_opcode(other)),
                }
            }
            NodeKind::Logical { op, left, right } => {
                self.value(left);
                self.b.emit(Opcode::Dup);
                self.b.emit(Opcode::ToBoolean);
                if op == LogicalOp::And {
                    self.b.emit(Opcode::Not);
                }
                let keep = self.b.emit_branch(Opcode::BTrue);
                self.b.emit(Opcode::Pop);
                self.value(right);
                self.b.patch(keep);
            }
            NodeKind::Cond { test, cons, alt } => {
                self.value(test);
                self.b.emit(Opcode::ToBoolean);
                let to_cons = self.b.emit_branch(Opcode::BTrue);
                self.value(alt);
                let to_end = self.b.emit_branch(Opcode::BAlways);
                self.b.patch(to_cons);
                self.b.assume_stack(-1);
                self.value(cons);
                self.b.patch(to_end);
            }
            NodeKind::Assign { target, op, value } => {
                self.operand(target);
                match op {
                    None => self.value(value),
                    Some(op) => {
                        self.b.emit(Opcode::Dup);
                        self.b.emit(Opcode::GetValue);
                        self.value(value);
                        match op {
                            BinaryOp::Ne => {
                                self.b.emit(Opcode::Eq);
                                self.b.emit(Opcode::Not);
                            }
                            BinaryOp::StrictNe => {
                                self.b.emit(Opcode::Seq);
                                self.b.emit(Opcode::Not);
                            }
                            other => self.b.emit(binary_opcode(other)),
                        }
                    }
                }
                self.b.emit(Opcode::Dup);
                self.b.emit(Opcode::Roll3);
                self.b.emit(Opcode::Exch);
                self.b.emit(Opcode::PutValue);
            }
            NodeKind::Comma { left, right } => {
                self.value(left);
                self.b.emit(Opcode::Pop);
                self.value(right);
            }
            other => unreachable!("expression compiler reached statement node {other:?}"),
        }
    }

    fn unary(&mut self, op: UnaryOp, expr: NodeId) {
        match op {
            UnaryOp::Delete => {
                self.operand(expr);
                self.b.emit(Opcode::Delete);
            }
            UnaryOp::Void => {
                self.value(expr);
                self.b.emit(Opcode::Pop);
                self.b.emit_literal(&Value::Undefined);
            }
            UnaryOp::TypeOf => {
                self.operand(expr);
                self.b.emit(Opcode::TypeOf);
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                self.operand(expr);
                self.b.emit(Opcode::Dup);
                self.b.emit(Opcode::GetValue);
                self.b.emit(Opcode::ToNumber);
                self.b.emit_literal(&Value::Number(1.0));
                self.b.emit(if op == UnaryOp::PreInc { Opcode::Add } else { Opcode::Sub });
                self.b.emit(Opcode::Dup);
                self.b.emit(Opcode::Roll3);
                self.b.emit(Opcode::Exch);
                self.b.emit(Opcode::PutValue);
            }
            UnaryOp::Plus => {
                self.value(expr);
                self.b.emit(Opcode::ToNumber);
            }
            UnaryOp::Minus => {
                self.value(expr);
                self.b.emit(Opcode::Neg);
            }
            UnaryOp::BitNot => {
                self.value(expr);
                self.b.emit(Opcode::Inv);
            }
            UnaryOp::Not => {
                self.value(expr);
                self.b.emit(Opcode::ToBoolean);
                self.b.emit(Opcode::Not);
            }
        }
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Shl => Opcode::Lshift,
        BinaryOp::Shr => Opcode::Rshift,
        BinaryOp::Ushr => Opcode::Urshift,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::In => Opcode::In,
        BinaryOp::InstanceOf => Opcode::InstanceOf,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::StrictEq => Opcode::Seq,
        BinaryOp::BitAnd => Opcode::BAnd,
        BinaryOp::BitXor => Opcode::BXor,
        BinaryOp::BitOr => Opcode::BOr,
        BinaryOp::Ne | BinaryOp::StrictNe => unreachable!("negated forms compile to Eq/Seq + Not"),
    }
}
