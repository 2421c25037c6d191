//! The stack machine.
//!
//! Executes [`Code`] over a stack of operands (values and references) and
//! a block stack whose frames carry the scoped acquisitions: enumerators,
//! with-scopes, catch scopes, and the two try frame kinds. `End`
//! instructions tear frames down to a target depth running each frame's
//! cleanup; a try-finally frame intercepts the teardown, runs the finally
//! body, and then either resumes the teardown or — when the finally body
//! completed abruptly — lets the finally's own completion win.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    ast::{Ast, BinaryOp, FunctionId},
    error::{CodeLoc, ErrorKind, RunError, RunResult},
    eval::{Completion, CompletionKind, Operand},
    heap::ObjectId,
    intern::StringId,
    interp::{ExecMode, Interp},
    object::{Attr, Class},
    protocol::Hint,
    scope::{Context, ScopeChain},
    value::{Reference, Value},
};

use super::{code::Code, compiler::compile_function, op::Opcode};

/// What an in-flight teardown should do once the block stack reaches its
/// target depth.
#[derive(Debug)]
enum Pending {
    /// Keep tearing down to `depth`, then resume execution at `resume`.
    End { depth: usize, resume: usize },
    /// Re-raise a throw that was interrupted by a finally body.
    Throwing(RunError),
}

/// A block-stack frame.
#[derive(Debug)]
enum Block {
    /// A live `for…in` enumeration.
    Enum(crate::enumerate::Enumerator),
    /// A `with` scope push.
    With,
    /// The catch-variable scope installed by the unwinder.
    CatchScope,
    /// An armed try-catch region.
    TryCatch {
        handler: usize,
        name: StringId,
        stack_len: usize,
        scope_len: usize,
    },
    /// An armed try-finally region.
    TryFinally {
        entry: usize,
        stack_len: usize,
        scope_len: usize,
    },
    /// A finally body in progress, holding the completion it interrupted.
    Finally { entry: usize, pending: Pending },
}

impl Interp {
    /// Runs a function body through the bytecode engine, compiling it on
    /// first use and caching the result on the AST.
    ///
    /// `keep_completions` is true for program and eval code, whose
    /// statement values surface through the completion register; function
    /// bodies only touch the register through `return`. A descriptor only
    /// ever runs in one of the two roles, so caching the compiled form is
    /// safe.
    pub(crate) fn vm_run_function(
        &mut self,
        ast: &Rc<Ast>,
        def: FunctionId,
        ctx: &Context,
        keep_completions: bool,
    ) -> RunResult<Completion> {
        debug_assert_eq!(self.mode, ExecMode::Bytecode);
        let code = match ast.cached_code(def) {
            Some(code) => code,
            None => {
                let code = Rc::new(compile_function(ast, def, &mut self.interner, self.compat, keep_completions));
                ast.cache_code(def, Rc::clone(&code));
                code
            }
        };
        Vm::new(self, ast, &code, ctx).run()
    }
}

struct Vm<'a> {
    interp: &'a mut Interp,
    ast: &'a Rc<Ast>,
    code: &'a Code,
    this: ObjectId,
    variable: ObjectId,
    var_attrs: Attr,
    /// Scope-chain states; the base context's chain at the bottom, one
    /// entry per live with/catch push above it.
    scopes: Vec<ScopeChain>,
    stack: Vec<Operand>,
    blocks: Vec<Block>,
    /// The completion-value register (SETC/GETC).
    completion: Value,
    pc: usize,
}

impl<'a> Vm<'a> {
    fn new(interp: &'a mut Interp, ast: &'a Rc<Ast>, code: &'a Code, ctx: &Context) -> Self {
        Self {
            interp,
            ast,
            code,
            this: ctx.this,
            variable: ctx.variable,
            var_attrs: ctx.var_attrs,
            scopes: vec![ctx.scope.clone()],
            stack: Vec::with_capacity(usize::from(code.maxstack)),
            blocks: Vec::with_capacity(usize::from(code.maxblock)),
            completion: Value::Undefined,
            pc: 0,
        }
    }

    fn scope(&self) -> &ScopeChain {
        self.scopes.last().expect("base scope always present")
    }

    fn push(&mut self, value: Value) {
        self.stack.push(Operand::Val(value));
    }

    fn pop(&mut self) -> Operand {
        self.stack.pop().expect("compiler balanced the operand stack")
    }

    fn pop_value(&mut self) -> RunResult<Value> {
        let operand = self.pop();
        self.interp.operand_value(&operand)
    }

    fn pop_name(&mut self) -> RunResult<StringId> {
        let v = self.pop_value()?;
        let s = self.interp.to_string_value(&v)?;
        Ok(self.interp.intern(&s))
    }

    fn run(mut self) -> RunResult<Completion> {
        loop {
            if self.pc >= self.code.bytes.len() {
                break;
            }
            let at = self.pc;
            let (op, arg, next) = self.code.decode(self.pc);
            self.pc = next;
            if let Err(err) = self.step(op, arg, at) {
                // unwind to the nearest try frame in this invocation;
                // uncaught throws leave the VM
                self.unwind(err)?;
            }
        }
        let kind = if self.code.keep_completions {
            CompletionKind::Normal
        } else {
            CompletionKind::Return
        };
        Ok(Completion {
            kind,
            value: Some(self.completion),
        })
    }

    #[expect(clippy::too_many_lines, reason = "one arm per opcode")]
    fn step(&mut self, op: Opcode, arg: i32, at: usize) -> RunResult<()> {
        match op {
            Opcode::Nop => {}
            Opcode::Dup => {
                let top = self.stack.last().expect("dup on empty stack").clone();
                self.stack.push(top);
            }
            Opcode::Pop => {
                self.pop();
            }
            Opcode::Exch => {
                let len = self.stack.len();
                self.stack.swap(len - 1, len - 2);
            }
            Opcode::Roll3 => {
                // a b c -> b c a
                let c = self.pop();
                let b = self.pop();
                let a = self.pop();
                self.stack.push(b);
                self.stack.push(c);
                self.stack.push(a);
            }
            Opcode::SetC => {
                self.completion = self.pop_value()?;
            }
            Opcode::GetC => {
                let v = self.completion.clone();
                self.push(v);
            }
            Opcode::Literal => {
                let v = self.code.literals[arg as usize].clone();
                self.push(v);
            }
            Opcode::This => self.push(Value::Object(self.this)),
            Opcode::Object => {
                let id = self.interp.new_object();
                self.push(Value::Object(id));
            }
            Opcode::Array => {
                let id = self.interp.new_array();
                self.push(Value::Object(id));
            }
            Opcode::Regexp => {
                let flags = self.pop_value()?;
                let body = self.pop_value()?;
                let (Value::Str(body), Value::Str(flags)) = (body, flags) else {
                    return Err(self.interp.type_error("malformed regular expression literal"));
                };
                let id = self.interp.new_regex(&body, &flags);
                self.push(Value::Object(id));
            }
            Opcode::Ref => {
                let property = self.pop_name()?;
                let base = self.pop_value()?;
                let Value::Object(base) = base else {
                    return Err(self.interp.type_error("member access base is not an object"));
                };
                self.stack.push(Operand::Ref(Reference {
                    base: Some(base),
                    property,
                }));
            }
            Opcode::GetValue => {
                let operand = self.pop();
                let v = self.interp.operand_value(&operand)?;
                self.push(v);
            }
            Opcode::Lookup => {
                let name = self.pop_name()?;
                let r = self.interp.scope_lookup(self.scope(), name);
                self.stack.push(Operand::Ref(r));
            }
            Opcode::PutValue => {
                let value = self.pop_value()?;
                let target = self.pop();
                self.interp.operand_put(&target, value)?;
            }
            Opcode::PutVar => {
                let value = self.pop_value()?;
                let name = self.pop_name()?;
                let r = self.interp.scope_lookup(self.scope(), name);
                self.interp.reference_put(&r, value)?;
            }
            Opcode::Var => {
                let name = self.pop_name()?;
                if !self.interp.heap.get(self.variable).has_own(name) {
                    self.interp
                        .heap
                        .get_mut(self.variable)
                        .define(name, Value::Undefined, self.var_attrs);
                }
            }
            Opcode::Delete => {
                let operand = self.pop();
                let deleted = match operand {
                    Operand::Ref(Reference {
                        base: Some(base),
                        property,
                    }) => self.interp.delete(base, property),
                    _ => true,
                };
                self.push(Value::Bool(deleted));
            }
            Opcode::TypeOf => {
                let operand = self.pop();
                let name = match &operand {
                    Operand::Ref(Reference { base: None, .. }) => "undefined",
                    _ => {
                        let v = self.interp.operand_value(&operand)?;
                        self.interp.type_of(&v)
                    }
                };
                self.push(Value::Str(crate::string::JsString::from_str_slice(name)));
            }
            Opcode::ToObject => {
                let v = self.pop_value()?;
                let id = self.interp.to_object(&v)?;
                self.push(Value::Object(id));
            }
            Opcode::ToNumber => {
                let v = self.pop_value()?;
                let n = self.interp.to_number(&v)?;
                self.push(Value::Number(n));
            }
            Opcode::ToBoolean => {
                let v = self.pop_value()?;
                self.push(Value::Bool(v.to_boolean()));
            }
            Opcode::ToString => {
                let v = self.pop_value()?;
                let s = self.interp.to_string_value(&v)?;
                self.push(Value::Str(s));
            }
            Opcode::ToPrimitive => {
                let v = self.pop_value()?;
                let p = self.interp.to_primitive(&v, Hint::None)?;
                self.push(p);
            }
            Opcode::Neg => {
                let v = self.pop_value()?;
                let n = self.interp.to_number(&v)?;
                self.push(Value::Number(-n));
            }
            Opcode::Inv => {
                let v = self.pop_value()?;
                let n = self.interp.to_int32(&v)?;
                self.push(Value::Number(f64::from(!n)));
            }
            Opcode::Not => {
                let v = self.pop_value()?;
                self.push(Value::Bool(!v.to_boolean()));
            }
            Opcode::Mul => self.binary(BinaryOp::Mul)?,
            Opcode::Div => self.binary(BinaryOp::Div)?,
            Opcode::Mod => self.binary(BinaryOp::Mod)?,
            Opcode::Add => self.binary(BinaryOp::Add)?,
            Opcode::Sub => self.binary(BinaryOp::Sub)?,
            Opcode::Lshift => self.binary(BinaryOp::Shl)?,
            Opcode::Rshift => self.binary(BinaryOp::Shr)?,
            Opcode::Urshift => self.binary(BinaryOp::Ushr)?,
            Opcode::Lt => self.binary(BinaryOp::Lt)?,
            Opcode::Gt => self.binary(BinaryOp::Gt)?,
            Opcode::Le => self.binary(BinaryOp::Le)?,
            Opcode::Ge => self.binary(BinaryOp::Ge)?,
            Opcode::InstanceOf => self.binary(BinaryOp::InstanceOf)?,
            Opcode::In => self.binary(BinaryOp::In)?,
            Opcode::Eq => self.binary(BinaryOp::Eq)?,
            Opcode::Seq => self.binary(BinaryOp::StrictEq)?,
            Opcode::BAnd => self.binary(BinaryOp::BitAnd)?,
            Opcode::BXor => self.binary(BinaryOp::BitXor)?,
            Opcode::BOr => self.binary(BinaryOp::BitOr)?,
            Opcode::BAlways => {
                self.pc = arg as usize;
            }
            Opcode::BTrue => {
                let v = self.pop_value()?;
                if v.to_boolean() {
                    self.pc = arg as usize;
                }
            }
            Opcode::BEnum => {
                let Some(enumerator) = self.blocks.iter_mut().rev().find_map(|b| match b {
                    Block::Enum(e) => Some(e),
                    _ => None,
                }) else {
                    unreachable!("BEnum outside an enumeration block");
                };
                if let Some(name) = self.interp.enum_next(enumerator) {
                    let text = self.interp.intern_text(name).clone();
                    self.push(Value::Str(text));
                    self.pc = arg as usize;
                }
                // exhausted: fall through, frame stays for End to release
            }
            Opcode::New => {
                let argv = self.pop_arguments(arg as usize)?;
                let callee = self.pop_value()?;
                let Value::Object(callee) = callee else {
                    return Err(self.interp.type_error("new target is not a constructor"));
                };
                let result = self.interp.construct(callee, &argv)?;
                self.stack.push(Operand::Val(result));
            }
            Opcode::Call => {
                let argv = self.pop_arguments(arg as usize)?;
                let target = self.pop();
                let f = self.interp.operand_value(&target)?;
                let this = match &target {
                    Operand::Ref(Reference { base: Some(base), .. })
                        if self.interp.heap.get(*base).class != Class::Activation =>
                    {
                        *base
                    }
                    _ => self.interp.global,
                };
                let Value::Object(f) = f else {
                    let shown = crate::value::describe_primitive(&f);
                    return Err(self.interp.type_error(&format!("{shown} is not a function")));
                };
                let result = if f == self.interp.eval_fn {
                    let ctx = Context {
                        this: self.this,
                        scope: self.scope().clone(),
                        variable: self.variable,
                        var_attrs: self.var_attrs,
                    };
                    self.interp.direct_eval(&ctx, argv.first())?
                } else {
                    self.interp.call(f, this, &argv)?
                };
                self.stack.push(Operand::Val(result));
            }
            Opcode::End => {
                self.exec_end(arg as usize, self.pc, at)?;
            }
            Opcode::Throw => {
                let v = self.pop_value()?;
                return Err(self.interp.throw_value(v));
            }
            Opcode::SEnum => {
                let v = self.pop_value()?;
                let Value::Object(obj) = v else {
                    return Err(self.interp.type_error("for-in subject is not an object"));
                };
                let enumerator = crate::enumerate::Enumerator::new(&self.interp.heap, obj);
                self.blocks.push(Block::Enum(enumerator));
            }
            Opcode::SWith => {
                let v = self.pop_value()?;
                let Value::Object(obj) = v else {
                    return Err(self.interp.type_error("with subject is not an object"));
                };
                let pushed = self.scope().push(obj);
                self.scopes.push(pushed);
                self.blocks.push(Block::With);
            }
            Opcode::STryC => {
                let name = self.pop_name()?;
                self.blocks.push(Block::TryCatch {
                    handler: arg as usize,
                    name,
                    stack_len: self.stack.len(),
                    scope_len: self.scopes.len(),
                });
            }
            Opcode::STryF => {
                let entry = self
                    .code
                    .finally_table
                    .iter()
                    .position(|e| e.body as usize == arg as usize)
                    .expect("finally table entry for STryF target");
                self.blocks.push(Block::TryFinally {
                    entry,
                    stack_len: self.stack.len(),
                    scope_len: self.scopes.len(),
                });
            }
            Opcode::Func => {
                let def = self.code.functions[arg as usize];
                let scope = self.scope().clone();
                let id = self.interp.instantiate_named_expression(self.ast, def, &scope);
                self.push(Value::Object(id));
            }
            Opcode::Loc => {
                let loc = CodeLoc { line: arg as u32 };
                self.interp.current_loc = loc;
                if !self.interp.tracer.on_statement(loc) {
                    return Err(self
                        .interp
                        .throw_error(ErrorKind::RangeError, "script execution aborted by trace hook"));
                }
            }
        }
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp) -> RunResult<()> {
        let r = self.pop_value()?;
        let l = self.pop_value()?;
        let result = self.interp.binary_op(op, &l, &r)?;
        self.push(result);
        Ok(())
    }

    fn pop_arguments(&mut self, argc: usize) -> RunResult<Vec<Value>> {
        let mut argv: SmallVec<[Value; 8]> = SmallVec::from_elem(Value::Undefined, argc);
        for slot in argv.iter_mut().rev() {
            *slot = self.pop_value()?;
        }
        Ok(argv.into_vec())
    }

    /// `End` teardown: pop frames until the block stack is `target` deep,
    /// then continue at `resume`. A try-finally frame interrupts the
    /// teardown to run its finally body; the finally's terminating `End`
    /// (recognized by address) re-applies the pending teardown, while any
    /// other exit path through the frame discards it.
    fn exec_end(&mut self, target: usize, resume: usize, end_ip: usize) -> RunResult<()> {
        let mut target = target;
        let mut resume = resume;
        loop {
            if self.blocks.len() <= target {
                self.pc = resume;
                return Ok(());
            }
            match self.blocks.pop().expect("depth checked") {
                Block::Enum(_) | Block::TryCatch { .. } => {}
                Block::With | Block::CatchScope => {
                    self.scopes.pop();
                }
                Block::TryFinally { entry, .. } => {
                    self.blocks.push(Block::Finally {
                        entry,
                        pending: Pending::End { depth: target, resume },
                    });
                    self.pc = self.code.finally_table[entry].body as usize;
                    return Ok(());
                }
                Block::Finally { entry, pending } => {
                    let normal_end = self.code.finally_table[entry].end as usize == end_ip;
                    if normal_end {
                        match pending {
                            Pending::End { depth, resume: r } => {
                                target = depth;
                                resume = r;
                            }
                            Pending::Throwing(err) => return Err(err),
                        }
                    }
                    // an abrupt jump out of the finally body discards the
                    // interrupted completion: finally wins
                }
            }
        }
    }

    /// Throw unwinding: walk the block stack for a try frame, releasing
    /// scoped acquisitions on the way. Returns `Ok` when a handler or
    /// finally took control, `Err` to propagate out of this invocation.
    fn unwind(&mut self, err: RunError) -> RunResult<()> {
        loop {
            let Some(block) = self.blocks.pop() else {
                return Err(err);
            };
            match block {
                Block::Enum(_) => {}
                Block::With | Block::CatchScope => {
                    self.scopes.pop();
                }
                Block::TryCatch {
                    handler,
                    name,
                    stack_len,
                    scope_len,
                } => {
                    self.stack.truncate(stack_len);
                    self.scopes.truncate(scope_len);
                    // bind the caught value in a fresh scope object
                    let binding = self.interp.new_object();
                    self.interp.heap.get_mut(binding).define(name, err.value, Attr::DONT_DELETE);
                    let pushed = self.scope().push(binding);
                    self.scopes.push(pushed);
                    self.blocks.push(Block::CatchScope);
                    self.pc = handler;
                    return Ok(());
                }
                Block::TryFinally {
                    entry,
                    stack_len,
                    scope_len,
                } => {
                    self.stack.truncate(stack_len);
                    self.scopes.truncate(scope_len);
                    self.blocks.push(Block::Finally {
                        entry,
                        pending: Pending::Throwing(err),
                    });
                    self.pc = self.code.finally_table[entry].body as usize;
                    return Ok(());
                }
                Block::Finally { pending, .. } => {
                    // a throw out of a finally body replaces whatever the
                    // finally interrupted
                    drop(pending);
                }
            }
        }
    }
}
