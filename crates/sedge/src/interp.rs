//! The interpreter: owns the heap, the intern table, the Global object and
//! its prototypes, and the embedding API.
//!
//! An `Interp` is single-threaded and fully self-contained; several may
//! coexist in one process but handles and ids never cross between them.

use std::rc::Rc;

use crate::{
    ast::{Ast, FunctionId},
    builtins,
    compat::Compat,
    error::{CodeLoc, ErrorKind, Exception, ParseError, RunError, RunResult, StackFrame, TracebackFrame},
    heap::{Heap, ObjectId},
    input::{Input, StringInput},
    intern::{Interner, StringId, WellKnown},
    object::{Attr, Class, Object, ObjectData},
    parser,
    scope::{Context, ScopeChain},
    string::JsString,
    tracer::{NoopTracer, Tracer},
    value::Value,
};

/// Which execution engine runs function bodies.
///
/// Both engines implement the same observable semantics; the tree-walker is
/// the reference, the bytecode VM trades compilation time for tighter
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    TreeWalk,
    Bytecode,
}

/// Handles to the standard prototypes built at init.
#[derive(Debug, Clone, Copy)]
pub struct Prototypes {
    pub object: ObjectId,
    pub function: ObjectId,
    pub array: ObjectId,
    pub string: ObjectId,
    pub boolean: ObjectId,
    pub number: ObjectId,
    /// Prototype per error class, indexed in [`ErrorKind::ALL`] order.
    pub errors: [ObjectId; 7],
}

/// A parsed program, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) ast: Rc<Ast>,
    pub(crate) body: FunctionId,
}

/// Default limit on nested call depth; a guard against runaway recursion
/// blowing the host stack. Hosts can raise or lower it.
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 512;

/// An ECMAScript interpreter instance.
pub struct Interp {
    pub(crate) heap: Heap,
    pub(crate) interner: Interner,
    pub(crate) compat: Compat,
    pub(crate) mode: ExecMode,
    pub(crate) global: ObjectId,
    pub(crate) protos: Prototypes,
    /// The distinguished `Global.eval`, recognized at call sites for the
    /// direct-eval path.
    pub(crate) eval_fn: ObjectId,
    pub(crate) traceback: Vec<TracebackFrame>,
    pub(crate) tracer: Box<dyn Tracer>,
    pub(crate) call_depth: u32,
    pub(crate) max_call_depth: u32,
    /// Location of the statement currently being evaluated, for errors
    /// raised without a closer position.
    pub(crate) current_loc: CodeLoc,
}

impl std::fmt::Debug for Interp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interp")
            .field("objects", &self.heap.len())
            .field("compat", &self.compat)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Interp {
    /// Creates an interpreter with the given compatibility flags,
    /// constructing the Global object and the standard prototypes.
    #[must_use]
    pub fn new(compat: Compat) -> Self {
        let mut heap = Heap::new();
        let interner = Interner::new();

        // Object.prototype is the root of every chain and has none itself.
        let object_proto = heap.alloc(Object::new(Class::Object, None));
        let function_proto = heap.alloc(Object::new(Class::Function, Some(object_proto)));
        let array_proto = heap.alloc(Object::new(Class::Array, Some(object_proto)));
        let string_proto = heap.alloc(Object::new(Class::String, Some(object_proto)));
        let boolean_proto = heap.alloc(Object::new(Class::Boolean, Some(object_proto)));
        let number_proto = heap.alloc(Object::new(Class::Number, Some(object_proto)));
        let error_proto = heap.alloc(Object::new(Class::Error, Some(object_proto)));
        let mut errors = [error_proto; 7];
        for slot in errors.iter_mut().skip(1) {
            *slot = heap.alloc(Object::new(Class::Error, Some(error_proto)));
        }
        let global = heap.alloc(Object::new(Class::Global, Some(object_proto)));

        let mut interp = Self {
            heap,
            interner,
            compat,
            mode: ExecMode::default(),
            global,
            protos: Prototypes {
                object: object_proto,
                function: function_proto,
                array: array_proto,
                string: string_proto,
                boolean: boolean_proto,
                number: number_proto,
                errors,
            },
            eval_fn: global, // placeholder until builtins install
            traceback: Vec::new(),
            tracer: Box::new(NoopTracer),
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            current_loc: CodeLoc { line: 0 },
        };
        builtins::install(&mut interp);
        interp
    }

    /// Selects the execution engine for subsequently run code.
    pub fn set_exec_mode(&mut self, mode: ExecMode) {
        self.mode = mode;
    }

    /// Installs a statement/call tracer (watchdogs, coverage, debugging).
    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = tracer;
    }

    /// Adjusts the nested-call depth guard.
    pub fn set_max_call_depth(&mut self, depth: u32) {
        self.max_call_depth = depth;
    }

    /// The Global object.
    #[must_use]
    pub fn global(&self) -> ObjectId {
        self.global
    }

    /// Interns a string in this interpreter's table.
    pub fn intern(&mut self, s: &JsString) -> StringId {
        self.interner.intern(s)
    }

    /// Interns a Rust string slice.
    pub fn intern_str(&mut self, s: &str) -> StringId {
        self.interner.intern_str(s)
    }

    /// The text of an interned string.
    #[must_use]
    pub fn intern_text(&self, id: StringId) -> &JsString {
        self.interner.get(id)
    }

    // ----- parsing entry points -----

    /// Parses a top-level script from an input source.
    pub fn parse_program(&mut self, input: &mut dyn Input) -> Result<Program, ParseError> {
        let (ast, body) = parser::parse_program(input, &mut self.interner, self.compat)?;
        Ok(Program {
            ast: Rc::new(ast),
            body,
        })
    }

    /// Parses the `Function(params, body)` form into a callable program.
    pub fn parse_function(
        &mut self,
        name: Option<StringId>,
        params_input: &mut dyn Input,
        body_input: &mut dyn Input,
    ) -> Result<Program, ParseError> {
        let (ast, body) = parser::parse_function(name, params_input, body_input, &mut self.interner, self.compat)?;
        Ok(Program {
            ast: Rc::new(ast),
            body,
        })
    }

    // ----- execution entry points -----

    /// Runs a parsed program in the global context and returns its
    /// completion value (the §12 chained value of its statement list).
    pub fn run_program(&mut self, program: &Program) -> Result<Value, Exception> {
        let ctx = self.global_context();
        let result = self
            .run_body(
                &program.ast,
                program.body,
                &ctx,
                Attr::DONT_DELETE,
                crate::function::BodyKind::Program,
            )
            .map(|completion| completion.value.unwrap_or(Value::Undefined));
        self.finish(result)
    }

    /// Parses and runs a script at Global: the embedding convenience that
    /// covers most hosts.
    pub fn global_eval(&mut self, source: &str) -> Result<Value, Exception> {
        let mut input = StringInput::new(source);
        self.global_eval_input(&mut input)
    }

    /// [`Interp::global_eval`] over an arbitrary input source.
    pub fn global_eval_input(&mut self, input: &mut dyn Input) -> Result<Value, Exception> {
        let program = match self.parse_program(input) {
            Ok(p) => p,
            Err(e) => {
                let err = self.parse_error_value(&e);
                return self.finish::<Value>(Err(err));
            }
        };
        self.run_program(&program)
    }

    /// Instantiates a parsed function-form program as a callable Function
    /// object closing over Global.
    pub fn instantiate_program(&mut self, program: &Program) -> ObjectId {
        let scope = ScopeChain::root(self.global);
        self.instantiate_function(&program.ast, program.body, &scope)
    }

    /// The execution context for global code (§10.2.1).
    #[must_use]
    pub(crate) fn global_context(&self) -> Context {
        Context {
            this: self.global,
            scope: ScopeChain::root(self.global),
            variable: self.global,
            var_attrs: Attr::DONT_DELETE,
        }
    }

    /// Converts an internal result into the embedding-facing form,
    /// rendering uncaught throws and restoring interpreter invariants.
    pub(crate) fn finish<T>(&mut self, result: RunResult<T>) -> Result<T, Exception> {
        self.traceback.clear();
        self.call_depth = 0;
        result.map_err(|err| self.render_exception(err))
    }

    /// Renders a value for host display via ToString; a hostile
    /// `toString` surfaces as the exception it threw.
    pub fn display_value(&mut self, value: &Value) -> Result<String, Exception> {
        let result = self.to_string_value(value).map(|s| s.to_string());
        self.finish(result)
    }

    // ----- error construction -----

    /// Builds a native error object of the given kind (§15.11 shape: a
    /// plain object with `name` and `message`).
    pub(crate) fn make_error(&mut self, kind: ErrorKind, message: &str) -> ObjectId {
        let proto_index = ErrorKind::ALL.iter().position(|k| *k == kind).expect("kind listed");
        let proto = self.protos.errors[proto_index];
        let id = self.heap.alloc(Object::new(Class::Error, Some(proto)));
        let name_val = Value::Str(JsString::from_str_slice(&kind.to_string()));
        let msg_val = Value::Str(JsString::from_str_slice(message));
        let obj = self.heap.get_mut(id);
        obj.define(WellKnown::Name.into(), name_val, Attr::DONT_ENUM);
        obj.define(WellKnown::Message.into(), msg_val, Attr::DONT_ENUM);
        id
    }

    /// Raises a native error as a throw.
    pub fn throw_error(&mut self, kind: ErrorKind, message: &str) -> RunError {
        let id = self.make_error(kind, message);
        RunError {
            value: Value::Object(id),
            location: Some(self.current_loc),
            traceback: self.traceback.clone(),
        }
    }

    pub(crate) fn type_error(&mut self, message: &str) -> RunError {
        self.throw_error(ErrorKind::TypeError, message)
    }

    pub(crate) fn reference_error(&mut self, message: &str) -> RunError {
        self.throw_error(ErrorKind::ReferenceError, message)
    }

    pub(crate) fn range_error(&mut self, message: &str) -> RunError {
        self.throw_error(ErrorKind::RangeError, message)
    }

    /// Wraps a value for throwing, capturing the current location and
    /// traceback. Host natives raise by returning `Err(interp.throw_value(v))`
    /// (or one of the typed helpers), which is this engine's rendition of
    /// a `try_enter`/`throw` pair: `?` is the unwinding.
    pub fn throw_value(&mut self, value: Value) -> RunError {
        RunError {
            value,
            location: Some(self.current_loc),
            traceback: self.traceback.clone(),
        }
    }

    /// Converts a parse failure into a throwable SyntaxError value, used by
    /// `eval` and the `Function` constructor where script observes parse
    /// errors as exceptions.
    pub(crate) fn parse_error_value(&mut self, err: &ParseError) -> RunError {
        let mut e = self.throw_error(ErrorKind::SyntaxError, &err.message);
        e.location = Some(CodeLoc { line: err.line });
        e
    }

    /// Renders an uncaught throw for the host.
    pub(crate) fn render_exception(&mut self, err: RunError) -> Exception {
        let message = self.describe_thrown(&err.value);
        let frames = err
            .traceback
            .iter()
            .map(|frame: &TracebackFrame| StackFrame {
                callee: frame
                    .callee
                    .map_or_else(|| "<anonymous>".to_owned(), |id| self.interner.get(id).to_string()),
                line: frame.location.line,
                kind: frame.kind,
            })
            .collect();
        Exception {
            message,
            location: err.location,
            frames,
        }
    }

    /// Best-effort rendering of a thrown value without re-entering script:
    /// error objects print as `name: message`, everything else through the
    /// primitive display form.
    fn describe_thrown(&mut self, value: &Value) -> String {
        if let Value::Object(id) = value {
            let obj = self.heap.get(*id);
            if obj.class == Class::Error {
                let name = obj
                    .own(WellKnown::Name.into())
                    .map(|p| p.value.clone())
                    .unwrap_or(Value::Undefined);
                let message = obj
                    .own(WellKnown::Message.into())
                    .map(|p| p.value.clone())
                    .unwrap_or(Value::Undefined);
                let name = match name {
                    Value::Str(s) => s.to_string(),
                    _ => "Error".to_owned(),
                };
                return match message {
                    Value::Str(s) if !s.is_empty() => format!("{name}: {s}"),
                    _ => name,
                };
            }
            return format!("uncaught object ({} instance)", obj.class);
        }
        crate::value::describe_primitive(value)
    }

    // ----- small object helpers shared by the engine -----

    /// Allocates a plain object with `Object.prototype`.
    pub(crate) fn new_object(&mut self) -> ObjectId {
        let proto = self.protos.object;
        self.heap.alloc(Object::new(Class::Object, Some(proto)))
    }

    /// Allocates an array instance (length 0).
    pub(crate) fn new_array(&mut self) -> ObjectId {
        let proto = self.protos.array;
        let id = self.heap.alloc(Object::new(Class::Array, Some(proto)));
        self.heap.get_mut(id).define(
            WellKnown::Length.into(),
            Value::Number(0.0),
            Attr::DONT_ENUM | Attr::DONT_DELETE,
        );
        id
    }

    /// Allocates a RegExp instance carrying its source and flags text.
    /// Pattern compilation is a host concern; the core only preserves the
    /// literal.
    pub(crate) fn new_regex(&mut self, body: &JsString, flags: &JsString) -> ObjectId {
        let proto = self.protos.object;
        let id = self.heap.alloc(Object::new(Class::RegExp, Some(proto)));
        let obj = self.heap.get_mut(id);
        obj.define(
            WellKnown::Source.into(),
            Value::Str(body.clone()),
            Attr::READ_ONLY | Attr::DONT_ENUM | Attr::DONT_DELETE,
        );
        obj.define(
            WellKnown::Flags.into(),
            Value::Str(flags.clone()),
            Attr::READ_ONLY | Attr::DONT_ENUM | Attr::DONT_DELETE,
        );
        obj.define(WellKnown::LastIndex.into(), Value::Number(0.0), Attr::DONT_ENUM | Attr::DONT_DELETE);
        id
    }

    /// Allocates a host-native function object: class "Function", `length`
    /// from the declared arity, no [[Construct]] unless one is supplied.
    pub fn new_native(
        &mut self,
        name: StringId,
        length: u8,
        call: crate::object::NativeFn,
        construct: Option<crate::object::NativeFn>,
    ) -> ObjectId {
        let proto = self.protos.function;
        let data = ObjectData::Native(crate::object::NativeFunc {
            name,
            length,
            call,
            construct,
        });
        let id = self.heap.alloc(Object::with_data(Class::Function, Some(proto), data));
        self.heap.get_mut(id).define(
            WellKnown::Length.into(),
            Value::Number(f64::from(length)),
            Attr::READ_ONLY | Attr::DONT_ENUM | Attr::DONT_DELETE,
        );
        id
    }
}
