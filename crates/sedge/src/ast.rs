//! The abstract syntax tree.
//!
//! Nodes live in a flat arena and refer to each other through stable
//! [`NodeId`] indices; the tree is immutable once parsing finishes.
//! Break/continue targets are resolved by the parser to node indices, so
//! the evaluator never re-resolves labels at runtime.
//!
//! Each node supports a constant-value predicate (`is_const`) with a
//! memoized evaluation (`const_value`). Folding is observational: it only
//! answers for expressions whose value is fully determined by the source
//! text, and it never widens what the evaluator would accept.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;

use crate::{
    bytecode::Code,
    intern::StringId,
    string::JsString,
    value::{self, Value},
};

/// Index of a node in the AST arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a function descriptor in the AST's function pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }
}

/// Prefix operators (§11.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Delete,
    Void,
    TypeOf,
    PreInc,
    PreDec,
    Plus,
    Minus,
    BitNot,
    Not,
}

/// Postfix `++`/`--` (§11.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
}

/// Binary operators in §11.5–§11.10 source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Ushr,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    InstanceOf,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    BitAnd,
    BitXor,
    BitOr,
}

/// Short-circuiting operators (§11.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// One declarator of a `var` statement.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: StringId,
    pub init: Option<NodeId>,
}

/// The left-hand side of `for (… in …)`.
#[derive(Debug, Clone)]
pub enum ForInLeft {
    /// `for (lhs in o)` — any LeftHandSideExpression.
    Expr(NodeId),
    /// `for (var name [= init] in o)`.
    Var { name: StringId, init: Option<NodeId> },
}

/// `catch (name) { … }`.
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub name: StringId,
    pub body: NodeId,
}

/// One `case`/`default` clause; `test` is `None` for `default`.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<NodeId>,
    pub body: Vec<NodeId>,
}

/// Every expression and statement production of §11–§14.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // --- expressions ---
    This,
    Ident(StringId),
    Number(f64),
    StrLit(JsString),
    Regex { body: JsString, flags: JsString },
    NullLit,
    BoolLit(bool),
    /// `None` elements are elisions.
    ArrayLit(Vec<Option<NodeId>>),
    /// Property names are normalized to interned strings at parse time.
    ObjectLit(Vec<(StringId, NodeId)>),
    FunctionExpr(FunctionId),
    Member { object: NodeId, name: StringId },
    Index { object: NodeId, index: NodeId },
    New { callee: NodeId, args: Vec<NodeId> },
    Call { callee: NodeId, args: Vec<NodeId> },
    Postfix { op: UpdateOp, expr: NodeId },
    Unary { op: UnaryOp, expr: NodeId },
    Binary { op: BinaryOp, left: NodeId, right: NodeId },
    Logical { op: LogicalOp, left: NodeId, right: NodeId },
    Cond { test: NodeId, cons: NodeId, alt: NodeId },
    /// `op` is `None` for plain `=`, otherwise the compound operator.
    Assign { target: NodeId, op: Option<BinaryOp>, value: NodeId },
    Comma { left: NodeId, right: NodeId },

    // --- statements ---
    Block(Vec<NodeId>),
    VarStmt(Vec<VarDecl>),
    Empty,
    ExprStmt(NodeId),
    If { test: NodeId, cons: NodeId, alt: Option<NodeId> },
    DoWhile { body: NodeId, test: NodeId },
    While { test: NodeId, body: NodeId },
    For { init: Option<NodeId>, test: Option<NodeId>, step: Option<NodeId>, body: NodeId },
    ForIn { left: ForInLeft, object: NodeId, body: NodeId },
    /// `target` is the loop the parser resolved this jump to; `label` is
    /// kept for the printer only.
    Continue { target: NodeId, label: Option<StringId> },
    Break { target: NodeId, label: Option<StringId> },
    Return(Option<NodeId>),
    With { object: NodeId, body: NodeId },
    Switch { disc: NodeId, cases: Vec<SwitchCase> },
    Labelled { label: StringId, body: NodeId },
    Throw(NodeId),
    Try { block: NodeId, catch: Option<CatchClause>, finally: Option<NodeId> },
    FunctionDecl(FunctionId),
}

/// A node: kind plus source line.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
}

/// The syntactic descriptor of a function (§13), distinct from the runtime
/// Function object that wraps it. The program itself is descriptor zero.
#[derive(Debug)]
pub struct FunctionDef {
    /// Declared or inferred name; `None` for anonymous expressions and for
    /// program code.
    pub name: Option<StringId>,
    pub params: Vec<StringId>,
    /// Source elements in order (including the declarations, which also
    /// appear in `fdecls` for the hoisting pass).
    pub body: Vec<NodeId>,
    /// Every `var`-declared name in the body, in first-occurrence order.
    pub vars: Vec<StringId>,
    /// Function declarations hoisted to the top of the body.
    pub fdecls: Vec<FunctionId>,
    pub line: u32,
}

/// A parsed program or function body: the node arena, the function pool,
/// and per-function compiled bytecode caches.
#[derive(Debug)]
pub struct Ast {
    nodes: Vec<Node>,
    functions: Vec<FunctionDef>,
    pub filename: Option<Rc<str>>,
    const_memo: RefCell<AHashMap<NodeId, Option<Value>>>,
    code_cache: RefCell<Vec<Option<Rc<Code>>>>,
}

impl Ast {
    #[must_use]
    pub fn new(filename: Option<Rc<str>>) -> Self {
        Self {
            nodes: Vec::with_capacity(64),
            functions: Vec::new(),
            filename,
            const_memo: RefCell::new(AHashMap::new()),
            code_cache: RefCell::new(Vec::new()),
        }
    }

    /// Allocates a node.
    pub fn alloc(&mut self, kind: NodeKind, line: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, line });
        id
    }

    /// Reserves a slot whose kind is filled in later; used when a statement
    /// must know its own id before its body is parsed (loops, labels).
    pub fn reserve(&mut self, line: u32) -> NodeId {
        self.alloc(NodeKind::Empty, line)
    }

    /// Replaces the kind of a reserved node.
    pub fn fill(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    #[inline]
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    #[must_use]
    pub fn line(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].line
    }

    /// Adds a function descriptor and reserves its bytecode cache slot.
    pub fn add_function(&mut self, def: FunctionDef) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(def);
        self.code_cache.borrow_mut().push(None);
        id
    }

    #[must_use]
    pub fn function(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.index()]
    }

    /// Cached compiled form of a function body, if one was produced.
    #[must_use]
    pub fn cached_code(&self, id: FunctionId) -> Option<Rc<Code>> {
        self.code_cache.borrow()[id.index()].clone()
    }

    /// Stores the compiled form of a function body.
    pub fn cache_code(&self, id: FunctionId, code: Rc<Code>) {
        self.code_cache.borrow_mut()[id.index()] = Some(code);
    }

    /// True when the node's value is fully determined by source text.
    #[must_use]
    pub fn is_const(&self, id: NodeId, signed_hex: bool) -> bool {
        self.const_value(id, signed_hex).is_some()
    }

    /// The folded value of a constant expression, memoized per node.
    ///
    /// `signed_hex` mirrors the EXT1 ToNumber extension so folding agrees
    /// with runtime conversion of string operands.
    #[must_use]
    pub fn const_value(&self, id: NodeId, signed_hex: bool) -> Option<Value> {
        if let Some(memo) = self.const_memo.borrow().get(&id) {
            return memo.clone();
        }
        let computed = self.fold(id, signed_hex);
        self.const_memo.borrow_mut().insert(id, computed.clone());
        computed
    }

    fn fold(&self, id: NodeId, signed_hex: bool) -> Option<Value> {
        match self.kind(id) {
            NodeKind::Number(n) => Some(Value::Number(*n)),
            NodeKind::StrLit(s) => Some(Value::Str(s.clone())),
            NodeKind::NullLit => Some(Value::Null),
            NodeKind::BoolLit(b) => Some(Value::Bool(*b)),
            NodeKind::Unary { op, expr } => {
                let v = self.const_value(*expr, signed_hex)?;
                match op {
                    UnaryOp::Void => Some(Value::Undefined),
                    UnaryOp::Plus => Some(Value::Number(prim_to_number(&v, signed_hex)?)),
                    UnaryOp::Minus => Some(Value::Number(-prim_to_number(&v, signed_hex)?)),
                    UnaryOp::BitNot => Some(Value::Number(f64::from(!value::to_int32(prim_to_number(&v, signed_hex)?)))),
                    UnaryOp::Not => Some(Value::Bool(!v.to_boolean())),
                    // delete/typeof/++/-- need references
                    _ => None,
                }
            }
            NodeKind::Binary { op, left, right } => {
                let l = self.const_value(*left, signed_hex)?;
                let r = self.const_value(*right, signed_hex)?;
                fold_binary(*op, &l, &r, signed_hex)
            }
            NodeKind::Logical { op, left, right } => {
                // the guard alone may decide constness
                let l = self.const_value(*left, signed_hex)?;
                let taken = match op {
                    LogicalOp::And => l.to_boolean(),
                    LogicalOp::Or => !l.to_boolean(),
                };
                if taken {
                    self.const_value(*right, signed_hex)
                } else {
                    Some(l)
                }
            }
            NodeKind::Cond { test, cons, alt } => {
                let t = self.const_value(*test, signed_hex)?;
                if t.to_boolean() {
                    self.const_value(*cons, signed_hex)
                } else {
                    self.const_value(*alt, signed_hex)
                }
            }
            NodeKind::Comma { left, right } => {
                self.const_value(*left, signed_hex)?;
                self.const_value(*right, signed_hex)
            }
            _ => None,
        }
    }
}

/// ToNumber restricted to primitives; `None` for objects (which need
/// DefaultValue and therefore the heap).
fn prim_to_number(v: &Value, signed_hex: bool) -> Option<f64> {
    match v {
        Value::Undefined => Some(f64::NAN),
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Some(*n),
        Value::Str(s) => Some(value::string_to_number(s, signed_hex)),
        Value::Object(_) => None,
    }
}

fn fold_binary(op: BinaryOp, l: &Value, r: &Value, signed_hex: bool) -> Option<Value> {
    use BinaryOp as B;
    let num = |v: &Value| prim_to_number(v, signed_hex);
    Some(match op {
        B::Mul => Value::Number(num(l)? * num(r)?),
        B::Div => Value::Number(num(l)? / num(r)?),
        B::Mod => Value::Number(ecma_rem(num(l)?, num(r)?)),
        B::Sub => Value::Number(num(l)? - num(r)?),
        B::Add => match (l, r) {
            (Value::Str(a), b) => Value::Str(JsString::concat(a, &prim_to_string(b)?)),
            (a, Value::Str(b)) => Value::Str(JsString::concat(&prim_to_string(a)?, b)),
            (a, b) => Value::Number(num(a)? + num(b)?),
        },
        B::Shl => Value::Number(f64::from(value::to_int32(num(l)?) << (value::to_uint32(num(r)?) & 31))),
        B::Shr => Value::Number(f64::from(value::to_int32(num(l)?) >> (value::to_uint32(num(r)?) & 31))),
        B::Ushr => Value::Number(f64::from(value::to_uint32(num(l)?) >> (value::to_uint32(num(r)?) & 31))),
        B::Lt => fold_relational(l, r, signed_hex, false)?,
        B::Gt => fold_relational(r, l, signed_hex, false)?,
        B::Le => fold_relational(r, l, signed_hex, true)?,
        B::Ge => fold_relational(l, r, signed_hex, true)?,
        B::Eq => Value::Bool(prim_loose_equals(l, r, signed_hex)?),
        B::Ne => Value::Bool(!prim_loose_equals(l, r, signed_hex)?),
        B::StrictEq => Value::Bool(prim_strict_equals(l, r)),
        B::StrictNe => Value::Bool(!prim_strict_equals(l, r)),
        B::BitAnd => Value::Number(f64::from(value::to_int32(num(l)?) & value::to_int32(num(r)?))),
        B::BitXor => Value::Number(f64::from(value::to_int32(num(l)?) ^ value::to_int32(num(r)?))),
        B::BitOr => Value::Number(f64::from(value::to_int32(num(l)?) | value::to_int32(num(r)?))),
        // need the object graph
        B::In | B::InstanceOf => return None,
    })
}

/// §11.6.3 `%`: IEEE remainder with the sign of the dividend, which is what
/// Rust's `%` computes.
pub(crate) fn ecma_rem(l: f64, r: f64) -> f64 {
    l % r
}

fn prim_to_string(v: &Value) -> Option<JsString> {
    match v {
        Value::Undefined => Some(JsString::from_str_slice("undefined")),
        Value::Null => Some(JsString::from_str_slice("null")),
        Value::Bool(true) => Some(JsString::from_str_slice("true")),
        Value::Bool(false) => Some(JsString::from_str_slice("false")),
        Value::Number(n) => Some(value::number_to_string(*n)),
        Value::Str(s) => Some(s.clone()),
        Value::Object(_) => None,
    }
}

/// §11.8.5 on primitives. `negate_undefined` handles `<=`/`>=`, which treat
/// an undefined comparison result as false after negation.
fn fold_relational(l: &Value, r: &Value, signed_hex: bool, negated: bool) -> Option<Value> {
    let raw = match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.compare(b) == std::cmp::Ordering::Less),
        (a, b) => {
            let (x, y) = (prim_to_number(a, signed_hex)?, prim_to_number(b, signed_hex)?);
            if x.is_nan() || y.is_nan() { None } else { Some(x < y) }
        }
    };
    Some(Value::Bool(match raw {
        None => false,
        Some(b) => {
            if negated {
                !b
            } else {
                b
            }
        }
    }))
}

fn prim_strict_equals(l: &Value, r: &Value) -> bool {
    std::mem::discriminant(l) == std::mem::discriminant(r) && l.same_type_equals(r)
}

/// §11.9.3 restricted to primitives; `None` when an object operand would
/// require ToPrimitive.
fn prim_loose_equals(l: &Value, r: &Value, signed_hex: bool) -> Option<bool> {
    use Value as V;
    Some(match (l, r) {
        (V::Object(_), _) | (_, V::Object(_)) => return None,
        (V::Undefined | V::Null, V::Undefined | V::Null) => true,
        (V::Number(a), V::Number(b)) => a == b,
        (V::Str(a), V::Str(b)) => a == b,
        (V::Bool(a), V::Bool(b)) => a == b,
        (V::Number(a), V::Str(b)) => *a == value::string_to_number(b, signed_hex),
        (V::Str(a), V::Number(b)) => value::string_to_number(a, signed_hex) == *b,
        (V::Bool(a), b) => prim_loose_equals(&V::Number(if *a { 1.0 } else { 0.0 }), b, signed_hex)?,
        (a, V::Bool(b)) => prim_loose_equals(a, &V::Number(if *b { 1.0 } else { 0.0 }), signed_hex)?,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ast_with(kinds: impl FnOnce(&mut Ast) -> NodeId) -> (Ast, NodeId) {
        let mut ast = Ast::new(None);
        let id = kinds(&mut ast);
        (ast, id)
    }

    #[test]
    fn literals_are_const() {
        let (ast, id) = ast_with(|a| a.alloc(NodeKind::Number(3.5), 1));
        assert!(ast.is_const(id, false));
    }

    #[test]
    fn identifiers_are_not_const() {
        let (ast, id) = ast_with(|a| a.alloc(NodeKind::Ident(crate::intern::WellKnown::NaN.into()), 1));
        assert!(!ast.is_const(id, false));
    }

    #[test]
    fn binary_folding() {
        let (ast, id) = ast_with(|a| {
            let one = a.alloc(NodeKind::Number(1.0), 1);
            let two = a.alloc(NodeKind::Number(2.0), 1);
            a.alloc(NodeKind::Binary { op: BinaryOp::Add, left: one, right: two }, 1)
        });
        assert!(matches!(ast.const_value(id, false), Some(Value::Number(n)) if n == 3.0));
    }

    #[test]
    fn short_circuit_guard_decides_constness() {
        // false && <non-const> is still const
        let (ast, id) = ast_with(|a| {
            let guard = a.alloc(NodeKind::BoolLit(false), 1);
            let ident = a.alloc(NodeKind::Ident(crate::intern::WellKnown::NaN.into()), 1);
            a.alloc(NodeKind::Logical { op: LogicalOp::And, left: guard, right: ident }, 1)
        });
        assert!(matches!(ast.const_value(id, false), Some(Value::Bool(false))));
    }

    #[test]
    fn string_concat_folds() {
        let (ast, id) = ast_with(|a| {
            let s = a.alloc(NodeKind::StrLit(JsString::from_str_slice("a")), 1);
            let n = a.alloc(NodeKind::Number(1.0), 1);
            a.alloc(NodeKind::Binary { op: BinaryOp::Add, left: s, right: n }, 1)
        });
        let Some(Value::Str(s)) = ast.const_value(id, false) else {
            panic!("expected folded string");
        };
        assert_eq!(s.to_utf8().unwrap(), "a1");
    }

    #[test]
    fn relational_nan_folds_false() {
        let (ast, id) = ast_with(|a| {
            let nan = a.alloc(NodeKind::Number(f64::NAN), 1);
            let one = a.alloc(NodeKind::Number(1.0), 1);
            a.alloc(NodeKind::Binary { op: BinaryOp::Le, left: nan, right: one }, 1)
        });
        assert!(matches!(ast.const_value(id, false), Some(Value::Bool(false))));
    }
}
