//! Source printer.
//!
//! Renders any AST node back to source text. The output is canonical rather
//! than faithful: expressions come back fully parenthesized and literals in
//! their normalized spelling, but re-parsing printed output yields a tree
//! with identical semantics. `Function.prototype.toString` is built on
//! this.

use std::fmt::Write;

use crate::{
    ast::{Ast, BinaryOp, ForInLeft, FunctionId, LogicalOp, NodeId, NodeKind, UnaryOp, UpdateOp},
    intern::{Interner, StringId},
    value::number_to_std_string,
};

/// Renders a function descriptor as a `function` expression/declaration.
#[must_use]
pub fn print_function(ast: &Ast, interner: &Interner, id: FunctionId) -> String {
    let mut p = Printer::new(ast, interner);
    p.function(id);
    p.out
}

/// Renders a single statement or expression node.
#[must_use]
pub fn print_node(ast: &Ast, interner: &Interner, id: NodeId) -> String {
    let mut p = Printer::new(ast, interner);
    p.node(id);
    p.out
}

struct Printer<'a> {
    ast: &'a Ast,
    interner: &'a Interner,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn new(ast: &'a Ast, interner: &'a Interner) -> Self {
        Self {
            ast,
            interner,
            out: String::new(),
            indent: 0,
        }
    }

    fn name(&mut self, id: StringId) {
        let s = self.interner.get(id).to_string();
        self.out.push_str(&s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn function(&mut self, id: FunctionId) {
        let def = self.ast.function(id);
        self.out.push_str("function ");
        if let Some(name) = def.name {
            self.name(name);
        }
        self.out.push('(');
        for (i, &param) in def.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.name(param);
        }
        self.out.push_str(") {");
        self.indent += 1;
        let body: Vec<NodeId> = def.body.clone();
        for stmt in body {
            self.newline();
            self.node(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    fn node(&mut self, id: NodeId) {
        match self.ast.kind(id).clone() {
            // expressions
            NodeKind::This => self.out.push_str("this"),
            NodeKind::Ident(name) => self.name(name),
            NodeKind::Number(n) => {
                let _ = write!(self.out, "{}", number_to_std_string(n));
            }
            NodeKind::StrLit(s) => self.out.push_str(&s.to_literal()),
            NodeKind::Regex { body, flags } => {
                let _ = write!(self.out, "/{body}/{flags}");
            }
            NodeKind::NullLit => self.out.push_str("null"),
            NodeKind::BoolLit(b) => self.out.push_str(if b { "true" } else { "false" }),
            NodeKind::ArrayLit(elements) => {
                self.out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match element {
                        Some(e) => self.node(*e),
                        // a hole prints as nothing between commas
                        None => {}
                    }
                }
                // a trailing hole needs its comma kept
                if matches!(elements.last(), Some(None)) {
                    self.out.push(',');
                }
                self.out.push(']');
            }
            NodeKind::ObjectLit(props) => {
                // always parenthesized so the printout is valid in
                // statement position too
                self.out.push_str("({");
                for (i, (name, value)) in props.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.name(*name);
                    self.out.push_str(": ");
                    self.node(*value);
                }
                self.out.push_str("})");
            }
            NodeKind::FunctionExpr(f) => {
                self.out.push('(');
                self.function(f);
                self.out.push(')');
            }
            NodeKind::Member { object, name } => {
                self.node(object);
                self.out.push('.');
                self.name(name);
            }
            NodeKind::Index { object, index } => {
                self.node(object);
                self.out.push('[');
                self.node(index);
                self.out.push(']');
            }
            NodeKind::New { callee, args } => {
                self.out.push_str("new ");
                self.node(callee);
                self.arg_list(&args);
            }
            NodeKind::Call { callee, args } => {
                self.node(callee);
                self.arg_list(&args);
            }
            NodeKind::Postfix { op, expr } => {
                self.out.push('(');
                self.node(expr);
                self.out.push_str(match op {
                    UpdateOp::Inc => "++",
                    UpdateOp::Dec => "--",
                });
                self.out.push(')');
            }
            NodeKind::Unary { op, expr } => {
                self.out.push('(');
                self.out.push_str(unary_text(op));
                self.node(expr);
                self.out.push(')');
            }
            NodeKind::Binary { op, left, right } => {
                self.out.push('(');
                self.node(left);
                let _ = write!(self.out, " {} ", binary_text(op));
                self.node(right);
                self.out.push(')');
            }
            NodeKind::Logical { op, left, right } => {
                self.out.push('(');
                self.node(left);
                self.out.push_str(match op {
                    LogicalOp::And => " && ",
                    LogicalOp::Or => " || ",
                });
                self.node(right);
                self.out.push(')');
            }
            NodeKind::Cond { test, cons, alt } => {
                self.out.push('(');
                self.node(test);
                self.out.push_str(" ? ");
                self.node(cons);
                self.out.push_str(" : ");
                self.node(alt);
                self.out.push(')');
            }
            NodeKind::Assign { target, op, value } => {
                self.out.push('(');
                self.node(target);
                match op {
                    None => self.out.push_str(" = "),
                    Some(op) => {
                        let _ = write!(self.out, " {}= ", binary_text(op));
                    }
                }
                self.node(value);
                self.out.push(')');
            }
            NodeKind::Comma { left, right } => {
                self.out.push('(');
                self.node(left);
                self.out.push_str(", ");
                self.node(right);
                self.out.push(')');
            }

            // statements
            NodeKind::Block(stmts) => {
                self.out.push('{');
                self.indent += 1;
                for stmt in stmts {
                    self.newline();
                    self.node(stmt);
                }
                self.indent -= 1;
                self.newline();
                self.out.push('}');
            }
            NodeKind::VarStmt(decls) => {
                self.out.push_str("var ");
                for (i, decl) in decls.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.name(decl.name);
                    if let Some(init) = decl.init {
                        self.out.push_str(" = ");
                        self.node(init);
                    }
                }
                self.out.push(';');
            }
            NodeKind::Empty => self.out.push(';'),
            NodeKind::ExprStmt(expr) => {
                self.node(expr);
                self.out.push(';');
            }
            NodeKind::If { test, cons, alt } => {
                self.out.push_str("if (");
                self.node(test);
                self.out.push_str(") ");
                self.node(cons);
                if let Some(alt) = alt {
                    self.out.push_str(" else ");
                    self.node(alt);
                }
            }
            NodeKind::DoWhile { body, test } => {
                self.out.push_str("do ");
                self.node(body);
                self.out.push_str(" while (");
                self.node(test);
                self.out.push_str(");");
            }
            NodeKind::While { test, body } => {
                self.out.push_str("while (");
                self.node(test);
                self.out.push_str(") ");
                self.node(body);
            }
            NodeKind::For { init, test, step, body } => {
                self.out.push_str("for (");
                if let Some(init) = init {
                    // a var-statement init prints its own semicolon
                    match self.ast.kind(init) {
                        NodeKind::VarStmt(_) => self.node(init),
                        _ => {
                            self.node(init);
                            self.out.push(';');
                        }
                    }
                } else {
                    self.out.push(';');
                }
                self.out.push(' ');
                if let Some(test) = test {
                    self.node(test);
                }
                self.out.push_str("; ");
                if let Some(step) = step {
                    self.node(step);
                }
                self.out.push_str(") ");
                self.node(body);
            }
            NodeKind::ForIn { left, object, body } => {
                self.out.push_str("for (");
                match left {
                    ForInLeft::Expr(e) => self.node(e),
                    ForInLeft::Var { name, init } => {
                        self.out.push_str("var ");
                        self.name(name);
                        if let Some(init) = init {
                            self.out.push_str(" = ");
                            self.node(init);
                        }
                    }
                }
                self.out.push_str(" in ");
                self.node(object);
                self.out.push_str(") ");
                self.node(body);
            }
            NodeKind::Continue { label, .. } => {
                self.out.push_str("continue");
                if let Some(label) = label {
                    self.out.push(' ');
                    self.name(label);
                }
                self.out.push(';');
            }
            NodeKind::Break { label, .. } => {
                self.out.push_str("break");
                if let Some(label) = label {
                    self.out.push(' ');
                    self.name(label);
                }
                self.out.push(';');
            }
            NodeKind::Return(expr) => {
                self.out.push_str("return");
                if let Some(expr) = expr {
                    self.out.push(' ');
                    self.node(expr);
                }
                self.out.push(';');
            }
            NodeKind::With { object, body } => {
                self.out.push_str("with (");
                self.node(object);
                self.out.push_str(") ");
                self.node(body);
            }
            NodeKind::Switch { disc, cases } => {
                self.out.push_str("switch (");
                self.node(disc);
                self.out.push_str(") {");
                self.indent += 1;
                for case in cases {
                    self.newline();
                    match case.test {
                        Some(test) => {
                            self.out.push_str("case ");
                            self.node(test);
                            self.out.push(':');
                        }
                        None => self.out.push_str("default:"),
                    }
                    self.indent += 1;
                    for stmt in case.body {
                        self.newline();
                        self.node(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.newline();
                self.out.push('}');
            }
            NodeKind::Labelled { label, body } => {
                self.name(label);
                self.out.push_str(": ");
                self.node(body);
            }
            NodeKind::Throw(expr) => {
                self.out.push_str("throw ");
                self.node(expr);
                self.out.push(';');
            }
            NodeKind::Try { block, catch, finally } => {
                self.out.push_str("try ");
                self.node(block);
                if let Some(catch) = catch {
                    self.out.push_str(" catch (");
                    self.name(catch.name);
                    self.out.push_str(") ");
                    self.node(catch.body);
                }
                if let Some(finally) = finally {
                    self.out.push_str(" finally ");
                    self.node(finally);
                }
            }
            NodeKind::FunctionDecl(f) => self.function(f),
        }
    }

    fn arg_list(&mut self, args: &[NodeId]) {
        self.out.push('(');
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.node(arg);
        }
        self.out.push(')');
    }
}

fn unary_text(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Delete => "delete ",
        UnaryOp::Void => "void ",
        UnaryOp::TypeOf => "typeof ",
        UnaryOp::PreInc => "++",
        UnaryOp::PreDec => "--",
        UnaryOp::Plus => "+",
        UnaryOp::Minus => "-",
        UnaryOp::BitNot => "~",
        UnaryOp::Not => "!",
    }
}

fn binary_text(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Ushr => ">>>",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::In => "in",
        BinaryOp::InstanceOf => "instanceof",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::StrictEq => "===",
        BinaryOp::StrictNe => "!==",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitXor => "^",
        BinaryOp::BitOr => "|",
    }
}
