//! Recursive-descent parser for §11–§14.
//!
//! Two-token lookahead over a small token ring; the grammar state the
//! productions share (`noin`, `funcdepth`, the label stack, the current
//! function's `var` list) lives in explicit parser fields.
//!
//! Automatic semicolon insertion is implemented at the single
//! [`Parser::semicolon`] choke point: a required `;` is satisfied by a real
//! semicolon, a closing `}`, end of input, or a token that follows a
//! LineTerminator. The restricted productions (`return`, `throw`, `break`,
//! `continue`, postfix `++`/`--`) consult the token's newline bit directly.
//!
//! `break` and `continue` are resolved to their target statement *at parse
//! time*: the label stack maps label names (plus the two implicit per-loop
//! entries) to reserved node indices, so the evaluator and the bytecode
//! compiler never see an unresolved jump.

use std::rc::Rc;

use crate::{
    ast::{
        Ast, BinaryOp, CatchClause, ForInLeft, FunctionDef, FunctionId, LogicalOp, NodeId, NodeKind, SwitchCase,
        UnaryOp, UpdateOp, VarDecl,
    },
    compat::Compat,
    error::ParseError,
    input::Input,
    intern::{Interner, StringId},
    lexer::{Keyword, Lexer, Token, TokenKind},
    value::number_to_std_string,
};

/// Parses a complete program (§14). Returns the AST together with the
/// program's own function descriptor (its body, `var` list and hoisted
/// declarations).
pub fn parse_program(
    input: &mut dyn Input,
    interner: &mut Interner,
    compat: Compat,
) -> Result<(Ast, FunctionId), ParseError> {
    let filename: Option<Rc<str>> = input.filename().map(Rc::from);
    let mut parser = Parser::new(input, interner, compat, filename);
    parser.program()
}

/// Parses the `Function(p1, …, pn, body)` form (§15.3.2.1): a parameter
/// list from one input and a function body from another.
pub fn parse_function(
    name: Option<StringId>,
    params_input: &mut dyn Input,
    body_input: &mut dyn Input,
    interner: &mut Interner,
    compat: Compat,
) -> Result<(Ast, FunctionId), ParseError> {
    // scan the parameter list: identifiers separated by commas
    let mut params = Vec::new();
    {
        let mut lexer = Lexer::new(params_input, compat);
        let mut expect_name = false;
        loop {
            let tok = lexer.next_token(interner)?;
            match tok.kind {
                TokenKind::Eof => {
                    if expect_name {
                        return Err(ParseError::new("expected parameter name", tok.line));
                    }
                    break;
                }
                TokenKind::Ident(id) => {
                    params.push(id);
                    let sep = lexer.next_token(interner)?;
                    match sep.kind {
                        TokenKind::Comma => expect_name = true,
                        TokenKind::Eof => break,
                        other => {
                            return Err(ParseError::new(format!("expected ',' in parameter list, found '{other}'"), sep.line));
                        }
                    }
                }
                other => return Err(ParseError::new(format!("expected parameter name, found '{other}'"), tok.line)),
            }
        }
    }

    let filename: Option<Rc<str>> = body_input.filename().map(Rc::from);
    let mut parser = Parser::new(body_input, interner, compat, filename);
    parser.funcdepth = 1;
    let body = parser.source_elements(true)?;
    parser.expect(TokenKind::Eof)?;
    let def = FunctionDef {
        name,
        params,
        body,
        vars: std::mem::take(&mut parser.vars),
        fdecls: std::mem::take(&mut parser.fdecls),
        line: 1,
    };
    let id = parser.ast.add_function(def);
    Ok((parser.ast, id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelName {
    /// Target of a plain `continue`.
    ImplicitContinue,
    /// Target of a plain `break`.
    ImplicitBreak,
    Named(StringId),
}

#[derive(Debug)]
struct Label {
    name: LabelName,
    target: NodeId,
    /// True when the target is a loop, making it valid for `continue`.
    iterative: bool,
    /// A named label directly in front of a loop or switch gets re-pointed
    /// at the loop node when the loop parser starts; until then it targets
    /// the labelled statement itself.
    unbound: bool,
}

struct Parser<'a, 'i> {
    lexer: Lexer<'a>,
    interner: &'i mut Interner,
    ast: Ast,
    ring: Vec<Token>,
    noin: bool,
    funcdepth: u32,
    labels: Vec<Label>,
    vars: Vec<StringId>,
    fdecls: Vec<FunctionId>,
}

impl<'a, 'i> Parser<'a, 'i> {
    fn new(input: &'a mut dyn Input, interner: &'i mut Interner, compat: Compat, filename: Option<Rc<str>>) -> Self {
        Self {
            lexer: Lexer::new(input, compat),
            interner,
            ast: Ast::new(filename),
            ring: Vec::with_capacity(3),
            noin: false,
            funcdepth: 0,
            labels: Vec::new(),
            vars: Vec::new(),
            fdecls: Vec::new(),
        }
    }

    // ----- token plumbing -----

    fn fill(&mut self, n: usize) -> Result<(), ParseError> {
        while self.ring.len() <= n {
            let tok = self.lexer.next_token(self.interner)?;
            self.ring.push(tok);
        }
        Ok(())
    }

    fn tok(&mut self, i: usize) -> Result<&Token, ParseError> {
        self.fill(i)?;
        Ok(&self.ring[i])
    }

    fn kind0(&mut self) -> Result<&TokenKind, ParseError> {
        Ok(&self.tok(0)?.kind)
    }

    fn line0(&mut self) -> Result<u32, ParseError> {
        Ok(self.tok(0)?.line)
    }

    fn newline0(&mut self) -> Result<bool, ParseError> {
        Ok(self.tok(0)?.follows_newline)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        self.fill(0)?;
        Ok(self.ring.remove(0))
    }

    fn at(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        Ok(self.kind0()? == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if self.at(kind)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(&kind)? {
            self.advance()
        } else {
            let found = self.kind0()?.to_string();
            let line = self.line0()?;
            Err(ParseError::new(format!("expected '{kind}', found '{found}'"), line))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, ParseError> {
        self.expect(TokenKind::Keyword(keyword))
    }

    fn expect_ident(&mut self) -> Result<StringId, ParseError> {
        match self.kind0()? {
            TokenKind::Ident(_) => {
                let tok = self.advance()?;
                let TokenKind::Ident(id) = tok.kind else { unreachable!() };
                Ok(id)
            }
            other => {
                let msg = format!("expected identifier, found '{other}'");
                let line = self.line0()?;
                Err(ParseError::new(msg, line))
            }
        }
    }

    fn error_here(&mut self, message: impl Into<String>) -> ParseError {
        let line = self.tok(0).map_or_else(|e| e.line, |t| t.line);
        ParseError::new(message, line)
    }

    /// Consumes a required `;`, applying automatic semicolon insertion.
    fn semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Semi)? {
            return Ok(());
        }
        // §7.9.1: insertion before `}`, at end of input, and after a
        // LineTerminator
        if self.at(&TokenKind::RBrace)? || self.at(&TokenKind::Eof)? || self.newline0()? {
            return Ok(());
        }
        let found = self.kind0()?.to_string();
        Err(self.error_here(format!("expected ';', found '{found}'")))
    }

    // ----- labels -----

    /// Rebinds the unbound named labels directly enclosing a loop or switch
    /// to the statement's node, so `continue lbl`/`break lbl` resolve to it.
    fn bind_labels(&mut self, target: NodeId, iterative: bool) {
        for label in self.labels.iter_mut().rev() {
            if !label.unbound {
                break;
            }
            label.target = target;
            label.iterative = iterative;
            label.unbound = false;
        }
    }

    fn push_implicit(&mut self, target: NodeId) {
        self.labels.push(Label {
            name: LabelName::ImplicitContinue,
            target,
            iterative: true,
            unbound: false,
        });
        self.labels.push(Label {
            name: LabelName::ImplicitBreak,
            target,
            iterative: false,
            unbound: false,
        });
    }

    fn pop_labels(&mut self, n: usize) {
        for _ in 0..n {
            self.labels.pop();
        }
    }

    fn find_label(&self, name: LabelName) -> Option<&Label> {
        self.labels.iter().rev().find(|l| l.name == name)
    }

    // ----- program structure -----

    fn program(&mut self) -> Result<(Ast, FunctionId), ParseError> {
        let body = self.source_elements(false)?;
        self.expect(TokenKind::Eof)?;
        let def = FunctionDef {
            name: None,
            params: Vec::new(),
            body,
            vars: std::mem::take(&mut self.vars),
            fdecls: std::mem::take(&mut self.fdecls),
            line: 1,
        };
        let id = self.ast.add_function(def);
        let ast = std::mem::replace(&mut self.ast, Ast::new(None));
        Ok((ast, id))
    }

    /// SourceElements: statements plus function declarations. `in_function`
    /// stops at `}` rather than end of input.
    fn source_elements(&mut self, in_function: bool) -> Result<Vec<NodeId>, ParseError> {
        let mut elements = Vec::new();
        loop {
            if self.at(&TokenKind::Eof)? || (in_function && self.at(&TokenKind::RBrace)?) {
                break;
            }
            if self.at(&TokenKind::Keyword(Keyword::Function))? {
                let line = self.line0()?;
                let fid = self.function_definition(true)?;
                self.fdecls.push(fid);
                elements.push(self.ast.alloc(NodeKind::FunctionDecl(fid), line));
            } else {
                elements.push(self.statement()?);
            }
        }
        Ok(elements)
    }

    /// `function name? ( params ) { body }`; saves and restores the
    /// per-function parser state around the body.
    fn function_definition(&mut self, name_required: bool) -> Result<FunctionId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Function)?;
        let name = if matches!(self.kind0()?, TokenKind::Ident(_)) {
            Some(self.expect_ident()?)
        } else if name_required {
            return Err(self.error_here("function declaration requires a name"));
        } else {
            None
        };

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen)? {
            loop {
                params.push(self.expect_ident()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;

        let saved_vars = std::mem::take(&mut self.vars);
        let saved_fdecls = std::mem::take(&mut self.fdecls);
        let saved_labels = std::mem::take(&mut self.labels);
        let saved_noin = std::mem::replace(&mut self.noin, false);
        self.funcdepth += 1;

        let body = self.source_elements(true)?;

        self.funcdepth -= 1;
        self.noin = saved_noin;
        self.labels = saved_labels;
        let vars = std::mem::replace(&mut self.vars, saved_vars);
        let fdecls = std::mem::replace(&mut self.fdecls, saved_fdecls);

        self.expect(TokenKind::RBrace)?;
        Ok(self.ast.add_function(FunctionDef {
            name,
            params,
            body,
            vars,
            fdecls,
            line,
        }))
    }

    // ----- statements (§12) -----

    fn statement(&mut self) -> Result<NodeId, ParseError> {
        match self.kind0()? {
            TokenKind::LBrace => self.block(),
            TokenKind::Semi => {
                let line = self.line0()?;
                self.advance()?;
                Ok(self.ast.alloc(NodeKind::Empty, line))
            }
            TokenKind::Keyword(Keyword::Var) => self.var_statement(),
            TokenKind::Keyword(Keyword::If) => self.if_statement(),
            TokenKind::Keyword(Keyword::Do) => self.do_statement(),
            TokenKind::Keyword(Keyword::While) => self.while_statement(),
            TokenKind::Keyword(Keyword::For) => self.for_statement(),
            TokenKind::Keyword(Keyword::Continue) => self.continue_statement(),
            TokenKind::Keyword(Keyword::Break) => self.break_statement(),
            TokenKind::Keyword(Keyword::Return) => self.return_statement(),
            TokenKind::Keyword(Keyword::With) => self.with_statement(),
            TokenKind::Keyword(Keyword::Switch) => self.switch_statement(),
            TokenKind::Keyword(Keyword::Throw) => self.throw_statement(),
            TokenKind::Keyword(Keyword::Try) => self.try_statement(),
            TokenKind::Keyword(Keyword::Function) => {
                Err(self.error_here("function declarations are only allowed at the top level of a function or program"))
            }
            TokenKind::Ident(_) => {
                // Identifier ':' starts a labelled statement; this is the
                // one place two tokens of lookahead are needed.
                if self.tok(1)?.kind == TokenKind::Colon {
                    self.labelled_statement()
                } else {
                    self.expression_statement()
                }
            }
            _ => self.expression_statement(),
        }
    }

    fn block(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace)? {
            if self.at(&TokenKind::Eof)? {
                return Err(self.error_here("unterminated block"));
            }
            stmts.push(self.statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.ast.alloc(NodeKind::Block(stmts), line))
    }

    fn var_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Var)?;
        let decls = self.var_declaration_list()?;
        self.semicolon()?;
        Ok(self.ast.alloc(NodeKind::VarStmt(decls), line))
    }

    fn var_declaration_list(&mut self) -> Result<Vec<VarDecl>, ParseError> {
        let mut decls = Vec::new();
        loop {
            decls.push(self.var_declaration()?);
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(decls)
    }

    fn var_declaration(&mut self) -> Result<VarDecl, ParseError> {
        let name = self.expect_ident()?;
        self.vars.push(name);
        let init = if self.eat(&TokenKind::Assign)? {
            Some(self.assignment_expression()?)
        } else {
            None
        };
        Ok(VarDecl { name, init })
    }

    fn expression_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        let expr = self.expression()?;
        self.semicolon()?;
        Ok(self.ast.alloc(NodeKind::ExprStmt(expr), line))
    }

    fn paren_expression(&mut self) -> Result<NodeId, ParseError> {
        self.expect(TokenKind::LParen)?;
        let expr = self.expression()?;
        self.expect(TokenKind::RParen)?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::If)?;
        let test = self.paren_expression()?;
        let cons = self.statement()?;
        let alt = if self.eat(&TokenKind::Keyword(Keyword::Else))? {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(self.ast.alloc(NodeKind::If { test, cons, alt }, line))
    }

    fn do_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        let node = self.ast.reserve(line);
        self.bind_labels(node, true);
        self.push_implicit(node);
        self.expect_keyword(Keyword::Do)?;
        let body = self.statement()?;
        self.pop_labels(2);
        self.expect_keyword(Keyword::While)?;
        let test = self.paren_expression()?;
        // §7.9: the trailing `;` of do-while tolerates insertion everywhere
        let _ = self.eat(&TokenKind::Semi)?;
        self.ast.fill(node, NodeKind::DoWhile { body, test });
        Ok(node)
    }

    fn while_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        let node = self.ast.reserve(line);
        self.bind_labels(node, true);
        self.push_implicit(node);
        self.expect_keyword(Keyword::While)?;
        let test = self.paren_expression()?;
        let body = self.statement()?;
        self.pop_labels(2);
        self.ast.fill(node, NodeKind::While { test, body });
        Ok(node)
    }

    fn for_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        let node = self.ast.reserve(line);
        self.bind_labels(node, true);
        self.push_implicit(node);
        self.expect_keyword(Keyword::For)?;
        self.expect(TokenKind::LParen)?;

        // Distinguish the three-part form from for-in; the init expression
        // is parsed with the NoIn grammar so a relational `in` cannot eat
        // the enumeration keyword.
        let kind = if self.at(&TokenKind::Keyword(Keyword::Var))? {
            let var_line = self.line0()?;
            self.advance()?;
            let first = {
                let saved = std::mem::replace(&mut self.noin, true);
                let decl = self.var_declaration();
                self.noin = saved;
                decl?
            };
            if self.eat(&TokenKind::Keyword(Keyword::In))? {
                let object = self.expression()?;
                self.expect(TokenKind::RParen)?;
                let body = self.statement()?;
                NodeKind::ForIn {
                    left: ForInLeft::Var {
                        name: first.name,
                        init: first.init,
                    },
                    object,
                    body,
                }
            } else {
                let mut decls = vec![first];
                if self.eat(&TokenKind::Comma)? {
                    let saved = std::mem::replace(&mut self.noin, true);
                    let rest = self.var_declaration_list();
                    self.noin = saved;
                    decls.extend(rest?);
                }
                let init = self.ast.alloc(NodeKind::VarStmt(decls), var_line);
                self.for_tail(Some(init))?
            }
        } else if self.at(&TokenKind::Semi)? {
            self.for_tail(None)?
        } else {
            let first = {
                let saved = std::mem::replace(&mut self.noin, true);
                let expr = self.expression();
                self.noin = saved;
                expr?
            };
            if self.eat(&TokenKind::Keyword(Keyword::In))? {
                if !is_lhs_node(self.ast.kind(first)) {
                    return Err(self.error_here("for-in left-hand side is not assignable"));
                }
                let object = self.expression()?;
                self.expect(TokenKind::RParen)?;
                let body = self.statement()?;
                NodeKind::ForIn {
                    left: ForInLeft::Expr(first),
                    object,
                    body,
                }
            } else {
                let line = self.ast.line(first);
                let init = self.ast.alloc(NodeKind::ExprStmt(first), line);
                self.for_tail(Some(init))?
            }
        };

        self.pop_labels(2);
        self.ast.fill(node, kind);
        Ok(node)
    }

    /// Parses `; test? ; step? ) body` of a three-part `for`.
    fn for_tail(&mut self, init: Option<NodeId>) -> Result<NodeKind, ParseError> {
        self.expect(TokenKind::Semi)?;
        let test = if self.at(&TokenKind::Semi)? {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Semi)?;
        let step = if self.at(&TokenKind::RParen)? {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::RParen)?;
        let body = self.statement()?;
        Ok(NodeKind::For { init, test, step, body })
    }

    fn continue_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Continue)?;
        // restricted production: a newline ends the statement
        let label = if !self.newline0()? && matches!(self.kind0()?, TokenKind::Ident(_)) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        let target = match label {
            Some(name) => {
                let found = self
                    .find_label(LabelName::Named(name))
                    .ok_or_else(|| ParseError::new("continue label not found", line))?;
                if !found.iterative {
                    return Err(ParseError::new("continue target is not a loop", line));
                }
                found.target
            }
            None => {
                self.find_label(LabelName::ImplicitContinue)
                    .ok_or_else(|| ParseError::new("continue outside of a loop", line))?
                    .target
            }
        };
        self.semicolon()?;
        Ok(self.ast.alloc(NodeKind::Continue { target, label }, line))
    }

    fn break_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Break)?;
        let label = if !self.newline0()? && matches!(self.kind0()?, TokenKind::Ident(_)) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        let target = match label {
            Some(name) => {
                self.find_label(LabelName::Named(name))
                    .ok_or_else(|| ParseError::new("break label not found", line))?
                    .target
            }
            None => {
                self.find_label(LabelName::ImplicitBreak)
                    .ok_or_else(|| ParseError::new("break outside of a loop or switch", line))?
                    .target
            }
        };
        self.semicolon()?;
        Ok(self.ast.alloc(NodeKind::Break { target, label }, line))
    }

    fn return_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Return)?;
        if self.funcdepth == 0 {
            return Err(ParseError::new("return outside of a function", line));
        }
        let value = if self.newline0()?
            || self.at(&TokenKind::Semi)?
            || self.at(&TokenKind::RBrace)?
            || self.at(&TokenKind::Eof)?
        {
            None
        } else {
            Some(self.expression()?)
        };
        self.semicolon()?;
        Ok(self.ast.alloc(NodeKind::Return(value), line))
    }

    fn with_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::With)?;
        let object = self.paren_expression()?;
        let body = self.statement()?;
        Ok(self.ast.alloc(NodeKind::With { object, body }, line))
    }

    fn switch_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        let node = self.ast.reserve(line);
        self.bind_labels(node, false);
        self.expect_keyword(Keyword::Switch)?;
        let disc = self.paren_expression()?;
        self.expect(TokenKind::LBrace)?;

        self.labels.push(Label {
            name: LabelName::ImplicitBreak,
            target: node,
            iterative: false,
            unbound: false,
        });

        let mut cases = Vec::new();
        let mut saw_default = false;
        while !self.at(&TokenKind::RBrace)? {
            let test = if self.eat(&TokenKind::Keyword(Keyword::Case))? {
                let test = self.expression()?;
                Some(test)
            } else if self.at(&TokenKind::Keyword(Keyword::Default))? {
                self.advance()?;
                if saw_default {
                    return Err(self.error_here("more than one default clause"));
                }
                saw_default = true;
                None
            } else {
                return Err(self.error_here("expected 'case' or 'default'"));
            };
            self.expect(TokenKind::Colon)?;
            let mut body = Vec::new();
            loop {
                match self.kind0()? {
                    TokenKind::Keyword(Keyword::Case | Keyword::Default) | TokenKind::RBrace => break,
                    TokenKind::Eof => return Err(self.error_here("unterminated switch")),
                    _ => body.push(self.statement()?),
                }
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect(TokenKind::RBrace)?;
        self.pop_labels(1);

        self.ast.fill(node, NodeKind::Switch { disc, cases });
        Ok(node)
    }

    fn labelled_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        let label = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        if self.find_label(LabelName::Named(label)).is_some() {
            return Err(ParseError::new("duplicate label", line));
        }

        let node = self.ast.reserve(line);
        self.labels.push(Label {
            name: LabelName::Named(label),
            target: node,
            iterative: false,
            unbound: true,
        });
        let body = self.statement()?;
        self.labels.pop();
        self.ast.fill(node, NodeKind::Labelled { label, body });
        Ok(node)
    }

    fn throw_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Throw)?;
        // restricted production, and throw has no argument-free form
        if self.newline0()? {
            return Err(ParseError::new("newline not allowed after 'throw'", line));
        }
        let value = self.expression()?;
        self.semicolon()?;
        Ok(self.ast.alloc(NodeKind::Throw(value), line))
    }

    fn try_statement(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect_keyword(Keyword::Try)?;
        if !self.at(&TokenKind::LBrace)? {
            return Err(self.error_here("expected block after 'try'"));
        }
        let block = self.block()?;
        let catch = if self.eat(&TokenKind::Keyword(Keyword::Catch))? {
            self.expect(TokenKind::LParen)?;
            let name = self.expect_ident()?;
            self.expect(TokenKind::RParen)?;
            if !self.at(&TokenKind::LBrace)? {
                return Err(self.error_here("expected block after 'catch'"));
            }
            let body = self.block()?;
            Some(CatchClause { name, body })
        } else {
            None
        };
        let finally = if self.eat(&TokenKind::Keyword(Keyword::Finally))? {
            if !self.at(&TokenKind::LBrace)? {
                return Err(self.error_here("expected block after 'finally'"));
            }
            Some(self.block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.error_here("try requires catch or finally"));
        }
        Ok(self.ast.alloc(NodeKind::Try { block, catch, finally }, line))
    }

    // ----- expressions (§11) -----

    fn expression(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.assignment_expression()?;
        while self.at(&TokenKind::Comma)? {
            let line = self.line0()?;
            self.advance()?;
            let right = self.assignment_expression()?;
            left = self.ast.alloc(NodeKind::Comma { left, right }, line);
        }
        Ok(left)
    }

    fn assignment_expression(&mut self) -> Result<NodeId, ParseError> {
        let left = self.conditional_expression()?;
        let op = match self.kind0()? {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::DivAssign => Some(BinaryOp::Div),
            TokenKind::PercentAssign => Some(BinaryOp::Mod),
            TokenKind::ShlAssign => Some(BinaryOp::Shl),
            TokenKind::ShrAssign => Some(BinaryOp::Shr),
            TokenKind::UshrAssign => Some(BinaryOp::Ushr),
            TokenKind::BitAndAssign => Some(BinaryOp::BitAnd),
            TokenKind::BitXorAssign => Some(BinaryOp::BitXor),
            TokenKind::BitOrAssign => Some(BinaryOp::BitOr),
            _ => return Ok(left),
        };
        let line = self.line0()?;
        if !is_lhs_node(self.ast.kind(left)) {
            return Err(ParseError::new("bad assignment left-hand side", line));
        }
        self.advance()?;
        let value = self.assignment_expression()?;
        Ok(self.ast.alloc(
            NodeKind::Assign {
                target: left,
                op,
                value,
            },
            line,
        ))
    }

    fn conditional_expression(&mut self) -> Result<NodeId, ParseError> {
        let test = self.binary_expression(0)?;
        if !self.at(&TokenKind::Question)? {
            return Ok(test);
        }
        let line = self.line0()?;
        self.advance()?;
        // both branches are full AssignmentExpressions; the NoIn restriction
        // does not apply inside the branches
        let saved = std::mem::replace(&mut self.noin, false);
        let cons = self.assignment_expression();
        self.noin = saved;
        let cons = cons?;
        self.expect(TokenKind::Colon)?;
        let alt = self.assignment_expression()?;
        Ok(self.ast.alloc(NodeKind::Cond { test, cons, alt }, line))
    }

    /// Precedence-climbing driver for every left-associative binary level
    /// from `||` down to `*`.
    fn binary_expression(&mut self, min_level: u8) -> Result<NodeId, ParseError> {
        let mut left = self.unary_expression()?;
        loop {
            let Some((level, op)) = self.peek_binary()? else {
                break;
            };
            if level < min_level {
                break;
            }
            let line = self.line0()?;
            self.advance()?;
            let right = self.binary_expression(level + 1)?;
            left = match op {
                BinOrLogical::Logical(op) => self.ast.alloc(NodeKind::Logical { op, left, right }, line),
                BinOrLogical::Binary(op) => self.ast.alloc(NodeKind::Binary { op, left, right }, line),
            };
        }
        Ok(left)
    }

    fn peek_binary(&mut self) -> Result<Option<(u8, BinOrLogical)>, ParseError> {
        use BinOrLogical::{Binary, Logical};
        let noin = self.noin;
        Ok(Some(match self.kind0()? {
            TokenKind::OrOr => (0, Logical(LogicalOp::Or)),
            TokenKind::AndAnd => (1, Logical(LogicalOp::And)),
            TokenKind::BitOr => (2, Binary(BinaryOp::BitOr)),
            TokenKind::BitXor => (3, Binary(BinaryOp::BitXor)),
            TokenKind::BitAnd => (4, Binary(BinaryOp::BitAnd)),
            TokenKind::Eq => (5, Binary(BinaryOp::Eq)),
            TokenKind::Ne => (5, Binary(BinaryOp::Ne)),
            TokenKind::StrictEq => (5, Binary(BinaryOp::StrictEq)),
            TokenKind::StrictNe => (5, Binary(BinaryOp::StrictNe)),
            TokenKind::Lt => (6, Binary(BinaryOp::Lt)),
            TokenKind::Gt => (6, Binary(BinaryOp::Gt)),
            TokenKind::Le => (6, Binary(BinaryOp::Le)),
            TokenKind::Ge => (6, Binary(BinaryOp::Ge)),
            TokenKind::Keyword(Keyword::Instanceof) => (6, Binary(BinaryOp::InstanceOf)),
            // the NoIn grammar split: inside a for-init, `in` terminates
            // the expression instead of binding as a relational operator
            TokenKind::Keyword(Keyword::In) if !noin => (6, Binary(BinaryOp::In)),
            TokenKind::Shl => (7, Binary(BinaryOp::Shl)),
            TokenKind::Shr => (7, Binary(BinaryOp::Shr)),
            TokenKind::Ushr => (7, Binary(BinaryOp::Ushr)),
            TokenKind::Plus => (8, Binary(BinaryOp::Add)),
            TokenKind::Minus => (8, Binary(BinaryOp::Sub)),
            TokenKind::Star => (9, Binary(BinaryOp::Mul)),
            TokenKind::Div => (9, Binary(BinaryOp::Div)),
            TokenKind::Percent => (9, Binary(BinaryOp::Mod)),
            _ => return Ok(None),
        }))
    }

    fn unary_expression(&mut self) -> Result<NodeId, ParseError> {
        let op = match self.kind0()? {
            TokenKind::Keyword(Keyword::Delete) => Some(UnaryOp::Delete),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOp::Void),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOp::TypeOf),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::BitNot => Some(UnaryOp::BitNot),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.line0()?;
            self.advance()?;
            let expr = self.unary_expression()?;
            return Ok(self.ast.alloc(NodeKind::Unary { op, expr }, line));
        }
        self.postfix_expression()
    }

    fn postfix_expression(&mut self) -> Result<NodeId, ParseError> {
        let expr = self.left_hand_side_expression(true)?;
        // restricted production: no LineTerminator before postfix ++/--
        if !self.newline0()? {
            let op = match self.kind0()? {
                TokenKind::PlusPlus => Some(UpdateOp::Inc),
                TokenKind::MinusMinus => Some(UpdateOp::Dec),
                _ => None,
            };
            if let Some(op) = op {
                let line = self.line0()?;
                self.advance()?;
                return Ok(self.ast.alloc(NodeKind::Postfix { op, expr }, line));
            }
        }
        Ok(expr)
    }

    /// MemberExpression / NewExpression / CallExpression. `allow_call`
    /// distinguishes the argument of `new` (which must not swallow call
    /// parentheses that belong to the `new`) from general contexts.
    fn left_hand_side_expression(&mut self, allow_call: bool) -> Result<NodeId, ParseError> {
        let base = if self.at(&TokenKind::Keyword(Keyword::New))? {
            let line = self.line0()?;
            self.advance()?;
            let callee = self.left_hand_side_expression(false)?;
            let args = if self.at(&TokenKind::LParen)? {
                self.arguments()?
            } else {
                Vec::new()
            };
            self.ast.alloc(NodeKind::New { callee, args }, line)
        } else {
            self.primary_expression()?
        };
        self.member_tail(base, allow_call)
    }

    fn member_tail(&mut self, mut node: NodeId, allow_call: bool) -> Result<NodeId, ParseError> {
        loop {
            match self.kind0()? {
                TokenKind::Dot => {
                    let line = self.line0()?;
                    self.advance()?;
                    let name = self.expect_ident()?;
                    node = self.ast.alloc(NodeKind::Member { object: node, name }, line);
                }
                TokenKind::LBracket => {
                    let line = self.line0()?;
                    self.advance()?;
                    // the subscript is a full Expression even under NoIn
                    let saved = std::mem::replace(&mut self.noin, false);
                    let index = self.expression();
                    self.noin = saved;
                    let index = index?;
                    self.expect(TokenKind::RBracket)?;
                    node = self.ast.alloc(NodeKind::Index { object: node, index }, line);
                }
                TokenKind::LParen if allow_call => {
                    let line = self.line0()?;
                    let args = self.arguments()?;
                    node = self.ast.alloc(NodeKind::Call { callee: node, args }, line);
                }
                _ => return Ok(node),
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let saved = std::mem::replace(&mut self.noin, false);
        let result = self.argument_list();
        self.noin = saved;
        let args = result?;
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn argument_list(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen)? {
            loop {
                args.push(self.assignment_expression()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        Ok(args)
    }

    fn primary_expression(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        match self.kind0()? {
            TokenKind::Keyword(Keyword::This) => {
                self.advance()?;
                Ok(self.ast.alloc(NodeKind::This, line))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance()?;
                Ok(self.ast.alloc(NodeKind::NullLit, line))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance()?;
                Ok(self.ast.alloc(NodeKind::BoolLit(true), line))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance()?;
                Ok(self.ast.alloc(NodeKind::BoolLit(false), line))
            }
            TokenKind::Keyword(Keyword::Function) => {
                let fid = self.function_definition(false)?;
                Ok(self.ast.alloc(NodeKind::FunctionExpr(fid), line))
            }
            TokenKind::Ident(_) => {
                let id = self.expect_ident()?;
                Ok(self.ast.alloc(NodeKind::Ident(id), line))
            }
            TokenKind::Number(_) => {
                let tok = self.advance()?;
                let TokenKind::Number(n) = tok.kind else { unreachable!() };
                Ok(self.ast.alloc(NodeKind::Number(n), line))
            }
            TokenKind::Str(_) => {
                let tok = self.advance()?;
                let TokenKind::Str(s) = tok.kind else { unreachable!() };
                Ok(self.ast.alloc(NodeKind::StrLit(s), line))
            }
            TokenKind::Div | TokenKind::DivAssign => {
                // grammar context says this slash opens a regex literal;
                // hand the scanner back the reins
                let after_assign = matches!(self.kind0()?, TokenKind::DivAssign);
                debug_assert_eq!(self.ring.len(), 1, "no token may be read past a regex-opening slash");
                self.ring.clear();
                let tok = self.lexer.lex_regex(self.interner, after_assign)?;
                let TokenKind::Regex { body, flags } = tok.kind else {
                    unreachable!("lex_regex returns a regex token")
                };
                Ok(self.ast.alloc(NodeKind::Regex { body, flags }, line))
            }
            TokenKind::LParen => {
                self.advance()?;
                let saved = std::mem::replace(&mut self.noin, false);
                let expr = self.expression();
                self.noin = saved;
                let expr = expr?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.array_literal(),
            TokenKind::LBrace => self.object_literal(),
            other => {
                let msg = format!("unexpected '{other}'");
                Err(self.error_here(msg))
            }
        }
    }

    fn array_literal(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect(TokenKind::LBracket)?;
        let saved = std::mem::replace(&mut self.noin, false);
        let result = self.array_elements();
        self.noin = saved;
        let elements = result?;
        self.expect(TokenKind::RBracket)?;
        Ok(self.ast.alloc(NodeKind::ArrayLit(elements), line))
    }

    fn array_elements(&mut self) -> Result<Vec<Option<NodeId>>, ParseError> {
        let mut elements = Vec::new();
        loop {
            while self.at(&TokenKind::Comma)? {
                // an elision contributes a hole
                self.advance()?;
                elements.push(None);
            }
            if self.at(&TokenKind::RBracket)? {
                break;
            }
            elements.push(Some(self.assignment_expression()?));
            if self.at(&TokenKind::Comma)? {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(elements)
    }

    fn object_literal(&mut self) -> Result<NodeId, ParseError> {
        let line = self.line0()?;
        self.expect(TokenKind::LBrace)?;
        let saved = std::mem::replace(&mut self.noin, false);
        let result = self.object_members();
        self.noin = saved;
        let props = result?;
        self.expect(TokenKind::RBrace)?;
        Ok(self.ast.alloc(NodeKind::ObjectLit(props), line))
    }

    fn object_members(&mut self) -> Result<Vec<(StringId, NodeId)>, ParseError> {
        let mut props = Vec::new();
        if self.at(&TokenKind::RBrace)? {
            return Ok(props);
        }
        loop {
            let name = match self.kind0()? {
                TokenKind::Ident(_) => self.expect_ident()?,
                TokenKind::Str(_) => {
                    let tok = self.advance()?;
                    let TokenKind::Str(s) = tok.kind else { unreachable!() };
                    self.interner.intern(&s)
                }
                TokenKind::Number(_) => {
                    let tok = self.advance()?;
                    let TokenKind::Number(n) = tok.kind else { unreachable!() };
                    self.interner.intern_str(&number_to_std_string(n))
                }
                other => {
                    let msg = format!("bad property name '{other}'");
                    return Err(self.error_here(msg));
                }
            };
            self.expect(TokenKind::Colon)?;
            let value = self.assignment_expression()?;
            props.push((name, value));
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(props)
    }
}

enum BinOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// LeftHandSideExpression shapes that may appear as an assignment or
/// for-in target. Call expressions are syntactically allowed (a write
/// through one fails at runtime with ReferenceError).
fn is_lhs_node(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Ident(_) | NodeKind::Member { .. } | NodeKind::Index { .. } | NodeKind::Call { .. } | NodeKind::New { .. }
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::input::StringInput;

    fn parse_ok(src: &str) -> (Ast, FunctionId) {
        let mut input = StringInput::new(src);
        let mut interner = Interner::new();
        parse_program(&mut input, &mut interner, Compat::default()).expect("parses")
    }

    fn parse_err(src: &str) -> ParseError {
        let mut input = StringInput::new(src);
        let mut interner = Interner::new();
        parse_program(&mut input, &mut interner, Compat::default()).expect_err("must not parse")
    }

    #[test]
    fn asi_inserts_at_newline_and_brace() {
        parse_ok("a = 1\nb = 2");
        parse_ok("{ a = 1 }");
        parse_ok("a = 1");
    }

    #[test]
    fn asi_does_not_split_mid_statement() {
        assert!(parse_err("a = 1 b = 2").message.contains("expected ';'"));
    }

    #[test]
    fn restricted_return_takes_no_newline_argument() {
        let (ast, program) = parse_ok("function f() { return\n1; }");
        let def = ast.function(program);
        let NodeKind::FunctionDecl(f) = ast.kind(def.body[0]) else {
            panic!("expected function declaration");
        };
        let body = &ast.function(*f).body;
        assert!(
            matches!(ast.kind(body[0]), NodeKind::Return(None)),
            "return followed by newline returns undefined"
        );
    }

    #[test]
    fn newline_after_throw_is_an_error() {
        assert!(parse_err("function f() { throw\n1; }").message.contains("throw"));
    }

    #[test]
    fn noin_splits_for_in_from_relational() {
        let (ast, program) = parse_ok("for (var k in o) ;");
        let def = ast.function(program);
        assert!(matches!(ast.kind(def.body[0]), NodeKind::ForIn { .. }));

        // a parenthesized `in` is relational even inside a for-init
        let (ast, program) = parse_ok("for (var x = ('a' in o); x; ) ;");
        let def = ast.function(program);
        assert!(matches!(ast.kind(def.body[0]), NodeKind::For { .. }));
    }

    #[test]
    fn break_continue_resolve_at_parse_time() {
        let (ast, program) = parse_ok("outer: while (a) { while (b) { continue outer; } break; }");
        let def = ast.function(program);
        let NodeKind::Labelled { body: outer_loop, .. } = ast.kind(def.body[0]) else {
            panic!("expected labelled statement");
        };
        // the continue target is the outer while node itself
        let NodeKind::While { body: outer_body, .. } = ast.kind(*outer_loop) else {
            panic!("expected while");
        };
        let NodeKind::Block(stmts) = ast.kind(*outer_body) else {
            panic!("expected block");
        };
        let NodeKind::While { body: inner_body, .. } = ast.kind(stmts[0]) else {
            panic!("expected inner while");
        };
        let NodeKind::Block(inner_stmts) = ast.kind(*inner_body) else {
            panic!("expected block");
        };
        let NodeKind::Continue { target, .. } = ast.kind(inner_stmts[0]) else {
            panic!("expected continue");
        };
        assert_eq!(*target, *outer_loop);
    }

    #[test]
    fn bad_jump_targets_are_syntax_errors() {
        assert!(parse_err("continue;").message.contains("outside"));
        assert!(parse_err("break;").message.contains("outside"));
        assert!(parse_err("x: { continue x; }").message.contains("not a loop"));
        assert!(parse_err("while (a) { break missing; }").message.contains("not found"));
        assert!(parse_err("x: x: ;").message.contains("duplicate label"));
    }

    #[test]
    fn var_declarations_accumulate_on_function() {
        let (ast, program) = parse_ok("var a = 1, b; if (a) { var c; }");
        let def = ast.function(program);
        assert_eq!(def.vars.len(), 3);
    }

    #[test]
    fn function_declarations_are_hoisted_into_fdecls() {
        let (ast, program) = parse_ok("f(); function f() {}");
        let def = ast.function(program);
        assert_eq!(def.fdecls.len(), 1);
    }

    #[test]
    fn regex_literal_in_expression_position() {
        let (ast, program) = parse_ok("var re = /a+b/g;");
        let def = ast.function(program);
        let NodeKind::VarStmt(decls) = ast.kind(def.body[0]) else {
            panic!("expected var");
        };
        let NodeKind::Regex { body, flags } = ast.kind(decls[0].init.unwrap()) else {
            panic!("expected regex literal");
        };
        assert_eq!(body.to_utf8().unwrap(), "a+b");
        assert_eq!(flags.to_utf8().unwrap(), "g");
    }

    #[test]
    fn division_is_not_a_regex() {
        parse_ok("var x = a / b / c;");
    }

    #[test]
    fn new_binds_tighter_than_call() {
        let (ast, program) = parse_ok("new F()();");
        let def = ast.function(program);
        let NodeKind::ExprStmt(e) = ast.kind(def.body[0]) else {
            panic!("expected expression statement")
        };
        let NodeKind::Call { callee, .. } = ast.kind(*e) else {
            panic!("outermost must be the call")
        };
        assert!(matches!(ast.kind(*callee), NodeKind::New { .. }));
    }

    #[test]
    fn assignment_target_is_checked() {
        assert!(parse_err("1 = 2;").message.contains("left-hand side"));
        parse_ok("a.b = 2;");
        parse_ok("a[0] = 2;");
    }

    #[test]
    fn array_holes_count() {
        let (ast, program) = parse_ok("var a = [1, , 2, ];");
        let def = ast.function(program);
        let NodeKind::VarStmt(decls) = ast.kind(def.body[0]) else {
            panic!("expected var")
        };
        let NodeKind::ArrayLit(elements) = ast.kind(decls[0].init.unwrap()) else {
            panic!("expected array literal")
        };
        assert_eq!(elements.len(), 3);
        assert!(elements[1].is_none());
    }

    #[test]
    fn switch_rejects_two_defaults() {
        assert!(parse_err("switch (x) { default: ; default: ; }").message.contains("default"));
    }

    #[test]
    fn print_parse_fixpoint() {
        let sources = [
            "var a = 1, b = 2; a + b;",
            "function f(x, y) { if (x < y) { return x; } else return y; }",
            "outer: for (var i = 0; i < 10; i++) { if (i % 2) continue outer; s += i; }",
            "try { throw { code: 4 }; } catch (e) { x = e.code; } finally { done = true; }",
            "with (o) { a = b[c] + d.e; }",
            "switch (k) { case 1: one(); break; default: other(); }",
            "var s = 'it\\'s';",
        ];
        for src in sources {
            let mut interner = Interner::new();
            let mut input = StringInput::new(src);
            let (ast, program) = parse_program(&mut input, &mut interner, Compat::default()).expect("parses");
            let printed = crate::printer::print_function(&ast, &interner, program);
            // strip the synthetic function wrapper around the program body
            let body = printed
                .strip_prefix("function () {")
                .and_then(|s| s.strip_suffix('}'))
                .expect("printer wraps program in a function");

            let mut input2 = StringInput::new(body);
            let (ast2, program2) = parse_program(&mut input2, &mut interner, Compat::default())
                .unwrap_or_else(|e| panic!("printed source must re-parse: {e}\n{body}"));
            let printed2 = crate::printer::print_function(&ast2, &interner, program2);
            assert_eq!(printed, printed2, "print(parse(print(parse(src)))) fixpoint for {src}");
        }
    }
}
