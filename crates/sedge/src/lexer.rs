//! The tokenizer (§7).
//!
//! Tokens are delivered together with a `follows_newline` bit recording
//! whether any LineTerminator — including one buried inside a multi-line
//! `/* */` comment — occurred since the previous token; the parser's
//! automatic-semicolon-insertion and restricted productions key off that
//! bit. End of input is a real token whose `follows_newline` is forced
//! true.
//!
//! A `/` can start a division operator or a regular-expression literal and
//! only the parser knows which; it calls [`Lexer::next_token`] normally and
//! re-requests [`Lexer::lex_regex`] when grammar context says the slash it
//! just received opens a regex.
//!
//! Identifier and whitespace predicates are the ASCII approximations of the
//! Unicode categories; full category tables are an explicit non-goal.

use std::fmt;

use strum::{Display, EnumString};

use crate::{
    compat::Compat,
    error::ParseError,
    input::Input,
    intern::{Interner, StringId},
    string::{JsString, JsStringBuilder},
};

/// Reserved words of §7.5.2/§7.5.3 that are keywords of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Break,
    Case,
    Catch,
    Continue,
    Default,
    Delete,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    Instanceof,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
}

/// Future reserved words (§7.5.3); using one is a syntax error.
const FUTURE_RESERVED: &[&str] = &[
    "abstract", "boolean", "byte", "char", "class", "const", "debugger", "double", "enum", "export", "extends",
    "final", "float", "goto", "implements", "import", "int", "interface", "long", "native", "package", "private",
    "protected", "public", "short", "static", "super", "synchronized", "throws", "transient", "volatile",
];

/// The lexical categories the parser consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Punctuators, longest-match-first in the scanner.
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Semi,
    Comma,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Plus,
    Minus,
    Star,
    Percent,
    PlusPlus,
    MinusMinus,
    Shl,
    Shr,
    Ushr,
    BitAnd,
    BitOr,
    BitXor,
    Not,
    BitNot,
    AndAnd,
    OrOr,
    Question,
    Colon,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    PercentAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    Div,
    DivAssign,

    Keyword(Keyword),
    Ident(StringId),
    Number(f64),
    Str(JsString),
    /// Produced only by [`Lexer::lex_regex`], never by ordinary scanning.
    Regex {
        body: JsString,
        flags: JsString,
    },
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Dot => ".",
            Self::Semi => ";",
            Self::Comma => ",",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Percent => "%",
            Self::PlusPlus => "++",
            Self::MinusMinus => "--",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Ushr => ">>>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Not => "!",
            Self::BitNot => "~",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::PercentAssign => "%=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::UshrAssign => ">>>=",
            Self::BitAndAssign => "&=",
            Self::BitOrAssign => "|=",
            Self::BitXorAssign => "^=",
            Self::Div => "/",
            Self::DivAssign => "/=",
            Self::Keyword(k) => return write!(f, "{k}"),
            Self::Ident(_) => "identifier",
            Self::Number(_) => "number literal",
            Self::Str(_) => "string literal",
            Self::Regex { .. } => "regular expression",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A token plus its newline-adjacency bit and source line.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// True when at least one LineTerminator separated this token from the
    /// previous one.
    pub follows_newline: bool,
    pub line: u32,
}

/// WhiteSpace (§7.2), ASCII approximation of category Zs.
fn is_whitespace(c: char) -> bool {
    matches!(c, '\u{09}' | '\u{0b}' | '\u{0c}' | '\u{20}' | '\u{a0}')
}

/// LineTerminator (§7.3).
fn is_line_terminator(c: char) -> bool {
    matches!(c, '\u{0a}' | '\u{0d}' | '\u{2028}' | '\u{2029}')
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_identifier_start_char(c: char) -> bool {
    c == '$' || c == '_' || is_letter(c)
}

fn is_identifier_part_char(c: char) -> bool {
    is_identifier_start_char(c) || c.is_ascii_digit()
}

fn hex_value(c: char) -> Option<u32> {
    c.to_digit(16)
}

/// The tokenizer. Scans from an [`Input`], interning identifier lexemes as
/// it goes.
pub struct Lexer<'a> {
    input: &'a mut dyn Input,
    compat: Compat,
    /// Line of the scanner position (1-based, offset by the input's
    /// `first_lineno`).
    line: u32,
    /// Set when a LineTerminator was crossed since the last token.
    pending_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a mut dyn Input, compat: Compat) -> Self {
        let line = input.first_lineno();
        Self {
            input,
            compat,
            line,
            pending_newline: false,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line)
    }

    fn peek(&mut self) -> Option<char> {
        let mut buf = ['\0'; 1];
        (self.input.lookahead(&mut buf) == 1).then(|| buf[0])
    }

    fn peek_at(&mut self, i: usize) -> Option<char> {
        let mut buf = ['\0'; 6];
        let n = self.input.lookahead(&mut buf);
        (i < n).then(|| buf[i])
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.input.next();
        if let Some(c) = c
            && is_line_terminator(c)
        {
            // treat CRLF as a single terminator for line counting
            if c == '\r' && self.peek() == Some('\n') {
                self.input.next();
            }
            self.line += 1;
            self.pending_newline = true;
        }
        c
    }

    /// True when the upcoming six scalars form `\uHHHH`.
    fn at_unicode_escape(&mut self) -> bool {
        let mut buf = ['\0'; 6];
        let n = self.input.lookahead(&mut buf);
        n >= 6
            && buf[0] == '\\'
            && buf[1] == 'u'
            && buf[2..6].iter().all(|c| c.is_ascii_hexdigit())
    }

    fn at_identifier_start(&mut self) -> bool {
        match self.peek() {
            Some(c) if is_identifier_start_char(c) => true,
            Some('\\') => self.at_unicode_escape(),
            _ => false,
        }
    }

    fn at_identifier_part(&mut self) -> bool {
        match self.peek() {
            Some(c) if is_identifier_part_char(c) => true,
            Some('\\') => self.at_unicode_escape(),
            _ => false,
        }
    }

    /// Skips WhiteSpace and comments, recording crossed LineTerminators.
    fn skip_blanks(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if is_whitespace(c) || is_line_terminator(c) => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated comment")),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                Some('<')
                    if self.compat.contains(Compat::SGMLCOM)
                        && self.peek_at(1) == Some('!')
                        && self.peek_at(2) == Some('-')
                        && self.peek_at(3) == Some('-') =>
                {
                    // `<!--` behaves exactly like `//`
                    while let Some(c) = self.peek() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Scans the next token.
    pub fn next_token(&mut self, interner: &mut Interner) -> Result<Token, ParseError> {
        self.skip_blanks()?;
        let follows_newline = std::mem::take(&mut self.pending_newline);
        let line = self.line;

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                // end of input terminates any restricted production
                follows_newline: true,
                line,
            });
        };

        let kind = if self.at_identifier_start() {
            self.scan_identifier(interner)?
        } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            self.scan_number()?
        } else if c == '"' || c == '\'' {
            self.scan_string(c)?
        } else {
            self.scan_punctuator()?
        };

        Ok(Token {
            kind,
            follows_newline,
            line,
        })
    }

    /// Re-lexes a just-returned `/` or `/=` token as a regular-expression
    /// literal (§7.8.5). Called by the parser when grammar context expects
    /// an expression.
    pub fn lex_regex(&mut self, interner: &mut Interner, after_div_assign: bool) -> Result<Token, ParseError> {
        let _ = interner; // flags are kept as raw text, no interning needed
        let line = self.line;
        let mut body = JsStringBuilder::new();
        if after_div_assign {
            // the `/=` token consumed the leading `=` of the body
            body.push(u16::from(b'='));
        }
        let mut in_class = false;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated regular expression")),
                Some(c) if is_line_terminator(c) => {
                    return Err(self.error("regular expression literal contains line terminator"));
                }
                Some('\\') => {
                    body.push_scalar('\\');
                    self.bump();
                    match self.peek() {
                        Some(c) if !is_line_terminator(c) => {
                            body.push_scalar(c);
                            self.bump();
                        }
                        _ => return Err(self.error("unterminated regular expression")),
                    }
                }
                Some('[') => {
                    in_class = true;
                    body.push_scalar('[');
                    self.bump();
                }
                Some(']') => {
                    in_class = false;
                    body.push_scalar(']');
                    self.bump();
                }
                Some('/') if !in_class => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    body.push_scalar(c);
                    self.bump();
                }
            }
        }
        let mut flags = JsStringBuilder::new();
        while let Some(c) = self.peek() {
            if !is_identifier_part_char(c) {
                break;
            }
            flags.push_scalar(c);
            self.bump();
        }
        Ok(Token {
            kind: TokenKind::Regex {
                body: body.build(),
                flags: flags.build(),
            },
            follows_newline: false,
            line,
        })
    }

    fn scan_identifier(&mut self, interner: &mut Interner) -> Result<TokenKind, ParseError> {
        let mut lexeme = JsStringBuilder::new();
        let mut had_escape = false;
        while self.at_identifier_part() {
            if self.peek() == Some('\\') {
                // the at_identifier_part check validated \uHHHH
                had_escape = true;
                self.bump();
                self.bump();
                let mut value = 0u32;
                for _ in 0..4 {
                    let d = self.bump().and_then(hex_value).expect("validated hex digits");
                    value = value * 16 + d;
                }
                let c = char::from_u32(value).ok_or_else(|| self.error("bad unicode escape in identifier"))?;
                if !(if lexeme.is_empty() {
                    is_identifier_start_char(c)
                } else {
                    is_identifier_part_char(c)
                }) {
                    return Err(self.error("escape does not form an identifier character"));
                }
                lexeme.push_scalar(c);
            } else {
                let c = self.bump().expect("peeked identifier char");
                lexeme.push_scalar(c);
            }
        }
        let lexeme = lexeme.build();

        // An identifier that came through a \u escape is never a keyword
        // (§7.6: escaped reserved words are plain identifiers).
        if !had_escape {
            let text = lexeme.to_utf8().expect("identifier is ASCII");
            if let Ok(keyword) = text.parse::<Keyword>() {
                return Ok(TokenKind::Keyword(keyword));
            }
            if FUTURE_RESERVED.contains(&text.as_str()) {
                return Err(self.error(format!("'{text}' is a reserved word")));
            }
        }
        Ok(TokenKind::Ident(interner.intern(&lexeme)))
    }

    fn scan_number(&mut self) -> Result<TokenKind, ParseError> {
        let mut text = String::new();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut value = 0.0f64;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(hex_value) {
                value = value * 16.0 + f64::from(d);
                digits += 1;
                self.bump();
            }
            if digits == 0 {
                return Err(self.error("missing digits in hex literal"));
            }
            self.reject_detritus()?;
            return Ok(TokenKind::Number(value));
        }

        if self.peek() == Some('0')
            && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
            && self.compat.contains(Compat::EXT1)
        {
            // legacy octal, gated on the extensions flag
            self.bump();
            let mut value = 0.0f64;
            while let Some(c) = self.peek() {
                let Some(d) = c.to_digit(8) else { break };
                value = value * 8.0 + f64::from(d);
                self.bump();
            }
            self.reject_detritus()?;
            return Ok(TokenKind::Number(value));
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().expect("digit"));
        }
        if self.peek() == Some('.') {
            text.push('.');
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().expect("digit"));
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            text.push('e');
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                text.push(self.bump().expect("sign"));
            }
            let mut exp_digits = 0;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().expect("digit"));
                exp_digits += 1;
            }
            if exp_digits == 0 {
                return Err(self.error("missing digits in exponent"));
            }
        }
        self.reject_detritus()?;
        let value = text.parse::<f64>().map_err(|_| self.error("bad number literal"))?;
        Ok(TokenKind::Number(value))
    }

    /// §7.8.3: an identifier start immediately after a numeric literal is a
    /// syntax error, not two tokens.
    fn reject_detritus(&mut self) -> Result<(), ParseError> {
        if self.at_identifier_start() || self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.error("identifier directly after number literal"));
        }
        Ok(())
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        self.bump();
        let mut s = JsStringBuilder::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if is_line_terminator(c) => {
                    return Err(self.error("string literal contains line terminator"));
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.scan_string_escape(&mut s)?;
                }
                Some(c) => {
                    s.push_scalar(c);
                    self.bump();
                }
            }
        }
        Ok(TokenKind::Str(s.build()))
    }

    fn scan_string_escape(&mut self, s: &mut JsStringBuilder) -> Result<(), ParseError> {
        let Some(c) = self.peek() else {
            return Err(self.error("unterminated string literal"));
        };
        match c {
            'b' => {
                s.push(0x08);
                self.bump();
            }
            't' => {
                s.push(0x09);
                self.bump();
            }
            'n' => {
                s.push(0x0a);
                self.bump();
            }
            'v' => {
                s.push(0x0b);
                self.bump();
            }
            'f' => {
                s.push(0x0c);
                self.bump();
            }
            'r' => {
                s.push(0x0d);
                self.bump();
            }
            'x' => {
                self.bump();
                let mut value = 0u32;
                for _ in 0..2 {
                    let d = self
                        .peek()
                        .and_then(hex_value)
                        .ok_or_else(|| self.error("bad \\x escape"))?;
                    value = value * 16 + d;
                    self.bump();
                }
                s.push(value as u16);
            }
            'u' => {
                self.bump();
                let mut value = 0u32;
                for _ in 0..4 {
                    let d = self
                        .peek()
                        .and_then(hex_value)
                        .ok_or_else(|| self.error("bad \\u escape"))?;
                    value = value * 16 + d;
                    self.bump();
                }
                s.push(value as u16);
            }
            '0'..='7' if self.compat.contains(Compat::ANNEX_B) => {
                // Annex B octal escapes: up to three digits for a leading
                // 0-3, two digits otherwise.
                let first = c.to_digit(8).expect("octal digit");
                self.bump();
                let mut value = first;
                let max_more = if first <= 3 { 2 } else { 1 };
                for _ in 0..max_more {
                    let Some(d) = self.peek().and_then(|c| c.to_digit(8)) else {
                        break;
                    };
                    value = value * 8 + d;
                    self.bump();
                }
                s.push(value as u16);
            }
            '0' => {
                // \0 is NUL even without Annex B, as long as no digit follows
                self.bump();
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(self.error("octal escapes are not standard"));
                }
                s.push(0);
            }
            c if is_line_terminator(c) => {
                return Err(self.error("string literal contains line terminator"));
            }
            c => {
                // NonEscapeCharacter: identity
                s.push_scalar(c);
                self.bump();
            }
        }
        Ok(())
    }

    fn scan_punctuator(&mut self) -> Result<TokenKind, ParseError> {
        use TokenKind as T;
        let c = self.bump().expect("caller peeked");
        let kind = match c {
            '{' => T::LBrace,
            '}' => T::RBrace,
            '(' => T::LParen,
            ')' => T::RParen,
            '[' => T::LBracket,
            ']' => T::RBracket,
            ';' => T::Semi,
            ',' => T::Comma,
            '?' => T::Question,
            ':' => T::Colon,
            '~' => T::BitNot,
            '.' => T::Dot,
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    T::Le
                }
                Some('<') => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        T::ShlAssign
                    } else {
                        T::Shl
                    }
                }
                _ => T::Lt,
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.bump();
                    T::Ge
                }
                Some('>') => {
                    self.bump();
                    match self.peek() {
                        Some('=') => {
                            self.bump();
                            T::ShrAssign
                        }
                        Some('>') => {
                            self.bump();
                            if self.peek() == Some('=') {
                                self.bump();
                                T::UshrAssign
                            } else {
                                T::Ushr
                            }
                        }
                        _ => T::Shr,
                    }
                }
                _ => T::Gt,
            },
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        T::StrictEq
                    } else {
                        T::Eq
                    }
                } else {
                    T::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        T::StrictNe
                    } else {
                        T::Ne
                    }
                } else {
                    T::Not
                }
            }
            '+' => match self.peek() {
                Some('+') => {
                    self.bump();
                    T::PlusPlus
                }
                Some('=') => {
                    self.bump();
                    T::PlusAssign
                }
                _ => T::Plus,
            },
            '-' => match self.peek() {
                Some('-') => {
                    self.bump();
                    T::MinusMinus
                }
                Some('=') => {
                    self.bump();
                    T::MinusAssign
                }
                _ => T::Minus,
            },
            '*' => {
                if self.peek() == Some('=') {
                    self.bump();
                    T::StarAssign
                } else {
                    T::Star
                }
            }
            '%' => {
                if self.peek() == Some('=') {
                    self.bump();
                    T::PercentAssign
                } else {
                    T::Percent
                }
            }
            '&' => match self.peek() {
                Some('&') => {
                    self.bump();
                    T::AndAnd
                }
                Some('=') => {
                    self.bump();
                    T::BitAndAssign
                }
                _ => T::BitAnd,
            },
            '|' => match self.peek() {
                Some('|') => {
                    self.bump();
                    T::OrOr
                }
                Some('=') => {
                    self.bump();
                    T::BitOrAssign
                }
                _ => T::BitOr,
            },
            '^' => {
                if self.peek() == Some('=') {
                    self.bump();
                    T::BitXorAssign
                } else {
                    T::BitXor
                }
            }
            '/' => {
                if self.peek() == Some('=') {
                    self.bump();
                    T::DivAssign
                } else {
                    T::Div
                }
            }
            other => return Err(self.error(format!("unexpected character '{other}'"))),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::input::StringInput;

    fn lex_all(src: &str) -> Vec<Token> {
        let mut input = StringInput::new(src);
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, Compat::default());
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(&mut interner).expect("lexes");
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        out
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_all(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn greedy_punctuators() {
        let ops: Vec<TokenKind> = kinds("a >>>= b >>> c >> d > e")
            .into_iter()
            .filter(|k| !matches!(k, TokenKind::Ident(_) | TokenKind::Eof))
            .collect();
        assert_eq!(
            ops,
            vec![TokenKind::UshrAssign, TokenKind::Ushr, TokenKind::Shr, TokenKind::Gt]
        );
    }

    #[test]
    fn follows_newline_tracks_comments() {
        let toks = lex_all("a /* x\n y */ b // tail\nc");
        assert!(!toks[0].follows_newline);
        assert!(toks[1].follows_newline, "newline inside block comment counts");
        assert!(toks[2].follows_newline, "newline after line comment counts");
        assert!(toks[3].follows_newline, "EOF is always newline-adjacent");
    }

    #[test]
    fn keywords_and_escaped_keywords() {
        let toks = kinds("var v\\u0061r");
        assert_eq!(toks[0], TokenKind::Keyword(Keyword::Var));
        assert!(
            matches!(toks[1], TokenKind::Ident(_)),
            "escaped keyword lexes as identifier"
        );
    }

    #[test]
    fn future_reserved_word_errors() {
        let mut input = StringInput::new("class");
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, Compat::default());
        let err = lexer.next_token(&mut interner).unwrap_err();
        assert!(err.message.contains("reserved word"));
    }

    #[test]
    fn string_escapes() {
        let toks = kinds(r#"'a\tb\x41B\'\q'"#);
        let TokenKind::Str(s) = &toks[0] else {
            panic!("expected string, got {:?}", toks[0]);
        };
        assert_eq!(s.to_utf8().unwrap(), "a\tbAB'q");
    }

    #[test]
    fn string_with_raw_newline_errors() {
        let mut input = StringInput::new("'a\nb'");
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, Compat::default());
        assert!(lexer.next_token(&mut interner).is_err());
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("0")[0], TokenKind::Number(0.0));
        assert_eq!(kinds("3.25e2")[0], TokenKind::Number(325.0));
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("0xFF")[0], TokenKind::Number(255.0));
    }

    #[test]
    fn number_detritus_is_an_error() {
        let mut input = StringInput::new("3in");
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, Compat::default());
        assert!(lexer.next_token(&mut interner).is_err());
    }

    #[test]
    fn octal_literals_need_ext1() {
        assert_eq!(kinds("010")[0], TokenKind::Number(10.0), "without EXT1, leading zero is decimal");
        let mut input = StringInput::new("010");
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, Compat::EXT1);
        let tok = lexer.next_token(&mut interner).unwrap();
        assert_eq!(tok.kind, TokenKind::Number(8.0));
    }

    #[test]
    fn regex_relex() {
        let mut input = StringInput::new("/ab[/]c/gi");
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, Compat::default());
        let tok = lexer.next_token(&mut interner).unwrap();
        assert_eq!(tok.kind, TokenKind::Div);
        let regex = lexer.lex_regex(&mut interner, false).unwrap();
        let TokenKind::Regex { body, flags } = regex.kind else {
            panic!("expected regex");
        };
        assert_eq!(body.to_utf8().unwrap(), "ab[/]c");
        assert_eq!(flags.to_utf8().unwrap(), "gi");
    }

    #[test]
    fn sgml_comment_needs_flag() {
        let toks = kinds_with("<!-- x\n1", Compat::SGMLCOM);
        assert_eq!(toks[0], TokenKind::Number(1.0));
    }

    fn kinds_with(src: &str, compat: Compat) -> Vec<TokenKind> {
        let mut input = StringInput::new(src);
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(&mut input, compat);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(&mut interner).expect("lexes");
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }
}
