#![doc = include_str!("../../../README.md")]

mod ast;
mod builtins;
mod bytecode;
mod compat;
mod convert;
mod enumerate;
mod error;
mod eval;
mod function;
mod heap;
mod input;
mod intern;
mod interp;
mod lexer;
mod object;
mod parser;
mod printer;
mod protocol;
mod scope;
mod string;
mod tracer;
mod value;

pub use crate::{
    bytecode::{Code, Opcode},
    compat::Compat,
    error::{CallKind, CodeLoc, ErrorKind, Exception, ParseError, RunError, RunResult, StackFrame},
    heap::ObjectId,
    input::{Input, StringInput},
    intern::{StringId, WellKnown},
    interp::{DEFAULT_MAX_CALL_DEPTH, ExecMode, Interp, Program},
    object::{Attr, Class, NativeFn},
    protocol::Hint,
    string::{BadUtf16, JsString, JsStringBuilder},
    tracer::{CollectingTracer, NoopTracer, StatementBudget, Tracer},
    value::{Value, number_to_string, string_to_number, to_int32, to_integer, to_uint16, to_uint32},
};
