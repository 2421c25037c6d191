//! The bytecode execution engine.
//!
//! An alternative linear form of the same runtime semantics the
//! tree-walker implements: a stack machine over [`Operand`]s with a block
//! stack for enumeration, `with`, and try scopes. The two engines must be
//! observationally equivalent; the tree-walker is the reference.
//!
//! - `op` — the opcode set and operand-width encoding
//! - `code` — the compiled form: instruction bytes, pools, metadata
//! - `builder` — emission with forward-branch patching
//! - `compiler` — AST to bytecode
//! - `vm` — the stack machine
//!
//! [`Operand`]: crate::eval::Operand

pub use code::Code;
pub use op::{ArgMode, Opcode};

mod builder;
mod code;
mod compiler;
mod op;
mod vm;
