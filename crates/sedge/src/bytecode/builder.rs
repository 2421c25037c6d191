//! Bytecode emission.
//!
//! `CodeBuilder` encodes instructions, interns literals into the pool with
//! structural deduplication, tracks operand- and block-stack depth bounds,
//! and manages forward branches through patch handles.

use std::rc::Rc;

use ahash::AHashMap;

use crate::{ast::FunctionId, string::JsString, value::Value};

use super::{
    code::{Code, FinallyEntry},
    op::{ArgMode, Opcode},
};

/// Handle to a forward-branch operand awaiting its target.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub(crate) struct Patch(usize);

/// Handle to a finally-table entry awaiting its end address.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinallyHandle(pub(crate) usize);

#[derive(Debug, Default)]
pub(crate) struct CodeBuilder {
    bytes: Vec<u8>,
    literals: Vec<Value>,
    functions: Vec<FunctionId>,
    finally_table: Vec<FinallyEntry>,
    number_pool: AHashMap<u64, u32>,
    string_pool: AHashMap<JsString, u32>,
    singleton_pool: AHashMap<u8, u32>,
    stack: i32,
    maxstack: i32,
    block: i32,
    maxblock: i32,
    maxargc: u16,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current instruction address.
    pub fn here(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Current block-stack depth, the operand of `End` teardowns.
    pub fn block_depth(&self) -> i32 {
        self.block
    }

    fn adjust(&mut self, delta: i16) {
        self.stack += i32::from(delta);
        debug_assert!(self.stack >= 0, "operand stack underflow in emitted code");
        self.maxstack = self.maxstack.max(self.stack);
    }

    fn note_block(&mut self, delta: i32) {
        self.block += delta;
        debug_assert!(self.block >= 0, "block stack underflow in emitted code");
        self.maxblock = self.maxblock.max(self.block);
    }

    /// Emits a no-operand instruction.
    pub fn emit(&mut self, op: Opcode) {
        self.bytes.push(op.encode(ArgMode::None));
        let effect = op.stack_effect().expect("no-operand opcodes have fixed effects");
        self.adjust(effect);
        match op {
            Opcode::SEnum | Opcode::SWith => self.note_block(1),
            _ => {}
        }
    }

    /// Emits an instruction with an immediate, choosing the byte form when
    /// it fits.
    pub fn emit_arg(&mut self, op: Opcode, value: u32) {
        if value <= u32::from(u8::MAX) {
            self.bytes.push(op.encode(ArgMode::Byte));
            self.bytes.push(value as u8);
        } else {
            self.bytes.push(op.encode(ArgMode::Word));
            self.bytes.extend_from_slice(&(value as i32).to_le_bytes());
        }
        if let Some(effect) = op.stack_effect() {
            self.adjust(effect);
        }
    }

    /// Emits `Call` or `New` with its arity, accounting for the popped
    /// arguments and callee.
    pub fn emit_call(&mut self, op: Opcode, argc: u16) {
        debug_assert!(matches!(op, Opcode::Call | Opcode::New));
        self.emit_arg(op, u32::from(argc));
        // argc arguments and the callee collapse into one result
        self.adjust(-(argc as i16));
        self.maxargc = self.maxargc.max(argc);
    }

    /// Emits a branch (always word-width, patchable) returning the patch
    /// handle.
    pub fn emit_branch(&mut self, op: Opcode) -> Patch {
        self.bytes.push(op.encode(ArgMode::Word));
        let at = self.bytes.len();
        self.bytes.extend_from_slice(&0i32.to_le_bytes());
        if let Some(effect) = op.stack_effect() {
            self.adjust(effect);
        }
        match op {
            Opcode::STryC | Opcode::STryF => self.note_block(1),
            _ => {}
        }
        Patch(at)
    }

    /// Emits a branch to an already-known address.
    pub fn emit_branch_to(&mut self, op: Opcode, target: u32) {
        let patch = self.emit_branch(op);
        self.patch_to(patch, target);
    }

    /// Resolves a forward branch to the current address.
    pub fn patch(&mut self, patch: Patch) {
        self.patch_to(patch, self.here());
    }

    pub fn patch_to(&mut self, patch: Patch, target: u32) {
        self.bytes[patch.0..patch.0 + 4].copy_from_slice(&(target as i32).to_le_bytes());
    }

    /// Records that the teardown of `End` lowered the tracked block depth.
    pub fn end_to(&mut self, depth: i32) {
        debug_assert!(depth <= self.block);
        self.emit_arg(Opcode::End, depth as u32);
        self.block = depth;
    }

    /// Emits `End` for a teardown that transfers control elsewhere (break
    /// crossing blocks): the tracked depth is *not* lowered because the
    /// fall-through path keeps its blocks.
    pub fn end_for_jump(&mut self, depth: i32) {
        debug_assert!(depth <= self.block);
        self.emit_arg(Opcode::End, depth as u32);
    }

    /// Adjusts the depth tracker for values materialized out of band
    /// (the thrown value pushed at a catch handler entry, values dropped
    /// on a dead fall-through path).
    pub fn assume_stack(&mut self, delta: i16) {
        self.adjust(delta);
    }

    /// Re-seeds the block-depth tracker at a join point reached by a
    /// branch rather than by fall-through (catch handlers, finally
    /// bodies).
    pub fn assume_block(&mut self, depth: i32) {
        self.block = depth;
        self.maxblock = self.maxblock.max(self.block);
    }

    /// Opens a finally-table entry for a `STryF` about to be emitted.
    pub fn open_finally(&mut self) -> FinallyHandle {
        self.finally_table.push(FinallyEntry { body: 0, end: 0 });
        FinallyHandle(self.finally_table.len() - 1)
    }

    pub fn set_finally_body(&mut self, handle: FinallyHandle, addr: u32) {
        self.finally_table[handle.0].body = addr;
    }

    pub fn set_finally_end(&mut self, handle: FinallyHandle, addr: u32) {
        self.finally_table[handle.0].end = addr;
    }

    /// Interns a literal with structural deduplication and emits the push.
    pub fn emit_literal(&mut self, value: &Value) {
        let index = self.literal_index(value);
        self.emit_arg(Opcode::Literal, index);
    }

    fn literal_index(&mut self, value: &Value) -> u32 {
        match value {
            Value::Undefined | Value::Null | Value::Bool(_) => {
                let tag = match value {
                    Value::Undefined => 0,
                    Value::Null => 1,
                    Value::Bool(false) => 2,
                    _ => 3,
                };
                if let Some(&index) = self.singleton_pool.get(&tag) {
                    return index;
                }
                let index = self.literals.len() as u32;
                self.literals.push(value.clone());
                self.singleton_pool.insert(tag, index);
                index
            }
            Value::Number(n) => {
                let bits = n.to_bits();
                if let Some(&index) = self.number_pool.get(&bits) {
                    return index;
                }
                let index = self.literals.len() as u32;
                self.literals.push(Value::Number(*n));
                self.number_pool.insert(bits, index);
                index
            }
            Value::Str(s) => {
                if let Some(&index) = self.string_pool.get(s) {
                    return index;
                }
                let index = self.literals.len() as u32;
                self.literals.push(Value::Str(s.clone()));
                self.string_pool.insert(s.clone(), index);
                index
            }
            Value::Object(_) => unreachable!("objects never enter the literal pool"),
        }
    }

    /// Adds a function-pool entry and emits its instantiation.
    pub fn emit_func(&mut self, def: FunctionId) {
        let index = self.functions.len() as u32;
        self.functions.push(def);
        self.emit_arg(Opcode::Func, index);
    }

    /// Finishes the build.
    pub fn build(self, keep_completions: bool, filename: Option<Rc<str>>) -> Code {
        debug_assert_eq!(self.block, 0, "unbalanced block scopes at end of code");
        Code {
            bytes: self.bytes,
            literals: self.literals,
            functions: self.functions,
            finally_table: self.finally_table,
            maxstack: self.maxstack.max(0) as u16,
            maxblock: self.maxblock.max(0) as u16,
            maxargc: self.maxargc,
            keep_completions,
            filename,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn literal_pool_deduplicates_structurally() {
        let mut b = CodeBuilder::new();
        b.emit_literal(&Value::Number(1.5));
        b.emit_literal(&Value::Number(1.5));
        b.emit_literal(&Value::Number(0.0));
        b.emit_literal(&Value::Number(-0.0));
        b.emit_literal(&Value::Str(JsString::from_str_slice("x")));
        b.emit_literal(&Value::Str(JsString::from_str_slice("x")));
        b.emit_literal(&Value::Undefined);
        b.emit_literal(&Value::Undefined);
        let code = b.build(false, None);
        // 1.5, +0, -0 (distinct bit patterns), "x", undefined
        assert_eq!(code.literals.len(), 5);
    }

    #[test]
    fn branch_patching_writes_absolute_offsets() {
        let mut b = CodeBuilder::new();
        b.emit_literal(&Value::Bool(true));
        b.emit(Opcode::ToBoolean);
        let jump = b.emit_branch(Opcode::BTrue);
        b.emit(Opcode::Nop);
        b.patch(jump);
        let code = b.build(false, None);

        let (op, _, next) = code.decode(0);
        assert_eq!(op, Opcode::Literal);
        let (op, _, next) = code.decode(next);
        assert_eq!(op, Opcode::ToBoolean);
        let (op, target, next) = code.decode(next);
        assert_eq!(op, Opcode::BTrue);
        let (nop, _, end) = code.decode(next);
        assert_eq!(nop, Opcode::Nop);
        assert_eq!(target as usize, end, "branch lands after the Nop");
    }

    #[test]
    fn stack_bound_tracks_the_high_water_mark() {
        let mut b = CodeBuilder::new();
        b.emit_literal(&Value::Number(1.0));
        b.emit_literal(&Value::Number(2.0));
        b.emit_literal(&Value::Number(3.0));
        b.emit(Opcode::Add);
        b.emit(Opcode::Add);
        b.emit(Opcode::SetC);
        let code = b.build(true, None);
        assert_eq!(code.maxstack, 3);
    }
}
