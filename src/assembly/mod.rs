//! Decoded method-body input model.
//!
//! The matching core does not parse class files itself; an external decoding layer supplies
//! each method as a [`MethodBody`]: an ordered instruction stream with typed operands, an
//! exception table, the owner's internal name, the descriptor, and access flags. Everything
//! in this module is immutable per analysis.
//!
//! # Key Components
//!
//! - [`Instruction`] - One decoded instruction (opcode byte, operand, flow classification)
//! - [`Operand`] - Typed operand: jump target, switch table, call/field reference, constant
//! - [`FlowType`] - Control-flow classification used by the CFG builder
//! - [`MethodBody`] - The full per-method input contract

mod instruction;
mod method;

pub use instruction::{CallRef, ConstValue, FieldRef, FlowType, Instruction, Operand};
pub use method::{ExceptionHandler, MethodAccess, MethodBody};
