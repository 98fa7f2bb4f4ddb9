//! Structural normalization applied before feature collection.
//!
//! Two policy-driven rewrites make obfuscated and clean builds of the same method look
//! alike without any decompilation: guard elision strips compiler-inserted early-out
//! guards, and runtime-exception rethrow unwrapping removes wrapper try/catch shells that
//! obfuscators add around otherwise identical bodies.

use std::collections::BTreeSet;

use crate::assembly::{FlowType, Instruction, MethodBody, Operand};

/// Leading window (in instructions) scanned for guard elision.
const GUARD_WINDOW: usize = 8;

/// Exception type whose rethrow-only handlers are unwrapped.
const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";

/// Options controlling normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Elide adjacent (push-constant, return) guard pairs in the leading window.
    pub guard_elision: bool,
    /// Unwrap handlers that only rethrow a `RuntimeException`.
    pub unwrap_rethrow: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            guard_elision: true,
            unwrap_rethrow: true,
        }
    }
}

impl NormalizeOptions {
    /// Version token embedded in the options fingerprint.
    pub const VERSION: u32 = 1;

    /// Flat `key=value;...` fingerprint of these options.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "guard={};rethrow={};version={}",
            self.guard_elision,
            self.unwrap_rethrow,
            Self::VERSION
        )
    }
}

/// A method body seen through the normalization filter.
///
/// Holds the kept instruction indices of the underlying body; iteration yields
/// `(original_index, instruction)` pairs so back-edge detection and other order-sensitive
/// features can still compare positions in the original stream.
#[derive(Debug)]
pub struct NormalizedMethod<'a> {
    body: &'a MethodBody,
    kept: Vec<usize>,
    exception_bearing: bool,
}

impl<'a> NormalizedMethod<'a> {
    /// Applies the normalization policies to `body`.
    #[must_use]
    pub fn new(body: &'a MethodBody, options: &NormalizeOptions) -> Self {
        let mut excluded: BTreeSet<usize> = BTreeSet::new();
        let mut exception_bearing = !body.exception_table.is_empty();

        if options.guard_elision {
            Self::elide_guards(body, &mut excluded);
        }
        if options.unwrap_rethrow {
            exception_bearing = Self::unwrap_rethrows(body, &mut excluded, exception_bearing);
        }

        let kept = (0..body.instructions.len())
            .filter(|i| !excluded.contains(i))
            .collect();
        Self {
            body,
            kept,
            exception_bearing,
        }
    }

    /// The underlying body.
    #[must_use]
    pub fn body(&self) -> &MethodBody {
        self.body
    }

    /// Number of instructions surviving the filter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kept.len()
    }

    /// Whether the filtered sequence is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    /// Whether the method still carries try/catch structure after unwrapping.
    #[must_use]
    pub fn exception_bearing(&self) -> bool {
        self.exception_bearing
    }

    /// Iterates the filtered sequence as `(original_index, instruction)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Instruction)> + '_ {
        self.kept.iter().map(|&i| (i, &self.body.instructions[i]))
    }

    fn elide_guards(body: &MethodBody, excluded: &mut BTreeSet<usize>) {
        let window = body.instructions.len().min(GUARD_WINDOW);
        for i in 0..window.saturating_sub(1) {
            let a = &body.instructions[i];
            let b = &body.instructions[i + 1];
            if a.pushes_constant() && b.flow == FlowType::Return {
                excluded.insert(i);
                excluded.insert(i + 1);
            }
        }
    }

    fn unwrap_rethrows(
        body: &MethodBody,
        excluded: &mut BTreeSet<usize>,
        exception_bearing: bool,
    ) -> bool {
        let mut remaining = body.exception_table.len();
        for handler in &body.exception_table {
            if handler.catch_type.as_deref() != Some(RUNTIME_EXCEPTION) {
                continue;
            }
            if let Some(throw_index) = Self::rethrow_index(body, handler.handler) {
                excluded.insert(throw_index);
                remaining -= 1;
            }
        }
        exception_bearing && remaining > 0
    }

    /// Returns the index of the rethrow if the handler at `start` unconditionally rethrows:
    /// only plain sequential loads between the entry and a throw, nothing else.
    fn rethrow_index(body: &MethodBody, start: usize) -> Option<usize> {
        for (i, insn) in body.instructions.iter().enumerate().skip(start) {
            match insn.flow {
                FlowType::Throw => return Some(i),
                FlowType::Sequential => {
                    if !matches!(insn.operand, Operand::None | Operand::Local(_)) {
                        return None;
                    }
                }
                _ => return None,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{ConstValue, ExceptionHandler};

    fn push_const() -> Instruction {
        Instruction {
            opcode: 0x03,
            operand: Operand::Const(ConstValue::Int(0)),
            flow: FlowType::Sequential,
        }
    }

    fn ret() -> Instruction {
        Instruction {
            opcode: 0xAC,
            operand: Operand::None,
            flow: FlowType::Return,
        }
    }

    fn throw() -> Instruction {
        Instruction {
            opcode: 0xBF,
            operand: Operand::None,
            flow: FlowType::Throw,
        }
    }

    #[test]
    fn test_guard_pair_elided_in_window() {
        let body = MethodBody {
            instructions: vec![push_const(), ret(), Instruction::simple(0x00), ret()],
            ..MethodBody::new("a/B", "m", "()I")
        };
        let norm = NormalizedMethod::new(&body, &NormalizeOptions::default());
        let indices: Vec<usize> = norm.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[test]
    fn test_guard_pair_outside_window_kept() {
        let mut instructions = vec![Instruction::simple(0x00); 8];
        instructions.push(push_const());
        instructions.push(ret());
        let body = MethodBody {
            instructions,
            ..MethodBody::new("a/B", "m", "()I")
        };
        let norm = NormalizedMethod::new(&body, &NormalizeOptions::default());
        assert_eq!(norm.len(), 10);
    }

    #[test]
    fn test_rethrow_handler_unwrapped() {
        let body = MethodBody {
            instructions: vec![Instruction::simple(0x00), ret(), Instruction::simple(0x00), throw()],
            exception_table: vec![ExceptionHandler {
                start: 0,
                end: 2,
                handler: 2,
                catch_type: Some("java/lang/RuntimeException".to_string()),
            }],
            ..MethodBody::new("a/B", "m", "()V")
        };
        let norm = NormalizedMethod::new(&body, &NormalizeOptions::default());
        assert!(!norm.exception_bearing());
        assert!(norm.iter().all(|(_, insn)| insn.flow != FlowType::Throw));
    }

    #[test]
    fn test_other_catch_type_not_unwrapped() {
        let body = MethodBody {
            instructions: vec![Instruction::simple(0x00), ret(), Instruction::simple(0x00), throw()],
            exception_table: vec![ExceptionHandler {
                start: 0,
                end: 2,
                handler: 2,
                catch_type: Some("java/io/IOException".to_string()),
            }],
            ..MethodBody::new("a/B", "m", "()V")
        };
        let norm = NormalizedMethod::new(&body, &NormalizeOptions::default());
        assert!(norm.exception_bearing());
        assert_eq!(norm.len(), 4);
    }

    #[test]
    fn test_conditional_handler_not_unwrapped() {
        let body = MethodBody {
            instructions: vec![
                Instruction::simple(0x00),
                ret(),
                Instruction {
                    opcode: 0x99,
                    operand: Operand::Jump(4),
                    flow: FlowType::ConditionalBranch,
                },
                throw(),
                ret(),
            ],
            exception_table: vec![ExceptionHandler {
                start: 0,
                end: 2,
                handler: 2,
                catch_type: Some("java/lang/RuntimeException".to_string()),
            }],
            ..MethodBody::new("a/B", "m", "()V")
        };
        let norm = NormalizedMethod::new(&body, &NormalizeOptions::default());
        assert!(norm.exception_bearing());
        assert_eq!(norm.len(), 5);
    }

    #[test]
    fn test_options_fingerprint() {
        let fp = NormalizeOptions::default().fingerprint();
        assert_eq!(fp, "guard=true;rethrow=true;version=1");
    }
}
