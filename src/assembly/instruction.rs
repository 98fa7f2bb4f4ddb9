//! Instruction representation for decoded method bodies.

/// Control-flow classification of an instruction.
///
/// The CFG builder derives leaders and successor edges purely from this classification plus
/// the operand, so a decoding layer only has to tag each instruction once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    /// Falls through to the next instruction.
    Sequential,
    /// Always transfers to the jump target.
    UnconditionalBranch,
    /// Transfers to the jump target or falls through.
    ConditionalBranch,
    /// Multi-way transfer through a switch table.
    Switch,
    /// Returns from the method; no successors.
    Return,
    /// Raises an exception; no regular successors.
    Throw,
}

impl FlowType {
    /// Returns `true` for return/throw instructions, which terminate a block with no
    /// fallthrough successor.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, FlowType::Return | FlowType::Throw)
    }

    /// Returns `true` if control can continue past this instruction into the next one.
    #[must_use]
    pub const fn has_fallthrough(self) -> bool {
        matches!(self, FlowType::Sequential | FlowType::ConditionalBranch)
    }
}

/// A constant pushed by a load-constant instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// Null reference constant.
    Null,
    /// Integer constant (covers all integral widths).
    Int(i64),
    /// Floating-point constant.
    Float(f64),
    /// String literal constant.
    Str(String),
}

/// A direct call-site reference: resolved owner, name and descriptor of the callee.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallRef {
    /// Internal name of the class declaring the callee (e.g. `com/example/Foo`).
    pub owner: String,
    /// Callee method name.
    pub name: String,
    /// Callee method descriptor.
    pub descriptor: String,
}

impl CallRef {
    /// Canonical call-bag token: `owner#name:descriptor`.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}#{}:{}", self.owner, self.name, self.descriptor)
    }
}

/// A field access reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Internal name of the class declaring the field.
    pub owner: String,
    /// Field name.
    pub name: String,
    /// Field type descriptor.
    pub descriptor: String,
}

/// Typed operand of a decoded instruction.
///
/// Jump and switch targets are instruction indices into the owning method's stream, not
/// byte offsets; the decoding layer resolves labels before handing bodies to this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand.
    None,
    /// Branch target as an instruction index.
    Jump(usize),
    /// Switch table: default target plus case targets, all instruction indices.
    Switch {
        /// Default branch target.
        default: usize,
        /// Case branch targets in table order.
        cases: Vec<usize>,
    },
    /// Constant pushed onto the evaluation stack.
    Const(ConstValue),
    /// Direct call site.
    Call(CallRef),
    /// Dynamic call site; only name and descriptor are stable across builds.
    DynamicCall {
        /// Call-site name.
        name: String,
        /// Call-site descriptor.
        descriptor: String,
    },
    /// Field read or write.
    Field(FieldRef),
    /// Local variable slot index.
    Local(u16),
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Raw opcode byte; feature histograms are binned over the full 0..=255 range.
    pub opcode: u8,
    /// Typed operand.
    pub operand: Operand,
    /// Control-flow classification.
    pub flow: FlowType,
}

impl Instruction {
    /// Creates a plain sequential instruction with no operand.
    #[must_use]
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            operand: Operand::None,
            flow: FlowType::Sequential,
        }
    }

    /// Returns `true` if this instruction pushes a constant.
    #[must_use]
    pub fn pushes_constant(&self) -> bool {
        matches!(self.operand, Operand::Const(_))
    }

    /// Returns the branch targets of this instruction, in operand order.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<usize> {
        match &self.operand {
            Operand::Jump(t) => vec![*t],
            Operand::Switch { default, cases } => {
                let mut out = Vec::with_capacity(cases.len() + 1);
                out.push(*default);
                out.extend_from_slice(cases);
                out
            }
            _ => Vec::new(),
        }
    }
}
