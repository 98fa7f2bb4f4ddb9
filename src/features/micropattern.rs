//! Micropattern bit set: boolean structural predicates over a method body.
//!
//! Bit positions are frozen. Persisted digests, cached feature vectors and the corpus
//! weight keys all depend on this order; new predicates must be appended, never inserted.

use bitflags::bitflags;

use crate::assembly::{FlowType, Operand};
use crate::features::NormalizedMethod;

/// Filtered-instruction count at or above which a method is considered large.
const LARGE_THRESHOLD: usize = 50;

bitflags! {
    /// Frozen-order 17-bit micropattern set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MicroPatterns: u32 {
        /// Bit 0: makes no calls.
        const LEAF = 1 << 0;
        /// Bit 1: calls itself.
        const SELF_RECURSIVE = 1 << 1;
        /// Bit 2: contains a throw.
        const THROWS = 1 << 2;
        /// Bit 3: reads an array element.
        const READS_ARRAY = 1 << 3;
        /// Bit 4: writes an array element.
        const WRITES_ARRAY = 1 << 4;
        /// Bit 5: has a backward jump.
        const HAS_LOOP = 1 << 5;
        /// Bit 6: has a switch.
        const HAS_SWITCH = 1 << 6;
        /// Bit 7: allocates an object.
        const ALLOCATES_OBJECT = 1 << 7;
        /// Bit 8: allocates an array.
        const ALLOCATES_ARRAY = 1 << 8;
        /// Bit 9: reads a field.
        const READS_FIELD = 1 << 9;
        /// Bit 10: writes a field.
        const WRITES_FIELD = 1 << 10;
        /// Bit 11: returns a constant.
        const RETURNS_CONSTANT = 1 << 11;
        /// Bit 12: is a constructor or static initializer.
        const IS_CONSTRUCTOR = 1 << 12;
        /// Bit 13: returns void.
        const RETURNS_VOID = 1 << 13;
        /// Bit 14: filtered body has at least 50 instructions.
        const IS_LARGE = 1 << 14;
        /// Bit 15: declared synchronized.
        const IS_SYNCHRONIZED = 1 << 15;
        /// Bit 16: carries try/catch structure after normalization.
        const HAS_TRY_CATCH = 1 << 16;
    }
}

impl MicroPatterns {
    /// Number of defined bits.
    pub const COUNT: u32 = 17;

    /// Extracts the pattern set from a normalized method.
    #[must_use]
    pub fn extract(method: &NormalizedMethod<'_>) -> Self {
        let body = method.body();
        let mut bits = MicroPatterns::LEAF;

        let mut prev_pushed_const = false;
        for (index, insn) in method.iter() {
            match &insn.operand {
                Operand::Call(call) => {
                    bits.remove(MicroPatterns::LEAF);
                    if call.owner == body.owner
                        && call.name == body.name
                        && call.descriptor == body.descriptor
                    {
                        bits.insert(MicroPatterns::SELF_RECURSIVE);
                    }
                }
                Operand::DynamicCall { .. } => bits.remove(MicroPatterns::LEAF),
                Operand::Field(_) => match insn.opcode {
                    0xB2 | 0xB4 => bits.insert(MicroPatterns::READS_FIELD),
                    0xB3 | 0xB5 => bits.insert(MicroPatterns::WRITES_FIELD),
                    _ => {}
                },
                Operand::Jump(target) => {
                    if *target <= index {
                        bits.insert(MicroPatterns::HAS_LOOP);
                    }
                }
                _ => {}
            }

            match insn.flow {
                FlowType::Throw => bits.insert(MicroPatterns::THROWS),
                FlowType::Switch => bits.insert(MicroPatterns::HAS_SWITCH),
                FlowType::Return if prev_pushed_const => {
                    bits.insert(MicroPatterns::RETURNS_CONSTANT);
                }
                _ => {}
            }

            match insn.opcode {
                0x2E..=0x35 => bits.insert(MicroPatterns::READS_ARRAY),
                0x4F..=0x56 => bits.insert(MicroPatterns::WRITES_ARRAY),
                0xBB => bits.insert(MicroPatterns::ALLOCATES_OBJECT),
                0xBC | 0xBD | 0xC5 => bits.insert(MicroPatterns::ALLOCATES_ARRAY),
                _ => {}
            }

            prev_pushed_const = insn.pushes_constant();
        }

        if body.is_constructor() {
            bits.insert(MicroPatterns::IS_CONSTRUCTOR);
        }
        if body.returns_void() {
            bits.insert(MicroPatterns::RETURNS_VOID);
        }
        if method.len() >= LARGE_THRESHOLD {
            bits.insert(MicroPatterns::IS_LARGE);
        }
        if body.access.contains(crate::assembly::MethodAccess::SYNCHRONIZED) {
            bits.insert(MicroPatterns::IS_SYNCHRONIZED);
        }
        if method.exception_bearing() {
            bits.insert(MicroPatterns::HAS_TRY_CATCH);
        }
        bits
    }

    /// Jaccard similarity of two bit sets. Two empty sets compare as 1.0.
    #[must_use]
    pub fn jaccard(self, other: Self) -> f64 {
        let union = (self | other).bits().count_ones();
        if union == 0 {
            return 1.0;
        }
        let inter = (self & other).bits().count_ones();
        f64::from(inter) / f64::from(union)
    }

    /// Iterates set bit indices in ascending order.
    pub fn set_bits(self) -> impl Iterator<Item = u32> {
        (0..Self::COUNT).filter(move |&i| self.bits() & (1 << i) != 0)
    }
}
