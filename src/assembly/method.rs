//! Method body: the per-method input contract of the matching core.

use bitflags::bitflags;

use crate::assembly::Instruction;

bitflags! {
    /// Method access and property flags, as supplied by the decoding layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAccess: u32 {
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`.
        const FINAL = 0x0010;
        /// Declared `synchronized`.
        const SYNCHRONIZED = 0x0020;
        /// Has no body in the artifact.
        const ABSTRACT = 0x0400;
        /// Compiler-generated.
        const SYNTHETIC = 0x1000;
    }
}

/// One entry of a method's exception table.
///
/// `start..end` is a half-open instruction-index range; `handler` is the index of the first
/// handler instruction. A `catch_type` of `None` is a catch-all clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First instruction covered by the try-range.
    pub start: usize,
    /// One past the last instruction covered by the try-range.
    pub end: usize,
    /// Instruction index of the handler entry.
    pub handler: usize,
    /// Internal name of the caught exception type, `None` for catch-all.
    pub catch_type: Option<String>,
}

/// A decoded method body, immutable per analysis.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Internal name of the declaring class.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Method descriptor.
    pub descriptor: String,
    /// Access flags.
    pub access: MethodAccess,
    /// Ordered instruction stream.
    pub instructions: Vec<Instruction>,
    /// Exception table.
    pub exception_table: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Creates an empty method body for the given identity.
    #[must_use]
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: MethodAccess::empty(),
            instructions: Vec::new(),
            exception_table: Vec::new(),
        }
    }

    /// Canonical method key: `owner#name:descriptor`. Used as the stable id for call graphs,
    /// similarity matrices and cache entries.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}#{}:{}", self.owner, self.name, self.descriptor)
    }

    /// Returns `true` if the descriptor declares a `void` return.
    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.descriptor.ends_with(")V")
    }

    /// Returns `true` for constructors and static initializers.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_key() {
        let m = MethodBody::new("a/B", "run", "()V");
        assert_eq!(m.key(), "a/B#run:()V");
    }

    #[test]
    fn test_descriptor_queries() {
        assert!(MethodBody::new("a/B", "run", "()V").returns_void());
        assert!(!MethodBody::new("a/B", "size", "()I").returns_void());
        assert!(MethodBody::new("a/B", "<init>", "()V").is_constructor());
        assert!(MethodBody::new("a/B", "<clinit>", "()V").is_constructor());
        assert!(!MethodBody::new("a/B", "init", "()V").is_constructor());
    }
}
