//! Error types for the alignment test generator core
//!
//! All errors here are programming-contract violations detected at
//! construction time. They are never recoverable at the point of
//! detection: every operation in the core is pure and deterministic, so
//! a failure indicates a logic or input error, not a transient condition.

use thiserror::Error;

/// Contract violations in the type algebra, the expression algebra, the
/// machine tables and the equivalence graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("cannot declare variable `{name}` of void C type")]
    VoidDeclaration { name: String },

    #[error("declared name must not be empty")]
    UnnamedVariable,

    #[error("expression `{expr}` is not an lvalue")]
    NotAnLvalue { expr: String },

    #[error("cannot dereference `{expr}` of non-pointer type `{ctype}`")]
    DerefNonPointer { expr: String, ctype: String },

    #[error("`{index}` cannot be a subscript because its type is `{ctype}`")]
    NonNumericSubscript { index: String, ctype: String },

    #[error("`{expr}` cannot be subscripted because its type is `{ctype}`")]
    SubscriptNonPointer { expr: String, ctype: String },

    #[error("`{left} + {right}` is invalid because both operands are pointers")]
    PointerPlusPointer { left: String, right: String },

    #[error("C type `{ctype}` is not a scalar type")]
    NonScalarType { ctype: String },

    #[error("unrecognized alignment attribute `{attr}`")]
    UnknownAttribute { attr: String },

    #[error("typedef name `{name}` is already in use for `{ctype}`")]
    DuplicateTypedef { name: String, ctype: String },

    #[error("cannot remove a typedef from `{ctype}`: no typedef layers")]
    NoTypedefLayers { ctype: String },

    #[error("C type `{ctype}` has fewer than {levels} referenced levels")]
    ShallowType { ctype: String, levels: usize },

    #[error("graph for shape `{shape}` is already populated")]
    GraphAlreadyBuilt { shape: String },

    #[error("graph node `{title}` already exists")]
    DuplicateNode { title: String },

    #[error("unknown graph node `{title}`")]
    UnknownNode { title: String },

    #[error("machine model `{name}` is inconsistent: {message}")]
    InconsistentMachine { name: String, message: String },
}
