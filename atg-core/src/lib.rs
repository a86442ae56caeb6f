//! Alignment Test Generator - core model
//!
//! Generates C programs that probe a compiler's (and a static
//! analyzer's) computation of `sizeof`/`_Alignof` over families of
//! syntactically distinct but size/alignment-equivalent expressions
//! derived from one declared variable.
//!
//! The crate is pure: graph construction and program emission are
//! in-memory computations with no file, network or subprocess access.

pub mod align;
pub mod ctype;
pub mod emit;
pub mod error;
pub mod expr;
pub mod graph;
pub mod machine;

pub use align::Alignment;
pub use ctype::{CType, CTypeKind, NumberKind, Variable};
pub use emit::EmitMode;
pub use error::ModelError;
pub use expr::Expression;
pub use graph::{ExpressionGenerator, Graph, GraphOptions, TypeShape};
pub use machine::{Machine, SizeAlign};
