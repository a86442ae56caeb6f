//! Render populated graphs as C programs with prints or asserts
//!
//! Expected values for a node are computed once from the node's
//! canonical representative; every member expression is then compared
//! against the node's first member and against the expected numbers.
//! Emission never mutates the graph.

use crate::ctype::Variable;
use crate::error::ModelError;
use crate::graph::{Graph, Node, Resolved};
use crate::machine::{Machine, SizeAlign};

/// What each generated statement does with a measured size/alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// `printf` the measured values, for comparing tool outputs.
    Prints,
    /// `_Static_assert` the values, checked by an external C compiler.
    StaticAsserts,
    /// Runtime `assert` the values, checked by the external analyzer.
    Asserts,
}

impl EmitMode {
    /// Mark used in generated file names.
    pub fn slug(&self) -> &'static str {
        match self {
            EmitMode::Prints => "prints",
            EmitMode::StaticAsserts => "static-asserts",
            EmitMode::Asserts => "asserts",
        }
    }
}

/// Expected size and alignment of a node's expressions for a concrete
/// variable: the representative's numbers, with the variable's declared
/// alignment taking precedence when the representative is the variable.
fn expected_for(
    node: &Node,
    variable: &Variable,
    machine: &Machine,
) -> Result<SizeAlign, ModelError> {
    match node.repr.resolve(variable)? {
        Resolved::Variable(v) => {
            let base = machine.size_align_of(&v.ctype);
            let align = machine.align_of(v.align).unwrap_or(base.align);
            Ok(SizeAlign::new(base.size, align))
        }
        Resolved::Type(ctype) => Ok(machine.size_align_of(&ctype)),
    }
}

/// Expected `(label, size, alignment)` for every populated node, for
/// building external test oracles.
pub fn expected_size_align(
    graph: &Graph,
    variable: &Variable,
    machine: &Machine,
) -> Result<Vec<(String, u64, u64)>, ModelError> {
    let mut rows = Vec::new();
    for node in graph.nodes() {
        let Some(label) = node.expressions().first() else {
            continue;
        };
        let expected = expected_for(node, variable, machine)?;
        rows.push((label.to_string(), expected.size, expected.align));
    }
    Ok(rows)
}

/// Compose the program that checks all expressions generated for the
/// variable, using prints or asserts.
pub fn program_text(
    graph: &Graph,
    variable: &Variable,
    machine: &Machine,
    mode: EmitMode,
) -> Result<String, ModelError> {
    let mut text = String::from("extern void abort( void );\n");
    match mode {
        EmitMode::Prints => {
            text.push_str("extern int printf( const char *restrict format, ... );\n");
        }
        EmitMode::Asserts => text.push_str("#include <assert.h>\n"),
        EmitMode::StaticAsserts => {}
    }

    for layer in variable.ctype.typedefs() {
        text.push_str(&format!("{};\n", layer.declaration));
    }
    text.push_str(&format!("{};\n", variable.declaration));
    text.push_str("int main() {\nint zero = 0;\nint unit = zero + 1;\n");

    for node in graph.nodes() {
        let Some(label) = node.expressions().first() else {
            continue;
        };
        let expected = expected_for(node, variable, machine)?;
        for expr in node.expressions() {
            match mode {
                EmitMode::Prints => {
                    text.push_str(&format!(
                        "printf(\"{}\\ta:%ld, s:%ld\\n\", _Alignof({}), sizeof({}));\n",
                        expr, expr, expr
                    ));
                }
                EmitMode::StaticAsserts => {
                    for (check, message) in checks(expr, label, expected) {
                        text.push_str(&format!("_Static_assert({}, \"{}\");\n", check, message));
                    }
                }
                EmitMode::Asserts => {
                    for (check, _) in checks(expr, label, expected) {
                        text.push_str(&format!("assert({});\n", check));
                    }
                }
            }
        }
    }

    text.push_str("return unit - 1;\n}\n");
    Ok(text)
}

/// The four checks emitted per expression: agreement with the node's
/// first member, then agreement with the expected numbers.
fn checks(
    expr: &crate::expr::Expression,
    label: &crate::expr::Expression,
    expected: SizeAlign,
) -> [(String, String); 4] {
    [
        (
            format!("sizeof({}) == sizeof({})", expr, label),
            format!("{} differs from {} by size", expr, label),
        ),
        (
            format!("_Alignof({}) == _Alignof({})", expr, label),
            format!("{} differs from {} by align", expr, label),
        ),
        (
            format!("_Alignof({}) == {}", expr, expected.align),
            format!("align of {} differs from expected", expr),
        ),
        (
            format!("sizeof({}) == {}", expr, expected.size),
            format!("size of {} differs from expected", expr),
        ),
    ]
}
