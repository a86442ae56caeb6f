//! C `__aligned__` attribute values
//!
//! An [`Alignment`] is the attribute written in a declaration or typedef,
//! not a resolved byte count: resolving "empty clause" or "biggest" needs
//! a machine model (see [`crate::machine::Machine::align_of`]).

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Power-of-two byte counts the generator enumerates in attribute sweeps.
pub const ALIGNMENT_BYTES: [u64; 7] = [1, 2, 4, 8, 16, 32, 64];

/// C alignment attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    /// No attribute in the declaration.
    NoAttr,
    /// `__attribute__((__aligned__))`: the compiler default maximum.
    EmptyClause,
    /// `__attribute__((__aligned__(__BIGGEST_ALIGNMENT__)))`.
    Biggest,
    /// `__attribute__((__aligned__(n)))` for a power-of-two byte count.
    Bytes(u64),
}

impl Alignment {
    /// The attribute string as written in a declaration. Empty for
    /// [`Alignment::NoAttr`].
    pub fn attr(&self) -> String {
        match self {
            Alignment::NoAttr => String::new(),
            Alignment::EmptyClause => "__attribute__((__aligned__))".to_string(),
            Alignment::Biggest => {
                "__attribute__((__aligned__(__BIGGEST_ALIGNMENT__)))".to_string()
            }
            Alignment::Bytes(n) => format!("__attribute__((__aligned__({})))", n),
        }
    }

    /// Shorthand mark used in generated file names.
    pub fn code(&self) -> String {
        match self {
            Alignment::NoAttr => "n".to_string(),
            Alignment::EmptyClause => "e".to_string(),
            Alignment::Biggest => "b".to_string(),
            Alignment::Bytes(n) => n.to_string(),
        }
    }

    /// Parse a literal GCC/Clang attribute string. An unrecognized string
    /// is a parse failure, never a silent default.
    pub fn from_attr(attr: &str) -> Result<Alignment, ModelError> {
        let unknown = || ModelError::UnknownAttribute {
            attr: attr.to_string(),
        };

        let compact: String = attr.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Ok(Alignment::NoAttr);
        }

        let compact = compact.replace("__", "");
        let inner = compact
            .strip_prefix("attribute((aligned")
            .and_then(|rest| rest.strip_suffix("))"))
            .ok_or_else(unknown)?;

        if inner.is_empty() || inner == "()" {
            return Ok(Alignment::EmptyClause);
        }

        let clause = inner
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(unknown)?;

        if clause == "BIGGEST_ALIGNMENT" {
            return Ok(Alignment::Biggest);
        }

        let bytes: u64 = clause.parse().map_err(|_| unknown())?;
        if ALIGNMENT_BYTES.contains(&bytes) {
            Ok(Alignment::Bytes(bytes))
        } else {
            Err(unknown())
        }
    }

    /// Every enumerated attribute, in sweep order.
    pub fn enumerated() -> Vec<Alignment> {
        let mut all = vec![
            Alignment::NoAttr,
            Alignment::EmptyClause,
            Alignment::Biggest,
        ];
        all.extend(ALIGNMENT_BYTES.iter().map(|n| Alignment::Bytes(*n)));
        all
    }

    /// The two nearest (but not equal) enumerated byte alignments around
    /// `number`, used to bound attribute sweeps around a type's default.
    pub fn two_nearest(number: u64) -> (Alignment, Alignment) {
        let below = ALIGNMENT_BYTES.iter().copied().filter(|b| *b < number).max();
        let above = ALIGNMENT_BYTES.iter().copied().filter(|b| *b > number).min();
        match (below, above) {
            (None, _) => (Alignment::Bytes(2), Alignment::Bytes(4)),
            (Some(b), Some(a)) => (Alignment::Bytes(b), Alignment::Bytes(a)),
            (Some(b), None) => {
                let lower = ALIGNMENT_BYTES
                    .iter()
                    .copied()
                    .filter(|x| *x < b)
                    .max()
                    .unwrap_or(b);
                (Alignment::Bytes(lower), Alignment::Bytes(b))
            }
        }
    }
}
