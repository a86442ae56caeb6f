//! Machine models: sizes and alignments of basic C types per target
//!
//! Two little-endian models are shipped, matching the `-m32` and `-m64`
//! GCC/Clang target options. A model is validated at construction: each
//! wider integer or floating rank must have size and alignment at least
//! those of the next narrower rank.

use crate::align::Alignment;
use crate::ctype::{CType, CTypeKind, FloatDomain, NumberKind};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// A size and alignment pair, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeAlign {
    pub size: u64,
    pub align: u64,
}

impl SizeAlign {
    pub const fn new(size: u64, align: u64) -> SizeAlign {
        SizeAlign { size, align }
    }
}

/// A machine model holds sizes and alignments for basic C types and
/// computes sizes and alignments for other types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub name: &'static str,
    /// Target option passed to GCC.
    pub gcc_option: &'static str,
    /// Target option passed to Clang.
    pub clang_option: &'static str,
    /// Target option passed to the external analyzer.
    pub analyzer_option: &'static str,
    void: SizeAlign,
    boolean: SizeAlign,
    /// By [`crate::ctype::IntRank`]: char, short, int, long, long long.
    ints: [SizeAlign; 5],
    /// By [`crate::ctype::FloatRank`]: float, double, long double.
    floats: [SizeAlign; 3],
    pointer: SizeAlign,
    align_max: u64,
}

impl Machine {
    /// Build a model, checking the rank monotonicity invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        gcc_option: &'static str,
        clang_option: &'static str,
        analyzer_option: &'static str,
        void: SizeAlign,
        boolean: SizeAlign,
        ints: [SizeAlign; 5],
        floats: [SizeAlign; 3],
        pointer: SizeAlign,
        align_max: u64,
    ) -> Result<Machine, ModelError> {
        let inconsistent = |message: String| ModelError::InconsistentMachine {
            name: name.to_string(),
            message,
        };
        for pair in ints.windows(2) {
            if pair[1].size < pair[0].size || pair[1].align < pair[0].align {
                return Err(inconsistent(format!(
                    "integer rank {:?} is narrower than its predecessor {:?}",
                    pair[1], pair[0]
                )));
            }
        }
        for pair in floats.windows(2) {
            if pair[1].size < pair[0].size || pair[1].align < pair[0].align {
                return Err(inconsistent(format!(
                    "floating rank {:?} is narrower than its predecessor {:?}",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(Machine {
            name,
            gcc_option,
            clang_option,
            analyzer_option,
            void,
            boolean,
            ints,
            floats,
            pointer,
            align_max,
        })
    }

    /// The `-m32` x86 Linux target.
    pub fn linux32() -> Machine {
        Machine::new(
            "linux32",
            "-m32",
            "-m32",
            "-32",
            SizeAlign::new(1, 1),
            SizeAlign::new(1, 1),
            [
                SizeAlign::new(1, 1),
                SizeAlign::new(2, 2),
                SizeAlign::new(4, 4),
                SizeAlign::new(4, 4),
                SizeAlign::new(8, 4),
            ],
            [
                SizeAlign::new(4, 4),
                SizeAlign::new(8, 4),
                SizeAlign::new(12, 4),
            ],
            SizeAlign::new(4, 4),
            16,
        )
        .expect("the linux32 model satisfies the rank invariants")
    }

    /// The `-m64` x86 Linux target.
    pub fn linux64() -> Machine {
        Machine::new(
            "linux64",
            "-m64",
            "-m64",
            "-64",
            SizeAlign::new(1, 1),
            SizeAlign::new(1, 1),
            [
                SizeAlign::new(1, 1),
                SizeAlign::new(2, 2),
                SizeAlign::new(4, 4),
                SizeAlign::new(8, 8),
                SizeAlign::new(8, 8),
            ],
            [
                SizeAlign::new(4, 4),
                SizeAlign::new(8, 8),
                SizeAlign::new(16, 16),
            ],
            SizeAlign::new(8, 8),
            16,
        )
        .expect("the linux64 model satisfies the rank invariants")
    }

    /// All shipped machine models.
    pub fn models() -> Vec<Machine> {
        vec![Machine::linux32(), Machine::linux64()]
    }

    /// The largest alignment the target supports
    /// (`__BIGGEST_ALIGNMENT__`).
    pub fn align_max(&self) -> u64 {
        self.align_max
    }

    /// Convert an alignment attribute to an actual alignment, or `None`
    /// when the attribute forces nothing.
    pub fn align_of(&self, align: Alignment) -> Option<u64> {
        match align {
            Alignment::NoAttr => None,
            Alignment::EmptyClause | Alignment::Biggest => Some(self.align_max),
            Alignment::Bytes(n) => Some(n),
        }
    }

    fn primitive(&self, kind: NumberKind) -> SizeAlign {
        match kind {
            NumberKind::Bool => self.boolean,
            NumberKind::Int { rank, .. } => self.ints[rank.index()],
            NumberKind::Float { rank, domain } => {
                let real = self.floats[rank.index()];
                match domain {
                    FloatDomain::Real | FloatDomain::Imaginary => real,
                    FloatDomain::Complex => SizeAlign::new(2 * real.size, real.align),
                }
            }
        }
    }

    /// Size and alignment of any type on this machine. An explicit
    /// alignment attribute on the type overrides the table default.
    pub fn size_align_of(&self, ctype: &CType) -> SizeAlign {
        let forced = self.align_of(ctype.effective_align());
        match &ctype.kind {
            CTypeKind::Void => self.void,
            CTypeKind::Number(kind) => {
                let base = self.primitive(*kind);
                SizeAlign::new(base.size, forced.unwrap_or(base.align))
            }
            CTypeKind::Pointer(_) => {
                SizeAlign::new(self.pointer.size, forced.unwrap_or(self.pointer.align))
            }
            CTypeKind::Array { element, len } => {
                let elem = self.size_align_of(element);
                SizeAlign::new(elem.size * len, forced.unwrap_or(elem.align))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctype::{FloatRank, IntRank};

    fn int_kind(rank: IntRank) -> CType {
        CType::number(NumberKind::Int {
            rank,
            unsigned: false,
        })
    }

    #[test]
    fn test_linux64_table() {
        let m = Machine::linux64();
        assert_eq!(m.size_align_of(&int_kind(IntRank::Int)), SizeAlign::new(4, 4));
        assert_eq!(m.size_align_of(&int_kind(IntRank::Long)), SizeAlign::new(8, 8));
        assert_eq!(
            m.size_align_of(&CType::long_double_type()),
            SizeAlign::new(16, 16)
        );
        assert_eq!(
            m.size_align_of(&CType::pointer_to(CType::char_type())),
            SizeAlign::new(8, 8)
        );
        assert_eq!(m.align_max(), 16);
    }

    #[test]
    fn test_linux32_table() {
        let m = Machine::linux32();
        assert_eq!(m.size_align_of(&int_kind(IntRank::Long)), SizeAlign::new(4, 4));
        assert_eq!(
            m.size_align_of(&int_kind(IntRank::LongLong)),
            SizeAlign::new(8, 4)
        );
        assert_eq!(
            m.size_align_of(&CType::long_double_type()),
            SizeAlign::new(12, 4)
        );
        assert_eq!(
            m.size_align_of(&CType::pointer_to(CType::void())),
            SizeAlign::new(4, 4)
        );
    }

    #[test]
    fn test_complex_doubles_size_only() {
        let m = Machine::linux64();
        let complex = CType::number(NumberKind::Float {
            rank: FloatRank::Double,
            domain: FloatDomain::Complex,
        });
        let imaginary = CType::number(NumberKind::Float {
            rank: FloatRank::Double,
            domain: FloatDomain::Imaginary,
        });
        assert_eq!(m.size_align_of(&complex), SizeAlign::new(16, 8));
        assert_eq!(m.size_align_of(&imaginary), SizeAlign::new(8, 8));
    }

    #[test]
    fn test_attribute_overrides_alignment() {
        let m = Machine::linux64();
        let t = CType::int_type()
            .with_typedef("t", Alignment::Bytes(16))
            .unwrap();
        assert_eq!(m.size_align_of(&t), SizeAlign::new(4, 16));

        let biggest = CType::int_type()
            .with_typedef("t", Alignment::Biggest)
            .unwrap();
        assert_eq!(m.size_align_of(&biggest), SizeAlign::new(4, 16));
    }

    #[test]
    fn test_array_size_is_element_times_count() {
        let m = Machine::linux64();
        let a = CType::array_of(int_kind(IntRank::Int), 3);
        assert_eq!(m.size_align_of(&a), SizeAlign::new(12, 4));
        let aa = CType::array_of(CType::array_of(CType::char_type(), 4), 2);
        assert_eq!(m.size_align_of(&aa), SizeAlign::new(8, 1));
    }

    #[test]
    fn test_align_of_attribute() {
        let m = Machine::linux32();
        assert_eq!(m.align_of(Alignment::NoAttr), None);
        assert_eq!(m.align_of(Alignment::EmptyClause), Some(16));
        assert_eq!(m.align_of(Alignment::Biggest), Some(16));
        assert_eq!(m.align_of(Alignment::Bytes(2)), Some(2));
    }

    #[test]
    fn test_inconsistent_model_is_rejected() {
        let result = Machine::new(
            "bad",
            "-m64",
            "-m64",
            "-64",
            SizeAlign::new(1, 1),
            SizeAlign::new(1, 1),
            [
                SizeAlign::new(1, 1),
                SizeAlign::new(2, 2),
                SizeAlign::new(4, 4),
                SizeAlign::new(2, 2),
                SizeAlign::new(8, 8),
            ],
            [
                SizeAlign::new(4, 4),
                SizeAlign::new(8, 8),
                SizeAlign::new(16, 16),
            ],
            SizeAlign::new(8, 8),
            16,
        );
        assert!(matches!(
            result,
            Err(ModelError::InconsistentMachine { .. })
        ));
    }
}
