//! C number, pointer and array types, and declared variables
//!
//! Const and volatile qualifiers are not considered. Typedefs are modeled
//! as an immutable stack of layers on top of a base type; only the top
//! layer is active when new declarations are rendered.

use crate::align::Alignment;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer conversion ranks with a size/alignment entry in the machine
/// tables. Unsigned types share the entry of their signed rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntRank {
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

impl IntRank {
    pub(crate) fn index(self) -> usize {
        match self {
            IntRank::Char => 0,
            IntRank::Short => 1,
            IntRank::Int => 2,
            IntRank::Long => 3,
            IntRank::LongLong => 4,
        }
    }

    fn spelling(self) -> &'static str {
        match self {
            IntRank::Char => "char",
            IntRank::Short => "short",
            IntRank::Int => "int",
            IntRank::Long => "long",
            IntRank::LongLong => "long long",
        }
    }
}

/// Floating-point conversion ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FloatRank {
    Float,
    Double,
    LongDouble,
}

impl FloatRank {
    pub(crate) fn index(self) -> usize {
        match self {
            FloatRank::Float => 0,
            FloatRank::Double => 1,
            FloatRank::LongDouble => 2,
        }
    }

    fn spelling(self) -> &'static str {
        match self {
            FloatRank::Float => "float",
            FloatRank::Double => "double",
            FloatRank::LongDouble => "long double",
        }
    }
}

/// Domain of a floating-point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatDomain {
    Real,
    Complex,
    Imaginary,
}

/// Primitive kind of a C number type. Machine tables are looked up by
/// this tag, so size/alignment evaluation is a total match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberKind {
    Bool,
    Int { rank: IntRank, unsigned: bool },
    Float { rank: FloatRank, domain: FloatDomain },
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberKind::Bool => write!(f, "_Bool"),
            NumberKind::Int { rank, unsigned } => {
                if *unsigned {
                    write!(f, "unsigned {}", rank.spelling())
                } else {
                    write!(f, "{}", rank.spelling())
                }
            }
            NumberKind::Float { rank, domain } => match domain {
                FloatDomain::Real => write!(f, "{}", rank.spelling()),
                FloatDomain::Complex => write!(f, "{} _Complex", rank.spelling()),
                FloatDomain::Imaginary => write!(f, "{} _Imaginary", rank.spelling()),
            },
        }
    }
}

/// Structural kind of a C type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CTypeKind {
    /// Usable only behind a pointer, never as a variable type.
    Void,
    /// Any type with a bare number domain.
    Number(NumberKind),
    /// A pointer referencing some C type.
    Pointer(Box<CType>),
    /// An array type. Multidimensional arrays are arrays of arrays.
    Array { element: Box<CType>, len: u64 },
}

/// One typedef on top of a base type: its name, the alignment attribute
/// written in the typedef, and the full typedef statement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedefLayer {
    pub name: String,
    pub align: Alignment,
    pub declaration: String,
}

/// Some C type, possibly renamed through a stack of typedef layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CType {
    pub kind: CTypeKind,
    /// Alignment attribute bound directly to the type (e.g. written
    /// after `*` in a pointer declarator). Typedef layers carry their
    /// own alignment.
    pub align: Alignment,
    typedefs: Vec<TypedefLayer>,
}

impl CType {
    pub fn new(kind: CTypeKind) -> CType {
        CType {
            kind,
            align: Alignment::NoAttr,
            typedefs: Vec::new(),
        }
    }

    pub fn void() -> CType {
        CType::new(CTypeKind::Void)
    }

    pub fn number(kind: NumberKind) -> CType {
        CType::new(CTypeKind::Number(kind))
    }

    pub fn char_type() -> CType {
        CType::number(NumberKind::Int {
            rank: IntRank::Char,
            unsigned: false,
        })
    }

    pub fn short_type() -> CType {
        CType::number(NumberKind::Int {
            rank: IntRank::Short,
            unsigned: false,
        })
    }

    pub fn int_type() -> CType {
        CType::number(NumberKind::Int {
            rank: IntRank::Int,
            unsigned: false,
        })
    }

    pub fn long_double_type() -> CType {
        CType::number(NumberKind::Float {
            rank: FloatRank::LongDouble,
            domain: FloatDomain::Real,
        })
    }

    pub fn pointer_to(referenced: CType) -> CType {
        CType::new(CTypeKind::Pointer(Box::new(referenced)))
    }

    pub fn array_of(element: CType, len: u64) -> CType {
        CType::new(CTypeKind::Array {
            element: Box::new(element),
            len,
        })
    }

    /// Name usable in declarations: the active typedef name, or the
    /// type's own spelling. Unnamed pointer and array types have none.
    pub fn spelling(&self) -> Option<String> {
        if let Some(layer) = self.typedefs.last() {
            return Some(layer.name.clone());
        }
        match &self.kind {
            CTypeKind::Void => Some("void".to_string()),
            CTypeKind::Number(kind) => Some(kind.to_string()),
            CTypeKind::Pointer(_) | CTypeKind::Array { .. } => None,
        }
    }

    /// The type a pointer or array refers to.
    pub fn points_to(&self) -> Option<&CType> {
        match &self.kind {
            CTypeKind::Pointer(referenced) => Some(referenced),
            CTypeKind::Array { element, .. } => Some(element),
            CTypeKind::Void | CTypeKind::Number(_) => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, CTypeKind::Array { .. })
    }

    /// Scalar view of the type: numbers and pointers are themselves,
    /// arrays decay to a pointer to their element type.
    pub fn as_scalar(&self) -> Result<CType, ModelError> {
        match &self.kind {
            CTypeKind::Number(_) | CTypeKind::Pointer(_) => Ok(self.clone()),
            CTypeKind::Array { element, .. } => Ok(CType::pointer_to((**element).clone())),
            CTypeKind::Void => Err(ModelError::NonScalarType {
                ctype: self.to_string(),
            }),
        }
    }

    /// Alignment attribute in effect for this type: the active typedef
    /// layer's attribute, or the one bound to the base type.
    pub fn effective_align(&self) -> Alignment {
        self.typedefs
            .last()
            .map(|layer| layer.align)
            .unwrap_or(self.align)
    }

    pub fn typedefs(&self) -> &[TypedefLayer] {
        &self.typedefs
    }

    /// Render a declaration of `name` with this type and an alignment
    /// attribute. Declarator text is built inside out: pointer-to-array
    /// parenthesizes the declarator, pointer-to-void never recurses.
    pub fn declaration(&self, name: &str, align: Alignment) -> Result<String, ModelError> {
        if let Some(layer) = self.typedefs.last() {
            return Ok(joined(&[&layer.name, name, &align.attr()]));
        }
        match &self.kind {
            CTypeKind::Void => Err(ModelError::VoidDeclaration {
                name: name.to_string(),
            }),
            CTypeKind::Number(kind) => Ok(joined(&[&kind.to_string(), name, &align.attr()])),
            CTypeKind::Pointer(referenced) => match &referenced.kind {
                CTypeKind::Array { .. } if referenced.typedefs.is_empty() => {
                    referenced.declaration(&format!("(* {})", name), align)
                }
                CTypeKind::Void if referenced.typedefs.is_empty() => {
                    Ok(joined(&["void", "*", name, &align.attr()]))
                }
                _ => referenced.declaration(&format!("* {}", name), align),
            },
            CTypeKind::Array { element, len } => {
                element.declaration(&format!("{}[{}]", name, len), align)
            }
        }
    }

    /// Declare a variable of this C type.
    pub fn declare(&self, name: &str, align: Alignment) -> Result<Variable, ModelError> {
        if name.is_empty() {
            return Err(ModelError::UnnamedVariable);
        }
        let declaration = self.declaration(name, align)?;
        Ok(Variable {
            name: name.to_string(),
            align,
            ctype: self.clone(),
            declaration,
        })
    }

    /// Push a typedef layer named `name` with its own alignment
    /// attribute. The typedef statement is rendered from the previous
    /// layer's declarator. Returns a new type value.
    pub fn with_typedef(&self, name: &str, align: Alignment) -> Result<CType, ModelError> {
        if name.is_empty() {
            return Err(ModelError::UnnamedVariable);
        }
        let taken = self.typedefs.iter().any(|layer| layer.name == name)
            || self.spelling().as_deref() == Some(name);
        if taken {
            return Err(ModelError::DuplicateTypedef {
                name: name.to_string(),
                ctype: self.to_string(),
            });
        }
        let declaration = format!("typedef {}", self.declaration(name, align)?);
        let mut with = self.clone();
        with.typedefs.push(TypedefLayer {
            name: name.to_string(),
            align,
            declaration,
        });
        Ok(with)
    }

    /// Pop the most recent typedef layer. Fails when only the base type
    /// remains.
    pub fn without_typedef(&self) -> Result<CType, ModelError> {
        if self.typedefs.is_empty() {
            return Err(ModelError::NoTypedefLayers {
                ctype: self.to_string(),
            });
        }
        let mut without = self.clone();
        without.typedefs.pop();
        Ok(without)
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.spelling() {
            return write!(f, "{}", name);
        }
        match &self.kind {
            CTypeKind::Pointer(referenced) => write!(f, "{} *", referenced),
            CTypeKind::Array { element, len } => write!(f, "{}[{}]", element, len),
            // spelling() covers void and numbers
            CTypeKind::Void | CTypeKind::Number(_) => unreachable!(),
        }
    }
}

/// Some declared C variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub align: Alignment,
    pub ctype: CType,
    pub declaration: String,
}

/// Join non-empty words with single spaces.
fn joined(parts: &[&str]) -> String {
    let words: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_declarations() {
        let v = CType::int_type().declare("v", Alignment::NoAttr).unwrap();
        assert_eq!(v.declaration, "int v");

        let v = CType::int_type().declare("v", Alignment::Bytes(8)).unwrap();
        assert_eq!(v.declaration, "int v __attribute__((__aligned__(8)))");

        let v = CType::long_double_type()
            .declare("v", Alignment::NoAttr)
            .unwrap();
        assert_eq!(v.declaration, "long double v");
    }

    #[test]
    fn test_pointer_declarations() {
        let p = CType::pointer_to(CType::int_type());
        assert_eq!(
            p.declare("v", Alignment::NoAttr).unwrap().declaration,
            "int * v"
        );

        let pp = CType::pointer_to(p);
        assert_eq!(
            pp.declare("v", Alignment::NoAttr).unwrap().declaration,
            "int * * v"
        );

        let pv = CType::pointer_to(CType::void());
        assert_eq!(
            pv.declare("v", Alignment::Bytes(16)).unwrap().declaration,
            "void * v __attribute__((__aligned__(16)))"
        );
    }

    #[test]
    fn test_array_declarations() {
        let a = CType::array_of(CType::char_type(), 3);
        assert_eq!(
            a.declare("v", Alignment::NoAttr).unwrap().declaration,
            "char v[3]"
        );

        let aa = CType::array_of(CType::array_of(CType::int_type(), 4), 3);
        assert_eq!(
            aa.declare("v", Alignment::NoAttr).unwrap().declaration,
            "int v[3][4]"
        );

        let pa = CType::pointer_to(CType::array_of(CType::int_type(), 3));
        assert_eq!(
            pa.declare("v", Alignment::NoAttr).unwrap().declaration,
            "int (* v)[3]"
        );
    }

    #[test]
    fn test_void_cannot_be_declared() {
        let err = CType::void().declare("v", Alignment::NoAttr).unwrap_err();
        assert_eq!(
            err,
            ModelError::VoidDeclaration {
                name: "v".to_string()
            }
        );
    }

    #[test]
    fn test_typedef_layering() {
        let t = CType::int_type()
            .with_typedef("t", Alignment::Bytes(8))
            .unwrap();
        assert_eq!(
            t.typedefs()[0].declaration,
            "typedef int t __attribute__((__aligned__(8)))"
        );
        assert_eq!(t.effective_align(), Alignment::Bytes(8));
        assert_eq!(
            t.declare("v", Alignment::NoAttr).unwrap().declaration,
            "t v"
        );

        // a second layer renders from the first layer's name
        let u = t.with_typedef("u", Alignment::NoAttr).unwrap();
        assert_eq!(t.typedefs().len(), 1);
        assert_eq!(u.typedefs().len(), 2);
        assert_eq!(u.typedefs()[1].declaration, "typedef t u");
        assert_eq!(u.effective_align(), Alignment::NoAttr);

        let back = u.without_typedef().unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_typedef_errors() {
        let t = CType::int_type()
            .with_typedef("t", Alignment::NoAttr)
            .unwrap();
        assert!(matches!(
            t.with_typedef("t", Alignment::NoAttr),
            Err(ModelError::DuplicateTypedef { .. })
        ));
        assert!(matches!(
            CType::int_type().with_typedef("int", Alignment::NoAttr),
            Err(ModelError::DuplicateTypedef { .. })
        ));
        assert!(matches!(
            CType::int_type().without_typedef(),
            Err(ModelError::NoTypedefLayers { .. })
        ));
    }

    #[test]
    fn test_typedef_pointer_declaration() {
        let p = CType::pointer_to(CType::void())
            .with_typedef("t", Alignment::Bytes(4))
            .unwrap();
        assert_eq!(
            p.typedefs()[0].declaration,
            "typedef void * t __attribute__((__aligned__(4)))"
        );
        assert_eq!(
            p.declare("v", Alignment::Bytes(2)).unwrap().declaration,
            "t v __attribute__((__aligned__(2)))"
        );
    }

    #[test]
    fn test_scalar_view() {
        let a = CType::array_of(CType::char_type(), 3);
        assert_eq!(
            a.as_scalar().unwrap(),
            CType::pointer_to(CType::char_type())
        );
        assert!(CType::void().as_scalar().is_err());
        let n = CType::int_type();
        assert_eq!(n.as_scalar().unwrap(), n);
    }

    #[test]
    fn test_display() {
        assert_eq!(CType::pointer_to(CType::int_type()).to_string(), "int *");
        assert_eq!(
            CType::array_of(CType::char_type(), 5).to_string(),
            "char[5]"
        );
        assert_eq!(
            NumberKind::Int {
                rank: IntRank::LongLong,
                unsigned: true
            }
            .to_string(),
            "unsigned long long"
        );
        assert_eq!(
            NumberKind::Float {
                rank: FloatRank::Double,
                domain: FloatDomain::Complex
            }
            .to_string(),
            "double _Complex"
        );
    }
}
