//! C operators and expressions for address-of, pointer dereference,
//! array subscript and sum
//!
//! Every expression carries its C type and an lvalue flag, and prints
//! with the parentheses its position in the C precedence table requires.
//! Constructors enforce C's typing rules: they return an error instead
//! of building an ill-typed term.

use crate::ctype::{CType, CTypeKind, Variable};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Groups of C operators by precedence. See
/// <https://en.cppreference.com/w/c/language/operator_precedence>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Precedence {
    Comma = 1,
    Assign = 2,
    Ternary = 3,
    LogicOr = 4,
    LogicAnd = 5,
    BitOr = 6,
    BitXor = 7,
    BitAnd = 8,
    Equality = 9,
    Ordinal = 10,
    BitShift = 11,
    Additive = 12,
    Multiplicative = 13,
    Prefix = 14,
    Postfix = 15,
    Atom = 16,
}

/// Operator associativity within one precedence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Associativity {
    Left,
    Right,
}

impl Precedence {
    /// Prefix unary, ternary and assignment operators group right to
    /// left; everything else groups left to right.
    pub fn associativity(self) -> Associativity {
        match self {
            Precedence::Prefix | Precedence::Ternary | Precedence::Assign => Associativity::Right,
            _ => Associativity::Left,
        }
    }
}

/// Unary prefix operators the generator models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `&e`
    AddrOf,
    /// `*e`
    Deref,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::AddrOf => "&",
            UnaryOp::Deref => "*",
        }
    }
}

/// Binary operators the generator models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `a + b`
    Add,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
        }
    }
}

/// Structural kind of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    /// A variable name.
    Variable { name: String },
    /// An integer literal.
    IntLiteral(i64),
    /// A string literal.
    StrLiteral(String),
    /// A unary prefix expression.
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    /// A binary arithmetic expression.
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// An array subscript expression.
    Subscript {
        base: Box<Expression>,
        index: Box<Expression>,
    },
}

/// Some C expression. Identity is structural: two expressions with the
/// same term shape compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExprKind,
    pub ctype: CType,
    pub lvalue: bool,
}

impl Expression {
    /// The name of a declared variable.
    pub fn variable(var: &Variable) -> Expression {
        Expression {
            kind: ExprKind::Variable {
                name: var.name.clone(),
            },
            ctype: var.ctype.clone(),
            lvalue: true,
        }
    }

    /// An `int` literal.
    pub fn int_literal(value: i64) -> Expression {
        Expression {
            kind: ExprKind::IntLiteral(value),
            ctype: CType::int_type(),
            lvalue: false,
        }
    }

    /// A string literal, of type `char[len + 1]`.
    pub fn str_literal(value: &str) -> Expression {
        let len = value.len() as u64 + 1;
        Expression {
            kind: ExprKind::StrLiteral(value.to_string()),
            ctype: CType::array_of(CType::char_type(), len),
            lvalue: true,
        }
    }

    /// Address-of expression. Only lvalues have an address.
    pub fn addr_of(&self) -> Result<Expression, ModelError> {
        if !self.lvalue {
            return Err(ModelError::NotAnLvalue {
                expr: self.to_string(),
            });
        }
        Ok(Expression {
            kind: ExprKind::Unary {
                op: UnaryOp::AddrOf,
                operand: Box::new(self.clone()),
            },
            ctype: CType::pointer_to(self.ctype.clone()),
            lvalue: false,
        })
    }

    /// Pointer dereference expression. Arrays dereference like the
    /// pointer they decay to.
    pub fn deref(&self) -> Result<Expression, ModelError> {
        let referenced = self.ctype.points_to().ok_or_else(|| {
            ModelError::DerefNonPointer {
                expr: self.to_string(),
                ctype: self.ctype.to_string(),
            }
        })?;
        Ok(Expression {
            kind: ExprKind::Unary {
                op: UnaryOp::Deref,
                operand: Box::new(self.clone()),
            },
            ctype: referenced.clone(),
            lvalue: true,
        })
    }

    /// Array subscript expression: a number index on a pointer-like base.
    pub fn subscript(&self, index: &Expression) -> Result<Expression, ModelError> {
        if !matches!(index.ctype.kind, CTypeKind::Number(_)) {
            return Err(ModelError::NonNumericSubscript {
                index: index.to_string(),
                ctype: index.ctype.to_string(),
            });
        }
        let referenced = self.ctype.points_to().ok_or_else(|| {
            ModelError::SubscriptNonPointer {
                expr: self.to_string(),
                ctype: self.ctype.to_string(),
            }
        })?;
        Ok(Expression {
            kind: ExprKind::Subscript {
                base: Box::new(self.clone()),
                index: Box::new(index.clone()),
            },
            ctype: referenced.clone(),
            lvalue: true,
        })
    }

    /// Sum expression, for any scalars. Both operands are reduced to
    /// their scalar view first; a sum of two pointers is ill-formed, and
    /// a sum with one pointer has the pointer's type.
    pub fn add(&self, rhs: &Expression) -> Result<Expression, ModelError> {
        let left = self.ctype.as_scalar()?;
        let right = rhs.ctype.as_scalar()?;
        let left_ptr = matches!(left.kind, CTypeKind::Pointer(_));
        let right_ptr = matches!(right.kind, CTypeKind::Pointer(_));
        if left_ptr && right_ptr {
            return Err(ModelError::PointerPlusPointer {
                left: self.to_string(),
                right: rhs.to_string(),
            });
        }
        let ctype = if right_ptr { right } else { left };
        Ok(Expression {
            kind: ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(self.clone()),
                right: Box::new(rhs.clone()),
            },
            ctype,
            lvalue: false,
        })
    }

    /// Precedence of this expression's top-level operator.
    pub fn precedence(&self) -> Precedence {
        match &self.kind {
            ExprKind::Variable { .. } | ExprKind::IntLiteral(_) | ExprKind::StrLiteral(_) => {
                Precedence::Atom
            }
            ExprKind::Unary { .. } => Precedence::Prefix,
            ExprKind::Binary { .. } => Precedence::Additive,
            ExprKind::Subscript { .. } => Precedence::Postfix,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = self.precedence();
        match &self.kind {
            ExprKind::Variable { name } => write!(f, "{}", name),
            ExprKind::IntLiteral(value) => write!(f, "{}", value),
            ExprKind::StrLiteral(value) => write!(f, "\"{}\"", value),
            ExprKind::Unary { op, operand } => {
                if prec > operand.precedence() {
                    write!(f, "{}({})", op.symbol(), operand)
                } else {
                    write!(f, "{}{}", op.symbol(), operand)
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left_prec = left.precedence();
                if prec > left_prec
                    || (prec == left_prec && prec.associativity() == Associativity::Right)
                {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", op.symbol())?;
                let right_prec = right.precedence();
                if prec > right_prec
                    || (prec == right_prec && prec.associativity() == Associativity::Left)
                {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            ExprKind::Subscript { base, index } => {
                if prec > base.precedence() {
                    write!(f, "({})[{}]", base, index)
                } else {
                    write!(f, "{}[{}]", base, index)
                }
            }
        }
    }
}

/// A variable expression built directly from a name and type, for the
/// scratch `zero`/`unit` variables generated programs declare in `main`.
pub(crate) fn scratch_variable(name: &str, ctype: CType) -> Expression {
    Expression {
        kind: ExprKind::Variable {
            name: name.to_string(),
        },
        ctype,
        lvalue: true,
    }
}

/// `int zero`, the symbolic zero available in every generated program.
pub(crate) fn zero_variable() -> Expression {
    scratch_variable("zero", CType::int_type())
}

/// `int unit`, the symbolic one available in every generated program.
pub(crate) fn unit_variable() -> Expression {
    scratch_variable("unit", CType::int_type())
}
