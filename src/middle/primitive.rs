use std::str::FromStr;

use strum::{Display, EnumIter};
use thiserror::Error;

use crate::{
    backend::RawType,
    middle::operators::{BinaryOperator, UnaryOperator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    Void,
    Boolean,
    Unsigned,
    Signed,
    Float,
}

/// Bit layout of one of the supported IEEE-like float formats. The
/// significand includes the hidden bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatFormat {
    pub bitwidth: u32,
    pub significand: u32,
    pub min_exponent: i32,
    pub max_exponent: i32,
}

impl FloatFormat {
    pub const HALF: Self = Self::new(16, 11, -15, 16);
    pub const SINGLE: Self = Self::new(32, 24, -127, 128);
    pub const DOUBLE: Self = Self::new(64, 53, -1023, 1024);
    pub const EXTENDED: Self = Self::new(80, 64, -16383, 16384);
    pub const QUAD: Self = Self::new(128, 113, -16383, 16384);

    const fn new(bitwidth: u32, significand: u32, min_exponent: i32, max_exponent: i32) -> Self {
        Self {
            bitwidth,
            significand,
            min_exponent,
            max_exponent,
        }
    }

    pub fn for_bitwidth(bitwidth: u32) -> Option<Self> {
        match bitwidth {
            16 => Some(Self::HALF),
            32 => Some(Self::SINGLE),
            64 => Some(Self::DOUBLE),
            80 => Some(Self::EXTENDED),
            128 => Some(Self::QUAD),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("float{0} is not a supported float format")]
    UnsupportedFloatWidth(u32),

    #[error("integer types must be at least 1 bit wide")]
    ZeroWidth,

    #[error("`{0}` is not a primitive type name")]
    UnknownName(String),
}

/// A value type with a storage width and, for fixed point kinds, a base 2
/// scale: the stored integer `raw` represents `raw * 2^exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveType {
    kind: PrimitiveKind,
    bitwidth: u32,
    exponent: i32,
}

impl PrimitiveType {
    pub const VOID: Self = Self::raw(PrimitiveKind::Void, 0, 0);
    pub const BOOLEAN: Self = Self::raw(PrimitiveKind::Boolean, 1, 0);
    pub const FLOAT32: Self = Self::raw(PrimitiveKind::Float, 32, 0);
    pub const FLOAT64: Self = Self::raw(PrimitiveKind::Float, 64, 0);

    const fn raw(kind: PrimitiveKind, bitwidth: u32, exponent: i32) -> Self {
        Self {
            kind,
            bitwidth,
            exponent,
        }
    }

    /// Validated constructor. Void and Boolean ignore the given width and
    /// exponent, floats ignore the exponent.
    pub fn new(kind: PrimitiveKind, bitwidth: u32, exponent: i32) -> Result<Self, PrimitiveError> {
        match kind {
            PrimitiveKind::Void => Ok(Self::VOID),
            PrimitiveKind::Boolean => Ok(Self::BOOLEAN),
            PrimitiveKind::Float => match FloatFormat::for_bitwidth(bitwidth) {
                Some(_) => Ok(Self::raw(kind, bitwidth, 0)),
                None => Err(PrimitiveError::UnsupportedFloatWidth(bitwidth)),
            },
            PrimitiveKind::Signed | PrimitiveKind::Unsigned if bitwidth == 0 => {
                Err(PrimitiveError::ZeroWidth)
            }
            PrimitiveKind::Signed | PrimitiveKind::Unsigned => Ok(Self::raw(kind, bitwidth, exponent)),
        }
    }

    pub const fn void() -> Self {
        Self::VOID
    }

    pub const fn boolean() -> Self {
        Self::BOOLEAN
    }

    /// `bitwidth` must be non-zero
    pub const fn signed(bitwidth: u32) -> Self {
        debug_assert!(bitwidth > 0);
        Self::raw(PrimitiveKind::Signed, bitwidth, 0)
    }

    /// `bitwidth` must be non-zero
    pub const fn unsigned(bitwidth: u32) -> Self {
        debug_assert!(bitwidth > 0);
        Self::raw(PrimitiveKind::Unsigned, bitwidth, 0)
    }

    pub fn fixed(signed: bool, bitwidth: u32, exponent: i32) -> Result<Self, PrimitiveError> {
        let kind = if signed {
            PrimitiveKind::Signed
        } else {
            PrimitiveKind::Unsigned
        };

        Self::new(kind, bitwidth, exponent)
    }

    pub fn float(bitwidth: u32) -> Result<Self, PrimitiveError> {
        Self::new(PrimitiveKind::Float, bitwidth, 0)
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn bitwidth(&self) -> u32 {
        self.bitwidth
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Same kind and width with a different scale
    pub fn with_exponent(&self, exponent: i32) -> Self {
        match self.kind {
            PrimitiveKind::Signed | PrimitiveKind::Unsigned => Self::raw(self.kind, self.bitwidth, exponent),
            _ => *self,
        }
    }

    pub fn is_void(&self) -> bool {
        self.kind == PrimitiveKind::Void
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == PrimitiveKind::Boolean
    }

    pub fn is_signed(&self) -> bool {
        self.kind == PrimitiveKind::Signed
    }

    pub fn is_unsigned(&self) -> bool {
        self.kind == PrimitiveKind::Unsigned
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, PrimitiveKind::Signed | PrimitiveKind::Unsigned)
    }

    pub fn is_float(&self) -> bool {
        self.kind == PrimitiveKind::Float
    }

    pub fn float_format(&self) -> Option<FloatFormat> {
        match self.kind {
            PrimitiveKind::Float => FloatFormat::for_bitwidth(self.bitwidth),
            _ => None,
        }
    }

    pub fn raw_type(&self) -> RawType {
        match self.kind {
            PrimitiveKind::Void => RawType::Void,
            PrimitiveKind::Boolean => RawType::Integer(1),
            PrimitiveKind::Unsigned | PrimitiveKind::Signed => RawType::Integer(self.bitwidth),
            PrimitiveKind::Float => RawType::Float(self.bitwidth),
        }
    }
}

impl core::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.exponent) {
            (PrimitiveKind::Void, _) => write!(f, "void"),
            (PrimitiveKind::Boolean, _) => write!(f, "bool"),
            (PrimitiveKind::Float, _) => write!(f, "float{}", self.bitwidth),
            (PrimitiveKind::Signed, 0) => write!(f, "int{}", self.bitwidth),
            (PrimitiveKind::Unsigned, 0) => write!(f, "uint{}", self.bitwidth),
            (PrimitiveKind::Signed, exp) => write!(f, "fixed{}e{exp}", self.bitwidth),
            (PrimitiveKind::Unsigned, exp) => write!(f, "ufixed{}e{exp}", self.bitwidth),
        }
    }
}

impl FromStr for PrimitiveType {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || PrimitiveError::UnknownName(s.to_string());

        let parse_width = |digits: &str| digits.parse::<u32>().map_err(|_| unknown());

        let parse_fixed = |rest: &str| -> Result<(u32, i32), PrimitiveError> {
            let (width, exponent) = rest.split_once('e').ok_or_else(unknown)?;
            Ok((parse_width(width)?, exponent.parse::<i32>().map_err(|_| unknown())?))
        };

        match s {
            "void" => return Ok(Self::VOID),
            "bool" => return Ok(Self::BOOLEAN),
            _ => {}
        }

        if let Some(rest) = s.strip_prefix("ufixed") {
            let (width, exponent) = parse_fixed(rest)?;
            Self::fixed(false, width, exponent)
        } else if let Some(rest) = s.strip_prefix("fixed") {
            let (width, exponent) = parse_fixed(rest)?;
            Self::fixed(true, width, exponent)
        } else if let Some(rest) = s.strip_prefix("uint") {
            Self::fixed(false, parse_width(rest)?, 0)
        } else if let Some(rest) = s.strip_prefix("int") {
            Self::fixed(true, parse_width(rest)?, 0)
        } else if let Some(rest) = s.strip_prefix("float") {
            Self::float(parse_width(rest)?)
        } else {
            Err(unknown())
        }
    }
}

impl PrimitiveKind {
    pub fn supports_binary_op(&self, operator: BinaryOperator) -> bool {
        match self {
            // Everything but the logical ops
            PrimitiveKind::Signed | PrimitiveKind::Unsigned => match operator {
                BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Remainder
                | BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqualTo
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqualTo
                | BinaryOperator::BitwiseAnd
                | BinaryOperator::BitwiseOr
                | BinaryOperator::BitwiseXor
                | BinaryOperator::ShiftLeft
                | BinaryOperator::ShiftRight
                | BinaryOperator::LogicalShiftRight
                | BinaryOperator::RotateLeft
                | BinaryOperator::RotateRight => true,
                BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr | BinaryOperator::LogicalXor => {
                    false
                }
            },
            // No bitwise or logical ops
            PrimitiveKind::Float => match operator {
                BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Remainder
                | BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqualTo
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqualTo => true,
                BinaryOperator::LogicalAnd
                | BinaryOperator::LogicalOr
                | BinaryOperator::LogicalXor
                | BinaryOperator::BitwiseAnd
                | BinaryOperator::BitwiseOr
                | BinaryOperator::BitwiseXor
                | BinaryOperator::ShiftLeft
                | BinaryOperator::ShiftRight
                | BinaryOperator::LogicalShiftRight
                | BinaryOperator::RotateLeft
                | BinaryOperator::RotateRight => false,
            },
            // Only equality and logical ops
            PrimitiveKind::Boolean => match operator {
                BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LogicalAnd
                | BinaryOperator::LogicalOr
                | BinaryOperator::LogicalXor => true,
                BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqualTo
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqualTo
                | BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Remainder
                | BinaryOperator::BitwiseAnd
                | BinaryOperator::BitwiseOr
                | BinaryOperator::BitwiseXor
                | BinaryOperator::ShiftLeft
                | BinaryOperator::ShiftRight
                | BinaryOperator::LogicalShiftRight
                | BinaryOperator::RotateLeft
                | BinaryOperator::RotateRight => false,
            },
            PrimitiveKind::Void => false,
        }
    }

    pub fn supports_unary_op(&self, operator: UnaryOperator) -> bool {
        match self {
            PrimitiveKind::Signed | PrimitiveKind::Unsigned => match operator {
                UnaryOperator::Negate | UnaryOperator::BitwiseNot => true,
                UnaryOperator::LogicalNot => false,
            },
            PrimitiveKind::Float => match operator {
                UnaryOperator::Negate => true,
                UnaryOperator::BitwiseNot | UnaryOperator::LogicalNot => false,
            },
            PrimitiveKind::Boolean => match operator {
                UnaryOperator::LogicalNot => true,
                UnaryOperator::Negate | UnaryOperator::BitwiseNot => false,
            },
            PrimitiveKind::Void => false,
        }
    }
}
