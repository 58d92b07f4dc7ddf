//! Lowering of unary and binary operators once their operands have been
//! brought to a common type.

use strum::{Display, EnumIter};

use crate::{
    backend::{Backend, BinaryOp, CastKind, ComparePredicate, RawType, UnaryOp, ValueRef},
    diagnostics::{Position, SemanticError},
    middle::{
        conversion,
        intrinsic,
        primitive::{PrimitiveKind, PrimitiveType},
        ty::Typename,
        unit::{CompilationUnit, ExprResult},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Remainder,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
    #[strum(serialize = "&")]
    BitwiseAnd,
    #[strum(serialize = "|")]
    BitwiseOr,
    #[strum(serialize = "^")]
    BitwiseXor,
    #[strum(serialize = "<<")]
    ShiftLeft,
    #[strum(serialize = ">>")]
    ShiftRight,
    #[strum(serialize = ">>>")]
    LogicalShiftRight,
    #[strum(serialize = "rol")]
    RotateLeft,
    #[strum(serialize = "ror")]
    RotateRight,
    #[strum(serialize = "and")]
    LogicalAnd,
    #[strum(serialize = "or")]
    LogicalOr,
    #[strum(serialize = "xor")]
    LogicalXor,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqualTo
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqualTo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "~")]
    BitwiseNot,
    #[strum(serialize = "not")]
    LogicalNot,
}

fn compare_predicate(kind: PrimitiveKind, operator: BinaryOperator) -> Option<ComparePredicate> {
    use BinaryOperator::*;
    use ComparePredicate::*;

    let predicate = match (kind, operator) {
        (PrimitiveKind::Float, Equals) => Oeq,
        (PrimitiveKind::Float, NotEquals) => Une,
        (PrimitiveKind::Float, LessThan) => Olt,
        (PrimitiveKind::Float, LessThanOrEqualTo) => Ole,
        (PrimitiveKind::Float, GreaterThan) => Ogt,
        (PrimitiveKind::Float, GreaterThanOrEqualTo) => Oge,

        (PrimitiveKind::Signed, LessThan) => Slt,
        (PrimitiveKind::Signed, LessThanOrEqualTo) => Sle,
        (PrimitiveKind::Signed, GreaterThan) => Sgt,
        (PrimitiveKind::Signed, GreaterThanOrEqualTo) => Sge,

        (PrimitiveKind::Unsigned, LessThan) => Ult,
        (PrimitiveKind::Unsigned, LessThanOrEqualTo) => Ule,
        (PrimitiveKind::Unsigned, GreaterThan) => Ugt,
        (PrimitiveKind::Unsigned, GreaterThanOrEqualTo) => Uge,

        (_, Equals) => Eq,
        (_, NotEquals) => Ne,

        _ => return None,
    };

    Some(predicate)
}

/// The backend operation for a non-comparison operator on operands of `ty`.
/// `None` for the operators that need more than one instruction.
fn binary_op(ty: PrimitiveType, operator: BinaryOperator) -> Option<BinaryOp> {
    let float = ty.is_float();
    let signed = ty.is_signed();

    let op = match operator {
        BinaryOperator::Add if float => BinaryOp::FAdd,
        BinaryOperator::Add => BinaryOp::Add,
        BinaryOperator::Subtract if float => BinaryOp::FSub,
        BinaryOperator::Subtract => BinaryOp::Sub,
        BinaryOperator::Multiply if float => BinaryOp::FMul,
        BinaryOperator::Multiply => BinaryOp::Mul,
        BinaryOperator::Divide if float => BinaryOp::FDiv,
        BinaryOperator::Divide if signed => BinaryOp::SDiv,
        BinaryOperator::Divide => BinaryOp::UDiv,
        BinaryOperator::Remainder if float => BinaryOp::FRem,
        BinaryOperator::Remainder if signed => BinaryOp::SRem,
        BinaryOperator::Remainder => BinaryOp::URem,
        BinaryOperator::BitwiseAnd | BinaryOperator::LogicalAnd => BinaryOp::And,
        BinaryOperator::BitwiseOr | BinaryOperator::LogicalOr => BinaryOp::Or,
        BinaryOperator::BitwiseXor | BinaryOperator::LogicalXor => BinaryOp::Xor,
        BinaryOperator::ShiftLeft => BinaryOp::Shl,
        BinaryOperator::ShiftRight if signed => BinaryOp::AShr,
        BinaryOperator::ShiftRight | BinaryOperator::LogicalShiftRight => BinaryOp::LShr,
        _ => return None,
    };

    Some(op)
}

impl<B: Backend> CompilationUnit<B> {
    pub fn binary(
        &mut self,
        lhs: ExprResult,
        operator: BinaryOperator,
        rhs: ExprResult,
        position: Position,
    ) -> ExprResult {
        let Some((ty, left, right)) = self.unify(lhs, rhs, position) else {
            return ExprResult::UNSET;
        };

        let Some(primitive) = ty.as_primitive() else {
            self.unsupported(ty, format!("binary `{operator}`"), position);
            return ExprResult::UNSET;
        };

        if !primitive.kind().supports_binary_op(operator) {
            self.unsupported(ty, format!("binary `{operator}`"), position);
            return ExprResult::UNSET;
        }

        if operator.is_comparison() {
            let Some(predicate) = compare_predicate(primitive.kind(), operator) else {
                self.unsupported(ty, format!("binary `{operator}`"), position);
                return ExprResult::UNSET;
            };

            let value = self.backend.emit_compare(predicate, left, right);
            return ExprResult::new(Typename::BOOLEAN, Some(value));
        }

        let value = match operator {
            BinaryOperator::RotateLeft => intrinsic::rotate_left(&mut self.backend, left, right),
            BinaryOperator::RotateRight => intrinsic::rotate_right(&mut self.backend, left, right),
            _ => {
                let Some(op) = binary_op(primitive, operator) else {
                    self.unsupported(ty, format!("binary `{operator}`"), position);
                    return ExprResult::UNSET;
                };

                match operator {
                    BinaryOperator::Multiply | BinaryOperator::Divide
                        if primitive.is_integer() && primitive.exponent() != 0 =>
                    {
                        self.fixed_point_arithmetic(primitive, operator, op, left, right)
                    }
                    _ => self.backend.emit_binary(op, left, right),
                }
            }
        };

        ExprResult::new(ty, Some(value))
    }

    /// Fixed point `*` and `/` with the raw result brought back to the
    /// operand exponent. The intermediate is computed wide enough that every
    /// bit of the result at the operand scale survives.
    fn fixed_point_arithmetic(
        &mut self,
        ty: PrimitiveType,
        operator: BinaryOperator,
        op: BinaryOp,
        left: ValueRef,
        right: ValueRef,
    ) -> ValueRef {
        let signed = ty.is_signed();
        let width = ty.bitwidth();
        let exponent = ty.exponent();

        match operator {
            // The raw product carries twice the operand exponent
            BinaryOperator::Multiply => {
                let wide = width.saturating_mul(2);
                let left = self.extend(left, signed, wide);
                let right = self.extend(right, signed, wide);

                let product = self.backend.emit_binary(op, left, right);
                let product = conversion::align_exponent(
                    &mut self.backend,
                    product,
                    signed,
                    wide,
                    exponent.saturating_mul(2),
                    exponent,
                );

                self.backend.emit_cast(CastKind::Trunc, product, RawType::Integer(width))
            }
            // The dividend is shifted up first so the quotient keeps its
            // fraction bits
            BinaryOperator::Divide if exponent < 0 => {
                let shift = exponent.unsigned_abs();
                let wide = width.saturating_add(shift);
                let left = self.extend(left, signed, wide);
                let right = self.extend(right, signed, wide);

                let amount = self.backend.constant_u64(RawType::Integer(wide), shift.into());
                let dividend = self.backend.emit_binary(BinaryOp::Shl, left, amount);
                let quotient = self.backend.emit_binary(op, dividend, right);

                self.backend.emit_cast(CastKind::Trunc, quotient, RawType::Integer(width))
            }
            // A positive exponent only drops low bits of the raw quotient
            _ => {
                let quotient = self.backend.emit_binary(op, left, right);
                conversion::align_exponent(&mut self.backend, quotient, signed, width, 0, exponent)
            }
        }
    }

    fn extend(&mut self, value: ValueRef, signed: bool, width: u32) -> ValueRef {
        let kind = if signed { CastKind::SExt } else { CastKind::ZExt };
        self.backend.emit_cast(kind, value, RawType::Integer(width))
    }

    pub fn unary(&mut self, operator: UnaryOperator, expr: ExprResult, position: Position) -> ExprResult {
        if expr.is_unset() {
            return ExprResult::UNSET;
        }

        let (Some(primitive), Some(value)) = (expr.ty.as_primitive(), expr.value) else {
            self.unsupported(expr.ty, format!("unary `{operator}`"), position);
            return ExprResult::UNSET;
        };

        if !primitive.kind().supports_unary_op(operator) {
            self.unsupported(expr.ty, format!("unary `{operator}`"), position);
            return ExprResult::UNSET;
        }

        match operator {
            UnaryOperator::Negate if primitive.is_float() => {
                let value = self.backend.emit_unary(UnaryOp::FNeg, value);
                ExprResult::new(expr.ty, Some(value))
            }
            UnaryOperator::Negate if primitive.is_unsigned() => {
                // One extra bit so the negation of every unsigned value fits
                let signed = PrimitiveType::signed(primitive.bitwidth() + 1).with_exponent(primitive.exponent());
                let widened = conversion::cast_primitive(&mut self.backend, value, primitive, signed);
                let value = self.backend.emit_unary(UnaryOp::Neg, widened);

                ExprResult::new(signed.into(), Some(value))
            }
            UnaryOperator::Negate => {
                let value = self.backend.emit_unary(UnaryOp::Neg, value);
                ExprResult::new(expr.ty, Some(value))
            }
            UnaryOperator::BitwiseNot | UnaryOperator::LogicalNot => {
                let value = self.backend.emit_unary(UnaryOp::Not, value);
                ExprResult::new(expr.ty, Some(value))
            }
        }
    }

    fn unsupported(&mut self, ty: Typename, usage: String, position: Position) {
        self.report(
            SemanticError::UnsupportedPromotion {
                ty: self.type_name(ty),
                usage,
            },
            position,
        );
    }
}
