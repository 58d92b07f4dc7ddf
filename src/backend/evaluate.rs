//! Computes the value of straight-line LIR, so tests can check what emitted
//! instruction sequences produce instead of only their shape.
//!
//! Integers are kept as their unsigned bit pattern at the value's width and
//! only reinterpreted as two's complement where an operation is signed.
//! Floats are evaluated in `f64` whatever their width.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, ToPrimitive, Zero};

use crate::backend::{
    BinaryOp, CastKind, ComparePredicate, RawType, UnaryOp, ValueRef,
    lir::{Immediate, Instruction, Module, ValueKind},
};

fn modulus(width: u32) -> BigInt {
    BigInt::one() << width
}

/// Reduces `value` to its bit pattern at `width`
fn wrap(value: BigInt, width: u32) -> BigInt {
    let modulus = modulus(width);
    ((value % &modulus) + &modulus) % modulus
}

/// Reads a bit pattern as two's complement
fn signed(value: &BigInt, width: u32) -> BigInt {
    if width > 0 && *value >= (BigInt::one() << (width - 1)) {
        value - modulus(width)
    } else {
        value.clone()
    }
}

/// Division by `2^shift` rounding toward negative infinity
fn floor_shift(value: &BigInt, shift: u32) -> BigInt {
    if *value >= BigInt::zero() {
        value >> shift
    } else {
        let bias: BigInt = modulus(shift) - 1;
        -((-value + bias) >> shift)
    }
}

fn width_of(module: &Module, value: ValueRef) -> u32 {
    match module.values[value].ty {
        RawType::Integer(bits) => bits,
        ty => panic!("{value:?} has non integer type {ty}"),
    }
}

struct Evaluator<'a> {
    module: &'a Module,
    arguments: &'a [(ValueRef, Immediate)],
}

impl Evaluator<'_> {
    fn int(&self, value: ValueRef) -> BigInt {
        match self.value(value) {
            Immediate::Int(int) => int,
            Immediate::Float(float) => panic!("expected an integer for {value:?}, found {float}"),
        }
    }

    fn float(&self, value: ValueRef) -> f64 {
        match self.value(value) {
            Immediate::Float(float) => float,
            Immediate::Int(int) => panic!("expected a float for {value:?}, found {int}"),
        }
    }

    fn value(&self, value: ValueRef) -> Immediate {
        if let Some((_, bound)) = self.arguments.iter().find(|(v, _)| *v == value) {
            return match bound {
                Immediate::Int(int) => Immediate::Int(wrap(int.clone(), width_of(self.module, value))),
                Immediate::Float(float) => Immediate::Float(*float),
            };
        }

        match &self.module.values[value].kind {
            ValueKind::Constant(Immediate::Int(int)) => {
                Immediate::Int(wrap(int.clone(), width_of(self.module, value)))
            }
            ValueKind::Constant(Immediate::Float(float)) => Immediate::Float(*float),
            ValueKind::Instruction { .. } => match self.module.definition(value) {
                Some(instruction) => self.instruction(value, instruction),
                None => panic!("{value:?} has no defining instruction"),
            },
            kind => panic!("{value:?} ({kind:?}) needs a binding to be evaluated"),
        }
    }

    fn instruction(&self, destination: ValueRef, instruction: &Instruction) -> Immediate {
        match instruction {
            Instruction::Binary {
                operator, lhs, rhs, ..
            } => self.binary(destination, *operator, *lhs, *rhs),
            Instruction::Unary {
                operator, operand, ..
            } => match operator {
                UnaryOp::FNeg => Immediate::Float(-self.float(*operand)),
                UnaryOp::Neg => {
                    Immediate::Int(wrap(-self.int(*operand), width_of(self.module, destination)))
                }
                UnaryOp::Not => {
                    let width = width_of(self.module, destination);
                    Immediate::Int(modulus(width) - 1 - self.int(*operand))
                }
            },
            Instruction::Compare {
                predicate, lhs, rhs, ..
            } => {
                let result = self.compare(*predicate, *lhs, *rhs);
                Immediate::Int(BigInt::from(result as u8))
            }
            Instruction::Cast {
                kind, operand, ty, ..
            } => self.cast(*kind, *operand, *ty),
            Instruction::Select {
                condition,
                if_true,
                if_false,
                ..
            } => {
                if self.int(*condition).is_zero() {
                    self.value(*if_false)
                } else {
                    self.value(*if_true)
                }
            }
            other => panic!("cannot evaluate {other:?}"),
        }
    }

    fn binary(&self, destination: ValueRef, operator: BinaryOp, lhs: ValueRef, rhs: ValueRef) -> Immediate {
        let float = |f: fn(f64, f64) -> f64| Immediate::Float(f(self.float(lhs), self.float(rhs)));

        match operator {
            BinaryOp::FAdd => return float(|a, b| a + b),
            BinaryOp::FSub => return float(|a, b| a - b),
            BinaryOp::FMul => return float(|a, b| a * b),
            BinaryOp::FDiv => return float(|a, b| a / b),
            BinaryOp::FRem => return float(|a, b| a % b),
            _ => {}
        }

        let width = width_of(self.module, destination);
        let (a, b) = (self.int(lhs), self.int(rhs));
        let amount = b.to_u32().unwrap_or(u32::MAX);

        let result = match operator {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            // Quotients and remainders of `BigInt` truncate toward zero
            BinaryOp::UDiv => a / b,
            BinaryOp::URem => a % b,
            BinaryOp::SDiv => signed(&a, width) / signed(&b, width),
            BinaryOp::SRem => signed(&a, width) % signed(&b, width),
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            BinaryOp::Shl => a << amount,
            BinaryOp::LShr => a >> amount,
            BinaryOp::AShr => floor_shift(&signed(&a, width), amount),
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem => {
                unreachable!()
            }
        };

        Immediate::Int(wrap(result, width))
    }

    fn compare(&self, predicate: ComparePredicate, lhs: ValueRef, rhs: ValueRef) -> bool {
        use ComparePredicate::*;

        match predicate {
            Oeq | Une | Olt | Ole | Ogt | Oge | Ord => {
                let (a, b) = (self.float(lhs), self.float(rhs));

                match predicate {
                    Oeq => a == b,
                    Une => a.is_nan() || b.is_nan() || a != b,
                    Olt => a < b,
                    Ole => a <= b,
                    Ogt => a > b,
                    Oge => a >= b,
                    _ => !a.is_nan() && !b.is_nan(),
                }
            }
            Slt | Sle | Sgt | Sge => {
                let width = width_of(self.module, lhs);
                let (a, b) = (signed(&self.int(lhs), width), signed(&self.int(rhs), width));

                match predicate {
                    Slt => a < b,
                    Sle => a <= b,
                    Sgt => a > b,
                    _ => a >= b,
                }
            }
            Eq | Ne | Ult | Ule | Ugt | Uge => {
                let (a, b) = (self.int(lhs), self.int(rhs));

                match predicate {
                    Eq => a == b,
                    Ne => a != b,
                    Ult => a < b,
                    Ule => a <= b,
                    Ugt => a > b,
                    _ => a >= b,
                }
            }
        }
    }

    fn cast(&self, kind: CastKind, operand: ValueRef, ty: RawType) -> Immediate {
        let target = |ty: RawType| match ty {
            RawType::Integer(bits) => bits,
            ty => panic!("cannot cast to {ty}"),
        };

        match kind {
            CastKind::ZExt => Immediate::Int(self.int(operand)),
            CastKind::SExt => {
                let width = width_of(self.module, operand);
                Immediate::Int(wrap(signed(&self.int(operand), width), target(ty)))
            }
            CastKind::Trunc => Immediate::Int(wrap(self.int(operand), target(ty))),
            CastKind::FpExt | CastKind::FpTrunc => Immediate::Float(self.float(operand)),
            CastKind::SiToFp => {
                let width = width_of(self.module, operand);
                Immediate::Float(signed(&self.int(operand), width).to_f64().unwrap_or(f64::NAN))
            }
            CastKind::UiToFp => Immediate::Float(self.int(operand).to_f64().unwrap_or(f64::NAN)),
            CastKind::FpToSi | CastKind::FpToUi => {
                let truncated = BigInt::from_f64(self.float(operand).trunc()).unwrap_or_default();
                Immediate::Int(wrap(truncated, target(ty)))
            }
        }
    }
}

/// Evaluates `value`. Parameters and other values that have no defining
/// instruction must be bound in `arguments`.
pub fn evaluate(module: &Module, value: ValueRef, arguments: &[(ValueRef, Immediate)]) -> Immediate {
    Evaluator { module, arguments }.value(value)
}

/// Evaluates an integer value and reads it as two's complement
pub fn evaluate_signed(module: &Module, value: ValueRef, arguments: &[(ValueRef, Immediate)]) -> BigInt {
    match evaluate(module, value, arguments) {
        Immediate::Int(int) => signed(&int, width_of(module, value)),
        Immediate::Float(float) => panic!("expected an integer, found {float}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{Backend, FunctionSignature},
        intern::InternedSymbol,
    };

    fn setup() -> (Module, ValueRef) {
        let mut module = Module::new();
        let f = module.declare_function(FunctionSignature {
            symbol: InternedSymbol::new("evaluate"),
            parameters: vec![RawType::Integer(8)],
            return_type: RawType::Void,
        });
        let entry = module.create_block(f, "entry");
        module.set_insertion_point(entry);

        let x = module.function_parameter(f, 0);
        (module, x)
    }

    #[test]
    fn integer_arithmetic_wraps_at_the_value_width() {
        let (mut module, x) = setup();
        let hundred = module.constant_u64(RawType::Integer(8), 100);
        let sum = module.emit_binary(BinaryOp::Add, x, hundred);

        let arguments = [(x, Immediate::Int(200.into()))];
        assert_eq!(evaluate(&module, sum, &arguments), Immediate::Int(44.into()));
    }

    #[test]
    fn signed_operations_use_twos_complement() {
        let (mut module, x) = setup();
        let two = module.constant_u64(RawType::Integer(8), 2);
        let one = module.constant_u64(RawType::Integer(8), 1);
        let quotient = module.emit_binary(BinaryOp::SDiv, x, two);
        let shifted = module.emit_binary(BinaryOp::AShr, x, one);
        let wide = module.emit_cast(CastKind::SExt, x, RawType::Integer(16));

        let arguments = [(x, Immediate::Int((-7).into()))];
        assert_eq!(evaluate_signed(&module, quotient, &arguments), BigInt::from(-3));
        assert_eq!(evaluate_signed(&module, shifted, &arguments), BigInt::from(-4));
        assert_eq!(evaluate_signed(&module, wide, &arguments), BigInt::from(-7));
    }
}
