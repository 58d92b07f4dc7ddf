//! Small instruction sequences the conversion engine and operators expand
//! inline.

use num_bigint::BigInt;

use crate::backend::{Backend, BinaryOp, ComparePredicate, RawType, UnaryOp, ValueRef};

/// `select(x < 0, -x, x)`
pub fn abs<B: Backend>(backend: &mut B, value: ValueRef) -> ValueRef {
    let ty = backend.value_type(value);
    let zero = backend.constant_u64(ty, 0);

    let is_negative = backend.emit_compare(ComparePredicate::Slt, value, zero);
    let negated = backend.emit_unary(UnaryOp::Neg, value);

    backend.emit_select(is_negative, negated, value)
}

/// Signed division by `2^shift`, rounding toward zero.
///
/// An arithmetic shift alone rounds toward negative infinity (`-1 >> 1` would
/// stay `-1`), so negative values are biased by `2^shift - 1` first.
pub fn div2<B: Backend>(backend: &mut B, value: ValueRef, shift: u32) -> ValueRef {
    let ty = backend.value_type(value);
    let zero = backend.constant_u64(ty, 0);
    let mask = backend.constant_int(ty, &((BigInt::from(1) << shift) - 1));
    let amount = backend.constant_u64(ty, shift.into());

    let is_negative = backend.emit_compare(ComparePredicate::Slt, value, zero);
    let biased = backend.emit_binary(BinaryOp::Add, value, mask);
    let selected = backend.emit_select(is_negative, biased, value);

    backend.emit_binary(BinaryOp::AShr, selected, amount)
}

fn rotate<B: Backend>(
    backend: &mut B,
    value: ValueRef,
    amount: ValueRef,
    toward: BinaryOp,
    away: BinaryOp,
) -> ValueRef {
    let ty = backend.value_type(value);
    let width = match ty {
        RawType::Integer(bits) => bits,
        _ => 0,
    };
    let width = backend.constant_u64(ty, width.into());

    let near = backend.emit_binary(toward, value, amount);
    let remaining = backend.emit_binary(BinaryOp::Sub, width, amount);
    let far = backend.emit_binary(away, value, remaining);

    backend.emit_binary(BinaryOp::Or, near, far)
}

/// `(x << n) | (x >>> (width - n))`
pub fn rotate_left<B: Backend>(backend: &mut B, value: ValueRef, amount: ValueRef) -> ValueRef {
    rotate(backend, value, amount, BinaryOp::Shl, BinaryOp::LShr)
}

/// `(x >>> n) | (x << (width - n))`
pub fn rotate_right<B: Backend>(backend: &mut B, value: ValueRef, amount: ValueRef) -> ValueRef {
    rotate(backend, value, amount, BinaryOp::LShr, BinaryOp::Shl)
}
