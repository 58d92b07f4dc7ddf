//! Implicit conversion rules. [`distance`] says whether a value of one type
//! may implicitly become another and how many bits of precision that costs;
//! [`cast`] emits the instructions performing a conversion.

use crate::{
    backend::{Backend, BinaryOp, CastKind, ComparePredicate, RawType, ValueRef},
    middle::{
        intrinsic,
        primitive::{PrimitiveKind, PrimitiveType},
        registry::TypeRegistry,
        ty::{CompositeType, Typename, TypenameKind},
    },
};

/// Number of precision bits lost converting `from` to `to`, or `None` if the
/// conversion may not happen implicitly
pub fn primitive_distance(from: PrimitiveType, to: PrimitiveType) -> Option<u32> {
    use PrimitiveKind::*;

    if from == to {
        return Some(0);
    }

    match (from.kind(), to.kind()) {
        (Void, _) | (_, Void) => None,
        // Booleans only convert explicitly
        (Boolean, _) | (_, Boolean) => None,
        (Signed, Unsigned) => None,
        (Float, Signed | Unsigned) => None,
        (Signed, Signed) | (Unsigned, Signed | Unsigned) => {
            let mut width_diff = to.bitwidth() as i64 - from.bitwidth() as i64;

            // Room for the sign bit
            if from.kind() == Unsigned && to.kind() == Signed {
                width_diff -= 1;
            }

            let exp_diff = to.exponent() as i64 - from.exponent() as i64;

            if width_diff + exp_diff < 0 {
                None
            } else {
                Some(exp_diff.max(0) as u32)
            }
        }
        (Float, Float) => (to.bitwidth() >= from.bitwidth()).then_some(0),
        (Signed | Unsigned, Float) => {
            let format = to.float_format()?;

            let bottom = from.exponent() as i64;
            let top = bottom + from.bitwidth() as i64;

            if top > format.max_exponent as i64
                || bottom < format.min_exponent as i64 - format.significand as i64
            {
                None
            } else {
                Some(from.bitwidth().saturating_sub(format.significand))
            }
        }
    }
}

/// Like [`primitive_distance`], extended to pointers and composites.
/// Identical types are always distance 0.
pub fn distance(registry: &TypeRegistry, from: Typename, to: Typename) -> Option<u32> {
    if from == to {
        return Some(0);
    }

    if from.pointer_count != to.pointer_count || from.is_pointer() {
        return None;
    }

    match (from.kind, to.kind) {
        (TypenameKind::Primitive(from), TypenameKind::Primitive(to)) => primitive_distance(from, to),
        (TypenameKind::Composite(from), TypenameKind::Composite(to)) => {
            let (
                CompositeType::Function {
                    name: from_name,
                    parameters: from_parameters,
                    receiver: from_receiver,
                    ..
                },
                CompositeType::Function {
                    name: to_name,
                    parameters: to_parameters,
                    receiver: to_receiver,
                    ..
                },
            ) = (registry.composite(from), registry.composite(to))
            else {
                return None;
            };

            if from_name != to_name
                || from_receiver != to_receiver
                || from_parameters.len() != to_parameters.len()
            {
                return None;
            }

            from_parameters
                .iter()
                .zip(to_parameters)
                .map(|(f, t)| distance(registry, f.ty, t.ty))
                .sum()
        }
        _ => None,
    }
}

/// Emits the conversion of `value` from `from` to `to`. Anything but two
/// primitives is only ever converted to itself, which emits nothing.
pub fn cast<B: Backend>(backend: &mut B, value: ValueRef, from: Typename, to: Typename) -> ValueRef {
    match (from.as_primitive(), to.as_primitive()) {
        (Some(from), Some(to)) => cast_primitive(backend, value, from, to),
        _ => value,
    }
}

pub fn cast_primitive<B: Backend>(
    backend: &mut B,
    value: ValueRef,
    from: PrimitiveType,
    to: PrimitiveType,
) -> ValueRef {
    use PrimitiveKind::*;

    if from == to {
        return value;
    }

    log::trace!("casting {from} to {to}");

    match (from.kind(), to.kind()) {
        (Void, _) | (_, Void) => value,
        (Float, Float) => {
            let kind = if from.bitwidth() < to.bitwidth() {
                CastKind::FpExt
            } else {
                CastKind::FpTrunc
            };

            backend.emit_cast(kind, value, to.raw_type())
        }
        (Boolean, Float) => {
            let ty = to.raw_type();
            let ordered = backend.constant_float(ty, 0.0);
            let unordered = backend.constant_float(ty, f64::NAN);

            backend.emit_select(value, ordered, unordered)
        }
        (Float, Boolean) => backend.emit_compare(ComparePredicate::Ord, value, value),
        (Signed | Unsigned, Float) => {
            let ty = to.raw_type();
            let kind = if from.is_signed() {
                CastKind::SiToFp
            } else {
                CastKind::UiToFp
            };

            let converted = backend.emit_cast(kind, value, ty);
            scale_float(backend, converted, from.exponent())
        }
        (Float, Signed | Unsigned) => {
            let scaled = scale_float(backend, value, -to.exponent());
            let kind = if to.is_signed() {
                CastKind::FpToSi
            } else {
                CastKind::FpToUi
            };

            backend.emit_cast(kind, scaled, to.raw_type())
        }
        (Boolean, Signed | Unsigned) => {
            cast_integer(backend, value, PrimitiveType::unsigned(1), to)
        }
        (Signed | Unsigned, Boolean) => {
            let zero = backend.constant_u64(from.raw_type(), 0);
            backend.emit_compare(ComparePredicate::Ne, value, zero)
        }
        (Signed | Unsigned, Signed | Unsigned) => cast_integer(backend, value, from, to),
        (Boolean, Boolean) => value,
    }
}

/// Multiplies a float by `2^exponent`
fn scale_float<B: Backend>(backend: &mut B, value: ValueRef, exponent: i32) -> ValueRef {
    if exponent == 0 {
        return value;
    }

    let ty = backend.value_type(value);
    let factor = backend.constant_float(ty, 2f64.powi(exponent));

    backend.emit_binary(BinaryOp::FMul, value, factor)
}

/// Fixed point to fixed point: sign handling, widening, exponent alignment
/// and truncation, in that order
fn cast_integer<B: Backend>(
    backend: &mut B,
    mut value: ValueRef,
    from: PrimitiveType,
    to: PrimitiveType,
) -> ValueRef {
    let mut signed = from.is_signed();
    let mut width = from.bitwidth();

    if signed && !to.is_signed() {
        value = intrinsic::abs(backend, value);
        signed = false;
    }

    if width < to.bitwidth() {
        let kind = if signed { CastKind::SExt } else { CastKind::ZExt };

        value = backend.emit_cast(kind, value, RawType::Integer(to.bitwidth()));
        width = to.bitwidth();
    }

    value = align_exponent(backend, value, signed, width, from.exponent(), to.exponent());

    if width > to.bitwidth() {
        value = backend.emit_cast(CastKind::Trunc, value, RawType::Integer(to.bitwidth()));
    }

    value
}

/// Rescales a raw fixed point value stored with exponent `from` so that it
/// represents the same number with exponent `to`. Shifting a value by its
/// whole width or more leaves nothing, so that folds to zero.
pub fn align_exponent<B: Backend>(
    backend: &mut B,
    value: ValueRef,
    signed: bool,
    width: u32,
    from: i32,
    to: i32,
) -> ValueRef {
    let ty = RawType::Integer(width);
    let shift = from.abs_diff(to);

    if shift == 0 {
        return value;
    }

    if shift >= width {
        return backend.constant_u64(ty, 0);
    }

    if from > to {
        let amount = backend.constant_u64(ty, shift.into());
        backend.emit_binary(BinaryOp::Shl, value, amount)
    } else if signed {
        intrinsic::div2(backend, value, shift)
    } else {
        let amount = backend.constant_u64(ty, shift.into());
        backend.emit_binary(BinaryOp::LShr, value, amount)
    }
}
