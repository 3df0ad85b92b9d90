//! Element conversion between numeric storage types.
//!
//! Integers convert exactly when the value fits and saturate otherwise. Floats going to
//! integers are truncated toward zero and saturate, with NaN mapping to zero. Narrowing
//! floats saturate to the finite extremes of the destination.

use anyhow::{bail, Result};
use num::{Bounded, NumCast, ToPrimitive, Zero};
use obsdata::{BackendData, DynScalar, ObsError};

/// Numeric element types the engine can store.
pub trait Numeric: BackendData + Copy + NumCast + Bounded + Zero + PartialOrd {}

impl Numeric for i8 {}
impl Numeric for i16 {}
impl Numeric for i32 {}
impl Numeric for i64 {}
impl Numeric for u8 {}
impl Numeric for u16 {}
impl Numeric for u32 {}
impl Numeric for u64 {}
impl Numeric for f32 {}
impl Numeric for f64 {}

pub fn convert<S: Numeric, D: Numeric>(x: S) -> D {
    match <D as NumCast>::from(x) {
        Some(y) if !overflowed(x, y) => return y,
        _ => {}
    }
    match x.to_f64() {
        Some(v) if v.is_nan() => D::zero(),
        _ if x < S::zero() => D::min_value(),
        _ => D::max_value(),
    }
}

/// A finite value that became infinite while narrowing between float types.
fn overflowed<S: Numeric, D: Numeric>(x: S, y: D) -> bool {
    let finite_source = x.to_f64().map_or(false, f64::is_finite);
    let infinite_result = y.to_f64().map_or(false, f64::is_infinite);
    finite_source && infinite_result
}

/// Converts a scalar such as a fill value to the numeric type `T`.
pub fn convert_scalar<T: Numeric>(x: &DynScalar) -> Result<T> {
    let value = match x {
        DynScalar::I8(v) => convert(*v),
        DynScalar::I16(v) => convert(*v),
        DynScalar::I32(v) => convert(*v),
        DynScalar::I64(v) => convert(*v),
        DynScalar::U8(v) => convert(*v),
        DynScalar::U16(v) => convert(*v),
        DynScalar::U32(v) => convert(*v),
        DynScalar::U64(v) => convert(*v),
        DynScalar::F32(v) => convert(*v),
        DynScalar::F64(v) => convert(*v),
        DynScalar::Usize(_) | DynScalar::Bool(_) => bail!(ObsError::UnsupportedType(format!(
            "{} has no storage type in this engine",
            x.scalar_type()
        ))),
        DynScalar::String(_) => bail!(ObsError::UnsupportedOperation(format!(
            "conversion from string to {}",
            T::DTYPE
        ))),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_integer_conversion() {
        assert_eq!(convert::<i32, i16>(1234), 1234i16);
        assert_eq!(convert::<i32, i8>(1000), i8::MAX);
        assert_eq!(convert::<i32, i8>(-1000), i8::MIN);
        assert_eq!(convert::<i32, u8>(-5), 0u8);
        assert_eq!(convert::<u64, i64>(u64::MAX), i64::MAX);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(convert::<f64, i32>(2.9), 2);
        assert_eq!(convert::<f64, i32>(-2.9), -2);
        assert_eq!(convert::<f64, i32>(f64::NAN), 0);
        assert_eq!(convert::<f64, u8>(1e10), u8::MAX);
        assert_eq!(convert::<f64, f32>(1e300), f32::MAX);
        assert_eq!(convert::<f64, f32>(-1e300), f32::MIN);
        assert_eq!(convert::<i32, f64>(-7), -7.0);
        assert!(convert::<f32, f64>(f32::NAN).is_nan());
    }

    #[test]
    fn test_convert_scalar() -> Result<()> {
        assert_eq!(convert_scalar::<f32>(&DynScalar::I32(-999))?, -999.0);
        assert_eq!(convert_scalar::<u8>(&DynScalar::F64(300.0))?, 255);
        assert!(convert_scalar::<i32>(&DynScalar::String("x".into())).is_err());
        assert!(convert_scalar::<i32>(&DynScalar::Bool(true)).is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn test_widening_is_exact(x in any::<i16>()) {
            prop_assert_eq!(convert::<i16, i64>(x), x as i64);
            prop_assert_eq!(convert::<i16, f32>(x), x as f32);
        }

        #[test]
        fn test_narrowing_saturates(x in any::<i64>()) {
            let y = convert::<i64, i16>(x);
            prop_assert_eq!(y as i64, x.clamp(i16::MIN as i64, i16::MAX as i64));
        }
    }
}
