use crate::data::{DynScalar, DynSlice, DynSliceMut};

use anyhow::{bail, Result};
use core::fmt::{Display, Formatter};

/// Scalar element types that can cross the frontend boundary.
///
/// Engines decide which of them they can store: the in-memory engine maps every tag except
/// `Bool` and `Usize`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Bool,
    String,
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::I8 => write!(f, "i8"),
            ScalarType::I16 => write!(f, "i16"),
            ScalarType::I32 => write!(f, "i32"),
            ScalarType::I64 => write!(f, "i64"),
            ScalarType::U8 => write!(f, "u8"),
            ScalarType::U16 => write!(f, "u16"),
            ScalarType::U32 => write!(f, "u32"),
            ScalarType::U64 => write!(f, "u64"),
            ScalarType::Usize => write!(f, "usize"),
            ScalarType::F32 => write!(f, "f32"),
            ScalarType::F64 => write!(f, "f64"),
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::String => write!(f, "string"),
        }
    }
}

impl ScalarType {
    /// Size in bytes of one element. Strings report the size of an owned string handle.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 | ScalarType::Bool => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
            ScalarType::Usize => std::mem::size_of::<usize>(),
            ScalarType::String => std::mem::size_of::<String>(),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            ScalarType::I8
                | ScalarType::I16
                | ScalarType::I32
                | ScalarType::I64
                | ScalarType::F32
                | ScalarType::F64
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::I8
                | ScalarType::I16
                | ScalarType::I32
                | ScalarType::I64
                | ScalarType::U8
                | ScalarType::U16
                | ScalarType::U32
                | ScalarType::U64
                | ScalarType::Usize
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }
}

/// Rust types that have a [`ScalarType`] counterpart and can be moved through the raw
/// buffer interfaces.
pub trait BackendData: Send + Sync + Clone + Default + 'static {
    const DTYPE: ScalarType;
    fn into_dyn(&self) -> DynScalar;
    fn from_dyn(x: DynScalar) -> Result<Self>;
    fn as_dyn_slice(data: &[Self]) -> DynSlice<'_>;
    fn as_dyn_slice_mut(data: &mut [Self]) -> DynSliceMut<'_>;
}

macro_rules! impl_backend_data {
    ($($ty:ty, $variant:ident),*) => {
        $(
            impl BackendData for $ty {
                const DTYPE: ScalarType = ScalarType::$variant;

                fn into_dyn(&self) -> DynScalar {
                    DynScalar::$variant(self.clone())
                }

                fn from_dyn(x: DynScalar) -> Result<Self> {
                    match x {
                        DynScalar::$variant(x) => Ok(x),
                        other => bail!("Expecting {}, found {}", ScalarType::$variant, other.scalar_type()),
                    }
                }

                fn as_dyn_slice(data: &[Self]) -> DynSlice<'_> {
                    DynSlice::$variant(data)
                }

                fn as_dyn_slice_mut(data: &mut [Self]) -> DynSliceMut<'_> {
                    DynSliceMut::$variant(data)
                }
            }
        )*
    };
}

impl_backend_data!(
    i8, I8,
    i16, I16,
    i32, I32,
    i64, I64,
    u8, U8,
    u16, U16,
    u32, U32,
    u64, U64,
    usize, Usize,
    f32, F32,
    f64, F64,
    bool, Bool,
    String, String
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dyn_roundtrip() -> Result<()> {
        assert_eq!(f32::from_dyn(2.5f32.into_dyn())?, 2.5);
        assert_eq!(String::from_dyn("x".to_string().into_dyn())?, "x");
        assert!(i32::from_dyn(DynScalar::F64(1.0)).is_err());
        Ok(())
    }

    #[test]
    fn test_scalar_type_properties() {
        assert_eq!(ScalarType::I16.size_in_bytes(), 2);
        assert_eq!(ScalarType::F64.size_in_bytes(), 8);
        assert!(ScalarType::F32.is_signed());
        assert!(!ScalarType::U32.is_signed());
        assert!(ScalarType::U8.is_integer());
        assert!(!ScalarType::String.is_float());
    }
}
