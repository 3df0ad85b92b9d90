use crate::backend::ScalarType;
use crate::dyn_map;

use std::fmt::{Display, Formatter};

/// A single value of any [`ScalarType`], used for fill values and scalar attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum DynScalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Bool(bool),
    String(String),
}

impl DynScalar {
    pub fn scalar_type(&self) -> ScalarType {
        macro_rules! fun {
            ($variant:ident, $val:expr) => {
                ScalarType::$variant
            };
        }
        dyn_map!(self, DynScalar, fun)
    }
}

impl Display for DynScalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        macro_rules! fun {
            ($variant:ident, $val:expr) => {
                write!(f, "{}", $val)
            };
        }
        dyn_map!(self, DynScalar, fun)
    }
}

macro_rules! impl_from_dynscalar {
    ($($from:ident, $to:ident),*) => {
        $(
            impl From<$from> for DynScalar {
                fn from(val: $from) -> Self {
                    DynScalar::$to(val)
                }
            }
        )*
    };
}

impl_from_dynscalar!(
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

impl From<&str> for DynScalar {
    fn from(val: &str) -> Self {
        DynScalar::String(val.to_string())
    }
}
