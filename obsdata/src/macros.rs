/// Matches `$value` against the listed variants of `$enum`. Each arm either evaluates
/// `$body` with the payload bound to `$val`, or expands `$inner!(Variant, payload)`.
/// Unlisted variants go to the optional trailing arm.
#[macro_export]
macro_rules! dyn_match {
    ($value:expr, $enum:ident [$($variant:ident),+], $val:ident => $body:expr $(, $other:pat => $fallback:expr)?) => {
        match $value {
            $($enum::$variant($val) => $body,)+
            $($other => $fallback,)?
        }
    };
    ($value:expr, $enum:ident [$($variant:ident),+], $inner:ident $(, $other:pat => $fallback:expr)?) => {
        match $value {
            $($enum::$variant(_val) => $inner!($variant, _val),)+
            $($other => $fallback,)?
        }
    };
}

/// [`dyn_match!`] over one variant per [`ScalarType`](crate::ScalarType).
#[macro_export]
macro_rules! dyn_map {
    ($value:expr, $enum:ident, $($arm:tt)+) => {
        $crate::dyn_match!(
            $value,
            $enum [I8, I16, I32, I64, U8, U16, U32, U64, Usize, F32, F64, Bool, String],
            $($arm)+
        )
    };
}

/// [`dyn_match!`] over the fixed-width numeric variants. Everything else goes to `$other`.
#[macro_export]
macro_rules! dyn_map_numeric {
    ($value:expr, $enum:ident, $($arm:tt)+) => {
        $crate::dyn_match!(
            $value,
            $enum [I8, I16, I32, I64, U8, U16, U32, U64, F32, F64],
            $($arm)+
        )
    };
}
