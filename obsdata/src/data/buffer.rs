use crate::backend::ScalarType;
use crate::dyn_map;

/// A borrowed, type-erased source buffer for raw writes.
#[derive(Debug, Copy, Clone)]
pub enum DynSlice<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
    U64(&'a [u64]),
    Usize(&'a [usize]),
    F32(&'a [f32]),
    F64(&'a [f64]),
    Bool(&'a [bool]),
    String(&'a [String]),
}

/// A borrowed, type-erased destination buffer for raw reads.
#[derive(Debug)]
pub enum DynSliceMut<'a> {
    I8(&'a mut [i8]),
    I16(&'a mut [i16]),
    I32(&'a mut [i32]),
    I64(&'a mut [i64]),
    U8(&'a mut [u8]),
    U16(&'a mut [u16]),
    U32(&'a mut [u32]),
    U64(&'a mut [u64]),
    Usize(&'a mut [usize]),
    F32(&'a mut [f32]),
    F64(&'a mut [f64]),
    Bool(&'a mut [bool]),
    String(&'a mut [String]),
}

impl DynSlice<'_> {
    pub fn scalar_type(&self) -> ScalarType {
        macro_rules! fun {
            ($variant:ident, $val:expr) => {
                ScalarType::$variant
            };
        }
        dyn_map!(self, DynSlice, fun)
    }

    pub fn len(&self) -> usize {
        dyn_map!(self, DynSlice, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DynSliceMut<'_> {
    pub fn scalar_type(&self) -> ScalarType {
        macro_rules! fun {
            ($variant:ident, $val:expr) => {
                ScalarType::$variant
            };
        }
        dyn_map!(self, DynSliceMut, fun)
    }

    pub fn len(&self) -> usize {
        dyn_map!(self, DynSliceMut, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reborrows the buffer so it can be passed on without giving it up.
    pub fn reborrow(&mut self) -> DynSliceMut<'_> {
        macro_rules! fun {
            ($variant:ident, $val:expr) => {
                DynSliceMut::$variant(&mut **$val)
            };
        }
        dyn_map!(self, DynSliceMut, fun)
    }
}

impl<'a, T: crate::backend::BackendData> From<&'a [T]> for DynSlice<'a> {
    fn from(data: &'a [T]) -> Self {
        T::as_dyn_slice(data)
    }
}

impl<'a, T: crate::backend::BackendData> From<&'a mut [T]> for DynSliceMut<'a> {
    fn from(data: &'a mut [T]) -> Self {
        T::as_dyn_slice_mut(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dyn_slice_tags() {
        let data = vec![1.0f32, 2.0, 3.0];
        let slice: DynSlice = data.as_slice().into();
        assert_eq!(slice.scalar_type(), ScalarType::F32);
        assert_eq!(slice.len(), 3);

        let mut names = vec![String::new(); 2];
        let mut slice: DynSliceMut = names.as_mut_slice().into();
        assert_eq!(slice.reborrow().scalar_type(), ScalarType::String);
        assert_eq!(slice.len(), 2);
    }
}
