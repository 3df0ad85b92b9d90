use crate::convert::{convert, convert_scalar, Numeric};
use crate::selection::Selection;

use anyhow::{bail, Result};
use log::trace;
use obsdata::{BackendData, DynScalar, DynSlice, DynSliceMut, ObsError, ScalarType, Type};

/// Flat row-major storage of one element type. Each addressable item holds
/// `elements_per_item` consecutive elements.
#[derive(Debug, Clone)]
pub struct TypedStorage<T> {
    data: Vec<T>,
    elements_per_item: usize,
}

fn item_range(index: usize, elements_per_item: usize) -> std::ops::Range<usize> {
    index * elements_per_item..(index + 1) * elements_per_item
}

fn out_of_range(index: usize, num_items: usize) -> ObsError {
    ObsError::Addressing {
        index,
        max_index: num_items.saturating_sub(1),
    }
}

impl<T: BackendData> TypedStorage<T> {
    pub fn new(elements_per_item: usize) -> Self {
        Self {
            data: Vec::new(),
            elements_per_item: elements_per_item.max(1),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.data.len() / self.elements_per_item
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Resize to `num_items` items. Surviving elements keep their linear positions; new
    /// ones take the default value.
    pub fn resize(&mut self, num_items: usize) {
        self.data.resize(num_items * self.elements_per_item, T::default());
    }

    pub fn resize_with_fill(&mut self, num_items: usize, fill: T) {
        self.data.resize(num_items * self.elements_per_item, fill);
    }

    /// Copy the items of `src` picked by `mem` to the items picked by `file`, converting
    /// each element with `conv`. Iteration follows the memory selection.
    pub fn write_with<U, F>(
        &mut self,
        src: &[U],
        mem: &mut Selection,
        file: &mut Selection,
        conv: F,
    ) -> Result<()>
    where
        F: Fn(&U) -> T,
    {
        let epi = self.elements_per_item;
        let src_items = src.len() / epi;
        let num_items = self.len();
        mem.init_lin_indx();
        file.init_lin_indx();
        while !mem.end_lin_indx() {
            let m = mem.next_lin_indx()?;
            let f = file.next_lin_indx()?;
            let from = src
                .get(item_range(m, epi))
                .ok_or_else(|| out_of_range(m, src_items))?;
            let to = self
                .data
                .get_mut(item_range(f, epi))
                .ok_or_else(|| out_of_range(f, num_items))?;
            to.iter_mut().zip(from).for_each(|(d, s)| *d = conv(s));
        }
        Ok(())
    }

    /// Copy the items picked by `file` into the items of `dest` picked by `mem`, converting
    /// each element with `conv`. Iteration follows the file selection.
    pub fn read_with<U, F>(
        &self,
        dest: &mut [U],
        mem: &mut Selection,
        file: &mut Selection,
        conv: F,
    ) -> Result<()>
    where
        F: Fn(&T) -> U,
    {
        let epi = self.elements_per_item;
        let dest_items = dest.len() / epi;
        let num_items = self.len();
        mem.init_lin_indx();
        file.init_lin_indx();
        while !file.end_lin_indx() {
            let m = mem.next_lin_indx()?;
            let f = file.next_lin_indx()?;
            let from = self
                .data
                .get(item_range(f, epi))
                .ok_or_else(|| out_of_range(f, num_items))?;
            let to = dest
                .get_mut(item_range(m, epi))
                .ok_or_else(|| out_of_range(m, dest_items))?;
            to.iter_mut().zip(from).for_each(|(d, s)| *d = conv(s));
        }
        Ok(())
    }
}

macro_rules! storage_map {
    ($value:expr, $val:ident => $body:expr) => {
        obsdata::dyn_map_numeric!($value, Storage, $val => $body, Storage::String($val) => $body)
    };
}

/// Storage for one of the engine's element types, chosen from a [`Type`].
#[derive(Debug, Clone)]
pub enum Storage {
    I8(TypedStorage<i8>),
    I16(TypedStorage<i16>),
    I32(TypedStorage<i32>),
    I64(TypedStorage<i64>),
    U8(TypedStorage<u8>),
    U16(TypedStorage<u16>),
    U32(TypedStorage<u32>),
    U64(TypedStorage<u64>),
    F32(TypedStorage<f32>),
    F64(TypedStorage<f64>),
    String(TypedStorage<String>),
}

impl Storage {
    /// Empty storage for items of `dtype`. Array types store their elements inline.
    pub fn new(dtype: &Type) -> Result<Self> {
        let epi = dtype.num_elements();
        let storage = match dtype.scalar_type() {
            ScalarType::I8 => Storage::I8(TypedStorage::new(epi)),
            ScalarType::I16 => Storage::I16(TypedStorage::new(epi)),
            ScalarType::I32 => Storage::I32(TypedStorage::new(epi)),
            ScalarType::I64 => Storage::I64(TypedStorage::new(epi)),
            ScalarType::U8 => Storage::U8(TypedStorage::new(epi)),
            ScalarType::U16 => Storage::U16(TypedStorage::new(epi)),
            ScalarType::U32 => Storage::U32(TypedStorage::new(epi)),
            ScalarType::U64 => Storage::U64(TypedStorage::new(epi)),
            ScalarType::F32 => Storage::F32(TypedStorage::new(epi)),
            ScalarType::F64 => Storage::F64(TypedStorage::new(epi)),
            ScalarType::String => Storage::String(TypedStorage::new(epi)),
            ty @ (ScalarType::Usize | ScalarType::Bool) => bail!(ObsError::UnsupportedType(
                format!("{} has no storage type in this engine", ty)
            )),
        };
        Ok(storage)
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Storage::I8(_) => ScalarType::I8,
            Storage::I16(_) => ScalarType::I16,
            Storage::I32(_) => ScalarType::I32,
            Storage::I64(_) => ScalarType::I64,
            Storage::U8(_) => ScalarType::U8,
            Storage::U16(_) => ScalarType::U16,
            Storage::U32(_) => ScalarType::U32,
            Storage::U64(_) => ScalarType::U64,
            Storage::F32(_) => ScalarType::F32,
            Storage::F64(_) => ScalarType::F64,
            Storage::String(_) => ScalarType::String,
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        storage_map!(self, s => s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at linear element position `index`.
    pub fn get(&self, index: usize) -> Option<DynScalar> {
        storage_map!(self, s => s.as_slice().get(index).map(|v| v.into_dyn()))
    }

    pub fn resize(&mut self, num_items: usize) {
        storage_map!(self, s => s.resize(num_items))
    }

    /// Resize, initializing new elements with `fill` converted to the storage type.
    pub fn resize_with_fill(&mut self, num_items: usize, fill: &DynScalar) -> Result<()> {
        obsdata::dyn_map_numeric!(self, Storage, s => s.resize_with_fill(num_items, convert_scalar(fill)?), other => match (other, fill) {
            (Storage::String(s), DynScalar::String(fill)) => s.resize_with_fill(num_items, fill.clone()),
            (_, fill) => bail!(ObsError::UnsupportedOperation(format!(
                "conversion from {} to string",
                fill.scalar_type()
            ))),
        });
        Ok(())
    }

    pub fn write(
        &mut self,
        data: DynSlice<'_>,
        mem: &mut Selection,
        file: &mut Selection,
    ) -> Result<()> {
        macro_rules! direct {
            ($storage:expr, $data:expr, $($variant:ident),*) => {
                match ($storage, $data) {
                    $(
                        (Storage::$variant(s), DynSlice::$variant(src)) => {
                            s.write_with(src, mem, file, |v| v.clone())
                        }
                    )*
                    (storage, data) => storage.write_converted(data, mem, file),
                }
            };
        }
        direct!(self, data, I8, I16, I32, I64, U8, U16, U32, U64, F32, F64, String)
    }

    pub fn read(
        &self,
        data: DynSliceMut<'_>,
        mem: &mut Selection,
        file: &mut Selection,
    ) -> Result<()> {
        macro_rules! direct {
            ($storage:expr, $data:expr, $($variant:ident),*) => {
                match ($storage, $data) {
                    $(
                        (Storage::$variant(s), DynSliceMut::$variant(dest)) => {
                            s.read_with(dest, mem, file, |v| v.clone())
                        }
                    )*
                    (storage, data) => storage.read_converted(data, mem, file),
                }
            };
        }
        direct!(self, data, I8, I16, I32, I64, U8, U16, U32, U64, F32, F64, String)
    }

    fn write_converted(
        &mut self,
        data: DynSlice<'_>,
        mem: &mut Selection,
        file: &mut Selection,
    ) -> Result<()> {
        trace!("converting {} to {} on write", data.scalar_type(), self.scalar_type());
        let from = data.scalar_type();
        obsdata::dyn_map_numeric!(self, Storage, s => write_numeric(s, data, mem, file), _string => bail!(
            ObsError::UnsupportedOperation(format!("conversion from {} to string", from))
        ))
    }

    fn read_converted(
        &self,
        data: DynSliceMut<'_>,
        mem: &mut Selection,
        file: &mut Selection,
    ) -> Result<()> {
        trace!("converting {} to {} on read", self.scalar_type(), data.scalar_type());
        let to = data.scalar_type();
        obsdata::dyn_map_numeric!(self, Storage, s => read_numeric(s, data, mem, file), _string => bail!(
            ObsError::UnsupportedOperation(format!("conversion from string to {}", to))
        ))
    }
}

fn unconvertible(from: ScalarType, to: ScalarType) -> ObsError {
    match (from, to) {
        (ScalarType::Usize | ScalarType::Bool, _) => {
            ObsError::UnsupportedType(format!("{} has no storage type in this engine", from))
        }
        (_, ScalarType::Usize | ScalarType::Bool) => {
            ObsError::UnsupportedType(format!("{} has no storage type in this engine", to))
        }
        _ => ObsError::UnsupportedOperation(format!("conversion from {} to {}", from, to)),
    }
}

fn write_numeric<T: Numeric>(
    storage: &mut TypedStorage<T>,
    data: DynSlice<'_>,
    mem: &mut Selection,
    file: &mut Selection,
) -> Result<()> {
    obsdata::dyn_map_numeric!(data, DynSlice, src => storage.write_with(src, mem, file, |v| convert(*v)), other => {
        bail!(unconvertible(other.scalar_type(), T::DTYPE))
    })
}

fn read_numeric<T: Numeric>(
    storage: &TypedStorage<T>,
    data: DynSliceMut<'_>,
    mem: &mut Selection,
    file: &mut Selection,
) -> Result<()> {
    obsdata::dyn_map_numeric!(data, DynSliceMut, dest => storage.read_with(dest, mem, file, |v| convert(*v)), other => {
        bail!(unconvertible(T::DTYPE, other.scalar_type()))
    })
}
