use crate::selection::Selection;
use crate::storage::Storage;

use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use obsdata::{
    DynScalar, DynSlice, DynSliceMut, EngineKind, ObjectKind, ObsError, ScalarType, Shape, Type,
};

/// Checks that a caller buffer described by `dtype` can be transferred to or from storage
/// of type `stored`.
pub(crate) fn check_transfer_type(stored: &Type, buffer: ScalarType, dtype: &Type) -> Result<()> {
    dtype.ensure_engine(EngineKind::ObsStore)?;
    ensure!(
        buffer == dtype.scalar_type(),
        ObsError::type_mismatch(
            format!("a buffer of {}", dtype.scalar_type()),
            format!("a buffer of {}", buffer)
        )
    );
    ensure!(
        dtype.num_elements() == stored.num_elements(),
        ObsError::type_mismatch(stored, dtype)
    );
    Ok(())
}

/// A small named array with a fixed shape.
#[derive(Debug, Clone)]
pub struct Attribute {
    dims: Shape,
    dtype: Type,
    data: Storage,
}

impl Attribute {
    pub fn new(dtype: &Type, dims: &[usize]) -> Result<Self> {
        dtype.ensure_engine(EngineKind::ObsStore)?;
        let dims = Shape::from(dims);
        let mut data = Storage::new(dtype)?;
        data.resize(dims.num_elements());
        Ok(Self {
            dims,
            dtype: dtype.clone(),
            data,
        })
    }

    pub fn dims(&self) -> &Shape {
        &self.dims
    }

    pub fn dtype(&self) -> &Type {
        &self.dtype
    }

    /// Overwrite every element. The buffer must hold exactly the attribute's elements.
    pub fn write(&mut self, data: DynSlice<'_>, dtype: &Type) -> Result<()> {
        check_transfer_type(&self.dtype, data.scalar_type(), dtype)?;
        let n = self.dims.num_elements();
        let buffer_items = data.len() / dtype.num_elements();
        ensure!(
            buffer_items == n && data.len() % dtype.num_elements() == 0,
            ObsError::SelectionSizeMismatch {
                mem: buffer_items,
                file: n
            }
        );
        self.data
            .write(data, &mut Selection::all(0, n), &mut Selection::all(0, n))
    }

    /// Copy every element into `data`, which must have room for exactly that many.
    pub fn read(&self, data: DynSliceMut<'_>, dtype: &Type) -> Result<()> {
        check_transfer_type(&self.dtype, data.scalar_type(), dtype)?;
        let n = self.dims.num_elements();
        let buffer_items = data.len() / dtype.num_elements();
        ensure!(
            buffer_items == n && data.len() % dtype.num_elements() == 0,
            ObsError::SelectionSizeMismatch {
                mem: buffer_items,
                file: n
            }
        );
        self.data
            .read(data, &mut Selection::all(0, n), &mut Selection::all(0, n))
    }

    /// Set every element to `value`, converted to the attribute's type.
    pub fn fill(&mut self, value: &DynScalar) -> Result<()> {
        let n = self.dims.num_elements();
        self.data.resize(0);
        self.data.resize_with_fill(n, value)
    }

    /// The first stored element.
    pub fn first(&self) -> Option<DynScalar> {
        self.data.get(0)
    }
}

/// Named attributes of a group or variable, kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct HasAttributes {
    atts: IndexMap<String, Attribute>,
}

impl HasAttributes {
    pub fn create(&mut self, name: &str, dtype: &Type, dims: &[usize]) -> Result<&mut Attribute> {
        ensure!(!self.atts.contains_key(name), ObsError::duplicate(name));
        let attr = Attribute::new(dtype, dims)
            .with_context(|| format!("while creating attribute '{}'", name))?;
        Ok(self.atts.entry(name.to_string()).or_insert(attr))
    }

    pub fn open(&self, name: &str) -> Result<&Attribute> {
        self.atts
            .get(name)
            .ok_or_else(|| ObsError::not_found(ObjectKind::Attribute, name).into())
    }

    pub fn open_mut(&mut self, name: &str) -> Result<&mut Attribute> {
        self.atts
            .get_mut(name)
            .ok_or_else(|| ObsError::not_found(ObjectKind::Attribute, name).into())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.atts.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.atts
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| ObsError::not_found(ObjectKind::Attribute, name).into())
    }

    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        ensure!(
            self.atts.contains_key(old_name),
            ObsError::not_found(ObjectKind::Attribute, old_name)
        );
        if old_name == new_name {
            return Ok(());
        }
        ensure!(!self.atts.contains_key(new_name), ObsError::duplicate(new_name));
        if let Some(attr) = self.atts.shift_remove(old_name) {
            self.atts.insert(new_name.to_string(), attr);
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        self.atts.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdata::error_kind;

    fn ty(scalar: ScalarType) -> Type {
        Type::fundamental(EngineKind::ObsStore, scalar)
    }

    #[test]
    fn test_attribute_lifecycle() -> Result<()> {
        let mut atts = HasAttributes::default();
        atts.create("units", &ty(ScalarType::String), &[1])?;
        atts.create("valid_range", &ty(ScalarType::F32), &[2])?;

        let err = atts.create("units", &ty(ScalarType::I32), &[1]).unwrap_err();
        assert_eq!(error_kind(&err), Some(&ObsError::duplicate("units")));

        atts.rename("units", "unit")?;
        assert_eq!(atts.list(), vec!["valid_range", "unit"]);
        let err = atts.rename("unit", "valid_range").unwrap_err();
        assert_eq!(error_kind(&err), Some(&ObsError::duplicate("valid_range")));

        atts.remove("unit")?;
        assert!(!atts.exists("unit"));
        for err in [atts.remove("unit").unwrap_err(), atts.open("unit").unwrap_err()] {
            assert!(matches!(error_kind(&err), Some(ObsError::NotFound { .. })));
        }
        Ok(())
    }

    #[test]
    fn test_attribute_transfer() -> Result<()> {
        let mut attr = Attribute::new(&ty(ScalarType::I32), &[3])?;
        attr.write(DynSlice::I32(&[1, 2, 3]), &ty(ScalarType::I32))?;

        let mut out = [0f64; 3];
        attr.read(DynSliceMut::F64(&mut out), &ty(ScalarType::F64))?;
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(attr.first(), Some(DynScalar::I32(1)));

        let err = attr.write(DynSlice::I32(&[1, 2]), &ty(ScalarType::I32)).unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::SelectionSizeMismatch { mem: 2, file: 3 })
        );

        let err = attr.write(DynSlice::I32(&[1, 2, 3]), &ty(ScalarType::F32)).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::TypeMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_foreign_type_rejected() {
        let foreign = Type::fundamental(EngineKind::Hdf5File, ScalarType::I32);
        let err = Attribute::new(&foreign, &[1]).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::TypeMismatch { .. })));
    }
}
