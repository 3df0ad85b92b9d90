//! In-memory storage engine for `obsdata`.
//!
//! [`ObsStore`] owns a tree of groups and variables addressed by handles. The
//! [`ObsStoreBackend`] exposes the same tree through the `obsdata` backend traits, with
//! every handle sharing the tree behind a lock.

mod attributes;
mod convert;
mod group;
mod obs_store;
mod select_info;
mod selection;
mod storage;
mod types;
mod variables;

pub use attributes::{Attribute, HasAttributes};
pub use convert::{convert, convert_scalar, Numeric};
pub use obs_store::{Group, GroupId, ObsStore, VarId};
pub use select_info::{create_selection, memory_dims};
pub use selection::{SelectCounter, Selection, SelectionMode};
pub use storage::{Storage, TypedStorage};
pub use types::ObsStoreTypeProvider;
pub use variables::{HasVariables, Variable};

use anyhow::{ensure, Context, Result};
use obsdata::{
    AttributeOp, Backend, Capabilities, Dimensions, DynScalar, DynSlice, DynSliceMut, EngineKind,
    GroupOp, HasAttributesOp, ObjectType, ObsError, SelectInfo, Shape, Type, VariableOp,
    VariableCreationParams,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

type SharedStore = Arc<Mutex<ObsStore>>;

/// The in-memory engine.
pub struct ObsStoreBackend;

#[derive(Clone)]
pub struct ObsGroup {
    store: SharedStore,
    id: GroupId,
}

#[derive(Clone)]
pub struct ObsVariable {
    store: SharedStore,
    id: VarId,
    name: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AttrOwner {
    Group(GroupId),
    Variable(VarId),
}

impl AttrOwner {
    fn atts<'a>(&self, store: &'a ObsStore) -> Result<&'a HasAttributes> {
        match self {
            AttrOwner::Group(id) => Ok(&store.group(*id)?.atts),
            AttrOwner::Variable(id) => Ok(&store.variable(*id)?.atts),
        }
    }

    fn atts_mut<'a>(&self, store: &'a mut ObsStore) -> Result<&'a mut HasAttributes> {
        match self {
            AttrOwner::Group(id) => Ok(&mut store.group_mut(*id)?.atts),
            AttrOwner::Variable(id) => Ok(&mut store.variable_mut(*id)?.atts),
        }
    }
}

/// An attribute of a group or variable, addressed by name.
pub struct ObsAttribute {
    store: SharedStore,
    owner: AttrOwner,
    name: String,
}

impl ObsGroup {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The group's path from the root.
    pub fn path(&self) -> Result<String> {
        self.store.lock().group_path(self.id)
    }

    /// Whether both handles share the same tree.
    pub fn same_store(&self, other: &ObsGroup) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    fn group_handle(&self, id: GroupId) -> ObsGroup {
        ObsGroup {
            store: self.store.clone(),
            id,
        }
    }

    fn variable_handle(&self, id: VarId, name: &str) -> ObsVariable {
        ObsVariable {
            store: self.store.clone(),
            id,
            name: name.to_string(),
        }
    }
}

impl ObsVariable {
    pub fn id(&self) -> VarId {
        self.id
    }

    /// The path the variable was created or opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_same_store(&self, scale: &ObsVariable) -> Result<()> {
        ensure!(
            Arc::ptr_eq(&self.store, &scale.store),
            ObsError::UnsupportedOperation(format!(
                "{} belongs to a different tree than {}",
                scale.id, self.id
            ))
        );
        Ok(())
    }
}

impl ObsAttribute {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for ObsGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ObsGroup({})", self.id)
    }
}

impl Debug for ObsVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ObsVariable({}, '{}')", self.id, self.name)
    }
}

impl Debug for ObsAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ObsAttribute({:?}, '{}')", self.owner, self.name)
    }
}

impl Backend for ObsStoreBackend {
    const NAME: &'static str = "obs-store";
    const ENGINE: EngineKind = EngineKind::ObsStore;

    type Group = ObsGroup;
    type Variable = ObsVariable;
    type Attribute = ObsAttribute;
    type TypeProvider = ObsStoreTypeProvider;

    fn create_root() -> Result<Self::Group> {
        let store = ObsStore::new();
        let id = store.root();
        Ok(ObsGroup {
            store: Arc::new(Mutex::new(store)),
            id,
        })
    }

    fn type_provider() -> &'static Self::TypeProvider {
        &types::TYPE_PROVIDER
    }

    fn capabilities() -> Capabilities {
        types::capabilities()
    }
}

impl GroupOp<ObsStoreBackend> for ObsGroup {
    fn exists(&self, path: &str) -> Result<bool> {
        self.store.lock().group_exists(self.id, path)
    }

    fn create_group(&self, path: &str) -> Result<ObsGroup> {
        let id = self.store.lock().create_group(self.id, path)?;
        Ok(self.group_handle(id))
    }

    fn open_group(&self, path: &str) -> Result<ObsGroup> {
        let id = self.store.lock().open_group(self.id, path)?;
        Ok(self.group_handle(id))
    }

    fn list_objects(
        &self,
        filter: Option<ObjectType>,
        recurse: bool,
    ) -> Result<BTreeMap<ObjectType, Vec<String>>> {
        self.store.lock().list_objects(self.id, filter, recurse)
    }

    fn create_variable(
        &self,
        name: &str,
        dtype: &Type,
        dims: &[usize],
        max_dims: &[Option<usize>],
        params: &VariableCreationParams,
    ) -> Result<ObsVariable> {
        let id = self
            .store
            .lock()
            .create_variable(self.id, name, dtype, dims, max_dims, params)?;
        Ok(self.variable_handle(id, name))
    }

    fn open_variable(&self, name: &str) -> Result<ObsVariable> {
        let id = self.store.lock().open_variable(self.id, name)?;
        Ok(self.variable_handle(id, name))
    }

    fn variable_exists(&self, name: &str) -> Result<bool> {
        self.store.lock().variable_exists(self.id, name)
    }

    fn remove_variable(&self, name: &str) -> Result<()> {
        self.store.lock().remove_variable(self.id, name)
    }

    fn rename_variable(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.store.lock().rename_variable(self.id, old_name, new_name)
    }

    fn list_variables(&self) -> Result<Vec<String>> {
        self.store.lock().list_variables(self.id)
    }
}

macro_rules! impl_has_attributes {
    ($handle:ident, $owner:ident) => {
        impl HasAttributesOp<ObsStoreBackend> for $handle {
            fn create_attr(&self, name: &str, dtype: &Type, dims: &[usize]) -> Result<ObsAttribute> {
                let owner = AttrOwner::$owner(self.id);
                owner
                    .atts_mut(&mut self.store.lock())?
                    .create(name, dtype, dims)?;
                Ok(ObsAttribute {
                    store: self.store.clone(),
                    owner,
                    name: name.to_string(),
                })
            }

            fn open_attr(&self, name: &str) -> Result<ObsAttribute> {
                let owner = AttrOwner::$owner(self.id);
                owner.atts(&self.store.lock())?.open(name)?;
                Ok(ObsAttribute {
                    store: self.store.clone(),
                    owner,
                    name: name.to_string(),
                })
            }

            fn attr_exists(&self, name: &str) -> Result<bool> {
                let store = self.store.lock();
                Ok(AttrOwner::$owner(self.id).atts(&store)?.exists(name))
            }

            fn remove_attr(&self, name: &str) -> Result<()> {
                let mut store = self.store.lock();
                AttrOwner::$owner(self.id).atts_mut(&mut store)?.remove(name)
            }

            fn rename_attr(&self, old_name: &str, new_name: &str) -> Result<()> {
                let mut store = self.store.lock();
                AttrOwner::$owner(self.id)
                    .atts_mut(&mut store)?
                    .rename(old_name, new_name)
            }

            fn list_attrs(&self) -> Result<Vec<String>> {
                let store = self.store.lock();
                Ok(AttrOwner::$owner(self.id).atts(&store)?.list())
            }
        }
    };
}

impl_has_attributes!(ObsGroup, Group);
impl_has_attributes!(ObsVariable, Variable);

impl AttributeOp<ObsStoreBackend> for ObsAttribute {
    fn dimensions(&self) -> Result<Shape> {
        let store = self.store.lock();
        Ok(self.owner.atts(&store)?.open(&self.name)?.dims().clone())
    }

    fn dtype(&self) -> Result<Type> {
        let store = self.store.lock();
        Ok(self.owner.atts(&store)?.open(&self.name)?.dtype().clone())
    }

    fn write_raw(&self, data: DynSlice<'_>, dtype: &Type) -> Result<()> {
        let mut store = self.store.lock();
        self.owner
            .atts_mut(&mut store)?
            .open_mut(&self.name)?
            .write(data, dtype)
            .with_context(|| format!("while writing attribute '{}'", self.name))
    }

    fn read_raw(&self, data: DynSliceMut<'_>, dtype: &Type) -> Result<()> {
        let store = self.store.lock();
        self.owner
            .atts(&store)?
            .open(&self.name)?
            .read(data, dtype)
            .with_context(|| format!("while reading attribute '{}'", self.name))
    }
}

impl VariableOp<ObsStoreBackend> for ObsVariable {
    fn dimensions(&self) -> Result<Dimensions> {
        let store = self.store.lock();
        let var = store.variable(self.id)?;
        Ok(Dimensions {
            dims: var.dims().clone(),
            max_dims: var.max_dims().to_vec(),
        })
    }

    fn resize(&self, dims: &[usize]) -> Result<()> {
        self.store.lock().resize_variable(self.id, dims)
    }

    fn dtype(&self) -> Result<Type> {
        Ok(self.store.lock().variable(self.id)?.dtype().clone())
    }

    fn fill_value(&self) -> Result<Option<DynScalar>> {
        Ok(self.store.lock().variable(self.id)?.fill_value())
    }

    fn chunk_sizes(&self) -> Result<Vec<usize>> {
        self.store.lock().variable(self.id)?.chunk_sizes()
    }

    fn gzip_compression(&self) -> Result<Option<u32>> {
        self.store.lock().variable(self.id)?.gzip_compression()
    }

    fn szip_compression(&self) -> Result<Option<(u32, u32)>> {
        self.store.lock().variable(self.id)?.szip_compression()
    }

    fn attach_dimension_scale(&self, dim: usize, scale: &ObsVariable) -> Result<()> {
        self.ensure_same_store(scale)?;
        self.store
            .lock()
            .attach_dimension_scale(self.id, dim, scale.id)
    }

    fn detach_dimension_scale(&self, dim: usize, scale: &ObsVariable) -> Result<()> {
        self.ensure_same_store(scale)?;
        self.store
            .lock()
            .detach_dimension_scale(self.id, dim, scale.id)
    }

    fn is_dimension_scale_attached(&self, dim: usize, scale: &ObsVariable) -> Result<bool> {
        if !Arc::ptr_eq(&self.store, &scale.store) {
            return Ok(false);
        }
        self.store
            .lock()
            .variable(self.id)?
            .is_scale_attached(dim, scale.id)
    }

    fn is_dimension_scale(&self) -> Result<bool> {
        Ok(self.store.lock().variable(self.id)?.is_dimension_scale())
    }

    fn set_is_dimension_scale(&self, name: &str) -> Result<()> {
        self.store
            .lock()
            .variable_mut(self.id)?
            .set_is_dimension_scale(name);
        Ok(())
    }

    fn dimension_scale_name(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .lock()
            .variable(self.id)?
            .scale_name()
            .map(str::to_string))
    }

    fn write_raw(
        &self,
        data: DynSlice<'_>,
        dtype: &Type,
        mem: &SelectInfo,
        file: &SelectInfo,
    ) -> Result<()> {
        let mut store = self.store.lock();
        let var = store.variable_mut(self.id)?;
        let mem_dims = memory_dims(mem, data.len(), dtype.num_elements());
        let mut mem_sel =
            create_selection(mem, &mem_dims).context("while selecting from the memory buffer")?;
        let mut file_sel = create_selection(file, var.dims().as_ref())
            .with_context(|| format!("while selecting from variable '{}'", self.name))?;
        var.write(data, dtype, &mut mem_sel, &mut file_sel)
            .with_context(|| format!("while writing variable '{}'", self.name))
    }

    fn read_raw(
        &self,
        data: DynSliceMut<'_>,
        dtype: &Type,
        mem: &SelectInfo,
        file: &SelectInfo,
    ) -> Result<()> {
        let store = self.store.lock();
        let var = store.variable(self.id)?;
        let mem_dims = memory_dims(mem, data.len(), dtype.num_elements());
        let mut mem_sel =
            create_selection(mem, &mem_dims).context("while selecting from the memory buffer")?;
        let mut file_sel = create_selection(file, var.dims().as_ref())
            .with_context(|| format!("while selecting from variable '{}'", self.name))?;
        var.read(data, dtype, &mut mem_sel, &mut file_sel)
            .with_context(|| format!("while reading variable '{}'", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1};
    use obsdata::{error_kind, ObjectKind, ScalarType, TypeProvider};

    #[test]
    fn test_fill_on_growth() -> Result<()> {
        let root = ObsStoreBackend::create_root()?;
        let params = VariableCreationParams::default().with_fill_value(-999.0f32);
        let temp = root.new_variable::<f32>("temp", &[2], &[None], &params)?;
        temp.write_array(&arr1(&[1.0f32, 2.0]))?;
        temp.resize(&[3])?;
        assert_eq!(temp.read_array::<f32>()?, arr1(&[1.0f32, 2.0, -999.0]).into_dyn());
        assert_eq!(temp.fill_value()?, Some(DynScalar::F32(-999.0)));
        Ok(())
    }

    #[test]
    fn test_handles_share_tree() -> Result<()> {
        let root = ObsStoreBackend::create_root()?;
        let b = root.create_group("a/b")?;
        assert_eq!(b.path()?, "/a/b");
        b.new_variable::<i32>("x", &[4], &[], &Default::default())?;

        let x = root.open_variable("a/b/x")?;
        x.write_array(&Array1::from_vec(vec![1i32, 2, 3, 4]))?;
        let again = root.open_group("a")?.open_group("b")?.open_variable("x")?;
        assert_eq!(again.read_array::<i64>()?, arr1(&[1i64, 2, 3, 4]).into_dyn());
        assert!(root.open_group("/a/b/")?.same_store(&b));
        Ok(())
    }

    #[test]
    fn test_attribute_handles() -> Result<()> {
        let root = ObsStoreBackend::create_root()?;
        let var = root.new_variable::<f64>("v", &[1], &[], &Default::default())?;
        var.new_scalar_attr("scale_factor", 0.5f64)?;
        var.new_array_attr("valid_range", &arr1(&[0i16, 100]))?;
        assert_eq!(var.get_scalar_attr::<f32>("scale_factor")?, 0.5);
        assert_eq!(
            var.open_attr("valid_range")?.dimensions()?,
            Shape::from([2usize])
        );
        assert_eq!(var.list_attrs()?, vec!["scale_factor", "valid_range"]);

        let attr = var.open_attr("scale_factor")?;
        var.rename_attr("scale_factor", "scale")?;
        let err = attr.dtype().unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::not_found(ObjectKind::Attribute, "scale_factor"))
        );
        assert!(!root.attr_exists("scale")?);
        Ok(())
    }

    #[test]
    fn test_errors_name_the_variable() -> Result<()> {
        let root = ObsStoreBackend::create_root()?;
        root.create_group("obs")?
            .new_variable::<i32>("temp", &[4, 3], &[], &Default::default())?;
        let temp = root.open_variable("obs/temp")?;
        assert_eq!(temp.name(), "obs/temp");

        let err = temp.write_array(&arr1(&[1i32, 2])).unwrap_err();
        assert!(format!("{:#}", err).contains("while writing variable 'obs/temp'"));
        let err = temp
            .read_selection::<i32>(&SelectInfo::range(11, 2), &[2])
            .unwrap_err();
        assert!(format!("{:#}", err).contains("while selecting from variable 'obs/temp'"));
        assert!(!format!("{:#}", err).contains("variable#"));
        Ok(())
    }

    #[test]
    fn test_scales_across_trees() -> Result<()> {
        let one = ObsStoreBackend::create_root()?;
        let two = ObsStoreBackend::create_root()?;
        let var = one.new_variable::<f32>("v", &[3], &[], &Default::default())?;
        let scale = two.new_variable::<f32>("v", &[3], &[], &Default::default())?;
        let err = var.attach_dimension_scale(0, &scale).unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(ObsError::UnsupportedOperation(_))
        ));
        assert!(!var.is_dimension_scale_attached(0, &scale)?);
        Ok(())
    }

    #[test]
    fn test_backend_surface() -> Result<()> {
        assert_eq!(ObsStoreBackend::NAME, "obs-store");
        assert_eq!(ObsStoreBackend::ENGINE.to_string(), ObsStoreBackend::NAME);
        let provider = ObsStoreBackend::type_provider();
        let dtype = provider.make_fundamental_type(ScalarType::U16)?;
        assert_eq!(dtype.engine(), EngineKind::ObsStore);
        assert_eq!(
            ObsStoreBackend::capabilities().mpi,
            obsdata::Capability::Unsupported
        );
        Ok(())
    }
}
