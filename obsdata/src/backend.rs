mod datatype;
mod engine;
pub use datatype::{BackendData, ScalarType};
pub use engine::{Capabilities, Capability, EngineKind, PointerOwner};

use crate::config::VariableCreationParams;
use crate::data::{DynScalar, DynSlice, DynSliceMut, SelectInfo, Shape};
use crate::error::ObsError;
use crate::types::{StringLength, Type};

use anyhow::{Context, Result};
use log::debug;
use ndarray::{arr0, ArrayD, ArrayView, Dimension, IxDyn};
use std::collections::BTreeMap;

/// Kinds of objects a group can list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Group,
    Variable,
}

/// Current and maximum extents of a variable. `None` in `max_dims` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimensions {
    pub dims: Shape,
    pub max_dims: Vec<Option<usize>>,
}

impl Dimensions {
    pub fn rank(&self) -> usize {
        self.dims.ndim()
    }

    pub fn num_elements(&self) -> usize {
        self.dims.num_elements()
    }
}

pub trait Backend: 'static {
    /// The name of the backend.
    const NAME: &'static str;

    /// Engine tag carried by every type this backend creates.
    const ENGINE: EngineKind;

    /// Groups work like directories and can contain groups and variables.
    type Group: GroupOp<Self> + HasAttributesOp<Self> + Clone + Send + Sync;

    /// Variables store resizable multi-dimensional arrays.
    type Variable: VariableOp<Self> + HasAttributesOp<Self> + Clone + Send + Sync;

    /// Attributes store small fixed-shape arrays.
    type Attribute: AttributeOp<Self> + Send + Sync;

    type TypeProvider: TypeProvider + 'static;

    /// Create a new, empty tree and return its root group.
    fn create_root() -> Result<Self::Group>;

    /// The engine's type provider. There is one per engine.
    fn type_provider() -> &'static Self::TypeProvider;

    fn capabilities() -> Capabilities;
}

/// Builds engine-tagged [`Type`]s.
pub trait TypeProvider: Send + Sync {
    fn make_fundamental_type(&self, scalar: ScalarType) -> Result<Type>;
    fn make_array_type(&self, dims: &[usize], scalar: ScalarType) -> Result<Type>;
    fn make_string_type(&self, length: StringLength) -> Result<Type>;

    /// Who owns memory returned by reads of variable-length data.
    fn returned_pointer_owner(&self) -> PointerOwner;
}

pub trait GroupOp<B: Backend + ?Sized> {
    /// Check if a group exists at the given path, relative to this group.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Create a group, creating any missing intermediate groups. An existing group at the
    /// path is returned as is.
    fn create_group(&self, path: &str) -> Result<B::Group>;

    /// Open an existing group.
    fn open_group(&self, path: &str) -> Result<B::Group>;

    /// List child objects, one level deep or across the whole subtree. Recursive listings
    /// name objects by their path relative to this group.
    fn list_objects(
        &self,
        filter: Option<ObjectType>,
        recurse: bool,
    ) -> Result<BTreeMap<ObjectType, Vec<String>>>;

    /// Create a variable. Leading `/`-separated segments of `name` address an intermediate
    /// group, which is created when missing. An empty `max_dims` means `max_dims == dims`.
    fn create_variable(
        &self,
        name: &str,
        dtype: &Type,
        dims: &[usize],
        max_dims: &[Option<usize>],
        params: &VariableCreationParams,
    ) -> Result<B::Variable>;

    fn open_variable(&self, name: &str) -> Result<B::Variable>;
    fn variable_exists(&self, name: &str) -> Result<bool>;
    fn remove_variable(&self, name: &str) -> Result<()>;
    fn rename_variable(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Names of the variables stored directly in this group.
    fn list_variables(&self) -> Result<Vec<String>>;

    fn list_groups(&self) -> Result<Vec<String>> {
        let mut objects = self.list_objects(Some(ObjectType::Group), false)?;
        Ok(objects.remove(&ObjectType::Group).unwrap_or_default())
    }

    fn new_variable<T: BackendData>(
        &self,
        name: &str,
        dims: &[usize],
        max_dims: &[Option<usize>],
        params: &VariableCreationParams,
    ) -> Result<B::Variable> {
        let dtype = B::type_provider().make_fundamental_type(T::DTYPE)?;
        self.create_variable(name, &dtype, dims, max_dims, params)
    }

    /// Create a fixed-size variable holding the given array.
    fn new_array_variable<'a, A, T, D>(
        &self,
        name: &str,
        arr: A,
        params: &VariableCreationParams,
    ) -> Result<B::Variable>
    where
        A: Into<ArrayView<'a, T, D>>,
        T: BackendData,
        D: Dimension,
    {
        let arr: ArrayView<'a, T, D> = arr.into();
        debug!("storing a {} array of {} as '{}'", Shape::from(arr.shape()), T::DTYPE, name);
        let variable = self.new_variable::<T>(name, arr.shape(), &[], params)?;
        variable
            .write_array(arr)
            .with_context(|| format!("while writing variable '{}'", name))?;
        Ok(variable)
    }
}

pub trait HasAttributesOp<B: Backend + ?Sized> {
    /// Create an attribute. Fails if the name is taken.
    fn create_attr(&self, name: &str, dtype: &Type, dims: &[usize]) -> Result<B::Attribute>;
    fn open_attr(&self, name: &str) -> Result<B::Attribute>;
    fn attr_exists(&self, name: &str) -> Result<bool>;
    fn remove_attr(&self, name: &str) -> Result<()>;
    fn rename_attr(&self, old_name: &str, new_name: &str) -> Result<()>;
    fn list_attrs(&self) -> Result<Vec<String>>;

    fn new_array_attr<'a, A, T, D>(&self, name: &str, value: A) -> Result<B::Attribute>
    where
        A: Into<ArrayView<'a, T, D>>,
        T: BackendData,
        D: Dimension,
    {
        let value: ArrayView<'a, T, D> = value.into();
        let dtype = B::type_provider().make_fundamental_type(T::DTYPE)?;
        let attr = self.create_attr(name, &dtype, value.shape())?;
        attr.write_array(value)
            .with_context(|| format!("while writing attribute '{}'", name))?;
        Ok(attr)
    }

    fn new_scalar_attr<T: BackendData>(&self, name: &str, value: T) -> Result<B::Attribute> {
        self.new_array_attr(name, &arr0(value))
    }

    fn get_array_attr<T: BackendData>(&self, name: &str) -> Result<ArrayD<T>> {
        self.open_attr(name)?
            .read_array()
            .with_context(|| format!("while reading attribute '{}'", name))
    }

    fn get_scalar_attr<T: BackendData>(&self, name: &str) -> Result<T> {
        let arr = self.get_array_attr::<T>(name)?;
        let len = arr.len();
        match arr.into_iter().next() {
            Some(x) if len == 1 => Ok(x),
            _ => Err(ObsError::SelectionSizeMismatch { mem: 1, file: len })
                .with_context(|| format!("attribute '{}' is not a scalar", name)),
        }
    }
}

pub trait AttributeOp<B: Backend + ?Sized> {
    fn dimensions(&self) -> Result<Shape>;
    fn dtype(&self) -> Result<Type>;

    fn is_a(&self, dtype: &Type) -> Result<bool> {
        Ok(&self.dtype()? == dtype)
    }

    /// Overwrite the whole attribute. `data` must hold exactly as many elements as the
    /// attribute.
    fn write_raw(&self, data: DynSlice<'_>, dtype: &Type) -> Result<()>;

    /// Copy the whole attribute into `data`, converting to `dtype`.
    fn read_raw(&self, data: DynSliceMut<'_>, dtype: &Type) -> Result<()>;

    fn write_array<'a, A, T, D>(&self, arr: A) -> Result<()>
    where
        A: Into<ArrayView<'a, T, D>>,
        T: BackendData,
        D: Dimension,
    {
        let arr: ArrayView<'a, T, D> = arr.into();
        let data: Vec<T> = arr.iter().cloned().collect();
        let dtype = B::type_provider().make_fundamental_type(T::DTYPE)?;
        self.write_raw(T::as_dyn_slice(&data), &dtype)
    }

    fn read_array<T: BackendData>(&self) -> Result<ArrayD<T>> {
        let shape = self.dimensions()?;
        let dtype = B::type_provider().make_fundamental_type(T::DTYPE)?;
        let mut data = vec![T::default(); shape.num_elements()];
        self.read_raw(T::as_dyn_slice_mut(&mut data), &dtype)?;
        Ok(ArrayD::from_shape_vec(IxDyn(shape.as_ref()), data)?)
    }
}

pub trait VariableOp<B: Backend + ?Sized> {
    fn dimensions(&self) -> Result<Dimensions>;

    /// Change the current extents. Every new extent must stay within the maximum; newly
    /// addressable elements take the fill value if one is set.
    fn resize(&self, dims: &[usize]) -> Result<()>;

    fn dtype(&self) -> Result<Type>;

    fn is_a(&self, dtype: &Type) -> Result<bool> {
        Ok(&self.dtype()? == dtype)
    }

    fn has_fill_value(&self) -> Result<bool> {
        Ok(self.fill_value()?.is_some())
    }

    fn fill_value(&self) -> Result<Option<DynScalar>>;

    /// Chunk sizes requested at creation, empty if none.
    fn chunk_sizes(&self) -> Result<Vec<usize>>;

    /// Gzip level requested at creation.
    fn gzip_compression(&self) -> Result<Option<u32>>;

    /// Szip `(options, pixels_per_block)` requested at creation.
    fn szip_compression(&self) -> Result<Option<(u32, u32)>>;

    fn attach_dimension_scale(&self, dim: usize, scale: &B::Variable) -> Result<()>;
    fn detach_dimension_scale(&self, dim: usize, scale: &B::Variable) -> Result<()>;
    fn is_dimension_scale_attached(&self, dim: usize, scale: &B::Variable) -> Result<bool>;
    fn is_dimension_scale(&self) -> Result<bool>;
    fn set_is_dimension_scale(&self, name: &str) -> Result<()>;
    fn dimension_scale_name(&self) -> Result<Option<String>>;

    /// Copy the elements of `data` picked by `mem` into the positions picked by `file`.
    /// `mem` may not select more points than `file`.
    fn write_raw(
        &self,
        data: DynSlice<'_>,
        dtype: &Type,
        mem: &SelectInfo,
        file: &SelectInfo,
    ) -> Result<()>;

    /// Copy the elements picked by `file` into the positions of `data` picked by `mem`.
    /// `file` may not select more points than `mem`.
    fn read_raw(
        &self,
        data: DynSliceMut<'_>,
        dtype: &Type,
        mem: &SelectInfo,
        file: &SelectInfo,
    ) -> Result<()>;

    fn write_selection<'a, A, T, D>(&self, arr: A, file: &SelectInfo) -> Result<()>
    where
        A: Into<ArrayView<'a, T, D>>,
        T: BackendData,
        D: Dimension,
    {
        let arr: ArrayView<'a, T, D> = arr.into();
        let mem = SelectInfo::all().with_extent(arr.shape());
        let data: Vec<T> = arr.iter().cloned().collect();
        let dtype = B::type_provider().make_fundamental_type(T::DTYPE)?;
        self.write_raw(T::as_dyn_slice(&data), &dtype, &mem, file)
    }

    fn write_array<'a, A, T, D>(&self, arr: A) -> Result<()>
    where
        A: Into<ArrayView<'a, T, D>>,
        T: BackendData,
        D: Dimension,
    {
        self.write_selection(arr, &SelectInfo::all())
    }

    /// Read the points picked by `file` into a new array of the given shape.
    fn read_selection<T: BackendData>(&self, file: &SelectInfo, shape: &[usize]) -> Result<ArrayD<T>> {
        let dtype = B::type_provider().make_fundamental_type(T::DTYPE)?;
        let mem = SelectInfo::all().with_extent(shape);
        let mut data = vec![T::default(); shape.iter().product()];
        self.read_raw(T::as_dyn_slice_mut(&mut data), &dtype, &mem, file)?;
        Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
    }

    fn read_array<T: BackendData>(&self) -> Result<ArrayD<T>> {
        let dims = self.dimensions()?.dims;
        self.read_selection(&SelectInfo::all(), dims.as_ref())
    }
}
