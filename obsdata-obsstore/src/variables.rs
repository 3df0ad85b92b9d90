use crate::attributes::{check_transfer_type, HasAttributes};
use crate::group::split_group_var;
use crate::obs_store::{GroupId, ObsStore, VarId};
use crate::selection::Selection;
use crate::storage::Storage;

use anyhow::{bail, ensure, Context, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use obsdata::{
    Compression, DynScalar, DynSlice, DynSliceMut, EngineKind, ObjectKind, ObsError, ScalarType,
    Shape, Type, VariableCreationParams,
};

const FILL_VALUE_ATT: &str = "_fillValue";
const CHUNKS_ATT: &str = "_chunks";
const GZIP_ATT: &str = "_gzip";
const SZIP_ATT: &str = "_szip";

fn check_max_dims(dims: &[usize], max_dims: &[Option<usize>]) -> Result<()> {
    for (dim, (&requested, max)) in dims.iter().zip(max_dims).enumerate() {
        if let Some(max) = *max {
            ensure!(
                requested <= max,
                ObsError::MaxDimensionExceeded {
                    dim,
                    max,
                    requested
                }
            );
        }
    }
    Ok(())
}

/// A resizable multi-dimensional array with attributes and dimension-scale bookkeeping.
#[derive(Debug, Clone)]
pub struct Variable {
    dims: Shape,
    max_dims: Vec<Option<usize>>,
    dtype: Type,
    data: Storage,
    dim_scales: Vec<Option<VarId>>,
    is_scale: bool,
    scale_name: Option<String>,
    pub atts: HasAttributes,
    /// Creation settings the engine keeps for itself.
    impl_atts: HasAttributes,
}

impl Variable {
    /// A new variable of extents `dims`. An empty `max_dims` fixes the maximum at `dims`;
    /// `None` entries are unlimited.
    pub fn new(
        dtype: &Type,
        dims: &[usize],
        max_dims: &[Option<usize>],
        params: &VariableCreationParams,
    ) -> Result<Self> {
        dtype.ensure_engine(EngineKind::ObsStore)?;
        let max_dims: Vec<Option<usize>> = if max_dims.is_empty() {
            dims.iter().map(|&d| Some(d)).collect()
        } else {
            max_dims.to_vec()
        };
        ensure!(
            max_dims.len() == dims.len(),
            ObsError::invalid_dimension(format!(
                "{} extents given with {} maximum extents",
                dims.len(),
                max_dims.len()
            ))
        );
        check_max_dims(dims, &max_dims)?;

        let mut var = Self {
            dims: Shape::from(dims),
            max_dims,
            dtype: dtype.clone(),
            data: Storage::new(dtype)?,
            dim_scales: vec![None; dims.len()],
            is_scale: false,
            scale_name: None,
            atts: HasAttributes::default(),
            impl_atts: HasAttributes::default(),
        };
        var.record_params(params)?;
        var.resize_storage()?;
        Ok(var)
    }

    fn record_params(&mut self, params: &VariableCreationParams) -> Result<()> {
        if let Some(fill) = &params.fill_value {
            let elem = self.dtype.element_type().clone();
            self.impl_atts
                .create(FILL_VALUE_ATT, &elem, &[1])?
                .fill(fill)
                .context("while setting the fill value")?;
        }
        if let Some(chunks) = &params.chunks {
            ensure!(
                chunks.len() == self.dims.ndim(),
                ObsError::invalid_dimension(format!(
                    "{} chunk sizes given for a variable of rank {}",
                    chunks.len(),
                    self.dims.ndim()
                ))
            );
            warn!("chunking is recorded but ignored by the in-memory engine");
            let chunks: Vec<u64> = chunks.iter().map(|&c| c as u64).collect();
            self.impl_atts
                .create(CHUNKS_ATT, &u64_type(), &[chunks.len()])?
                .write(DynSlice::U64(&chunks), &u64_type())?;
        }
        match params.compression {
            Some(Compression::Gzip(level)) => {
                warn!("gzip compression is recorded but ignored by the in-memory engine");
                self.impl_atts
                    .create(GZIP_ATT, &u32_type(), &[1])?
                    .write(DynSlice::U32(&[level]), &u32_type())?;
            }
            Some(Compression::Szip {
                options,
                pixels_per_block,
            }) => {
                warn!("szip compression is recorded but ignored by the in-memory engine");
                self.impl_atts
                    .create(SZIP_ATT, &u32_type(), &[2])?
                    .write(DynSlice::U32(&[options, pixels_per_block]), &u32_type())?;
            }
            None => {}
        }
        Ok(())
    }

    fn resize_storage(&mut self) -> Result<()> {
        let num_items = self.dims.num_elements();
        match self.fill_value() {
            Some(fill) => self.data.resize_with_fill(num_items, &fill),
            None => {
                self.data.resize(num_items);
                Ok(())
            }
        }
    }

    pub fn dims(&self) -> &Shape {
        &self.dims
    }

    pub fn max_dims(&self) -> &[Option<usize>] {
        &self.max_dims
    }

    pub fn dtype(&self) -> &Type {
        &self.dtype
    }

    /// Change the extents; the rank is fixed at creation. Elements keep their linear
    /// positions and new elements take the fill value.
    pub fn resize(&mut self, new_dims: &[usize]) -> Result<()> {
        ensure!(
            new_dims.len() == self.dims.ndim(),
            ObsError::invalid_dimension(format!(
                "cannot resize a variable of rank {} with {} extents",
                self.dims.ndim(),
                new_dims.len()
            ))
        );
        check_max_dims(new_dims, &self.max_dims)?;
        self.dims = Shape::from(new_dims);
        self.resize_storage()
    }

    pub fn fill_value(&self) -> Option<DynScalar> {
        self.impl_atts
            .open(FILL_VALUE_ATT)
            .ok()
            .and_then(|att| att.first())
    }

    pub fn chunk_sizes(&self) -> Result<Vec<usize>> {
        if !self.impl_atts.exists(CHUNKS_ATT) {
            return Ok(Vec::new());
        }
        let att = self.impl_atts.open(CHUNKS_ATT)?;
        let mut chunks = vec![0u64; att.dims().num_elements()];
        att.read(DynSliceMut::U64(&mut chunks), &u64_type())?;
        Ok(chunks.into_iter().map(|c| c as usize).collect())
    }

    pub fn gzip_compression(&self) -> Result<Option<u32>> {
        if !self.impl_atts.exists(GZIP_ATT) {
            return Ok(None);
        }
        let mut level = [0u32];
        self.impl_atts
            .open(GZIP_ATT)?
            .read(DynSliceMut::U32(&mut level), &u32_type())?;
        Ok(Some(level[0]))
    }

    pub fn szip_compression(&self) -> Result<Option<(u32, u32)>> {
        if !self.impl_atts.exists(SZIP_ATT) {
            return Ok(None);
        }
        let mut szip = [0u32; 2];
        self.impl_atts
            .open(SZIP_ATT)?
            .read(DynSliceMut::U32(&mut szip), &u32_type())?;
        Ok(Some((szip[0], szip[1])))
    }

    fn check_dim(&self, dim: usize) -> Result<()> {
        ensure!(
            dim < self.dim_scales.len(),
            ObsError::invalid_dimension(format!(
                "dimension {} is out of range for a variable of rank {}",
                dim,
                self.dim_scales.len()
            ))
        );
        Ok(())
    }

    /// Associate `scale` with dimension `dim`, replacing any earlier association.
    pub fn attach_scale(&mut self, dim: usize, scale: VarId) -> Result<()> {
        self.check_dim(dim)?;
        self.dim_scales[dim] = Some(scale);
        Ok(())
    }

    pub fn detach_scale(&mut self, dim: usize, scale: VarId) -> Result<()> {
        self.check_dim(dim)?;
        match self.dim_scales[dim] {
            Some(attached) if attached == scale => {
                self.dim_scales[dim] = None;
                Ok(())
            }
            _ => bail!(ObsError::not_found(
                ObjectKind::DimensionScale,
                format!("{} on dimension {}", scale, dim)
            )),
        }
    }

    pub fn is_scale_attached(&self, dim: usize, scale: VarId) -> Result<bool> {
        self.check_dim(dim)?;
        Ok(self.dim_scales[dim] == Some(scale))
    }

    pub fn attached_scale(&self, dim: usize) -> Option<VarId> {
        self.dim_scales.get(dim).copied().flatten()
    }

    pub fn is_dimension_scale(&self) -> bool {
        self.is_scale
    }

    pub fn set_is_dimension_scale(&mut self, name: &str) {
        self.is_scale = true;
        self.scale_name = Some(name.to_string());
    }

    pub fn scale_name(&self) -> Option<&str> {
        self.scale_name.as_deref()
    }

    /// Copy the points of `data` picked by `mem` into the points picked by `file`.
    pub fn write(
        &mut self,
        data: DynSlice<'_>,
        dtype: &Type,
        mem: &mut Selection,
        file: &mut Selection,
    ) -> Result<()> {
        check_transfer_type(&self.dtype, data.scalar_type(), dtype)?;
        ensure!(
            mem.npoints() <= file.npoints(),
            ObsError::SelectionSizeMismatch {
                mem: mem.npoints(),
                file: file.npoints()
            }
        );
        self.data.write(data, mem, file)
    }

    /// Copy the points picked by `file` into the points of `data` picked by `mem`.
    pub fn read(
        &self,
        data: DynSliceMut<'_>,
        dtype: &Type,
        mem: &mut Selection,
        file: &mut Selection,
    ) -> Result<()> {
        check_transfer_type(&self.dtype, data.scalar_type(), dtype)?;
        ensure!(
            file.npoints() <= mem.npoints(),
            ObsError::SelectionSizeMismatch {
                mem: mem.npoints(),
                file: file.npoints()
            }
        );
        self.data.read(data, mem, file)
    }
}

fn u64_type() -> Type {
    Type::fundamental(EngineKind::ObsStore, ScalarType::U64)
}

fn u32_type() -> Type {
    Type::fundamental(EngineKind::ObsStore, ScalarType::U32)
}

/// Names of the variables of one group, in creation order.
#[derive(Debug, Clone, Default)]
pub struct HasVariables {
    vars: IndexMap<String, VarId>,
}

impl HasVariables {
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.vars.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    fn insert(&mut self, name: &str, id: VarId) {
        self.vars.insert(name.to_string(), id);
    }

    fn remove(&mut self, name: &str) -> Option<VarId> {
        self.vars.shift_remove(name)
    }

    fn rename(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        ensure!(
            self.vars.contains_key(old_name),
            ObsError::not_found(ObjectKind::Variable, old_name)
        );
        if old_name == new_name {
            return Ok(());
        }
        ensure!(!self.vars.contains_key(new_name), ObsError::duplicate(new_name));
        if let Some(id) = self.vars.shift_remove(old_name) {
            self.vars.insert(new_name.to_string(), id);
        }
        Ok(())
    }
}

impl ObsStore {
    /// The group holding variable `name` relative to `group`, and the bare variable name.
    fn variable_owner<'a>(&self, group: GroupId, name: &'a str) -> Result<(Option<GroupId>, &'a str)> {
        let (group_path, var_name) = split_group_var(name);
        let owner = match group_path {
            Some(path) => self.find_group(group, path)?,
            None => {
                self.group(group)?;
                Some(group)
            }
        };
        Ok((owner, var_name))
    }

    /// Create a variable below `group`. Leading path segments of `name` address an
    /// intermediate group, created when missing. An existing variable of that name is
    /// returned unchanged.
    pub fn create_variable(
        &mut self,
        group: GroupId,
        name: &str,
        dtype: &Type,
        dims: &[usize],
        max_dims: &[Option<usize>],
        params: &VariableCreationParams,
    ) -> Result<VarId> {
        let (group_path, var_name) = split_group_var(name);
        ensure!(
            !var_name.is_empty(),
            ObsError::UnsupportedOperation(format!("'{}' does not name a variable", name))
        );
        let owner = match group_path {
            Some(path) => self.create_group(group, path)?,
            None => {
                self.group(group)?;
                group
            }
        };
        if let Some(existing) = self.group(owner)?.vars.get(var_name) {
            debug!("variable '{}' already exists, reusing it", name);
            return Ok(existing);
        }
        let variable = Variable::new(dtype, dims, max_dims, params)
            .with_context(|| format!("while creating variable '{}'", name))?;
        let id = self.insert_variable(variable);
        self.group_mut(owner)?.vars.insert(var_name, id);
        debug!(
            "created variable '{}' in {} with type {} and extents {}",
            var_name,
            self.group_path(owner)?,
            dtype,
            Shape::from(dims)
        );
        Ok(id)
    }

    pub fn find_variable(&self, group: GroupId, name: &str) -> Result<Option<VarId>> {
        match self.variable_owner(group, name)? {
            (Some(owner), var_name) => Ok(self.group(owner)?.vars.get(var_name)),
            (None, _) => Ok(None),
        }
    }

    pub fn open_variable(&self, group: GroupId, name: &str) -> Result<VarId> {
        self.find_variable(group, name)?
            .ok_or_else(|| ObsError::not_found(ObjectKind::Variable, name).into())
    }

    pub fn variable_exists(&self, group: GroupId, name: &str) -> Result<bool> {
        Ok(self.find_variable(group, name)?.is_some())
    }

    /// Remove a variable and free its slot. Handles to it stop resolving; dimension-scale
    /// associations pointing at it are left in place.
    pub fn remove_variable(&mut self, group: GroupId, name: &str) -> Result<()> {
        let owner = match self.variable_owner(group, name)? {
            (Some(owner), var_name) => self
                .group_mut(owner)?
                .vars
                .remove(var_name)
                .map(|id| (owner, id)),
            (None, _) => None,
        };
        let (owner, id) =
            owner.ok_or_else(|| ObsError::not_found(ObjectKind::Variable, name))?;
        self.take_variable(id);
        debug!("removed variable '{}' from {}", name, self.group_path(owner)?);
        Ok(())
    }

    /// Rename a variable within its group. Both names resolve relative to `group` and must
    /// address the same owning group.
    pub fn rename_variable(&mut self, group: GroupId, old_name: &str, new_name: &str) -> Result<()> {
        let (owner, old_var) = self.variable_owner(group, old_name)?;
        let owner = owner.ok_or_else(|| ObsError::not_found(ObjectKind::Variable, old_name))?;
        let (new_owner, new_var) = self.variable_owner(group, new_name)?;
        ensure!(
            new_owner == Some(owner),
            ObsError::UnsupportedOperation(format!(
                "cannot move variable '{}' to '{}' in another group",
                old_name, new_name
            ))
        );
        self.group_mut(owner)?.vars.rename(old_var, new_var)?;
        debug!("renamed variable '{}' to '{}'", old_name, new_name);
        Ok(())
    }

    /// Names of the variables held directly by `group`.
    pub fn list_variables(&self, group: GroupId) -> Result<Vec<String>> {
        Ok(self.group(group)?.vars.names().map(str::to_string).collect())
    }

    /// Associate `scale` with dimension `dim` of `var`. Lengths are not compared.
    pub fn attach_dimension_scale(&mut self, var: VarId, dim: usize, scale: VarId) -> Result<()> {
        self.variable(scale)?;
        self.variable_mut(var)?.attach_scale(dim, scale)?;
        debug!("attached {} to dimension {} of {}", scale, dim, var);
        Ok(())
    }

    pub fn detach_dimension_scale(&mut self, var: VarId, dim: usize, scale: VarId) -> Result<()> {
        self.variable_mut(var)?.detach_scale(dim, scale)?;
        debug!("detached {} from dimension {} of {}", scale, dim, var);
        Ok(())
    }

    pub fn resize_variable(&mut self, var: VarId, new_dims: &[usize]) -> Result<()> {
        self.variable_mut(var)?.resize(new_dims)?;
        debug!("resized {} to {}", var, Shape::from(new_dims));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionMode;
    use obsdata::error_kind;

    fn ty(scalar: ScalarType) -> Type {
        Type::fundamental(EngineKind::ObsStore, scalar)
    }

    fn read_all_f32(var: &Variable) -> Result<Vec<f32>> {
        let n = var.dims().num_elements();
        let mut out = vec![0f32; n];
        var.read(
            DynSliceMut::F32(&mut out),
            &ty(ScalarType::F32),
            &mut Selection::all(0, n),
            &mut Selection::all(0, n),
        )?;
        Ok(out)
    }

    #[test]
    fn test_fill_on_growth() -> Result<()> {
        let params = VariableCreationParams::default().with_fill_value(-999.0f32);
        let mut var = Variable::new(&ty(ScalarType::F32), &[2], &[None], &params)?;
        assert_eq!(read_all_f32(&var)?, vec![-999.0, -999.0]);
        var.resize(&[4])?;
        assert_eq!(read_all_f32(&var)?, vec![-999.0; 4]);
        assert_eq!(var.fill_value(), Some(DynScalar::F32(-999.0)));
        Ok(())
    }

    #[test]
    fn test_shrink_then_grow() -> Result<()> {
        let params = VariableCreationParams::default().with_fill_value(-1i32);
        let mut var = Variable::new(&ty(ScalarType::F32), &[3], &[Some(5)], &params)?;
        var.write(
            DynSlice::F32(&[10.0, 20.0, 30.0]),
            &ty(ScalarType::F32),
            &mut Selection::all(0, 3),
            &mut Selection::all(0, 3),
        )?;
        var.resize(&[1])?;
        var.resize(&[2])?;
        assert_eq!(read_all_f32(&var)?, vec![10.0, -1.0]);

        let err = var.resize(&[6]).unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::MaxDimensionExceeded {
                dim: 0,
                max: 5,
                requested: 6
            })
        );
        assert!(var.resize(&[2, 2]).is_err());
        Ok(())
    }

    #[test]
    fn test_default_max_dims() -> Result<()> {
        let mut var = Variable::new(&ty(ScalarType::I8), &[2, 3], &[], &Default::default())?;
        assert_eq!(var.max_dims(), &[Some(2), Some(3)]);
        assert!(var.resize(&[3, 3]).is_err());
        assert!(var.fill_value().is_none());

        let err = Variable::new(&ty(ScalarType::I8), &[4], &[Some(2)], &Default::default())
            .unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(ObsError::MaxDimensionExceeded { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_creation_hints() -> Result<()> {
        let params = VariableCreationParams::default()
            .with_chunks(vec![10, 2])
            .with_compression(Compression::Szip {
                options: 32,
                pixels_per_block: 16,
            });
        let var = Variable::new(&ty(ScalarType::F64), &[100, 4], &[None, Some(4)], &params)?;
        assert_eq!(var.chunk_sizes()?, vec![10, 2]);
        assert_eq!(var.szip_compression()?, Some((32, 16)));
        assert_eq!(var.gzip_compression()?, None);
        assert!(var.atts.list().is_empty());

        let plain = Variable::new(&ty(ScalarType::F64), &[1], &[], &Default::default())?;
        assert!(plain.chunk_sizes()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_selection_size_guard() -> Result<()> {
        let mut var = Variable::new(&ty(ScalarType::I32), &[3], &[], &Default::default())?;
        let err = var
            .write(
                DynSlice::I32(&[1, 2, 3, 4, 5]),
                &ty(ScalarType::I32),
                &mut Selection::all(0, 5),
                &mut Selection::all(0, 3),
            )
            .unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::SelectionSizeMismatch { mem: 5, file: 3 })
        );
        Ok(())
    }

    #[test]
    fn test_intersect_write() -> Result<()> {
        let mut var = Variable::new(&ty(ScalarType::U16), &[3, 3], &[], &Default::default())?;
        let mut file = Selection::new(
            SelectionMode::Intersect,
            vec![vec![0, 2], vec![1, 2]],
            vec![3, 3],
        )?;
        var.write(
            DynSlice::U16(&[1, 2, 3, 4]),
            &ty(ScalarType::U16),
            &mut Selection::all(0, 4),
            &mut file,
        )?;
        let mut out = [0u16; 9];
        var.read(
            DynSliceMut::U16(&mut out),
            &ty(ScalarType::U16),
            &mut Selection::all(0, 9),
            &mut Selection::all(0, 9),
        )?;
        assert_eq!(out, [0, 1, 2, 0, 0, 0, 0, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_dimension_scales() -> Result<()> {
        let mut store = ObsStore::new();
        let root = store.root();
        let lat = store.create_variable(root, "lat", &ty(ScalarType::F32), &[4], &[], &Default::default())?;
        let lon = store.create_variable(root, "lon", &ty(ScalarType::F32), &[5], &[], &Default::default())?;
        let temp = store.create_variable(root, "temp", &ty(ScalarType::F32), &[4, 5], &[], &Default::default())?;

        store.variable_mut(lat)?.set_is_dimension_scale("lat");
        assert!(store.variable(lat)?.is_dimension_scale());
        assert_eq!(store.variable(lat)?.scale_name(), Some("lat"));

        store.attach_dimension_scale(temp, 0, lat)?;
        store.attach_dimension_scale(temp, 1, lon)?;
        assert!(store.variable(temp)?.is_scale_attached(0, lat)?);
        assert!(!store.variable(temp)?.is_scale_attached(0, lon)?);

        let err = store.detach_dimension_scale(temp, 0, lon).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::NotFound { .. })));
        store.detach_dimension_scale(temp, 0, lat)?;
        assert_eq!(store.variable(temp)?.attached_scale(0), None);
        assert!(store.attach_dimension_scale(temp, 2, lat).is_err());

        // removal leaves the association in place
        store.remove_variable(root, "lon")?;
        assert_eq!(store.variable(temp)?.attached_scale(1), Some(lon));
        assert!(store.variable(lon).is_err());
        Ok(())
    }

    #[test]
    fn test_variable_paths() -> Result<()> {
        let mut store = ObsStore::new();
        let root = store.root();
        let id = store.create_variable(root, "obs/metadata/time", &ty(ScalarType::I64), &[2], &[None], &Default::default())?;
        assert!(store.group_exists(root, "obs/metadata")?);
        assert_eq!(store.open_variable(root, "obs/metadata/time")?, id);
        let metadata = store.open_group(root, "obs/metadata")?;
        assert_eq!(store.open_variable(metadata, "time")?, id);
        assert_eq!(store.list_variables(metadata)?, vec!["time"]);
        assert!(!store.variable_exists(root, "obs/missing/time")?);

        let again = store.create_variable(root, "obs/metadata/time", &ty(ScalarType::I64), &[9], &[], &Default::default())?;
        assert_eq!(again, id);
        assert_eq!(store.variable(id)?.dims(), &Shape::from(vec![2]));

        store.rename_variable(root, "obs/metadata/time", "obs/metadata/datetime")?;
        assert!(store.variable_exists(metadata, "datetime")?);
        assert!(store.rename_variable(root, "obs/metadata/datetime", "datetime").is_err());

        store.remove_variable(metadata, "datetime")?;
        let err = store.open_variable(metadata, "datetime").unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::not_found(ObjectKind::Variable, "datetime"))
        );
        assert!(store.remove_variable(metadata, "datetime").is_err());
        assert_eq!(store.num_variables(), 0);
        Ok(())
    }
}
