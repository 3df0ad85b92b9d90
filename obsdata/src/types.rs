//! Engine-tagged descriptions of element types.
//!
//! A [`Type`] is built by an engine's [`crate::backend::TypeProvider`] and is only valid for
//! that engine. Structural equality ignores the engine tag; engines check the tag separately
//! with [`Type::ensure_engine`].

use crate::backend::{EngineKind, ScalarType};
use crate::data::Shape;
use crate::error::ObsError;

use anyhow::{bail, ensure, Result};
use core::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Fundamental,
    FixedArray,
    String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeClass {
    Integer,
    Float,
    String,
    Array,
    Bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StringLength {
    Variable,
    Fixed(usize),
}

#[derive(Debug, Clone)]
pub struct Type {
    engine: EngineKind,
    kind: TypeKind,
    class: TypeClass,
    scalar: ScalarType,
    dims: Shape,
    base: Option<Box<Type>>,
    num_elements: usize,
    size: usize,
    signed: bool,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.scalar == other.scalar
            && self.size == other.size
            && self.class == other.class
            && self.num_elements == other.num_elements
            && self.signed == other.signed
            && self.dims == other.dims
            && self.base == other.base
    }
}

impl Eq for Type {}

impl Type {
    /// A scalar of the given tag. `ScalarType::String` yields the variable-length string type.
    pub fn fundamental(engine: EngineKind, scalar: ScalarType) -> Self {
        if scalar == ScalarType::String {
            return Self::string(engine);
        }
        let class = if scalar.is_integer() {
            TypeClass::Integer
        } else if scalar.is_float() {
            TypeClass::Float
        } else {
            TypeClass::Bool
        };
        Self {
            engine,
            kind: TypeKind::Fundamental,
            class,
            scalar,
            dims: Shape::default(),
            base: None,
            num_elements: 1,
            size: scalar.size_in_bytes(),
            signed: scalar.is_signed(),
        }
    }

    pub fn string(engine: EngineKind) -> Self {
        Self {
            engine,
            kind: TypeKind::String,
            class: TypeClass::String,
            scalar: ScalarType::String,
            dims: Shape::default(),
            base: None,
            num_elements: 1,
            size: ScalarType::String.size_in_bytes(),
            signed: false,
        }
    }

    /// A fixed-size array of `base` elements. The base must be a fundamental, non-string type.
    pub fn array<S: Into<Shape>>(dims: S, base: Type) -> Result<Self> {
        let dims = dims.into();
        if base.kind != TypeKind::Fundamental {
            bail!(ObsError::UnsupportedOperation(format!(
                "array types need a fundamental base type, found {}",
                base
            )));
        }
        ensure!(
            dims.ndim() > 0,
            ObsError::invalid_dimension("array types need at least one dimension")
        );
        ensure!(
            !dims.as_slice().contains(&0),
            ObsError::invalid_dimension(format!("array type extents {} contain a zero", dims))
        );
        let num_elements = dims.num_elements();
        Ok(Self {
            engine: base.engine,
            kind: TypeKind::FixedArray,
            class: TypeClass::Array,
            scalar: base.scalar,
            size: base.size * num_elements,
            signed: base.signed,
            dims,
            num_elements,
            base: Some(Box::new(base)),
        })
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn class(&self) -> TypeClass {
        self.class
    }

    /// The scalar tag of one stored element. For arrays this is the base type's tag.
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar
    }

    pub fn dims(&self) -> &Shape {
        &self.dims
    }

    pub fn base(&self) -> Option<&Type> {
        self.base.as_deref()
    }

    /// The fundamental type of one element: the base type for arrays, `self` otherwise.
    pub fn element_type(&self) -> &Type {
        self.base.as_deref().unwrap_or(self)
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn ensure_engine(&self, engine: EngineKind) -> Result<()> {
        ensure!(
            self.engine == engine,
            ObsError::type_mismatch(
                format!("a type created by {}", engine),
                format!("a type created by {}", self.engine)
            )
        );
        Ok(())
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TypeKind::Fundamental => write!(f, "{}", self.scalar),
            TypeKind::String => write!(f, "string"),
            TypeKind::FixedArray => write!(f, "[{}; {}]", self.scalar, self.dims),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E: EngineKind = EngineKind::ObsStore;

    #[test]
    fn test_type_equality() -> Result<()> {
        let i32_ty = Type::fundamental(E, ScalarType::I32);
        let f32_ty = Type::fundamental(E, ScalarType::F32);
        let u32_ty = Type::fundamental(E, ScalarType::U32);
        assert_eq!(i32_ty, Type::fundamental(E, ScalarType::I32));
        assert_ne!(i32_ty, f32_ty);
        assert_ne!(i32_ty, u32_ty);

        let a = Type::array([3usize], i32_ty.clone())?;
        assert_eq!(a, Type::array([3usize], i32_ty.clone())?);
        assert_ne!(a, Type::array([4usize], i32_ty.clone())?);
        assert_ne!(a, Type::array([3usize], f32_ty)?);
        assert_eq!(a.num_elements(), 3);
        assert_eq!(a.size(), 12);
        assert_eq!(a.element_type(), &i32_ty);
        assert_ne!(a, i32_ty);
        assert_ne!(Type::array([1usize], i32_ty.clone())?, i32_ty);
        Ok(())
    }

    #[test]
    fn test_array_base_restrictions() -> Result<()> {
        let s = Type::string(E);
        assert!(Type::array([2usize], s).is_err());
        let inner = Type::array([2usize], Type::fundamental(E, ScalarType::I8))?;
        assert!(Type::array([2usize], inner).is_err());
        assert!(Type::array(Shape::default(), Type::fundamental(E, ScalarType::I8)).is_err());
        Ok(())
    }

    #[test]
    fn test_array_zero_extent() {
        for dims in [vec![0usize], vec![2, 0]] {
            let err = Type::array(dims, Type::fundamental(E, ScalarType::I32)).unwrap_err();
            assert!(matches!(
                crate::error_kind(&err),
                Some(ObsError::InvalidDimension { .. })
            ));
        }
    }

    #[test]
    fn test_engine_tag() {
        let a = Type::fundamental(EngineKind::Hdf5File, ScalarType::F64);
        let b = Type::fundamental(EngineKind::ObsStore, ScalarType::F64);
        assert_eq!(a, b);
        assert!(b.ensure_engine(EngineKind::ObsStore).is_ok());
        assert!(a.ensure_engine(EngineKind::ObsStore).is_err());
        assert_eq!(Type::fundamental(E, ScalarType::String), Type::string(E));
    }
}
