pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod types;
mod macros;

pub use backend::{
    AttributeOp, Backend, BackendData, Capabilities, Capability, Dimensions, EngineKind,
    GroupOp, HasAttributesOp, ObjectType, PointerOwner, ScalarType, TypeProvider, VariableOp,
};
pub use config::{Compression, VariableCreationParams};
pub use data::{DynScalar, DynSlice, DynSliceMut, SelectAction, SelectInfo, SelectInfoElem, Shape};
pub use error::{error_kind, ObjectKind, ObsError};
pub use types::{StringLength, Type, TypeClass, TypeKind};
