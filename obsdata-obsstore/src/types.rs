use anyhow::{bail, Result};
use log::debug;
use obsdata::{
    Capabilities, Capability, EngineKind, ObsError, PointerOwner, ScalarType, StringLength, Type,
    TypeProvider,
};

/// Type provider of the in-memory engine.
#[derive(Debug, Default, Copy, Clone)]
pub struct ObsStoreTypeProvider;

pub(crate) static TYPE_PROVIDER: ObsStoreTypeProvider = ObsStoreTypeProvider;

impl TypeProvider for ObsStoreTypeProvider {
    fn make_fundamental_type(&self, scalar: ScalarType) -> Result<Type> {
        match scalar {
            ScalarType::Usize | ScalarType::Bool => bail!(ObsError::UnsupportedType(format!(
                "{} has no storage type in this engine",
                scalar
            ))),
            _ => Ok(Type::fundamental(EngineKind::ObsStore, scalar)),
        }
    }

    fn make_array_type(&self, _dims: &[usize], scalar: ScalarType) -> Result<Type> {
        bail!(ObsError::UnsupportedOperation(format!(
            "the in-memory engine does not provide array types (requested an array of {})",
            scalar
        )))
    }

    fn make_string_type(&self, length: StringLength) -> Result<Type> {
        if let StringLength::Fixed(n) = length {
            debug!("strings of fixed length {} are stored as variable-length strings", n);
        }
        Ok(Type::string(EngineKind::ObsStore))
    }

    fn returned_pointer_owner(&self) -> PointerOwner {
        PointerOwner::Engine
    }
}

pub(crate) fn capabilities() -> Capabilities {
    Capabilities {
        chunking: Capability::Ignored,
        gzip: Capability::Ignored,
        szip: Capability::Ignored,
        mpi: Capability::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdata::{error_kind, TypeKind};

    #[test]
    fn test_type_provider() -> Result<()> {
        let provider = ObsStoreTypeProvider;
        let f = provider.make_fundamental_type(ScalarType::F32)?;
        assert_eq!(f.engine(), EngineKind::ObsStore);
        assert_eq!(f.size(), 4);

        let s = provider.make_string_type(StringLength::Fixed(8))?;
        assert_eq!(s.kind(), TypeKind::String);
        assert_eq!(s, provider.make_string_type(StringLength::Variable)?);

        for scalar in [ScalarType::Bool, ScalarType::Usize] {
            let err = provider.make_fundamental_type(scalar).unwrap_err();
            assert!(matches!(error_kind(&err), Some(ObsError::UnsupportedType(_))));
        }
        let err = provider.make_array_type(&[3], ScalarType::I32).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::UnsupportedOperation(_))));
        assert_eq!(provider.returned_pointer_owner(), PointerOwner::Engine);
        Ok(())
    }
}
