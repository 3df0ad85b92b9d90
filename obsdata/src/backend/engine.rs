use crate::error::ObsError;

use anyhow::{bail, Result};
use core::fmt::{Display, Formatter};
use std::str::FromStr;

/// The closed set of storage engines a frontend handle can be backed by.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Hdf5File,
    Hdf5Memory,
    ObsStore,
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Hdf5File => write!(f, "hdf5-file"),
            EngineKind::Hdf5Memory => write!(f, "hdf5-mem"),
            EngineKind::ObsStore => write!(f, "obs-store"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hdf5-file" => Ok(EngineKind::Hdf5File),
            "hdf5-mem" => Ok(EngineKind::Hdf5Memory),
            "obs-store" => Ok(EngineKind::ObsStore),
            other => bail!(ObsError::UnsupportedOperation(format!(
                "unknown engine '{}'",
                other
            ))),
        }
    }
}

/// Who owns memory handed out by a read of variable-length data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerOwner {
    Engine,
    Caller,
}

/// How an engine treats a creation hint.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Capability {
    Supported,
    /// Accepted and recorded, without effect on storage.
    Ignored,
    Unsupported,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub chunking: Capability,
    pub gzip: Capability,
    pub szip: Capability,
    pub mpi: Capability,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_names() -> Result<()> {
        for kind in [EngineKind::Hdf5File, EngineKind::Hdf5Memory, EngineKind::ObsStore] {
            assert_eq!(kind.to_string().parse::<EngineKind>()?, kind);
        }
        assert!("netcdf".parse::<EngineKind>().is_err());
        Ok(())
    }
}
