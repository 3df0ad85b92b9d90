//! Error taxonomy shared by every engine.
//!
//! Operations return [`anyhow::Result`]. The failure kind is an [`ObsError`] raised at the
//! point of detection; callers add context with [`anyhow::Context`] and can recover the kind
//! with [`error_kind`].

use std::fmt::{Display, Formatter};

/// The kind of object a lookup failed to find.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Group,
    Variable,
    Attribute,
    DimensionScale,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Group => write!(f, "group"),
            ObjectKind::Variable => write!(f, "variable"),
            ObjectKind::Attribute => write!(f, "attribute"),
            ObjectKind::DimensionScale => write!(f, "dimension scale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObsError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ObjectKind, name: String },

    #[error("an object named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("invalid dimensions: {reason}")]
    InvalidDimension { reason: String },

    #[error("dimension {dim} cannot be resized to {requested}, maximum is {max}")]
    MaxDimensionExceeded {
        dim: usize,
        max: usize,
        requested: usize,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("selection size mismatch: memory selection has {mem} points, file selection has {file}")]
    SelectionSizeMismatch { mem: usize, file: usize },

    #[error("linear index {index} exceeds the maximum allowed index {max_index}")]
    Addressing { index: usize, max_index: usize },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl ObsError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        ObsError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(name: impl Into<String>) -> Self {
        ObsError::DuplicateName { name: name.into() }
    }

    pub fn invalid_dimension(reason: impl Into<String>) -> Self {
        ObsError::InvalidDimension {
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(expected: impl Display, found: impl Display) -> Self {
        ObsError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Returns the first [`ObsError`] in the error chain, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<&ObsError> {
    err.chain().find_map(|e| e.downcast_ref::<ObsError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    fn lookup() -> Result<()> {
        Err(ObsError::not_found(ObjectKind::Group, "a/b/d").into())
    }

    #[test]
    fn test_error_kind_survives_context() {
        let err = lookup()
            .context("while opening group")
            .context("while reading file")
            .unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::not_found(ObjectKind::Group, "a/b/d"))
        );
        let message = format!("{:#}", err);
        assert!(message.contains("while reading file"));
        assert!(message.contains("group 'a/b/d' not found"));
    }

    #[test]
    fn test_error_kind_absent() {
        let err = anyhow::anyhow!("plain failure");
        assert!(error_kind(&err).is_none());
    }
}
