use crate::data::Shape;
use crate::error::ObsError;

use anyhow::{bail, ensure, Result};
use itertools::Itertools;
use ndarray::SliceInfoElem;
use std::ops::{Range, RangeFull};

/// How a [`SelectInfo`] picks elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectAction {
    /// Every element of the target.
    All,
    /// A contiguous range of the target's linear (row-major) storage.
    Range { start: usize, count: usize },
    /// Per dimension, the indices `start + i * stride + j` for `i < count` and `j < block`.
    Hyperslab {
        start: Vec<usize>,
        count: Vec<usize>,
        stride: Option<Vec<usize>>,
        block: Option<Vec<usize>>,
    },
    /// Explicit coordinates, visited in the order given.
    Points(Vec<Vec<usize>>),
    /// One selection per leading dimension. Missing trailing dimensions are taken whole.
    Dims(Vec<SelectInfoElem>),
}

/// A client-side selection, optionally carrying the shape of the buffer it addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectInfo {
    action: SelectAction,
    extent: Option<Shape>,
}

impl Default for SelectInfo {
    fn default() -> Self {
        Self::all()
    }
}

impl SelectInfo {
    pub fn all() -> Self {
        Self {
            action: SelectAction::All,
            extent: None,
        }
    }

    pub fn range(start: usize, count: usize) -> Self {
        Self {
            action: SelectAction::Range { start, count },
            extent: None,
        }
    }

    pub fn hyperslab(start: Vec<usize>, count: Vec<usize>) -> Self {
        Self {
            action: SelectAction::Hyperslab {
                start,
                count,
                stride: None,
                block: None,
            },
            extent: None,
        }
    }

    pub fn strided_hyperslab(
        start: Vec<usize>,
        count: Vec<usize>,
        stride: Vec<usize>,
        block: Vec<usize>,
    ) -> Self {
        Self {
            action: SelectAction::Hyperslab {
                start,
                count,
                stride: Some(stride),
                block: Some(block),
            },
            extent: None,
        }
    }

    pub fn points(points: Vec<Vec<usize>>) -> Self {
        Self {
            action: SelectAction::Points(points),
            extent: None,
        }
    }

    pub fn dims<I, E>(elems: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<SelectInfoElem>,
    {
        Self {
            action: SelectAction::Dims(elems.into_iter().map(Into::into).collect()),
            extent: None,
        }
    }

    /// Sets the shape of the buffer this selection addresses.
    pub fn with_extent<S: Into<Shape>>(mut self, extent: S) -> Self {
        self.extent = Some(extent.into());
        self
    }

    pub fn action(&self) -> &SelectAction {
        &self.action
    }

    pub fn extent(&self) -> Option<&Shape> {
        self.extent.as_ref()
    }

    pub fn is_all(&self) -> bool {
        matches!(self.action, SelectAction::All)
    }
}

/// A selection along a single dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectInfoElem {
    Index(Vec<usize>),
    Slice(SliceInfoElem),
}

pub const SLICE_FULL: SliceInfoElem = SliceInfoElem::Slice {
    start: 0,
    end: None,
    step: 1,
};

impl From<&[usize]> for SelectInfoElem {
    fn from(x: &[usize]) -> Self {
        Self::Index(x.to_vec())
    }
}

impl From<Vec<usize>> for SelectInfoElem {
    fn from(x: Vec<usize>) -> Self {
        Self::Index(x)
    }
}

impl From<Range<usize>> for SelectInfoElem {
    fn from(x: Range<usize>) -> Self {
        Self::Slice(x.into())
    }
}

impl From<Range<isize>> for SelectInfoElem {
    fn from(x: Range<isize>) -> Self {
        Self::Slice(x.into())
    }
}

impl From<RangeFull> for SelectInfoElem {
    fn from(x: RangeFull) -> Self {
        Self::Slice(x.into())
    }
}

impl From<SliceInfoElem> for SelectInfoElem {
    fn from(x: SliceInfoElem) -> Self {
        Self::Slice(x)
    }
}

impl SelectInfoElem {
    pub fn full() -> Self {
        Self::Slice(SLICE_FULL)
    }

    pub fn is_full(&self) -> bool {
        matches!(
            self,
            SelectInfoElem::Slice(SliceInfoElem::Slice {
                start: 0,
                end: None,
                step: 1
            })
        )
    }

    /// Resolves the selection against a dimension of size `bound`, returning the selected
    /// indices sorted and without duplicates. Negative slice bounds count from the end.
    pub fn to_indices(&self, bound: usize) -> Result<Vec<usize>> {
        fn resolve(x: isize, bound: usize) -> Result<usize> {
            let idx = if x < 0 {
                bound.checked_add_signed(x)
            } else {
                Some(x as usize)
            };
            match idx {
                Some(i) if i <= bound => Ok(i),
                _ => bail!(ObsError::invalid_dimension(format!(
                    "index {} is out of bounds for a dimension of size {}",
                    x, bound
                ))),
            }
        }

        let indices = match self {
            SelectInfoElem::Index(idx) => {
                if let Some(bad) = idx.iter().find(|&&i| i >= bound) {
                    bail!(ObsError::invalid_dimension(format!(
                        "index {} is out of bounds for a dimension of size {}",
                        bad, bound
                    )));
                }
                idx.iter().copied().sorted_unstable().dedup().collect()
            }
            SelectInfoElem::Slice(SliceInfoElem::Index(i)) => {
                let i = resolve(*i, bound)?;
                ensure!(
                    i < bound,
                    ObsError::invalid_dimension(format!(
                        "index {} is out of bounds for a dimension of size {}",
                        i, bound
                    ))
                );
                vec![i]
            }
            SelectInfoElem::Slice(SliceInfoElem::Slice { start, end, step }) => {
                ensure!(
                    *step != 0,
                    ObsError::invalid_dimension("slice step must be non-zero")
                );
                let start = resolve(*start, bound)?;
                let end = match end {
                    Some(e) => resolve(*e, bound)?,
                    None => bound,
                };
                if start >= end {
                    Vec::new()
                } else if *step > 0 {
                    (start..end).step_by(*step as usize).collect()
                } else {
                    (start..end)
                        .rev()
                        .step_by(step.unsigned_abs())
                        .sorted_unstable()
                        .collect()
                }
            }
            SelectInfoElem::Slice(SliceInfoElem::NewAxis) => bail!(
                ObsError::UnsupportedOperation("new axes cannot be used in a selection".into())
            ),
        };
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_elem_to_indices() -> Result<()> {
        assert_eq!(SelectInfoElem::full().to_indices(4)?, vec![0, 1, 2, 3]);
        assert_eq!(SelectInfoElem::from(vec![3, 1, 3, 0]).to_indices(4)?, vec![0, 1, 3]);
        assert_eq!(SelectInfoElem::from(1..3usize).to_indices(4)?, vec![1, 2]);
        assert_eq!(SelectInfoElem::from(-2..4isize).to_indices(4)?, vec![2, 3]);
        let stepped = SliceInfoElem::Slice { start: 0, end: Some(5), step: 2 };
        assert_eq!(SelectInfoElem::Slice(stepped).to_indices(5)?, vec![0, 2, 4]);
        let reversed = SliceInfoElem::Slice { start: 0, end: None, step: -2 };
        assert_eq!(SelectInfoElem::Slice(reversed).to_indices(5)?, vec![0, 2, 4]);
        assert!(SelectInfoElem::from(vec![4]).to_indices(4).is_err());
        Ok(())
    }

    #[test]
    fn test_select_info_builders() {
        let sel = SelectInfo::hyperslab(vec![0, 1], vec![2, 2]).with_extent([4usize, 4]);
        assert_eq!(sel.extent(), Some(&Shape::from([4usize, 4])));
        assert!(!sel.is_all());
        assert!(SelectInfo::default().is_all());
        assert!(matches!(
            SelectInfo::dims([0usize..1, 2..3]).action(),
            SelectAction::Dims(elems) if elems.len() == 2
        ));
    }

    proptest! {
        #[test]
        fn test_slice_indices_in_bounds(
            bound in 0usize..50,
            start in -60isize..60,
            end in proptest::option::of(-60isize..60),
            step in prop_oneof![-5isize..0, 1isize..5],
        ) {
            let elem = SelectInfoElem::Slice(SliceInfoElem::Slice { start, end, step });
            if let Ok(indices) = elem.to_indices(bound) {
                prop_assert!(indices.iter().all(|&i| i < bound));
                prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
