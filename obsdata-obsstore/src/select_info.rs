use crate::selection::{Selection, SelectionMode};

use anyhow::{ensure, Result};
use obsdata::{ObsError, SelectAction, SelectInfo};

/// Builds the engine selection for a client selection over an array with extents
/// `dim_sizes`.
pub fn create_selection(sel: &SelectInfo, dim_sizes: &[usize]) -> Result<Selection> {
    let total: usize = dim_sizes.iter().product();
    match sel.action() {
        SelectAction::All => Ok(Selection::all(0, total)),
        SelectAction::Range { start, count } => {
            ensure!(
                start.checked_add(*count).map_or(false, |end| end <= total),
                ObsError::Addressing {
                    index: start.saturating_add(*count).saturating_sub(1),
                    max_index: total.saturating_sub(1),
                }
            );
            Ok(Selection::all(*start, *count))
        }
        SelectAction::Hyperslab {
            start,
            count,
            stride,
            block,
        } => {
            let rank = dim_sizes.len();
            check_rank("hyperslab start", start.len(), rank)?;
            check_rank("hyperslab count", count.len(), rank)?;
            if let Some(stride) = stride {
                check_rank("hyperslab stride", stride.len(), rank)?;
            }
            if let Some(block) = block {
                check_rank("hyperslab block", block.len(), rank)?;
            }
            let selects = (0..rank)
                .map(|d| -> Result<Vec<usize>> {
                    let stride = stride.as_ref().map_or(1, |s| s[d]);
                    let block = block.as_ref().map_or(1, |b| b[d]);
                    if count[d] > 0 && block > 0 {
                        let last = (count[d] - 1)
                            .checked_mul(stride)
                            .and_then(|x| x.checked_add(start[d]))
                            .and_then(|x| x.checked_add(block - 1));
                        ensure!(
                            last.map_or(false, |last| last < dim_sizes[d]),
                            ObsError::invalid_dimension(format!(
                                "hyperslab along dimension {} reaches past its extent {}",
                                d, dim_sizes[d]
                            ))
                        );
                    }
                    Ok((0..count[d])
                        .flat_map(|i| (0..block).map(move |j| start[d] + i * stride + j))
                        .collect())
                })
                .collect::<Result<Vec<Vec<usize>>>>()?;
            Selection::new(SelectionMode::Intersect, selects, dim_sizes.to_vec())
        }
        SelectAction::Points(points) => {
            let rank = dim_sizes.len();
            let mut selects = vec![Vec::with_capacity(points.len()); rank];
            for point in points {
                check_rank("point", point.len(), rank)?;
                for (d, &x) in point.iter().enumerate() {
                    ensure!(
                        x < dim_sizes[d],
                        ObsError::invalid_dimension(format!(
                            "point coordinate {} is outside dimension {} of extent {}",
                            x, d, dim_sizes[d]
                        ))
                    );
                    selects[d].push(x);
                }
            }
            Selection::new(SelectionMode::Point, selects, dim_sizes.to_vec())
        }
        SelectAction::Dims(elems) => {
            ensure!(
                elems.len() <= dim_sizes.len(),
                ObsError::invalid_dimension(format!(
                    "selection has {} dimensions, the selected array has {}",
                    elems.len(),
                    dim_sizes.len()
                ))
            );
            let selects = dim_sizes
                .iter()
                .enumerate()
                .map(|(d, &size)| match elems.get(d) {
                    Some(elem) => elem.to_indices(size),
                    None => Ok((0..size).collect()),
                })
                .collect::<Result<Vec<_>>>()?;
            Selection::new(SelectionMode::Intersect, selects, dim_sizes.to_vec())
        }
    }
}

/// Dimension sizes of a memory buffer holding `len` elements: the selection's extent when
/// given, otherwise a flat array of `len / elements_per_item` items.
pub fn memory_dims(sel: &SelectInfo, len: usize, elements_per_item: usize) -> Vec<usize> {
    match sel.extent() {
        Some(extent) => extent.to_vec(),
        None => vec![len / elements_per_item.max(1)],
    }
}

fn check_rank(what: &str, found: usize, rank: usize) -> Result<()> {
    ensure!(
        found == rank,
        ObsError::invalid_dimension(format!(
            "{} has {} dimensions, the selected array has {}",
            what, found, rank
        ))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdata::{error_kind, SelectInfoElem};

    fn indices(mut sel: Selection) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        sel.init_lin_indx();
        while !sel.end_lin_indx() {
            out.push(sel.next_lin_indx()?);
        }
        Ok(out)
    }

    #[test]
    fn test_hyperslab() -> Result<()> {
        let sel = SelectInfo::hyperslab(vec![1, 0], vec![2, 2]);
        assert_eq!(indices(create_selection(&sel, &[4, 3])?)?, vec![3, 4, 6, 7]);

        let sel = SelectInfo::strided_hyperslab(vec![0], vec![2], vec![4], vec![2]);
        assert_eq!(indices(create_selection(&sel, &[8])?)?, vec![0, 1, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_hyperslab_outside_extent() {
        // column 3 does not exist in a [4, 3] array
        let sel = SelectInfo::hyperslab(vec![0, 2], vec![1, 2]);
        let err = create_selection(&sel, &[4, 3]).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::InvalidDimension { .. })));

        let sel = SelectInfo::strided_hyperslab(vec![0], vec![2], vec![4], vec![2]);
        assert!(create_selection(&sel, &[5]).is_err());
        let sel = SelectInfo::strided_hyperslab(vec![1], vec![2], vec![usize::MAX], vec![1]);
        assert!(create_selection(&sel, &[5]).is_err());
    }

    #[test]
    fn test_points_outside_extent() {
        let sel = SelectInfo::points(vec![vec![0, 1], vec![1, 3]]);
        let err = create_selection(&sel, &[4, 3]).unwrap_err();
        assert!(matches!(error_kind(&err), Some(ObsError::InvalidDimension { .. })));
    }

    #[test]
    fn test_points() -> Result<()> {
        let sel = SelectInfo::points(vec![vec![1, 2], vec![0, 0], vec![2, 1]]);
        let selection = create_selection(&sel, &[3, 3])?;
        assert_eq!(selection.mode(), SelectionMode::Point);
        assert_eq!(indices(selection)?, vec![5, 0, 7]);

        let bad = SelectInfo::points(vec![vec![1, 2, 0]]);
        assert!(create_selection(&bad, &[3, 3]).is_err());
        Ok(())
    }

    #[test]
    fn test_dims() -> Result<()> {
        let sel = SelectInfo::dims([SelectInfoElem::from(vec![2, 0, 2])]);
        assert_eq!(indices(create_selection(&sel, &[3, 2])?)?, vec![0, 1, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_range() -> Result<()> {
        let sel = SelectInfo::range(2, 3);
        assert_eq!(indices(create_selection(&sel, &[6])?)?, vec![2, 3, 4]);

        let err = create_selection(&SelectInfo::range(4, 3), &[6]).unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::Addressing { index: 6, max_index: 5 })
        );

        let err = create_selection(&SelectInfo::range(usize::MAX, 2), &[6]).unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::Addressing { index: usize::MAX - 1, max_index: 5 })
        );
        Ok(())
    }

    #[test]
    fn test_memory_dims() {
        assert_eq!(memory_dims(&SelectInfo::all(), 12, 3), vec![4]);
        assert_eq!(
            memory_dims(&SelectInfo::all().with_extent([2usize, 6]), 12, 1),
            vec![2, 6]
        );
    }
}
