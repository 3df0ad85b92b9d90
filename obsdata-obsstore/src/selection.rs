//! Linear-index generators over row-major storage.
//!
//! A [`Selection`] turns a description of the addressed elements into a stream of linear
//! indices. Transfers walk a memory selection and a file selection side by side.

use anyhow::{bail, ensure, Context, Result};
use obsdata::ObsError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// A contiguous range of linear indices.
    All,
    /// The Cartesian product of per-dimension index lists.
    Intersect,
    /// Per-dimension index lists consumed in lockstep, one point per position.
    Point,
}

/// Odometer over per-dimension index lists. The last digit moves fastest.
#[derive(Debug, Clone)]
pub struct SelectCounter {
    mode: SelectionMode,
    digits: Vec<usize>,
    digit_sizes: Vec<usize>,
    finished: bool,
}

impl SelectCounter {
    pub fn new(mode: SelectionMode, digit_sizes: &[usize]) -> Self {
        let mut counter = Self {
            mode,
            digits: Vec::new(),
            digit_sizes: Vec::new(),
            finished: true,
        };
        counter.reset(mode, digit_sizes);
        counter
    }

    pub fn reset(&mut self, mode: SelectionMode, digit_sizes: &[usize]) {
        self.mode = mode;
        self.digit_sizes = digit_sizes.to_vec();
        self.digits = vec![0; digit_sizes.len()];
        self.finished = digit_sizes.is_empty() || digit_sizes.contains(&0);
    }

    pub fn inc(&mut self) {
        if self.finished {
            return;
        }
        match self.mode {
            SelectionMode::Point => {
                if self.digits[0] + 1 >= self.digit_sizes[0] {
                    self.finished = true;
                } else {
                    self.digits.iter_mut().for_each(|d| *d += 1);
                }
            }
            _ => {
                let mut i = self.digits.len() - 1;
                loop {
                    self.digits[i] += 1;
                    if self.digits[i] < self.digit_sizes[i] {
                        break;
                    }
                    if i == 0 {
                        self.finished = true;
                        break;
                    }
                    self.digits[i] = 0;
                    i -= 1;
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The current digit values.
    pub fn count(&self) -> &[usize] {
        &self.digits
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    mode: SelectionMode,
    start: usize,
    count: usize,
    cursor: usize,
    npoints: usize,
    max_index: Option<usize>,
    dim_selects: Vec<Vec<usize>>,
    dim_sizes: Vec<usize>,
    counter: SelectCounter,
}

impl Selection {
    /// The contiguous range `[start, start + count)`.
    pub fn all(start: usize, count: usize) -> Self {
        Self {
            mode: SelectionMode::All,
            start,
            count,
            cursor: start,
            npoints: count,
            max_index: (start + count).checked_sub(1),
            dim_selects: Vec::new(),
            dim_sizes: Vec::new(),
            counter: SelectCounter::new(SelectionMode::All, &[]),
        }
    }

    /// A selection over an array with extents `dim_sizes`. `dim_selects[i]` lists the
    /// indices picked along dimension `i`. In `All` mode the lists are ignored and the whole
    /// array is selected.
    pub fn new(
        mode: SelectionMode,
        dim_selects: Vec<Vec<usize>>,
        dim_sizes: Vec<usize>,
    ) -> Result<Self> {
        if mode == SelectionMode::All {
            return Ok(Self::all(0, dim_sizes.iter().product()));
        }
        ensure!(
            !dim_sizes.is_empty(),
            ObsError::invalid_dimension("a selection needs at least one dimension")
        );
        ensure!(
            dim_selects.len() == dim_sizes.len(),
            ObsError::invalid_dimension(format!(
                "selection has {} dimensions, the selected array has {}",
                dim_selects.len(),
                dim_sizes.len()
            ))
        );
        let lens: Vec<usize> = dim_selects.iter().map(Vec::len).collect();
        let npoints = match mode {
            SelectionMode::Point => {
                if let Some((d, &bad)) = lens.iter().enumerate().find(|&(_, &l)| l != lens[0]) {
                    return Err(ObsError::SelectionSizeMismatch {
                        mem: lens[0],
                        file: bad,
                    })
                    .with_context(|| {
                        format!(
                            "point index list of dimension {} has {} entries, dimension 0 has {}",
                            d, bad, lens[0]
                        )
                    });
                }
                lens[0]
            }
            _ => lens.iter().product(),
        };
        let total: usize = dim_sizes.iter().product();
        Ok(Self {
            mode,
            start: 0,
            count: npoints,
            cursor: 0,
            npoints,
            max_index: total.checked_sub(1),
            counter: SelectCounter::new(mode, &lens),
            dim_selects,
            dim_sizes,
        })
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Number of linear indices the selection yields.
    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Largest linear index this selection may produce.
    pub fn max_index(&self) -> Option<usize> {
        self.max_index
    }

    pub fn dim_sizes(&self) -> &[usize] {
        &self.dim_sizes
    }

    /// Restart the index stream.
    pub fn init_lin_indx(&mut self) {
        match self.mode {
            SelectionMode::All => self.cursor = self.start,
            mode => {
                let lens: Vec<usize> = self.dim_selects.iter().map(Vec::len).collect();
                self.counter.reset(mode, &lens);
            }
        }
    }

    pub fn end_lin_indx(&self) -> bool {
        match self.mode {
            SelectionMode::All => self.cursor >= self.start + self.count,
            _ => self.counter.is_finished(),
        }
    }

    /// The next linear index of the stream.
    pub fn next_lin_indx(&mut self) -> Result<usize> {
        let lin_indx = match self.mode {
            SelectionMode::All => {
                let idx = self.cursor;
                self.cursor += 1;
                idx
            }
            _ => {
                if self.counter.is_finished() {
                    return Err(ObsError::Addressing {
                        index: self.npoints,
                        max_index: self.npoints.saturating_sub(1),
                    })
                    .context("selection is exhausted");
                }
                let digits = self.counter.count();
                let mut idx = self.dim_selects[0][digits[0]];
                for d in 1..digits.len() {
                    idx = idx * self.dim_sizes[d] + self.dim_selects[d][digits[d]];
                }
                self.counter.inc();
                idx
            }
        };
        match self.max_index {
            Some(max_index) if lin_indx <= max_index => Ok(lin_indx),
            max_index => bail!(ObsError::Addressing {
                index: lin_indx,
                max_index: max_index.unwrap_or(0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdata::error_kind;
    use proptest::prelude::*;

    fn collect(sel: &mut Selection) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        sel.init_lin_indx();
        while !sel.end_lin_indx() {
            out.push(sel.next_lin_indx()?);
        }
        Ok(out)
    }

    #[test]
    fn test_all_mode() -> Result<()> {
        let mut sel = Selection::all(5, 4);
        assert_eq!(sel.npoints(), 4);
        assert_eq!(collect(&mut sel)?, vec![5, 6, 7, 8]);
        assert!(sel.end_lin_indx());
        assert!(matches!(
            error_kind(&sel.next_lin_indx().unwrap_err()),
            Some(ObsError::Addressing { index: 9, max_index: 8 })
        ));

        // restartable
        assert_eq!(collect(&mut sel)?, vec![5, 6, 7, 8]);
        Ok(())
    }

    #[test]
    fn test_empty_all_mode() {
        let sel = Selection::all(3, 0);
        assert!(sel.end_lin_indx());
        assert_eq!(sel.npoints(), 0);
    }

    #[test]
    fn test_intersect_mode() -> Result<()> {
        let mut sel = Selection::new(
            SelectionMode::Intersect,
            vec![vec![0, 1, 2], vec![0, 1, 2]],
            vec![3, 3],
        )?;
        assert_eq!(sel.npoints(), 9);
        assert_eq!(collect(&mut sel)?, (0..9).collect::<Vec<_>>());

        let mut sel = Selection::new(
            SelectionMode::Intersect,
            vec![vec![1, 3], vec![0, 2, 4]],
            vec![4, 5],
        )?;
        assert_eq!(collect(&mut sel)?, vec![5, 7, 9, 15, 17, 19]);
        Ok(())
    }

    #[test]
    fn test_point_mode() -> Result<()> {
        let mut sel = Selection::new(
            SelectionMode::Point,
            vec![vec![1, 7, 8], vec![2, 4, 10]],
            vec![10, 12],
        )?;
        assert_eq!(sel.npoints(), 3);
        assert_eq!(collect(&mut sel)?, vec![14, 88, 106]);
        Ok(())
    }

    #[test]
    fn test_point_mode_unequal_lengths() {
        let err = Selection::new(
            SelectionMode::Point,
            vec![vec![1, 2], vec![1]],
            vec![4, 4],
        )
        .unwrap_err();
        assert!(matches!(
            error_kind(&err),
            Some(ObsError::SelectionSizeMismatch { .. })
        ));
        assert_eq!(
            err.to_string(),
            "point index list of dimension 1 has 1 entries, dimension 0 has 2"
        );
    }

    #[test]
    fn test_rank_checks() {
        for (selects, sizes) in [(vec![], vec![]), (vec![vec![0]], vec![2, 2])] {
            let err = Selection::new(SelectionMode::Intersect, selects, sizes).unwrap_err();
            assert!(matches!(
                error_kind(&err),
                Some(ObsError::InvalidDimension { .. })
            ));
        }
    }

    #[test]
    fn test_out_of_range_index() -> Result<()> {
        let mut sel = Selection::new(SelectionMode::Intersect, vec![vec![0, 5]], vec![4])?;
        assert_eq!(sel.next_lin_indx()?, 0);
        let err = sel.next_lin_indx().unwrap_err();
        assert_eq!(
            error_kind(&err),
            Some(&ObsError::Addressing { index: 5, max_index: 3 })
        );
        Ok(())
    }

    #[test]
    fn test_empty_index_list() -> Result<()> {
        let sel = Selection::new(SelectionMode::Intersect, vec![vec![0, 1], vec![]], vec![2, 2])?;
        assert_eq!(sel.npoints(), 0);
        assert!(sel.end_lin_indx());
        Ok(())
    }

    proptest! {
        #[test]
        fn test_intersect_npoints(
            lists in prop::collection::vec(prop::collection::vec(0usize..6, 0..4), 1..4)
        ) {
            let sizes = vec![6; lists.len()];
            let mut sel = Selection::new(SelectionMode::Intersect, lists.clone(), sizes).unwrap();
            let expected: usize = lists.iter().map(Vec::len).product();
            prop_assert_eq!(sel.npoints(), expected);
            prop_assert_eq!(collect(&mut sel).unwrap().len(), expected);
        }

        #[test]
        fn test_point_matches_coordinates(
            points in prop::collection::vec((0usize..5, 0usize..7), 1..20)
        ) {
            let (rows, cols): (Vec<_>, Vec<_>) = points.iter().cloned().unzip();
            let mut sel = Selection::new(SelectionMode::Point, vec![rows, cols], vec![5, 7]).unwrap();
            let expected: Vec<usize> = points.iter().map(|(r, c)| r * 7 + c).collect();
            prop_assert_eq!(collect(&mut sel).unwrap(), expected);
        }
    }
}
