use ndarray::{ArrayD, IxDyn, Slice};
use proptest::prelude::*;

////////////////////////////////////////////////////////////////////////////////
/// Strategies
////////////////////////////////////////////////////////////////////////////////

/// Strategy for array shapes with 1 to `max_rank` non-empty dimensions.
pub fn shape_strat(max_rank: usize, max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(1..=max_len, 1..=max_rank)
}

pub fn array_strat(shape: &[usize]) -> impl Strategy<Value = ArrayD<i32>> {
    let shape = shape.to_vec();
    let n: usize = shape.iter().product();
    proptest::collection::vec(-1000i32..1000, n)
        .prop_map(move |data| ArrayD::from_shape_vec(IxDyn(&shape), data).unwrap())
}

/// Strategy for `(start, count)` of a hyperslab that fits in `shape`.
pub fn hyperslab_strat(shape: &[usize]) -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    shape
        .iter()
        .map(|&n| (0..n).prop_flat_map(move |start| (Just(start), 1..=n - start)))
        .collect::<Vec<_>>()
        .prop_map(|dims| dims.into_iter().unzip::<_, _, Vec<_>, Vec<_>>())
}

/// Strategy for up to `max_points` coordinates inside `shape`, repeats allowed.
pub fn points_strat(shape: &[usize], max_points: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    let point = shape.iter().map(|&n| 0..n).collect::<Vec<_>>();
    proptest::collection::vec(point, 1..=max_points)
}

////////////////////////////////////////////////////////////////////////////////
/// Reference selections
////////////////////////////////////////////////////////////////////////////////

/// The block of `arr` starting at `start` with extents `count`.
pub fn slab_of<T: Clone>(arr: &ArrayD<T>, start: &[usize], count: &[usize]) -> ArrayD<T> {
    arr.slice_each_axis(|ax| {
        let d = ax.axis.index();
        Slice::from(start[d]..start[d] + count[d])
    })
    .to_owned()
}

pub fn points_of<T: Clone>(arr: &ArrayD<T>, points: &[Vec<usize>]) -> Vec<T> {
    points.iter().map(|p| arr[p.as_slice()].clone()).collect()
}
