mod common;
pub use common::*;

use ndarray::{arr1, arr2, Array1, ArrayD};
use obsdata::*;
use proptest::prelude::*;

fn assert_kind<T>(result: anyhow::Result<T>, check: impl Fn(&ObsError) -> bool) {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(err) => assert!(
            error_kind(&err).map_or(false, check),
            "unexpected error: {:?}",
            err
        ),
    }
}

pub fn test_hierarchy<B: Backend>() {
    let root = B::create_root().unwrap();
    let c = root.create_group("a/b/c").unwrap();
    for path in ["a", "a/b", "a/b/c", "/a/b/c/"] {
        assert!(root.exists(path).unwrap());
    }
    assert_kind(root.open_group("a/b/d"), |e| {
        e == &ObsError::not_found(ObjectKind::Group, "a/b/d")
    });
    assert!(!root.exists("a/b/d").unwrap());

    c.new_variable::<f32>("x", &[2], &[], &Default::default())
        .unwrap();
    root.create_group("x").unwrap();
    let objects = root.list_objects(None, true).unwrap();
    assert_eq!(objects[&ObjectType::Group], vec!["a", "a/b", "a/b/c", "x"]);
    assert_eq!(objects[&ObjectType::Variable], vec!["a/b/c/x"]);
    assert_eq!(root.list_groups().unwrap(), vec!["a", "x"]);
    assert!(root.list_variables().unwrap().is_empty());
}

pub fn test_variable_lifecycle<B: Backend>() {
    let root = B::create_root().unwrap();
    let var = root
        .new_array_variable("obs/temp", &arr1(&[1i32, 2, 3]), &Default::default())
        .unwrap();
    assert!(root.exists("obs").unwrap());
    assert!(root.variable_exists("obs/temp").unwrap());

    // creating it again hands back the stored variable
    let again = root
        .new_variable::<i32>("obs/temp", &[3], &[], &Default::default())
        .unwrap();
    assert_eq!(again.read_array::<i32>().unwrap(), arr1(&[1, 2, 3]).into_dyn());

    let obs = root.open_group("obs").unwrap();
    obs.rename_variable("temp", "temperature").unwrap();
    assert_eq!(obs.list_variables().unwrap(), vec!["temperature"]);
    assert_kind(obs.open_variable("temp"), |e| {
        matches!(e, ObsError::NotFound { kind: ObjectKind::Variable, .. })
    });
    assert_eq!(
        obs.open_variable("temperature").unwrap().read_array::<i32>().unwrap(),
        var.read_array::<i32>().unwrap()
    );

    obs.remove_variable("temperature").unwrap();
    assert!(!obs.variable_exists("temperature").unwrap());
    assert!(var.dimensions().is_err());
    assert_kind(obs.remove_variable("temperature"), |e| {
        matches!(e, ObsError::NotFound { .. })
    });
}

pub fn test_attributes<B: Backend>() {
    let root = B::create_root().unwrap();
    root.new_scalar_attr("title", "surface observations".to_string())
        .unwrap();
    root.new_array_attr("version", &arr1(&[1u16, 4])).unwrap();
    assert_eq!(
        root.get_scalar_attr::<String>("title").unwrap(),
        "surface observations"
    );
    assert_eq!(
        root.get_array_attr::<u64>("version").unwrap(),
        arr1(&[1u64, 4]).into_dyn()
    );
    assert_kind(root.get_scalar_attr::<u16>("version"), |e| {
        matches!(e, ObsError::SelectionSizeMismatch { mem: 1, file: 2 })
    });
    assert_kind(root.new_scalar_attr("title", 0i32), |e| {
        e == &ObsError::duplicate("title")
    });

    root.rename_attr("version", "format_version").unwrap();
    assert_eq!(root.list_attrs().unwrap(), vec!["title", "format_version"]);
    root.remove_attr("title").unwrap();
    assert!(!root.attr_exists("title").unwrap());
    assert_kind(root.open_attr("title"), |e| {
        e == &ObsError::not_found(ObjectKind::Attribute, "title")
    });

    let attr = root.open_attr("format_version").unwrap();
    assert_eq!(attr.dimensions().unwrap(), Shape::from([2usize]));
    assert!(attr
        .is_a(&B::type_provider().make_fundamental_type(ScalarType::U16).unwrap())
        .unwrap());
}

pub fn test_fill_and_resize<B: Backend>() {
    let root = B::create_root().unwrap();
    let params = VariableCreationParams::default().with_fill_value(-999.0f32);
    let temp = root
        .new_variable::<f32>("temp", &[2], &[None], &params)
        .unwrap();
    temp.write_array(&arr1(&[1.0f32, 2.0])).unwrap();
    temp.resize(&[3]).unwrap();
    assert_eq!(
        temp.read_array::<f32>().unwrap(),
        arr1(&[1.0f32, 2.0, -999.0]).into_dyn()
    );

    let params = VariableCreationParams::default().with_fill_value(-1i32);
    let counts = root
        .new_variable::<i32>("counts", &[2], &[Some(4)], &params)
        .unwrap();
    counts.write_array(&arr1(&[10, 20])).unwrap();
    counts.resize(&[1]).unwrap();
    counts.resize(&[2]).unwrap();
    assert_eq!(counts.read_array::<i32>().unwrap(), arr1(&[10, -1]).into_dyn());
    assert_kind(counts.resize(&[5]), |e| {
        matches!(e, ObsError::MaxDimensionExceeded { dim: 0, max: 4, requested: 5 })
    });
    assert_kind(counts.resize(&[2, 2]), |e| {
        matches!(e, ObsError::InvalidDimension { .. })
    });

    let grid = root
        .new_variable::<i32>("grid", &[2, 3], &[None, Some(3)], &params)
        .unwrap();
    grid.write_array(&arr2(&[[0, 1, 2], [3, 4, 5]])).unwrap();
    grid.resize(&[3, 3]).unwrap();
    assert_eq!(
        grid.read_array::<i32>().unwrap(),
        arr2(&[[0, 1, 2], [3, 4, 5], [-1, -1, -1]]).into_dyn()
    );
    let dims = grid.dimensions().unwrap();
    assert_eq!(dims.dims, Shape::from([3usize, 3]));
    assert_eq!(dims.max_dims, vec![None, Some(3)]);

    let plain = root
        .new_variable::<u8>("plain", &[2], &[], &Default::default())
        .unwrap();
    assert!(!plain.has_fill_value().unwrap());
    assert_eq!(plain.dimensions().unwrap().max_dims, vec![Some(2)]);
}

pub fn test_selections<B: Backend>() {
    let root = B::create_root().unwrap();
    let var = root
        .new_variable::<i32>("v", &[4, 5], &[], &Default::default())
        .unwrap();
    var.write_array(&Array1::from_iter(0..20).into_shape((4, 5)).unwrap())
        .unwrap();

    let rows_13 = SelectInfo::strided_hyperslab(vec![1, 0], vec![2, 3], vec![2, 2], vec![1, 1]);
    assert_eq!(
        var.read_selection::<i32>(&rows_13, &[6]).unwrap(),
        arr1(&[5, 7, 9, 15, 17, 19]).into_dyn()
    );
    let by_dims = SelectInfo::dims([vec![1usize, 3], vec![0, 2, 4]]);
    assert_eq!(
        var.read_selection::<i32>(&by_dims, &[2, 3]).unwrap(),
        arr2(&[[5, 7, 9], [15, 17, 19]]).into_dyn()
    );
    assert_eq!(
        var.read_selection::<i32>(&SelectInfo::range(5, 5), &[5]).unwrap(),
        arr1(&[5, 6, 7, 8, 9]).into_dyn()
    );
    assert_eq!(
        var.read_selection::<i32>(&SelectInfo::dims([1usize..2]), &[5]).unwrap(),
        arr1(&[5, 6, 7, 8, 9]).into_dyn()
    );

    let grid = root
        .new_variable::<i32>("grid", &[10, 12], &[], &Default::default())
        .unwrap();
    let points = SelectInfo::points(vec![vec![1, 2], vec![7, 4], vec![8, 10]]);
    grid.write_selection(&arr1(&[-1, -2, -3]), &points).unwrap();
    let all = grid.read_array::<i32>().unwrap();
    let flat: Vec<i32> = all.iter().copied().collect();
    assert_eq!((flat[14], flat[88], flat[106]), (-1, -2, -3));
    assert_eq!(flat.iter().filter(|x| **x != 0).count(), 3);
    assert_eq!(
        grid.read_selection::<i32>(&points, &[3]).unwrap(),
        arr1(&[-1, -2, -3]).into_dyn()
    );
}

pub fn test_size_guard<B: Backend>() {
    let root = B::create_root().unwrap();
    let var = root
        .new_variable::<f64>("v", &[3], &[], &Default::default())
        .unwrap();
    assert_kind(var.write_array(&arr1(&[1.0, 2.0, 3.0, 4.0, 5.0])), |e| {
        e == &ObsError::SelectionSizeMismatch { mem: 5, file: 3 }
    });
    assert_kind(var.read_selection::<f64>(&SelectInfo::all(), &[2]), |e| {
        e == &ObsError::SelectionSizeMismatch { mem: 2, file: 3 }
    });
    assert_kind(var.read_selection::<f64>(&SelectInfo::range(2, 2), &[2]), |e| {
        matches!(e, ObsError::Addressing { .. })
    });
    assert_kind(
        var.read_selection::<f64>(&SelectInfo::hyperslab(vec![0, 0], vec![1, 1]), &[1]),
        |e| matches!(e, ObsError::InvalidDimension { .. }),
    );
    assert_kind(
        var.read_selection::<f64>(&SelectInfo::range(usize::MAX, 2), &[2]),
        |e| matches!(e, ObsError::Addressing { .. }),
    );

    let grid = root
        .new_variable::<i32>("grid", &[4, 3], &[], &Default::default())
        .unwrap();
    let before = arr2(&[[1, 2, 3], [4, 5, 6], [7, 8, 9], [10, 11, 12]]);
    grid.write_array(&before).unwrap();
    assert_kind(
        grid.write_selection(&arr1(&[70, 80]), &SelectInfo::hyperslab(vec![0, 2], vec![1, 2])),
        |e| matches!(e, ObsError::InvalidDimension { .. }),
    );
    assert_kind(
        grid.write_selection(&arr1(&[70, 80]), &SelectInfo::points(vec![vec![0, 0], vec![2, 3]])),
        |e| matches!(e, ObsError::InvalidDimension { .. }),
    );
    assert_eq!(grid.read_array::<i32>().unwrap(), before.into_dyn());
}

pub fn test_type_conversion<B: Backend>() {
    let root = B::create_root().unwrap();
    let var = root
        .new_variable::<u8>("v", &[3], &[], &Default::default())
        .unwrap();
    var.write_array(&arr1(&[1.5f64, -2.0, 300.0])).unwrap();
    assert_eq!(var.read_array::<u8>().unwrap(), arr1(&[1u8, 0, 255]).into_dyn());
    assert_eq!(
        var.read_array::<f32>().unwrap(),
        arr1(&[1.0f32, 0.0, 255.0]).into_dyn()
    );

    let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    assert_kind(var.write_array(&Array1::from_vec(names)), |e| {
        matches!(e, ObsError::UnsupportedOperation(_))
    });
    assert_kind(var.write_array(&arr1(&[true, false, true])), |e| {
        matches!(e, ObsError::UnsupportedType(_))
    });
}

pub fn test_dimension_scales<B: Backend>() {
    let root = B::create_root().unwrap();
    let lat = root
        .new_variable::<f32>("lat", &[3], &[], &Default::default())
        .unwrap();
    let lon = root
        .new_variable::<f32>("lon", &[4], &[], &Default::default())
        .unwrap();
    let temp = root
        .new_variable::<f32>("temp", &[3, 4], &[], &Default::default())
        .unwrap();

    lat.set_is_dimension_scale("lat").unwrap();
    assert!(lat.is_dimension_scale().unwrap());
    assert_eq!(lat.dimension_scale_name().unwrap().as_deref(), Some("lat"));
    assert!(!temp.is_dimension_scale().unwrap());

    temp.attach_dimension_scale(0, &lat).unwrap();
    temp.attach_dimension_scale(1, &lon).unwrap();
    assert!(temp.is_dimension_scale_attached(0, &lat).unwrap());
    assert!(!temp.is_dimension_scale_attached(0, &lon).unwrap());
    assert_kind(temp.attach_dimension_scale(2, &lat), |e| {
        matches!(e, ObsError::InvalidDimension { .. })
    });

    temp.detach_dimension_scale(1, &lon).unwrap();
    assert!(!temp.is_dimension_scale_attached(1, &lon).unwrap());
    assert_kind(temp.detach_dimension_scale(1, &lon), |e| {
        matches!(e, ObsError::NotFound { kind: ObjectKind::DimensionScale, .. })
    });
}

pub fn test_hyperslab_roundtrip<B: Backend>() {
    let cases = shape_strat(3, 6).prop_flat_map(|shape| {
        (array_strat(&shape), hyperslab_strat(&shape), points_strat(&shape, 8))
    });
    proptest!(ProptestConfig::with_cases(64), |((arr, (start, count), points) in cases)| {
        let root = B::create_root().unwrap();
        let var = root.new_array_variable("v", &arr, &Default::default()).unwrap();
        prop_assert_eq!(var.read_array::<i32>().unwrap(), arr.clone());

        let expected = slab_of(&arr, &start, &count);
        let slab = SelectInfo::hyperslab(start.clone(), count.clone());
        prop_assert_eq!(var.read_selection::<i32>(&slab, &count).unwrap(), expected.clone());

        let picked: ArrayD<i32> = var
            .read_selection(&SelectInfo::points(points.clone()), &[points.len()])
            .unwrap();
        prop_assert_eq!(picked.into_raw_vec(), points_of(&arr, &points));

        let negated = expected.mapv(|x| -x);
        var.write_selection(&negated, &slab).unwrap();
        prop_assert_eq!(var.read_selection::<i32>(&slab, &count).unwrap(), negated);
    });
}
