use obsdata_obsstore::ObsStoreBackend;
use obsdata_test_utils::*;

#[test]
fn test_hierarchy_obs_store() {
    test_hierarchy::<ObsStoreBackend>()
}

#[test]
fn test_variable_lifecycle_obs_store() {
    test_variable_lifecycle::<ObsStoreBackend>()
}

#[test]
fn test_attributes_obs_store() {
    test_attributes::<ObsStoreBackend>()
}

#[test]
fn test_fill_and_resize_obs_store() {
    test_fill_and_resize::<ObsStoreBackend>()
}

#[test]
fn test_selections_obs_store() {
    test_selections::<ObsStoreBackend>()
}

#[test]
fn test_size_guard_obs_store() {
    test_size_guard::<ObsStoreBackend>()
}

#[test]
fn test_type_conversion_obs_store() {
    test_type_conversion::<ObsStoreBackend>()
}

#[test]
fn test_dimension_scales_obs_store() {
    test_dimension_scales::<ObsStoreBackend>()
}

#[test]
fn test_hyperslab_roundtrip_obs_store() {
    test_hyperslab_roundtrip::<ObsStoreBackend>()
}
