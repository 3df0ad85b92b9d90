mod buffer;
mod scalar;
mod select;
mod shape;

pub use buffer::{DynSlice, DynSliceMut};
pub use scalar::DynScalar;
pub use select::{SelectAction, SelectInfo, SelectInfoElem, SLICE_FULL};
pub use shape::Shape;
