//! Data module: patch storage and distributed field arrays

pub mod field_array;
pub mod storage;

pub use field_array::{FieldArray, Patch};
pub use storage::{Storage, VecStorage};
