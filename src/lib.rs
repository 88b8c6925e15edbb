// record: variable-length record store over a fixed-size block container.
// sort: external merge sort (replacement selection, cascaded k-way merges,
// online final merge).

pub mod container;
pub mod error;
pub mod record;
pub mod reinterpret;
pub mod sort;

pub use error::{Error, Result};
