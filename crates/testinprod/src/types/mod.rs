//! Ready-made host objects.
//!
//! Embedders usually implement the capability traits on their own types; these cover the
//! common shapes (a bag of attributes, a callable) for glue code and tests.

pub mod function;
pub mod record;

pub use function::Function;
pub use record::Record;
