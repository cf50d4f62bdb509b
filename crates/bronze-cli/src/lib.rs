//! Library components of the `bronze` loader binary.

pub mod logging;
pub mod summary;
