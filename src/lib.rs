//! Object-relational mapping over blocking SQL drivers.
//!
//! Entities derive [`Entity`], databases are declared with [`DatabaseConfig`]
//! and loaded into an [`OrmHandler`], and every read or write goes through a
//! [`Session`].
pub use trove_core::*;
pub use trove_macros::*;
