//! Frozen description of databases, tables and columns.
//!
//! Everything is stored in the arenas of [`OrmHandler`] and addressed by id.

mod column;
mod database;
mod db_type;
mod handler;
mod table;

pub use column::*;
pub use database::*;
pub use db_type::*;
pub use handler::*;
pub use table::*;

use std::fmt::{self, Display};

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(DatabaseId, "database");
arena_id!(TableId, "table");
arena_id!(ColumnId, "column");
