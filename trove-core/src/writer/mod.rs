mod context;
mod mysql;
mod oracle;
mod postgres;
mod sql_writer;

pub use context::*;
pub use mysql::*;
pub use oracle::*;
pub use postgres::*;
pub use sql_writer::*;
