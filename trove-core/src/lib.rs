mod as_value;
mod cache;
mod config;
mod connection;
mod criterion;
mod decoder;
mod driver;
mod entity;
mod error;
mod key;
pub mod metamodel;
mod query;
mod sequencer;
mod session;
mod util;
mod value;
pub mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use cache::*;
pub use config::*;
pub use connection::*;
pub use criterion::*;
pub use decoder::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use key::*;
pub use metamodel::{
    ColumnId, DatabaseId, DbType, MetaColumn, MetaDatabase, MetaIndex, MetaPKey, MetaSelect,
    MetaTable, OrmHandler, TableId,
};
pub use query::*;
pub use sequencer::*;
pub use session::*;
pub use util::*;
pub use value::*;
pub use writer::{
    Context as WriterContext, Fragment, GenericSqlWriter, MySqlSqlWriter, OracleSqlWriter,
    PostgresSqlWriter, SelectStatement, SqlWriter,
};

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
