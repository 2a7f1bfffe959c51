use crate::{Connection, MetaDatabase, Result, SqlWriter};
use std::sync::Arc;

/// Entry point of a database backend.
///
/// Registered on the [`crate::OrmHandler`] under its `name`, which a
/// [`crate::DatabaseConfig`] then uses as its dialect.
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    fn sql_writer(&self) -> Arc<dyn SqlWriter>;

    /// Open a new connection, each call returns an independent one.
    fn connect(&self, database: &MetaDatabase) -> Result<Box<dyn Connection>>;
}
