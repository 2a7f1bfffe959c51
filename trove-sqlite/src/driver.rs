use crate::{SqliteConnection, SqliteSqlWriter};
use std::sync::Arc;
use trove_core::{Connection, Driver, Error, MetaDatabase, Result, SqlWriter};

/// Prefix of the urls accepted by the driver.
pub const URL_PREFIX: &str = "sqlite://";

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }

    /// Sqlite URI filename from a `sqlite://path?params` url.
    pub fn location(url: &str) -> Result<String> {
        let Some(path) = url.strip_prefix(URL_PREFIX) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`, found `{}`",
                URL_PREFIX,
                trove_core::truncated(url, 128)
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        if path.is_empty() || path.starts_with('?') {
            return Err(Error::msg(format!("The url `{}` has no database path", url)));
        }
        Ok(format!("file:{}", path))
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn sql_writer(&self) -> Arc<dyn SqlWriter> {
        Arc::new(SqliteSqlWriter::new())
    }

    fn connect(&self, database: &MetaDatabase) -> Result<Box<dyn Connection>> {
        let Some(url) = &database.url else {
            let error = Error::msg(format!("The database `{}` has no url", database.name));
            log::error!("{:#}", error);
            return Err(error);
        };
        let location = Self::location(url.as_str())?;
        Ok(Box::new(SqliteConnection::open(&location)?))
    }
}
