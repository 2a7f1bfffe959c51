use super::{DatabaseId, TableId};
use crate::{Driver, SequenceScope, Sequencer, SqlWriter};
use std::{fmt, sync::Arc};
use url::Url;

/// Symbol standing for the default schema inside sequence identifiers.
pub const DEFAULT_SCHEMA_SYMBOL: &str = "~";
/// Sequence identifier of a database wide sequencer.
pub const DATABASE_SEQUENCE_ID: &str = "<ALL>";
/// Table keeping the sequence rows.
pub const SEQUENCE_TABLE: &str = "trove_pk_support";

/// One logical database.
pub struct MetaDatabase {
    pub id: DatabaseId,
    pub name: String,
    pub dialect: String,
    pub schema: String,
    pub url: Option<Url>,
    pub user: String,
    pub password: String,
    pub sequence_scope: SequenceScope,
    pub sequence_max: i64,
    pub tables: Vec<TableId>,
    pub(crate) writer: Arc<dyn SqlWriter>,
    pub(crate) driver: Option<Arc<dyn Driver>>,
    pub(crate) sequencer: Option<Sequencer>,
}

impl MetaDatabase {
    pub fn writer(&self) -> &dyn SqlWriter {
        self.writer.as_ref()
    }

    pub fn driver(&self) -> Option<&Arc<dyn Driver>> {
        self.driver.as_ref()
    }

    /// Sequence table qualified by the default schema.
    pub fn sequence_table(&self) -> String {
        if self.schema.is_empty() {
            SEQUENCE_TABLE.to_string()
        } else {
            format!("{}.{}", self.schema, SEQUENCE_TABLE)
        }
    }
}

impl fmt::Debug for MetaDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaDatabase")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .field("schema", &self.schema)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("user", &self.user)
            .field("password", &"..")
            .field("sequence_scope", &self.sequence_scope)
            .field("sequence_max", &self.sequence_max)
            .field("tables", &self.tables)
            .finish()
    }
}
