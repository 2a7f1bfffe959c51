//! Configuration consumed by the meta-model.
//!
//! Loading these structures from files is left to the application, the
//! handler only sees the parsed values.

use crate::{EntityInfo, Error, Result};
use url::Url;

/// How the session keeps loaded entities.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// No identity cache.
    None,
    /// Weak handles: an entry lives as long as the application holds the entity.
    #[default]
    Protected,
    /// Strong handles: entries live until evicted or the cache is cleared.
    Solid,
}

/// What `Session::create_ddl` is allowed to do.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlPolicy {
    DoNothing,
    /// Create the schema objects, expects an empty database.
    #[default]
    CreateDdl,
    /// Create missing tables and add the missing columns of existing ones.
    CreateOrUpdateDdl,
}

/// Which rows of the sequence table feed the primary keys.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceScope {
    /// One sequence row per table.
    #[default]
    Table,
    /// A single sequence row shared by all the tables of the database.
    Database,
}

/// Meta-model wide parameters.
#[derive(Debug, Clone)]
pub struct MetaParams {
    pub cache_policy: CachePolicy,
    pub table_alias_prefix: String,
    pub table_alias_suffix: String,
    /// Number of keys reserved by one round-trip of the sequencer.
    pub sequence_cache: i32,
    /// Longest IN list rendered as a single predicate.
    pub max_item_count_in: usize,
    /// Save and delete the parent row of entities declaring `extends`.
    pub inheritance_mode: bool,
    pub insert_multirow_limit: usize,
    pub log_metamodel: bool,
    pub orm2ddl_policy: DdlPolicy,
}

impl Default for MetaParams {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::Protected,
            table_alias_prefix: String::new(),
            table_alias_suffix: String::new(),
            sequence_cache: 100,
            max_item_count_in: 500,
            inheritance_mode: true,
            insert_multirow_limit: 100,
            log_metamodel: false,
            orm2ddl_policy: DdlPolicy::CreateDdl,
        }
    }
}

impl MetaParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn table_alias(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.table_alias_prefix = prefix.into();
        self.table_alias_suffix = suffix.into();
        self
    }

    /// Set the sequence cache window, values lower than 1 are clamped to 1.
    pub fn sequence_cache(mut self, size: i32) -> Self {
        if size < 1 {
            log::warn!("Sequence cache window {} is invalid, using 1 instead", size);
        }
        self.sequence_cache = size.max(1);
        self
    }

    pub fn max_item_count_in(mut self, count: usize) -> Self {
        self.max_item_count_in = count.max(1);
        self
    }

    pub fn inheritance_mode(mut self, enabled: bool) -> Self {
        self.inheritance_mode = enabled;
        self
    }

    pub fn insert_multirow_limit(mut self, limit: usize) -> Self {
        self.insert_multirow_limit = limit.max(1);
        self
    }

    pub fn log_metamodel(mut self, enabled: bool) -> Self {
        self.log_metamodel = enabled;
        self
    }

    pub fn orm2ddl_policy(mut self, policy: DdlPolicy) -> Self {
        self.orm2ddl_policy = policy;
        self
    }
}

/// One logical database together with the entities it stores.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub id: String,
    /// Built-in dialect name or the name of a registered driver.
    pub dialect: String,
    pub url: Option<Url>,
    pub user: String,
    pub password: String,
    /// Default schema, empty when the database has none.
    pub schema: String,
    pub sequence_scope: SequenceScope,
    /// Highest key the sequencer may hand out, 0 means unbounded.
    pub sequence_max: i64,
    pub entities: Vec<fn() -> &'static EntityInfo>,
}

impl DatabaseConfig {
    pub fn builder(id: impl Into<String>, dialect: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(id, dialect)
    }
}

/// Builder for DatabaseConfig
#[derive(Debug)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
    error: Option<Error>,
}

impl DatabaseConfigBuilder {
    pub fn new(id: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self {
            config: DatabaseConfig {
                id: id.into(),
                dialect: dialect.into(),
                url: None,
                user: String::new(),
                password: String::new(),
                schema: String::new(),
                sequence_scope: SequenceScope::Table,
                sequence_max: 0,
                entities: Vec::new(),
            },
            error: None,
        }
    }

    /// Connection URL, parse failures are reported by `build`.
    pub fn url(mut self, url: &str) -> Self {
        match Url::parse(url) {
            Ok(url) => self.config.url = Some(url),
            Err(e) => {
                self.error = Some(
                    Error::new(e).context(format!("Invalid database url `{}`", crate::truncated(url, 128))),
                )
            }
        }
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.user = user.into();
        self.config.password = password.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = schema.into();
        self
    }

    pub fn sequence_scope(mut self, scope: SequenceScope) -> Self {
        self.config.sequence_scope = scope;
        self
    }

    pub fn sequence_max(mut self, max: i64) -> Self {
        self.config.sequence_max = max.max(0);
        self
    }

    pub fn entity(mut self, info: fn() -> &'static EntityInfo) -> Self {
        self.config.entities.push(info);
        self
    }

    pub fn build(self) -> Result<DatabaseConfig> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.config),
        }
    }
}
