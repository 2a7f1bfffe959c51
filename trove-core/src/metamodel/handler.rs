use super::{
    ColumnId, DATABASE_SEQUENCE_ID, DEFAULT_SCHEMA_SYMBOL, DatabaseId, DbType, MetaColumn,
    MetaDatabase, MetaIndex, MetaPKey, MetaSelect, MetaTable, PhysicalColumn, TableId,
};
use crate::{
    DatabaseConfig, Driver, Entity, EntityInfo, FieldKind, FieldRef, MetaParams, OrmError, Result,
    SequenceScope, Sequencer, SqlWriter,
    writer::{GenericSqlWriter, MySqlSqlWriter, OracleSqlWriter, PostgresSqlWriter},
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

const MAX_RELATION_DEPTH: usize = 16;

/// Column of a field key and the table that registered it.
#[derive(Clone, Copy)]
struct Registration {
    table: TableId,
    column: ColumnId,
}

/// Owner of the meta-model.
///
/// Built once with `load_database`, then locked and shared read-only by all
/// the sessions through an `Arc`.
pub struct OrmHandler {
    params: MetaParams,
    databases: Vec<MetaDatabase>,
    tables: Vec<MetaTable>,
    columns: Vec<MetaColumn>,
    fields: HashMap<FieldRef, Registration>,
    entities: HashMap<&'static str, TableId>,
    drivers: Vec<Arc<dyn Driver>>,
    locked: AtomicBool,
}

impl OrmHandler {
    pub fn new(params: MetaParams) -> Self {
        Self {
            params,
            databases: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
            fields: HashMap::new(),
            entities: HashMap::new(),
            drivers: Vec::new(),
            locked: AtomicBool::new(false),
        }
    }

    pub fn params(&self) -> &MetaParams {
        &self.params
    }

    pub fn set_params(&mut self, params: MetaParams) -> Result<()> {
        self.assert_unlocked("change the parameters")?;
        self.params = params;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Make the model read-only.
    pub fn lock(&self) {
        if !self.locked.swap(true, Ordering::AcqRel) && self.params.log_metamodel {
            self.log_model();
        }
    }

    /// Lock the model and share it.
    pub fn into_shared(self) -> Arc<OrmHandler> {
        self.lock();
        Arc::new(self)
    }

    fn assert_unlocked(&self, action: &str) -> Result<()> {
        if self.is_locked() {
            let error = OrmError::model_frozen(action);
            log::error!("{}", error);
            return Err(error.into());
        }
        Ok(())
    }

    /// Make a driver available as a dialect, before loading the databases using it.
    pub fn register_driver(&mut self, driver: Box<dyn Driver>) -> Result<()> {
        self.assert_unlocked("register a driver")?;
        self.drivers.push(Arc::from(driver));
        Ok(())
    }

    fn resolve_dialect(&self, dialect: &str) -> Result<(Arc<dyn SqlWriter>, Option<Arc<dyn Driver>>)> {
        if let Some(driver) = self.drivers.iter().find(|d| d.name() == dialect) {
            return Ok((driver.sql_writer(), Some(driver.clone())));
        }
        let writer: Arc<dyn SqlWriter> = match dialect {
            "generic" | "ansi" | "h2" => Arc::new(GenericSqlWriter::new()),
            "postgres" | "postgresql" => Arc::new(PostgresSqlWriter::new()),
            "mysql" | "mariadb" => Arc::new(MySqlSqlWriter::new()),
            "oracle" => Arc::new(OracleSqlWriter::new()),
            _ => {
                return Err(OrmError::mapping(format!(
                    "Unknown dialect `{}`, register a driver with this name first",
                    dialect
                ))
                .into());
            }
        };
        Ok((writer, None))
    }

    /// Build the tables of one database and add them to the model.
    ///
    /// Parents and relation targets not mapped yet are added to the same database.
    pub fn load_database(&mut self, config: DatabaseConfig) -> Result<DatabaseId> {
        self.assert_unlocked("load a database")?;
        let (writer, driver) = self.resolve_dialect(&config.dialect)?;
        let id = DatabaseId(self.databases.len());
        let mut infos: Vec<fn() -> &'static EntityInfo> = Vec::new();
        for info in &config.entities {
            if !infos.iter().any(|v| v().name == info().name) {
                infos.push(*info);
            }
        }
        let mut i = 0;
        while i < infos.len() {
            let info = infos[i]();
            let related = info.extends.into_iter().chain(info.fields.iter().filter_map(|f| {
                match f.kind {
                    FieldKind::Relation(target) => Some(target),
                    FieldKind::Value(..) => None,
                }
            }));
            for target in related.collect::<Vec<_>>() {
                let name = target().name;
                if !self.entities.contains_key(name) && !infos.iter().any(|v| v().name == name) {
                    infos.push(target);
                }
            }
            i += 1;
        }
        self.databases.push(MetaDatabase {
            id,
            name: config.id.clone(),
            dialect: config.dialect.clone(),
            schema: config.schema.clone(),
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            sequence_scope: config.sequence_scope,
            sequence_max: config.sequence_max,
            tables: Vec::new(),
            writer,
            driver,
            sequencer: match config.sequence_scope {
                SequenceScope::Database => Some(Sequencer::new(
                    DATABASE_SEQUENCE_ID,
                    self.params.sequence_cache,
                    config.sequence_max,
                )),
                SequenceScope::Table => None,
            },
        });
        let result = self.build_tables(id, &config, &infos);
        if result.is_err() {
            self.discard_database(id);
        }
        result.map(|_| id)
    }

    fn build_tables(
        &mut self,
        id: DatabaseId,
        config: &DatabaseConfig,
        infos: &[fn() -> &'static EntityInfo],
    ) -> Result<()> {
        let first = self.tables.len();
        for info in infos {
            self.create_table(id, config, *info)?;
        }
        let created: Vec<TableId> = (first..self.tables.len()).map(TableId).collect();
        for table in &created {
            let relations: Vec<ColumnId> = self.tables[table.0]
                .columns
                .iter()
                .copied()
                .filter(|c| matches!(self.columns[c.0].field.info().map(|f| f.kind), Some(FieldKind::Relation(..))))
                .collect();
            for column in relations {
                self.resolve_physical(column, 0)?;
            }
        }
        for table in &created {
            self.resolve_parent(*table)?;
            self.create_sequencer(*table, config);
        }
        for table in &created {
            self.register_fields(*table);
        }
        self.databases[id.0].tables = created;
        Ok(())
    }

    fn discard_database(&mut self, id: DatabaseId) {
        let tables: Vec<TableId> = (0..self.tables.len())
            .map(TableId)
            .filter(|t| self.tables[t.0].database == id)
            .collect();
        let first_table = tables.first().map(|t| t.0).unwrap_or(self.tables.len());
        let first_column = self
            .columns
            .iter()
            .position(|c| c.table.0 >= first_table)
            .unwrap_or(self.columns.len());
        self.fields
            .retain(|_, r| r.table.0 < first_table && r.column.0 < first_column);
        self.entities.retain(|_, t| t.0 < first_table);
        self.columns.truncate(first_column);
        self.tables.truncate(first_table);
        self.databases.truncate(id.0);
    }

    fn create_table(
        &mut self,
        database: DatabaseId,
        config: &DatabaseConfig,
        entity: fn() -> &'static EntityInfo,
    ) -> Result<TableId> {
        let info = entity();
        let id = TableId(self.tables.len());
        let alias = if info.alias.is_empty() {
            format!(
                "{}{}{}",
                self.params.table_alias_prefix, info.table, self.params.table_alias_suffix
            )
        } else {
            info.alias.to_string()
        };
        if let Some(other) = self.tables.iter().find(|t| t.alias == alias) {
            return Err(OrmError::mapping(format!(
                "Table alias `{}` of `{}` is already used by `{}`",
                alias, info.name, other.entity.name
            ))
            .into());
        }
        let select = if info.is_view() {
            Some(MetaSelect::parse(info.select)?)
        } else {
            None
        };
        let mut columns = Vec::with_capacity(info.fields.len());
        for (index, field) in info.fields.iter().enumerate() {
            let column_id = ColumnId(self.columns.len());
            let (mut db_type, mut max_length, mut precision) = match field.kind {
                FieldKind::Value(prototype) => DbType::infer(&prototype()),
                FieldKind::Relation(..) => (DbType::Int, -1, -1),
            };
            if !field.db_type.is_empty() {
                db_type = DbType::parse(field.db_type)?;
            }
            if field.length >= 0 {
                max_length = field.length;
            }
            if field.precision >= 0 {
                precision = field.precision;
            }
            let name = if field.column.contains(',') {
                field.name.to_string()
            } else {
                field.column_name().to_string()
            };
            let physical = match field.kind {
                FieldKind::Value(..) => vec![PhysicalColumn {
                    name: name.clone(),
                    db_type,
                    max_length,
                    precision,
                    target: None,
                }],
                FieldKind::Relation(..) => Vec::new(),
            };
            self.columns.push(MetaColumn {
                id: column_id,
                table: id,
                field: FieldRef { entity, index },
                name,
                db_type,
                max_length,
                precision,
                mandatory: field.primary_key || field.mandatory || !field.nullable,
                primary_key: field.primary_key,
                default_value: (!field.default.is_empty()).then(|| field.default.to_string()),
                comment: field.comment.to_string(),
                index: (!field.index.is_empty()).then(|| field.index.to_string()),
                unique_index: (!field.unique_index.is_empty()).then(|| field.unique_index.to_string()),
                foreign: Vec::new(),
                foreign_table: None,
                physical,
            });
            columns.push(column_id);
        }
        let pkey = MetaPKey {
            columns: columns
                .iter()
                .copied()
                .filter(|c| self.columns[c.0].primary_key)
                .collect(),
        };
        if pkey.is_empty() && select.is_none() {
            return Err(OrmError::mapping(format!(
                "The entity `{}` does not declare a primary key",
                info.name
            ))
            .into());
        }
        let mut indexes: BTreeMap<(bool, String), Vec<ColumnId>> = BTreeMap::new();
        for column in columns.iter().map(|c| &self.columns[c.0]) {
            if let Some(name) = &column.index {
                indexes.entry((false, name.clone())).or_default().push(column.id);
            }
            if let Some(name) = &column.unique_index {
                indexes.entry((true, name.clone())).or_default().push(column.id);
            }
        }
        self.tables.push(MetaTable {
            id,
            database,
            entity: info,
            name: info.table.to_string(),
            schema: if info.schema.is_empty() {
                config.schema.clone()
            } else {
                info.schema.to_string()
            },
            alias,
            comment: info.comment.to_string(),
            columns,
            pkey,
            indexes: indexes
                .into_iter()
                .map(|((unique, name), columns)| MetaIndex {
                    name,
                    unique,
                    columns,
                })
                .collect(),
            select,
            parent: None,
            sequencer: None,
        });
        match self.entities.get(info.name) {
            Some(existing) => log::warn!(
                "The entity `{}` is already mapped to the table `{}`, keeping the existing mapping",
                info.name,
                self.tables[existing.0].full_name()
            ),
            None => {
                self.entities.insert(info.name, id);
            }
        }
        Ok(id)
    }

    /// Register the keys of a table: the inherited ones reached through its
    /// parent chain first, then its own.
    fn register_fields(&mut self, id: TableId) {
        let mut inherited = Vec::new();
        let mut current = self.tables[id.0].parent;
        while let Some(parent) = current.and_then(|c| self.columns[c.0].foreign_table) {
            let parent = &self.tables[parent.0];
            inherited.extend(parent.columns.iter().map(|c| (self.columns[c.0].field, *c)));
            current = parent.parent;
        }
        let own = self.tables[id.0]
            .columns
            .iter()
            .map(|c| (self.columns[c.0].field, *c))
            .collect::<Vec<_>>();
        for (field, column) in inherited.into_iter().chain(own) {
            self.register_field(field, Registration { table: id, column });
        }
    }

    /// An existing registration gives way only to a table of an ancestor entity.
    fn register_field(&mut self, field: FieldRef, new: Registration) {
        let Some(existing) = self.fields.get(&field).copied() else {
            self.fields.insert(field, new);
            return;
        };
        let existing_entity = self.tables[existing.table.0].entity;
        let new_entity = self.tables[new.table.0].entity;
        if should_replace(existing_entity, new_entity) {
            log::debug!(
                "The key {:?} moves from `{}` to the ancestor `{}`",
                field,
                self.tables[existing.table.0].full_name(),
                self.tables[new.table.0].full_name()
            );
            self.fields.insert(field, new);
        } else if existing_entity.name == new_entity.name {
            log::warn!(
                "The key {:?} is already registered, keeping the existing mapping",
                field
            );
        }
    }

    fn resolve_physical(&mut self, id: ColumnId, depth: usize) -> Result<Vec<PhysicalColumn>> {
        let column = &self.columns[id.0];
        if !column.physical.is_empty() {
            return Ok(column.physical.clone());
        }
        if depth > MAX_RELATION_DEPTH {
            return Err(OrmError::mapping(format!(
                "Primary key relations of `{:?}` are cyclic",
                column.field
            ))
            .into());
        }
        let Some(FieldKind::Relation(target)) = column.field.info().map(|f| f.kind) else {
            return Err(OrmError::mapping(format!("Column `{}` has no type", column.name)).into());
        };
        let target = target();
        let Some(table) = self.entities.get(target.name).copied() else {
            return Err(OrmError::mapping(format!(
                "The relation {:?} points to the unmapped entity `{}`",
                column.field, target.name
            ))
            .into());
        };
        let pkey = self.tables[table.0].pkey.columns.clone();
        if pkey.is_empty() {
            return Err(OrmError::mapping(format!(
                "The relation {:?} points to `{}` which has no primary key",
                column.field, target.name
            ))
            .into());
        }
        let mut referenced = Vec::new();
        for key in &pkey {
            referenced.extend(self.resolve_physical(*key, depth + 1)?);
        }
        let column = &self.columns[id.0];
        let explicit: Vec<String> = column
            .field
            .info()
            .filter(|f| f.column.contains(','))
            .map(|f| f.column.split(',').map(|v| v.trim().to_string()).collect())
            .unwrap_or_default();
        let names: Vec<String> = if !explicit.is_empty() {
            if explicit.len() != referenced.len() {
                return Err(OrmError::mapping(format!(
                    "The relation {:?} declares {} column names but the referenced key has {} columns",
                    column.field,
                    explicit.len(),
                    referenced.len()
                ))
                .into());
            }
            explicit
        } else if referenced.len() == 1 {
            vec![column.name.clone()]
        } else {
            referenced
                .iter()
                .map(|r| format!("fk_{}_{}", column.name, r.name))
                .collect()
        };
        let physical: Vec<PhysicalColumn> = referenced
            .into_iter()
            .zip(names)
            .map(|(r, name)| PhysicalColumn {
                name,
                db_type: r.db_type,
                max_length: r.max_length,
                precision: r.precision,
                target: Some(r.name),
            })
            .collect();
        let column = &mut self.columns[id.0];
        column.db_type = physical[0].db_type;
        column.max_length = physical[0].max_length;
        column.precision = physical[0].precision;
        column.foreign = pkey;
        column.foreign_table = Some(table);
        column.physical = physical.clone();
        Ok(physical)
    }

    fn resolve_parent(&mut self, id: TableId) -> Result<()> {
        let table = &self.tables[id.0];
        let Some(parent) = table.entity.extends else {
            return Ok(());
        };
        let parent = parent();
        let column = table.pkey.first().map(|c| &self.columns[c.0]);
        let Some(column) = column.filter(|c| {
            c.foreign_table
                .is_some_and(|t| self.tables[t.0].entity.name == parent.name)
        }) else {
            return Err(OrmError::mapping(format!(
                "The first primary key field of `{}` must be a relation to its parent `{}`",
                table.entity.name, parent.name
            ))
            .into());
        };
        let column = column.id;
        self.tables[id.0].parent = Some(column);
        Ok(())
    }

    fn create_sequencer(&mut self, id: TableId, config: &DatabaseConfig) {
        let table = &self.tables[id.0];
        if table.is_view() || config.sequence_scope != SequenceScope::Table {
            return;
        }
        let pk = &table.pkey.columns;
        let eligible = pk.len() == 1
            && pk
                .first()
                .map(|c| &self.columns[c.0])
                .is_some_and(|c| !c.is_foreign_key() && c.db_type.is_integral());
        if !eligible {
            return;
        }
        let schema = if table.schema.is_empty() || table.schema == config.schema {
            DEFAULT_SCHEMA_SYMBOL
        } else {
            table.schema.as_str()
        };
        let sequence = format!("{}.{}", schema, table.name);
        self.tables[id.0].sequencer = Some(Sequencer::new(
            sequence,
            self.params.sequence_cache,
            config.sequence_max,
        ));
    }

    pub fn databases(&self) -> &[MetaDatabase] {
        &self.databases
    }

    pub fn database(&self, id: DatabaseId) -> &MetaDatabase {
        &self.databases[id.0]
    }

    pub fn database_by_name(&self, name: &str) -> Option<&MetaDatabase> {
        self.databases.iter().find(|d| d.name == name)
    }

    pub fn tables(&self) -> &[MetaTable] {
        &self.tables
    }

    pub fn table(&self, id: TableId) -> &MetaTable {
        &self.tables[id.0]
    }

    pub fn column(&self, id: ColumnId) -> &MetaColumn {
        &self.columns[id.0]
    }

    pub fn columns_of(&self, table: TableId) -> impl Iterator<Item = &MetaColumn> {
        self.tables[table.0].columns.iter().map(|c| &self.columns[c.0])
    }

    pub fn pk_columns(&self, table: TableId) -> impl Iterator<Item = &MetaColumn> {
        self.tables[table.0].pkey.columns.iter().map(|c| &self.columns[c.0])
    }

    pub fn writer(&self, database: DatabaseId) -> &dyn SqlWriter {
        self.databases[database.0].writer()
    }

    pub fn find_table(&self, info: &EntityInfo) -> Result<&MetaTable> {
        match self.entities.get(info.name) {
            Some(id) => Ok(&self.tables[id.0]),
            None => Err(OrmError::mapping(format!("The entity `{}` is not mapped", info.name)).into()),
        }
    }

    pub fn table_of<E: Entity>(&self) -> Result<&MetaTable> {
        self.find_table(E::info())
    }

    fn registration(&self, field: &FieldRef) -> Result<Registration> {
        match self.fields.get(field) {
            Some(registration) => Ok(*registration),
            None => Err(OrmError::mapping(format!("The key {:?} has no registered column", field)).into()),
        }
    }

    pub fn find_column(&self, field: &FieldRef) -> Result<&MetaColumn> {
        self.registration(field).map(|r| &self.columns[r.column.0])
    }

    /// Table holding the registration of a key. Keys shared along an
    /// inheritance chain belong to the topmost mapped ancestor.
    pub fn registered_table(&self, field: &FieldRef) -> Result<&MetaTable> {
        self.registration(field).map(|r| &self.tables[r.table.0])
    }

    /// Sequencer assigning the keys of a table.
    pub fn sequencer(&self, table: TableId) -> Result<&Sequencer> {
        let table = &self.tables[table.0];
        if let Some(sequencer) = &table.sequencer {
            return Ok(sequencer);
        }
        let single_integral = table.pkey.len() == 1
            && table
                .pkey
                .first()
                .map(|c| &self.columns[c.0])
                .is_some_and(|c| !c.is_foreign_key() && c.db_type.is_integral());
        match &self.databases[table.database.0].sequencer {
            Some(sequencer) if single_integral => Ok(sequencer),
            _ => Err(OrmError::mapping(format!(
                "The table `{}` has no sequencer, its primary key must be assigned explicitly",
                table.full_name()
            ))
            .into()),
        }
    }

    /// Sequencers of a database, table scoped ones first.
    pub fn sequencers(&self, database: DatabaseId) -> impl Iterator<Item = &Sequencer> {
        let db = &self.databases[database.0];
        db.tables
            .iter()
            .filter_map(|t| self.tables[t.0].sequencer.as_ref())
            .chain(db.sequencer.as_ref())
    }

    fn log_model(&self) {
        for db in &self.databases {
            log::info!("Database `{}` ({} dialect)", db.name, db.dialect);
            for table in db.tables.iter().map(|t| &self.tables[t.0]) {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| {
                        let c = &self.columns[c.0];
                        format!("{} {}{}", c.name, c.db_type, if c.primary_key { " PK" } else { "" })
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                log::info!(
                    "  {} `{}` as {}: {}",
                    if table.is_view() { "view" } else { "table" },
                    table.full_name(),
                    table.alias,
                    columns
                );
            }
        }
    }
}

/// Registration conflict rule: replace only in favor of an ancestor entity.
pub fn should_replace(existing: &EntityInfo, new: &EntityInfo) -> bool {
    new.is_ancestor_of(existing)
}
