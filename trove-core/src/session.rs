use crate::{
    AsValue, CacheKey, ColumnId, Connection, Criterion, CriterionDecoder, DatabaseId, DdlPolicy,
    Entity, EntityCache, EntityRef, Error, ForeignKey, Key, KeyPath, Leaf, MetaColumn, MetaDatabase,
    Node, Operand, Operator, OrmError, OrmHandler, PrintableValues, Property, Query, Relation,
    Result, RowLabeled, SelectStatement, TableId, Value, entity_ref, metamodel::SEQUENCE_TABLE,
    truncate_long,
};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet, btree_map::Entry},
    fmt, iter,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No statement ran since the last commit or rollback.
    Open,
    /// At least one connection is open.
    Active,
    /// A statement failed, only `rollback` or `close` are useful now.
    RollbackOnly,
    Closed,
}

type DynEntity = Rc<RefCell<dyn Entity>>;

/// Unit of work over the databases of an [`OrmHandler`].
///
/// Connections are opened lazily, one per database, plus a separate one per
/// database for the sequencer. A session is not `Send`: use one per thread.
pub struct Session {
    id: u64,
    handler: Arc<OrmHandler>,
    connections: BTreeMap<DatabaseId, Box<dyn Connection>>,
    sequence_connections: BTreeMap<DatabaseId, Box<dyn Connection>>,
    cache: EntityCache,
    rollback_only: bool,
    closed: bool,
}

impl Session {
    /// Open a session, the meta-model is locked from now on.
    pub fn new(handler: Arc<OrmHandler>) -> Self {
        handler.lock();
        let id = SESSION_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Session {} opened", id);
        Self {
            id,
            cache: EntityCache::new(handler.params().cache_policy),
            handler,
            connections: BTreeMap::new(),
            sequence_connections: BTreeMap::new(),
            rollback_only: false,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handler(&self) -> &Arc<OrmHandler> {
        &self.handler
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.rollback_only {
            SessionState::RollbackOnly
        } else if self.connections.is_empty() {
            SessionState::Open
        } else {
            SessionState::Active
        }
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Force the next commit to fail.
    pub fn mark_for_rollback(&mut self) {
        log::debug!("Session {} marked for rollback", self.id);
        self.rollback_only = true;
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(OrmError::session_state(format!("The session {} is closed", self.id)).into());
        }
        Ok(())
    }

    fn open_connection<'c>(
        handler: &OrmHandler,
        pool: &'c mut BTreeMap<DatabaseId, Box<dyn Connection>>,
        database: DatabaseId,
    ) -> Result<&'c mut Box<dyn Connection>> {
        match pool.entry(database) {
            Entry::Occupied(v) => Ok(v.into_mut()),
            Entry::Vacant(v) => {
                let db = handler.database(database);
                let Some(driver) = db.driver() else {
                    return Err(OrmError::mapping(format!(
                        "No driver is registered for the dialect `{}` of the database `{}`",
                        db.dialect, db.name
                    ))
                    .into());
                };
                log::debug!("Connecting to the database `{}` using {}", db.name, driver.name());
                Ok(v.insert(driver.connect(db)?))
            }
        }
    }

    fn failure(&mut self, error: Error, sql: &str, values: &[Value]) -> Error {
        self.rollback_only = true;
        let error = error.context(OrmError::SqlExecution {
            sql: sql.to_string(),
            values: PrintableValues(values).to_string(),
        });
        log::error!("{:#}", error);
        error
    }

    fn log_statement(sql: &str, values: &[Value]) {
        if values.is_empty() {
            log::info!("{}", truncate_long!(sql));
        } else {
            log::info!("{}\n\t[{}]", truncate_long!(sql), PrintableValues(values));
        }
    }

    /// Run a data modification statement, returns the affected row count.
    pub fn execute(&mut self, database: DatabaseId, sql: &str, values: &[Value]) -> Result<u64> {
        self.check_open()?;
        Self::log_statement(sql, values);
        let result = Self::open_connection(&self.handler, &mut self.connections, database)
            .and_then(|c| c.execute(sql, values));
        match result {
            Ok(v) => Ok(v.rows_affected),
            Err(e) => Err(self.failure(e, sql, values)),
        }
    }

    /// Run a query and collect its rows.
    pub fn query_rows(
        &mut self,
        database: DatabaseId,
        sql: &str,
        values: &[Value],
        max_rows: Option<u64>,
        fetch_size: Option<u32>,
    ) -> Result<Vec<RowLabeled>> {
        self.check_open()?;
        Self::log_statement(sql, values);
        let result = Self::open_connection(&self.handler, &mut self.connections, database)
            .and_then(|c| c.query(sql, values, max_rows, fetch_size));
        result.map_err(|e| self.failure(e, sql, values))
    }

    /// Next key of the table sequencer, reserved on the sequence connection.
    pub fn next_key(&mut self, table: TableId) -> Result<i64> {
        self.check_open()?;
        let handler = self.handler.clone();
        let database = handler.database(handler.table(table).database);
        let sequencer = handler.sequencer(table)?;
        let result = Self::open_connection(&handler, &mut self.sequence_connections, database.id)
            .and_then(|c| sequencer.next_value(database, c.as_mut()));
        if result.is_err() {
            self.rollback_only = true;
        }
        result
    }

    /// Commit every open connection in database order.
    pub fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        if self.rollback_only {
            let error: Error = OrmError::session_state(format!(
                "The session {} is marked for rollback, commit refused",
                self.id
            ))
            .into();
            log::error!("{:#}", error);
            if let Err(e) = self.rollback_connections() {
                log::warn!("Rollback after the refused commit failed: {:#}", e);
            }
            return Err(error);
        }
        for (database, connection) in self.connections.iter_mut() {
            if let Err(e) = connection.commit() {
                self.rollback_only = true;
                let e = e.context(format!(
                    "Commit of the database `{}` failed",
                    self.handler.database(*database).name
                ));
                log::error!("{:#}", e);
                return Err(e);
            }
        }
        log::debug!("Session {} committed {} connections", self.id, self.connections.len());
        Ok(())
    }

    /// Roll back every open connection and leave the rollback-only state.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        let result = self.rollback_connections();
        self.rollback_only = false;
        log::debug!("Session {} rolled back", self.id);
        result
    }

    fn rollback_connections(&mut self) -> Result<()> {
        let mut result = Ok(());
        for (database, connection) in self.connections.iter_mut() {
            if let Err(e) = connection.rollback() {
                let e = e.context(format!(
                    "Rollback of the database `{}` failed",
                    self.handler.database(*database).name
                ));
                log::error!("{:#}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Roll back and close all the connections, the first failure is returned.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cache.clear();
        let mut result = Ok(());
        let connections = std::mem::take(&mut self.connections)
            .into_iter()
            .chain(std::mem::take(&mut self.sequence_connections));
        for (database, mut connection) in connections {
            let name = &self.handler.database(database).name;
            let rolled_back = connection.rollback();
            let closed = connection.close();
            if let Err(e) = rolled_back.and(closed) {
                let e = e.context(format!("Closing a connection to `{}` failed", name));
                log::error!("{:#}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        log::debug!("Session {} closed", self.id);
        result
    }

    pub fn create_query<E: Entity>(&self, criterion: impl Into<Option<Criterion<E>>>) -> Result<Query<E>> {
        Query::new(self.handler.clone(), criterion.into())
    }

    /// Insert a new entity, the single integral key is taken from the sequencer when unset.
    pub fn save<E: Entity>(&mut self, entity: &EntityRef<E>) -> Result<()> {
        let table = self.handler.table_of::<E>()?.id;
        let dynamic: DynEntity = entity.clone();
        self.insert(table, &dynamic)?;
        self.cache_put(table, entity)
    }

    /// Insert entities of one type using multi row statements.
    pub fn save_all<E: Entity>(&mut self, entities: &[EntityRef<E>]) -> Result<()> {
        let handler = self.handler.clone();
        let table = handler.table_of::<E>()?;
        if entities.len() < 2 || self.parent_of(table.id).is_some() {
            return entities.iter().try_for_each(|v| self.save(v));
        }
        self.check_open()?;
        let writer = handler.writer(table.database);
        for chunk in entities.chunks(handler.params().insert_multirow_limit.max(1)) {
            let mut values = Vec::new();
            for entity in chunk {
                let dynamic: DynEntity = entity.clone();
                self.assign_key(table.id, &dynamic)?;
                let entity = entity.try_borrow()?;
                for column in handler.columns_of(table.id) {
                    push_column_values(column, &*entity, &mut values)?;
                }
            }
            let mut sql = String::with_capacity(128);
            writer.write_insert(&handler, &mut sql, table.id, chunk.len())?;
            self.execute(table.database, &sql, &values)?;
            for entity in chunk {
                self.stamp(&mut *entity.try_borrow_mut()?);
                self.cache_put(table.id, entity)?;
            }
        }
        Ok(())
    }

    /// Update an entity this session family already stored, insert it otherwise.
    pub fn save_or_update<E: Entity>(&mut self, entity: &EntityRef<E>) -> Result<()> {
        let stored = entity.try_borrow()?.state().session().is_some();
        if stored {
            self.update(entity).map(|_| ())
        } else {
            self.save(entity)
        }
    }

    /// Write the modified columns of the entity, returns the affected rows.
    pub fn update<E: Entity>(&mut self, entity: &EntityRef<E>) -> Result<u64> {
        let table = self.handler.table_of::<E>()?.id;
        let dynamic: DynEntity = entity.clone();
        self.update_entity(table, &dynamic)
    }

    /// Write the modified columns of `changes` to every row matching `criterion`.
    pub fn update_where<E: Entity>(&mut self, changes: &E, criterion: Criterion<E>) -> Result<u64> {
        self.check_open()?;
        let handler = self.handler.clone();
        let table = handler.table_of::<E>()?;
        let changed: Vec<&MetaColumn> = handler
            .columns_of(table.id)
            .filter(|c| changes.state().is_dirty(c.index_in_entity()))
            .collect();
        if changed.is_empty() {
            log::warn!("Nothing to update in `{}`, no field was modified", table.full_name());
            return Ok(0);
        }
        let mut values = Vec::new();
        for column in &changed {
            push_column_values(column, changes, &mut values)?;
        }
        let decoder = CriterionDecoder::new(&handler, table.id, Some(criterion.node()), iter::empty())?;
        let ids: Vec<ColumnId> = changed.iter().map(|c| c.id).collect();
        let mut sql = String::with_capacity(128);
        handler
            .writer(table.database)
            .write_update(&handler, &mut sql, &decoder, &ids)?;
        values.extend(decoder.values());
        self.execute(table.database, &sql, &values)
    }

    /// Delete the row of the entity, and the parent row under inheritance.
    pub fn delete<E: Entity>(&mut self, entity: &EntityRef<E>) -> Result<u64> {
        let table = self.handler.table_of::<E>()?.id;
        let key = entity.try_borrow()?.primary_key_values()?;
        let rows = self.delete_by_key(table, &key)?;
        entity.try_borrow_mut()?.state_mut().set_session(None);
        Ok(rows)
    }

    /// Delete every row matching the criterion, cached entities among them are evicted.
    pub fn delete_where<E: Entity>(&mut self, criterion: Criterion<E>) -> Result<u64> {
        self.check_open()?;
        let handler = self.handler.clone();
        let table = handler.table_of::<E>()?;
        let decoder = CriterionDecoder::new(&handler, table.id, Some(criterion.node()), iter::empty())?;
        let writer = handler.writer(table.database);
        let parent = self.parent_of(table.id);
        let keys = if parent.is_some() || self.cache.count_table(table.id) > 0 {
            let mut sql = String::with_capacity(128);
            let columns = table.pkey.columns.clone();
            let select = SelectStatement {
                columns: &columns,
                ..SelectStatement::new(&decoder)
            };
            writer.write_select(&handler, &mut sql, &select);
            self.query_rows(table.database, &sql, &decoder.values(), None, None)?
        } else {
            Vec::new()
        };
        let mut sql = String::with_capacity(128);
        writer.write_delete(&handler, &mut sql, &decoder)?;
        let rows = self.execute(table.database, &sql, &decoder.values())?;
        for row in keys {
            self.cache.remove(&CacheKey::new(table.id, row.values()));
            if let Some((parent, count)) = parent {
                self.delete_by_key(parent, &row.values()[..count.min(row.values().len())])?;
            }
        }
        Ok(rows)
    }

    /// Entities matching the query.
    pub fn load<E: Entity + Default>(&mut self, query: &Query<E>) -> Result<Vec<EntityRef<E>>> {
        query.list(self)
    }

    /// Entity by primary key, the cache is consulted first.
    pub fn load_by_key<E: Entity + Default>(&mut self, key: impl Into<ForeignKey>) -> Result<Option<EntityRef<E>>> {
        let key = key.into();
        let handler = self.handler.clone();
        let table = handler.table_of::<E>()?.id;
        if let Some(cached) = self.cache.get::<E>(&CacheKey::new(table, key.values())) {
            return Ok(Some(cached));
        }
        let node = key_node(&handler, table, key.values())?;
        Query::new(handler, Some(Criterion::from_node(node)))?.unique_result(self)
    }

    /// Target of a relation field, fetched and attached to the entity when only its key is known.
    pub fn load_related<E: Entity, B: Entity + Default>(
        &mut self,
        entity: &EntityRef<E>,
        key: Key<E, Option<Relation<B>>>,
    ) -> Result<Option<EntityRef<B>>> {
        let (loaded, foreign) = {
            let entity = entity.try_borrow()?;
            (entity.related_any(key.index()), entity.read_key(key.index())?)
        };
        if let Some(related) = loaded.and_then(|v| v.downcast::<RefCell<B>>().ok()) {
            return Ok(Some(related));
        }
        let Some(foreign) = foreign.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let Some(related) = self.load_by_key::<B>(foreign)? else {
            return Ok(None);
        };
        entity
            .try_borrow_mut()?
            .write_relation(key.index(), Box::new(Some(Relation::Loaded(related.clone()))))?;
        Ok(Some(related))
    }

    /// Primary key stored in a relation field, without touching the database.
    pub fn read_fk<E: Entity, B>(&self, entity: &E, key: Key<E, Option<Relation<B>>>) -> Result<Option<ForeignKey>> {
        entity.read_key(key.index())
    }

    /// Entities whose relation `key` points to `parent`.
    pub fn children<E: Entity, B: Entity + Default>(
        &mut self,
        parent: &EntityRef<E>,
        key: Key<B, Option<Relation<E>>>,
    ) -> Result<Vec<EntityRef<B>>> {
        let foreign = ForeignKey(parent.try_borrow()?.primary_key_values()?);
        Query::new(self.handler.clone(), Some(key.eq_key(foreign)))?.list(self)
    }

    /// Read the row again into the entity, `false` when the row is gone.
    pub fn reload<E: Entity>(&mut self, entity: &EntityRef<E>) -> Result<bool> {
        let handler = self.handler.clone();
        let table = handler.table_of::<E>()?;
        let key = entity.try_borrow()?.primary_key_values()?;
        let node = key_node(&handler, table.id, &key)?;
        let decoder = CriterionDecoder::new(&handler, table.id, Some(&node), iter::empty())?;
        let mut sql = String::with_capacity(128);
        handler
            .writer(table.database)
            .write_select(&handler, &mut sql, &SelectStatement::new(&decoder));
        let rows = self.query_rows(table.database, &sql, &decoder.values(), Some(1), None)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(false);
        };
        let columns: Vec<&MetaColumn> = handler.columns_of(table.id).collect();
        let mut entity = entity.try_borrow_mut()?;
        fill(&columns, &mut *entity, row.values.into_vec())?;
        self.stamp(&mut *entity);
        Ok(true)
    }

    /// Number of rows matching the criterion.
    pub fn row_count<E: Entity>(&mut self, criterion: impl Into<Option<Criterion<E>>>) -> Result<u64> {
        Query::new(self.handler.clone(), criterion.into())?.count(self)
    }

    /// Create the schema objects the DDL policy allows, then commit.
    pub fn create_ddl(&mut self) -> Result<()> {
        let handler = self.handler.clone();
        let policy = handler.params().orm2ddl_policy;
        if policy == DdlPolicy::DoNothing {
            return Ok(());
        }
        for database in handler.databases() {
            let statements = self.ddl_statements(&handler, database, policy)?;
            for sql in statements.iter().filter(|v| !v.is_empty()) {
                self.execute(database.id, sql, &[])?;
            }
        }
        self.commit()
    }

    /// Names of the columns of an existing table, empty when it does not exist.
    pub fn existing_columns(&mut self, database: &MetaDatabase, schema: &str, table: &str) -> Result<Vec<String>> {
        let mut sql = String::with_capacity(128);
        let values = database.writer().write_column_names_query(&mut sql, schema, table);
        let rows = self.query_rows(database.id, &sql, &values, None, None)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.values.into_vec().into_iter().next() {
                Some(Value::Varchar(Some(v))) => Some(v),
                _ => None,
            })
            .collect())
    }

    fn ddl_statements(
        &mut self,
        handler: &OrmHandler,
        database: &MetaDatabase,
        policy: DdlPolicy,
    ) -> Result<Vec<String>> {
        let writer = database.writer();
        let sequence_exists = !self
            .existing_columns(database, &database.schema, SEQUENCE_TABLE)?
            .is_empty();
        let mut statements = Vec::new();
        if policy == DdlPolicy::CreateDdl && sequence_exists {
            log::info!("The database `{}` is initialized, DDL skipped", database.name);
            return Ok(statements);
        }
        let schemas: BTreeSet<&str> = iter::once(database.schema.as_str())
            .chain(database.tables.iter().map(|t| handler.table(*t).schema.as_str()))
            .filter(|v| !v.is_empty())
            .collect();
        for schema in schemas {
            let mut sql = String::new();
            writer.write_create_schema(&mut sql, schema);
            statements.push(sql);
        }
        let mut created = Vec::new();
        for table in database.tables.iter().map(|t| handler.table(*t)) {
            if table.is_view() {
                continue;
            }
            let existing = if policy == DdlPolicy::CreateOrUpdateDdl {
                self.existing_columns(database, &table.schema, &table.name)?
            } else {
                Vec::new()
            };
            if existing.is_empty() {
                let mut sql = String::with_capacity(256);
                writer.write_create_table(handler, &mut sql, table.id)?;
                statements.push(sql);
                created.push(table);
                continue;
            }
            for column in handler.columns_of(table.id) {
                for (i, physical) in column.physical.iter().enumerate() {
                    if existing.iter().any(|v| v.eq_ignore_ascii_case(&physical.name)) {
                        continue;
                    }
                    log::info!("Adding the column `{}` to `{}`", physical.name, table.full_name());
                    let mut sql = String::with_capacity(96);
                    writer.write_add_column(handler, &mut sql, column.id, i)?;
                    statements.push(sql);
                }
            }
        }
        if !sequence_exists {
            let mut sql = String::with_capacity(256);
            writer.write_sequence_table(&mut sql, database, handler.params().sequence_cache);
            statements.push(sql);
        }
        if !writer.inline_foreign_keys() {
            for table in &created {
                for column in handler.columns_of(table.id).filter(|c| {
                    c.foreign_table
                        .is_some_and(|t| !handler.table(t).is_view() && handler.table(t).database == database.id)
                }) {
                    let mut sql = String::with_capacity(128);
                    writer.write_foreign_key(handler, &mut sql, column.id)?;
                    statements.push(sql);
                }
            }
        }
        for table in &created {
            for index in &table.indexes {
                let mut sql = String::with_capacity(96);
                writer.write_create_index(handler, &mut sql, table.id, index);
                statements.push(sql);
            }
        }
        for table in &created {
            if !table.comment.is_empty() {
                let mut sql = String::with_capacity(96);
                writer.write_table_comment(&mut sql, table);
                statements.push(sql);
            }
            for column in handler.columns_of(table.id).filter(|c| !c.comment.is_empty()) {
                let mut sql = String::with_capacity(96);
                writer.write_column_comment(handler, &mut sql, column.id);
                statements.extend(sql.split(";\n").map(str::to_string));
            }
        }
        Ok(statements)
    }

    pub(crate) fn select<E: Entity + Default>(
        &mut self,
        query: &Query<E>,
        max_rows: Option<u64>,
    ) -> Result<Vec<EntityRef<E>>> {
        let handler = query.handler().clone();
        let decoder = query.decoder()?;
        let columns = query.selected_columns()?;
        let database = handler.table(query.table()).database;
        let mut sql = String::with_capacity(128);
        handler
            .writer(database)
            .write_select(&handler, &mut sql, &query.statement(decoder, &columns));
        let rows = self.query_rows(database, &sql, &decoder.values(), max_rows, query.get_fetch_size())?;
        rows.into_iter()
            .map(|row| self.materialize::<E>(&handler, query.table(), &columns, row))
            .collect()
    }

    pub(crate) fn select_exists<E: Entity>(&mut self, query: &Query<E>) -> Result<bool> {
        let handler = query.handler().clone();
        let decoder = query.decoder()?;
        let table = handler.table(query.table());
        let columns = if table.is_view() {
            Vec::new()
        } else {
            table.pkey.columns.clone()
        };
        let select = SelectStatement {
            columns: &columns,
            limit: Some(1),
            ..query.statement(decoder, &columns)
        };
        let mut sql = String::with_capacity(128);
        handler.writer(table.database).write_select(&handler, &mut sql, &select);
        let rows = self.query_rows(table.database, &sql, &decoder.values(), Some(1), None)?;
        Ok(!rows.is_empty())
    }

    pub(crate) fn select_count<E: Entity>(&mut self, query: &Query<E>) -> Result<u64> {
        let handler = query.handler().clone();
        let decoder = query.decoder()?;
        let database = handler.table(query.table()).database;
        let mut sql = String::with_capacity(128);
        handler
            .writer(database)
            .write_select_count(&handler, &mut sql, &query.statement(decoder, &[]));
        let rows = self.query_rows(database, &sql, &decoder.values(), Some(1), None)?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|v| v.values.into_vec().into_iter().next())
            .unwrap_or_default();
        Ok(Option::<i64>::try_from_value(value)?.unwrap_or(0).max(0) as u64)
    }

    fn materialize<E: Entity + Default>(
        &mut self,
        handler: &OrmHandler,
        table: TableId,
        columns: &[ColumnId],
        row: RowLabeled,
    ) -> Result<EntityRef<E>> {
        let partial = !columns.is_empty();
        let columns: Vec<&MetaColumn> = if partial {
            columns.iter().map(|c| handler.column(*c)).collect()
        } else {
            handler.columns_of(table).collect()
        };
        let mut entity = E::default();
        fill(&columns, &mut entity, row.values.into_vec())?;
        self.stamp(&mut entity);
        if !self.cache.is_enabled() || handler.table(table).pkey.is_empty() {
            return Ok(entity_ref(entity));
        }
        let key = CacheKey::new(table, &entity.primary_key_values()?);
        if let Some(cached) = self.cache.get::<E>(&key) {
            return Ok(cached);
        }
        let entity = entity_ref(entity);
        if !partial {
            self.cache.put(key, &entity);
        }
        Ok(entity)
    }

    fn stamp(&self, entity: &mut dyn Entity) {
        let state = entity.state_mut();
        state.clear_dirty();
        state.set_session(Some(self.id));
    }

    fn cache_put<E: Entity>(&mut self, table: TableId, entity: &EntityRef<E>) -> Result<()> {
        if self.cache.is_enabled() && !self.handler.table(table).pkey.is_empty() {
            let key = CacheKey::new(table, &entity.try_borrow()?.primary_key_values()?);
            self.cache.put(key, entity);
        }
        Ok(())
    }

    /// Parent table and the width of its key when inheritance applies to `table`.
    fn parent_of(&self, table: TableId) -> Option<(TableId, usize)> {
        if !self.handler.params().inheritance_mode {
            return None;
        }
        let column = self.handler.column(self.handler.table(table).parent?);
        Some((column.foreign_table?, column.physical_count()))
    }

    fn insert(&mut self, table: TableId, entity: &DynEntity) -> Result<()> {
        self.check_open()?;
        let handler = self.handler.clone();
        if self.parent_of(table).is_some() {
            if let Some(column) = handler.table(table).parent.map(|c| handler.column(c)) {
                let parent = entity.try_borrow()?.related(column.index_in_entity());
                if let (Some(parent), Some(target)) = (parent, column.foreign_table) {
                    self.insert(target, &parent)?;
                }
            }
        }
        self.assign_key(table, entity)?;
        let mut values = Vec::new();
        {
            let entity = entity.try_borrow()?;
            for column in handler.columns_of(table) {
                push_column_values(column, &*entity, &mut values)?;
            }
        }
        let database = handler.table(table).database;
        let mut sql = String::with_capacity(128);
        handler.writer(database).write_insert(&handler, &mut sql, table, 1)?;
        self.execute(database, &sql, &values)?;
        self.stamp(&mut *entity.try_borrow_mut()?);
        Ok(())
    }

    fn assign_key(&mut self, table: TableId, entity: &DynEntity) -> Result<()> {
        let handler = self.handler.clone();
        let pkey = &handler.table(table).pkey;
        let Some(column) = pkey.first().map(|c| handler.column(c)) else {
            return Ok(());
        };
        if pkey.len() != 1 || column.is_foreign_key() || !column.db_type.is_integral() {
            return Ok(());
        }
        let index = column.index_in_entity();
        let current = entity.try_borrow()?.read(index)?;
        if !is_unset_key(&current) {
            return Ok(());
        }
        let key = self.next_key(table)?;
        entity.try_borrow_mut()?.write(index, Value::Int64(Some(key)))
    }

    fn update_entity(&mut self, table: TableId, entity: &DynEntity) -> Result<u64> {
        self.check_open()?;
        let handler = self.handler.clone();
        let mut result = 0;
        if let Some((target, _)) = self.parent_of(table) {
            if let Some(column) = handler.table(table).parent.map(|c| handler.column(c)) {
                let parent = entity.try_borrow()?.related(column.index_in_entity());
                if let Some(parent) = parent {
                    if parent.try_borrow()?.state().has_changes() {
                        result += self.update_entity(target, &parent)?;
                    }
                }
            }
        }
        let (changed, mut values, key) = {
            let entity = entity.try_borrow()?;
            let changed: Vec<&MetaColumn> = handler
                .columns_of(table)
                .filter(|c| entity.state().is_dirty(c.index_in_entity()))
                .collect();
            let mut values = Vec::new();
            for column in &changed {
                push_column_values(column, &*entity, &mut values)?;
            }
            (changed, values, entity.primary_key_values()?)
        };
        if changed.is_empty() {
            if result == 0 {
                log::warn!(
                    "Nothing to update in `{}`, no field was modified",
                    handler.table(table).full_name()
                );
            }
            return Ok(result);
        }
        let node = key_node(&handler, table, &key)?;
        let decoder = CriterionDecoder::new(&handler, table, Some(&node), iter::empty())?;
        let ids: Vec<ColumnId> = changed.iter().map(|c| c.id).collect();
        let database = handler.table(table).database;
        let mut sql = String::with_capacity(128);
        handler
            .writer(database)
            .write_update(&handler, &mut sql, &decoder, &ids)?;
        values.extend(decoder.values());
        result += self.execute(database, &sql, &values)?;
        self.stamp(&mut *entity.try_borrow_mut()?);
        Ok(result)
    }

    fn delete_by_key(&mut self, table: TableId, key: &[Value]) -> Result<u64> {
        self.check_open()?;
        let handler = self.handler.clone();
        let node = key_node(&handler, table, key)?;
        let decoder = CriterionDecoder::new(&handler, table, Some(&node), iter::empty())?;
        let database = handler.table(table).database;
        let mut sql = String::with_capacity(96);
        handler.writer(database).write_delete(&handler, &mut sql, &decoder)?;
        let rows = self.execute(database, &sql, &decoder.values())?;
        self.cache.remove(&CacheKey::new(table, key));
        if let Some((parent, count)) = self.parent_of(table) {
            self.delete_by_key(parent, &key[..count.min(key.len())])?;
        }
        Ok(rows)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Session {} dropped with a failing close: {:#}", self.id, e);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("connections", &self.connections.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn is_unset_key(value: &Value) -> bool {
    value.is_null()
        || matches!(
            value,
            Value::Int16(Some(0)) | Value::Int32(Some(0)) | Value::Int64(Some(0))
        )
}

/// Append the values stored in the physical columns of `column`.
fn push_column_values(column: &MetaColumn, entity: &dyn Entity, out: &mut Vec<Value>) -> Result<()> {
    let index = column.index_in_entity();
    if !column.is_foreign_key() {
        out.push(entity.read(index)?);
        return Ok(());
    }
    match entity.read_key(index)? {
        Some(key) if !key.is_null() => {
            if key.values().len() != column.physical_count() {
                return Err(OrmError::mapping(format!(
                    "The relation `{}` holds {} key values, its table expects {}",
                    column.name,
                    key.values().len(),
                    column.physical_count()
                ))
                .into());
            }
            out.extend(key.0);
        }
        _ => out.extend(column.physical.iter().map(|_| Value::Null)),
    }
    Ok(())
}

/// Write a row into the entity, values are consumed in the order of the physical columns.
fn fill(columns: &[&MetaColumn], entity: &mut dyn Entity, values: Vec<Value>) -> Result<()> {
    let expected: usize = columns.iter().map(|c| c.physical_count().max(1)).sum();
    if values.len() < expected {
        return Err(OrmError::mapping(format!(
            "The row holds {} values, `{}` needs {}",
            values.len(),
            entity.entity_info().name,
            expected
        ))
        .into());
    }
    let mut values = values.into_iter();
    for column in columns {
        let index = column.index_in_entity();
        if column.is_foreign_key() {
            let key = ForeignKey(values.by_ref().take(column.physical_count()).collect());
            entity.write_key(index, if key.is_null() { None } else { Some(key) })?;
        } else {
            entity.write(index, values.next().unwrap_or_default())?;
        }
    }
    Ok(())
}

/// Criterion matching the primary key `values`, flattened the way the physical columns are.
pub(crate) fn key_node(handler: &OrmHandler, table: TableId, values: &[Value]) -> Result<Node> {
    let meta = handler.table(table);
    let mut result: Option<Node> = None;
    let mut rest = values;
    for column in handler.pk_columns(table) {
        let count = column.physical_count().max(1);
        if rest.len() < count {
            return Err(OrmError::mapping(format!(
                "The primary key of `{}` needs more than {} values",
                meta.full_name(),
                values.len()
            ))
            .into());
        }
        let (part, tail) = rest.split_at(count);
        rest = tail;
        if part.iter().any(Value::is_null) {
            return Err(OrmError::mapping(format!(
                "The primary key `{}` of `{}` is not set",
                column.name,
                meta.full_name()
            ))
            .into());
        }
        let right = if column.is_foreign_key() {
            Operand::Key(ForeignKey(part.to_vec()))
        } else {
            Operand::Value(part[0].clone())
        };
        let leaf = Node::Leaf(Leaf {
            left: Some(KeyPath::new(vec![column.field])),
            operator: Operator::Eq,
            right,
        });
        result = Some(match result {
            Some(node) => Node::And(Box::new(node), Box::new(leaf)),
            None => leaf,
        });
    }
    result.ok_or_else(|| {
        OrmError::mapping(format!("The table `{}` has no primary key", meta.full_name())).into()
    })
}
