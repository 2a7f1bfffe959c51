use crate::{
    ColumnId, Criterion, CriterionDecoder, Entity, EntityRef, FieldRef, Order, OrmError, OrmHandler,
    Result, SelectStatement, Session, TableId,
};
use std::{cell::OnceCell, fmt, sync::Arc};

/// Rows remaining after skipping `offset` rows of `count`, capped by `limit`.
pub fn limited_count(count: u64, offset: u64, limit: Option<u64>) -> u64 {
    let remaining = count.saturating_sub(offset);
    match limit {
        Some(limit) if limit < remaining => limit,
        _ => remaining,
    }
}

/// Parameterized SELECT over the entity `E`.
///
/// Every builder method discards the compiled criterion, which is rebuilt on
/// the next execution.
pub struct Query<E> {
    handler: Arc<OrmHandler>,
    table: TableId,
    criterion: Option<Criterion<E>>,
    order: Vec<Order<E>>,
    columns: Vec<FieldRef>,
    limit: Option<u64>,
    offset: u64,
    fetch_size: Option<u32>,
    lock: bool,
    distinct: bool,
    decoder: OnceCell<CriterionDecoder>,
}

impl<E: Entity> Query<E> {
    pub fn new(handler: Arc<OrmHandler>, criterion: Option<Criterion<E>>) -> Result<Self> {
        let table = handler.table_of::<E>()?.id;
        Ok(Self {
            handler,
            table,
            criterion,
            order: Vec::new(),
            columns: Vec::new(),
            limit: None,
            offset: 0,
            fetch_size: None,
            lock: false,
            distinct: false,
            decoder: OnceCell::new(),
        })
    }

    fn changed(mut self) -> Self {
        self.decoder = OnceCell::new();
        self
    }

    /// Replace the criterion.
    pub fn criterion(mut self, criterion: Criterion<E>) -> Self {
        self.criterion = Some(criterion);
        self.changed()
    }

    /// Combine the criterion with `criterion` using AND.
    pub fn add_criterion(mut self, criterion: Criterion<E>) -> Self {
        self.criterion = Some(match self.criterion.take() {
            Some(current) => current.and(criterion),
            None => criterion,
        });
        self.changed()
    }

    pub fn order_by(mut self, order: impl IntoIterator<Item = Order<E>>) -> Self {
        self.order = order.into_iter().collect();
        self.changed()
    }

    pub fn add_order_by(mut self, order: Order<E>) -> Self {
        self.order.push(order);
        self.changed()
    }

    /// Fetch only these fields, the primary key is always fetched.
    pub fn columns(mut self, columns: impl IntoIterator<Item = FieldRef>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn fetch_size(mut self, size: u32) -> Self {
        self.fetch_size = Some(size);
        self
    }

    /// Lock the selected rows until the end of the transaction.
    pub fn lock_request(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn handler(&self) -> &Arc<OrmHandler> {
        &self.handler
    }

    pub fn criterion_ref(&self) -> Option<&Criterion<E>> {
        self.criterion.as_ref()
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn get_offset(&self) -> u64 {
        self.offset
    }

    pub fn get_fetch_size(&self) -> Option<u32> {
        self.fetch_size
    }

    /// Compiled criterion, built once until the query changes.
    pub fn decoder(&self) -> Result<&CriterionDecoder> {
        if let Some(decoder) = self.decoder.get() {
            return Ok(decoder);
        }
        let decoder = CriterionDecoder::new(
            &self.handler,
            self.table,
            self.criterion.as_ref().map(Criterion::node),
            self.order.iter().map(|v| (&v.path, v.ascending)),
        )?;
        Ok(self.decoder.get_or_init(|| decoder))
    }

    /// Columns of the SELECT list, empty when every column is fetched.
    pub fn selected_columns(&self) -> Result<Vec<ColumnId>> {
        if self.columns.is_empty() || self.handler.table(self.table).is_view() {
            return Ok(Vec::new());
        }
        let mut result: Vec<ColumnId> = self.handler.table(self.table).pkey.columns.clone();
        for field in &self.columns {
            let column = self.handler.find_column(field)?;
            if column.table != self.table {
                return Err(OrmError::mapping(format!(
                    "The key {:?} does not belong to the queried table `{}`",
                    field,
                    self.handler.table(self.table).full_name()
                ))
                .into());
            }
            if !result.contains(&column.id) {
                result.push(column.id);
            }
        }
        Ok(result)
    }

    /// SELECT text and the values to bind.
    pub fn sql(&self) -> Result<(String, Vec<crate::Value>)> {
        let decoder = self.decoder()?;
        let columns = self.selected_columns()?;
        let select = self.statement(decoder, &columns);
        let mut sql = String::with_capacity(128);
        self.handler
            .writer(self.handler.table(self.table).database)
            .write_select(&self.handler, &mut sql, &select);
        Ok((sql, decoder.values()))
    }

    pub(crate) fn statement<'a>(&self, decoder: &'a CriterionDecoder, columns: &'a [ColumnId]) -> SelectStatement<'a> {
        SelectStatement {
            decoder,
            columns,
            distinct: self.distinct,
            limit: self.limit,
            offset: self.offset,
            lock: self.lock,
        }
    }

    /// All the matching entities.
    pub fn list(&self, session: &mut Session) -> Result<Vec<EntityRef<E>>>
    where
        E: Default,
    {
        session.select(self, self.limit)
    }

    /// First matching entity, `None` when nothing matches.
    pub fn first(&self, session: &mut Session) -> Result<Option<EntityRef<E>>>
    where
        E: Default,
    {
        let limit = Some(self.limit.map_or(1, |v| v.min(1)));
        Ok(session.select(self, limit)?.into_iter().next())
    }

    /// The only matching entity, a second row raises [`OrmError::AmbiguousResult`].
    pub fn unique_result(&self, session: &mut Session) -> Result<Option<EntityRef<E>>>
    where
        E: Default,
    {
        let mut rows = session.select(self, Some(2))?.into_iter();
        let first = rows.next();
        if rows.next().is_some() {
            let error: crate::Error = OrmError::AmbiguousResult(format!(
                "The query on `{}` returned more than one row",
                self.handler.table(self.table).full_name()
            ))
            .into();
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(first)
    }

    /// True when at least one row matches.
    pub fn exists(&self, session: &mut Session) -> Result<bool> {
        session.select_exists(self)
    }

    /// Number of matching rows ignoring limit and offset.
    pub fn count(&self, session: &mut Session) -> Result<u64> {
        session.select_count(self)
    }

    /// Number of rows `list` would return.
    pub fn limited_count(&self, session: &mut Session) -> Result<u64> {
        Ok(limited_count(self.count(session)?, self.offset, self.limit))
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table)
            .field("criterion", &self.criterion)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("lock", &self.lock)
            .field("distinct", &self.distinct)
            .finish()
    }
}
