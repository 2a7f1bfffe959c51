use crate::{AsValue, Connection, MetaDatabase, OrmError, Result, Value, writer::Context};
use std::sync::{Mutex, PoisonError};

/// Durable row of the sequence table.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRow {
    /// Upper bound of the last reserved window.
    pub seq: i64,
    /// Window size used to reserve keys.
    pub cache: i32,
    /// Highest value allowed, zero when unbounded.
    pub max_value: i64,
}

/// In memory window of reserved keys.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    /// Last value returned.
    pub sequence: i64,
    /// Last value of the reserved window.
    pub limit: i64,
    pub max_value: i64,
}

/// Primary key generator reserving windows of keys from a row of the sequence table.
///
/// The window bookkeeping is committed on the connection passed in, which must
/// not be the one running the business transaction.
#[derive(Debug)]
pub struct Sequencer {
    id: String,
    window: i32,
    max: i64,
    state: Mutex<SequenceState>,
}

impl Sequencer {
    pub fn new(id: impl Into<String>, window: i32, max: i64) -> Self {
        Self {
            id: id.into(),
            window: window.max(1),
            max: max.max(0),
            state: Mutex::new(SequenceState::default()),
        }
    }

    /// Row identifier inside the sequence table.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn window(&self) -> i32 {
        self.window
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Next key, a database round-trip happens only when the window is exhausted.
    pub fn next_value(&self, database: &MetaDatabase, connection: &mut dyn Connection) -> Result<i64> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.sequence < state.limit {
            state.sequence += 1;
            return Ok(state.sequence);
        }
        match self.refill(database, connection) {
            Ok(refilled) => {
                log::debug!(
                    "Sequence `{}` reserved the keys {}..={}",
                    self.id,
                    refilled.sequence,
                    refilled.limit
                );
                *state = refilled;
                Ok(state.sequence)
            }
            Err(e) => {
                if let Err(rollback) = connection.rollback() {
                    log::warn!("Rollback of the sequence connection failed: {:#}", rollback);
                }
                log::error!("{:#}", e);
                Err(e)
            }
        }
    }

    fn refill(&self, database: &MetaDatabase, connection: &mut dyn Connection) -> Result<SequenceState> {
        let writer = database.writer();
        let table = database.sequence_table();
        let id = [Value::Varchar(Some(self.id.clone()))];
        let mut context = Context::default();
        let mut sql = String::with_capacity(96);
        writer.write_sequence_next(&mut context, &mut sql, &table);
        let affected = self.execute(connection, &sql, &id)?;
        if affected == 0 {
            sql.clear();
            writer.write_sequence_init(&mut context, &mut sql, &table, self.window, self.max);
            self.execute(connection, &sql, &id)?;
        }
        let Some(row) = self.read_row(database, connection)? else {
            return Err(OrmError::sequence(format!(
                "The row `{}` of the sequence table {} is missing",
                self.id, table
            ))
            .into());
        };
        if row.cache < 1 {
            return Err(OrmError::sequence(format!(
                "The row `{}` of the sequence table {} has the invalid window {}",
                self.id, table, row.cache
            ))
            .into());
        }
        let mut limit = row.seq;
        let sequence = limit - row.cache as i64 + 1;
        if row.max_value != 0 {
            if limit > row.max_value {
                limit = row.max_value;
                if sequence > row.max_value {
                    return Err(OrmError::sequence(format!(
                        "The sequence `{}` needs to raise the maximum value: {}",
                        self.id, row.max_value
                    ))
                    .into());
                }
                sql.clear();
                writer.write_sequence_set_max(&mut context, &mut sql, &table);
                self.execute(connection, &sql, &id)?;
            }
            if row.max_value > i64::MAX - row.cache as i64 {
                log::warn!(
                    "The maximum value of the sequence `{}` is too high, the recommended maximum is {}",
                    self.id,
                    i64::MAX - row.cache as i64
                );
            }
        }
        connection.commit()?;
        Ok(SequenceState {
            sequence,
            limit,
            max_value: row.max_value,
        })
    }

    fn execute(&self, connection: &mut dyn Connection, sql: &str, values: &[Value]) -> Result<u64> {
        log::info!("{}; [{}]", sql, self.id);
        connection
            .execute(sql, values)
            .map(|v| v.rows_affected)
            .map_err(|e| {
                e.context(OrmError::SqlExecution {
                    sql: sql.to_string(),
                    values: self.id.clone(),
                })
            })
    }

    fn read_row(&self, database: &MetaDatabase, connection: &mut dyn Connection) -> Result<Option<SequenceRow>> {
        let mut sql = String::with_capacity(64);
        database.writer().write_sequence_current(
            &mut Context::default(),
            &mut sql,
            &database.sequence_table(),
        );
        log::info!("{}; [{}]", sql, self.id);
        let rows = connection
            .query(&sql, &[Value::Varchar(Some(self.id.clone()))], Some(1), None)
            .map_err(|e| {
                e.context(OrmError::SqlExecution {
                    sql: sql.clone(),
                    values: self.id.clone(),
                })
            })?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let mut values = row.values.into_vec().into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Some(SequenceRow {
            seq: i64::try_from_value(next())?,
            cache: i32::try_from_value(next())?,
            max_value: Option::<i64>::try_from_value(next())?.unwrap_or(0),
        }))
    }

    /// Durable state of the sequence row, `None` before the first allocation.
    pub fn current_state(
        &self,
        database: &MetaDatabase,
        connection: &mut dyn Connection,
    ) -> Result<Option<SequenceRow>> {
        self.read_row(database, connection)
    }

    /// Reserved window held in memory.
    pub fn cached_state(&self) -> SequenceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the reserved window, the next call reads the database again.
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SequenceState::default();
    }
}
