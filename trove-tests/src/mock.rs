use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use trove::{
    Connection, Driver, Error, GenericSqlWriter, MetaDatabase, Result, RowLabeled, RowNames,
    RowsAffected, SqlWriter, Value, metamodel::SEQUENCE_TABLE,
};

/// Statement received by a [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockStatement {
    /// Connection number, in opening order starting at 0.
    pub connection: usize,
    pub sql: String,
    pub values: Vec<Value>,
}

impl MockStatement {
    pub fn is_sequence(&self) -> bool {
        self.sql.contains(SEQUENCE_TABLE)
    }
}

/// Row of the simulated sequence table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockSequence {
    pub seq: i64,
    pub cache: i64,
    pub max_value: i64,
}

/// Everything the mock connections observed, shared by all of them.
#[derive(Debug, Default)]
pub struct MockState {
    pub statements: Vec<MockStatement>,
    pub connections: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closed: usize,
    pub sequences: BTreeMap<String, MockSequence>,
    rows: VecDeque<Vec<Vec<Value>>>,
    affected: VecDeque<u64>,
    failures: Vec<String>,
    fail_commit: bool,
    fail_rollbacks: usize,
}

impl MockState {
    /// Statements outside the sequence table.
    pub fn business(&self) -> Vec<&MockStatement> {
        self.statements.iter().filter(|v| !v.is_sequence()).collect()
    }

    /// Number of windows reserved from the sequence table.
    pub fn sequence_round_trips(&self) -> usize {
        self.statements
            .iter()
            .filter(|v| v.sql.contains("SET seq=seq+cache"))
            .count()
    }
}

/// In-memory driver answering with scripted rows and simulating the sequence table.
#[derive(Clone)]
pub struct MockDriver {
    writer: Arc<dyn SqlWriter>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::with_writer(Arc::new(GenericSqlWriter::new()))
    }

    pub fn with_writer(writer: Arc<dyn SqlWriter>) -> Self {
        Self {
            writer,
            state: Default::default(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows returned by the next query not aimed at the sequence table.
    pub fn push_rows(&self, rows: Vec<Vec<Value>>) {
        self.state().rows.push_back(rows);
    }

    /// Affected count of the next data modification statement.
    pub fn push_affected(&self, rows: u64) {
        self.state().affected.push_back(rows);
    }

    /// Fail every statement containing `fragment`.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state().failures.push(fragment.into());
    }

    pub fn fail_commit(&self, fail: bool) {
        self.state().fail_commit = fail;
    }

    /// Fail the next `count` rollbacks.
    pub fn fail_rollback(&self, count: usize) {
        self.state().fail_rollbacks = count;
    }

    /// Text of the business statements, in execution order.
    pub fn sql(&self) -> Vec<String> {
        self.state().business().into_iter().map(|v| v.sql.clone()).collect()
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.statements.clear();
        state.rows.clear();
        state.affected.clear();
        state.failures.clear();
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn sql_writer(&self) -> Arc<dyn SqlWriter> {
        self.writer.clone()
    }

    fn connect(&self, _database: &MetaDatabase) -> Result<Box<dyn Connection>> {
        let mut state = self.state();
        let id = state.connections;
        state.connections += 1;
        Ok(Box::new(MockConnection {
            id,
            state: self.state.clone(),
        }))
    }
}

pub struct MockConnection {
    id: usize,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn record(&self, sql: &str, values: &[Value]) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.statements.push(MockStatement {
            connection: self.id,
            sql: sql.to_string(),
            values: values.to_vec(),
        });
        if state.failures.iter().any(|v| sql.contains(v.as_str())) {
            return Err(Error::msg(format!("Simulated failure of: {}", sql)));
        }
        Ok(state)
    }
}

fn sequence_id(values: &[Value]) -> String {
    match values.first() {
        Some(Value::Varchar(Some(v))) => v.clone(),
        _ => String::new(),
    }
}

/// Numbers following the placeholder of `VALUES (?,a,b[,c])`.
fn literal_numbers(sql: &str) -> Vec<i64> {
    sql.rsplit("VALUES (?,")
        .next()
        .unwrap_or_default()
        .trim_end_matches(')')
        .split(',')
        .filter_map(|v| v.trim().parse().ok())
        .collect()
}

impl Connection for MockConnection {
    fn execute(&mut self, sql: &str, values: &[Value]) -> Result<RowsAffected> {
        let mut state = self.record(sql, values)?;
        if sql.contains(SEQUENCE_TABLE) {
            let id = sequence_id(values);
            let rows = if sql.contains("SET seq=seq+cache") {
                match state.sequences.get_mut(&id) {
                    Some(row) => {
                        row.seq += row.cache;
                        1
                    }
                    None => 0,
                }
            } else if sql.contains("SET seq=maxvalue") {
                match state.sequences.get_mut(&id) {
                    Some(row) => {
                        row.seq = row.max_value;
                        1
                    }
                    None => 0,
                }
            } else if sql.starts_with("INSERT INTO") {
                let numbers = literal_numbers(sql);
                let row = MockSequence {
                    seq: numbers.first().copied().unwrap_or_default(),
                    cache: numbers.get(1).copied().unwrap_or_default(),
                    max_value: numbers.get(2).copied().unwrap_or_default(),
                };
                state.sequences.insert(id, row);
                1
            } else {
                0
            };
            return Ok(RowsAffected::new(rows));
        }
        Ok(RowsAffected::new(state.affected.pop_front().unwrap_or(1)))
    }

    fn query(
        &mut self,
        sql: &str,
        values: &[Value],
        max_rows: Option<u64>,
        _fetch_size: Option<u32>,
    ) -> Result<Vec<RowLabeled>> {
        let mut state = self.record(sql, values)?;
        if sql.starts_with("SELECT seq, cache, maxvalue") {
            let labels: RowNames = ["seq", "cache", "maxvalue"].map(String::from).into();
            return Ok(state
                .sequences
                .get(&sequence_id(values))
                .map(|row| {
                    RowLabeled::new(
                        labels,
                        [
                            Value::Int64(Some(row.seq)),
                            Value::Int64(Some(row.cache)),
                            Value::Int64(Some(row.max_value)),
                        ]
                        .into(),
                    )
                })
                .into_iter()
                .collect());
        }
        let rows = state.rows.pop_front().unwrap_or_default();
        let width = rows.first().map(Vec::len).unwrap_or_default();
        let labels: RowNames = (0..width).map(|i| format!("c{}", i)).collect();
        Ok(rows
            .into_iter()
            .take(max_rows.map_or(usize::MAX, |v| v as usize))
            .map(|v| RowLabeled::new(labels.clone(), v.into_boxed_slice()))
            .collect())
    }

    fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.fail_commit {
            return Err(Error::msg("Simulated commit failure"));
        }
        state.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.fail_rollbacks > 0 {
            state.fail_rollbacks -= 1;
            return Err(Error::msg("Simulated rollback failure"));
        }
        state.rollbacks += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).closed += 1;
        Ok(())
    }
}
