use crate::{
    CBox, error_message_from_ptr,
    extract::{extract_name, extract_value},
    prepared::SqlitePrepared,
};
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_ROW,
    sqlite3, sqlite3_busy_timeout, sqlite3_changes64, sqlite3_close, sqlite3_column_count,
    sqlite3_errmsg, sqlite3_finalize, sqlite3_get_autocommit, sqlite3_last_insert_rowid,
    sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};
use std::{
    ffi::{CString, c_int},
    ptr,
    sync::Arc,
};
use trove_core::{Connection, Context, Error, Result, RowLabeled, RowsAffected, Value, truncate_long};

/// Milliseconds a statement waits on a locked database before failing.
pub const BUSY_TIMEOUT: c_int = 5000;

/// Blocking connection to a sqlite database file.
///
/// A transaction is started by the first statement and kept open until
/// `commit` or `rollback`.
pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    pub(crate) transaction: bool,
}

impl SqliteConnection {
    /// Open a database from a sqlite URI filename, `file:path?mode=rwc` or a plain path.
    pub fn open(location: &str) -> Result<Self> {
        let context = || format!("Error while opening the sqlite database `{}`", location);
        let location = if location.starts_with("file:") {
            location.to_string()
        } else {
            format!("file:{}", location)
        };
        let uri = CString::new(location).with_context(context)?;
        let mut connection: CBox<*mut sqlite3> = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close(p);
        });
        let rc = unsafe {
            sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let error = Error::msg(connection.last_error()).context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        unsafe {
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT);
        }
        log::debug!("Opened the sqlite database `{}`", uri.to_string_lossy());
        Ok(Self {
            connection,
            transaction: false,
        })
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction
    }

    fn prepare(&mut self, sql: &str) -> Result<SqlitePrepared> {
        let context = || format!("While preparing the query:\n{}", truncate_long!(sql));
        let query = CString::new(sql.as_bytes()).with_context(context)?;
        let mut statement: CBox<*mut sqlite3_stmt> = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_finalize(p);
        });
        let mut tail = ptr::null();
        let rc = unsafe {
            sqlite3_prepare_v2(
                *self.connection,
                query.as_ptr(),
                sql.len() as c_int,
                &mut *statement,
                &mut tail,
            )
        };
        if rc != SQLITE_OK {
            let error = Error::msg(self.connection.last_error()).context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        if statement.is_null() {
            return Err(Error::msg("The query does not contain any statement").context(context()));
        }
        let remaining = unsafe { tail.offset_from(query.as_ptr()) } as usize;
        if !sql.get(remaining..).unwrap_or_default().trim().is_empty() {
            let error =
                Error::msg("Cannot prepare more than one statement at a time").context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(SqlitePrepared::new(statement))
    }

    /// Run a statement outside of the lazy transaction bookkeeping.
    fn run_raw(&mut self, sql: &str) -> Result<()> {
        let prepared = self.prepare(sql)?;
        self.step_done(&prepared, sql)
    }

    fn step_done(&mut self, prepared: &SqlitePrepared, sql: &str) -> Result<()> {
        loop {
            match unsafe { sqlite3_step(*prepared.statement) } {
                SQLITE_DONE => return Ok(()),
                SQLITE_ROW => continue,
                _ => {
                    let error = Error::msg(self.connection.last_error())
                        .context(format!("While executing the query:\n{}", truncate_long!(sql)));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
    }

    fn begin(&mut self) -> Result<()> {
        if !self.transaction {
            self.run_raw("BEGIN")?;
            self.transaction = true;
        }
        Ok(())
    }

    fn end(&mut self, sql: &str) -> Result<()> {
        if !self.transaction {
            return Ok(());
        }
        // The database may have ended the transaction on its own after an error
        let result = if self.autocommit() {
            Ok(())
        } else {
            self.run_raw(sql)
        };
        self.transaction = !self.autocommit();
        result
    }

    fn autocommit(&self) -> bool {
        unsafe { sqlite3_get_autocommit(*self.connection) != 0 }
    }
}

trait LastError {
    fn last_error(&self) -> String;
}

impl LastError for CBox<*mut sqlite3> {
    fn last_error(&self) -> String {
        if self.ptr.is_null() {
            return "Unknown error (the connection could not be allocated)".into();
        }
        error_message_from_ptr(&unsafe { sqlite3_errmsg(self.ptr) }).to_string()
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, values: &[Value]) -> Result<RowsAffected> {
        self.begin()?;
        let mut prepared = self.prepare(sql)?;
        prepared.bind_all(values)?;
        self.step_done(&prepared, sql)?;
        let (rows_affected, last_affected_id) = unsafe {
            (
                sqlite3_changes64(*self.connection),
                sqlite3_last_insert_rowid(*self.connection),
            )
        };
        Ok(RowsAffected {
            rows_affected: rows_affected.max(0) as u64,
            last_affected_id: Some(last_affected_id),
        })
    }

    fn query(
        &mut self,
        sql: &str,
        values: &[Value],
        max_rows: Option<u64>,
        _fetch_size: Option<u32>,
    ) -> Result<Vec<RowLabeled>> {
        self.begin()?;
        let mut prepared = self.prepare(sql)?;
        prepared.bind_all(values)?;
        let statement = *prepared.statement;
        let count = unsafe { sqlite3_column_count(statement) };
        let labels = (0..count)
            .map(|i| extract_name(statement, i))
            .collect::<Result<Arc<[_]>>>()?;
        let mut result = Vec::new();
        while max_rows.is_none_or(|max| (result.len() as u64) < max) {
            match unsafe { sqlite3_step(statement) } {
                SQLITE_DONE => break,
                SQLITE_ROW => {
                    let values = (0..count)
                        .map(|i| extract_value(statement, i))
                        .collect::<Result<Box<[_]>>>()?;
                    result.push(RowLabeled::new(labels.clone(), values));
                }
                _ => {
                    let error = Error::msg(self.connection.last_error())
                        .context(format!("While fetching the query:\n{}", truncate_long!(sql)));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
        Ok(result)
    }

    fn commit(&mut self) -> Result<()> {
        self.end("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.end("ROLLBACK")
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        let result = self.rollback();
        let rc = unsafe { sqlite3_close(*self.connection) };
        if rc != SQLITE_OK {
            let error = Error::msg(self.connection.last_error()).context("While closing the sqlite database");
            log::error!("{:#}", error);
            return Err(error);
        }
        self.connection.ptr = ptr::null_mut();
        result
    }
}
