use crate::{CBox, error_message_from_ptr};
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, c_int},
    os::raw::{c_char, c_void},
};
use trove_core::{Error, Result, Value, temporal_to_text, truncate_long};

/// Statement compiled on a connection, parameters bound left to right.
pub(crate) struct SqlitePrepared {
    pub(crate) statement: CBox<*mut sqlite3_stmt>,
    index: c_int,
}

impl SqlitePrepared {
    pub(crate) fn new(statement: CBox<*mut sqlite3_stmt>) -> Self {
        unsafe {
            sqlite3_clear_bindings(*statement);
        }
        Self {
            statement,
            index: 1,
        }
    }

    pub(crate) fn bind_all(&mut self, values: &[Value]) -> Result<()> {
        let expected = unsafe { sqlite3_bind_parameter_count(*self.statement) } as usize;
        if expected != values.len() {
            return Err(Error::msg(format!(
                "The statement expects {} parameters but {} values were given",
                expected,
                values.len()
            )));
        }
        for value in values {
            self.bind(value)?;
        }
        Ok(())
    }

    fn bind_text(&mut self, index: c_int, value: &str) -> c_int {
        unsafe {
            sqlite3_bind_text(
                *self.statement,
                index,
                value.as_ptr() as *const c_char,
                value.len() as c_int,
                SQLITE_TRANSIENT(),
            )
        }
    }

    pub(crate) fn bind(&mut self, value: &Value) -> Result<&mut Self> {
        let index = self.index;
        let statement = *self.statement;
        let rc = unsafe {
            match value {
                v if v.is_null() => sqlite3_bind_null(statement, index),
                Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
                Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
                Value::Decimal(Some(v)) => {
                    let v = v.to_string();
                    self.bind_text(index, &v)
                }
                Value::Char(Some(v)) => {
                    let v = v.to_string();
                    self.bind_text(index, &v)
                }
                Value::Varchar(Some(v)) => self.bind_text(index, v),
                Value::Blob(Some(v)) => sqlite3_bind_blob(
                    statement,
                    index,
                    v.as_ptr() as *const c_void,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                Value::Date(..) | Value::Time(..) | Value::Timestamp(..) => {
                    let v = temporal_to_text(value).unwrap_or_default();
                    self.bind_text(index, &v)
                }
                Value::Uuid(Some(v)) => {
                    let v = v.to_string();
                    self.bind_text(index, &v)
                }
                _ => {
                    let error = Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        };
        if rc != SQLITE_OK {
            let error = unsafe {
                let db = sqlite3_db_handle(statement);
                let query = sqlite3_sql(statement);
                Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string()).context(format!(
                    "Cannot bind parameter {} to query:\n{}",
                    index,
                    truncate_long!(CStr::from_ptr(query).to_string_lossy())
                ))
            };
            log::error!("{:#}", error);
            return Err(error);
        }
        self.index = index + 1;
        Ok(self)
    }
}
