use crate::{OrmError, Result, Value};
use std::fmt::{self, Display};

/// Portable column type, each dialect decides the final spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Boolean,
    Char,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Double,
    Varchar,
    Clob,
    Date,
    Time,
    Timestamp,
    Blob,
    Uuid,
}

impl DbType {
    /// Type, default length and default precision inferred from a value prototype.
    pub fn infer(prototype: &Value) -> (DbType, i32, i32) {
        match prototype {
            Value::Boolean(..) => (DbType::Boolean, -1, -1),
            Value::Int8(..) | Value::Char(..) => (DbType::Char, -1, -1),
            Value::Int16(..) => (DbType::SmallInt, -1, -1),
            Value::Int32(..) => (DbType::Int, -1, -1),
            Value::Int64(..) => (DbType::BigInt, -1, -1),
            Value::Float64(..) | Value::Decimal(..) => (DbType::Decimal, 8, 2),
            Value::Varchar(..) | Value::Null => (DbType::Varchar, 128, -1),
            Value::Date(..) => (DbType::Date, -1, -1),
            Value::Time(..) => (DbType::Time, -1, -1),
            Value::Timestamp(..) => (DbType::Timestamp, -1, -1),
            Value::Blob(..) => (DbType::Blob, -1, -1),
            Value::Uuid(..) => (DbType::Uuid, -1, -1),
        }
    }

    /// Parse an explicit type name.
    pub fn parse(name: &str) -> Result<DbType> {
        Ok(match name.trim().to_ascii_uppercase().as_str() {
            "BOOLEAN" | "BOOL" => DbType::Boolean,
            "CHAR" => DbType::Char,
            "SMALLINT" => DbType::SmallInt,
            "INT" | "INTEGER" => DbType::Int,
            "BIGINT" => DbType::BigInt,
            "DECIMAL" | "NUMERIC" => DbType::Decimal,
            "DOUBLE" | "FLOAT" | "REAL" => DbType::Double,
            "VARCHAR" => DbType::Varchar,
            "CLOB" | "TEXT" => DbType::Clob,
            "DATE" => DbType::Date,
            "TIME" => DbType::Time,
            "TIMESTAMP" => DbType::Timestamp,
            "BLOB" => DbType::Blob,
            "UUID" => DbType::Uuid,
            _ => {
                return Err(OrmError::mapping(format!("Unknown database type `{}`", name)).into());
            }
        })
    }

    /// Whether a declared length is printed after the type name.
    pub fn takes_length(&self) -> bool {
        !matches!(
            self,
            DbType::SmallInt | DbType::Int | DbType::BigInt | DbType::Date | DbType::Time | DbType::Timestamp
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, DbType::SmallInt | DbType::Int | DbType::BigInt)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DbType::Boolean => "BOOLEAN",
            DbType::Char => "CHAR",
            DbType::SmallInt => "SMALLINT",
            DbType::Int => "INT",
            DbType::BigInt => "BIGINT",
            DbType::Decimal => "DECIMAL",
            DbType::Double => "DOUBLE",
            DbType::Varchar => "VARCHAR",
            DbType::Clob => "CLOB",
            DbType::Date => "DATE",
            DbType::Time => "TIME",
            DbType::Timestamp => "TIMESTAMP",
            DbType::Blob => "BLOB",
            DbType::Uuid => "UUID",
        }
    }
}

impl Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
