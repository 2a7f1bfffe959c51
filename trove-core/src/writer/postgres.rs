use super::{ansi_operator_template, unsupported_operator};
use crate::{DbType, Operator, Result, SqlWriter};

/// PostgreSQL dialect.
#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter;

impl PostgresSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn type_name(&self, db_type: DbType) -> &'static str {
        match db_type {
            DbType::Double => "DOUBLE PRECISION",
            DbType::Clob => "TEXT",
            DbType::Blob => "BYTEA",
            _ => db_type.name(),
        }
    }

    fn operator_template(&self, operator: Operator) -> Result<&'static str> {
        match operator {
            Operator::Regexp => Ok("{0} ~ {1}"),
            Operator::NotRegexp => Ok("{0} !~ {1}"),
            _ => ansi_operator_template(operator)
                .ok_or_else(|| unsupported_operator(self.name(), operator)),
        }
    }
}
