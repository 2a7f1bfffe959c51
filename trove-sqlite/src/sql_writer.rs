use std::fmt::Write;
use trove_core::{
    ColumnId, DbType, MetaColumn, MetaTable, OrmHandler, SqlWriter, Value, WriterContext as Context,
};

/// Sqlite dialect: storage classes instead of sized types, no schemas and no comments.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter;

impl SqliteSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write_table_ref(&self, context: &mut Context, out: &mut String, table: &MetaTable, alias: &str) {
        self.write_table_name(context, out, table);
        if self.alias_declaration(context) && !alias.is_empty() {
            out.push_str(" AS ");
            self.write_identifier(context, out, alias);
        }
    }

    fn type_name(&self, db_type: DbType) -> &'static str {
        match db_type {
            DbType::Boolean | DbType::SmallInt | DbType::Int | DbType::BigInt => "INTEGER",
            DbType::Decimal => "NUMERIC",
            DbType::Double => "REAL",
            DbType::Blob => "BLOB",
            DbType::Char
            | DbType::Varchar
            | DbType::Clob
            | DbType::Date
            | DbType::Time
            | DbType::Timestamp
            | DbType::Uuid => "TEXT",
        }
    }

    fn write_column_type(
        &self,
        _context: &mut Context,
        out: &mut String,
        db_type: DbType,
        _max_length: i32,
        _precision: i32,
    ) {
        out.push_str(self.type_name(db_type));
    }

    fn write_create_schema(&self, _out: &mut String, _schema: &str) {
        // Sqlite does not support schema
    }

    fn inline_foreign_keys(&self) -> bool {
        true
    }

    fn write_column_comment_inline(&self, _context: &mut Context, _out: &mut String, _column: &MetaColumn) {}

    fn write_table_comment(&self, _out: &mut String, _table: &MetaTable) {}

    fn write_column_comment(&self, _handler: &OrmHandler, _out: &mut String, _column: ColumnId) {}

    fn write_column_names_query(&self, out: &mut String, _schema: &str, table: &str) -> Vec<Value> {
        let mut context = Context::default();
        out.push_str("SELECT name FROM pragma_table_info(");
        self.write_placeholder(&mut context, out);
        out.push(')');
        vec![Value::Varchar(Some(table.to_string()))]
    }

    fn write_pagination(&self, _context: &mut Context, out: &mut String, limit: Option<u64>, offset: u64) {
        if offset == 0 {
            return;
        }
        let _ = match limit {
            Some(limit) => write!(out, "\n\tLIMIT {} OFFSET {}", limit, offset),
            None => write!(out, "\n\tLIMIT -1 OFFSET {}", offset),
        };
    }

    fn write_lock(&self, _context: &mut Context, _out: &mut String) {
        // Sqlite locks the whole database on write
    }
}
