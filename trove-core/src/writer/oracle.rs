use crate::{
    ColumnId, DbType, OrmError, OrmHandler, Result, SelectStatement, SqlWriter, TableId,
    Value, separated_by,
    writer::{Context, Fragment},
};
use std::fmt::Write;

/// Oracle dialect: ROWNUM paging and `INSERT .. SELECT .. FROM DUAL` for multiple rows.
#[derive(Default, Debug, Clone, Copy)]
pub struct OracleSqlWriter;

impl OracleSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for OracleSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn name(&self) -> &'static str {
        "oracle"
    }

    fn type_name(&self, db_type: DbType) -> &'static str {
        match db_type {
            DbType::Boolean => "NUMBER(1)",
            DbType::SmallInt => "NUMBER(5)",
            DbType::Int => "NUMBER(10)",
            DbType::BigInt => "NUMBER(19)",
            DbType::Decimal => "NUMBER",
            DbType::Double => "BINARY_DOUBLE",
            DbType::Varchar => "VARCHAR2",
            DbType::Time => "TIMESTAMP",
            DbType::Uuid => "CHAR(36)",
            _ => db_type.name(),
        }
    }

    /// Schemas are users, they are not created here.
    fn write_create_schema(&self, _out: &mut String, _schema: &str) {}

    fn write_add_column(
        &self,
        handler: &OrmHandler,
        out: &mut String,
        column: ColumnId,
        physical: usize,
    ) -> Result<()> {
        let column = handler.column(column);
        let Some(physical) = column.physical.get(physical) else {
            return Err(OrmError::mapping(format!(
                "Column `{}` has no physical column {}",
                column.name, physical
            ))
            .into());
        };
        let mut context = Context::new(Fragment::SqlCreateTable, false);
        out.push_str("ALTER TABLE ");
        self.write_table_name(&mut context, out, handler.table(column.table));
        out.push_str(" ADD ");
        self.write_create_table_column(&mut context, out, column, physical, false);
        Ok(())
    }

    fn write_column_names_query(&self, out: &mut String, schema: &str, table: &str) -> Vec<Value> {
        let mut context = Context::new(Fragment::SqlSelect, false);
        let mut values = Vec::with_capacity(2);
        if schema.is_empty() {
            out.push_str("SELECT column_name FROM user_tab_columns WHERE ");
        } else {
            out.push_str("SELECT column_name FROM all_tab_columns WHERE owner=UPPER(");
            self.write_placeholder(&mut context, out);
            out.push_str(") AND ");
            values.push(Value::Varchar(Some(schema.to_string())));
        }
        out.push_str("table_name=UPPER(");
        self.write_placeholder(&mut context, out);
        out.push(')');
        values.push(Value::Varchar(Some(table.to_string())));
        values
    }

    fn write_insert(&self, handler: &OrmHandler, out: &mut String, table: TableId, rows: usize) -> Result<()> {
        if rows <= 1 {
            let mut single = String::new();
            crate::GenericSqlWriter.write_insert(handler, &mut single, table, 1)?;
            out.push_str(&single);
            return Ok(());
        }
        let table = handler.table(table);
        if table.is_view() {
            return Err(OrmError::mapping(format!("Cannot insert into the view `{}`", table.full_name())).into());
        }
        let mut context = Context::new(Fragment::SqlInsertInto, false);
        let columns: Vec<&str> = handler
            .columns_of(table.id)
            .flat_map(|c| c.physical_names())
            .collect();
        out.push_str("INSERT INTO ");
        self.write_table_name(&mut context, out, table);
        out.push_str(" (");
        separated_by(out, &columns, |out, v| self.write_identifier(&mut context, out, v), ", ");
        out.push(')');
        let mut context = context.switch_fragment(Fragment::SqlInsertIntoValues);
        for row in 0..rows {
            out.push_str(if row == 0 { "\n\tSELECT " } else { "\n\tUNION ALL SELECT " });
            separated_by(
                out,
                &columns,
                |out, _| self.write_placeholder(&mut context.current, out),
                ", ",
            );
            out.push_str(" FROM DUAL");
        }
        Ok(())
    }

    fn write_pagination(&self, _context: &mut Context, _out: &mut String, _limit: Option<u64>, _offset: u64) {}

    fn write_select(&self, handler: &OrmHandler, out: &mut String, select: &SelectStatement) {
        if select.offset == 0 {
            self.write_select_body(handler, out, select, true);
            if select.lock {
                self.write_lock(&mut Context::default(), out);
            }
            return;
        }
        out.push_str("SELECT * FROM (SELECT t_.*, ROWNUM rownum_ FROM (\n");
        self.write_select_body(handler, out, select, true);
        out.push_str("\n) t_");
        if let Some(limit) = select.limit {
            let _ = write!(out, " WHERE ROWNUM <= {}", limit.saturating_add(select.offset));
        }
        let _ = write!(out, ") WHERE rownum_ > {}", select.offset);
    }
}
