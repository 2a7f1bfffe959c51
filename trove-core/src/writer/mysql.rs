use super::{ansi_operator_template, unsupported_operator};
use crate::{
    CriterionDecoder, DbType, MetaColumn, MetaTable, Operator, OrmError, OrmHandler, Result,
    SqlWriter, Value, separated_by,
    writer::{Context, Fragment},
};

/// MySQL and MariaDB dialect.
#[derive(Default, Debug, Clone, Copy)]
pub struct MySqlSqlWriter;

impl MySqlSqlWriter {
    pub fn new() -> Self {
        Self {}
    }

    /// `table alias, other alias` list of a multi-table UPDATE or DELETE.
    fn write_table_list(
        &self,
        handler: &OrmHandler,
        context: &mut Context,
        out: &mut String,
        decoder: &CriterionDecoder,
    ) {
        separated_by(
            out,
            decoder.tables(),
            |out, v| self.write_table_ref(context, out, handler.table(v.table), &v.alias),
            ", ",
        );
    }

    fn write_where(&self, out: &mut String, decoder: &CriterionDecoder) {
        if !decoder.where_text().is_empty() {
            out.push_str("\n\tWHERE ");
            out.push_str(decoder.where_text());
        }
    }
}

impl SqlWriter for MySqlSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn name(&self) -> &'static str {
        "mysql"
    }

    fn type_name(&self, db_type: DbType) -> &'static str {
        match db_type {
            DbType::Timestamp => "DATETIME",
            DbType::Clob => "LONGTEXT",
            DbType::Blob => "LONGBLOB",
            DbType::Uuid => "CHAR(36)",
            _ => db_type.name(),
        }
    }

    fn operator_template(&self, operator: Operator) -> Result<&'static str> {
        match operator {
            Operator::Regexp => Ok("{0} REGEXP {1}"),
            Operator::NotRegexp => Ok("{0} NOT REGEXP {1}"),
            _ => ansi_operator_template(operator)
                .ok_or_else(|| unsupported_operator(self.name(), operator)),
        }
    }

    fn write_column_comment_inline(&self, context: &mut Context, out: &mut String, column: &MetaColumn) {
        if !column.comment.is_empty() {
            out.push_str(" COMMENT ");
            self.write_value_string(context, out, &column.comment);
        }
    }

    fn write_column_comment(&self, _handler: &OrmHandler, _out: &mut String, _column: crate::ColumnId) {}

    fn write_table_comment(&self, out: &mut String, table: &MetaTable) {
        let mut context = Context::new(Fragment::SqlCommentOn, false);
        out.push_str("ALTER TABLE ");
        self.write_table_name(&mut context, out, table);
        out.push_str(" COMMENT = ");
        self.write_value_string(&mut context, out, &table.comment);
    }

    fn write_column_names_query(&self, out: &mut String, schema: &str, table: &str) -> Vec<Value> {
        let mut context = Context::new(Fragment::SqlSelect, false);
        out.push_str("SELECT column_name FROM information_schema.columns WHERE table_schema=");
        let mut values = Vec::with_capacity(2);
        if schema.is_empty() {
            out.push_str("DATABASE()");
        } else {
            self.write_placeholder(&mut context, out);
            values.push(Value::Varchar(Some(schema.to_string())));
        }
        out.push_str(" AND table_name=");
        self.write_placeholder(&mut context, out);
        values.push(Value::Varchar(Some(table.to_string())));
        values
    }

    fn write_update(
        &self,
        handler: &OrmHandler,
        out: &mut String,
        decoder: &CriterionDecoder,
        changed: &[crate::ColumnId],
    ) -> Result<()> {
        let base = decoder.base();
        let table = handler.table(base.table);
        if table.is_view() {
            return Err(OrmError::mapping(format!("Cannot update the view `{}`", table.full_name())).into());
        }
        if let Some(column) = changed.iter().map(|c| handler.column(*c)).find(|c| c.primary_key) {
            return Err(OrmError::mapping(format!(
                "The primary key `{}` of `{}` cannot be updated",
                column.name,
                table.full_name()
            ))
            .into());
        }
        let mut context = Context::new(Fragment::SqlUpdate, true);
        out.push_str("UPDATE ");
        self.write_table_list(handler, &mut context, out, decoder);
        out.push_str("\n\tSET ");
        let mut context = context.switch_fragment(Fragment::SqlUpdateSet);
        separated_by(
            out,
            changed.iter().flat_map(|c| handler.column(*c).physical_names()),
            |out, v| {
                self.write_column_ref(&mut context.current, out, &base.alias, v);
                out.push('=');
                self.write_placeholder(&mut context.current, out);
            },
            ", ",
        );
        self.write_where(out, decoder);
        Ok(())
    }

    fn write_delete(&self, handler: &OrmHandler, out: &mut String, decoder: &CriterionDecoder) -> Result<()> {
        let base = decoder.base();
        let table = handler.table(base.table);
        if table.is_view() {
            return Err(OrmError::mapping(format!("Cannot delete from the view `{}`", table.full_name())).into());
        }
        let mut context = Context::new(Fragment::SqlDeleteFrom, true);
        out.push_str("DELETE ");
        self.write_identifier(&mut context, out, &base.alias);
        out.push_str(" FROM ");
        self.write_table_list(handler, &mut context, out, decoder);
        self.write_where(out, decoder);
        Ok(())
    }

    fn write_pagination(&self, _context: &mut Context, out: &mut String, limit: Option<u64>, offset: u64) {
        if offset == 0 {
            return;
        }
        out.push_str("\n\tLIMIT ");
        out.push_str(itoa::Buffer::new().format(limit.unwrap_or(u64::MAX)));
        out.push_str(" OFFSET ");
        out.push_str(itoa::Buffer::new().format(offset));
    }
}
