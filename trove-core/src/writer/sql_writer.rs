use crate::{
    ColumnId, CriterionDecoder, DbType, Error, MetaColumn, MetaDatabase, MetaIndex, MetaTable, Operator,
    OrmError, OrmHandler, Result, TableAlias, TableId, Value, metamodel::PhysicalColumn,
    metamodel::SEQUENCE_TABLE, separated_by, writer::Context, writer::Fragment,
};
use std::fmt::Write;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// SELECT request rendered by [`SqlWriter::write_select`].
#[derive(Debug, Clone, Copy)]
pub struct SelectStatement<'a> {
    pub decoder: &'a CriterionDecoder,
    /// Columns of the queried table, empty to fetch all of them.
    pub columns: &'a [ColumnId],
    pub distinct: bool,
    pub limit: Option<u64>,
    pub offset: u64,
    pub lock: bool,
}

impl<'a> SelectStatement<'a> {
    pub fn new(decoder: &'a CriterionDecoder) -> Self {
        Self {
            decoder,
            columns: &[],
            distinct: false,
            limit: None,
            offset: 0,
            lock: false,
        }
    }
}

/// Dialect printer turning the meta-model and decoded criteria into SQL text.
///
/// Every method only appends text to `out`, nothing here touches a connection.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    fn name(&self) -> &'static str;

    /// Whether the current fragment context allows alias declaration.
    fn alias_declaration(&self, context: &mut Context) -> bool {
        matches!(
            context.fragment,
            Fragment::SqlSelectFrom | Fragment::SqlDeleteFrom | Fragment::SqlUpdate
        )
    }

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + 1;
            }
        }
        out.push_str(&value[position..]);
    }

    /// Render and escape a string literal using single quotes.
    fn write_value_string(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('\'');
        self.write_escaped(context, out, value, '\'', "''");
        out.push('\'');
    }

    fn write_identifier(&self, _context: &mut Context, out: &mut String, value: &str) {
        out.push_str(value);
    }

    /// Table name qualified by its schema.
    fn write_table_name(&self, context: &mut Context, out: &mut String, table: &MetaTable) {
        if !table.schema.is_empty() {
            self.write_identifier(context, out, &table.schema);
            out.push('.');
        }
        self.write_identifier(context, out, &table.name);
    }

    /// Render a table reference, declaring the alias where the fragment allows it.
    fn write_table_ref(&self, context: &mut Context, out: &mut String, table: &MetaTable, alias: &str) {
        self.write_table_name(context, out, table);
        if self.alias_declaration(context) && !alias.is_empty() {
            out.push(' ');
            self.write_identifier(context, out, alias);
        }
    }

    fn write_column_ref(&self, context: &mut Context, out: &mut String, alias: &str, column: &str) {
        if context.qualify_columns && !alias.is_empty() {
            self.write_identifier(context, out, alias);
            out.push('.');
        }
        self.write_identifier(context, out, column);
    }

    fn type_name(&self, db_type: DbType) -> &'static str {
        db_type.name()
    }

    /// Render the type with its length and precision.
    fn write_column_type(
        &self,
        _context: &mut Context,
        out: &mut String,
        db_type: DbType,
        max_length: i32,
        precision: i32,
    ) {
        out.push_str(self.type_name(db_type));
        if db_type.takes_length() && max_length > 0 {
            out.push('(');
            write_integer!(out, max_length);
            if precision >= 0 {
                out.push(',');
                write_integer!(out, precision);
            }
            out.push(')');
        }
    }

    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        out.push('?');
    }

    /// Template of a comparison, `{0}` is the column and `{1}` the right operand.
    fn operator_template(&self, operator: Operator) -> Result<&'static str> {
        ansi_operator_template(operator).ok_or_else(|| unsupported_operator(self.name(), operator))
    }

    fn write_create_schema(&self, out: &mut String, schema: &str) {
        let mut context = Context::new(Fragment::SqlCreateSchema, false);
        out.push_str("CREATE SCHEMA IF NOT EXISTS ");
        self.write_identifier(&mut context, out, schema);
    }

    /// Foreign keys printed inside CREATE TABLE instead of separate ALTER statements.
    fn inline_foreign_keys(&self) -> bool {
        false
    }

    fn write_create_table(&self, handler: &OrmHandler, out: &mut String, table: TableId) -> Result<()> {
        let table = handler.table(table);
        if table.is_view() {
            return Err(OrmError::mapping(format!("`{}` is a view", table.full_name())).into());
        }
        let mut context = Context::new(Fragment::SqlCreateTable, false);
        out.reserve(64 + table.columns.len() * 40);
        out.push_str("CREATE TABLE ");
        self.write_table_name(&mut context, out, table);
        let single_pk = table.pkey.len() == 1
            && table
                .pkey
                .first()
                .is_some_and(|c| handler.column(c).physical_count() == 1);
        let mut first = true;
        for column in handler.columns_of(table.id) {
            for physical in &column.physical {
                out.push_str(if first { "\n\t( " } else { "\n\t, " });
                first = false;
                self.write_create_table_column(&mut context, out, column, physical, single_pk);
            }
        }
        if !single_pk {
            out.push_str("\n\t, PRIMARY KEY (");
            let mut context = context.switch_fragment(Fragment::SqlCreateTablePrimaryKey);
            separated_by(
                out,
                handler.pk_columns(table.id).flat_map(|c| c.physical_names()),
                |out, v| self.write_identifier(&mut context.current, out, v),
                ", ",
            );
            out.push(')');
        }
        if self.inline_foreign_keys() {
            for column in handler.columns_of(table.id).filter(|c| c.is_foreign_key()) {
                out.push_str("\n\t, ");
                let mut context = context.switch_fragment(Fragment::SqlCreateTableForeignKey);
                self.write_foreign_key_clause(handler, &mut context.current, out, column)?;
            }
        }
        out.push_str("\n\t)");
        Ok(())
    }

    fn write_create_table_column(
        &self,
        context: &mut Context,
        out: &mut String,
        column: &MetaColumn,
        physical: &PhysicalColumn,
        single_pk: bool,
    ) {
        self.write_identifier(context, out, &physical.name);
        out.push(' ');
        self.write_column_type(
            context,
            out,
            physical.db_type,
            physical.max_length,
            physical.precision,
        );
        if let Some(default) = &column.default_value {
            out.push_str(" DEFAULT ");
            out.push_str(default);
        }
        if column.mandatory {
            out.push_str(" NOT NULL");
        }
        if single_pk && column.primary_key {
            out.push_str(" PRIMARY KEY");
        }
        self.write_column_comment_inline(context, out, column);
    }

    /// Comment printed inside the column definition, for dialects without COMMENT ON.
    fn write_column_comment_inline(&self, _context: &mut Context, _out: &mut String, _column: &MetaColumn) {}

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
        out.push_str(" ADD COLUMN ");
        self.write_create_table_column(&mut context, out, column, physical, false);
        Ok(())
    }

    /// `FOREIGN KEY(..) REFERENCES table(..)` of a relation column.
    fn write_foreign_key_clause(
        &self,
        handler: &OrmHandler,
        context: &mut Context,
        out: &mut String,
        column: &MetaColumn,
    ) -> Result<()> {
        let Some(target) = column.foreign_table else {
            return Err(OrmError::mapping(format!("Column `{}` is not a foreign key", column.name)).into());
        };
        out.push_str("FOREIGN KEY(");
        separated_by(out, column.physical_names(), |out, v| self.write_identifier(context, out, v), ", ");
        out.push_str(")");
        out.push_str(if context.fragment == Fragment::SqlCreateTableForeignKey {
            " REFERENCES "
        } else {
            "\n\tREFERENCES "
        });
        self.write_table_name(context, out, handler.table(target));
        out.push('(');
        separated_by(
            out,
            column.physical.iter().filter_map(|p| p.target.as_deref()),
            |out, v| self.write_identifier(context, out, v),
            ", ",
        );
        out.push(')');
        Ok(())
    }

    fn write_foreign_key(&self, handler: &OrmHandler, out: &mut String, column: ColumnId) -> Result<()> {
        let column = handler.column(column);
        let mut context = Context::new(Fragment::SqlCreateTable, false);
        out.push_str("ALTER TABLE ");
        self.write_table_name(&mut context, out, handler.table(column.table));
        out.push_str("\n\tADD ");
        self.write_foreign_key_clause(handler, &mut context, out, column)
    }

    fn write_create_index(&self, handler: &OrmHandler, out: &mut String, table: TableId, index: &MetaIndex) {
        let mut context = Context::new(Fragment::SqlCreateIndex, false);
        out.push_str(if index.unique { "CREATE UNIQUE INDEX " } else { "CREATE INDEX " });
        self.write_identifier(&mut context, out, &index.name);
        out.push_str(" ON ");
        self.write_table_name(&mut context, out, handler.table(table));
        out.push_str(" (");
        separated_by(
            out,
            index.columns.iter().flat_map(|c| handler.column(*c).physical_names()),
            |out, v| self.write_identifier(&mut context, out, v),
            ", ",
        );
        out.push(')');
    }

    fn write_table_comment(&self, out: &mut String, table: &MetaTable) {
        let mut context = Context::new(Fragment::SqlCommentOn, false);
        out.push_str("COMMENT ON TABLE ");
        self.write_table_name(&mut context, out, table);
        out.push_str(" IS ");
        self.write_value_string(&mut context, out, &table.comment);
    }

    /// One statement per physical column, separated by `;\n`.
    fn write_column_comment(&self, handler: &OrmHandler, out: &mut String, column: ColumnId) {
        let column = handler.column(column);
        let table = handler.table(column.table);
        let mut context = Context::new(Fragment::SqlCommentOn, false);
        separated_by(
            out,
            column.physical_names(),
            |out, v| {
                out.push_str("COMMENT ON COLUMN ");
                self.write_table_name(&mut context, out, table);
                out.push('.');
                self.write_identifier(&mut context, out, v);
                out.push_str(" IS ");
                self.write_value_string(&mut context, out, &column.comment);
            },
            ";\n",
        );
    }

    fn write_sequence_table(&self, out: &mut String, database: &MetaDatabase, cache: i32) {
        let mut context = Context::new(Fragment::SqlCreateTable, false);
        out.push_str("CREATE TABLE ");
        if !database.schema.is_empty() {
            self.write_identifier(&mut context, out, &database.schema);
            out.push('.');
        }
        out.push_str(SEQUENCE_TABLE);
        out.push_str("\n\t( id ");
        self.write_column_type(&mut context, out, DbType::Varchar, 96, -1);
        out.push_str(" NOT NULL PRIMARY KEY\n\t, seq ");
        self.write_column_type(&mut context, out, DbType::BigInt, -1, -1);
        out.push_str(" DEFAULT ");
        write_integer!(out, cache);
        out.push_str(" NOT NULL\n\t, cache ");
        self.write_column_type(&mut context, out, DbType::Int, -1, -1);
        out.push_str(" DEFAULT ");
        write_integer!(out, cache);
        out.push_str(" NOT NULL\n\t, maxvalue ");
        self.write_column_type(&mut context, out, DbType::BigInt, -1, -1);
        out.push_str(" DEFAULT 0 NOT NULL\n\t)");
    }

    /// Insert the sequence row, the identifier is the only placeholder.
    fn write_sequence_init(&self, context: &mut Context, out: &mut String, table: &str, cache: i32, max: i64) {
        let _ = write!(out, "INSERT INTO {} (id,seq,cache", table);
        if max > 0 {
            out.push_str(",maxvalue");
        }
        out.push_str(") VALUES (");
        self.write_placeholder(context, out);
        let _ = write!(out, ",{},{}", cache, cache);
        if max > 0 {
            let _ = write!(out, ",{}", max);
        }
        out.push(')');
    }

    fn write_sequence_next(&self, context: &mut Context, out: &mut String, table: &str) {
        let _ = write!(out, "UPDATE {} SET seq=seq+cache WHERE id=", table);
        self.write_placeholder(context, out);
    }

    fn write_sequence_set_max(&self, context: &mut Context, out: &mut String, table: &str) {
        let _ = write!(out, "UPDATE {} SET seq=maxvalue WHERE id=", table);
        self.write_placeholder(context, out);
    }

    fn write_sequence_current(&self, context: &mut Context, out: &mut String, table: &str) {
        let _ = write!(out, "SELECT seq, cache, maxvalue FROM {} WHERE id=", table);
        self.write_placeholder(context, out);
    }

    /// Query listing the column names of an existing table, returns the values to bind.
    fn write_column_names_query(&self, out: &mut String, schema: &str, table: &str) -> Vec<Value> {
        let mut context = Context::new(Fragment::SqlSelect, false);
        out.push_str("SELECT column_name FROM information_schema.columns WHERE ");
        let mut values = Vec::with_capacity(2);
        if !schema.is_empty() {
            out.push_str("UPPER(table_schema)=UPPER(");
            self.write_placeholder(&mut context, out);
            out.push_str(") AND ");
            values.push(Value::Varchar(Some(schema.to_string())));
        }
        out.push_str("UPPER(table_name)=UPPER(");
        self.write_placeholder(&mut context, out);
        out.push(')');
        values.push(Value::Varchar(Some(table.to_string())));
        values
    }

    /// INSERT of `rows` rows listing every physical column of the table.
    fn write_insert(&self, handler: &OrmHandler, out: &mut String, table: TableId, rows: usize) -> Result<()> {
        let table = handler.table(table);
        if table.is_view() {
            return Err(OrmError::mapping(format!("Cannot insert into the view `{}`", table.full_name())).into());
        }
        let mut context = Context::new(Fragment::SqlInsertInto, false);
        let columns: Vec<&str> = handler
            .columns_of(table.id)
            .flat_map(|c| c.physical_names())
            .collect();
        out.reserve(32 + columns.len() * (12 + rows * 3));
        out.push_str("INSERT INTO ");
        self.write_table_name(&mut context, out, table);
        out.push_str(" (");
        separated_by(out, &columns, |out, v| self.write_identifier(&mut context, out, v), ", ");
        out.push_str(") VALUES");
        let mut context = context.switch_fragment(Fragment::SqlInsertIntoValues);
        for row in 0..rows.max(1) {
            out.push_str(match (row, rows > 1) {
                (0, false) => " (",
                (0, true) => "\n\t(",
                _ => ",\n\t(",
            });
            separated_by(
                out,
                &columns,
                |out, _| self.write_placeholder(&mut context.current, out),
                ", ",
            );
            out.push(')');
        }
        Ok(())
    }

    /// UPDATE of the `changed` columns, the SET placeholders come before the criterion ones.
    fn write_update(
        &self,
        handler: &OrmHandler,
        out: &mut String,
        decoder: &CriterionDecoder,
        changed: &[ColumnId],
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
        let mut context = Context::new(Fragment::SqlUpdate, false);
        out.push_str("UPDATE ");
        self.write_table_ref(&mut context, out, table, &base.alias);
        out.push_str("\n\tSET ");
        {
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
        }
        let mut context = context.switch_fragment(Fragment::SqlUpdateWhere);
        self.write_correlated_where(handler, &mut context.current, out, decoder);
        Ok(())
    }

    /// WHERE of an UPDATE or DELETE, related tables are reached through EXISTS.
    fn write_correlated_where(
        &self,
        handler: &OrmHandler,
        context: &mut Context,
        out: &mut String,
        decoder: &CriterionDecoder,
    ) {
        if decoder.where_text().is_empty() {
            return;
        }
        out.push_str("\n\tWHERE ");
        if decoder.has_relations() {
            out.push_str("EXISTS (SELECT 1 FROM ");
            let mut context = context.switch_fragment(Fragment::SqlSelectFrom);
            self.write_from_list(handler, &mut context.current, out, &decoder.tables()[1..]);
            out.push_str(" WHERE ");
            out.push_str(decoder.where_text());
            out.push(')');
        } else {
            out.push_str(decoder.where_text());
        }
    }

    fn write_delete(&self, handler: &OrmHandler, out: &mut String, decoder: &CriterionDecoder) -> Result<()> {
        let base = decoder.base();
        let table = handler.table(base.table);
        if table.is_view() {
            return Err(OrmError::mapping(format!("Cannot delete from the view `{}`", table.full_name())).into());
        }
        let mut context = Context::new(Fragment::SqlDeleteFrom, true);
        out.push_str("DELETE FROM ");
        self.write_table_ref(&mut context, out, table, &base.alias);
        let mut context = context.switch_fragment(Fragment::SqlDeleteFromWhere);
        self.write_correlated_where(handler, &mut context.current, out, decoder);
        Ok(())
    }

    fn write_from_list(&self, handler: &OrmHandler, context: &mut Context, out: &mut String, tables: &[TableAlias]) {
        separated_by(
            out,
            tables,
            |out, v| self.write_table_ref(context, out, handler.table(v.table), &v.alias),
            ", ",
        );
    }

    /// Selected column list, every physical column of the requested columns.
    fn write_select_columns(
        &self,
        handler: &OrmHandler,
        context: &mut Context,
        out: &mut String,
        select: &SelectStatement,
    ) {
        let base = select.decoder.base();
        let columns: Vec<&MetaColumn> = if select.columns.is_empty() {
            handler.columns_of(base.table).collect()
        } else {
            select.columns.iter().map(|c| handler.column(*c)).collect()
        };
        separated_by(
            out,
            columns.iter().flat_map(|c| c.physical_names()),
            |out, v| self.write_column_ref(context, out, &base.alias, v),
            ", ",
        );
    }

    /// SELECT without pagination nor lock.
    fn write_select_body(&self, handler: &OrmHandler, out: &mut String, select: &SelectStatement, ordered: bool) {
        let decoder = select.decoder;
        let table = handler.table(decoder.base().table);
        if let Some(view) = &table.select {
            out.push_str(if select.distinct { "SELECT DISTINCT " } else { "SELECT " });
            out.push_str(&view.select);
            out.push_str("\n\tFROM ");
            out.push_str(&view.from);
            match (view.where_.is_empty(), decoder.where_text().is_empty()) {
                (false, false) => {
                    let _ = write!(out, "\n\tWHERE ({}) AND {}", view.where_, decoder.where_text());
                }
                (false, true) => {
                    let _ = write!(out, "\n\tWHERE {}", view.where_);
                }
                (true, false) => {
                    let _ = write!(out, "\n\tWHERE {}", decoder.where_text());
                }
                (true, true) => {}
            }
            if !view.group.is_empty() {
                let _ = write!(out, "\n\tGROUP BY {}", view.group);
            }
            if ordered {
                if !decoder.order().is_empty() {
                    self.write_order_by(&mut Context::new(Fragment::SqlSelectOrderBy, true), out, select);
                } else if !view.order.is_empty() {
                    let _ = write!(out, "\n\tORDER BY {}", view.order);
                }
            }
            return;
        }
        let mut context = Context::new(Fragment::SqlSelect, true);
        out.reserve(128);
        out.push_str(if select.distinct { "SELECT DISTINCT " } else { "SELECT " });
        self.write_select_columns(handler, &mut context, out, select);
        out.push_str("\n\tFROM ");
        {
            let mut context = context.switch_fragment(Fragment::SqlSelectFrom);
            self.write_from_list(handler, &mut context.current, out, decoder.tables());
        }
        if !decoder.where_text().is_empty() {
            out.push_str("\n\tWHERE ");
            out.push_str(decoder.where_text());
        }
        if ordered && !decoder.order().is_empty() {
            let mut context = context.switch_fragment(Fragment::SqlSelectOrderBy);
            self.write_order_by(&mut context.current, out, select);
        }
    }

    fn write_order_by(&self, _context: &mut Context, out: &mut String, select: &SelectStatement) {
        out.push_str("\n\tORDER BY ");
        separated_by(
            out,
            select.decoder.order(),
            |out, v| {
                out.push_str(&v.column);
                if !v.ascending {
                    out.push_str(" DESC");
                }
            },
            ", ",
        );
    }

    fn write_select(&self, handler: &OrmHandler, out: &mut String, select: &SelectStatement) {
        self.write_select_body(handler, out, select, true);
        let table = handler.table(select.decoder.base().table);
        match &table.select {
            Some(view) if select.limit.is_none() && select.offset == 0 => {
                if !view.limit.is_empty() {
                    let _ = write!(out, "\n\tLIMIT {}", view.limit);
                }
                if !view.offset.is_empty() {
                    let _ = write!(out, " OFFSET {}", view.offset);
                }
            }
            _ => self.write_pagination(&mut Context::default(), out, select.limit, select.offset),
        }
        if select.lock {
            self.write_lock(&mut Context::default(), out);
        }
    }

    /// Paging clause, a bare limit is left to the driver max rows.
    fn write_pagination(&self, _context: &mut Context, out: &mut String, limit: Option<u64>, offset: u64) {
        if offset == 0 {
            return;
        }
        if let Some(limit) = limit {
            out.push_str("\n\tLIMIT ");
            write_integer!(out, limit);
        }
        out.push_str(" OFFSET ");
        write_integer!(out, offset);
    }

    fn write_lock(&self, _context: &mut Context, out: &mut String) {
        out.push_str("\n\tFOR UPDATE");
    }

    /// Row count ignoring the pagination, `distinct` counts distinct rows.
    fn write_select_count(&self, handler: &OrmHandler, out: &mut String, select: &SelectStatement) {
        let table = handler.table(select.decoder.base().table);
        if select.distinct || table.is_view() {
            out.push_str("SELECT COUNT(*) FROM (");
            self.write_select_body(handler, out, select, false);
            let _ = write!(out, ") {}_count_", table.alias);
            return;
        }
        let decoder = select.decoder;
        let mut context = Context::new(Fragment::SqlSelectFrom, true);
        out.push_str("SELECT COUNT(*)\n\tFROM ");
        self.write_from_list(handler, &mut context, out, decoder.tables());
        if !decoder.where_text().is_empty() {
            out.push_str("\n\tWHERE ");
            out.push_str(decoder.where_text());
        }
    }
}

/// Comparison templates shared by all the dialects, `None` for the dialect specific ones.
pub fn ansi_operator_template(operator: Operator) -> Option<&'static str> {
    Some(match operator {
        Operator::Eq => "{0}={1}",
        Operator::NotEq => "{0}<>{1}",
        Operator::Gt => "{0}>{1}",
        Operator::Ge => "{0}>={1}",
        Operator::Lt => "{0}<{1}",
        Operator::Le => "{0}<={1}",
        Operator::EqIgnoreCase => "UPPER({0})={1}",
        Operator::StartsWith | Operator::EndsWith | Operator::Contains => "{0} LIKE {1}",
        Operator::StartsWithIgnoreCase
        | Operator::EndsWithIgnoreCase
        | Operator::ContainsIgnoreCase => "UPPER({0}) LIKE {1}",
        Operator::In => "{0} IN ({1})",
        Operator::NotIn => "NOT {0} IN ({1})",
        Operator::Regexp | Operator::NotRegexp | Operator::Constant | Operator::Sql => return None,
    })
}

pub(crate) fn unsupported_operator(dialect: &str, operator: Operator) -> Error {
    OrmError::unsupported_operator(format!(
        "Operator {:?} is not supported by the {} dialect",
        operator, dialect
    ))
    .into()
}

/// ANSI writer, used for the `generic` and `h2` dialects.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn name(&self) -> &'static str {
        "generic"
    }
}
