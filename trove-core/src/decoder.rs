use crate::{
    FieldRef, KeyPath, Leaf, MetaColumn, Node, Operand, Operator, OrmError, OrmHandler, Result,
    SqlWriter, TableId, Value, separated_by, writer::Context,
};
use std::fmt::Write;

/// Table taking part in a decoded statement, the first one is the queried table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlias {
    pub table: TableId,
    pub alias: String,
}

/// One rendered sort column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderColumn {
    pub column: String,
    pub ascending: bool,
}

/// Literal bound to a placeholder, together with the operator that adjusts it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub value: Value,
    pub operator: Operator,
}

impl BoundValue {
    /// Value sent to the driver: case folded and wrapped with LIKE wildcards when needed.
    pub fn bind(&self) -> Value {
        self.operator.bind_value(&self.value)
    }
}

/// Criterion compiled against the meta-model.
///
/// Holds the WHERE text, the values in placeholder order and the tables the
/// statement must list, relation joins included.
#[derive(Debug, Clone)]
pub struct CriterionDecoder {
    where_: String,
    values: Vec<BoundValue>,
    tables: Vec<TableAlias>,
    order: Vec<OrderColumn>,
    relations: usize,
}

impl CriterionDecoder {
    pub fn new<'o>(
        handler: &OrmHandler,
        base: TableId,
        criterion: Option<&Node>,
        order: impl IntoIterator<Item = (&'o KeyPath, bool)>,
    ) -> Result<Self> {
        let table = handler.table(base);
        let mut decoder = Decoder {
            handler,
            writer: handler.writer(table.database),
            context: Context::default(),
            prefixes: vec![(Vec::new(), 0)],
            tables: vec![TableAlias {
                table: base,
                alias: table.alias.clone(),
            }],
            joins: Vec::new(),
            values: Vec::new(),
        };
        let mut primary = String::with_capacity(64);
        if let Some(node) = criterion {
            decoder.node(&mut primary, node)?;
        }
        let mut columns = Vec::new();
        for (path, ascending) in order {
            let (texts, _) = decoder.columns(path)?;
            columns.extend(texts.into_iter().map(|column| OrderColumn { column, ascending }));
        }
        let relations = decoder.joins.len();
        let mut where_ = primary;
        if !decoder.joins.is_empty() {
            let joins = decoder.joins.join(" AND ");
            if where_.is_empty() {
                where_ = joins;
            } else {
                let _ = write!(where_, " AND ({})", joins);
            }
        }
        Ok(Self {
            where_,
            values: decoder.values,
            tables: decoder.tables,
            order: columns,
            relations,
        })
    }

    /// WHERE condition without the keyword, empty when every row matches.
    pub fn where_text(&self) -> &str {
        &self.where_
    }

    /// Values to bind, in placeholder order.
    pub fn values(&self) -> Vec<Value> {
        self.values.iter().map(BoundValue::bind).collect()
    }

    pub fn bound_values(&self) -> &[BoundValue] {
        &self.values
    }

    pub fn tables(&self) -> &[TableAlias] {
        &self.tables
    }

    pub fn base(&self) -> &TableAlias {
        &self.tables[0]
    }

    pub fn order(&self) -> &[OrderColumn] {
        &self.order
    }

    /// Number of join conditions appended to the criterion.
    pub fn relation_count(&self) -> usize {
        self.relations
    }

    /// True when tables other than the queried one are involved.
    pub fn has_relations(&self) -> bool {
        self.tables.len() > 1
    }
}

struct Decoder<'a> {
    handler: &'a OrmHandler,
    writer: &'a dyn SqlWriter,
    context: Context,
    /// Relation prefix to the index of its table in `tables`.
    prefixes: Vec<(Vec<FieldRef>, usize)>,
    tables: Vec<TableAlias>,
    joins: Vec<String>,
    values: Vec<BoundValue>,
}

impl<'a> Decoder<'a> {
    fn node(&mut self, out: &mut String, node: &Node) -> Result<()> {
        match node {
            Node::Leaf(leaf) => self.leaf(out, leaf),
            Node::And(l, r) => {
                self.node(out, l)?;
                out.push_str(" AND ");
                self.node(out, r)
            }
            Node::Or(l, r) => {
                out.push('(');
                self.node(out, l)?;
                out.push_str(" OR ");
                self.node(out, r)?;
                out.push(')');
                Ok(())
            }
        }
    }

    /// Index in `tables` of the table reached through `prefix`, registering the join on first use.
    fn table_index(&mut self, prefix: &[FieldRef]) -> Result<usize> {
        if let Some((_, index)) = self.prefixes.iter().find(|(p, _)| p == prefix) {
            return Ok(*index);
        }
        let (hop, parent_prefix) = match prefix.split_last() {
            Some(v) => v,
            None => return Ok(0),
        };
        let parent = self.table_index(parent_prefix)?;
        let column = self.handler.find_column(hop)?;
        let Some(target) = column.foreign_table else {
            return Err(OrmError::mapping(format!("The key {:?} is not a relation", hop)).into());
        };
        let target_table = self.handler.table(target);
        if target_table.is_view() || self.handler.table(self.tables[parent].table).is_view() {
            return Err(OrmError::unsupported_operator(format!(
                "The relation {:?} cannot join a view",
                hop
            ))
            .into());
        }
        let uses = self.tables.iter().filter(|t| t.table == target).count();
        let alias = if uses == 0 {
            target_table.alias.clone()
        } else {
            format!("{}_{}", target_table.alias, uses)
        };
        let parent_alias = &self.tables[parent].alias;
        for physical in column.physical.iter().rev() {
            self.joins.push(format!(
                "{}.{} = {}.{}",
                parent_alias,
                physical.name,
                alias,
                physical.target.as_deref().unwrap_or_default()
            ));
        }
        self.tables.push(TableAlias {
            table: target,
            alias,
        });
        let index = self.tables.len() - 1;
        self.prefixes.push((prefix.to_vec(), index));
        Ok(index)
    }

    /// Qualified physical column names of the path terminal.
    fn columns(&mut self, path: &KeyPath) -> Result<(Vec<String>, &'a MetaColumn)> {
        let index = self.table_index(path.relations())?;
        let handler = self.handler;
        let column = handler.find_column(path.terminal())?;
        let table = &self.tables[index];
        let texts = if handler.table(table.table).is_view() {
            column.physical.iter().map(|p| p.name.clone()).collect()
        } else {
            column
                .physical
                .iter()
                .map(|p| format!("{}.{}", table.alias, p.name))
                .collect()
        };
        Ok((texts, column))
    }

    fn placeholder(&mut self, value: Value, operator: Operator) -> String {
        let mut out = String::with_capacity(1);
        self.writer.write_placeholder(&mut self.context, &mut out);
        self.values.push(BoundValue { value, operator });
        out
    }

    fn leaf(&mut self, out: &mut String, leaf: &Leaf) -> Result<()> {
        match (&leaf.operator, &leaf.right) {
            (Operator::Constant, Operand::Constant(v)) => {
                out.push_str(if *v { "1=1" } else { "1=0" });
                return Ok(());
            }
            (Operator::Sql, Operand::Sql(v)) => {
                let _ = write!(out, "({})", v);
                return Ok(());
            }
            (Operator::Constant | Operator::Sql, _) | (_, Operand::Constant(..) | Operand::Sql(..)) => {
                return Err(OrmError::unsupported_operator(format!(
                    "Operator {:?} cannot be combined with {:?}",
                    leaf.operator, leaf.right
                ))
                .into());
            }
            _ => {}
        }
        let Some(left) = &leaf.left else {
            return Err(OrmError::unsupported_operator(format!(
                "Operator {:?} requires a left key",
                leaf.operator
            ))
            .into());
        };
        let (columns, meta) = self.columns(left)?;
        match &leaf.right {
            Operand::Null => self.null(out, leaf.operator, &columns, meta),
            Operand::Key(key) if key.is_null() => self.null(out, leaf.operator, &columns, meta),
            Operand::Value(value) => {
                let column = single(&columns, meta, "a single value")?;
                if matches!(leaf.operator, Operator::In | Operator::NotIn) {
                    return self.in_list(out, leaf.operator, column, std::slice::from_ref(value));
                }
                let template = self.writer.operator_template(leaf.operator)?;
                let placeholder = self.placeholder(value.clone(), leaf.operator);
                fill(out, template, column, &placeholder);
                Ok(())
            }
            Operand::Values(values) => {
                let column = single(&columns, meta, "a list of values")?;
                self.in_list(out, leaf.operator, column, values)
            }
            Operand::Key(key) => {
                if key.values().len() != columns.len() {
                    return Err(OrmError::mapping(format!(
                        "The key {:?} has {} columns but {} values were given",
                        left,
                        columns.len(),
                        key.values().len()
                    ))
                    .into());
                }
                let separator = match leaf.operator {
                    Operator::Eq => " AND ",
                    Operator::NotEq => " OR ",
                    _ => {
                        return Err(OrmError::unsupported_operator(format!(
                            "Operator {:?} cannot compare the relation {:?}",
                            leaf.operator, left
                        ))
                        .into());
                    }
                };
                let template = self.writer.operator_template(leaf.operator)?;
                let parenthesized = columns.len() > 1 && leaf.operator == Operator::NotEq;
                if parenthesized {
                    out.push('(');
                }
                let mut parts = Vec::with_capacity(columns.len());
                for (column, value) in columns.iter().zip(key.values()) {
                    let placeholder = self.placeholder(value.clone(), leaf.operator);
                    let mut part = String::new();
                    fill(&mut part, template, column, &placeholder);
                    parts.push(part);
                }
                separated_by(out, parts, |out, v| out.push_str(&v), separator);
                if parenthesized {
                    out.push(')');
                }
                Ok(())
            }
            Operand::Property(path) => {
                let (right, right_meta) = self.columns(path)?;
                if right_meta.is_foreign_key() {
                    return Err(OrmError::unsupported_operator(format!(
                        "The relation {:?} cannot be the right side of a comparison",
                        path
                    ))
                    .into());
                }
                if leaf.operator.is_like() || matches!(leaf.operator, Operator::In | Operator::NotIn) {
                    return Err(OrmError::unsupported_operator(format!(
                        "Operator {:?} cannot compare two columns",
                        leaf.operator
                    ))
                    .into());
                }
                let column = single(&columns, meta, "a column")?;
                let template = self.writer.operator_template(leaf.operator)?;
                let right = if leaf.operator.is_case_insensitive() {
                    format!("UPPER({})", right[0])
                } else {
                    right[0].clone()
                };
                fill(out, template, column, &right);
                Ok(())
            }
            Operand::Constant(..) | Operand::Sql(..) => Ok(()),
        }
    }

    fn null(&mut self, out: &mut String, operator: Operator, columns: &[String], meta: &MetaColumn) -> Result<()> {
        let (suffix, separator) = match operator {
            Operator::Eq | Operator::EqIgnoreCase => (" IS NULL", " AND "),
            Operator::NotEq => (" IS NOT NULL", " OR "),
            _ => {
                return Err(OrmError::UnsupportedNullComparison {
                    operator,
                    column: meta.name.clone(),
                }
                .into());
            }
        };
        let parenthesized = columns.len() > 1 && operator == Operator::NotEq;
        if parenthesized {
            out.push('(');
        }
        separated_by(
            out,
            columns,
            |out, v| {
                out.push_str(v);
                out.push_str(suffix);
            },
            separator,
        );
        if parenthesized {
            out.push(')');
        }
        Ok(())
    }

    fn in_list(&mut self, out: &mut String, operator: Operator, column: &str, values: &[Value]) -> Result<()> {
        let negated = match operator {
            Operator::In => false,
            Operator::NotIn => true,
            _ => {
                return Err(OrmError::unsupported_operator(format!(
                    "Operator {:?} cannot take a list of values",
                    operator
                ))
                .into());
            }
        };
        if values.is_empty() {
            out.push_str(if negated { "1=1" } else { "1=0" });
            return Ok(());
        }
        let template = self.writer.operator_template(operator)?;
        let chunk = self.handler.params().max_item_count_in.max(1);
        let groups = values.len().div_ceil(chunk);
        let parenthesized = groups > 1 && !negated;
        if parenthesized {
            out.push('(');
        }
        for (i, group) in values.chunks(chunk).enumerate() {
            if i > 0 {
                out.push_str(if negated { " AND " } else { " OR " });
            }
            let mut list = String::with_capacity(group.len() * 3);
            for value in group {
                if !list.is_empty() {
                    list.push_str(", ");
                }
                let placeholder = self.placeholder(value.clone(), operator);
                list.push_str(&placeholder);
            }
            fill(out, template, column, &list);
        }
        if parenthesized {
            out.push(')');
        }
        Ok(())
    }
}

fn single<'c>(columns: &'c [String], meta: &MetaColumn, what: &str) -> Result<&'c str> {
    match columns {
        [column] => Ok(column),
        _ => Err(OrmError::mapping(format!(
            "The relation `{}` spans {} columns and cannot be compared with {}",
            meta.name,
            columns.len(),
            what
        ))
        .into()),
    }
}

fn fill(out: &mut String, template: &str, left: &str, right: &str) {
    out.push_str(&template.replace("{0}", left).replace("{1}", right));
}
