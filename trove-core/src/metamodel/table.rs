use super::{ColumnId, DatabaseId, TableId};
use crate::{EntityInfo, OrmError, Result, Sequencer};

/// Ordered columns forming the identity of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaPKey {
    pub columns: Vec<ColumnId>,
}

impl MetaPKey {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn first(&self) -> Option<ColumnId> {
        self.columns.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaIndex {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<ColumnId>,
}

/// SELECT template of a view split into its clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaSelect {
    pub select: String,
    pub from: String,
    pub where_: String,
    pub group: String,
    pub order: String,
    pub limit: String,
    pub offset: String,
}

const KEYWORDS: [&str; 7] = [
    "SELECT", "FROM", "WHERE", "GROUP BY", "ORDER BY", "LIMIT", "OFFSET",
];

impl MetaSelect {
    /// Split a template on the top level keywords, nested parentheses and
    /// quoted text are skipped.
    pub fn parse(template: &str) -> Result<MetaSelect> {
        let bytes = template.as_bytes();
        let mut found: Vec<(usize, usize, usize)> = Vec::new();
        let mut depth = 0i32;
        let mut quoted = false;
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if quoted {
                quoted = c != b'\'';
                i += 1;
                continue;
            }
            match c {
                b'\'' => quoted = true,
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ if depth == 0 => {
                    let start_ok = i == 0 || !is_word_byte(bytes[i - 1]);
                    let next = found.last().map(|(k, ..)| k + 1).unwrap_or(0);
                    if start_ok {
                        if let Some(k) = (next..KEYWORDS.len()).find(|k| {
                            let keyword = KEYWORDS[*k].as_bytes();
                            let end = i + keyword.len();
                            end <= bytes.len()
                                && bytes[i..end].eq_ignore_ascii_case(keyword)
                                && (end == bytes.len() || !is_word_byte(bytes[end]))
                        }) {
                            let end = i + KEYWORDS[k].len();
                            found.push((k, i, end));
                            i = end;
                            continue;
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        if found.first().map(|(k, ..)| *k) != Some(0) || !found.iter().any(|(k, ..)| *k == 1) {
            return Err(OrmError::mapping(format!(
                "The view template must contain SELECT and FROM clauses: `{}`",
                crate::truncated(template, 128)
            ))
            .into());
        }
        let mut result = MetaSelect::default();
        for (n, (k, _, end)) in found.iter().enumerate() {
            let stop = found.get(n + 1).map(|(_, s, _)| *s).unwrap_or(template.len());
            let text = template[*end..stop].trim().to_string();
            match k {
                0 => result.select = text,
                1 => result.from = text,
                2 => result.where_ = text,
                3 => result.group = text,
                4 => result.order = text,
                5 => result.limit = text,
                _ => result.offset = text,
            }
        }
        Ok(result)
    }
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Binding of an entity type to a table or a view.
#[derive(Debug)]
pub struct MetaTable {
    pub id: TableId,
    pub database: DatabaseId,
    pub entity: &'static EntityInfo,
    pub name: String,
    /// Resolved schema, empty when the database has none.
    pub schema: String,
    pub alias: String,
    pub comment: String,
    pub columns: Vec<ColumnId>,
    pub pkey: MetaPKey,
    pub indexes: Vec<MetaIndex>,
    pub select: Option<MetaSelect>,
    /// Primary key column referencing the parent entity row.
    pub parent: Option<ColumnId>,
    pub(crate) sequencer: Option<Sequencer>,
}

impl MetaTable {
    pub fn is_view(&self) -> bool {
        self.select.is_some()
    }

    /// Name qualified by the schema when there is one.
    pub fn full_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }
}
