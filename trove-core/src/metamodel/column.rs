use super::{ColumnId, DbType, TableId};
use crate::{FieldInfo, FieldRef};

/// One column as it exists in the database. A relation column expands to
/// one physical column per column of the referenced primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalColumn {
    pub name: String,
    pub db_type: DbType,
    pub max_length: i32,
    pub precision: i32,
    /// Referenced column of the related table.
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MetaColumn {
    pub id: ColumnId,
    pub table: TableId,
    pub field: FieldRef,
    pub name: String,
    pub db_type: DbType,
    /// -1 when the type default applies.
    pub max_length: i32,
    pub precision: i32,
    pub mandatory: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
    pub comment: String,
    pub index: Option<String>,
    pub unique_index: Option<String>,
    /// Referenced primary key columns, empty for scalar columns.
    pub foreign: Vec<ColumnId>,
    pub foreign_table: Option<TableId>,
    pub physical: Vec<PhysicalColumn>,
}

impl MetaColumn {
    pub fn info(&self) -> Option<&'static FieldInfo> {
        self.field.info()
    }

    pub fn index_in_entity(&self) -> usize {
        self.field.index
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_table.is_some()
    }

    pub fn physical_names(&self) -> impl Iterator<Item = &str> {
        self.physical.iter().map(|p| p.name.as_str())
    }

    pub fn physical_count(&self) -> usize {
        self.physical.len()
    }
}
