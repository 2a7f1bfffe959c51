use crate::{AsValue, Error, Key, Result, Value};
use std::{any::Any, cell::RefCell, collections::BTreeSet, fmt, rc::Rc};

/// Shared handle to an entity, the unit the session cache hands out.
pub type EntityRef<E> = Rc<RefCell<E>>;

pub fn entity_ref<E>(entity: E) -> EntityRef<E> {
    Rc::new(RefCell::new(entity))
}

/// Static description of an entity type, produced by `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityInfo {
    /// Fully qualified type name, the identity of the entity.
    pub name: &'static str,
    pub table: &'static str,
    /// Empty to use the schema of the database.
    pub schema: &'static str,
    /// Empty to derive it from the table name.
    pub alias: &'static str,
    /// SELECT template of a view, empty for tables.
    pub select: &'static str,
    pub comment: &'static str,
    /// Parent entity whose row is stored together with this one.
    pub extends: Option<fn() -> &'static EntityInfo>,
    pub fields: &'static [FieldInfo],
}

impl EntityInfo {
    pub fn is_view(&self) -> bool {
        !self.select.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&'static FieldInfo> {
        self.fields.get(index)
    }

    pub fn primary_key_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
    }

    /// True when `self` is a strict ancestor of `other` through `extends`.
    pub fn is_ancestor_of(&self, other: &EntityInfo) -> bool {
        let mut current = other.extends;
        while let Some(parent) = current {
            let parent = parent();
            if parent.name == self.name {
                return true;
            }
            current = parent.extends;
        }
        false
    }
}

/// The kind of value a field holds.
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// A scalar column, the function returns the null prototype of its value.
    Value(fn() -> Value),
    /// A reference to another entity stored through its primary key.
    Relation(fn() -> &'static EntityInfo),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Value(prototype) => write!(f, "Value({:?})", prototype()),
            FieldKind::Relation(target) => write!(f, "Relation({})", target().name),
        }
    }
}

/// Static description of one entity field and the column it maps to.
#[derive(Debug)]
pub struct FieldInfo {
    pub name: &'static str,
    /// Column name, empty to use the field name.
    pub column: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub primary_key: bool,
    pub mandatory: bool,
    /// Declared length, -1 for the type default.
    pub length: i32,
    /// Declared precision, -1 for the type default.
    pub precision: i32,
    /// SQL literal used as the column default, empty for none.
    pub default: &'static str,
    pub comment: &'static str,
    pub index: &'static str,
    pub unique_index: &'static str,
    /// Explicit database type, empty to infer it from the field type.
    pub db_type: &'static str,
}

impl FieldInfo {
    pub fn column_name(&self) -> &'static str {
        if self.column.is_empty() {
            self.name
        } else {
            self.column
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation(..))
    }
}

/// Primary key values standing in for a related entity that was not loaded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForeignKey(pub Vec<Value>);

impl ForeignKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty() || self.0.iter().all(Value::is_null)
    }
}

impl<T: AsValue> From<T> for ForeignKey {
    fn from(value: T) -> Self {
        Self(vec![value.as_value()])
    }
}

/// Value of a relation field.
pub enum Relation<E> {
    Loaded(EntityRef<E>),
    Key(ForeignKey),
}

impl<E> Clone for Relation<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Loaded(v) => Self::Loaded(v.clone()),
            Self::Key(v) => Self::Key(v.clone()),
        }
    }
}

impl<E> fmt::Debug for Relation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(v) => write!(f, "Loaded({:p})", Rc::as_ptr(v)),
            Self::Key(v) => write!(f, "Key({:?})", v.0),
        }
    }
}

impl<E: Entity> Relation<E> {
    pub fn to(entity: &EntityRef<E>) -> Self {
        Self::Loaded(entity.clone())
    }

    pub fn key(key: impl Into<ForeignKey>) -> Self {
        Self::Key(key.into())
    }

    pub fn loaded(&self) -> Option<&EntityRef<E>> {
        match self {
            Self::Loaded(v) => Some(v),
            Self::Key(..) => None,
        }
    }

    /// Primary key of the referenced row.
    pub fn foreign_key(&self) -> Result<ForeignKey> {
        match self {
            Self::Loaded(v) => Ok(ForeignKey(v.try_borrow()?.primary_key_values()?)),
            Self::Key(v) => Ok(v.clone()),
        }
    }
}

/// Bookkeeping every entity carries: the modified fields and the session stamp.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntityState {
    dirty: BTreeSet<usize>,
    session: Option<u64>,
}

impl EntityState {
    pub fn mark(&mut self, index: usize) {
        self.dirty.insert(index);
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty.contains(&index)
    }

    pub fn dirty(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty.iter().copied()
    }

    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Id of the session that loaded or saved the entity.
    pub fn session(&self) -> Option<u64> {
        self.session
    }

    pub fn set_session(&mut self, session: Option<u64>) {
        self.session = session;
    }
}

/// A persistent record, implemented by `#[derive(Entity)]`.
///
/// Fields are addressed by their declaration index. Scalar fields go through
/// `read`/`write`, relation fields through `read_key`/`write_key`.
pub trait Entity: Any {
    fn info() -> &'static EntityInfo
    where
        Self: Sized;

    fn entity_info(&self) -> &'static EntityInfo;

    fn read(&self, index: usize) -> Result<Value>;

    fn write(&mut self, index: usize, value: Value) -> Result<()>;

    /// Primary key of the entity referenced by a relation field.
    fn read_key(&self, index: usize) -> Result<Option<ForeignKey>>;

    fn write_key(&mut self, index: usize, key: Option<ForeignKey>) -> Result<()>;

    /// Store a boxed `Option<Relation<_>>` into a relation field.
    fn write_relation(&mut self, index: usize, value: Box<dyn Any>) -> Result<()>;

    /// Loaded target of a relation field.
    fn related(&self, index: usize) -> Option<Rc<RefCell<dyn Entity>>>;

    /// Loaded target of a relation field as `Rc<RefCell<Target>>`, ready to downcast.
    fn related_any(&self, index: usize) -> Option<Rc<dyn Any>>;

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    fn as_any(&self) -> &dyn Any;

    /// Values of the primary key, relation parts expanded to their own keys.
    fn primary_key_values(&self) -> Result<Vec<Value>> {
        let info = self.entity_info();
        let mut result = Vec::new();
        for index in info.primary_key_indexes() {
            if info.fields[index].is_relation() {
                match self.read_key(index)? {
                    Some(key) => result.extend(key.0),
                    None => {
                        return Err(Error::msg(format!(
                            "The primary key relation `{}` of `{}` is not set",
                            info.fields[index].name, info.name
                        )));
                    }
                }
            } else {
                result.push(self.read(index)?);
            }
        }
        Ok(result)
    }

    /// Set a scalar field and mark it as modified.
    fn set<V: AsValue>(&mut self, key: Key<Self, V>, value: V) -> Result<()>
    where
        Self: Sized,
    {
        self.write(key.index(), value.as_value())?;
        self.state_mut().mark(key.index());
        Ok(())
    }

    /// Set a relation field and mark it as modified.
    fn set_relation<B: Entity>(
        &mut self,
        key: Key<Self, Option<Relation<B>>>,
        value: Option<Relation<B>>,
    ) -> Result<()>
    where
        Self: Sized,
    {
        self.write_relation(key.index(), Box::new(value))?;
        self.state_mut().mark(key.index());
        Ok(())
    }

    /// Mark a field modified after changing it directly.
    fn touch<V>(&mut self, key: Key<Self, V>)
    where
        Self: Sized,
    {
        self.state_mut().mark(key.index());
    }
}
