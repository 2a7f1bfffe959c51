use crate::{
    Criterion, Entity, EntityInfo, FieldInfo, ForeignKey, Operand, Operator, Relation, Result,
    Value,
};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// Untyped identity of one entity field.
#[derive(Clone, Copy)]
pub struct FieldRef {
    pub entity: fn() -> &'static EntityInfo,
    pub index: usize,
}

impl FieldRef {
    pub fn entity_info(&self) -> &'static EntityInfo {
        (self.entity)()
    }

    pub fn info(&self) -> Option<&'static FieldInfo> {
        self.entity_info().field(self.index)
    }

    pub fn name(&self) -> &'static str {
        self.info().map(|f| f.name).unwrap_or("?")
    }

    fn identity(&self) -> (&'static str, usize) {
        (self.entity_info().name, self.index)
    }
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for FieldRef {}

impl Hash for FieldRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state)
    }
}

impl PartialOrd for FieldRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.entity_info();
        let entity = info.name.rsplit("::").next().unwrap_or(info.name);
        write!(f, "{}.{}", entity, self.name())
    }
}

/// Chain of fields starting at the root entity. All the hops but the last are
/// relations; a path of length one is a direct key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<FieldRef>);

impl KeyPath {
    pub(crate) fn new(hops: Vec<FieldRef>) -> Self {
        Self(hops)
    }

    pub fn hops(&self) -> &[FieldRef] {
        &self.0
    }

    pub fn is_direct(&self) -> bool {
        self.0.len() == 1
    }

    /// The direct key the path ends with.
    pub fn terminal(&self) -> &FieldRef {
        &self.0[self.0.len() - 1]
    }

    /// Relation hops traversed before reaching the terminal key.
    pub fn relations(&self) -> &[FieldRef] {
        &self.0[..self.0.len() - 1]
    }

    fn join(mut self, next: KeyPath) -> Self {
        self.0.extend(next.0);
        self
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hop) in self.0.iter().enumerate() {
            if i == 0 {
                write!(f, "{:?}", hop)?;
            } else {
                write!(f, ".{}", hop.name())?;
            }
        }
        Ok(())
    }
}

/// Direct typed key of the field `V` in the entity `E`.
///
/// `#[derive(Entity)]` generates one constant per field, e.g. `Employee::name`.
pub struct Key<E, V> {
    index: usize,
    _p: PhantomData<fn() -> (E, V)>,
}

impl<E, V> Key<E, V> {
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _p: PhantomData,
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }
}

impl<E, V> Clone for Key<E, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, V> Copy for Key<E, V> {}

impl<E: Entity, V> fmt::Debug for Key<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.field_ref())
    }
}

impl<E: Entity, V> Key<E, V> {
    pub fn field_ref(&self) -> FieldRef {
        FieldRef {
            entity: E::info,
            index: self.index,
        }
    }

    pub fn info(&self) -> &'static FieldInfo {
        &E::info().fields[self.index]
    }
}

impl<E: Entity, V: crate::AsValue> Key<E, V> {
    /// Typed read of the field.
    pub fn get(&self, entity: &E) -> Result<V> {
        V::try_from_value(entity.read(self.index)?)
    }
}

impl<E: Entity, B: Entity> Key<E, Option<Relation<B>>> {
    /// Indirect key continuing through the related entity.
    pub fn then<V, P: IntoPath<B, V>>(self, next: P) -> Path<E, V> {
        self.into_path().then(next)
    }
}

/// Typed indirect key: a chain of relations ending with a field of type `V`.
pub struct Path<E, V> {
    path: KeyPath,
    _p: PhantomData<fn() -> (E, V)>,
}

impl<E, V> Clone for Path<E, V> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _p: PhantomData,
        }
    }
}

impl<E, V> fmt::Debug for Path<E, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.path)
    }
}

impl<E: Entity, B: Entity> Path<E, Option<Relation<B>>> {
    pub fn then<V, P: IntoPath<B, V>>(self, next: P) -> Path<E, V> {
        Path {
            path: self.path.join(next.into_path().path),
            _p: PhantomData,
        }
    }
}

pub trait IntoPath<E, V> {
    fn into_path(self) -> Path<E, V>;
}

impl<E: Entity, V> IntoPath<E, V> for Key<E, V> {
    fn into_path(self) -> Path<E, V> {
        Path {
            path: KeyPath(vec![self.field_ref()]),
            _p: PhantomData,
        }
    }
}

impl<E, V> IntoPath<E, V> for Path<E, V> {
    fn into_path(self) -> Path<E, V> {
        self
    }
}

/// Sort item of a query rooted at `E`.
pub struct Order<E> {
    pub path: KeyPath,
    pub ascending: bool,
    _p: PhantomData<fn() -> E>,
}

impl<E> Order<E> {
    pub fn new(path: KeyPath, ascending: bool) -> Self {
        Self {
            path,
            ascending,
            _p: PhantomData,
        }
    }
}

impl<E> Clone for Order<E> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone(), self.ascending)
    }
}

impl<E> fmt::Debug for Order<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}",
            self.path,
            if self.ascending { "ASC" } else { "DESC" }
        )
    }
}

/// Anything naming a field reachable from `E`, the entry point of the criterion builders.
pub trait Property<E>: Sized {
    type Value;

    fn path(&self) -> KeyPath;

    fn criterion(self, operator: Operator, right: Operand) -> Criterion<E> {
        Criterion::leaf(Some(self.path()), operator, right)
    }

    fn eq(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::Eq, Operand::from_value(value.into()))
    }

    fn ne(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::NotEq, Operand::from_value(value.into()))
    }

    fn gt(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::Gt, Operand::from_value(value.into()))
    }

    fn ge(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::Ge, Operand::from_value(value.into()))
    }

    fn lt(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::Lt, Operand::from_value(value.into()))
    }

    fn le(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::Le, Operand::from_value(value.into()))
    }

    fn eq_ignore_case(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::EqIgnoreCase, Operand::from_value(value.into()))
    }

    fn starts_with(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::StartsWith, Operand::from_value(value.into()))
    }

    fn starts_with_ignore_case(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(
            Operator::StartsWithIgnoreCase,
            Operand::from_value(value.into()),
        )
    }

    fn ends_with(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::EndsWith, Operand::from_value(value.into()))
    }

    fn ends_with_ignore_case(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(
            Operator::EndsWithIgnoreCase,
            Operand::from_value(value.into()),
        )
    }

    fn contains(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(Operator::Contains, Operand::from_value(value.into()))
    }

    fn contains_ignore_case(self, value: impl Into<Value>) -> Criterion<E> {
        self.criterion(
            Operator::ContainsIgnoreCase,
            Operand::from_value(value.into()),
        )
    }

    fn regexp(self, pattern: impl Into<String>) -> Criterion<E> {
        self.criterion(
            Operator::Regexp,
            Operand::Value(Value::Varchar(Some(pattern.into()))),
        )
    }

    fn not_regexp(self, pattern: impl Into<String>) -> Criterion<E> {
        self.criterion(
            Operator::NotRegexp,
            Operand::Value(Value::Varchar(Some(pattern.into()))),
        )
    }

    fn in_list<T: Into<Value>>(self, values: impl IntoIterator<Item = T>) -> Criterion<E> {
        self.criterion(
            Operator::In,
            Operand::Values(values.into_iter().map(Into::into).collect()),
        )
    }

    fn not_in<T: Into<Value>>(self, values: impl IntoIterator<Item = T>) -> Criterion<E> {
        self.criterion(
            Operator::NotIn,
            Operand::Values(values.into_iter().map(Into::into).collect()),
        )
    }

    fn is_null(self) -> Criterion<E> {
        self.criterion(Operator::Eq, Operand::Null)
    }

    fn is_not_null(self) -> Criterion<E> {
        self.criterion(Operator::NotEq, Operand::Null)
    }

    /// Compare two columns, possibly of different tables.
    fn compare_property<P: Property<E>>(self, operator: Operator, other: P) -> Criterion<E> {
        self.criterion(operator, Operand::Property(other.path()))
    }

    fn eq_property<P: Property<E>>(self, other: P) -> Criterion<E> {
        self.compare_property(Operator::Eq, other)
    }

    /// Relation equal to the primary key of `entity`.
    fn eq_entity<B: Entity>(self, entity: &B) -> Result<Criterion<E>>
    where
        Self: Property<E, Value = Option<Relation<B>>>,
    {
        Ok(self.criterion(Operator::Eq, Operand::Key(ForeignKey(entity.primary_key_values()?))))
    }

    fn eq_key(self, key: ForeignKey) -> Criterion<E> {
        self.criterion(Operator::Eq, Operand::Key(key))
    }

    fn ne_key(self, key: ForeignKey) -> Criterion<E> {
        self.criterion(Operator::NotEq, Operand::Key(key))
    }

    fn asc(self) -> Order<E> {
        Order::new(self.path(), true)
    }

    fn desc(self) -> Order<E> {
        Order::new(self.path(), false)
    }
}

impl<E: Entity, V> Property<E> for Key<E, V> {
    type Value = V;

    fn path(&self) -> KeyPath {
        KeyPath(vec![self.field_ref()])
    }
}

impl<E, V> Property<E> for Path<E, V> {
    type Value = V;

    fn path(&self) -> KeyPath {
        self.path.clone()
    }
}
