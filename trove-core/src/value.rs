use rust_decimal::Decimal;
use std::fmt::{self, Display};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed column value, every variant carries a nullable payload.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Char(Option<char>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    Uuid(Option<Uuid>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Char(l), Self::Char(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Value {
    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null
            | Value::Boolean(None)
            | Value::Int8(None)
            | Value::Int16(None)
            | Value::Int32(None)
            | Value::Int64(None)
            | Value::Float64(None)
            | Value::Decimal(None)
            | Value::Char(None)
            | Value::Varchar(None)
            | Value::Blob(None)
            | Value::Date(None)
            | Value::Time(None)
            | Value::Timestamp(None)
            | Value::Uuid(None) => true,
            _ => false,
        }
    }

    /// Same variant without the payload.
    pub fn as_null(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(..) => Value::Boolean(None),
            Value::Int8(..) => Value::Int8(None),
            Value::Int16(..) => Value::Int16(None),
            Value::Int32(..) => Value::Int32(None),
            Value::Int64(..) => Value::Int64(None),
            Value::Float64(..) => Value::Float64(None),
            Value::Decimal(..) => Value::Decimal(None),
            Value::Char(..) => Value::Char(None),
            Value::Varchar(..) => Value::Varchar(None),
            Value::Blob(..) => Value::Blob(None),
            Value::Date(..) => Value::Date(None),
            Value::Time(..) => Value::Time(None),
            Value::Timestamp(..) => Value::Timestamp(None),
            Value::Uuid(..) => Value::Uuid(None),
        }
    }

    /// Upper case copy of textual values, other variants are cloned.
    pub fn to_uppercase(&self) -> Value {
        match self {
            Value::Varchar(Some(v)) => Value::Varchar(Some(v.to_uppercase())),
            Value::Char(Some(v)) => Value::Char(v.to_uppercase().next()),
            v => v.clone(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        match self {
            Value::Boolean(Some(v)) => write!(f, "{}", v),
            Value::Int8(Some(v)) => write!(f, "{}", v),
            Value::Int16(Some(v)) => write!(f, "{}", v),
            Value::Int32(Some(v)) => write!(f, "{}", v),
            Value::Int64(Some(v)) => write!(f, "{}", v),
            Value::Float64(Some(v)) => f.write_str(ryu::Buffer::new().format(*v)),
            Value::Decimal(Some(v)) => write!(f, "{}", v),
            Value::Char(Some(v)) => write!(f, "\"{}\"", v),
            Value::Varchar(Some(v)) => write!(f, "\"{}\"", v),
            Value::Blob(Some(v)) => write!(f, "[{} bytes]", v.len()),
            Value::Date(Some(v)) => write!(f, "{}", v),
            Value::Time(Some(v)) => write!(f, "{}", v),
            Value::Timestamp(Some(v)) => write!(f, "{}", v),
            Value::Uuid(Some(v)) => write!(f, "{}", v),
            _ => f.write_str("null"),
        }
    }
}

/// Comma separated rendering used when logging bound values.
pub struct PrintableValues<'a>(pub &'a [Value]);

impl<'a> Display for PrintableValues<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}
