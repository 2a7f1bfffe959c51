use crate::{Error, Result, Value, truncate_long};
use anyhow::Context;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{any, fmt::Display};
use time::format_description::parse_borrowed;
use uuid::Uuid;

/// Conversion between native field types and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant of the type and the
/// representations drivers commonly hand back (wider integers, text for
/// temporal values, decimals and uuids).
///
/// ```rust
/// use trove_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i32 = AsValue::try_from_value(Value::Int64(Some(42))).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Null value of the variant used by this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn integer_from<S, T>(value: T) -> Result<S>
where
    S: TryFrom<T>,
    T: Display + Copy,
{
    S::try_from(value).map_err(|_| {
        Error::msg(format!(
            "Value {} is out of range for {}",
            value,
            any::type_name::<S>()
        ))
    })
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    $(
                        #[allow(unreachable_patterns)]
                        $pat_rest => $expr_rest,
                    )*
                    _ => Err(Error::msg(format!(
                        "Cannot convert {value:?} to {}",
                        any::type_name::<Self>(),
                    ))),
                }
            }
        }
    };
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl_as_value!(
            $source,
            $destination,
            Value::Int8(Some(v)) => integer_from(v),
            Value::Int16(Some(v)) => integer_from(v),
            Value::Int32(Some(v)) => integer_from(v),
            Value::Int64(Some(v)) => integer_from(v),
            Value::Boolean(Some(v)) => Ok(v as $source),
            Value::Varchar(Some(ref v)) => v.trim().parse::<$source>().with_context(|| {
                format!(
                    "Cannot parse `{}` as {}",
                    truncate_long!(v),
                    any::type_name::<Self>()
                )
            }),
        );
    };
}

impl_as_value_integer!(i8, Value::Int8);
impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);

impl_as_value!(
    bool,
    Value::Boolean,
    Value::Int8(Some(v)) => Ok(v != 0),
    Value::Int16(Some(v)) => Ok(v != 0),
    Value::Int32(Some(v)) => Ok(v != 0),
    Value::Int64(Some(v)) => Ok(v != 0),
    Value::Varchar(Some(ref v)) => match v.trim() {
        "1" | "true" | "TRUE" | "t" | "T" => Ok(true),
        "0" | "false" | "FALSE" | "f" | "F" => Ok(false),
        _ => Err(Error::msg(format!("Cannot parse `{}` as bool", truncate_long!(v)))),
    },
);

impl_as_value!(
    f64,
    Value::Float64,
    Value::Int8(Some(v)) => Ok(v as f64),
    Value::Int16(Some(v)) => Ok(v as f64),
    Value::Int32(Some(v)) => Ok(v as f64),
    Value::Int64(Some(v)) => Ok(v as f64),
    Value::Decimal(Some(v)) => v
        .to_f64()
        .ok_or_else(|| Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))),
    Value::Varchar(Some(ref v)) => v
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Cannot parse `{}` as f64", truncate_long!(v))),
);

impl_as_value!(
    Decimal,
    Value::Decimal,
    Value::Int8(Some(v)) => Ok(Decimal::from(v)),
    Value::Int16(Some(v)) => Ok(Decimal::from(v)),
    Value::Int32(Some(v)) => Ok(Decimal::from(v)),
    Value::Int64(Some(v)) => Ok(Decimal::from(v)),
    Value::Float64(Some(v)) => Decimal::try_from(v)
        .with_context(|| format!("Cannot convert the f64 value `{}` to Decimal", v)),
    Value::Varchar(Some(ref v)) => v
        .trim()
        .parse::<Decimal>()
        .with_context(|| format!("Cannot parse `{}` as Decimal", truncate_long!(v))),
);

impl_as_value!(
    char,
    Value::Char,
    Value::Varchar(Some(ref v)) => {
        let mut chars = v.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::msg(format!(
                "Cannot convert `{}` into a char, exactly one character is expected",
                truncate_long!(v)
            ))),
        }
    },
    Value::Int8(Some(v)) => Ok(v as u8 as char),
    Value::Int64(Some(v)) => u8::try_from(v)
        .map(|v| v as char)
        .map_err(|_| Error::msg(format!("Value {} is not a valid char code", v))),
);

impl_as_value!(
    String,
    Value::Varchar,
    Value::Char(Some(v)) => Ok(v.to_string()),
);

impl_as_value!(
    Box<[u8]>,
    Value::Blob,
    Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
);

impl_as_value!(
    Uuid,
    Value::Uuid,
    Value::Varchar(Some(ref v)) => Uuid::parse_str(v.trim())
        .with_context(|| format!("Cannot parse `{}` as Uuid", truncate_long!(v))),
    Value::Blob(Some(ref v)) => Uuid::from_slice(v).context("Cannot read a Uuid from a blob"),
);

macro_rules! parse_time {
    ($value:expr, $($formats:literal),+ $(,)?) => {
        'value: {
            let value: &str = $value;
            for format in [$($formats,)+] {
                let format = parse_borrowed::<2>(format)?;
                let mut parsed = time::parsing::Parsed::new();
                if let Ok(remaining) = parsed.parse_items(value.as_bytes(), &format) {
                    if remaining.is_empty() {
                        break 'value Ok(parsed.try_into()?);
                    }
                }
            }
            Err(Error::msg(format!(
                "Cannot parse `{}` as {}",
                truncate_long!(value),
                any::type_name::<Self>()
            )))
        }
    };
}

impl_as_value!(
    time::Date,
    Value::Date,
    Value::Varchar(Some(ref v)) => parse_time!(v.trim(), "[year]-[month]-[day]"),
    Value::Timestamp(Some(v)) => Ok(v.date()),
);

impl_as_value!(
    time::Time,
    Value::Time,
    Value::Varchar(Some(ref v)) => parse_time!(
        v.trim(),
        "[hour]:[minute]:[second].[subsecond]",
        "[hour]:[minute]:[second]",
        "[hour]:[minute]",
    ),
    Value::Timestamp(Some(v)) => Ok(v.time()),
);

impl_as_value!(
    time::PrimitiveDateTime,
    Value::Timestamp,
    Value::Varchar(Some(ref v)) => parse_time!(
        v.trim(),
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]",
        "[year]-[month]-[day] [hour]:[minute]:[second]",
        "[year]-[month]-[day] [hour]:[minute]",
    ),
    Value::Date(Some(v)) => Ok(v.midnight()),
);

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }

    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }

    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(T::try_from_value(value)?))
    }
}

/// Textual form of a temporal value the way text based drivers store it.
pub fn temporal_to_text(value: &Value) -> Option<String> {
    Some(match value {
        Value::Date(Some(v)) => format!("{:04}-{:02}-{:02}", v.year(), v.month() as u8, v.day()),
        Value::Time(Some(v)) => format_time(v),
        Value::Timestamp(Some(v)) => {
            let date = v.date();
            format!(
                "{:04}-{:02}-{:02} {}",
                date.year(),
                date.month() as u8,
                date.day(),
                format_time(&v.time())
            )
        }
        _ => return None,
    })
}

fn format_time(v: &time::Time) -> String {
    if v.nanosecond() == 0 {
        format!("{:02}:{:02}:{:02}", v.hour(), v.minute(), v.second())
    } else {
        format!(
            "{:02}:{:02}:{:02}.{:09}",
            v.hour(),
            v.minute(),
            v.second(),
            v.nanosecond()
        )
    }
}
