//! Bound parameter values.
//!
//! The [`Value`] enum is what the compiler stores in the parameter maps of a
//! compiled statement. It covers the common SQL types and provides conversions
//! from standard Rust types, plus the normalization applied to the operand of
//! `IN` / `NOT IN` conditions.

use std::fmt;

use quarry_core::{QuarryError, QuarryResult};

/// A backend-agnostic representation of a bound value.
///
/// # Examples
///
/// ```
/// use quarry_db::value::Value;
///
/// let v = Value::from(42_i64);
/// assert_eq!(v, Value::Int(42));
///
/// let v: Value = ["a", "b"].into_iter().collect();
/// assert_eq!(v.in_items().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// Raw binary data.
    Bytes(Vec<u8>),
    /// A date without time.
    Date(chrono::NaiveDate),
    /// A date and time without timezone.
    DateTime(chrono::NaiveDateTime),
    /// A date and time with UTC timezone.
    DateTimeTz(chrono::DateTime<chrono::Utc>),
    /// A time without date.
    Time(chrono::NaiveTime),
    /// A UUID value.
    Uuid(uuid::Uuid),
    /// A JSON document.
    Json(serde_json::Value),
    /// A list of values, expanded element-wise by `IN` conditions.
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::DateTimeTz(dt) => write!(f, "{dt}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Json(j) => write!(f, "{j}"),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

// ── Conversions ────────────────────────────────────────────────────────

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    chrono::NaiveDate => Date,
    chrono::NaiveDateTime => DateTime,
    chrono::DateTime<chrono::Utc> => DateTimeTz,
    chrono::NaiveTime => Time,
    uuid::Uuid => Uuid,
    serde_json::Value => Json,
    Vec<Value> => List,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Collects any iterator (a `Vec<&str>`, a `HashSet<i64>`, ...) into a list.
impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::List(iter.into_iter().map(Into::into).collect())
    }
}

impl Value {
    /// Returns `true` if this value is `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to extract an integer value.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Expands this value into the element list bound by an `IN` condition.
    ///
    /// - `List` yields its elements.
    /// - A JSON array yields its elements, a JSON object its values in key order.
    /// - A string containing `,` is split on every comma.
    /// - `Null` is rejected.
    /// - Anything else is a one-element list.
    pub fn in_items(&self) -> QuarryResult<Vec<Value>> {
        match self {
            Self::Null => Err(QuarryError::InvalidInValue(
                "IN operand must not be null".to_string(),
            )),
            Self::List(items) => Ok(items.clone()),
            Self::Json(serde_json::Value::Array(items)) => {
                Ok(items.iter().cloned().map(Value::Json).map(Value::unwrap_json).collect())
            }
            Self::Json(serde_json::Value::Object(map)) => {
                Ok(map.values().cloned().map(Value::Json).map(Value::unwrap_json).collect())
            }
            Self::String(s) if s.contains(',') => {
                Ok(s.split(',').map(|piece| Value::String(piece.to_string())).collect())
            }
            other => Ok(vec![other.clone()]),
        }
    }

    /// Lowers JSON scalars to their native variants; containers stay JSON.
    fn unwrap_json(self) -> Self {
        match self {
            Self::Json(serde_json::Value::Null) => Self::Null,
            Self::Json(serde_json::Value::Bool(b)) => Self::Bool(b),
            Self::Json(serde_json::Value::String(s)) => Self::String(s),
            Self::Json(serde_json::Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Json(serde_json::Value::Number(n))
                }
            }
            other => other,
        }
    }
}
