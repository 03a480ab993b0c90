//! Result rows returned by a [`StatementExecutor`](crate::executor::StatementExecutor).

use quarry_core::QuarryError;

use crate::value::Value;

/// One result row: column names and their values.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, QuarryError> {
        let value = self.get_value(column).ok_or_else(|| {
            QuarryError::ExecutionError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> Result<T, QuarryError> {
        let value = self.values.get(idx).ok_or_else(|| {
            QuarryError::ExecutionError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }
}

/// Conversion from a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, QuarryError>;
}

fn mismatch(expected: &str, value: &Value) -> QuarryError {
    QuarryError::ExecutionError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::Int(i) => u64::try_from(*i)
                .map_err(|e| QuarryError::ExecutionError(format!("Int value out of u64 range: {e}"))),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            _ => Err(mismatch("Float", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => Err(mismatch("Bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            _ => Err(mismatch("Uuid", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, QuarryError> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_typed() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string(), "score".to_string()],
            vec![Value::Int(42), Value::String("Alice".into()), Value::Int(7)],
        );
        assert_eq!(row.get::<i64>("id").unwrap(), 42);
        assert_eq!(row.get::<u64>("id").unwrap(), 42);
        assert_eq!(row.get::<String>("name").unwrap(), "Alice");
        let score: f64 = row.get("score").unwrap();
        assert!((score - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_row_get_optional() {
        let row = Row::new(vec!["bio".to_string()], vec![Value::Null]);
        let bio: Option<String> = row.get("bio").unwrap();
        assert_eq!(bio, None);
    }

    #[test]
    fn test_row_get_missing_and_mismatch() {
        let row = Row::new(vec!["name".to_string()], vec![Value::String("x".into())]);
        assert!(matches!(
            row.get::<String>("missing"),
            Err(QuarryError::ExecutionError(_))
        ));
        assert!(row.get::<i64>("name").is_err());
        assert!(row.get_by_index::<String>(3).is_err());
    }

    #[test]
    fn test_negative_count_is_not_u64() {
        let row = Row::new(vec!["n".to_string()], vec![Value::Int(-1)]);
        assert!(row.get::<u64>("n").is_err());
    }

    #[test]
    fn test_row_shape() {
        let row = Row::new(vec!["a".to_string(), "b".to_string()], vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(row.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(row.len(), 2);
        assert!(!row.is_empty());
        assert_eq!(row.get_value("b"), Some(&Value::Int(2)));
        assert_eq!(row.get_by_index::<i64>(0).unwrap(), 1);
    }
}
