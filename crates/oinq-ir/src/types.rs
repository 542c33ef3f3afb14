//! Type system for Oinq expressions

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type carried by every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    // Primitives
    Bool,
    Int64,
    Float64,
    String,
    DateTime,

    // Complex
    Record(RecordType),
    Array(Box<DataType>),

    // Relations
    /// A queryable sequence of the element type.
    Query(Box<DataType>),
    /// The element of a grouped relation: a key plus the bag of grouped rows.
    Grouping {
        key: Box<DataType>,
        element: Box<DataType>,
    },

    // Special
    Unknown,
}

impl DataType {
    pub fn query(element: DataType) -> Self {
        DataType::Query(Box::new(element))
    }

    pub fn grouping(key: DataType, element: DataType) -> Self {
        DataType::Grouping {
            key: Box::new(key),
            element: Box::new(element),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    pub fn is_query(&self) -> bool {
        matches!(self, DataType::Query(_))
    }

    /// Element type of a queryable sequence.
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Query(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            DataType::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Whether a value of `other` may stand where `self` is declared.
    ///
    /// `Unknown` unifies with anything and the two numeric types widen into
    /// each other.
    pub fn accepts(&self, other: &DataType) -> bool {
        match (self, other) {
            (DataType::Unknown, _) | (_, DataType::Unknown) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "bool"),
            DataType::Int64 => write!(f, "int64"),
            DataType::Float64 => write!(f, "float64"),
            DataType::String => write!(f, "string"),
            DataType::DateTime => write!(f, "datetime"),
            DataType::Record(record) => write!(f, "{}", record.name),
            DataType::Array(element) => write!(f, "array<{}>", element),
            DataType::Query(element) => write!(f, "query<{}>", element),
            DataType::Grouping { key, element } => write!(f, "grouping<{}, {}>", key, element),
            DataType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl FieldType {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A named host record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldType>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, fields: Vec<FieldType>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    /// Reference to a base data source by name; the root of every chain.
    Source(String),
}

impl Value {
    /// The semantic type a literal carries on its own.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null | Value::Source(_) => DataType::Unknown,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int64,
            Value::Float(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::DateTime(_) => DataType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        assert!(DataType::Int64.accepts(&DataType::Float64));
        assert!(DataType::Float64.accepts(&DataType::Int64));
        assert!(DataType::String.accepts(&DataType::Unknown));
        assert!(!DataType::String.accepts(&DataType::Int64));
        assert!(!DataType::Bool.accepts(&DataType::DateTime));
    }

    #[test]
    fn test_display() {
        let person = RecordType::new("Person", vec![FieldType::new("Name", DataType::String)]);
        assert_eq!(DataType::query(DataType::Record(person)).to_string(), "query<Person>");
        assert_eq!(
            DataType::grouping(DataType::String, DataType::Int64).to_string(),
            "grouping<string, int64>"
        );
    }
}
