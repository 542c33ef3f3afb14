//! Row projector: maps a positional raw row from the executor onto the
//! declared output shape, coercing each field to its semantic type.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{DataType, ExprError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// One named field per column.
    Record,
    /// A single bare value.
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedColumn {
    pub name: String,
    pub data_type: DataType,
}

impl ProjectedColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projector {
    pub columns: Vec<ProjectedColumn>,
    pub shape: Shape,
}

impl Projector {
    pub fn record(columns: Vec<ProjectedColumn>) -> Self {
        Self {
            columns,
            shape: Shape::Record,
        }
    }

    pub fn value(column: ProjectedColumn) -> Self {
        Self {
            columns: vec![column],
            shape: Shape::Value,
        }
    }

    /// Projector for rows of a pass-through relation of `element`.
    pub fn for_element(element: &DataType) -> Self {
        match element {
            DataType::Record(record) => Self::record(
                record
                    .fields
                    .iter()
                    .map(|f| ProjectedColumn::new(f.name.clone(), f.data_type.clone()))
                    .collect(),
            ),
            DataType::Grouping { key, element } => Self::record(vec![
                ProjectedColumn::new("Key", (**key).clone()),
                ProjectedColumn::new("Elements", DataType::Array(element.clone())),
            ]),
            other => Self::value(ProjectedColumn::new("value", other.clone())),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Project one raw row. The row must carry exactly one field per column.
    pub fn project(&self, row: &[JsonValue]) -> Result<JsonValue, ExprError> {
        if row.len() != self.columns.len() {
            return Err(ExprError::type_mismatch(
                "row",
                format!("{} fields", self.columns.len()),
                format!("{} fields", row.len()),
            ));
        }

        match self.shape {
            Shape::Value => coerce(&row[0], &self.columns[0].data_type, &self.columns[0].name),
            Shape::Record => {
                let mut object = serde_json::Map::with_capacity(row.len());
                for (column, raw) in self.columns.iter().zip(row) {
                    object.insert(
                        column.name.clone(),
                        coerce(raw, &column.data_type, &column.name)?,
                    );
                }
                Ok(JsonValue::Object(object))
            }
        }
    }
}

fn coerce(raw: &JsonValue, data_type: &DataType, target: &str) -> Result<JsonValue, ExprError> {
    // Null is the host's null for every type.
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }

    let mismatch = || ExprError::type_mismatch(target, data_type, describe(raw));

    match data_type {
        DataType::Unknown => Ok(raw.clone()),
        DataType::Bool => match raw {
            JsonValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            JsonValue::String(s) => s
                .trim()
                .parse::<bool>()
                .map(JsonValue::Bool)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Int64 => match raw {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_i64))
                .map(JsonValue::from)
                .ok_or_else(mismatch),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Float64 => match raw {
            JsonValue::Number(n) => n.as_f64().map(JsonValue::from).ok_or_else(mismatch),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(JsonValue::from)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::String => match raw {
            JsonValue::String(s) => Ok(JsonValue::String(s.clone())),
            _ => Err(mismatch()),
        },
        DataType::DateTime => {
            let parsed = match raw {
                JsonValue::String(s) => parse_datetime(s.trim()),
                JsonValue::Number(n) => n
                    .as_i64()
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|dt| dt.naive_utc()),
                _ => None,
            };
            let parsed = parsed.ok_or_else(mismatch)?;
            serde_json::to_value(parsed).map_err(|_| mismatch())
        }
        DataType::Record(record) => match raw {
            JsonValue::Array(items) if items.len() == record.fields.len() => {
                let mut object = serde_json::Map::with_capacity(items.len());
                for (field, item) in record.fields.iter().zip(items) {
                    object.insert(field.name.clone(), coerce(item, &field.data_type, &field.name)?);
                }
                Ok(JsonValue::Object(object))
            }
            JsonValue::Object(map) => {
                let mut object = serde_json::Map::with_capacity(record.fields.len());
                for field in &record.fields {
                    let item = map.get(&field.name).unwrap_or(&JsonValue::Null);
                    object.insert(field.name.clone(), coerce(item, &field.data_type, &field.name)?);
                }
                Ok(JsonValue::Object(object))
            }
            _ => Err(mismatch()),
        },
        DataType::Array(element) => match raw {
            JsonValue::Array(items) => items
                .iter()
                .map(|item| coerce(item, element, target))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            _ => Err(mismatch()),
        },
        DataType::Query(_) | DataType::Grouping { .. } => Err(mismatch()),
    }
}

/// A float with no fractional part that fits an i64 exactly.
fn whole_i64(f: f64) -> Option<i64> {
    // 2^63; i64::MAX itself is not representable as f64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f").ok())
}

fn describe(raw: &JsonValue) -> &'static str {
    match raw {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldType, RecordType};
    use serde_json::json;

    fn person_projector() -> Projector {
        Projector::for_element(&DataType::Record(RecordType::new(
            "Person",
            vec![
                FieldType::new("Name", DataType::String),
                FieldType::new("Age", DataType::Int64),
                FieldType::new("Email", DataType::String).nullable(),
            ],
        )))
    }

    #[test]
    fn test_project_record() {
        let row = person_projector()
            .project(&[json!("Alice"), json!("31"), json!("a@example.com")])
            .unwrap();
        assert_eq!(row, json!({"Name": "Alice", "Age": 31, "Email": "a@example.com"}));
    }

    #[test]
    fn test_null_field_maps_to_null() {
        let row = person_projector()
            .project(&[json!("Bob"), json!(40), JsonValue::Null])
            .unwrap();
        assert_eq!(row["Email"], JsonValue::Null);
    }

    #[test]
    fn test_arity_mismatch_fails() {
        let err = person_projector().project(&[json!("Bob"), json!(40)]).unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch { ref target, .. } if target == "row"));

        let err = person_projector()
            .project(&[json!("Bob"), json!(40), JsonValue::Null, json!(1)])
            .unwrap_err();
        assert!(matches!(err, ExprError::TypeMismatch { .. }));
    }

    #[test]
    fn test_field_type_mismatch() {
        let err = person_projector()
            .project(&[json!("Bob"), json!("forty"), JsonValue::Null])
            .unwrap_err();
        match err {
            ExprError::TypeMismatch { target, expected, found } => {
                assert_eq!(target, "Age");
                assert_eq!(expected, "int64");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_value_shape_and_datetime() {
        let projector = Projector::value(ProjectedColumn::new("Joined", DataType::DateTime));
        let value = projector.project(&[json!("2012-03-04 05:06:07")]).unwrap();
        assert_eq!(value, json!("2012-03-04T05:06:07"));

        let value = projector.project(&[json!("2012-03-04T05:06:07Z")]).unwrap();
        assert_eq!(value, json!("2012-03-04T05:06:07"));
    }

    #[test]
    fn test_whole_floats_in_integer_columns() {
        let projector = Projector::value(ProjectedColumn::new("Count", DataType::Int64));
        assert_eq!(projector.project(&[json!(42.0)]).unwrap(), json!(42));
        assert_eq!(projector.project(&[json!(-9.223372036854775808e18)]).unwrap(), json!(i64::MIN));

        for raw in [json!(1e30), json!(-1e30), json!(9.223372036854775808e18), json!(2.5)] {
            assert!(
                matches!(projector.project(&[raw.clone()]), Err(ExprError::TypeMismatch { .. })),
                "{raw} should not coerce to int64"
            );
        }
    }

    #[test]
    fn test_grouping_rows() {
        let projector = Projector::for_element(&DataType::grouping(
            DataType::String,
            DataType::Record(RecordType::new(
                "Sale",
                vec![FieldType::new("Amount", DataType::Float64)],
            )),
        ));
        let value = projector
            .project(&[json!("EU"), json!([[1.5], ["2"]])])
            .unwrap();
        assert_eq!(value, json!({"Key": "EU", "Elements": [{"Amount": 1.5}, {"Amount": 2.0}]}));
    }
}
