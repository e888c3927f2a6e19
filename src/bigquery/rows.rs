//! Decoding of BigQuery's `{"f": [{"v": ...}]}` row encoding into typed JSON.

use super::types::FieldSchema;
use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// A row as returned by the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub f: Vec<RawCell>,
}

/// A single cell of a raw row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCell {
    #[serde(default)]
    pub v: Value,
}

/// Decode all rows against the result schema.
pub fn decode_rows(schema: &[FieldSchema], rows: &[RawRow]) -> Vec<Map<String, Value>> {
    rows.iter().map(|row| decode_record(schema, &row.f)).collect()
}

fn decode_record(fields: &[FieldSchema], cells: &[RawCell]) -> Map<String, Value> {
    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| (field.name.clone(), decode_field(field, &cell.v)))
        .collect()
}

fn decode_field(field: &FieldSchema, value: &Value) -> Value {
    if value.is_null() {
        return if field.is_repeated() {
            Value::Array(Vec::new())
        } else {
            Value::Null
        };
    }

    if field.is_repeated() {
        return match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| decode_single(field, item.get("v").unwrap_or(&Value::Null)))
                    .collect(),
            ),
            other => decode_single(field, other),
        };
    }

    decode_single(field, value)
}

fn decode_single(field: &FieldSchema, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match field.field_type.to_ascii_uppercase().as_str() {
        "RECORD" | "STRUCT" => {
            let cells: Vec<RawCell> = value
                .get("f")
                .and_then(|f| serde_json::from_value(f.clone()).ok())
                .unwrap_or_default();
            Value::Object(decode_record(&field.fields, &cells))
        }
        "INTEGER" | "INT64" => match value.as_str().and_then(|s| s.parse::<i64>().ok()) {
            Some(n) => Value::from(n),
            None => value.clone(),
        },
        "FLOAT" | "FLOAT64" => match value
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(Number::from_f64)
        {
            Some(n) => Value::Number(n),
            // NaN and Infinity have no JSON number form
            None => value.clone(),
        },
        "BOOLEAN" | "BOOL" => match value.as_str() {
            Some(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Some(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => value.clone(),
        },
        "TIMESTAMP" => match value.as_str().and_then(format_timestamp) {
            Some(ts) => Value::String(ts),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Timestamps arrive as floating-point seconds since the epoch, e.g. `1.7E9`.
fn format_timestamp(raw: &str) -> Option<String> {
    let seconds: f64 = raw.parse().ok()?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<RawRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scalar_types() {
        let schema = vec![
            FieldSchema::new("region", "STRING"),
            FieldSchema::new("cases", "INTEGER"),
            FieldSchema::new("avg_amount", "FLOAT"),
            FieldSchema::new("flagged", "BOOLEAN"),
            FieldSchema::new("total", "NUMERIC"),
            FieldSchema::new("seen_at", "TIMESTAMP"),
            FieldSchema::new("note", "STRING"),
        ];
        let data = rows(json!([{"f": [
            {"v": "Riyadh"},
            {"v": "42"},
            {"v": "1250.5"},
            {"v": "true"},
            {"v": "99999999999999999999.123"},
            {"v": "1.7E9"},
            {"v": null}
        ]}]));

        let decoded = decode_rows(&schema, &data);
        let row = &decoded[0];
        assert_eq!(row["region"], json!("Riyadh"));
        assert_eq!(row["cases"], json!(42));
        assert_eq!(row["avg_amount"], json!(1250.5));
        assert_eq!(row["flagged"], json!(true));
        assert_eq!(row["total"], json!("99999999999999999999.123"));
        assert_eq!(row["seen_at"], json!("2023-11-14T22:13:20Z"));
        assert_eq!(row["note"], Value::Null);
    }

    #[test]
    fn test_non_finite_float_kept_as_string() {
        let schema = vec![FieldSchema::new("ratio", "FLOAT64")];
        let decoded = decode_rows(&schema, &rows(json!([{"f": [{"v": "NaN"}]}])));
        assert_eq!(decoded[0]["ratio"], json!("NaN"));
    }

    #[test]
    fn test_nested_and_repeated() {
        let schema = vec![
            FieldSchema::new("tags", "STRING").with_mode("REPEATED"),
            FieldSchema::new("owner", "RECORD").with_fields(vec![
                FieldSchema::new("name", "STRING"),
                FieldSchema::new("age", "INTEGER"),
            ]),
            FieldSchema::new("history", "RECORD")
                .with_mode("REPEATED")
                .with_fields(vec![FieldSchema::new("amount", "FLOAT")]),
            FieldSchema::new("empty", "INTEGER").with_mode("REPEATED"),
        ];
        let data = rows(json!([{"f": [
            {"v": [{"v": "card"}, {"v": "online"}]},
            {"v": {"f": [{"v": "Sara"}, {"v": "31"}]}},
            {"v": [{"v": {"f": [{"v": "10.5"}]}}, {"v": {"f": [{"v": "3"}]}}]},
            {"v": null}
        ]}]));

        let decoded = decode_rows(&schema, &data);
        let row = &decoded[0];
        assert_eq!(row["tags"], json!(["card", "online"]));
        assert_eq!(row["owner"], json!({"name": "Sara", "age": 31}));
        assert_eq!(row["history"], json!([{"amount": 10.5}, {"amount": 3.0}]));
        assert_eq!(row["empty"], json!([]));
    }

    #[test]
    fn test_column_order_preserved_by_name() {
        let schema = vec![FieldSchema::new("b", "STRING"), FieldSchema::new("a", "STRING")];
        let decoded = decode_rows(&schema, &rows(json!([{"f": [{"v": "1"}, {"v": "2"}]}])));
        assert_eq!(decoded[0]["b"], json!("1"));
        assert_eq!(decoded[0]["a"], json!("2"));
    }
}
