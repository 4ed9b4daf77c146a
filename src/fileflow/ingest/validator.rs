//! Row validation and wire-payload construction
//!
//! A row is well-formed when its field count matches the header and every
//! field satisfies its declared column type. Type rules are configuration
//! policy, not hard-coded: columns without a declaration are plain strings
//! and only the structural check applies.

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};

use super::error::ValidationError;

/// Declared type for a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Number,
    Date,
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(ColumnType::String),
            "number" | "num" | "float" | "int" => Ok(ColumnType::Number),
            "date" => Ok(ColumnType::Date),
            _ => Err(format!("unknown column type: {}", s)),
        }
    }
}

/// A column declaration from the `[schema]` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

/// A row that passed validation, converted to its wire form.
#[derive(Debug, Clone)]
pub struct ValidatedRow {
    /// Message key, extracted from the configured key column if any
    pub key: Option<String>,
    /// JSON payload bytes mapping header names to typed values
    pub payload: Vec<u8>,
}

/// Validates parsed rows against the header and declared column types.
#[derive(Debug, Clone, Default)]
pub struct RowValidator {
    columns: Vec<ColumnSpec>,
    key_column: Option<String>,
}

impl RowValidator {
    pub fn new(columns: Vec<ColumnSpec>, key_column: Option<String>) -> Self {
        Self {
            columns,
            key_column,
        }
    }

    fn column_type(&self, name: &str) -> ColumnType {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.ty)
            .unwrap_or(ColumnType::String)
    }

    /// Validate one parsed data row and build its wire payload.
    ///
    /// `row_index` is 1-based over data rows and only used for error context.
    pub fn validate(
        &self,
        header: &[String],
        row_index: usize,
        fields: &[String],
    ) -> Result<ValidatedRow, ValidationError> {
        if fields.len() != header.len() {
            return Err(ValidationError {
                row_index,
                field: "<row>".to_string(),
                reason: format!(
                    "field count {} does not match header count {}",
                    fields.len(),
                    header.len()
                ),
            });
        }

        let mut key = None;
        let mut payload = Map::new();

        for (name, raw) in header.iter().zip(fields.iter()) {
            let value = self.typed_value(name, raw).map_err(|reason| ValidationError {
                row_index,
                field: name.clone(),
                reason,
            })?;

            let is_key = self
                .key_column
                .as_deref()
                .is_some_and(|k| k == name.as_str());
            if is_key {
                key = Some(raw.clone());
                // The key column rides as the message key, not in the payload
                continue;
            }
            payload.insert(name.clone(), value);
        }

        let payload = serde_json::to_vec(&Value::Object(payload)).map_err(|e| ValidationError {
            row_index,
            field: "<row>".to_string(),
            reason: format!("payload serialization failed: {}", e),
        })?;

        Ok(ValidatedRow { key, payload })
    }

    fn typed_value(&self, name: &str, raw: &str) -> Result<Value, String> {
        match self.column_type(name) {
            ColumnType::String => Ok(Value::String(raw.to_string())),
            ColumnType::Number => {
                let parsed: f64 = raw
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", raw))?;
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| format!("'{}' is not a finite number", raw))
            }
            ColumnType::Date => {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| format!("'{}' is not a date (expected YYYY-MM-DD)", raw))?;
                Ok(Value::String(raw.to_string()))
            }
        }
    }
}

/// RFC 4180 style CSV field splitting: quoted fields, doubled-quote escapes,
/// delimiters honored outside quotes only. Fields are trimmed.
pub fn parse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_fields_plain() {
        assert_eq!(parse_fields("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_fields("a, b ,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_fields_quotes_and_escapes() {
        assert_eq!(
            parse_fields(r#""hello, world",plain,"say ""hi""""#),
            vec!["hello, world", "plain", r#"say "hi""#]
        );
    }

    #[test]
    fn test_parse_fields_trailing_empty() {
        assert_eq!(parse_fields("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_field_count_mismatch() {
        let v = RowValidator::default();
        let err = v
            .validate(&header(&["id", "amount"]), 3, &fields(&["1"]))
            .unwrap_err();
        assert_eq!(err.row_index, 3);
        assert_eq!(err.field, "<row>");
    }

    #[test]
    fn test_number_column_rejects_garbage() {
        let v = RowValidator::new(
            vec![ColumnSpec {
                name: "amount".to_string(),
                ty: ColumnType::Number,
            }],
            None,
        );
        let err = v
            .validate(&header(&["id", "amount"]), 2, &fields(&["2", "bad"]))
            .unwrap_err();
        assert_eq!(err.field, "amount");
    }

    #[test]
    fn test_date_column() {
        let v = RowValidator::new(
            vec![ColumnSpec {
                name: "day".to_string(),
                ty: ColumnType::Date,
            }],
            None,
        );
        assert!(v
            .validate(&header(&["day"]), 1, &fields(&["2026-08-29"]))
            .is_ok());
        assert!(v
            .validate(&header(&["day"]), 1, &fields(&["29/08/2026"]))
            .is_err());
    }

    #[test]
    fn test_payload_is_typed_json() {
        let v = RowValidator::new(
            vec![ColumnSpec {
                name: "amount".to_string(),
                ty: ColumnType::Number,
            }],
            None,
        );
        let row = v
            .validate(&header(&["id", "amount"]), 1, &fields(&["1", "10.5"]))
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&row.payload).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["amount"], 10.5);
        assert!(row.key.is_none());
    }

    #[test]
    fn test_key_column_extracted_and_excluded() {
        let v = RowValidator::new(Vec::new(), Some("id".to_string()));
        let row = v
            .validate(&header(&["id", "amount"]), 1, &fields(&["42", "10.5"]))
            .unwrap();
        assert_eq!(row.key.as_deref(), Some("42"));
        let json: serde_json::Value = serde_json::from_slice(&row.payload).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["amount"], "10.5");
    }

    #[test]
    fn test_empty_field_passes_for_string_only() {
        let v = RowValidator::new(
            vec![ColumnSpec {
                name: "n".to_string(),
                ty: ColumnType::Number,
            }],
            None,
        );
        assert!(v.validate(&header(&["s"]), 1, &fields(&[""])).is_ok());
        assert!(v.validate(&header(&["n"]), 1, &fields(&[""])).is_err());
    }
}
