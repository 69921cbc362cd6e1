//! Destination schema and request types

use super::{Result, SynthesisError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field mode in the warehouse schema format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// One named field; `RECORD` fields carry their children in `fields`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FieldMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SchemaField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            mode: None,
            fields: Vec::new(),
            description: None,
        }
    }

    pub fn is_repeated(&self) -> bool {
        self.mode == Some(FieldMode::Repeated)
    }

    pub fn is_record(&self) -> bool {
        matches!(self.field_type.to_ascii_uppercase().as_str(), "RECORD" | "STRUCT")
    }
}

/// Destination schema as a tree of named fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaDescriptor {
    pub fields: Vec<SchemaField>,
}

impl SchemaDescriptor {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Accepts `{"fields": [...]}` or a bare field array
    pub fn from_json(value: &Value) -> Result<Self> {
        let fields = match value {
            Value::Array(_) => value,
            Value::Object(map) => map
                .get("fields")
                .ok_or_else(|| {
                    SynthesisError::InvalidSchema("missing \"fields\" key".to_string())
                })?,
            other => {
                return Err(SynthesisError::InvalidSchema(format!(
                    "expected an object or array, got {}",
                    json_kind(other)
                )));
            }
        };

        let fields: Vec<SchemaField> = serde_json::from_value(fields.clone())
            .map_err(|e| SynthesisError::InvalidSchema(e.to_string()))?;

        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SynthesisError::InvalidSchema(format!("not valid JSON: {}", e)))?;
        Self::from_json(&value)
    }

    /// At least one field, and no field without a name at any depth
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SynthesisError::InvalidSchema("schema has no fields".to_string()));
        }

        fn check(fields: &[SchemaField], path: &str) -> Result<()> {
            for field in fields {
                if field.name.trim().is_empty() {
                    return Err(SynthesisError::InvalidSchema(format!(
                        "unnamed field under '{}'",
                        if path.is_empty() { "<root>" } else { path }
                    )));
                }
                let child = if path.is_empty() {
                    field.name.clone()
                } else {
                    format!("{}.{}", path, field.name)
                };
                check(&field.fields, &child)?;
            }
            Ok(())
        }

        check(&self.fields, "")
    }

    /// Serialized form embedded in prompts
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Top-level field names in schema order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One synthesis request: source table, destination table, destination schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformationRequest {
    pub source_ref: String,
    pub destination_ref: String,
    pub destination_schema: SchemaDescriptor,
}

impl TransformationRequest {
    /// Table references are stored without identifier quotes
    pub fn new(
        source_ref: &str,
        destination_ref: &str,
        destination_schema: SchemaDescriptor,
    ) -> Result<Self> {
        let source_ref = bare_reference(source_ref);
        let destination_ref = bare_reference(destination_ref);

        if source_ref.is_empty() {
            return Err(SynthesisError::InvalidRequest(
                "source table reference is empty".to_string(),
            ));
        }
        if destination_ref.is_empty() {
            return Err(SynthesisError::InvalidRequest(
                "destination table reference is empty".to_string(),
            ));
        }
        destination_schema.validate()?;

        if destination_ref.split('.').count() != 3 {
            tracing::debug!("Destination '{}' is not a three-part reference", destination_ref);
        }

        Ok(Self { source_ref, destination_ref, destination_schema })
    }
}

pub(crate) fn bare_reference(reference: &str) -> String {
    reference.trim().replace('`', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_object_and_bare_array() {
        let wrapped = SchemaDescriptor::from_json(&json!({
            "fields": [{"name": "id", "type": "STRING"}]
        }))
        .unwrap();
        let bare = SchemaDescriptor::from_json(&json!([{"name": "id", "type": "STRING"}])).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.field_names(), vec!["id"]);
    }

    #[test]
    fn test_nested_record() {
        let schema = SchemaDescriptor::from_json(&json!([
            {"name": "priceInfo", "type": "RECORD", "mode": "NULLABLE", "fields": [
                {"name": "cost", "type": "FLOAT"},
                {"name": "currencyCode", "type": "STRING"}
            ]},
            {"name": "colorFamilies", "type": "STRING", "mode": "REPEATED"}
        ]))
        .unwrap();

        assert!(schema.fields[0].is_record());
        assert_eq!(schema.fields[0].fields.len(), 2);
        assert!(schema.fields[1].is_repeated());
    }

    #[test]
    fn test_rejects_empty_schema() {
        assert!(matches!(
            SchemaDescriptor::from_json(&json!({"fields": []})),
            Err(SynthesisError::InvalidSchema(_))
        ));
        assert!(SchemaDescriptor::from_json(&json!("id STRING")).is_err());
        assert!(SchemaDescriptor::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_rejects_unnamed_nested_field() {
        let err = SchemaDescriptor::from_json(&json!([
            {"name": "outer", "type": "RECORD", "fields": [{"name": " ", "type": "STRING"}]}
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("outer"));
    }

    #[test]
    fn test_request_strips_quotes() {
        let schema = SchemaDescriptor::new(vec![SchemaField::new("id", "STRING")]);
        let request = TransformationRequest::new("`proj.ds.src`", " proj.ds.dst ", schema).unwrap();
        assert_eq!(request.source_ref, "proj.ds.src");
        assert_eq!(request.destination_ref, "proj.ds.dst");
    }

    #[test]
    fn test_request_rejects_empty_refs() {
        let schema = SchemaDescriptor::new(vec![SchemaField::new("id", "STRING")]);
        assert!(matches!(
            TransformationRequest::new("``", "proj.ds.dst", schema.clone()),
            Err(SynthesisError::InvalidRequest(_))
        ));
        assert!(TransformationRequest::new("proj.ds.src", "", schema).is_err());
        assert!(
            TransformationRequest::new("a.b.c", "a.b.d", SchemaDescriptor::new(Vec::new())).is_err()
        );
    }
}
