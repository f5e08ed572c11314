//! Schema adaptation
//!
//! Converts remote tool declarations into locally-typed descriptors. The
//! remote side speaks JSON Schema; locally we keep a small tagged variant
//! tree so argument validation and introspection do not chase dynamic
//! typing. Unrecognized remote types become [`ParamSchema::Opaque`] rather
//! than failing discovery.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::RemoteToolDef;

/// Typed parameter schema for a tool input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamSchema {
    /// UTF-8 string
    String,
    /// Number (integers and floats)
    Number,
    /// Boolean
    Bool,
    /// Homogeneous array
    Array {
        /// Element schema
        items: Box<ParamSchema>,
    },
    /// Object with named fields
    Object {
        /// Fields in declaration order
        fields: Vec<FieldSchema>,
    },
    /// Unrecognized remote type; any value is accepted
    Opaque,
}

/// One named field of an object schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field value schema
    pub schema: ParamSchema,
    /// Whether the field must be present
    #[serde(default)]
    pub required: bool,
}

/// Shape of a tool's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputShape {
    /// Content blocks, flattened to text by default
    Text,
    /// Provider declared a structured output schema
    Structured(ParamSchema),
}

/// A locally invocable tool descriptor
///
/// Immutable once adapted; the registry owns it for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a session's registry
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Input parameter schema
    pub input_schema: ParamSchema,
    /// Output shape
    pub output: OutputShape,
}

impl ToolDescriptor {
    /// Re-emit the input schema as JSON Schema, for agent runtimes that
    /// forward tool definitions to an LLM
    pub fn parameters_schema(&self) -> Value {
        to_json_schema(&self.input_schema)
    }
}

/// Adapt a remote tool declaration into a local descriptor. Pure.
pub fn adapt(remote: &RemoteToolDef) -> ToolDescriptor {
    ToolDescriptor {
        name: remote.name.clone(),
        description: remote.description.clone().unwrap_or_default(),
        input_schema: adapt_value(&remote.input_schema),
        output: match &remote.output_schema {
            Some(schema) => OutputShape::Structured(adapt_value(schema)),
            None => OutputShape::Text,
        },
    }
}

fn adapt_value(schema: &Value) -> ParamSchema {
    let Some(object) = schema.as_object() else {
        return ParamSchema::Opaque;
    };

    match object.get("type").and_then(Value::as_str) {
        Some("string") => ParamSchema::String,
        Some("number") | Some("integer") => ParamSchema::Number,
        Some("boolean") => ParamSchema::Bool,
        Some("array") => ParamSchema::Array {
            items: Box::new(object.get("items").map_or(ParamSchema::Opaque, adapt_value)),
        },
        Some("object") => {
            let required: Vec<&str> = object
                .get("required")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            let mut fields = Vec::new();
            if let Some(properties) = object.get("properties").and_then(Value::as_object) {
                for (name, property) in properties {
                    fields.push(FieldSchema {
                        name: name.clone(),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        schema: adapt_value(property),
                        required: required.contains(&name.as_str()),
                    });
                }
            }
            ParamSchema::Object { fields }
        }
        // null, union types, $ref, or anything newer than us
        _ => ParamSchema::Opaque,
    }
}

fn to_json_schema(schema: &ParamSchema) -> Value {
    match schema {
        ParamSchema::String => serde_json::json!({"type": "string"}),
        ParamSchema::Number => serde_json::json!({"type": "number"}),
        ParamSchema::Bool => serde_json::json!({"type": "boolean"}),
        ParamSchema::Array { items } => serde_json::json!({
            "type": "array",
            "items": to_json_schema(items)
        }),
        ParamSchema::Object { fields } => {
            let mut properties = serde_json::Map::new();
            let mut required = Vec::new();
            for field in fields {
                let mut property = to_json_schema(&field.schema);
                if let (Some(object), Some(description)) =
                    (property.as_object_mut(), &field.description)
                {
                    object.insert("description".to_string(), Value::String(description.clone()));
                }
                if field.required {
                    required.push(Value::String(field.name.clone()));
                }
                properties.insert(field.name.clone(), property);
            }
            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required
            })
        }
        ParamSchema::Opaque => serde_json::json!({}),
    }
}

/// Validate arguments against a schema, returning a human-readable reason
/// on mismatch. Undeclared extra fields are accepted; the provider
/// revalidates on its side.
pub fn validate(schema: &ParamSchema, arguments: &Value) -> std::result::Result<(), String> {
    check(schema, arguments, "arguments")
}

fn check(schema: &ParamSchema, value: &Value, path: &str) -> std::result::Result<(), String> {
    match schema {
        ParamSchema::String => value
            .is_string()
            .then_some(())
            .ok_or_else(|| format!("{path}: expected string")),
        ParamSchema::Number => value
            .is_number()
            .then_some(())
            .ok_or_else(|| format!("{path}: expected number")),
        ParamSchema::Bool => value
            .is_boolean()
            .then_some(())
            .ok_or_else(|| format!("{path}: expected boolean")),
        ParamSchema::Array { items } => {
            let Some(elements) = value.as_array() else {
                return Err(format!("{path}: expected array"));
            };
            for (index, element) in elements.iter().enumerate() {
                check(items, element, &format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        ParamSchema::Object { fields } => {
            let Some(object) = value.as_object() else {
                return Err(format!("{path}: expected object"));
            };
            for field in fields {
                match object.get(&field.name) {
                    Some(field_value) => {
                        check(&field.schema, field_value, &format!("{path}.{}", field.name))?;
                    }
                    None if field.required => {
                        return Err(format!("{path}: missing required field '{}'", field.name));
                    }
                    None => {}
                }
            }
            Ok(())
        }
        ParamSchema::Opaque => Ok(()),
    }
}
