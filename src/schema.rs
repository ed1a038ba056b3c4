//! Schema Projector
//!
//! Maps a tool's declarative input/output schema to a surface type
//! description used for sandbox stub signatures and catalog text, and
//! validates runtime arguments against that schema. Projection is total:
//! an unrecognized schema shape degrades to `any` rather than failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structural schema: primitives, arrays, objects with optional fields,
/// string-literal enumerations, nullable/optional wrappers, unions, and
/// literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schema {
    String,
    Number,
    Boolean,
    Array(Box<Schema>),
    Object {
        /// Ordered so projection and catalog text are deterministic.
        fields: Vec<ObjectField>,
    },
    /// A single string or number literal value, e.g. `"add"` or `5`.
    Literal(Value),
    /// A closed set of string literals, e.g. `"a" | "b"`.
    Enum(Vec<String>),
    Union(Vec<Schema>),
    Nullable(Box<Schema>),
    /// `T | undefined`, distinct from `Nullable` (`T | null`).
    Optional(Box<Schema>),
    /// Top type; anything not otherwise recognized projects to this.
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub name: String,
    pub schema: Schema,
    pub optional: bool,
}

impl ObjectField {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self { name: name.into(), schema, optional: false }
    }

    pub fn optional(name: impl Into<String>, schema: Schema) -> Self {
        Self { name: name.into(), schema, optional: true }
    }
}

/// A single structured validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub path: String,
    pub expected: String,
    pub received: String,
    pub message: String,
}

impl ValidationFailure {
    fn new(path: impl Into<String>, expected: impl Into<String>, received: &Value) -> Self {
        let expected = expected.into();
        let received_desc = describe_value(received);
        let path = path.into();
        Self {
            message: format!(
                "at {}: expected {}, received {}",
                if path.is_empty() { "<root>" } else { &path },
                expected,
                received_desc
            ),
            path,
            expected,
            received: received_desc,
        }
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean ({b})"),
        Value::Number(n) => format!("number ({n})"),
        Value::String(s) => format!("string ({s:?})"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

impl Schema {
    /// Render the projected surface type, e.g. `{ a: string; b?: number[] }`.
    pub fn project(&self) -> String {
        match self {
            Schema::String => "string".to_string(),
            Schema::Number => "number".to_string(),
            Schema::Boolean => "boolean".to_string(),
            Schema::Array(inner) => format!("{}[]", parenthesize_if_union(inner)),
            Schema::Object { fields } => {
                if fields.is_empty() {
                    return "{}".to_string();
                }
                let body = fields
                    .iter()
                    .map(|f| format!("{}{}: {}", f.name, if f.optional { "?" } else { "" }, f.schema.project()))
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("{{ {body} }}")
            }
            Schema::Literal(value) => match value {
                Value::String(s) => format!("{s:?}"),
                other => other.to_string(),
            },
            Schema::Enum(variants) => variants
                .iter()
                .map(|v| format!("{v:?}"))
                .collect::<Vec<_>>()
                .join(" | "),
            Schema::Union(members) => members
                .iter()
                .map(|m| m.project())
                .collect::<Vec<_>>()
                .join(" | "),
            Schema::Nullable(inner) => format!("{} | null", inner.project()),
            Schema::Optional(inner) => format!("{} | undefined", inner.project()),
            Schema::Any => "any".to_string(),
        }
    }

    /// Validate an arbitrary JSON value against this schema. Returns the
    /// empty `Vec` on success.
    pub fn validate(&self, value: &Value) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        self.validate_at("", value, &mut failures);
        failures
    }

    fn validate_at(&self, path: &str, value: &Value, out: &mut Vec<ValidationFailure>) {
        match self {
            Schema::Any => {}
            Schema::String => {
                if !value.is_string() {
                    out.push(ValidationFailure::new(path, "string", value));
                }
            }
            Schema::Number => {
                if !value.is_number() {
                    out.push(ValidationFailure::new(path, "number", value));
                }
            }
            Schema::Boolean => {
                if !value.is_boolean() {
                    out.push(ValidationFailure::new(path, "boolean", value));
                }
            }
            Schema::Array(inner) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        inner.validate_at(&format!("{path}[{i}]"), item, out);
                    }
                }
                None => out.push(ValidationFailure::new(path, "array", value)),
            },
            Schema::Object { fields } => match value.as_object() {
                Some(map) => {
                    for field in fields {
                        let field_path = if path.is_empty() {
                            field.name.clone()
                        } else {
                            format!("{path}.{}", field.name)
                        };
                        match map.get(&field.name) {
                            Some(v) => field.schema.validate_at(&field_path, v, out),
                            None if field.optional => {}
                            None => out.push(ValidationFailure::new(
                                &field_path,
                                field.schema.project(),
                                &Value::Null,
                            )),
                        }
                    }
                }
                None => out.push(ValidationFailure::new(path, "object", value)),
            },
            Schema::Literal(expected) => {
                if value != expected {
                    out.push(ValidationFailure::new(path, format!("literal {expected}"), value));
                }
            }
            Schema::Enum(variants) => {
                let matches = value.as_str().map(|s| variants.iter().any(|v| v == s)).unwrap_or(false);
                if !matches {
                    out.push(ValidationFailure::new(path, self.project(), value));
                }
            }
            Schema::Union(members) => {
                let ok = members.iter().any(|m| m.validate(value).is_empty());
                if !ok {
                    out.push(ValidationFailure::new(path, self.project(), value));
                }
            }
            Schema::Nullable(inner) => {
                if !value.is_null() {
                    inner.validate_at(path, value, out);
                }
            }
            Schema::Optional(inner) => {
                // Optional-ness at this level is handled by the containing
                // object field; if present it must still satisfy `inner`,
                // with `undefined` modeled as JSON `null`.
                if !value.is_null() {
                    inner.validate_at(path, value, out);
                }
            }
        }
    }
}

fn parenthesize_if_union(schema: &Schema) -> String {
    match schema {
        Schema::Union(_) | Schema::Nullable(_) | Schema::Optional(_) => format!("({})", schema.project()),
        _ => schema.project(),
    }
}

/// Render structured validation failures into a single agent-facing
/// message.
pub fn format_validation_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn projects_primitives() {
        assert_eq!(Schema::String.project(), "string");
        assert_eq!(Schema::Number.project(), "number");
        assert_eq!(Schema::Boolean.project(), "boolean");
        assert_eq!(Schema::Any.project(), "any");
    }

    #[test]
    fn projects_object_with_optional_field() {
        let schema = Schema::Object {
            fields: vec![
                ObjectField::new("city", Schema::String),
                ObjectField::optional("units", Schema::Enum(vec!["c".into(), "f".into()])),
            ],
        };
        assert_eq!(schema.project(), "{ city: string; units?: \"c\" | \"f\" }");
    }

    #[test]
    fn projects_array_of_union() {
        let schema = Schema::Array(Box::new(Schema::Union(vec![Schema::String, Schema::Number])));
        assert_eq!(schema.project(), "(string | number)[]");
    }

    #[test]
    fn validates_required_fields() {
        let schema = Schema::Object {
            fields: vec![ObjectField::new("city", Schema::String)],
        };
        let failures = schema.validate(&json!({}));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "city");
    }

    #[test]
    fn validates_nested_arrays() {
        let schema = Schema::Array(Box::new(Schema::Number));
        let failures = schema.validate(&json!([1, 2, "three"]));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "[2]");
    }

    #[test]
    fn optional_missing_field_is_ok() {
        let schema = Schema::Object {
            fields: vec![ObjectField::optional("units", Schema::String)],
        };
        assert!(schema.validate(&json!({})).is_empty());
    }

    #[test]
    fn nullable_accepts_null() {
        let schema = Schema::Nullable(Box::new(Schema::String));
        assert!(schema.validate(&json!(null)).is_empty());
        assert!(schema.validate(&json!("x")).is_empty());
        assert_eq!(schema.validate(&json!(5)).len(), 1);
    }

    #[test]
    fn enum_rejects_unknown_variant() {
        let schema = Schema::Enum(vec!["add".into(), "sub".into()]);
        assert!(schema.validate(&json!("add")).is_empty());
        assert_eq!(schema.validate(&json!("mul")).len(), 1);
    }

    #[test]
    fn unknown_shape_is_any_and_total() {
        // Projection never panics and always returns something for `Any`.
        let schema = Schema::Any;
        assert!(schema.validate(&json!({"whatever": [1, "x", null]})).is_empty());
    }

    #[test]
    fn union_accepts_any_member() {
        let schema = Schema::Union(vec![Schema::String, Schema::Number]);
        assert!(schema.validate(&json!("x")).is_empty());
        assert!(schema.validate(&json!(5)).is_empty());
        assert_eq!(schema.validate(&json!(true)).len(), 1);
    }
}
