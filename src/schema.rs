//! Declarative output-shape descriptors.
//!
//! A [`SchemaDescriptor`] is plain data: it is rendered to JSON Schema to ask
//! the provider for constrained output, and the document parser uses the same
//! value to validate and project whatever the model sent back. Swapping the
//! descriptor swaps the artifact kind without touching pipeline logic.
//!
//! Validation runs through `jsonschema` against the rendered schema; only the
//! projection that drops undeclared fields is done here.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Type of a single field in a [`SchemaDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    /// Any JSON number, decoded verbatim.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    Boolean,
    /// Ordered sequence; element order is preserved through parsing.
    Array(Box<FieldType>),
    /// Nested object with its own declared fields.
    Object(Vec<Field>),
}

impl FieldType {
    /// Shorthand for `FieldType::Array(Box::new(items))`.
    pub fn array_of(items: FieldType) -> Self {
        FieldType::Array(Box::new(items))
    }

    fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array(_) => "array",
            FieldType::Object(_) => "object",
        }
    }
}

/// A named, typed field. Fields are required unless marked [`optional`](Field::optional).
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn array(name: impl Into<String>, items: FieldType) -> Self {
        Self::new(name, FieldType::array_of(items))
    }

    pub fn object(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(name, FieldType::Object(fields))
    }

    /// Allow the field to be absent (or `null`) in model output.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Attach a description forwarded to the provider's schema.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Why a decoded value does not conform to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// The value failed validation; one message per failed keyword.
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The rendered descriptor is not a usable JSON Schema.
    #[error("schema descriptor did not compile: {0}")]
    Descriptor(String),
}

/// Declarative description of the structured output expected from one
/// generation request. The root is always an object.
///
/// # Example
///
/// ```
/// use script_pipeline::schema::{Field, FieldType, SchemaDescriptor};
/// use serde_json::json;
///
/// let schema = SchemaDescriptor::new("pitch")
///     .field(Field::string("headline"))
///     .field(Field::array("tags", FieldType::String).optional());
///
/// let projected = schema
///     .project(&json!({"headline": "Hi", "extra": true}))
///     .unwrap();
/// assert_eq!(projected, json!({"headline": "Hi"}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    name: String,
    fields: Vec<Field>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a top-level field (builder style).
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Render as a JSON Schema object for provider-side constrained decoding.
    pub fn to_json_schema(&self) -> Value {
        object_schema(&self.fields, false)
    }

    /// Validate `value` and return a copy containing only declared fields.
    ///
    /// Required fields must be present and non-null; optional fields that are
    /// absent or `null` are omitted. No coercion between JSON types happens.
    pub fn project(&self, value: &Value) -> Result<Value, SchemaViolation> {
        let validator = jsonschema::validator_for(&self.validation_schema())
            .map_err(|e| SchemaViolation::Descriptor(e.to_string()))?;
        let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            return Err(SchemaViolation::Invalid(errors));
        }
        Ok(keep_declared(&self.fields, value))
    }

    /// The provider schema, except optional fields also accept `null`.
    fn validation_schema(&self) -> Value {
        object_schema(&self.fields, true)
    }

    /// Full single-video script: planning block, sectioned script body with
    /// re-hooks, per-platform social posts, and visual prompts.
    pub fn script() -> Self {
        let section = FieldType::Object(vec![
            Field::string("heading"),
            Field::string("content").describe("Spoken narration for this section"),
            Field::string("rehook")
                .describe("Line that re-captures attention before the next section"),
            Field::number("durationSeconds").optional(),
        ]);
        let post = FieldType::Object(vec![
            Field::string("platform"),
            Field::string("caption"),
            Field::array("hashtags", FieldType::String).optional(),
        ]);
        let video_prompt = FieldType::Object(vec![
            Field::string("scene"),
            Field::string("prompt").describe("Text-to-video or image generation prompt"),
        ]);

        Self::new("script")
            .field(Field::object(
                "planning",
                vec![
                    Field::string("hook"),
                    Field::string("targetAudience"),
                    Field::string("angle"),
                    Field::array("keyPoints", FieldType::String),
                ],
            ))
            .field(Field::object(
                "script",
                vec![
                    Field::string("title"),
                    Field::array("sections", section),
                    Field::string("callToAction"),
                ],
            ))
            .field(Field::array("socialPosts", post))
            .field(Field::array("videoPrompts", video_prompt))
    }

    /// Series proposal: an ordered list of episode titles and summaries.
    pub fn series_outline() -> Self {
        Self::new("series_outline").field(
            Field::array(
                "episodes",
                FieldType::Object(vec![Field::string("title"), Field::string("summary")]),
            )
            .describe("Episodes in broadcast order"),
        )
    }

    /// Short free-text report.
    pub fn report() -> Self {
        Self::new("report").field(Field::string("report"))
    }
}

fn field_schema(ty: &FieldType, nullable: bool) -> Value {
    match ty {
        FieldType::Array(items) => json!({"type": "array", "items": field_schema(items, nullable)}),
        FieldType::Object(fields) => object_schema(fields, nullable),
        other => json!({"type": other.label()}),
    }
}

fn object_schema(fields: &[Field], nullable: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let mut schema = field_schema(&field.ty, nullable);
        if let Some(obj) = schema.as_object_mut() {
            if let Some(ref desc) = field.description {
                obj.insert("description".into(), Value::String(desc.clone()));
            }
            if nullable && !field.required {
                let ty = obj.get("type").cloned().unwrap_or(Value::Null);
                obj.insert("type".into(), json!([ty, "null"]));
            }
        }
        properties.insert(field.name.clone(), schema);
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Copy of an already validated `value` holding only declared, non-null fields.
fn keep_declared(fields: &[Field], value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };
    let out: Map<String, Value> = fields
        .iter()
        .filter_map(|field| match obj.get(&field.name) {
            None | Some(Value::Null) => None,
            Some(v) => Some((field.name.clone(), keep_declared_value(&field.ty, v))),
        })
        .collect();
    Value::Object(out)
}

fn keep_declared_value(ty: &FieldType, value: &Value) -> Value {
    match (ty, value) {
        (FieldType::Object(fields), _) => keep_declared(fields, value),
        (FieldType::Array(items), Value::Array(arr)) => {
            Value::Array(arr.iter().map(|v| keep_declared_value(items, v)).collect())
        }
        _ => value.clone(),
    }
}
