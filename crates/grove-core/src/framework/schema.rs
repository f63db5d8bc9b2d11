//! Declarative field schemas for framework steps.
//!
//! A [`StepSchema`] describes the fields a step's payload may carry. It is
//! rendered to a JSON value in two forms: the full form (length/count/range
//! constraints intact) used to prompt the primary model call, and a stripped
//! form (structure and `required` list only) used by the validator call so
//! that borderline-length but substantively fine answers are not rejected.

use serde_json::{Map, Value, json};

/// The shape of a single payload field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// A list of short free-text entries.
    TextList,
    /// A numeric value.
    Number,
    /// A boolean flag.
    Boolean,
    /// A list of structured objects described by nested specs.
    ObjectList(Vec<FieldSpec>),
}

/// Declarative description of one payload field.
///
/// Constructed via the kind-specific constructors plus builder methods for
/// bounds. Bounds are advisory for the model and stripped before validation.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub required: bool,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub allowed: Option<Vec<&'static str>>,
}

impl FieldSpec {
    fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            min_length: None,
            max_length: None,
            min_items: None,
            max_items: None,
            minimum: None,
            maximum: None,
            allowed: None,
        }
    }

    /// A free-text field.
    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Text, description)
    }

    /// A list of short free-text entries.
    pub fn text_list(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::TextList, description)
    }

    /// A numeric field.
    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Number, description)
    }

    /// A boolean field.
    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean, description)
    }

    /// A list of structured objects with the given member specs.
    pub fn object_list(
        name: &'static str,
        description: &'static str,
        members: Vec<FieldSpec>,
    ) -> Self {
        Self::new(name, FieldKind::ObjectList(members), description)
    }

    /// Marks the field as required within its enclosing object.
    ///
    /// Only meaningful for members of an [`FieldKind::ObjectList`]; top-level
    /// required fields are declared on the step itself.
    pub fn require(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets character-length bounds for text fields.
    pub fn with_length(mut self, min: u64, max: u64) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    /// Sets a maximum character length with no minimum.
    pub fn with_max_length(mut self, max: u64) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Sets item-count bounds for list fields.
    pub fn with_items(mut self, min: u64, max: u64) -> Self {
        self.min_items = Some(min);
        self.max_items = Some(max);
        self
    }

    /// Sets value bounds for numeric fields.
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.minimum = Some(min);
        self.maximum = Some(max);
        self
    }

    /// Restricts a text field to an enumerated set of values.
    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.allowed = Some(values.to_vec());
        self
    }

    fn to_value(&self) -> Value {
        let mut spec = Map::new();
        spec.insert("description".into(), json!(self.description));
        match &self.kind {
            FieldKind::Text => {
                spec.insert("type".into(), json!("string"));
                if let Some(min) = self.min_length {
                    spec.insert("minLength".into(), json!(min));
                }
                if let Some(max) = self.max_length {
                    spec.insert("maxLength".into(), json!(max));
                }
                if let Some(allowed) = &self.allowed {
                    spec.insert("enum".into(), json!(allowed));
                }
            }
            FieldKind::TextList => {
                spec.insert("type".into(), json!("array"));
                let mut items = Map::new();
                items.insert("type".into(), json!("string"));
                if let Some(max) = self.max_length {
                    items.insert("maxLength".into(), json!(max));
                }
                spec.insert("items".into(), Value::Object(items));
                if let Some(min) = self.min_items {
                    spec.insert("minItems".into(), json!(min));
                }
                if let Some(max) = self.max_items {
                    spec.insert("maxItems".into(), json!(max));
                }
            }
            FieldKind::Number => {
                spec.insert("type".into(), json!("number"));
                if let Some(min) = self.minimum {
                    spec.insert("minimum".into(), json!(min));
                }
                if let Some(max) = self.maximum {
                    spec.insert("maximum".into(), json!(max));
                }
            }
            FieldKind::Boolean => {
                spec.insert("type".into(), json!("boolean"));
            }
            FieldKind::ObjectList(members) => {
                spec.insert("type".into(), json!("array"));
                let mut properties = Map::new();
                let mut required = Vec::new();
                for member in members {
                    if member.required {
                        required.push(json!(member.name));
                    }
                    properties.insert(member.name.to_string(), member.to_value());
                }
                let mut items = Map::new();
                items.insert("type".into(), json!("object"));
                items.insert("properties".into(), Value::Object(properties));
                if !required.is_empty() {
                    items.insert("required".into(), Value::Array(required));
                }
                spec.insert("items".into(), Value::Object(items));
                if let Some(min) = self.min_items {
                    spec.insert("minItems".into(), json!(min));
                }
                if let Some(max) = self.max_items {
                    spec.insert("maxItems".into(), json!(max));
                }
            }
        }
        Value::Object(spec)
    }
}

/// The ordered field specs of one framework step.
#[derive(Debug, Clone)]
pub struct StepSchema {
    fields: Vec<FieldSpec>,
}

impl StepSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The field specs in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Renders the schema as a JSON object description.
    ///
    /// `required` lists the field names the step considers necessary for the
    /// step to be substantively addressed; the list is carried verbatim into
    /// the rendered value.
    pub fn to_value(&self, required: &[&'static str]) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.to_value());
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }
}

/// The constraint keys removed by [`strip_constraints`].
const CONSTRAINT_KEYS: [&str; 6] = [
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
];

/// Removes numeric/length constraint keys from a rendered schema, recursively.
///
/// The result keeps structure and the `required` lists so the validator call
/// judges content safety and structural conformance only. Stripping is
/// idempotent: stripping a stripped schema returns it unchanged.
pub fn strip_constraints(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, inner) in map {
                if CONSTRAINT_KEYS.contains(&key.as_str()) {
                    continue;
                }
                out.insert(key.clone(), strip_constraints(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_constraints).collect()),
        other => other.clone(),
    }
}
