//! `Tool` trait, parameter field descriptors, and the JSON Schema each
//! `ToolDescriptor` derives from them.

use async_trait::async_trait;
use context::ToolInvocationContext;
use response::{ErrorInfo, ToolResult};
use serde_json::{Value, json};

/// The declared type of a single parameter, used both for validation and
/// for JSON Schema emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn schema_type(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// One parameter's name, type tag, and optional constraints (required,
/// range, min/max length, pattern, enum). Built with a small fluent
/// builder rather than derived by reflection.
#[derive(Debug, Clone)]
pub struct ParamField {
    pub name: String,
    pub type_tag: ParamType,
    pub description: Option<String>,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub enum_values: Option<Vec<String>>,
    pub non_empty: bool,
}

impl ParamField {
    fn new(name: impl Into<String>, type_tag: ParamType) -> Self {
        Self {
            name: name.into(),
            type_tag,
            description: None,
            required: false,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            enum_values: None,
            non_empty: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Object)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = json!({ "type": self.type_tag.schema_type() });

        if let Some(description) = &self.description {
            schema["description"] = json!(description);
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            schema["minimum"] = json!(min);
            schema["maximum"] = json!(max);
        }
        if let Some(min_length) = self.min_length {
            schema["minLength"] = json!(min_length);
        }
        if let Some(max_length) = self.max_length {
            schema["maxLength"] = json!(max_length);
        }
        if let Some(pattern) = &self.pattern {
            schema["pattern"] = json!(pattern);
        }
        if let Some(values) = &self.enum_values {
            schema["enum"] = json!(values);
        }
        if self.non_empty && self.type_tag == ParamType::Array {
            schema["minItems"] = json!(1);
        }

        schema
    }
}

/// Immutable registry entry built from a `Tool` at registration time.
/// Never mutated after construction; destroyed at server shutdown along
/// with the rest of the registry.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamField>,
    pub category: String,
    pub priority: Option<i32>,
}

impl ToolDescriptor {
    /// A JSON Schema object derived from `parameters`, for `tools/list`.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for field in &self.parameters {
            properties.insert(field.name.clone(), field.json_schema());
            if field.required {
                required.push(field.name.clone());
            }
        }

        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }
}

/// A named, parameterized operation the server exposes via JSON-RPC.
/// Implementations are expected to build their own `ToolResult<Value>` by
/// way of a `response::ResponseBuilder`; the dispatcher treats the result
/// as opaque data to shape through the middleware chain.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<ParamField>;

    fn category(&self) -> &str {
        "general"
    }

    fn priority(&self) -> Option<i32> {
        None
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            category: self.category().to_string(),
            priority: self.priority(),
        }
    }

    async fn call(&self, params: Value, ctx: ToolInvocationContext) -> Result<ToolResult<Value>, ErrorInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_field_appears_in_schema_required_array() {
        let descriptor = ToolDescriptor {
            name: "echo".into(),
            description: "echoes".into(),
            parameters: vec![ParamField::string("text").required(), ParamField::number("count")],
            category: "general".into(),
            priority: None,
        };

        let schema = descriptor.input_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required, &vec![json!("text")]);
        assert_eq!(schema["properties"]["text"]["type"], json!("string"));
    }

    #[test]
    fn range_and_pattern_constraints_serialize() {
        let field = ParamField::number("age").range(0.0, 130.0);
        let schema = field.json_schema();
        assert_eq!(schema["minimum"], json!(0.0));
        assert_eq!(schema["maximum"], json!(130.0));

        let field = ParamField::string("slug").pattern("^[a-z-]+$");
        let schema = field.json_schema();
        assert_eq!(schema["pattern"], json!("^[a-z-]+$"));
    }
}
