//! `prompts/list` and `prompts/get`: named, versioned message templates a
//! client can fetch and fill with arguments. Argument substitution reuses
//! the same `{{var}}` mini-language as instruction templating rather than
//! inventing a second one.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

/// One named argument a prompt template accepts.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

impl PromptArgument {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None, required: false }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A prompt as registered: its metadata and the raw `{{var}}` template the
/// arguments are rendered into on `prompts/get`.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
    template: String,
}

impl Prompt {
    pub fn new(name: impl Into<String>, description: impl Into<String>, template: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), arguments: Vec::new(), template: template.into() }
    }

    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = PromptArgument>) -> Self {
        self.arguments = arguments.into_iter().collect();
        self
    }
}

/// A single rendered message in a `prompts/get` response.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

/// Error raised by `PromptRegistry::get` when a name is unknown or a
/// required argument is missing.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("no prompt named '{0}' is registered")]
    NotFound(String),
    #[error("prompt '{prompt}' requires argument '{argument}'")]
    MissingArgument { prompt: String, argument: String },
}

/// Holds registered `Prompt`s, keyed by name. Like `registry::ToolRegistry`,
/// registration happens once at startup; lookups never need to mutate.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: DashMap<String, Prompt>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, prompt: Prompt) {
        self.prompts.insert(prompt.name.clone(), prompt);
    }

    pub fn list(&self) -> Vec<Prompt> {
        let mut prompts: Vec<Prompt> = self.prompts.iter().map(|entry| entry.value().clone()).collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Renders `name`'s template against `arguments`, substituting `{{var}}`
    /// with the matching string value. Unrecognized variables render as an
    /// empty string, matching the instruction-templating crate's behavior.
    pub fn get(&self, name: &str, arguments: &Value) -> Result<PromptMessage, PromptError> {
        let prompt = self.prompts.get(name).ok_or_else(|| PromptError::NotFound(name.to_string()))?;
        let object = arguments.as_object();

        for argument in &prompt.arguments {
            if argument.required && object.and_then(|o| o.get(&argument.name)).is_none() {
                return Err(PromptError::MissingArgument { prompt: name.to_string(), argument: argument.name.clone() });
            }
        }

        let mut vars = HashMap::new();
        if let Some(object) = object {
            for (key, value) in object {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                vars.insert(key.clone(), rendered);
            }
        }

        Ok(PromptMessage { role: "user", content: render_vars(&prompt.template, &vars) })
    }
}

/// Substitutes `{{name}}` occurrences in `template` with `vars[name]`,
/// leaving unknown variables blank. A deliberately small subset of
/// `templating::TemplateEngine` — prompts don't need loops or predicates.
fn render_vars(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let name = after[..end].trim();
        out.push_str(vars.get(name).map(String::as_str).unwrap_or(""));
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_arguments_and_blanks_unknown_ones() {
        let registry = PromptRegistry::new();
        registry.register(
            Prompt::new("greet", "greets someone", "hello {{name}}, you are {{missing}} years old")
                .with_arguments([PromptArgument::new("name").required()]),
        );

        let rendered = registry.get("greet", &serde_json::json!({ "name": "ada" })).unwrap();
        assert_eq!(rendered.content, "hello ada, you are  years old");
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let registry = PromptRegistry::new();
        registry.register(Prompt::new("greet", "greets someone", "hi {{name}}").with_arguments([PromptArgument::new("name").required()]));

        let err = registry.get("greet", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, PromptError::MissingArgument { .. }));
    }

    #[test]
    fn unknown_prompt_is_an_error() {
        let registry = PromptRegistry::new();
        assert!(matches!(registry.get("nope", &Value::Null), Err(PromptError::NotFound(_))));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let registry = PromptRegistry::new();
        registry.register(Prompt::new("zeta", "z", ""));
        registry.register(Prompt::new("alpha", "a", ""));

        let names: Vec<String> = registry.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
