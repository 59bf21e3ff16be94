//! A small template language for rendering a capability summary to the
//! client: `{{var}}` substitution, `{{#each tools}}...{{/each}}` loops, and
//! three predicate helpers — `has_tool`, `has_marker`, `has_builtin` — as
//! `{{#if (has_tool "x")}}...{{/if}}` blocks. This is a rendering layer,
//! not a policy engine: the predicates are the only conditionals, and
//! there is no general-purpose expression language.
//!
//! Compiled templates are cached by source hash in a
//! `DashMap<String, Arc<CompiledTemplate>>` so a repeated render doesn't
//! re-parse.

use std::{collections::HashMap, fmt::Write as _, sync::Arc};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("'{{{{' at byte {0} has no matching '}}}}'")]
    UnterminatedTag(usize),
    #[error("'{0}' has no matching '{1}'")]
    UnmatchedBlock(&'static str, &'static str),
    #[error("unrecognized predicate '{0}'")]
    UnknownPredicate(String),
}

/// The data a template renders against: the registered tool names,
/// capability marker names, builtin middleware names, a priority map,
/// server identity, and a free-form variable bag.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub tools: Vec<String>,
    pub markers: Vec<String>,
    pub builtins: Vec<String>,
    pub priorities: HashMap<String, i32>,
    pub server_name: String,
    pub server_version: String,
    pub vars: HashMap<String, String>,
}

impl TemplateContext {
    pub fn new(server_name: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self { server_name: server_name.into(), server_version: server_version.into(), ..Default::default() }
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_markers(mut self, markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_builtins(mut self, builtins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.builtins = builtins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, tool: impl Into<String>, priority: i32) -> Self {
        self.priorities.insert(tool.into(), priority);
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    fn lookup(&self, name: &str, loop_item: Option<&str>) -> String {
        match name {
            "this" => loop_item.unwrap_or_default().to_string(),
            "server.name" => self.server_name.clone(),
            "server.version" => self.server_version.clone(),
            other => self.vars.get(other).cloned().unwrap_or_default(),
        }
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t == name)
    }

    fn has_marker(&self, name: &str) -> bool {
        self.markers.iter().any(|m| m == name)
    }

    fn has_builtin(&self, name: &str) -> bool {
        self.builtins.iter().any(|b| b == name)
    }

    fn list_for(&self, target: &str) -> &[String] {
        match target {
            "tools" => &self.tools,
            "markers" => &self.markers,
            "builtins" => &self.builtins,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    HasTool(String),
    HasMarker(String),
    HasBuiltin(String),
}

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Var(String),
    EachOpen(String),
    EachClose,
    IfOpen(Predicate),
    IfClose,
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Var(String),
    Each(String, Vec<Node>),
    If(Predicate, Vec<Node>),
}

/// A parsed template, ready to render against any `TemplateContext`.
#[derive(Debug)]
pub struct CompiledTemplate {
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let tokens = tokenize(source)?;
        let mut pos = 0;
        let nodes = parse_nodes(&tokens, &mut pos)?;

        if pos != tokens.len() {
            return Err(TemplateError::UnmatchedBlock("/each' or '/if", "a matching '#each'/'#if"));
        }

        Ok(Self { nodes })
    }

    pub fn render(&self, ctx: &TemplateContext) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, ctx, None, &mut out);
        out
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut byte_offset = 0usize;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }

        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(TemplateError::UnterminatedTag(byte_offset + start));
        };

        tokens.push(parse_tag(after[..end].trim())?);
        byte_offset += start + 2 + end + 2;
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }

    Ok(tokens)
}

fn parse_tag(inner: &str) -> Result<Token, TemplateError> {
    if let Some(target) = inner.strip_prefix("#each ") {
        return Ok(Token::EachOpen(target.trim().to_string()));
    }
    if inner == "/each" {
        return Ok(Token::EachClose);
    }
    if let Some(predicate) = inner.strip_prefix("#if ") {
        return Ok(Token::IfOpen(parse_predicate(predicate.trim())?));
    }
    if inner == "/if" {
        return Ok(Token::IfClose);
    }
    Ok(Token::Var(inner.to_string()))
}

/// Parses `(has_tool "name")`/`(has_marker "name")`/`(has_builtin "name")`.
fn parse_predicate(expr: &str) -> Result<Predicate, TemplateError> {
    let inner = expr
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| TemplateError::UnknownPredicate(expr.to_string()))?;

    let mut parts = inner.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default().trim().trim_matches('"');

    match name {
        "has_tool" => Ok(Predicate::HasTool(arg.to_string())),
        "has_marker" => Ok(Predicate::HasMarker(arg.to_string())),
        "has_builtin" => Ok(Predicate::HasBuiltin(arg.to_string())),
        other => Err(TemplateError::UnknownPredicate(other.to_string())),
    }
}

/// Recursively consumes `tokens[*pos..]` into a node tree, returning control
/// to the caller (without consuming it) on encountering a close tag that
/// belongs to an enclosing block, or the end of input at the top level.
fn parse_nodes(tokens: &[Token], pos: &mut usize) -> Result<Vec<Node>, TemplateError> {
    let mut nodes = Vec::new();

    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Text(text) => {
                nodes.push(Node::Text(text.clone()));
                *pos += 1;
            }
            Token::Var(name) => {
                nodes.push(Node::Var(name.clone()));
                *pos += 1;
            }
            Token::EachClose | Token::IfClose => return Ok(nodes),
            Token::EachOpen(target) => {
                let target = target.clone();
                *pos += 1;
                let children = parse_nodes(tokens, pos)?;
                match tokens.get(*pos) {
                    Some(Token::EachClose) => *pos += 1,
                    _ => return Err(TemplateError::UnmatchedBlock("#each", "/each")),
                }
                nodes.push(Node::Each(target, children));
            }
            Token::IfOpen(predicate) => {
                let predicate = predicate.clone();
                *pos += 1;
                let children = parse_nodes(tokens, pos)?;
                match tokens.get(*pos) {
                    Some(Token::IfClose) => *pos += 1,
                    _ => return Err(TemplateError::UnmatchedBlock("#if", "/if")),
                }
                nodes.push(Node::If(predicate, children));
            }
        }
    }

    Ok(nodes)
}

fn render_nodes(nodes: &[Node], ctx: &TemplateContext, loop_item: Option<&str>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(name) => out.push_str(&ctx.lookup(name, loop_item)),
            Node::Each(target, children) => {
                for item in ctx.list_for(target) {
                    render_nodes(children, ctx, Some(item), out);
                }
            }
            Node::If(predicate, children) => {
                let matched = match predicate {
                    Predicate::HasTool(name) => ctx.has_tool(name),
                    Predicate::HasMarker(name) => ctx.has_marker(name),
                    Predicate::HasBuiltin(name) => ctx.has_builtin(name),
                };
                if matched {
                    render_nodes(children, ctx, loop_item, out);
                }
            }
        }
    }
}

/// Renders templates, caching each compiled result by source hash so a
/// capability summary rendered on every `initialize` call only parses once.
#[derive(Default)]
pub struct TemplateEngine {
    cache: DashMap<String, Arc<CompiledTemplate>>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self, source: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let key = hash_source(source);

        let compiled = match self.cache.get(&key) {
            Some(entry) => Arc::clone(&entry),
            None => {
                let compiled = Arc::new(CompiledTemplate::compile(source)?);
                self.cache.insert(key, Arc::clone(&compiled));
                compiled
            }
        };

        Ok(compiled.render(ctx))
    }

    pub fn cached_template_count(&self) -> usize {
        self.cache.len()
    }
}

fn hash_source(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.as_slice() {
        write!(out, "{byte:02x}").unwrap();
    }
    out
}
