//! Template interpolation for table definitions
//!
//! Handles `{{ variable }}` interpolation in `get_endpoint` paths and
//! `title` templates. Supports nested access like `{{ item.displayName }}`
//! and the object key as `{{ key }}`.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Raw provider item
    pub item: Value,
    /// Object key for single-object lookups
    pub key: Value,
    /// Additional context variables
    pub vars: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for one provider item
    pub fn for_item(item: Value) -> Self {
        Self {
            item,
            ..Default::default()
        }
    }

    /// Context for a key lookup
    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            key: Value::String(key.into()),
            ..Default::default()
        }
    }

    /// Set additional variables
    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Get a value by path (e.g., "item.displayName")
    ///
    /// Paths without a known root are looked up on the item.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (root, rest) = match parts[0] {
            "item" => (&self.item, &parts[1..]),
            "key" => (&self.key, &parts[1..]),
            "vars" => (&self.vars, &parts[1..]),
            _ => (&self.item, &parts[..]),
        };
        get_nested_value(root, rest).filter(|v| !v.is_null())
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let full_match = &cap[0];
        let var_path = &cap[1];

        match ctx.get(var_path) {
            Some(value) => {
                let replacement = value_to_string(value);
                result = result.replace(full_match, &replacement);
            }
            None => {
                errors.push(var_path.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Item fields a template reads, as top-level provider field names
pub fn item_fields(template: &str) -> Vec<String> {
    extract_variables(template)
        .into_iter()
        .filter_map(|var| {
            let mut parts = var.split('.');
            match parts.next()? {
                "key" | "vars" => None,
                "item" => parts.next().map(str::to_string),
                field => Some(field.to_string()),
            }
        })
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
