//! Manifest template rendering
//!
//! Uses minijinja with `${...}` variable delimiters and strict undefined
//! handling: a template referencing a value the routing spec does not carry
//! fails at render time instead of producing a broken manifest. Rendered
//! YAML is converted to `serde_json::Value` for server-side apply.

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

/// Errors from template rendering or YAML conversion
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed
    Render(minijinja::Error),
    /// Rendered output is not valid YAML
    Yaml(String),
    /// Rendered manifest is not a YAML mapping
    NotAnObject(String),
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Yaml(msg) => write!(f, "yaml error: {}", msg),
            Self::NotAnObject(name) => write!(f, "manifest {} is not a YAML mapping", name),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err)
    }
}

/// Template engine for manifest placeholder resolution
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new engine with `${...}` variable syntax
    ///
    /// # Panics
    ///
    /// Panics if the minijinja syntax configuration fails to build. This
    /// cannot happen with the hardcoded delimiters used here; if it does,
    /// it indicates an incompatible minijinja version.
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("${", "}")
            .block_delimiters("{%", "%}")
            .comment_delimiters("{#", "#}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_filter("default", default_filter);
        env.add_filter("required", required);

        Self { env }
    }

    /// Render a template string with the given data context
    pub fn render(&self, template: &str, data: &Value) -> Result<String, TemplateError> {
        self.env
            .render_str(template, data)
            .map_err(TemplateError::from)
    }
}

/// Default filter - returns fallback if value is undefined or none
///
/// Usage: `${value | default("fallback")}`
fn default_filter(value: minijinja::Value, fallback: minijinja::Value) -> minijinja::Value {
    if value.is_undefined() || value.is_none() {
        fallback
    } else {
        value
    }
}

/// Required filter - fails if value is undefined
///
/// Usage: `${value | required}`
fn required(value: minijinja::Value) -> Result<minijinja::Value, minijinja::Error> {
    if value.is_undefined() {
        Err(minijinja::Error::new(
            minijinja::ErrorKind::UndefinedError,
            "required value is undefined",
        ))
    } else {
        Ok(value)
    }
}

/// Parse a single-document YAML string into a `serde_json::Value`.
///
/// Returns `Value::Null` for empty input.
pub fn parse_yaml(input: &str) -> Result<Value, TemplateError> {
    let docs =
        YamlLoader::load_from_str(input).map_err(|e| TemplateError::Yaml(e.to_string()))?;
    match docs.into_iter().next() {
        Some(doc) => yaml_to_json(doc),
        None => Ok(Value::Null),
    }
}

/// Convert a yaml_rust2::Yaml value to serde_json::Value
fn yaml_to_json(yaml: Yaml) -> Result<Value, TemplateError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| TemplateError::Yaml(e.to_string()))?;
            Ok(Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(arr) => arr
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Real(r) => r,
                    Yaml::Boolean(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    _ => return Err(TemplateError::Yaml("unsupported YAML key type".to_string())),
                };
                yaml_to_json(v).map(|v| (key, v))
            })
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(TemplateError::Yaml("YAML aliases not supported".to_string())),
        Yaml::BadValue => Err(TemplateError::Yaml("bad YAML value".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple_variable() {
        let engine = TemplateEngine::new();
        let data = json!({ "name": "gateway" });
        let out = engine.render("metadata:\n  name: ${name}", &data).unwrap();
        assert!(out.contains("name: gateway"));
    }

    #[test]
    fn test_render_nested_access() {
        let engine = TemplateEngine::new();
        let data = json!({ "ingressGateway": { "namespace": "mesh-ingress" } });
        let out = engine
            .render("namespace: ${ingressGateway.namespace}", &data)
            .unwrap();
        assert_eq!(out, "namespace: mesh-ingress");
    }

    #[test]
    fn test_render_undefined_is_an_error() {
        let engine = TemplateEngine::new();
        let err = engine.render("name: ${missing}", &json!({})).unwrap_err();
        assert!(err.to_string().contains("render error"));
    }

    #[test]
    fn test_default_filter() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(r#"name: ${missing | default("fallback")}"#, &json!({}))
            .unwrap();
        assert_eq!(out, "name: fallback");
    }

    #[test]
    fn test_parse_yaml_manifest() {
        let yaml = "apiVersion: v1\nkind: Service\nmetadata:\n  name: gw\nspec:\n  ports:\n    - port: 8080";
        let value = parse_yaml(yaml).unwrap();
        assert_eq!(value["kind"], "Service");
        assert_eq!(value["spec"]["ports"][0]["port"], 8080);
    }

    #[test]
    fn test_parse_yaml_empty() {
        assert_eq!(parse_yaml("").unwrap(), Value::Null);
    }
}
