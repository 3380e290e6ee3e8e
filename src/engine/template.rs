//! `%{...}` interpolation of base URI templates.
//!
//! A token names a fact known to the host. `%{::name}` is the top-scope
//! spelling of `%{name}`, and dotted names (`%{facts.os.family}`) walk into
//! nested objects. Facts that do not exist interpolate to the empty string.

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Facts available to templates, keyed by top-level name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    values: Map<String, Value>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a top-level fact, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Resolves a possibly dotted fact name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = name.strip_prefix("::").unwrap_or(name);
        let mut segments = name.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<Map<String, Value>> for Facts {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Replaces every `%{name}` token in `template` with the named fact.
pub fn interpolate(template: &str, facts: &Facts) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| Error::Interpolation(format!("unterminated `%{{` in `{}`", template)))?;

        let name = after[..end].trim();
        if name.is_empty() {
            return Err(Error::Interpolation(format!("empty token in `{}`", template)));
        }
        if let Some(value) = facts.get(name) {
            out.push_str(&render(value));
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn facts() -> Facts {
        Facts::new()
            .with("environment", "production")
            .with("facts", json!({ "os": { "family": "Debian" }, "cores": 8 }))
    }

    #[test]
    fn test_plain_template_is_unchanged() {
        assert_eq!(interpolate("/app/", &facts()).unwrap(), "/app/");
    }

    #[test]
    fn test_interpolates_top_level_and_scoped_facts() {
        let out = interpolate("/%{environment}/%{::environment}/", &facts()).unwrap();
        assert_eq!(out, "/production/production/");
    }

    #[test]
    fn test_interpolates_dotted_facts() {
        let out = interpolate("/%{facts.os.family}/%{facts.cores}/", &facts()).unwrap();
        assert_eq!(out, "/Debian/8/");
    }

    #[test]
    fn test_missing_fact_is_empty() {
        assert_eq!(interpolate("/a/%{nope}/b", &facts()).unwrap(), "/a//b");
    }

    #[test]
    fn test_unterminated_token_fails() {
        assert!(matches!(interpolate("/a/%{env", &facts()), Err(Error::Interpolation(_))));
    }

    #[test]
    fn test_empty_token_fails() {
        assert!(matches!(interpolate("/a/%{ }/", &facts()), Err(Error::Interpolation(_))));
    }
}
