use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use regex::{Captures, Regex};

use crate::error::{Error, Result};

pub type TemplateName = String;

/// A named SPARQL query with `{{param}}` placeholders.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    pub name: TemplateName,
    pub text: String,
    /// Placeholder names in order of first appearance
    pub parameters: Vec<String>,
    /// File the template was loaded from, if any
    pub source: Option<PathBuf>,
}

impl QueryTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut parameters: Vec<String> = Vec::new();
        for captures in placeholder_pattern().captures_iter(&text) {
            let name = captures[1].to_string();
            if !parameters.contains(&name) {
                parameters.push(name);
            }
        }
        Self { name: name.into(), text, parameters, source: None }
    }
}

/// Ordered parameter values for rendering a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a parameter, replacing an earlier value of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistryConfig {
    /// Maximum number of templates that can be registered
    pub max_templates: Option<usize>,
}

/// Named SPARQL templates, filled once at startup and read-only afterwards.
pub struct TemplateRegistry {
    templates: Arc<RwLock<HashMap<TemplateName, QueryTemplate>>>,
    config: TemplateRegistryConfig,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        TemplateRegistry {
            templates: Arc::new(RwLock::new(HashMap::new())),
            config: TemplateRegistryConfig::default(),
        }
    }

    pub fn with_config(config: TemplateRegistryConfig) -> Self {
        TemplateRegistry { templates: Arc::new(RwLock::new(HashMap::new())), config }
    }

    /// Load every `*.sparql` file in `dir`, named after its file stem.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let registry = Self::new();
        registry.load_dir(dir)?;
        Ok(registry)
    }

    /// Load every `*.sparql` file in `dir`. Returns the number of templates added.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!("cannot read template directory {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "sparql"))
            .collect();
        paths.sort();

        for path in &paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(path)?;
            let mut template = QueryTemplate::new(name, text);
            template.source = Some(path.clone());
            self.insert(template)?;
        }

        tracing::info!(dir = %dir.display(), templates = paths.len(), "loaded query templates");
        Ok(paths.len())
    }

    /// Register a template under `name`.
    pub fn register(&self, name: impl Into<String>, text: impl Into<String>) -> Result<()> {
        self.insert(QueryTemplate::new(name, text))
    }

    fn insert(&self, template: QueryTemplate) -> Result<()> {
        let mut templates = self.write()?;
        if templates.contains_key(&template.name) {
            return Err(Error::Query(format!("template '{}' is already registered", template.name)));
        }
        if let Some(max) = self.config.max_templates {
            if templates.len() >= max {
                return Err(Error::Query(format!("maximum of {} templates reached", max)));
            }
        }
        templates.insert(template.name.clone(), template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<QueryTemplate> {
        self.templates.read().ok()?.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.read().is_ok_and(|t| t.contains_key(name))
    }

    /// Render `name` with `params`. Every placeholder must have a value;
    /// values are escaped for use inside SPARQL string literals.
    pub fn render(&self, name: &str, params: &QueryParams) -> Result<String> {
        let templates = self.read()?;
        let template = templates
            .get(name)
            .ok_or_else(|| Error::Query(format!("unknown query template '{}'", name)))?;

        let missing: Vec<&str> = template
            .parameters
            .iter()
            .map(String::as_str)
            .filter(|p| params.get(p).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Query(format!(
                "template '{}' is missing parameters: {}",
                name,
                missing.join(", ")
            )));
        }

        let rendered = placeholder_pattern().replace_all(&template.text, |caps: &Captures| {
            params.get(&caps[1]).map(escape_literal).unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }

    pub fn list_all(&self) -> Vec<TemplateName> {
        let mut names: Vec<TemplateName> =
            self.templates.read().map(|t| t.keys().cloned().collect()).unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<TemplateName, QueryTemplate>>> {
        self.templates.read().map_err(|_| Error::Query("template registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<TemplateName, QueryTemplate>>> {
        self.templates.write().map_err(|_| Error::Query("template registry lock poisoned".to_string()))
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder regex")
    })
}

/// Escape a value for a SPARQL string literal (`STRING_LITERAL_QUOTE` and friends).
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_collected_once() {
        let t = QueryTemplate::new("t", "SELECT * { ?s ?p \"{{q}}\" } LIMIT {{limit}} # {{ q }}");
        assert_eq!(t.parameters, vec!["q", "limit"]);
    }

    #[test]
    fn test_render() {
        let registry = TemplateRegistry::new();
        registry.register("search", "SELECT * WHERE { ?p rdfs:label \"{{q}}\" } LIMIT {{limit}}").unwrap();
        let sparql = registry
            .render("search", &QueryParams::new().with("q", "Ada \"the\" Countess").with("limit", 10))
            .unwrap();
        assert_eq!(sparql, "SELECT * WHERE { ?p rdfs:label \"Ada \\\"the\\\" Countess\" } LIMIT 10");
    }

    #[test]
    fn test_missing_parameter() {
        let registry = TemplateRegistry::new();
        registry.register("t", "{{a}} {{b}}").unwrap();
        let err = registry.render("t", &QueryParams::new().with("a", 1)).unwrap_err();
        assert!(err.to_string().contains("missing parameters: b"));
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let registry = TemplateRegistry::new();
        registry.register("t", "ASK {}").unwrap();
        assert!(registry.register("t", "ASK {}").is_err());
        assert!(registry.render("other", &QueryParams::new()).is_err());
        assert_eq!(registry.list_all(), vec!["t".to_string()]);
    }

    #[test]
    fn test_max_templates() {
        let registry = TemplateRegistry::with_config(TemplateRegistryConfig { max_templates: Some(1) });
        registry.register("a", "ASK {}").unwrap();
        assert!(registry.register("b", "ASK {}").is_err());
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("persons.sparql"), "SELECT ?p WHERE { ?p a <{{type}}> }").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = TemplateRegistry::from_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        let template = registry.get("persons").unwrap();
        assert_eq!(template.parameters, vec!["type"]);
        assert!(template.source.is_some());
    }

    #[test]
    fn test_params_replace_in_place() {
        let mut params = QueryParams::new().with("a", 1).with("b", 2);
        params.insert("a", 3);
        let pairs: Vec<(&str, &str)> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }
}
