use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^\s{}]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// `{{ name }}` substitution. Names missing from the context are left as
/// they are in the output.
#[derive(Debug, Default, Clone)]
pub struct TemplateRenderer {
    context: HashMap<String, String>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the template context
    pub fn add_to_context(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn render(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match self.context.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}
