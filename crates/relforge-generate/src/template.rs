use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::errors::GenerationError;

const TOKEN_PATTERN: &str = r"\{([A-Z][A-Z0-9_]*)\}";

/// Token -> text map consumed by [`replace_template`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateValues {
    values: BTreeMap<String, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(token.to_string(), value.into());
        self
    }

    pub fn with(mut self, token: &str, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }
}

fn token_regex() -> Result<&'static Regex, GenerationError> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(TOKEN_PATTERN).ok())
        .as_ref()
        .ok_or_else(|| GenerationError::Template("invalid token pattern".to_string()))
}

/// Substitute every `{TOKEN}` in one pass.
///
/// Substituted text is not rescanned, so values may contain braces. Any token
/// without a value is an error.
pub fn replace_template(
    template: &str,
    values: &TemplateValues,
) -> Result<String, GenerationError> {
    let regex = token_regex()?;
    if let Some(missing) = regex
        .captures_iter(template)
        .map(|captures| captures[1].to_string())
        .find(|token| values.get(token).is_none())
    {
        return Err(GenerationError::UnresolvedToken { token: missing });
    }

    let replaced = regex.replace_all(template, |captures: &Captures<'_>| {
        values.get(&captures[1]).unwrap_or_default().to_string()
    });
    Ok(replaced.into_owned())
}

/// Drop whitespace-only lines left behind by empty fragments.
pub fn remove_empty_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// `replace_template` followed by `remove_empty_lines`.
pub fn render(template: &str, values: &TemplateValues) -> Result<String, GenerationError> {
    Ok(remove_empty_lines(&replace_template(template, values)?))
}

/// Indent every non-empty line of `text` by `depth` levels of four spaces.
pub fn indent(text: &str, depth: usize) -> String {
    let pad = "    ".repeat(depth);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
