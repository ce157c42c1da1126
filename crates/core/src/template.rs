//! Template rendering — scaffold → model-specific prompt string.
//!
//! A template body is literal text with `{key}` tokens. Rendering replaces
//! every token in one pass and then normalizes the comma-separated result so
//! empty slots never leave dangling separators behind.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::format::CustomFormat;
use crate::scaffold::{Scaffold, SlotKey};

/// Matches exactly the seven canonical tokens.
static SLOT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(St|Co|S|C|L|A|Q)\}").expect("valid regex"));

/// A named template body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub body: String,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            body: body.into(),
        }
    }

    /// Render this template against a scaffold.
    pub fn render(&self, scaffold: &Scaffold) -> String {
        render(scaffold, &self.body)
    }
}

impl From<&CustomFormat> for Template {
    fn from(format: &CustomFormat) -> Self {
        Template::new(&format.id, &format.name, &format.template)
    }
}

/// Built-in target model templates: `(id, name, body)`.
const BUILTIN_TEMPLATES: &[(&str, &str, &str)] = &[
    ("midjourney", "Midjourney", "{S}, {C}, {St}, {Co}, {L}, {A}, {Q}"),
    ("stable-diffusion", "Stable Diffusion", "{Q}, {S}, {C}, {St}, {L}, {Co}, {A}"),
    ("dall-e", "DALL·E", "{S} {C}, {St}, {Co}, {L}, {A}, {Q}"),
    ("flux", "Flux", "{St}, {S} {C}, {L}, {A}, {Co}, {Q}"),
    ("imagen", "Imagen", "{S}, {C}, {L}, {A}, {St}, {Co}, {Q}"),
    ("generic", "Generic", "{S}, {C}, {St}, {Co}, {L}, {A}, {Q}"),
];

/// All built-in templates, in display order.
pub fn builtin_templates() -> Vec<Template> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|(id, name, body)| Template::new(*id, *name, *body))
        .collect()
}

/// Look up a template by id: built-ins first, then custom formats.
pub fn resolve_template(id: &str, custom: &[CustomFormat]) -> Option<Template> {
    builtin_templates()
        .into_iter()
        .find(|t| t.id.eq_ignore_ascii_case(id))
        .or_else(|| custom.iter().find(|f| f.id == id).map(Template::from))
}

/// Render a template body against a scaffold.
///
/// Total: never fails, returns an empty string for an empty body or when
/// every referenced slot is empty.
pub fn render(scaffold: &Scaffold, body: &str) -> String {
    if body.trim().is_empty() {
        return String::new();
    }
    let substituted = SLOT_TOKEN_RE.replace_all(body, |caps: &Captures<'_>| {
        SlotKey::from_code(&caps[1])
            .map(|key| scaffold.get(key).trim().to_string())
            .unwrap_or_default()
    });
    cleanup(&substituted)
}

/// Drop empty comma segments and collapse whitespace.
pub fn cleanup(raw: &str) -> String {
    let joined = raw
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
