//! Generated prompt — raw input, its scaffold, and the rendered outputs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scaffold::{Scaffold, SlotKey};
use crate::template::Template;

/// Current serialization schema of [`GeneratedPrompt`].
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    pub created_at: DateTime<Utc>,
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_model: Option<String>,
}

/// A prompt and its scaffold.
///
/// `formatted_outputs` is a cache over the scaffold: any scaffold change
/// clears it, and it is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrompt {
    id: String,
    raw_text: String,
    scaffold: Scaffold,
    #[serde(skip)]
    formatted_outputs: BTreeMap<String, String>,
    metadata: PromptMetadata,
}

impl GeneratedPrompt {
    pub fn new(raw_text: impl Into<String>, scaffold: Scaffold) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            raw_text: raw_text.into(),
            scaffold,
            formatted_outputs: BTreeMap::new(),
            metadata: PromptMetadata {
                created_at: Utc::now(),
                schema_version: SCHEMA_VERSION,
                target_model: None,
            },
        }
    }

    pub fn with_target_model(mut self, model: impl Into<String>) -> Self {
        self.metadata.target_model = Some(model.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn scaffold(&self) -> &Scaffold {
        &self.scaffold
    }

    pub fn metadata(&self) -> &PromptMetadata {
        &self.metadata
    }

    /// Edit one slot.
    pub fn set_slot(&mut self, key: SlotKey, content: impl Into<String>) {
        self.scaffold.set(key, content);
        self.formatted_outputs.clear();
    }

    /// Replace the whole scaffold.
    pub fn replace_scaffold(&mut self, scaffold: Scaffold) {
        self.scaffold = scaffold;
        self.formatted_outputs.clear();
    }

    /// Recompute every output for the given templates.
    pub fn render_all(&mut self, templates: &[Template]) -> &BTreeMap<String, String> {
        self.formatted_outputs = templates
            .iter()
            .map(|t| (t.id.clone(), t.render(&self.scaffold)))
            .collect();
        &self.formatted_outputs
    }

    /// A cached output, if rendered since the last scaffold change.
    pub fn formatted(&self, template_id: &str) -> Option<&str> {
        self.formatted_outputs.get(template_id).map(String::as_str)
    }

    pub fn formatted_outputs(&self) -> &BTreeMap<String, String> {
        &self.formatted_outputs
    }
}
