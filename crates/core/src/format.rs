//! Custom formats — user-authored templates, their validation, and the
//! persisted collection that holds them.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FormatError;
use crate::scaffold::{ScaffoldSlot, SlotKey, canonical_slots};
use crate::storage::KeyValueStore;

/// Storage key of the persisted format collection.
pub const FORMATS_KEY: &str = "customFormats";

/// Anything brace-delimited, recognized or not.
static BRACED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid regex"));

/// A user-authored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFormat {
    pub id: String,
    pub name: String,
    pub template: String,
    /// Result of the last validation.
    #[serde(default)]
    pub validation: bool,
    /// Slot list snapshot taken at creation, for display only.
    #[serde(default)]
    pub slots: Vec<ScaffoldSlot>,
}

impl CustomFormat {
    /// A new format with a fresh id and validation computed.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            validation: validate_template(&template).is_valid,
            template,
            slots: canonical_slots(),
        }
    }
}

/// Outcome of validating a template string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub missing_tokens: Vec<String>,
    pub invalid_tokens: Vec<String>,
}

/// Validate a template: every canonical token present, nothing else in braces.
///
/// Never fails; every problem is reported in the returned structure.
pub fn validate_template(template: &str) -> FormatValidation {
    let mut result = FormatValidation::default();

    if template.trim().is_empty() {
        result.errors.push("Template must not be empty".into());
    }

    let mut present = [false; 7];
    for m in BRACED_RE.find_iter(template) {
        let inner = &m.as_str()[1..m.as_str().len() - 1];
        match SlotKey::from_code(inner) {
            Some(key) => present[key.index()] = true,
            None => push_unique(&mut result.invalid_tokens, m.as_str()),
        }
    }

    // Braces left over once every braced group is removed are unmatched.
    let stripped = BRACED_RE.replace_all(template, "");
    for c in stripped.chars().filter(|c| matches!(c, '{' | '}')) {
        push_unique(&mut result.invalid_tokens, &c.to_string());
    }

    result.missing_tokens = SlotKey::ALL
        .into_iter()
        .filter(|k| !present[k.index()])
        .map(SlotKey::token)
        .collect();

    if !result.missing_tokens.is_empty() {
        result.errors.push(format!(
            "Missing required tokens: {}",
            result.missing_tokens.join(", ")
        ));
    }
    if !result.invalid_tokens.is_empty() {
        result.errors.push(format!(
            "Invalid tokens: {}",
            result.invalid_tokens.join(", ")
        ));
    }

    result.is_valid = result.errors.is_empty();
    result
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Result of a batch import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// The persisted collection of custom formats.
///
/// Loaded once from the backing store; every mutation is written through.
/// Order is insertion order.
pub struct FormatStore<S: KeyValueStore> {
    store: S,
    formats: Vec<CustomFormat>,
}

impl<S: KeyValueStore> FormatStore<S> {
    /// Open the collection. Missing or malformed data loads as empty.
    pub fn open(store: S) -> Self {
        let formats = match store.get(FORMATS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CustomFormat>>(&raw) {
                Ok(formats) => formats,
                Err(e) => {
                    warn!(error = %e, "Discarding malformed custom format data");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, backend = store.name(), "Failed to read custom formats");
                Vec::new()
            }
        };
        debug!(count = formats.len(), backend = store.name(), "Custom formats loaded");
        Self { store, formats }
    }

    /// All formats in storage order.
    pub fn list(&self) -> &[CustomFormat] {
        &self.formats
    }

    pub fn get(&self, id: &str) -> Option<&CustomFormat> {
        self.formats.iter().find(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Validate and store a brand new format.
    pub fn create(
        &mut self,
        name: &str,
        template: &str,
    ) -> Result<CustomFormat, FormatError> {
        let format = CustomFormat::new(name.trim(), template);
        self.save(format.clone())?;
        Ok(format)
    }

    /// Upsert by id. Last write wins.
    pub fn save(&mut self, mut format: CustomFormat) -> Result<(), FormatError> {
        check_entry(&format)?;
        format.validation = true;
        if format.slots.is_empty() {
            format.slots = canonical_slots();
        }

        let mut next = self.formats.clone();
        upsert(&mut next, format);
        self.commit(next)
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool, FormatError> {
        let next: Vec<CustomFormat> = self
            .formats
            .iter()
            .filter(|f| f.id != id)
            .cloned()
            .collect();
        if next.len() == self.formats.len() {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Copy a format under a new id. `None` if `id` is unknown.
    pub fn duplicate(
        &mut self,
        id: &str,
        new_name: Option<&str>,
    ) -> Result<Option<CustomFormat>, FormatError> {
        let Some(original) = self.get(id) else {
            return Ok(None);
        };

        let name = match new_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("{} (Copy)", original.name),
        };
        let copy = CustomFormat {
            id: Uuid::new_v4().to_string(),
            name,
            ..original.clone()
        };

        let mut next = self.formats.clone();
        next.push(copy.clone());
        self.commit(next)?;
        Ok(Some(copy))
    }

    /// Import a JSON array of formats. Entries are judged one by one; a bad
    /// entry never aborts the batch.
    pub fn import(&mut self, json: &str) -> Result<ImportReport, FormatError> {
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| FormatError::Parse(e.to_string()))?;

        let mut next = self.formats.clone();
        let mut report = ImportReport::default();
        for (i, entry) in entries.into_iter().enumerate() {
            match parse_entry(entry).and_then(|f| check_entry(&f).map(|_| f)) {
                Ok(mut format) => {
                    format.validation = true;
                    upsert(&mut next, format);
                    report.imported += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("Entry {}: {e}", i + 1));
                }
            }
        }

        if report.imported > 0 {
            self.commit(next)?;
        }
        info!(imported = report.imported, failed = report.failed, "Custom formats imported");
        Ok(report)
    }

    /// Pretty-printed JSON of the whole collection, storage order.
    pub fn export(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(&self.formats)?)
    }

    /// Case-insensitive substring search over name and template.
    pub fn search(&self, query: &str) -> Vec<&CustomFormat> {
        let needle = query.to_lowercase();
        self.formats
            .iter()
            .filter(|f| {
                f.name.to_lowercase().contains(&needle)
                    || f.template.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Replace the whole collection (e.g. after a remote pull).
    pub fn replace_all(&mut self, formats: Vec<CustomFormat>) -> Result<(), FormatError> {
        self.commit(formats)
    }

    /// Write `next` through to the store, then adopt it. A failed write
    /// leaves the loaded collection untouched.
    fn commit(&mut self, next: Vec<CustomFormat>) -> Result<(), FormatError> {
        let json = serde_json::to_string(&next)?;
        self.store.set(FORMATS_KEY, &json)?;
        self.formats = next;
        Ok(())
    }
}

fn upsert(formats: &mut Vec<CustomFormat>, format: CustomFormat) {
    match formats.iter_mut().find(|f| f.id == format.id) {
        Some(existing) => *existing = format,
        None => formats.push(format),
    }
}

/// Shape check of one import entry.
fn parse_entry(entry: serde_json::Value) -> Result<CustomFormat, FormatError> {
    let obj = entry
        .as_object()
        .ok_or_else(|| FormatError::InvalidEntry("expected an object".into()))?;
    let name = string_field(obj, "name")?;
    let template = string_field(obj, "template")?;

    let mut format = CustomFormat::new(name.trim(), template);
    if let Some(id) = obj.get("id").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        format.id = id.to_string();
    }
    Ok(format)
}

fn string_field<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<&'a str, FormatError> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| FormatError::InvalidEntry(format!("missing string field `{key}`")))
}

fn check_entry(format: &CustomFormat) -> Result<(), FormatError> {
    if format.name.trim().is_empty() {
        return Err(FormatError::EmptyName);
    }
    let validation = validate_template(&format.template);
    if !validation.is_valid {
        return Err(FormatError::InvalidTemplate(validation));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const FULL: &str = "{S}, {C}, {St}, {Co}, {L}, {A}, {Q}";

    #[test]
    fn missing_tokens_are_listed_in_order() {
        let v = validate_template("{S}, {C}");
        assert!(!v.is_valid);
        assert_eq!(v.missing_tokens, vec!["{St}", "{Co}", "{L}", "{A}", "{Q}"]);
        assert!(v.invalid_tokens.is_empty());
    }

    #[test]
    fn unknown_token_is_invalid() {
        let v = validate_template("{S},{C},{St},{Co},{L},{A},{Q},{X}");
        assert!(!v.is_valid);
        assert_eq!(v.invalid_tokens, vec!["{X}"]);
        assert!(v.missing_tokens.is_empty());
    }

    #[test]
    fn stray_braces_are_invalid_tokens() {
        let v = validate_template(&format!("{FULL} {{ oops"));
        assert!(!v.is_valid);
        assert_eq!(v.invalid_tokens, vec!["{"]);
    }

    #[test]
    fn empty_template_reports_every_problem() {
        let v = validate_template("   ");
        assert!(!v.is_valid);
        assert_eq!(v.missing_tokens.len(), 7);
        assert!(v.errors.iter().any(|e| e.contains("must not be empty")));
    }

    #[test]
    fn complete_template_is_valid() {
        let v = validate_template(FULL);
        assert!(v.is_valid);
        assert!(v.errors.is_empty());
    }

    #[test]
    fn validation_serializes_camel_case() {
        let json = serde_json::to_string(&validate_template(FULL)).unwrap();
        assert!(json.contains("isValid"));
        assert!(json.contains("missingTokens"));
        assert!(json.contains("invalidTokens"));
    }

    #[test]
    fn create_and_reload() {
        let backing = MemoryStore::new();
        let mut store = FormatStore::open(backing.clone());
        let created = store.create("Portrait", FULL).unwrap();
        assert!(created.validation);
        assert_eq!(created.slots.len(), 7);

        let reopened = FormatStore::open(backing);
        assert_eq!(reopened.get(&created.id).unwrap().name, "Portrait");
    }

    #[test]
    fn save_rejects_invalid_input() {
        let mut store = FormatStore::open(MemoryStore::new());
        assert!(matches!(
            store.create("  ", FULL),
            Err(FormatError::EmptyName)
        ));
        assert!(matches!(
            store.create("Broken", "{S}"),
            Err(FormatError::InvalidTemplate(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn save_upserts_by_id() {
        let mut store = FormatStore::open(MemoryStore::new());
        let mut format = store.create("One", FULL).unwrap();
        format.name = "Renamed".into();
        store.save(format.clone()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&format.id).unwrap().name, "Renamed");
    }

    #[test]
    fn delete_missing_is_noop() {
        let mut store = FormatStore::open(MemoryStore::new());
        store.create("Keep", FULL).unwrap();
        assert!(!store.delete("missing").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_defaults_name() {
        let mut store = FormatStore::open(MemoryStore::new());
        let original = store.create("Cinematic", FULL).unwrap();
        let copy = store.duplicate(&original.id, None).unwrap().unwrap();
        assert_eq!(copy.name, "Cinematic (Copy)");
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.template, original.template);

        let named = store.duplicate(&original.id, Some("Alt")).unwrap().unwrap();
        assert_eq!(named.name, "Alt");
        assert!(store.duplicate("missing", None).unwrap().is_none());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn import_allows_partial_success() {
        let mut store = FormatStore::open(MemoryStore::new());
        let payload = serde_json::json!([
            { "name": "First", "template": FULL },
            { "name": "Second" },
            { "id": "third", "name": "Third", "template": FULL },
        ])
        .to_string();

        let report = store.import(&payload).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Entry 2:"));
        assert!(store.get("third").is_some());
    }

    #[test]
    fn import_rejects_non_array() {
        let mut store = FormatStore::open(MemoryStore::new());
        assert!(matches!(
            store.import(r#"{"name":"x"}"#),
            Err(FormatError::Parse(_))
        ));
    }

    #[test]
    fn import_reports_invalid_templates() {
        let mut store = FormatStore::open(MemoryStore::new());
        let payload = r#"[{"name":"Bad","template":"{S} {X}"}]"#;
        let report = store.import(payload).unwrap();
        assert_eq!(report.imported, 0);
        assert!(report.errors[0].contains("{X}"));
    }

    #[test]
    fn export_keeps_insertion_order() {
        let mut store = FormatStore::open(MemoryStore::new());
        store.create("Zeta", FULL).unwrap();
        store.create("Alpha", FULL).unwrap();
        let json = store.export().unwrap();
        assert!(json.contains('\n'));
        let parsed: Vec<CustomFormat> = serde_json::from_str(&json).unwrap();
        let names: Vec<&str> = parsed.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn search_matches_name_and_template() {
        let mut store = FormatStore::open(MemoryStore::new());
        store.create("Portrait Pro", FULL).unwrap();
        store.create("Landscape", &format!("{FULL}, wide vista")).unwrap();
        assert_eq!(store.search("portrait").len(), 1);
        assert_eq!(store.search("VISTA").len(), 1);
        assert_eq!(store.search("{S}").len(), 2);
        assert!(store.search("nothing").is_empty());
    }

    #[test]
    fn import_names_the_missing_field() {
        let mut store = FormatStore::open(MemoryStore::new());
        let report = store.import(r#"[{"template":"{S}"}, 7]"#).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors[0], "Entry 1: missing string field `name`");
        assert_eq!(report.errors[1], "Entry 2: expected an object");
    }

    /// Reads like an empty store; every write fails.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn name(&self) -> &str {
            "read-only"
        }

        fn get(&self, _key: &str) -> Result<Option<String>, crate::error::StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), crate::error::StorageError> {
            Err(crate::error::StorageError::Other("disk full".into()))
        }

        fn remove(&self, _key: &str) -> Result<bool, crate::error::StorageError> {
            Ok(false)
        }
    }

    #[test]
    fn failed_write_leaves_collection_unchanged() {
        let mut store = FormatStore::open(ReadOnlyStore);

        assert!(matches!(store.create("X", FULL), Err(FormatError::Storage(_))));
        assert!(store.is_empty());

        let payload = format!(r#"[{{"name":"Y","template":"{FULL}"}}]"#);
        assert!(store.import(&payload).is_err());
        assert!(store.is_empty());

        let seed = vec![CustomFormat::new("Z", FULL)];
        assert!(store.replace_all(seed).is_err());
        assert!(store.is_empty());
        assert_eq!(store.export().unwrap(), "[]");
    }

    #[test]
    fn failed_delete_keeps_the_format() {
        let backing = MemoryStore::new();
        let mut seeded = FormatStore::open(backing.clone());
        let kept = seeded.create("Kept", FULL).unwrap();

        let mut store = FormatStore {
            store: ReadOnlyStore,
            formats: seeded.list().to_vec(),
        };
        assert!(store.delete(&kept.id).is_err());
        assert!(store.duplicate(&kept.id, None).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.search("kept").len(), 1);
    }

    #[test]
    fn malformed_persisted_data_loads_empty() {
        let backing = MemoryStore::new();
        backing.set(FORMATS_KEY, "not json").unwrap();
        let store = FormatStore::open(backing);
        assert!(store.is_empty());
    }
}
