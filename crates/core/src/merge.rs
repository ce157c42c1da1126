//! Scaffold merging — combine a fresh analysis with a prior scaffold without
//! losing what the user already wrote.

use serde::{Deserialize, Serialize};

use crate::scaffold::{Scaffold, SlotKey};

/// How conflicting slots are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Keep filled slots; adopt incoming content only for empty ones.
    #[default]
    FillEmpty,
    /// Adopt every non-empty incoming slot.
    Overwrite,
}

/// An answer to a clarifying question, targeted at one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAnswer {
    pub key: SlotKey,
    pub value: String,
}

impl SlotAnswer {
    pub fn new(key: SlotKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Merge `incoming` into `previous`, returning a new scaffold.
pub fn merge(previous: &Scaffold, incoming: &Scaffold, policy: MergePolicy) -> Scaffold {
    let mut merged = previous.clone();
    for key in SlotKey::ALL {
        let prev = previous.slot(key);
        let next = incoming.slot(key);
        let adopt = match policy {
            MergePolicy::FillEmpty => !prev.is_filled() && next.is_filled(),
            MergePolicy::Overwrite => next.is_filled(),
        };
        if adopt {
            merged.set(key, next.content.trim());
        }
    }
    merged
}

/// Fold question answers into a scaffold.
///
/// Empty slots take the answer as-is. Filled slots get the answer appended
/// with `", "` unless the slot already contains it (case-insensitive), so
/// applying the same answer twice is a no-op.
pub fn apply_answers(previous: &Scaffold, answers: &[SlotAnswer]) -> Scaffold {
    let mut merged = previous.clone();
    for answer in answers {
        let value = answer.value.trim();
        if value.is_empty() {
            continue;
        }
        let current = merged.get(answer.key).trim().to_string();
        if current.is_empty() {
            merged.set(answer.key, value);
        } else if !current.to_lowercase().contains(&value.to_lowercase()) {
            merged.set(answer.key, format!("{current}, {value}"));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_slots_are_preserved() {
        let previous = Scaffold::from_pairs([(SlotKey::Subject, "x")]);
        let incoming = Scaffold::from_pairs([(SlotKey::Subject, "y"), (SlotKey::Style, "anime")]);
        let merged = merge(&previous, &incoming, MergePolicy::FillEmpty);
        assert_eq!(merged.get(SlotKey::Subject), "x");
        assert_eq!(merged.get(SlotKey::Style), "anime");
    }

    #[test]
    fn empty_slots_adopt_incoming() {
        let previous = Scaffold::empty();
        let incoming = Scaffold::from_pairs([(SlotKey::Subject, "y")]);
        let merged = merge(&previous, &incoming, MergePolicy::default());
        assert_eq!(merged.get(SlotKey::Subject), "y");
    }

    #[test]
    fn whitespace_only_previous_counts_as_empty() {
        let previous = Scaffold::from_pairs([(SlotKey::Lighting, "  ")]);
        let incoming = Scaffold::from_pairs([(SlotKey::Lighting, "neon")]);
        let merged = merge(&previous, &incoming, MergePolicy::FillEmpty);
        assert_eq!(merged.get(SlotKey::Lighting), "neon");
    }

    #[test]
    fn overwrite_replaces_only_non_empty_incoming() {
        let previous = Scaffold::from_pairs([(SlotKey::Subject, "x"), (SlotKey::Quality, "4k")]);
        let incoming = Scaffold::from_pairs([(SlotKey::Subject, "y")]);
        let merged = merge(&previous, &incoming, MergePolicy::Overwrite);
        assert_eq!(merged.get(SlotKey::Subject), "y");
        assert_eq!(merged.get(SlotKey::Quality), "4k");
    }

    #[test]
    fn inputs_are_untouched() {
        let previous = Scaffold::empty();
        let incoming = Scaffold::from_pairs([(SlotKey::Context, "a desert")]);
        let _ = merge(&previous, &incoming, MergePolicy::FillEmpty);
        assert!(previous.is_empty());
        assert_eq!(incoming.get(SlotKey::Context), "a desert");
    }

    #[test]
    fn answers_append_to_filled_slots() {
        let previous = Scaffold::from_pairs([(SlotKey::Lighting, "soft light")]);
        let merged = apply_answers(
            &previous,
            &[
                SlotAnswer::new(SlotKey::Lighting, "golden hour"),
                SlotAnswer::new(SlotKey::Atmosphere, "serene"),
            ],
        );
        assert_eq!(merged.get(SlotKey::Lighting), "soft light, golden hour");
        assert_eq!(merged.get(SlotKey::Atmosphere), "serene");
    }

    #[test]
    fn reapplying_an_answer_is_idempotent() {
        let previous = Scaffold::from_pairs([(SlotKey::Lighting, "soft light")]);
        let answers = [SlotAnswer::new(SlotKey::Lighting, "Golden Hour")];
        let once = apply_answers(&previous, &answers);
        let twice = apply_answers(&once, &answers);
        assert_eq!(once, twice);
        assert_eq!(twice.get(SlotKey::Lighting), "soft light, Golden Hour");
    }

    #[test]
    fn blank_answers_are_ignored() {
        let previous = Scaffold::from_pairs([(SlotKey::Style, "anime")]);
        let merged = apply_answers(&previous, &[SlotAnswer::new(SlotKey::Style, "   ")]);
        assert_eq!(merged.get(SlotKey::Style), "anime");
    }
}
