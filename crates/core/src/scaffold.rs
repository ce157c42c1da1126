//! Scaffold model — the fixed 7-slot decomposition of an image prompt.
//!
//! A [`Scaffold`] always holds exactly one slot per [`SlotKey`], in canonical
//! order. The invariant is carried by the type: slots live in a fixed array
//! indexed by key, so there is no way to build a scaffold with a missing or
//! duplicated slot.

use serde::{Deserialize, Serialize};

/// The seven scaffold categories, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotKey {
    #[serde(rename = "S")]
    Subject,
    #[serde(rename = "C")]
    Context,
    #[serde(rename = "St")]
    Style,
    #[serde(rename = "Co")]
    Composition,
    #[serde(rename = "L")]
    Lighting,
    #[serde(rename = "A")]
    Atmosphere,
    #[serde(rename = "Q")]
    Quality,
}

impl SlotKey {
    /// All keys in canonical order.
    pub const ALL: [SlotKey; 7] = [
        SlotKey::Subject,
        SlotKey::Context,
        SlotKey::Style,
        SlotKey::Composition,
        SlotKey::Lighting,
        SlotKey::Atmosphere,
        SlotKey::Quality,
    ];

    /// Position of this key in the canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The short code used inside template tokens (`S`, `St`, ...).
    pub fn code(self) -> &'static str {
        match self {
            SlotKey::Subject => "S",
            SlotKey::Context => "C",
            SlotKey::Style => "St",
            SlotKey::Composition => "Co",
            SlotKey::Lighting => "L",
            SlotKey::Atmosphere => "A",
            SlotKey::Quality => "Q",
        }
    }

    /// Human-readable label.
    pub fn name(self) -> &'static str {
        match self {
            SlotKey::Subject => "Subject",
            SlotKey::Context => "Context",
            SlotKey::Style => "Style",
            SlotKey::Composition => "Composition",
            SlotKey::Lighting => "Lighting",
            SlotKey::Atmosphere => "Atmosphere",
            SlotKey::Quality => "Quality",
        }
    }

    /// Short guidance shown next to the slot.
    pub fn hint(self) -> &'static str {
        match self {
            SlotKey::Subject => "Who or what the image is about",
            SlotKey::Context => "Where the subject is: setting, environment, background",
            SlotKey::Style => "Artistic medium or visual style",
            SlotKey::Composition => "Framing, camera angle, lens",
            SlotKey::Lighting => "Light source, time of day, color of light",
            SlotKey::Atmosphere => "Mood, weather, emotional tone",
            SlotKey::Quality => "Resolution and detail modifiers",
        }
    }

    /// Whether the slot is flagged as required. Only used for hints.
    pub fn is_required(self) -> bool {
        matches!(self, SlotKey::Subject | SlotKey::Style)
    }

    /// The template token for this key, e.g. `{St}`.
    pub fn token(self) -> String {
        format!("{{{}}}", self.code())
    }

    /// Parse a token code (`"Co"`) back into a key.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One named field of a scaffold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldSlot {
    pub key: SlotKey,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub required: bool,
}

impl ScaffoldSlot {
    /// An empty slot for the given key.
    pub fn empty(key: SlotKey) -> Self {
        Self {
            key,
            name: key.name().to_string(),
            content: String::new(),
            required: key.is_required(),
        }
    }

    /// Whether the slot has any meaningful content.
    pub fn is_filled(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// The canonical empty slot list, used as a display snapshot.
pub fn canonical_slots() -> Vec<ScaffoldSlot> {
    SlotKey::ALL.into_iter().map(ScaffoldSlot::empty).collect()
}

/// A fixed, ordered set of seven slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ScaffoldSlot>", into = "Vec<ScaffoldSlot>")]
pub struct Scaffold {
    slots: [ScaffoldSlot; 7],
}

impl Scaffold {
    /// A scaffold with every slot empty.
    pub fn empty() -> Self {
        Self {
            slots: SlotKey::ALL.map(ScaffoldSlot::empty),
        }
    }

    /// Build a scaffold from `(key, content)` pairs; unnamed keys stay empty.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (SlotKey, S)>,
        S: Into<String>,
    {
        let mut scaffold = Self::empty();
        for (key, content) in pairs {
            scaffold.set(key, content);
        }
        scaffold
    }

    /// The slot for a key.
    pub fn slot(&self, key: SlotKey) -> &ScaffoldSlot {
        &self.slots[key.index()]
    }

    /// The content of a slot.
    pub fn get(&self, key: SlotKey) -> &str {
        &self.slots[key.index()].content
    }

    /// Replace the content of a slot.
    pub fn set(&mut self, key: SlotKey, content: impl Into<String>) {
        self.slots[key.index()].content = content.into();
    }

    /// Slots in canonical order.
    pub fn slots(&self) -> &[ScaffoldSlot] {
        &self.slots
    }

    /// Whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| !s.is_filled())
    }

    /// Number of slots with content.
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_filled()).count()
    }

    /// Required slots that are still empty.
    pub fn missing_required(&self) -> Vec<SlotKey> {
        self.slots
            .iter()
            .filter(|s| s.required && !s.is_filled())
            .map(|s| s.key)
            .collect()
    }
}

impl Default for Scaffold {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Scaffold> for Vec<ScaffoldSlot> {
    fn from(scaffold: Scaffold) -> Self {
        scaffold.slots.into()
    }
}

impl TryFrom<Vec<ScaffoldSlot>> for Scaffold {
    type Error = String;

    /// Accepts slots in any order; rejects duplicates and omissions.
    fn try_from(slots: Vec<ScaffoldSlot>) -> Result<Self, Self::Error> {
        let mut seen = [false; 7];
        let mut scaffold = Scaffold::empty();

        for slot in slots {
            let idx = slot.key.index();
            if seen[idx] {
                return Err(format!("duplicate scaffold slot: {}", slot.key.code()));
            }
            seen[idx] = true;
            scaffold.slots[idx].content = slot.content;
        }

        if let Some(pos) = seen.iter().position(|s| !s) {
            return Err(format!(
                "missing scaffold slot: {}",
                SlotKey::ALL[pos].code()
            ));
        }

        Ok(scaffold)
    }
}
