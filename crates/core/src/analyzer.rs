//! Text analyzer — maps free-form prompt text onto the 7-slot scaffold.
//!
//! Classification is table driven: [`KEYWORD_TABLE`] lists trigger phrases per
//! category and is compiled once into a case-insensitive, word-bounded
//! pattern per category. The analyzer itself never branches on a specific
//! category, so extending the vocabulary is a table edit.
//!
//! Pipeline:
//! 1. Split the text into clauses (`,` `;` newline, sentence-ending punctuation).
//! 2. Split each clause into chunks at connective prepositions.
//! 3. Score every chunk against every category; the best category claims it.
//! 4. Unclaimed chunks form the residual, which becomes the Subject.

use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::trace;

use crate::merge::{MergePolicy, merge};
use crate::scaffold::{Scaffold, SlotKey};

/// A category and the phrases that trigger it.
pub struct CategoryRule {
    pub key: SlotKey,
    pub phrases: &'static [&'static str],
}

/// The keyword table. Row order breaks scoring ties.
pub static KEYWORD_TABLE: &[CategoryRule] = &[
    CategoryRule {
        key: SlotKey::Style,
        phrases: &[
            "photorealistic", "hyperrealistic", "realistic", "photograph", "photography",
            "photo", "oil painting", "acrylic painting", "watercolor", "watercolour",
            "painting", "anime", "manga", "cartoon", "comic book", "illustration",
            "digital art", "digital painting", "concept art", "3d render", "cgi",
            "pixel art", "sketch", "pencil drawing", "charcoal", "ink drawing",
            "impressionist", "impressionism", "expressionism", "surreal", "surrealism",
            "cyberpunk", "steampunk", "art deco", "art nouveau", "minimalist",
            "pop art", "baroque", "renaissance", "vaporwave", "synthwave", "low poly",
            "ukiyo-e", "studio ghibli", "pixar style", "cinematic", "film still",
            "unreal engine", "octane render", "style",
        ],
    },
    CategoryRule {
        key: SlotKey::Lighting,
        phrases: &[
            "lighting", "lit", "light", "sunlight", "moonlight", "candlelight",
            "golden hour", "blue hour", "sunset", "sunrise", "dawn", "dusk",
            "backlit", "backlighting", "rim light", "soft light", "hard light",
            "studio lighting", "natural light", "neon", "volumetric", "god rays",
            "chiaroscuro", "shadows", "glow", "glowing", "bioluminescent",
            "high key", "low key", "spotlight",
        ],
    },
    CategoryRule {
        key: SlotKey::Composition,
        phrases: &[
            "close-up", "close up", "extreme close-up", "wide shot", "wide angle",
            "wide-angle", "medium shot", "long shot", "full body", "aerial view",
            "bird's eye view", "birds eye view", "top-down", "overhead", "low angle",
            "high angle", "dutch angle", "side view", "front view", "macro",
            "rule of thirds", "symmetrical", "centered", "framing", "framed",
            "bokeh", "depth of field", "shallow depth of field", "telephoto",
            "fisheye", "panoramic", "isometric", "35mm", "50mm", "85mm",
            "composition", "angle", "shot", "view",
        ],
    },
    CategoryRule {
        key: SlotKey::Quality,
        phrases: &[
            "4k", "8k", "16k", "hd", "uhd", "hdr", "high resolution", "high-resolution",
            "highly detailed", "ultra detailed", "ultra-detailed", "detailed",
            "intricate", "intricate details", "sharp focus", "sharp", "crisp",
            "masterpiece", "best quality", "high quality", "award-winning",
            "award winning", "professional", "trending on artstation",
        ],
    },
    CategoryRule {
        key: SlotKey::Context,
        phrases: &[
            "forest", "jungle", "city", "cityscape", "street", "alley", "beach",
            "ocean", "sea", "underwater", "mountain", "mountains", "desert", "valley",
            "field", "meadow", "garden", "park", "river", "lake", "waterfall",
            "room", "bedroom", "kitchen", "library", "cafe", "office", "studio",
            "castle", "temple", "ruins", "village", "countryside", "space",
            "outer space", "planet", "sky", "clouds", "background", "landscape",
            "interior", "indoors", "outdoors", "trees", "rooftop", "windowsill",
        ],
    },
    CategoryRule {
        key: SlotKey::Atmosphere,
        phrases: &[
            "mood", "moody", "atmosphere", "atmospheric", "serene", "peaceful", "calm",
            "tranquil", "mysterious", "eerie", "creepy", "dreamy", "dreamlike",
            "whimsical", "melancholic", "melancholy", "nostalgic", "ethereal",
            "gloomy", "dark", "cheerful", "joyful", "romantic", "tense", "cozy",
            "epic", "foggy", "fog", "mist", "misty", "haze", "hazy", "rain", "rainy",
            "storm", "stormy", "snowy", "vibrant",
        ],
    },
];

/// Words that start a new chunk inside a clause.
const CHUNK_BOUNDARIES: &[&str] = &[
    "in", "on", "at", "with", "under", "during", "inside", "near", "beside", "behind",
    "against", "beneath", "above", "over", "among", "amid", "within", "through",
];

/// Prepositions that mark an otherwise unclassified chunk as a setting.
const LOCATIONAL: &[&str] = &[
    "in", "on", "at", "inside", "under", "near", "beside", "behind", "against",
    "beneath", "above", "over", "among", "amid", "within", "through",
];

/// Nouns that keep a prepositional chunk attached to the subject
/// ("a woman in a red dress").
const SUBJECT_ATTRIBUTES: &[&str] = &[
    "dress", "suit", "shirt", "jacket", "coat", "hat", "armor", "armour", "uniform",
    "costume", "gown", "robe", "hoodie", "glasses", "hair", "mask", "cloak",
];

/// Leading words dropped from claimed chunks.
const DROPPED_LEADERS: &[&str] = &["with", "and"];

static MATCHERS: LazyLock<Vec<(SlotKey, Regex)>> = LazyLock::new(|| {
    KEYWORD_TABLE
        .iter()
        .map(|rule| (rule.key, compile_rule(rule.phrases)))
        .collect()
});

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

fn compile_rule(phrases: &[&str]) -> Regex {
    // Longest first so the alternation prefers "golden hour" over "hour".
    let mut sorted: Vec<&str> = phrases.to_vec();
    sorted.sort_by_key(|p| std::cmp::Reverse(p.len()));
    let alternation = sorted
        .iter()
        .map(|p| regex_lite::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("keyword table compiles")
}

/// Analyze free text into a scaffold.
///
/// With `existing`, the analysis only fills the slots that are still empty
/// there; filled slots are never overwritten.
pub fn analyze(text: &str, existing: Option<&Scaffold>) -> Scaffold {
    let fresh = analyze_fresh(text);
    match existing {
        Some(previous) => merge(previous, &fresh, MergePolicy::FillEmpty),
        None => fresh,
    }
}

/// Best category for a fragment, or `None` when no trigger phrase matches.
pub fn classify(fragment: &str) -> Option<SlotKey> {
    let mut best: Option<(SlotKey, usize)> = None;
    for (key, re) in MATCHERS.iter() {
        let score: usize = re
            .find_iter(fragment)
            .map(|m| m.as_str().split_whitespace().count())
            .sum();
        if score > 0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((*key, score));
        }
    }
    best.map(|(key, _)| key)
}

fn analyze_fresh(text: &str) -> Scaffold {
    let mut scaffold = Scaffold::empty();
    if !text.chars().any(char::is_alphanumeric) {
        return scaffold;
    }

    let mut claimed: Vec<Vec<String>> = vec![Vec::new(); SlotKey::ALL.len()];
    let mut residual: Vec<String> = Vec::new();

    for clause in split_clauses(text) {
        let mut clause_residual: Vec<String> = Vec::new();

        for chunk in split_chunks(&clause).into_iter().flat_map(|c| split_of(&c)) {
            match assign(&chunk) {
                Some(key) => {
                    trace!(slot = key.code(), chunk = %chunk, "Claimed chunk");
                    claimed[key.index()].push(drop_leader(&chunk));
                }
                None => clause_residual.push(chunk),
            }
        }

        if !clause_residual.is_empty() {
            residual.push(clause_residual.join(" "));
        }
    }

    for key in SlotKey::ALL {
        let joined = join_unique(&claimed[key.index()]);
        if !joined.is_empty() {
            scaffold.set(key, joined);
        }
    }

    let residual = join_unique(&residual);
    if !residual.is_empty() && scaffold.get(SlotKey::Subject).is_empty() {
        scaffold.set(SlotKey::Subject, residual);
    }

    scaffold
}

/// Category for a chunk, including the locational fallback for settings.
fn assign(chunk: &str) -> Option<SlotKey> {
    if let Some(key) = classify(chunk) {
        return Some(key);
    }

    let lower = chunk.to_lowercase();
    let mut words = lower.split_whitespace().map(bare_word);
    let first = words.next()?;
    let describes_subject = lower
        .split_whitespace()
        .map(bare_word)
        .any(|w| SUBJECT_ATTRIBUTES.contains(&w));
    if LOCATIONAL.contains(&first) && words.next().is_some() && !describes_subject {
        return Some(SlotKey::Context);
    }
    None
}

fn split_clauses(text: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let ends_clause = match c {
            ',' | ';' | '\n' | '|' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|n| n.is_whitespace()),
            _ => false,
        };
        if ends_clause {
            push_cleaned(&mut clauses, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_cleaned(&mut clauses, &current);
    clauses
}

/// Split a clause at connective prepositions, keeping the preposition with
/// the chunk it starts. A one-word head is only split off when no category
/// claims it, so "dragons at sunset" keeps "dragons" as its own chunk.
/// Never splits inside a keyword phrase ("trending on artstation").
fn split_chunks(clause: &str) -> Vec<String> {
    let phrases: Vec<(usize, usize)> = MATCHERS
        .iter()
        .flat_map(|(_, re)| re.find_iter(clause).map(|m| (m.start(), m.end())))
        .collect();
    let inside_phrase = |pos: usize| phrases.iter().any(|&(start, end)| start < pos && pos < end);

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in WORD_RE.find_iter(clause) {
        let lower = word.as_str().to_lowercase();
        let head_stands_alone = match current.as_slice() {
            [] => false,
            [single] => classify(single).is_none(),
            _ => true,
        };
        if head_stands_alone
            && CHUNK_BOUNDARIES.contains(&bare_word(&lower))
            && !inside_phrase(word.start())
        {
            push_cleaned(&mut chunks, &current.join(" "));
            current.clear();
        }
        current.push(word.as_str());
    }
    push_cleaned(&mut chunks, &current.join(" "));
    chunks
}

/// Split "an oil painting of a lighthouse" into its style head and subject
/// tail. Only applies when the head classifies and the tail does not.
fn split_of(chunk: &str) -> Vec<String> {
    let found = [" of ", " Of ", " OF "]
        .iter()
        .filter_map(|needle| chunk.find(needle))
        .min();
    let Some(pos) = found else {
        return vec![chunk.to_string()];
    };

    let head = chunk[..pos].trim();
    let tail = chunk[pos + 4..].trim();
    let head_is_style_phrase = head
        .split_whitespace()
        .last()
        .is_some_and(|w| w.eq_ignore_ascii_case("style"));

    match classify(head) {
        Some(key)
            if key != SlotKey::Context
                && !head_is_style_phrase
                && !tail.is_empty()
                && classify(tail).is_none() =>
        {
            vec![head.to_string(), tail.to_string()]
        }
        _ => vec![chunk.to_string()],
    }
}

fn drop_leader(chunk: &str) -> String {
    let mut words = chunk.split_whitespace();
    match words.next() {
        Some(first) if DROPPED_LEADERS.contains(&first.to_lowercase().as_str()) => {
            let rest: Vec<&str> = words.collect();
            if rest.is_empty() {
                chunk.to_string()
            } else {
                rest.join(" ")
            }
        }
        _ => chunk.to_string(),
    }
}

fn bare_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
}

/// Collapse whitespace, strip wrapping punctuation, skip empties.
fn push_cleaned(out: &mut Vec<String>, raw: &str) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed
        .trim_matches(|c: char| matches!(c, '.' | '!' | '?' | ':' | '"' | '(' | ')' | '[' | ']' | '*'))
        .trim();
    if cleaned.chars().any(char::is_alphanumeric) {
        out.push(cleaned.to_string());
    }
}

fn join_unique(parts: &[String]) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<&str> = Vec::new();
    for part in parts {
        let lower = part.to_lowercase();
        if !seen.contains(&lower) {
            seen.push(lower);
            out.push(part);
        }
    }
    out.join(", ")
}
