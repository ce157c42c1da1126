//! # PromptScaffold Core
//!
//! Domain types, traits, and logic for PromptScaffold: the 7-slot prompt
//! scaffold, the heuristic analyzer, merging, template rendering, custom
//! formats, and the retry wrapper.
//!
//! ## Design Philosophy
//!
//! External boundaries (the enrichment API, local and remote storage) are
//! defined as traits here. Implementations live in their own crates, so the
//! pure logic can be tested against in-memory stand-ins.

pub mod analyzer;
pub mod enrich;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod merge;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod scaffold;
pub mod storage;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use analyzer::analyze;
pub use enrich::{ClarifyingQuestion, Enricher, Enrichment, EnrichmentRequest};
pub use error::{Error, FormatError, ProviderError, Result, StorageError, StorageErrorKind};
pub use format::{CustomFormat, FormatStore, FormatValidation, ImportReport, validate_template};
pub use lifecycle::LifecycleManager;
pub use merge::{MergePolicy, SlotAnswer, apply_answers, merge};
pub use pipeline::{PipelineOutput, PromptPipeline};
pub use prompt::GeneratedPrompt;
pub use retry::{RetryPolicy, retry, retry_if};
pub use scaffold::{Scaffold, ScaffoldSlot, SlotKey};
pub use storage::{DataKind, KeyValueStore, MemoryStore, RemoteStore, UserData, UserPreferences};
pub use template::{Template, builtin_templates, render, resolve_template};
