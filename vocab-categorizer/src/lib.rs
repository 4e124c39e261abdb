//! Sorts teacher-uploaded vocabulary into a fixed topic taxonomy.
//!
//! Each term is split into article, base word and gender, looked up in the
//! shared reference vocabulary, and categorized by a fallback (keyword rules
//! or a language model) when the reference has no confident answer.

pub mod backend;
pub mod category;
pub mod chunked;
pub mod config;
pub mod error;
pub mod fallback;
pub mod linguistic;
pub mod matcher;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod reference;
pub mod review;
pub mod sqlite;
pub mod store;
pub mod supabase;

pub use backend::ConfiguredBackend;
pub use category::{Category, CategoryPair, Subcategory};
pub use chunked::{ChunkPolicy, categorize_in_chunks};
pub use config::{BackendConfig, CategorizerConfig, FallbackStrategy};
pub use error::CategorizerError;
pub use fallback::{ConfiguredFallback, FallbackCategorization, FallbackCategorizer};
pub use linguistic::{LinguisticComponents, decompose};
pub use memory::MemoryVocabulary;
pub use model::{CategorizationResult, REVIEW_THRESHOLD, ReviewDecision, VocabularyItem};
pub use pipeline::VocabularyCategorizer;
pub use reference::{CentralizedMatch, ReferenceVocabulary};
pub use review::{CategorizationAnalytics, analytics, pending_review, record_decision};
pub use sqlite::SqliteVocabulary;
pub use store::{
    CategorizeStoredSummary, PersistSummary, StoredVocabularyItem, VocabularyStore,
    categorize_stored, persist_results,
};
pub use supabase::SupabaseVocabulary;
