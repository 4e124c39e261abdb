use crate::config::BackendConfig;
use crate::error::CategorizerError;
use crate::memory::MemoryVocabulary;
use crate::model::CategorizationResult;
use crate::reference::{CentralizedMatch, ExactQuery, FuzzyQuery, ReferenceVocabulary};
use crate::sqlite::SqliteVocabulary;
use crate::store::{ReviewUpdate, StoredVocabularyItem, VocabularyStore};
use crate::supabase::SupabaseVocabulary;

/// The backend selected by [`BackendConfig`]. Serves as both the reference
/// vocabulary and the item store.
pub enum ConfiguredBackend {
    Memory(MemoryVocabulary),
    Sqlite(SqliteVocabulary),
    Supabase(SupabaseVocabulary),
}

impl ConfiguredBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, CategorizerError> {
        Ok(match config {
            BackendConfig::Memory {
                reference_jsonl,
                items_jsonl,
            } => ConfiguredBackend::Memory(MemoryVocabulary::from_jsonl(
                reference_jsonl.as_deref(),
                items_jsonl.as_deref(),
            )?),
            BackendConfig::Sqlite { path } => {
                ConfiguredBackend::Sqlite(SqliteVocabulary::open(path)?)
            }
            BackendConfig::Supabase {
                url,
                service_role_key,
            } => ConfiguredBackend::Supabase(SupabaseVocabulary::new(url, service_role_key)),
        })
    }

    /// Write in-memory items back to their JSON Lines file. The other
    /// backends persist on every write.
    pub fn flush(&self, config: &BackendConfig) -> Result<(), CategorizerError> {
        if let (
            ConfiguredBackend::Memory(memory),
            BackendConfig::Memory {
                items_jsonl: Some(path),
                ..
            },
        ) = (self, config)
        {
            memory.save_items_jsonl(path)?;
        }
        Ok(())
    }
}

impl ReferenceVocabulary for ConfiguredBackend {
    async fn exact_candidates(
        &self,
        query: &ExactQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        match self {
            ConfiguredBackend::Memory(backend) => backend.exact_candidates(query).await,
            ConfiguredBackend::Sqlite(backend) => backend.exact_candidates(query).await,
            ConfiguredBackend::Supabase(backend) => backend.exact_candidates(query).await,
        }
    }

    async fn fuzzy_candidates(
        &self,
        query: &FuzzyQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        match self {
            ConfiguredBackend::Memory(backend) => backend.fuzzy_candidates(query).await,
            ConfiguredBackend::Sqlite(backend) => backend.fuzzy_candidates(query).await,
            ConfiguredBackend::Supabase(backend) => backend.fuzzy_candidates(query).await,
        }
    }
}

impl VocabularyStore for ConfiguredBackend {
    async fn teacher_items(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<StoredVocabularyItem>, CategorizerError> {
        match self {
            ConfiguredBackend::Memory(backend) => backend.teacher_items(teacher_id).await,
            ConfiguredBackend::Sqlite(backend) => backend.teacher_items(teacher_id).await,
            ConfiguredBackend::Supabase(backend) => backend.teacher_items(teacher_id).await,
        }
    }

    async fn save_categorization(
        &self,
        item_id: &str,
        result: &CategorizationResult,
    ) -> Result<(), CategorizerError> {
        match self {
            ConfiguredBackend::Memory(backend) => {
                backend.save_categorization(item_id, result).await
            }
            ConfiguredBackend::Sqlite(backend) => {
                backend.save_categorization(item_id, result).await
            }
            ConfiguredBackend::Supabase(backend) => {
                backend.save_categorization(item_id, result).await
            }
        }
    }

    async fn save_review(
        &self,
        item_id: &str,
        update: &ReviewUpdate,
    ) -> Result<(), CategorizerError> {
        match self {
            ConfiguredBackend::Memory(backend) => backend.save_review(item_id, update).await,
            ConfiguredBackend::Sqlite(backend) => backend.save_review(item_id, update).await,
            ConfiguredBackend::Supabase(backend) => backend.save_review(item_id, update).await,
        }
    }
}
