//! Supabase backend over its PostgREST API, authenticated with the service
//! role key.

use postgrest::{Builder, Postgrest};
use serde::de::DeserializeOwned;

use language_utils::text_cleanup::normalize_for_matching;

use crate::error::CategorizerError;
use crate::model::CategorizationResult;
use crate::reference::{CentralizedMatch, ExactQuery, FuzzyQuery, ReferenceVocabulary};
use crate::store::{ReviewUpdate, StoredVocabularyItem, VocabularyStore};

const REFERENCE_TABLE: &str = "centralized_vocabulary";
const ITEMS_TABLE: &str = "teacher_vocabulary_items";
const REFERENCE_COLUMNS: &str = "id,word,base_word,category,subcategory,translation,language";

/// Fuzzy search cannot order by word length server-side, so a wider page is
/// fetched and ranked locally.
const FUZZY_OVERFETCH: usize = 4;

pub struct SupabaseVocabulary {
    client: Postgrest,
}

impl SupabaseVocabulary {
    pub fn new(supabase_url: &str, service_role_key: &str) -> Self {
        let client = Postgrest::new(format!("{}/rest/v1", supabase_url.trim_end_matches('/')))
            .insert_header("apikey", service_role_key)
            .insert_header("Authorization", format!("Bearer {service_role_key}"));
        Self { client }
    }
}

async fn fetch<T: DeserializeOwned>(builder: Builder) -> Result<T, CategorizerError> {
    let response = builder
        .execute()
        .await
        .map_err(|e| CategorizerError::Supabase(format!("{e}")))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CategorizerError::Supabase(format!("{e}")))?;
    if !status.is_success() {
        return Err(CategorizerError::Supabase(format!("{status}: {body}")));
    }
    Ok(serde_json::from_str(&body)?)
}

/// A PostgREST `in.(...)` list with every value quoted.
fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",")
}

impl ReferenceVocabulary for SupabaseVocabulary {
    async fn exact_candidates(
        &self,
        query: &ExactQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let terms: Vec<String> = query
            .terms
            .iter()
            .map(|term| normalize_for_matching(term))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let list = quoted_list(&terms);

        let mut builder = self
            .client
            .from(REFERENCE_TABLE)
            .select(REFERENCE_COLUMNS)
            .eq("language", query.language.iso_639_1())
            .or(format!("word.in.({list}),base_word.in.({list})"));
        if query.require_category {
            builder = builder
                .not("is", "category", "null")
                .not("is", "subcategory", "null");
        }
        let builder = builder
            .order("category.asc.nullslast,id.asc")
            .limit(query.limit);
        fetch(builder).await
    }

    async fn fuzzy_candidates(
        &self,
        query: &FuzzyQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let needle: String = normalize_for_matching(query.word)
            .chars()
            .filter(|c| !matches!(c, '*' | '%' | ','))
            .collect();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let builder = self
            .client
            .from(REFERENCE_TABLE)
            .select(REFERENCE_COLUMNS)
            .eq("language", query.language.iso_639_1())
            .ilike("word", format!("*{needle}*"))
            .order("category.asc.nullslast,id.asc")
            .limit(query.limit.saturating_mul(FUZZY_OVERFETCH));
        let mut rows: Vec<CentralizedMatch> = fetch(builder).await?;
        rows.sort_by_key(|row| {
            (
                !row.is_categorized(),
                row.word.chars().count(),
                row.id.clone(),
            )
        });
        rows.truncate(query.limit);
        Ok(rows)
    }
}

impl VocabularyStore for SupabaseVocabulary {
    async fn teacher_items(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<StoredVocabularyItem>, CategorizerError> {
        let builder = self
            .client
            .from(ITEMS_TABLE)
            .select("*")
            .eq("teacher_id", teacher_id)
            .order("created_at.asc,id.asc");
        fetch(builder).await
    }

    async fn save_categorization(
        &self,
        item_id: &str,
        result: &CategorizationResult,
    ) -> Result<(), CategorizerError> {
        let body = serde_json::json!({
            "predicted_category": result.predicted_category,
            "predicted_subcategory": result.predicted_subcategory,
            "category_confidence": result.category_confidence,
            "centralized_match_id": result.centralized_match_id,
            "match_confidence": result.match_confidence,
        });
        let builder = self
            .client
            .from(ITEMS_TABLE)
            .eq("id", item_id)
            .update(body.to_string());
        let updated: Vec<serde_json::Value> = fetch(builder).await?;
        if updated.is_empty() {
            return Err(CategorizerError::NotFound(item_id.to_string()));
        }
        Ok(())
    }

    async fn save_review(
        &self,
        item_id: &str,
        update: &ReviewUpdate,
    ) -> Result<(), CategorizerError> {
        let builder = self
            .client
            .from(ITEMS_TABLE)
            .eq("id", item_id)
            .update(serde_json::to_string(update)?);
        let updated: Vec<serde_json::Value> = fetch(builder).await?;
        if updated.is_empty() {
            return Err(CategorizerError::NotFound(item_id.to_string()));
        }
        Ok(())
    }
}
