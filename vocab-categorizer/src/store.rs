//! Teachers' uploaded vocabulary and the categorization fields stored with it.

use std::future::Future;
use std::str::FromStr;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::category::{Category, CategoryPair, Subcategory};
use crate::chunked::{ChunkPolicy, categorize_in_chunks};
use crate::error::CategorizerError;
use crate::fallback::FallbackCategorizer;
use crate::model::{CategorizationResult, REVIEW_THRESHOLD, VocabularyItem};
use crate::pipeline::VocabularyCategorizer;
use crate::reference::ReferenceVocabulary;

/// One row of `teacher_vocabulary_items`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredVocabularyItem {
    pub id: String,
    pub teacher_id: String,
    pub term: String,
    pub translation: String,
    #[serde(default)]
    pub part_of_speech: Option<String>,
    #[serde(default)]
    pub context_sentence: Option<String>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub predicted_category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub predicted_subcategory: Option<Subcategory>,
    #[serde(default)]
    pub category_confidence: Option<f64>,
    #[serde(default)]
    pub centralized_match_id: Option<String>,
    #[serde(default)]
    pub match_confidence: Option<f64>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub teacher_approved_category: bool,
    #[serde(default, deserialize_with = "lenient_label")]
    pub manual_category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub manual_subcategory: Option<Subcategory>,
}

/// Labels written outside this crate may not belong to the taxonomy; those
/// read back as absent.
pub(crate) fn parse_stored_label<T: FromStr>(label: Option<String>) -> Option<T> {
    let label = label?;
    match label.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring stored label outside the taxonomy: {label:?}");
            None
        }
    }
}

fn lenient_label<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
{
    Ok(parse_stored_label(Option::<String>::deserialize(deserializer)?))
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl StoredVocabularyItem {
    pub fn new(
        id: impl Into<String>,
        teacher_id: impl Into<String>,
        term: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            teacher_id: teacher_id.into(),
            term: term.into(),
            translation: translation.into(),
            part_of_speech: None,
            context_sentence: None,
            predicted_category: None,
            predicted_subcategory: None,
            category_confidence: None,
            centralized_match_id: None,
            match_confidence: None,
            teacher_approved_category: false,
            manual_category: None,
            manual_subcategory: None,
        }
    }

    pub fn as_item(&self) -> VocabularyItem {
        VocabularyItem {
            term: self.term.clone(),
            translation: self.translation.clone(),
            part_of_speech: self.part_of_speech.clone(),
            context_sentence: self.context_sentence.clone(),
        }
    }

    pub fn predicted_labels(&self) -> Option<CategoryPair> {
        CategoryPair::new(self.predicted_category?, self.predicted_subcategory?)
    }

    pub fn manual_labels(&self) -> Option<CategoryPair> {
        CategoryPair::new(self.manual_category?, self.manual_subcategory?)
    }

    /// The manual override when present, else the prediction.
    pub fn effective_labels(&self) -> Option<CategoryPair> {
        self.manual_labels().or_else(|| self.predicted_labels())
    }

    pub fn has_prediction(&self) -> bool {
        self.predicted_category.is_some()
    }

    pub fn needs_review(&self) -> bool {
        self.category_confidence
            .is_none_or(|confidence| confidence < REVIEW_THRESHOLD)
    }

    /// Apply a categorization the way [`VocabularyStore::save_categorization`] does.
    pub fn apply_categorization(&mut self, result: &CategorizationResult) {
        self.predicted_category = Some(result.predicted_category);
        self.predicted_subcategory = Some(result.predicted_subcategory);
        self.category_confidence = Some(result.category_confidence);
        self.centralized_match_id = result.centralized_match_id.clone();
        self.match_confidence = result.match_confidence;
    }

    pub fn apply_review(&mut self, update: &ReviewUpdate) {
        self.teacher_approved_category = update.teacher_approved_category;
        self.manual_category = update.manual_category;
        self.manual_subcategory = update.manual_subcategory;
    }
}

/// The review columns written for a decision. `None` clears a column.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ReviewUpdate {
    pub teacher_approved_category: bool,
    pub manual_category: Option<Category>,
    pub manual_subcategory: Option<Subcategory>,
}

/// Read and write access to teachers' stored vocabulary.
pub trait VocabularyStore: Send + Sync {
    /// All items owned by a teacher, in upload order.
    fn teacher_items(
        &self,
        teacher_id: &str,
    ) -> impl Future<Output = Result<Vec<StoredVocabularyItem>, CategorizerError>> + Send;

    /// Overwrite the prediction and match columns of one item. Review
    /// columns are left untouched.
    fn save_categorization(
        &self,
        item_id: &str,
        result: &CategorizationResult,
    ) -> impl Future<Output = Result<(), CategorizerError>> + Send;

    /// Fails with [`CategorizerError::NotFound`] if the item does not exist.
    fn save_review(
        &self,
        item_id: &str,
        update: &ReviewUpdate,
    ) -> impl Future<Output = Result<(), CategorizerError>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PersistSummary {
    pub saved: usize,
    pub failed: Vec<String>,
}

/// Write each result to its item. A failed write is logged and does not stop
/// the rest.
pub async fn persist_results<S: VocabularyStore>(
    store: &S,
    results: &[(String, CategorizationResult)],
) -> PersistSummary {
    let mut summary = PersistSummary::default();
    for (item_id, result) in results {
        match store.save_categorization(item_id, result).await {
            Ok(()) => summary.saved += 1,
            Err(e) => {
                log::error!("Failed to save categorization for item {item_id}: {e}");
                summary.failed.push(item_id.clone());
            }
        }
    }
    summary
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategorizeStoredSummary {
    /// Items selected for categorization.
    pub processed: usize,
    pub saved: usize,
    pub needs_review: usize,
    pub failed: Vec<String>,
}

/// Categorize a teacher's stored items and persist the predictions.
///
/// With `only_uncategorized`, items that already carry a prediction are
/// skipped.
pub async fn categorize_stored<R, F, S>(
    categorizer: &VocabularyCategorizer<R, F>,
    store: &S,
    teacher_id: &str,
    only_uncategorized: bool,
    policy: &ChunkPolicy,
    cancel: &CancellationToken,
) -> Result<CategorizeStoredSummary, CategorizerError>
where
    R: ReferenceVocabulary,
    F: FallbackCategorizer,
    S: VocabularyStore,
{
    let stored: Vec<StoredVocabularyItem> = store
        .teacher_items(teacher_id)
        .await?
        .into_iter()
        .filter(|item| !only_uncategorized || !item.has_prediction())
        .collect();
    log::info!(
        "Categorizing {} stored items for teacher {teacher_id}",
        stored.len()
    );

    let items: Vec<VocabularyItem> = stored.iter().map(StoredVocabularyItem::as_item).collect();
    let results = categorize_in_chunks(categorizer, &items, policy, cancel, |_, _| {}).await;

    let needs_review = results.iter().filter(|result| result.needs_review()).count();
    let results: Vec<(String, CategorizationResult)> = stored
        .into_iter()
        .map(|item| item.id)
        .zip(results)
        .collect();
    let persisted = persist_results(store, &results).await;

    Ok(CategorizeStoredSummary {
        processed: results.len(),
        saved: persisted.saved,
        needs_review,
        failed: persisted.failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_and_unknown_labels() {
        let item: StoredVocabularyItem = serde_json::from_value(serde_json::json!({
            "id": "7",
            "teacher_id": "t1",
            "term": "el coche",
            "translation": "car",
            "predicted_category": "Transport",
            "predicted_subcategory": null,
            "teacher_approved_category": null,
        }))
        .unwrap();
        assert_eq!(item.predicted_category, None);
        assert!(!item.teacher_approved_category);
        assert!(item.needs_review());
        assert_eq!(item.effective_labels(), None);
    }

    #[test]
    fn test_manual_override_wins() {
        let mut item = StoredVocabularyItem::new("1", "t1", "rojo", "red");
        item.apply_categorization(&CategorizationResult::failed("rojo"));
        assert_eq!(item.effective_labels(), Some(CategoryPair::UNCATEGORIZED));

        item.apply_review(&ReviewUpdate {
            teacher_approved_category: true,
            manual_category: Some(Category::Descriptions),
            manual_subcategory: Some(Subcategory::Colors),
        });
        assert_eq!(
            item.effective_labels().map(|labels| labels.subcategory),
            Some(Subcategory::Colors)
        );
    }

    #[test]
    fn test_categorization_keeps_review_columns() {
        let mut item = StoredVocabularyItem::new("1", "t1", "rojo", "red");
        item.teacher_approved_category = true;
        item.manual_category = Some(Category::Descriptions);
        item.apply_categorization(&CategorizationResult::failed("rojo"));
        assert!(item.teacher_approved_category);
        assert_eq!(item.manual_category, Some(Category::Descriptions));
        assert_eq!(item.category_confidence, Some(0.1));
    }
}
