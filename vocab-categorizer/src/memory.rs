//! In-process backend. Loads from JSON Lines files, one row per line.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use language_utils::text_cleanup::normalize_for_matching;
use serde::de::DeserializeOwned;

use crate::error::CategorizerError;
use crate::model::CategorizationResult;
use crate::reference::{
    CentralizedMatch, ExactQuery, FuzzyQuery, ReferenceVocabulary, candidate_order,
};
use crate::store::{ReviewUpdate, StoredVocabularyItem, VocabularyStore};

#[derive(Debug, Default)]
pub struct MemoryVocabulary {
    reference: Vec<CentralizedMatch>,
    items: Mutex<Vec<StoredVocabularyItem>>,
}

impl MemoryVocabulary {
    pub fn with_reference(reference: Vec<CentralizedMatch>) -> Self {
        Self {
            reference,
            items: Mutex::default(),
        }
    }

    pub fn with_items(mut self, items: Vec<StoredVocabularyItem>) -> Self {
        self.items = Mutex::new(items);
        self
    }

    pub fn from_jsonl(
        reference_path: Option<&Path>,
        items_path: Option<&Path>,
    ) -> Result<Self, CategorizerError> {
        let reference = match reference_path {
            Some(path) => read_jsonl(path)?,
            None => Vec::new(),
        };
        let items = match items_path {
            Some(path) if path.exists() => read_jsonl(path)?,
            _ => Vec::new(),
        };
        log::info!(
            "Loaded {} reference rows and {} stored items",
            reference.len(),
            items.len()
        );
        Ok(Self::with_reference(reference).with_items(items))
    }

    /// Snapshot of the stored items.
    pub fn items(&self) -> Vec<StoredVocabularyItem> {
        self.lock_items().clone()
    }

    pub fn save_items_jsonl(&self, path: &Path) -> Result<(), CategorizerError> {
        let items = self.items();
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        for item in &items {
            serde_json::to_writer(&mut writer, item)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn lock_items(&self) -> MutexGuard<'_, Vec<StoredVocabularyItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_language<'a>(
        &'a self,
        language: &'a str,
    ) -> impl Iterator<Item = &'a CentralizedMatch> + 'a {
        self.reference
            .iter()
            .filter(move |row| row.language.eq_ignore_ascii_case(language))
    }
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CategorizerError> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

impl ReferenceVocabulary for MemoryVocabulary {
    async fn exact_candidates(
        &self,
        query: &ExactQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let terms: Vec<String> = query
            .terms
            .iter()
            .map(|term| normalize_for_matching(term))
            .collect();
        let matches_term = |value: &str| terms.contains(&normalize_for_matching(value));

        let mut candidates: Vec<CentralizedMatch> = self
            .in_language(query.language.iso_639_1())
            .filter(|row| !query.require_category || row.is_categorized())
            .filter(|row| {
                matches_term(&row.word) || row.base_word.as_deref().is_some_and(matches_term)
            })
            .cloned()
            .collect();
        candidates.sort_by_key(candidate_order);
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn fuzzy_candidates(
        &self,
        query: &FuzzyQuery<'_>,
    ) -> Result<Vec<CentralizedMatch>, CategorizerError> {
        let needle = normalize_for_matching(query.word);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<CentralizedMatch> = self
            .in_language(query.language.iso_639_1())
            .filter(|row| normalize_for_matching(&row.word).contains(&needle))
            .cloned()
            .collect();
        candidates.sort_by_key(|row| {
            (
                !row.is_categorized(),
                row.word.chars().count(),
                row.id.clone(),
            )
        });
        candidates.truncate(query.limit);
        Ok(candidates)
    }
}

impl VocabularyStore for MemoryVocabulary {
    async fn teacher_items(
        &self,
        teacher_id: &str,
    ) -> Result<Vec<StoredVocabularyItem>, CategorizerError> {
        Ok(self
            .lock_items()
            .iter()
            .filter(|item| item.teacher_id == teacher_id)
            .cloned()
            .collect())
    }

    async fn save_categorization(
        &self,
        item_id: &str,
        result: &CategorizationResult,
    ) -> Result<(), CategorizerError> {
        let mut items = self.lock_items();
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| CategorizerError::NotFound(item_id.to_string()))?;
        item.apply_categorization(result);
        Ok(())
    }

    async fn save_review(
        &self,
        item_id: &str,
        update: &ReviewUpdate,
    ) -> Result<(), CategorizerError> {
        let mut items = self.lock_items();
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| CategorizerError::NotFound(item_id.to_string()))?;
        item.apply_review(update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use language_utils::Language;

    fn row(id: &str, word: &str, category: Option<&str>) -> CentralizedMatch {
        CentralizedMatch {
            id: id.to_string(),
            word: word.to_string(),
            base_word: None,
            category: category.map(str::to_string),
            subcategory: category.map(|_| "Uncategorized".to_string()),
            translation: None,
            language: "es".to_string(),
        }
    }

    #[tokio::test]
    async fn test_exact_candidates_are_ordered() {
        let reference = MemoryVocabulary::with_reference(vec![
            row("b", "Gato", None),
            row("c", "gato", Some("General")),
            row("a", "gato", Some("General")),
        ]);
        let query = ExactQuery {
            terms: vec!["gato"],
            language: Language::Spanish,
            require_category: false,
            limit: 5,
        };
        let ids: Vec<String> = reference
            .exact_candidates(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, ["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_fuzzy_prefers_categorized_then_shorter() {
        let reference = MemoryVocabulary::with_reference(vec![
            row("1", "gatito", None),
            row("2", "gatos", Some("General")),
            row("3", "gatitos", Some("General")),
        ]);
        let query = FuzzyQuery {
            word: "gat",
            language: Language::Spanish,
            limit: 5,
        };
        let ids: Vec<String> = reference
            .fuzzy_candidates(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, ["2", "3", "1"]);
    }

    #[tokio::test]
    async fn test_jsonl_round_trip_of_items() {
        let dir = tempfile::tempdir().unwrap();
        let items_path = dir.path().join("items.jsonl");
        std::fs::write(
            &items_path,
            "{\"id\":\"1\",\"teacher_id\":\"t\",\"term\":\"rojo\",\"translation\":\"red\"}\n\n",
        )
        .unwrap();

        let store = MemoryVocabulary::from_jsonl(None, Some(&items_path)).unwrap();
        store
            .save_categorization("1", &CategorizationResult::failed("rojo"))
            .await
            .unwrap();
        store.save_items_jsonl(&items_path).unwrap();

        let reloaded = MemoryVocabulary::from_jsonl(None, Some(&items_path)).unwrap();
        assert_eq!(reloaded.items()[0].category_confidence, Some(0.1));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let store = MemoryVocabulary::default();
        let result = store
            .save_categorization("nope", &CategorizationResult::failed("x"))
            .await;
        assert!(matches!(result, Err(CategorizerError::NotFound(_))));
    }
}
