use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use language_utils::Language;

use crate::config::CategorizerConfig;
use crate::error::CategorizerError;
use crate::fallback::FallbackCategorizer;
use crate::linguistic::decompose;
use crate::matcher::{DEFAULT_CANDIDATE_LIMIT, LookupMatcher, ScoredMatch};
use crate::model::{CategorizationResult, VocabularyItem};
use crate::reference::ReferenceVocabulary;

pub const DEFAULT_SHORT_CIRCUIT_THRESHOLD: f64 = 0.8;

/// Categorizes teacher vocabulary against the reference table, falling back
/// to `F` when the table has no confident answer.
pub struct VocabularyCategorizer<R, F> {
    reference: R,
    fallback: F,
    matcher: LookupMatcher,
    short_circuit_threshold: f64,
}

impl<R, F> VocabularyCategorizer<R, F>
where
    R: ReferenceVocabulary,
    F: FallbackCategorizer,
{
    pub fn new(reference: R, fallback: F, language: Language) -> Self {
        Self {
            reference,
            fallback,
            matcher: LookupMatcher::new(language, DEFAULT_CANDIDATE_LIMIT),
            short_circuit_threshold: DEFAULT_SHORT_CIRCUIT_THRESHOLD,
        }
    }

    pub fn from_config(reference: R, fallback: F, config: &CategorizerConfig) -> Self {
        Self {
            reference,
            fallback,
            matcher: LookupMatcher::new(config.language, config.candidate_limit),
            short_circuit_threshold: config.short_circuit_threshold,
        }
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    pub fn language(&self) -> Language {
        self.matcher.language()
    }

    /// Categorize one item
    ///
    /// Only an empty term is an error. Lookup failures are logged and treated
    /// as "no match", and the fallback never fails.
    ///
    /// A match short-circuits only when it clears the threshold and its row
    /// carries a valid category pair; an uncategorized row still goes to the
    /// fallback, with the match attached.
    pub async fn categorize_item(
        &self,
        item: &VocabularyItem,
    ) -> Result<CategorizationResult, CategorizerError> {
        if item.term.trim().is_empty() {
            return Err(CategorizerError::EmptyTerm);
        }

        let linguistic = decompose(&item.term, self.language());
        let raw_term = item.term.trim().to_lowercase();

        let found = match self
            .matcher
            .find_match(
                &self.reference,
                &linguistic.base_word,
                &item.translation,
                &raw_term,
            )
            .await
        {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Reference lookup failed for {:?}: {e}", item.term);
                None
            }
        };

        if let Some(scored) = &found
            && scored.confidence > self.short_circuit_threshold
            && let Some(labels) = scored.entry.labels()
        {
            log::debug!(
                "{:?} matched reference row {} ({labels:?})",
                item.term,
                scored.entry.id
            );
            let mut result =
                CategorizationResult::new(labels, scored.confidence, linguistic, &item.term);
            attach_match(&mut result, scored);
            return Ok(result);
        }

        let fallback = self.fallback.categorize(item, &linguistic).await;
        let mut result =
            CategorizationResult::new(fallback.labels, fallback.confidence, linguistic, &item.term);
        if let Some(scored) = &found {
            attach_match(&mut result, scored);
        }
        Ok(result)
    }

    /// Categorize a batch. Returns exactly one result per item, in input
    /// order; an item that fails gets [`CategorizationResult::failed`].
    pub async fn categorize_vocabulary(
        &self,
        items: &[VocabularyItem],
    ) -> Vec<CategorizationResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let outcome = AssertUnwindSafe(self.categorize_item(item))
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    log::warn!("Could not categorize {:?}: {e}", item.term);
                    CategorizationResult::failed(&item.term)
                }
                Err(_) => {
                    log::error!("Categorizing {:?} panicked", item.term);
                    CategorizationResult::failed(&item.term)
                }
            };
            results.push(result);
        }

        let flagged = results.iter().filter(|result| result.needs_review()).count();
        log::info!(
            "Categorized {} items ({flagged} flagged for review)",
            results.len()
        );
        results
    }
}

fn attach_match(result: &mut CategorizationResult, scored: &ScoredMatch) {
    result.centralized_match_id = Some(scored.entry.id.clone());
    result.match_confidence = Some(scored.confidence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{Category, Subcategory};
    use crate::fallback::RuleBasedCategorizer;
    use crate::memory::MemoryVocabulary;
    use crate::model::FAILED_CONFIDENCE;
    use crate::reference::CentralizedMatch;
    use language_utils::Gender;

    fn row(
        id: &str,
        word: &str,
        translation: &str,
        labels: Option<(&str, &str)>,
    ) -> CentralizedMatch {
        CentralizedMatch {
            id: id.to_string(),
            word: word.to_string(),
            base_word: Some(word.to_string()),
            category: labels.map(|(c, _)| c.to_string()),
            subcategory: labels.map(|(_, s)| s.to_string()),
            translation: Some(translation.to_string()),
            language: "es".to_string(),
        }
    }

    fn categorizer(
        reference: Vec<CentralizedMatch>,
    ) -> VocabularyCategorizer<MemoryVocabulary, RuleBasedCategorizer> {
        VocabularyCategorizer::new(
            MemoryVocabulary::with_reference(reference),
            RuleBasedCategorizer,
            Language::Spanish,
        )
    }

    #[tokio::test]
    async fn test_unknown_word_with_empty_reference() {
        let results = categorizer(vec![])
            .categorize_vocabulary(&[VocabularyItem::new("el perro", "dog")])
            .await;
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.base_word, "perro");
        assert_eq!(result.article.as_deref(), Some("el"));
        assert_eq!(result.predicted_category, Category::General);
        assert_eq!(result.predicted_subcategory, Subcategory::Uncategorized);
        assert_eq!(result.category_confidence, 0.3);
        assert_eq!(result.raw_input, "el perro");
        assert_eq!(result.centralized_match_id, None);
    }

    #[tokio::test]
    async fn test_reference_match_short_circuits() {
        let result = categorizer(vec![row(
            "42",
            "mesa",
            "table",
            Some(("Home & Local Area", "House & Home")),
        )])
        .categorize_item(&VocabularyItem::new("la mesa (f)", "table"))
        .await
        .unwrap();
        assert_eq!(result.predicted_category, Category::HomeAndLocalArea);
        assert_eq!(result.predicted_subcategory, Subcategory::HouseAndHome);
        assert_eq!(result.category_confidence, 0.95);
        assert_eq!(result.centralized_match_id.as_deref(), Some("42"));
        assert_eq!(result.gender, Some(Gender::Feminine));
    }

    #[tokio::test]
    async fn test_weak_match_is_kept_alongside_fallback() {
        let result = categorizer(vec![row(
            "9",
            "rojo",
            "crimson",
            Some(("Home & Local Area", "House & Home")),
        )])
        .categorize_item(&VocabularyItem::new("rojo", "red"))
        .await
        .unwrap();
        assert_eq!(result.predicted_subcategory, Subcategory::Colors);
        assert_eq!(result.category_confidence, 0.9);
        assert_eq!(result.centralized_match_id.as_deref(), Some("9"));
        assert_eq!(result.match_confidence, Some(0.6));
    }

    #[tokio::test]
    async fn test_uncategorized_match_does_not_short_circuit() {
        let result = categorizer(vec![row("3", "perro", "dog", None)])
            .categorize_item(&VocabularyItem::new("el perro", "dog"))
            .await
            .unwrap();
        assert_eq!(result.category_confidence, 0.3);
        assert_eq!(result.centralized_match_id.as_deref(), Some("3"));
        assert_eq!(result.match_confidence, Some(0.95));
    }

    #[tokio::test]
    async fn test_empty_term_gets_failed_result() {
        let categorizer = categorizer(vec![]);
        assert!(matches!(
            categorizer
                .categorize_item(&VocabularyItem::new("   ", "nothing"))
                .await,
            Err(CategorizerError::EmptyTerm)
        ));

        let results = categorizer
            .categorize_vocabulary(&[
                VocabularyItem::new("", "nothing"),
                VocabularyItem::new("azul", "blue"),
            ])
            .await;
        assert_eq!(results[0].category_confidence, FAILED_CONFIDENCE);
        assert_eq!(results[1].predicted_subcategory, Subcategory::Colors);
    }

    #[tokio::test]
    async fn test_rerun_is_identical() {
        let categorizer = categorizer(vec![
            row("1", "banco", "bank", Some(("Home & Local Area", "Places in Town"))),
            row("2", "banco", "bench", Some(("Home & Local Area", "House & Home"))),
        ]);
        let items = [
            VocabularyItem::new("el banco", "bank"),
            VocabularyItem::new("el banco (bench)", "bench"),
            VocabularyItem::new("la leche", "milk"),
        ];
        let first = categorizer.categorize_vocabulary(&items).await;
        let second = categorizer.categorize_vocabulary(&items).await;
        assert_eq!(first, second);
    }
}
