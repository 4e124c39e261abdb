use language_utils::Language;
use language_utils::text_cleanup::normalize_for_matching;

use crate::error::CategorizerError;
use crate::reference::{CentralizedMatch, ExactQuery, FuzzyQuery, ReferenceVocabulary};

pub const EXACT_TRANSLATION_CONFIDENCE: f64 = 0.95;
pub const PARTIAL_TRANSLATION_CONFIDENCE: f64 = 0.85;
pub const TEXT_MATCH_CONFIDENCE: f64 = 0.6;

pub const DEFAULT_CANDIDATE_LIMIT: usize = 5;

/// Which retrieval step produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// Exact word match among rows that carry a category.
    Categorized,
    /// Exact word match once the category filter was dropped.
    Unfiltered,
    /// Text search on `word`.
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub entry: CentralizedMatch,
    pub confidence: f64,
    pub source: MatchSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TranslationAgreement {
    None,
    Partial,
    Exact,
}

fn translation_agreement(candidate: Option<&str>, translation: &str) -> TranslationAgreement {
    let Some(candidate) = candidate else {
        return TranslationAgreement::None;
    };
    let candidate = normalize_for_matching(candidate);
    if candidate.is_empty() || translation.is_empty() {
        return TranslationAgreement::None;
    }
    if candidate == translation {
        TranslationAgreement::Exact
    } else if candidate.contains(translation) || translation.contains(candidate.as_str()) {
        TranslationAgreement::Partial
    } else {
        TranslationAgreement::None
    }
}

/// Looks terms up in the centralized vocabulary and scores the match
/// against the teacher's translation.
#[derive(Debug, Clone)]
pub struct LookupMatcher {
    language: Language,
    candidate_limit: usize,
}

impl LookupMatcher {
    pub fn new(language: Language, candidate_limit: usize) -> Self {
        Self {
            language,
            candidate_limit: candidate_limit.max(1),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Find the best reference row for a term
    ///
    /// Lookup order: exact match among categorized rows, exact match among
    /// all rows, then text search on `word`.
    pub async fn find_match<R: ReferenceVocabulary>(
        &self,
        reference: &R,
        base_word: &str,
        translation: &str,
        raw_term: &str,
    ) -> Result<Option<ScoredMatch>, CategorizerError> {
        let mut terms = vec![base_word];
        if raw_term != base_word {
            terms.push(raw_term);
        }
        terms.retain(|term| !term.is_empty());
        if terms.is_empty() {
            return Ok(None);
        }

        let translation = normalize_for_matching(translation);

        let mut query = ExactQuery {
            terms,
            language: self.language,
            require_category: true,
            limit: self.candidate_limit,
        };
        let mut candidates = reference.exact_candidates(&query).await?;
        let mut source = MatchSource::Categorized;

        if candidates.is_empty() {
            query.require_category = false;
            candidates = reference.exact_candidates(&query).await?;
            source = MatchSource::Unfiltered;
        }

        if let Some(scored) = select_candidate(candidates, &translation, source) {
            return Ok(Some(scored));
        }

        let fuzzy = FuzzyQuery {
            word: base_word,
            language: self.language,
            limit: self.candidate_limit,
        };
        let fuzzy_match = reference
            .fuzzy_candidates(&fuzzy)
            .await?
            .into_iter()
            .next()
            .map(|entry| ScoredMatch {
                entry,
                confidence: TEXT_MATCH_CONFIDENCE,
                source: MatchSource::Fuzzy,
            });

        Ok(fuzzy_match)
    }
}

/// Pick the candidate whose translation agrees best with the input, keeping
/// candidate order among equals, and fall back to the first candidate.
fn select_candidate(
    candidates: Vec<CentralizedMatch>,
    translation: &str,
    source: MatchSource,
) -> Option<ScoredMatch> {
    let mut best: Option<(TranslationAgreement, CentralizedMatch)> = None;
    for candidate in candidates {
        let agreement = translation_agreement(candidate.translation.as_deref(), translation);
        let better = match &best {
            None => true,
            Some((best_agreement, _)) => agreement > *best_agreement,
        };
        if better {
            best = Some((agreement, candidate));
        }
    }

    let (agreement, entry) = best?;
    let confidence = match agreement {
        TranslationAgreement::Exact => EXACT_TRANSLATION_CONFIDENCE,
        TranslationAgreement::Partial => PARTIAL_TRANSLATION_CONFIDENCE,
        TranslationAgreement::None => TEXT_MATCH_CONFIDENCE,
    };
    Some(ScoredMatch {
        entry,
        confidence,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryVocabulary;

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

    fn matcher() -> LookupMatcher {
        LookupMatcher::new(Language::Spanish, DEFAULT_CANDIDATE_LIMIT)
    }

    #[tokio::test]
    async fn test_exact_translation() {
        let reference = MemoryVocabulary::with_reference(vec![row(
            "1",
            "mesa",
            "Table",
            Some(("Home & Local Area", "House & Home")),
        )]);
        let scored = matcher()
            .find_match(&reference, "mesa", "table", "la mesa")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.confidence, EXACT_TRANSLATION_CONFIDENCE);
        assert_eq!(scored.entry.id, "1");
        assert_eq!(scored.source, MatchSource::Categorized);
    }

    #[tokio::test]
    async fn test_partial_translation() {
        let reference = MemoryVocabulary::with_reference(vec![row(
            "1",
            "desayuno",
            "breakfast",
            Some(("Food & Drink", "Meals")),
        )]);
        let scored = matcher()
            .find_match(&reference, "desayuno", "to have breakfast", "desayuno")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.confidence, PARTIAL_TRANSLATION_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_exact_agreement_beats_earlier_partial() {
        let reference = MemoryVocabulary::with_reference(vec![
            row("1", "banco", "river bank", Some(("Home & Local Area", "Places in Town"))),
            row("2", "banco", "bank", Some(("Home & Local Area", "Places in Town"))),
        ]);
        let scored = matcher()
            .find_match(&reference, "banco", "bank", "banco")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.entry.id, "2");
        assert_eq!(scored.confidence, EXACT_TRANSLATION_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_disagreeing_translation_takes_first_candidate() {
        let reference = MemoryVocabulary::with_reference(vec![
            row("2", "vela", "sail", Some(("Home & Local Area", "House & Home"))),
            row("1", "vela", "candle", Some(("Home & Local Area", "House & Home"))),
        ]);
        let scored = matcher()
            .find_match(&reference, "vela", "wax light", "vela")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.entry.id, "1");
        assert_eq!(scored.confidence, TEXT_MATCH_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_uncategorized_rows_are_a_fallback() {
        let reference = MemoryVocabulary::with_reference(vec![row("1", "perro", "dog", None)]);
        let scored = matcher()
            .find_match(&reference, "perro", "dog", "el perro")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.source, MatchSource::Unfiltered);
        assert_eq!(scored.confidence, EXACT_TRANSLATION_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_raw_term_is_also_looked_up() {
        let reference = MemoryVocabulary::with_reference(vec![row(
            "1",
            "de nada",
            "you're welcome",
            Some(("Identity & Relationships", "Family & Friends")),
        )]);
        let scored = matcher()
            .find_match(&reference, "nada", "you're welcome", "de nada")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.entry.id, "1");
    }

    #[tokio::test]
    async fn test_fuzzy_search() {
        let reference = MemoryVocabulary::with_reference(vec![row(
            "1",
            "cocheras",
            "garages",
            Some(("Home & Local Area", "House & Home")),
        )]);
        let scored = matcher()
            .find_match(&reference, "coche", "car", "el coche")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scored.source, MatchSource::Fuzzy);
        assert_eq!(scored.confidence, TEXT_MATCH_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_no_match() {
        let reference = MemoryVocabulary::default();
        let scored = matcher()
            .find_match(&reference, "perro", "dog", "el perro")
            .await
            .unwrap();
        assert_eq!(scored, None);
    }

    #[tokio::test]
    async fn test_other_languages_are_ignored() {
        let mut french = row("1", "chat", "cat", Some(("General", "Uncategorized")));
        french.language = "fr".to_string();
        let reference = MemoryVocabulary::with_reference(vec![french]);
        let scored = matcher()
            .find_match(&reference, "chat", "cat", "chat")
            .await
            .unwrap();
        assert_eq!(scored, None);
    }

    #[test]
    fn test_empty_translation_gives_no_signal() {
        assert_eq!(
            translation_agreement(Some("dog"), ""),
            TranslationAgreement::None
        );
        assert_eq!(translation_agreement(None, "dog"), TranslationAgreement::None);
    }
}
