use language_utils::Gender;

use crate::category::{Category, CategoryPair, Subcategory};
use crate::linguistic::LinguisticComponents;

/// Items below this confidence are surfaced for teacher review.
pub const REVIEW_THRESHOLD: f64 = 0.7;

/// Confidence given to items whose processing failed outright.
pub const FAILED_CONFIDENCE: f64 = 0.1;

/// A vocabulary item as uploaded by a teacher.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VocabularyItem {
    pub term: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_sentence: Option<String>,
}

impl VocabularyItem {
    pub fn new(term: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            translation: translation.into(),
            part_of_speech: None,
            context_sentence: None,
        }
    }
}

/// The outcome of categorizing one vocabulary item. The serialized shape is
/// what the review UI and the persistence layer consume.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategorizationResult {
    pub predicted_category: Category,
    pub predicted_subcategory: Subcategory,
    pub category_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centralized_match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,
    pub base_word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub raw_input: String,
}

impl CategorizationResult {
    pub(crate) fn new(
        labels: CategoryPair,
        confidence: f64,
        linguistic: LinguisticComponents,
        raw_input: &str,
    ) -> Self {
        let LinguisticComponents {
            base_word,
            article,
            gender,
        } = linguistic;
        Self {
            predicted_category: labels.category,
            predicted_subcategory: labels.subcategory,
            category_confidence: confidence,
            centralized_match_id: None,
            match_confidence: None,
            base_word,
            article,
            gender,
            raw_input: raw_input.to_string(),
        }
    }

    /// The minimal result substituted when an item could not be processed.
    pub fn failed(raw_input: &str) -> Self {
        Self {
            predicted_category: Category::General,
            predicted_subcategory: Subcategory::Uncategorized,
            category_confidence: FAILED_CONFIDENCE,
            centralized_match_id: None,
            match_confidence: None,
            base_word: raw_input.trim().to_lowercase(),
            article: None,
            gender: None,
            raw_input: raw_input.to_string(),
        }
    }

    pub fn labels(&self) -> CategoryPair {
        CategoryPair::new(self.predicted_category, self.predicted_subcategory)
            .unwrap_or(CategoryPair::UNCATEGORIZED)
    }

    pub fn needs_review(&self) -> bool {
        self.category_confidence < REVIEW_THRESHOLD
    }
}

/// A teacher's verdict on a stored categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Override {
        category: Category,
        subcategory: Subcategory,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let result = CategorizationResult::new(
            CategoryPair::UNCATEGORIZED,
            0.3,
            LinguisticComponents {
                base_word: "perro".to_string(),
                article: Some("el".to_string()),
                gender: None,
            },
            "el perro",
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "predicted_category": "General",
                "predicted_subcategory": "Uncategorized",
                "category_confidence": 0.3,
                "base_word": "perro",
                "article": "el",
                "raw_input": "el perro",
            })
        );
    }

    #[test]
    fn test_failed_result_needs_review() {
        let result = CategorizationResult::failed("  ??? ");
        assert_eq!(result.category_confidence, FAILED_CONFIDENCE);
        assert_eq!(result.labels(), CategoryPair::UNCATEGORIZED);
        assert_eq!(result.raw_input, "  ??? ");
        assert!(result.needs_review());
    }

    #[test]
    fn test_review_decision_wire_format() {
        let decision: ReviewDecision = serde_json::from_value(serde_json::json!({
            "action": "override",
            "category": "Descriptions",
            "subcategory": "Colors",
        }))
        .unwrap();
        assert_eq!(
            decision,
            ReviewDecision::Override {
                category: Category::Descriptions,
                subcategory: Subcategory::Colors,
            }
        );
    }
}
