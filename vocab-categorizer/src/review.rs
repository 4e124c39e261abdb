//! Teacher review of predicted categories.

use std::collections::BTreeMap;

use crate::category::{Category, CategoryPair};
use crate::error::CategorizerError;
use crate::model::ReviewDecision;
use crate::store::{ReviewUpdate, StoredVocabularyItem, VocabularyStore};

/// Items awaiting a teacher's verdict, least confident first.
///
/// An item is pending while its confidence is below
/// [`REVIEW_THRESHOLD`](crate::model::REVIEW_THRESHOLD) or the teacher has not
/// yet approved it. Items with no prediction count as zero confidence.
pub async fn pending_review<S: VocabularyStore>(
    store: &S,
    teacher_id: &str,
) -> Result<Vec<StoredVocabularyItem>, CategorizerError> {
    let mut pending: Vec<StoredVocabularyItem> = store
        .teacher_items(teacher_id)
        .await?
        .into_iter()
        .filter(|item| item.needs_review() || !item.teacher_approved_category)
        .collect();
    pending.sort_by(|a, b| {
        let a_confidence = a.category_confidence.unwrap_or(0.0);
        let b_confidence = b.category_confidence.unwrap_or(0.0);
        a_confidence.total_cmp(&b_confidence)
    });
    Ok(pending)
}

impl ReviewDecision {
    pub fn to_update(self) -> Result<ReviewUpdate, CategorizerError> {
        Ok(match self {
            ReviewDecision::Approve => ReviewUpdate {
                teacher_approved_category: true,
                manual_category: None,
                manual_subcategory: None,
            },
            ReviewDecision::Reject => ReviewUpdate {
                teacher_approved_category: false,
                manual_category: None,
                manual_subcategory: None,
            },
            ReviewDecision::Override {
                category,
                subcategory,
            } => {
                let labels = CategoryPair::new(category, subcategory).ok_or_else(|| {
                    CategorizerError::InvalidDecision(format!(
                        "{subcategory} is not a subcategory of {category}"
                    ))
                })?;
                ReviewUpdate {
                    teacher_approved_category: true,
                    manual_category: Some(labels.category),
                    manual_subcategory: Some(labels.subcategory),
                }
            }
        })
    }
}

pub async fn record_decision<S: VocabularyStore>(
    store: &S,
    item_id: &str,
    decision: ReviewDecision,
) -> Result<(), CategorizerError> {
    let update = decision.to_update()?;
    store.save_review(item_id, &update).await?;
    log::info!("Recorded {decision:?} for item {item_id}");
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategorizationAnalytics {
    pub total_items: usize,
    /// Items predicted into a category other than General.
    pub categorized_items: usize,
    pub approved_items: usize,
    pub needs_review_items: usize,
    pub average_confidence: f64,
    /// Effective category name to item count.
    pub category_histogram: BTreeMap<String, usize>,
}

impl CategorizationAnalytics {
    pub fn from_items(items: &[StoredVocabularyItem]) -> Self {
        let mut analytics = CategorizationAnalytics {
            total_items: items.len(),
            ..Default::default()
        };

        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;
        for item in items {
            if item
                .predicted_category
                .is_some_and(|category| category != Category::General)
            {
                analytics.categorized_items += 1;
            }
            if item.teacher_approved_category {
                analytics.approved_items += 1;
            }
            if item.needs_review() {
                analytics.needs_review_items += 1;
            }
            if let Some(confidence) = item.category_confidence {
                confidence_sum += confidence;
                confidence_count += 1;
            }
            if let Some(labels) = item.effective_labels() {
                *analytics
                    .category_histogram
                    .entry(labels.category.name().to_string())
                    .or_default() += 1;
            }
        }

        if confidence_count > 0 {
            analytics.average_confidence = confidence_sum / confidence_count as f64;
        }
        analytics
    }
}

pub async fn analytics<S: VocabularyStore>(
    store: &S,
    teacher_id: &str,
) -> Result<CategorizationAnalytics, CategorizerError> {
    let items = store.teacher_items(teacher_id).await?;
    Ok(CategorizationAnalytics::from_items(&items))
}
