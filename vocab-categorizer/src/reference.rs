//! The centralized reference vocabulary, as seen by the categorizer.
//!
//! The table is owned by a separate ingestion process; every backend only
//! reads from it.

use std::future::Future;

use language_utils::Language;

use crate::category::CategoryPair;
use crate::error::CategorizerError;

/// One row of the `centralized_vocabulary` table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CentralizedMatch {
    pub id: String,
    pub word: String,
    #[serde(default)]
    pub base_word: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    pub language: String,
}

impl CentralizedMatch {
    /// The row's labels, if it carries a category and subcategory that
    /// belong to the taxonomy.
    pub fn labels(&self) -> Option<CategoryPair> {
        let (Some(category), Some(subcategory)) = (&self.category, &self.subcategory) else {
            return None;
        };
        match CategoryPair::parse(category, subcategory) {
            Ok(labels) => Some(labels),
            Err(e) => {
                log::warn!(
                    "Reference row {} has labels outside the taxonomy ({category:?} / {subcategory:?}): {e}",
                    self.id
                );
                None
            }
        }
    }

    pub fn is_categorized(&self) -> bool {
        self.category.is_some() && self.subcategory.is_some()
    }
}

/// Equality lookup on `word` or `base_word`.
#[derive(Debug, Clone)]
pub struct ExactQuery<'a> {
    /// Values compared against both `word` and `base_word`.
    pub terms: Vec<&'a str>,
    pub language: Language,
    /// Only return rows whose category and subcategory are both set.
    pub require_category: bool,
    pub limit: usize,
}

/// Text search for rows whose `word` contains `word`. Backends return
/// categorized rows first.
#[derive(Debug, Clone)]
pub struct FuzzyQuery<'a> {
    pub word: &'a str,
    pub language: Language,
    pub limit: usize,
}

/// Read access to the reference vocabulary
///
/// Exact candidates must come back ordered by category (rows without a
/// category last) and then by id, so repeated lookups are stable.
pub trait ReferenceVocabulary: Send + Sync {
    fn exact_candidates(
        &self,
        query: &ExactQuery<'_>,
    ) -> impl Future<Output = Result<Vec<CentralizedMatch>, CategorizerError>> + Send;

    fn fuzzy_candidates(
        &self,
        query: &FuzzyQuery<'_>,
    ) -> impl Future<Output = Result<Vec<CentralizedMatch>, CategorizerError>> + Send;
}

/// Sort key shared by the in-process backends: category ascending with
/// missing categories last, then id.
pub(crate) fn candidate_order(row: &CentralizedMatch) -> (bool, Option<String>, String) {
    (row.category.is_none(), row.category.clone(), row.id.clone())
}
