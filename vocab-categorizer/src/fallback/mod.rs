//! Categorization used when the reference vocabulary has no confident match.

mod ai;
mod rules;

use std::future::Future;

use language_utils::Language;

pub use ai::{AiCategorizationResponse, AiCategorizer};
pub use rules::{KeywordRule, RULES, RuleBasedCategorizer, categorize_by_keywords};

use crate::category::CategoryPair;
use crate::config::{FallbackConfig, FallbackStrategy};
use crate::linguistic::LinguisticComponents;
use crate::model::VocabularyItem;

pub const DEFAULT_FALLBACK_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackCategorization {
    pub labels: CategoryPair,
    pub confidence: f64,
}

impl FallbackCategorization {
    pub const DEFAULT: FallbackCategorization = FallbackCategorization {
        labels: CategoryPair::UNCATEGORIZED,
        confidence: DEFAULT_FALLBACK_CONFIDENCE,
    };
}

/// Best-guess categorization for an item
///
/// Implementations never fail: anything that goes wrong degrades to
/// [`FallbackCategorization::DEFAULT`].
pub trait FallbackCategorizer: Send + Sync {
    fn categorize(
        &self,
        item: &VocabularyItem,
        linguistic: &LinguisticComponents,
    ) -> impl Future<Output = FallbackCategorization> + Send;
}

/// The fallback selected by [`FallbackConfig::strategy`].
pub enum ConfiguredFallback {
    Rules(RuleBasedCategorizer),
    Ai(AiCategorizer),
}

impl ConfiguredFallback {
    pub fn from_config(config: &FallbackConfig, language: Language) -> anyhow::Result<Self> {
        match config.strategy {
            FallbackStrategy::Rules => Ok(ConfiguredFallback::Rules(RuleBasedCategorizer)),
            FallbackStrategy::Ai => {
                let categorizer = AiCategorizer::from_env(
                    &config.model,
                    config.cache_directory.clone(),
                    language,
                    config.min_confidence,
                )?;
                Ok(ConfiguredFallback::Ai(categorizer))
            }
        }
    }
}

impl FallbackCategorizer for ConfiguredFallback {
    async fn categorize(
        &self,
        item: &VocabularyItem,
        linguistic: &LinguisticComponents,
    ) -> FallbackCategorization {
        match self {
            ConfiguredFallback::Rules(rules) => rules.categorize(item, linguistic).await,
            ConfiguredFallback::Ai(ai) => ai.categorize(item, linguistic).await,
        }
    }
}
