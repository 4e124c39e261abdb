use std::path::PathBuf;

use language_utils::Language;
use tysm::chat_completions::ChatClient;

use super::{FallbackCategorization, FallbackCategorizer};
use crate::category::{Category, CategoryPair};
use crate::linguistic::LinguisticComponents;
use crate::model::VocabularyItem;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct AiCategorizationResponse {
    #[serde(rename = "1. thoughts")]
    pub thoughts: String,
    #[serde(rename = "2. category")]
    pub category: String,
    #[serde(rename = "3. subcategory")]
    pub subcategory: String,
    #[serde(rename = "4. confidence")]
    pub confidence: f64,
}

/// Asks a language model to place an item in the taxonomy.
pub struct AiCategorizer {
    client: ChatClient,
    language: Language,
    min_confidence: f64,
}

impl AiCategorizer {
    pub fn new(client: ChatClient, language: Language, min_confidence: f64) -> Self {
        Self {
            client,
            language,
            min_confidence,
        }
    }

    /// Build a client from `OPENAI_API_KEY`.
    pub fn from_env(
        model: &str,
        cache_directory: Option<PathBuf>,
        language: Language,
        min_confidence: f64,
    ) -> anyhow::Result<Self> {
        let client = ChatClient::from_env(model).map_err(|e| anyhow::anyhow!("{e:?}"))?;
        let client = match cache_directory {
            Some(directory) => client.with_cache_directory(directory),
            None => client,
        };
        Ok(Self::new(client, language, min_confidence))
    }

    async fn classify(
        &self,
        item: &VocabularyItem,
        linguistic: &LinguisticComponents,
    ) -> anyhow::Result<AiCategorizationResponse> {
        let language = self.language;
        let mut user_prompt = format!(
            "{language} term: `{}` (base word: `{}`)\nTranslation: `{}`",
            item.term, linguistic.base_word, item.translation
        );
        if let Some(part_of_speech) = &item.part_of_speech {
            user_prompt.push_str(&format!("\nPart of speech: {part_of_speech}"));
        }
        if let Some(context) = &item.context_sentence {
            user_prompt.push_str(&format!("\nUsed in: {context}"));
        }

        let response: AiCategorizationResponse = self
            .client
            .chat_with_system_prompt(system_prompt(language), user_prompt)
            .await?;
        Ok(response)
    }
}

/// Keep a response only if it names a valid pair with enough confidence.
fn accept_response(
    response: &AiCategorizationResponse,
    min_confidence: f64,
) -> Option<FallbackCategorization> {
    if !(0.0..=1.0).contains(&response.confidence) || response.confidence < min_confidence {
        log::debug!(
            "Discarding model categorization {} / {} with confidence {}",
            response.category,
            response.subcategory,
            response.confidence
        );
        return None;
    }
    match CategoryPair::parse(&response.category, &response.subcategory) {
        Ok(labels) => Some(FallbackCategorization {
            labels,
            confidence: response.confidence,
        }),
        Err(e) => {
            log::warn!("Model answered outside the taxonomy: {e}");
            None
        }
    }
}

fn system_prompt(language: Language) -> String {
    let mut taxonomy = String::new();
    for category in Category::ALL {
        let subcategories = category
            .subcategories()
            .map(|subcategory| subcategory.name())
            .collect::<Vec<_>>()
            .join(", ");
        taxonomy.push_str(&format!("- {category}: {subcategories}\n"));
    }

    format!(
        r#"You are sorting {language} vocabulary from a secondary-school course into topics.
Pick exactly one category and one of its subcategories from this list:
{taxonomy}
Use "General" / "Uncategorized" if nothing fits. The subcategory must belong to the chosen category.
Give a confidence between 0 and 1 for how sure you are.
(Respond with JSON, using "1. thoughts", then "2. category", then "3. subcategory", then "4. confidence".)"#
    )
}

impl FallbackCategorizer for AiCategorizer {
    async fn categorize(
        &self,
        item: &VocabularyItem,
        linguistic: &LinguisticComponents,
    ) -> FallbackCategorization {
        match self.classify(item, linguistic).await {
            Ok(response) => accept_response(&response, self.min_confidence)
                .unwrap_or(FallbackCategorization::DEFAULT),
            Err(e) => {
                log::warn!("Model categorization failed for {:?}: {e:#}", item.term);
                FallbackCategorization::DEFAULT
            }
        }
    }
}
