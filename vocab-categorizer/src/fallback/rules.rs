use language_utils::text_cleanup::normalize_for_matching;

use super::{FallbackCategorization, FallbackCategorizer};
use crate::category::{Category, CategoryPair, Subcategory};
use crate::linguistic::LinguisticComponents;
use crate::model::VocabularyItem;

/// A keyword set and the categorization it implies.
#[derive(Debug)]
pub struct KeywordRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub category: Category,
    pub subcategory: Subcategory,
    pub confidence: f64,
}

impl KeywordRule {
    /// Substring containment, so plurals and inflections (`huevos`, `reds`)
    /// still hit their keyword.
    fn matches(&self, base_word: &str, translation: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| base_word.contains(keyword) || translation.contains(keyword))
    }

    fn categorization(&self) -> FallbackCategorization {
        FallbackCategorization {
            labels: CategoryPair::new(self.category, self.subcategory)
                .unwrap_or(CategoryPair::UNCATEGORIZED),
            confidence: self.confidence,
        }
    }
}

/// Evaluated in order; the first rule that matches wins, so a term that
/// contains keywords of two rules takes the earlier one. No keyword appears
/// in more than one rule.
pub static RULES: &[KeywordRule] = &[
    KeywordRule {
        name: "food_drink",
        keywords: &[
            "food", "drink", "eat", "comida", "bebida", "comer", "beber", "agua", "water", "pan",
            "bread", "leche", "milk", "fruta", "fruit", "manzana", "apple", "café", "coffee", "té",
            "tea", "carne", "meat", "pescado", "fish", "queso", "cheese", "huevo", "egg",
            "arroz", "rice", "verdura", "vegetable", "vegetables", "desayuno", "breakfast",
            "almuerzo", "lunch", "cena", "dinner", "zumo", "juice",
        ],
        category: Category::FoodAndDrink,
        subcategory: Subcategory::FoodAndDrinkVocabulary,
        confidence: 0.8,
    },
    KeywordRule {
        name: "family",
        keywords: &[
            "family", "familia", "madre", "mother", "mum", "padre", "father", "dad", "padres",
            "parents", "hermano", "brother", "hermana", "sister", "abuelo", "grandfather",
            "abuela", "grandmother", "hijo", "son", "hija", "daughter", "tío", "uncle", "tía",
            "aunt", "primo", "prima", "cousin",
        ],
        category: Category::IdentityAndRelationships,
        subcategory: Subcategory::FamilyAndFriends,
        confidence: 0.85,
    },
    KeywordRule {
        name: "colors",
        keywords: &[
            "color", "colour", "rojo", "roja", "red", "azul", "blue", "verde", "green",
            "amarillo", "amarilla", "yellow", "negro", "negra", "black", "blanco", "blanca",
            "white", "gris", "grey", "gray", "naranja", "orange", "rosa", "pink", "morado",
            "purple", "marrón", "brown",
        ],
        category: Category::Descriptions,
        subcategory: Subcategory::Colors,
        confidence: 0.9,
    },
    KeywordRule {
        name: "numbers",
        keywords: &[
            "number", "número", "uno", "one", "dos", "two", "tres", "three", "cuatro", "four",
            "cinco", "five", "seis", "six", "siete", "seven", "ocho", "eight", "nueve", "nine",
            "diez", "ten", "veinte", "twenty", "cien", "hundred", "mil", "thousand",
        ],
        category: Category::NumbersAndTime,
        subcategory: Subcategory::Numbers,
        confidence: 0.9,
    },
];

/// Apply [`RULES`] to the base word and translation.
pub fn categorize_by_keywords(
    item: &VocabularyItem,
    linguistic: &LinguisticComponents,
) -> FallbackCategorization {
    let base_word = normalize_for_matching(&linguistic.base_word);
    let translation = normalize_for_matching(&item.translation);

    RULES
        .iter()
        .find(|rule| rule.matches(&base_word, &translation))
        .map(KeywordRule::categorization)
        .unwrap_or(FallbackCategorization::DEFAULT)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedCategorizer;

impl FallbackCategorizer for RuleBasedCategorizer {
    async fn categorize(
        &self,
        item: &VocabularyItem,
        linguistic: &LinguisticComponents,
    ) -> FallbackCategorization {
        categorize_by_keywords(item, linguistic)
    }
}
