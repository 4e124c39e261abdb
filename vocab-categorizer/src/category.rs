//! The closed category taxonomy shared by the rule table, the reference
//! vocabulary and teacher overrides.
//!
//! Display names are the wire form. Parsing also accepts the snake_case ids
//! used by older content (`food_drink`, `family_friends`, ...).

use std::str::FromStr;

use crate::error::CategorizerError;

#[derive(
    Copy,
    Clone,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    schemars::JsonSchema,
)]
pub enum Category {
    #[serde(rename = "Food & Drink")]
    FoodAndDrink,
    #[serde(rename = "Identity & Relationships")]
    IdentityAndRelationships,
    #[serde(rename = "Descriptions")]
    Descriptions,
    #[serde(rename = "Numbers & Time")]
    NumbersAndTime,
    #[serde(rename = "Home & Local Area")]
    HomeAndLocalArea,
    #[serde(rename = "School & Jobs")]
    SchoolAndJobs,
    #[serde(rename = "General")]
    General,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::FoodAndDrink,
        Category::IdentityAndRelationships,
        Category::Descriptions,
        Category::NumbersAndTime,
        Category::HomeAndLocalArea,
        Category::SchoolAndJobs,
        Category::General,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::FoodAndDrink => "Food & Drink",
            Category::IdentityAndRelationships => "Identity & Relationships",
            Category::Descriptions => "Descriptions",
            Category::NumbersAndTime => "Numbers & Time",
            Category::HomeAndLocalArea => "Home & Local Area",
            Category::SchoolAndJobs => "School & Jobs",
            Category::General => "General",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Category::FoodAndDrink => "food_drink",
            Category::IdentityAndRelationships => "identity_relationships",
            Category::Descriptions => "descriptions",
            Category::NumbersAndTime => "numbers_time",
            Category::HomeAndLocalArea => "home_local_area",
            Category::SchoolAndJobs => "school_jobs",
            Category::General => "general",
        }
    }

    pub fn subcategories(&self) -> impl Iterator<Item = Subcategory> + '_ {
        Subcategory::ALL
            .iter()
            .copied()
            .filter(move |subcategory| subcategory.category() == *self)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Category {
    type Err = CategorizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|category| {
                category.name().eq_ignore_ascii_case(label)
                    || category.id().eq_ignore_ascii_case(label)
            })
            .ok_or_else(|| CategorizerError::UnknownCategory(s.to_string()))
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    schemars::JsonSchema,
)]
pub enum Subcategory {
    #[serde(rename = "Food & Drink Vocabulary")]
    FoodAndDrinkVocabulary,
    #[serde(rename = "Meals")]
    Meals,
    #[serde(rename = "Ordering in Cafés & Restaurants")]
    OrderingCafesRestaurants,
    #[serde(rename = "Family & Friends")]
    FamilyAndFriends,
    #[serde(rename = "Personality & Appearance")]
    PersonalityAndAppearance,
    #[serde(rename = "Colors")]
    Colors,
    #[serde(rename = "Adjectives")]
    Adjectives,
    #[serde(rename = "Numbers")]
    Numbers,
    #[serde(rename = "Days & Months")]
    DaysAndMonths,
    #[serde(rename = "Telling the Time")]
    TellingTheTime,
    #[serde(rename = "House & Home")]
    HouseAndHome,
    #[serde(rename = "Chores")]
    Chores,
    #[serde(rename = "Places in Town")]
    PlacesInTown,
    #[serde(rename = "School Life")]
    SchoolLife,
    #[serde(rename = "Jobs & Future Plans")]
    JobsAndFuturePlans,
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl Subcategory {
    pub const ALL: &'static [Subcategory] = &[
        Subcategory::FoodAndDrinkVocabulary,
        Subcategory::Meals,
        Subcategory::OrderingCafesRestaurants,
        Subcategory::FamilyAndFriends,
        Subcategory::PersonalityAndAppearance,
        Subcategory::Colors,
        Subcategory::Adjectives,
        Subcategory::Numbers,
        Subcategory::DaysAndMonths,
        Subcategory::TellingTheTime,
        Subcategory::HouseAndHome,
        Subcategory::Chores,
        Subcategory::PlacesInTown,
        Subcategory::SchoolLife,
        Subcategory::JobsAndFuturePlans,
        Subcategory::Uncategorized,
    ];

    pub fn category(&self) -> Category {
        match self {
            Subcategory::FoodAndDrinkVocabulary
            | Subcategory::Meals
            | Subcategory::OrderingCafesRestaurants => Category::FoodAndDrink,
            Subcategory::FamilyAndFriends | Subcategory::PersonalityAndAppearance => {
                Category::IdentityAndRelationships
            }
            Subcategory::Colors | Subcategory::Adjectives => Category::Descriptions,
            Subcategory::Numbers | Subcategory::DaysAndMonths | Subcategory::TellingTheTime => {
                Category::NumbersAndTime
            }
            Subcategory::HouseAndHome | Subcategory::Chores | Subcategory::PlacesInTown => {
                Category::HomeAndLocalArea
            }
            Subcategory::SchoolLife | Subcategory::JobsAndFuturePlans => Category::SchoolAndJobs,
            Subcategory::Uncategorized => Category::General,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Subcategory::FoodAndDrinkVocabulary => "Food & Drink Vocabulary",
            Subcategory::Meals => "Meals",
            Subcategory::OrderingCafesRestaurants => "Ordering in Cafés & Restaurants",
            Subcategory::FamilyAndFriends => "Family & Friends",
            Subcategory::PersonalityAndAppearance => "Personality & Appearance",
            Subcategory::Colors => "Colors",
            Subcategory::Adjectives => "Adjectives",
            Subcategory::Numbers => "Numbers",
            Subcategory::DaysAndMonths => "Days & Months",
            Subcategory::TellingTheTime => "Telling the Time",
            Subcategory::HouseAndHome => "House & Home",
            Subcategory::Chores => "Chores",
            Subcategory::PlacesInTown => "Places in Town",
            Subcategory::SchoolLife => "School Life",
            Subcategory::JobsAndFuturePlans => "Jobs & Future Plans",
            Subcategory::Uncategorized => "Uncategorized",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Subcategory::FoodAndDrinkVocabulary => "food_drink_vocabulary",
            Subcategory::Meals => "meals",
            Subcategory::OrderingCafesRestaurants => "ordering_cafes_restaurants",
            Subcategory::FamilyAndFriends => "family_friends",
            Subcategory::PersonalityAndAppearance => "personality_appearance",
            Subcategory::Colors => "colors",
            Subcategory::Adjectives => "adjectives",
            Subcategory::Numbers => "numbers",
            Subcategory::DaysAndMonths => "days_months",
            Subcategory::TellingTheTime => "telling_time",
            Subcategory::HouseAndHome => "house_home",
            Subcategory::Chores => "chores",
            Subcategory::PlacesInTown => "places_in_town",
            Subcategory::SchoolLife => "school_life",
            Subcategory::JobsAndFuturePlans => "jobs_future_plans",
            Subcategory::Uncategorized => "uncategorized",
        }
    }
}

impl std::fmt::Display for Subcategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Subcategory {
    type Err = CategorizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Subcategory::ALL
            .iter()
            .copied()
            .find(|subcategory| {
                subcategory.name().eq_ignore_ascii_case(label)
                    || subcategory.id().eq_ignore_ascii_case(label)
            })
            .ok_or_else(|| CategorizerError::UnknownCategory(s.to_string()))
    }
}

/// A category/subcategory pair whose subcategory belongs to the category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CategoryPair {
    pub category: Category,
    pub subcategory: Subcategory,
}

impl CategoryPair {
    pub const UNCATEGORIZED: CategoryPair = CategoryPair {
        category: Category::General,
        subcategory: Subcategory::Uncategorized,
    };

    pub fn new(category: Category, subcategory: Subcategory) -> Option<Self> {
        (subcategory.category() == category).then_some(Self {
            category,
            subcategory,
        })
    }

    /// Parse free-text labels as stored in a database row.
    pub fn parse(category: &str, subcategory: &str) -> Result<Self, CategorizerError> {
        let category: Category = category.parse()?;
        let subcategory: Subcategory = subcategory.parse()?;
        Self::new(category, subcategory).ok_or_else(|| {
            CategorizerError::UnknownCategory(format!("{subcategory} is not part of {category}"))
        })
    }
}
