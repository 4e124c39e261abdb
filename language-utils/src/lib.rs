pub mod text_cleanup;

use std::str::FromStr;

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    schemars::JsonSchema,
)]
pub enum Language {
    #[default]
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
    English,
}

impl Language {
    /// The code stored in the `language` column of the reference vocabulary.
    pub fn iso_639_1(&self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::English => "en",
        }
    }

    /// Definite and indefinite articles that may prefix a vocabulary term,
    /// as written in word lists (lowercase, no elision).
    pub fn articles(&self) -> &'static [&'static str] {
        match self {
            Language::Spanish => &["el", "la", "los", "las", "un", "una", "unos", "unas"],
            Language::French => &["le", "la", "les", "un", "une", "des"],
            Language::German => &[
                "der", "die", "das", "den", "dem", "des", "ein", "eine", "einen", "einem",
                "einer", "eines",
            ],
            Language::Italian => &["il", "lo", "la", "i", "gli", "le", "un", "uno", "una"],
            Language::Portuguese => &["o", "a", "os", "as", "um", "uma", "uns", "umas"],
            Language::English => &["the", "a", "an"],
        }
    }

    pub fn is_article(&self, word: &str) -> bool {
        self.articles().contains(&word)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Spanish => write!(f, "Spanish"),
            Language::French => write!(f, "French"),
            Language::German => write!(f, "German"),
            Language::Italian => write!(f, "Italian"),
            Language::Portuguese => write!(f, "Portuguese"),
            Language::English => write!(f, "English"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguage(pub String);

impl std::fmt::Display for UnknownLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Unknown language '{}'. Supported codes: spa, fra, deu, ita, por, eng",
            self.0
        )
    }
}

impl std::error::Error for UnknownLanguage {}

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts ISO 639-1 and 639-3 codes as well as English names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "es" | "spa" | "spanish" => Ok(Language::Spanish),
            "fr" | "fra" | "french" => Ok(Language::French),
            "de" | "deu" | "german" => Ok(Language::German),
            "it" | "ita" | "italian" => Ok(Language::Italian),
            "pt" | "por" | "portuguese" => Ok(Language::Portuguese),
            "en" | "eng" | "english" => Ok(Language::English),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

/// Grammatical gender as annotated in word lists: `(m)`, `(f)` or `(n)`.
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
pub enum Gender {
    #[serde(rename = "m")]
    Masculine,
    #[serde(rename = "f")]
    Feminine,
    #[serde(rename = "n")]
    Neuter,
}

impl Gender {
    pub fn code(&self) -> char {
        match self {
            Gender::Masculine => 'm',
            Gender::Feminine => 'f',
            Gender::Neuter => 'n',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_lowercase() {
            'm' => Some(Gender::Masculine),
            'f' => Some(Gender::Feminine),
            'n' => Some(Gender::Neuter),
            _ => None,
        }
    }

    /// Parses a trailing marker such as `(f)`.
    pub fn from_marker(marker: &str) -> Option<Self> {
        let inner = marker.strip_prefix('(')?.strip_suffix(')')?.trim();
        let mut chars = inner.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_code(c),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language_codes() {
        assert_eq!("spa".parse::<Language>(), Ok(Language::Spanish));
        assert_eq!("ES".parse::<Language>(), Ok(Language::Spanish));
        assert_eq!("german".parse::<Language>(), Ok(Language::German));
        assert!("kor".parse::<Language>().is_err());
    }

    #[test]
    fn test_spanish_articles() {
        let spanish = Language::Spanish;
        for article in ["el", "la", "los", "las", "un", "una", "unos", "unas"] {
            assert!(spanish.is_article(article), "{article} should be an article");
        }
        assert!(!spanish.is_article("le"));
        assert!(!spanish.is_article("coche"));
    }

    #[test]
    fn test_gender_markers() {
        assert_eq!(Gender::from_marker("(m)"), Some(Gender::Masculine));
        assert_eq!(Gender::from_marker("( f )"), Some(Gender::Feminine));
        assert_eq!(Gender::from_marker("(n)"), Some(Gender::Neuter));
        assert_eq!(Gender::from_marker("(mf)"), None);
        assert_eq!(Gender::from_marker("m"), None);
    }

    #[test]
    fn test_gender_serializes_as_code() {
        assert_eq!(
            serde_json::to_string(&Gender::Feminine).unwrap(),
            "\"f\""
        );
        let parsed: Gender = serde_json::from_str("\"m\"").unwrap();
        assert_eq!(parsed, Gender::Masculine);
    }
}
