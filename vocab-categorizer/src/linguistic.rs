use language_utils::{Gender, Language};

/// A vocabulary term split into its base word and the annotations around it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinguisticComponents {
    pub base_word: String,
    pub article: Option<String>,
    pub gender: Option<Gender>,
}

/// Strip a trailing gender marker and a leading article from `term`
///
/// `"la mesa (f)"` becomes `mesa` with article `la` and gender `f`. A term
/// that consists only of an article (`"la"`) or only of a marker (`"(f)"`)
/// is left whole, so a non-empty term never yields an empty base word.
pub fn decompose(term: &str, language: Language) -> LinguisticComponents {
    let normalized = term.trim().to_lowercase();

    let (rest, gender) = split_gender_marker(&normalized);
    let (article, base_word) = split_article(rest, language);

    LinguisticComponents {
        base_word: base_word.to_string(),
        article: article.map(str::to_string),
        gender,
    }
}

fn split_gender_marker(term: &str) -> (&str, Option<Gender>) {
    let Some(open) = term.rfind('(') else {
        return (term, None);
    };
    let (rest, marker) = term.split_at(open);
    let rest = rest.trim_end();
    if rest.is_empty() {
        return (term, None);
    }
    match Gender::from_marker(marker.trim_end()) {
        Some(gender) => (rest, Some(gender)),
        None => (term, None),
    }
}

fn split_article(term: &str, language: Language) -> (Option<&str>, &str) {
    let Some((first, rest)) = term.split_once(char::is_whitespace) else {
        return (None, term.trim());
    };
    let rest = rest.trim();
    if language.is_article(first) && !rest.is_empty() {
        (Some(first), rest)
    } else {
        (None, term.trim())
    }
}
