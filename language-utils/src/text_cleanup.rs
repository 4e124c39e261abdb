//! Text normalization for vocabulary matching
//!
//! Word lists arrive from spreadsheets, word processors and hand-typed forms,
//! so the same term can show up with curly quotes, odd dashes or doubled
//! spaces. These helpers bring terms and translations to a single form
//! before they are compared.

/// Replace Unicode quote and hyphen variants with their ASCII equivalents.
pub fn normalize_typography(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            // Single quote variants: ' (U+2018), ' (U+2019), ‚ (U+201A), ‛ (U+201B),
            // ′ (U+2032), ‵ (U+2035), ＇ (U+FF07), ʼ (U+02BC), `, ´ (U+00B4)
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{2035}'
            | '\u{FF07}' | '\u{02BC}' | '`' | '\u{00B4}' => '\'',

            // Double quote variants: " (U+201C), " (U+201D), „ (U+201E), ‟ (U+201F), ＂ (U+FF02)
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{FF02}' => '"',

            // Hyphen/dash variants: ‐ (U+2010), ‑ (U+2011), ‒ (U+2012), – (U+2013),
            // — (U+2014), ― (U+2015), − (U+2212), － (U+FF0D)
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' | '\u{FF0D}' => '-',

            // Non-breaking spaces
            '\u{00A0}' | '\u{202F}' => ' ',

            _ => c,
        })
        .collect()
}

/// Normalize a term or translation for comparison
///
/// - Normalizes quotes, hyphens and non-breaking spaces
/// - Converts to lowercase
/// - Trims and collapses runs of whitespace to a single space
pub fn normalize_for_matching(text: &str) -> String {
    normalize_typography(text)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
