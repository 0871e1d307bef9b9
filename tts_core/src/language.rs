// Language codes and the heuristic text language detector.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    Pt,
    Es,
    Fr,
    It,
    De,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 6] = [
        LanguageCode::En,
        LanguageCode::Pt,
        LanguageCode::Es,
        LanguageCode::Fr,
        LanguageCode::It,
        LanguageCode::De,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Pt => "pt",
            LanguageCode::Es => "es",
            LanguageCode::Fr => "fr",
            LanguageCode::It => "it",
            LanguageCode::De => "de",
        }
    }

    /// Parse a language tag leniently: `pt`, `PT`, `pt-BR` and `pt_BR` all give `Pt`.
    /// Unsupported tags give `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::ALL.into_iter().find(|lang| lang.as_str() == primary)
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in this order; the first language with a hit wins.
const PORTUGUESE_PATTERNS: &[&str] = &[
    "ã", "õ", "ç", "você", "estou", "querido", "filho", "coração", "senhor", "deus",
];
const SPANISH_PATTERNS: &[&str] = &["ñ", "está", "hijo", "corazón", "señor", "dios"];
const FRENCH_PATTERNS: &[&str] = &["è", "ê", "ë", "vous", "je suis", "mon enfant"];

/// Guess the language of `text` from characteristic words and diacritics.
///
/// This is a cheap heuristic: anything that matches none of the Portuguese,
/// Spanish or French patterns is treated as English.
pub fn detect_language(text: &str) -> LanguageCode {
    let lowered = text.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lowered.contains(p));

    if matches(PORTUGUESE_PATTERNS) {
        LanguageCode::Pt
    } else if matches(SPANISH_PATTERNS) {
        LanguageCode::Es
    } else if matches(FRENCH_PATTERNS) {
        LanguageCode::Fr
    } else {
        LanguageCode::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_portuguese() {
        assert_eq!(detect_language("A paz esteja com você"), LanguageCode::Pt);
        assert_eq!(detect_language("CORAÇÃO"), LanguageCode::Pt);
    }

    #[test]
    fn test_detect_spanish() {
        assert_eq!(detect_language("La paz esté contigo, hijo"), LanguageCode::Es);
        assert_eq!(detect_language("Mañana"), LanguageCode::Es);
    }

    #[test]
    fn test_detect_french() {
        assert_eq!(detect_language("Je suis avec vous"), LanguageCode::Fr);
        assert_eq!(detect_language("Très bien"), LanguageCode::Fr);
    }

    #[test]
    fn test_portuguese_wins_over_spanish() {
        // "está" is Spanish-listed but "você" is checked first
        assert_eq!(detect_language("Você está aqui"), LanguageCode::Pt);
    }

    #[test]
    fn test_defaults_to_english() {
        assert_eq!(detect_language("Peace be with you"), LanguageCode::En);
        assert_eq!(detect_language("ok"), LanguageCode::En);
        assert_eq!(detect_language(""), LanguageCode::En);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let text = "Mon enfant, je suis là";
        let first = detect_language(text);
        for _ in 0..10 {
            assert_eq!(detect_language(text), first);
        }
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(LanguageCode::parse("pt"), Some(LanguageCode::Pt));
        assert_eq!(LanguageCode::parse("pt-BR"), Some(LanguageCode::Pt));
        assert_eq!(LanguageCode::parse("de_DE"), Some(LanguageCode::De));
        assert_eq!(LanguageCode::parse(" EN "), Some(LanguageCode::En));
        assert_eq!(LanguageCode::parse("ja"), None);
        assert_eq!(LanguageCode::parse(""), None);
    }
}
