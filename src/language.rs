//! Language classification of extracted document text.
//!
//! A document is Arabic as soon as a single code point falls inside one of
//! the Arabic Unicode blocks; everything else is treated as English. There is
//! no frequency threshold and no positive Latin-script check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Language tag assigned to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    English,
}

impl Language {
    /// Lowercase tag used in CSV cells and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Arabic => "arabic",
            Language::English => "english",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arabic, Arabic Supplement, Arabic Extended-A and the two presentation-form blocks.
const ARABIC_RANGES: [RangeInclusive<char>; 5] = [
    '\u{0600}'..='\u{06FF}',
    '\u{0750}'..='\u{077F}',
    '\u{08A0}'..='\u{08FF}',
    '\u{FB50}'..='\u{FDFF}',
    '\u{FE70}'..='\u{FEFF}',
];

/// Whether `c` lies in any of the Arabic blocks.
pub fn is_arabic_char(c: char) -> bool {
    ARABIC_RANGES.iter().any(|r| r.contains(&c))
}

/// Classify `text` as Arabic or English.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(is_arabic_char) {
        Language::Arabic
    } else {
        Language::English
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_english() {
        assert_eq!(detect_language("Total Revenue: 1000000"), Language::English);
    }

    #[test]
    fn empty_text_falls_back_to_english() {
        assert_eq!(detect_language(""), Language::English);
    }

    #[test]
    fn arabic_words_are_arabic() {
        assert_eq!(detect_language("إجمالي_الإيرادات"), Language::Arabic);
    }

    #[test]
    fn single_code_point_is_enough() {
        let text = format!("Annual report {} 2024", '\u{0627}');
        assert_eq!(detect_language(&text), Language::Arabic);
    }

    #[test]
    fn every_range_boundary_is_arabic() {
        for c in [
            '\u{0600}', '\u{06FF}', '\u{0750}', '\u{077F}', '\u{08A0}', '\u{08FF}', '\u{FB50}',
            '\u{FDFF}', '\u{FE70}', '\u{FEFF}',
        ] {
            assert_eq!(
                detect_language(&c.to_string()),
                Language::Arabic,
                "U+{:04X} should be Arabic",
                c as u32
            );
        }
    }

    #[test]
    fn neighbours_of_ranges_are_not_arabic() {
        for c in ['\u{05FF}', '\u{0700}', '\u{0780}', '\u{089F}', '\u{FB4F}', '\u{FE00}'] {
            assert_eq!(detect_language(&c.to_string()), Language::English);
        }
    }

    #[test]
    fn latin_with_diacritics_is_english() {
        assert_eq!(detect_language("Société Générale — résumé"), Language::English);
    }

    #[test]
    fn display_matches_tag() {
        assert_eq!(Language::Arabic.to_string(), "arabic");
        assert_eq!(Language::English.as_str(), "english");
    }
}
