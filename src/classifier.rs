use regex::Regex;

use crate::errors::AppError;
use crate::lexicon::{alternation, Lexicon};
use crate::models::{BioLabel, BiographyItem, Provenance};
use crate::segmenter::MIN_FRAGMENT_CHARS;

/// Labels segmented biography items as education or career.
///
/// The classifier is total: anything that survives the exclusion filters is
/// career unless it carries an education term or an academic title.
pub struct Classifier {
    education_terms: Vec<String>,
    cleanup_prefixes: Vec<String>,
    contact_markers: Vec<String>,
    navigation_phrases: Vec<String>,
    residual_header: Regex,
    year_parenthetical: Regex,
    date_only: Regex,
    spaces: Regex,
}

impl Classifier {
    pub fn new(lexicon: &Lexicon) -> Result<Self, AppError> {
        let mut education_terms = lexicon.education_terms.clone();
        education_terms.extend(lexicon.academic_titles.iter().cloned());

        Ok(Self {
            education_terms,
            cleanup_prefixes: lexicon.cleanup_prefixes.clone(),
            contact_markers: lexicon.contact_markers.clone(),
            navigation_phrases: lexicon.navigation_phrases.clone(),
            residual_header: Regex::new(&format!(
                r"^(?:{})(?:\s*:\s*|\s+|$)",
                alternation(&lexicon.section_headers)
            ))?,
            year_parenthetical: Regex::new(r"\(\s*(?:19|20)\d{2}[^)]*\)")?,
            date_only: Regex::new(r"^[\d\s.~\-–～/()년월일현재]+$")?,
            spaces: Regex::new(r"\s{2,}")?,
        })
    }

    /// Cleans, filters and labels one segmented item.
    pub fn classify(&self, raw: &str, provenance: Provenance) -> Option<BiographyItem> {
        if self.has_contact_or_navigation(raw) {
            return None;
        }

        let text = self.clean(raw);
        if text.chars().count() < MIN_FRAGMENT_CHARS || self.date_only.is_match(&text) {
            return None;
        }

        Some(BiographyItem {
            label: self.label(&text),
            text,
            provenance,
        })
    }

    pub fn label(&self, text: &str) -> BioLabel {
        if self.education_terms.iter().any(|t| text.contains(t.as_str())) {
            BioLabel::Education
        } else {
            BioLabel::Career
        }
    }

    /// Strips leading markers, residual headers and year parentheticals.
    pub fn clean(&self, raw: &str) -> String {
        let mut text = raw.trim().to_string();

        loop {
            let before = text.len();
            if let Some(prefix) = self
                .cleanup_prefixes
                .iter()
                .find(|p| text.starts_with(p.as_str()))
            {
                text = text[prefix.len()..].trim_start().to_string();
            }
            text = self.residual_header.replace(&text, "").into_owned();
            if text.len() == before {
                break;
            }
        }

        let text = self.year_parenthetical.replace_all(&text, "");
        let text = self.spaces.replace_all(&text, " ");
        text.trim()
            .trim_end_matches(['-', '·', '•', '※'])
            .trim()
            .to_string()
    }

    fn has_contact_or_navigation(&self, raw: &str) -> bool {
        self.contact_markers
            .iter()
            .chain(self.navigation_phrases.iter())
            .any(|marker| raw.contains(marker.as_str()))
    }
}
