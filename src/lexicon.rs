use serde::Deserialize;
use std::path::Path;

use crate::errors::AppError;

const EMBEDDED_V1: &str = include_str!("../lexicon/v1.json");

/// Keyword lexicons for segmentation, classification and noise detection.
///
/// The default version is embedded from `lexicon/v1.json`; `LEXICON_PATH`
/// points at a replacement file so rules can be tuned without a rebuild.
#[derive(Debug, Clone, Deserialize)]
pub struct Lexicon {
    pub version: String,
    pub education_terms: Vec<String>,
    /// Professor ranks, lecturer, research fellow. Counted as education.
    pub academic_titles: Vec<String>,
    pub split_suffixes: Vec<String>,
    pub protected_compounds: Vec<String>,
    pub section_headers: Vec<String>,
    pub cleanup_prefixes: Vec<String>,
    pub contact_markers: Vec<String>,
    pub navigation_phrases: Vec<String>,
    pub noise: NoiseLexicon,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoiseLexicon {
    pub section_markers: Vec<String>,
    pub content_vocabulary: Vec<String>,
    pub office_titles: Vec<String>,
    pub party_names: Vec<String>,
    /// `{name}` is replaced with the person's display name.
    pub menu_phrases: Vec<String>,
    pub suspicious_ui_phrases: Vec<String>,
}

impl Lexicon {
    /// The lexicon compiled into the binary.
    pub fn embedded() -> Result<Self, AppError> {
        Self::from_json(EMBEDDED_V1)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let lexicon: Lexicon = serde_json::from_str(raw)
            .map_err(|e| AppError::ParseError(format!("Invalid lexicon: {}", e)))?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::InternalError(format!(
                "Failed to read lexicon {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Loads the override at `path` if given, otherwise the embedded default.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let lexicon = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::embedded()?,
        };
        tracing::info!("Lexicon {} loaded", lexicon.version);
        Ok(lexicon)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.version.trim().is_empty() {
            return Err(AppError::ParseError("Lexicon version is empty".into()));
        }
        if self.education_terms.is_empty() {
            return Err(AppError::ParseError(
                "Lexicon has no education terms".into(),
            ));
        }
        if self.section_headers.is_empty() || self.split_suffixes.is_empty() {
            return Err(AppError::ParseError(
                "Lexicon needs section headers and split suffixes".into(),
            ));
        }
        Ok(())
    }
}

/// Regex alternation of escaped literals, longest first so that
/// `위원장` wins over `위원`.
pub(crate) fn alternation(words: &[String]) -> String {
    let mut sorted: Vec<&str> = words
        .iter()
        .map(|w| w.as_str())
        .filter(|w| !w.is_empty())
        .collect();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    sorted.dedup();
    sorted
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|")
}
