use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::errors::AppError;
use crate::models::SUPPORTED_TERMS;

const ELECTED: &str = "당선";

#[derive(Debug, Deserialize)]
struct RawRow {
    name: String,
    age: String,
    #[serde(default)]
    constituency: Option<String>,
    #[serde(default)]
    vote_percent: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElectionRecord {
    pub term: i32,
    pub district: Option<String>,
    pub vote_share: Option<f64>,
}

/// Locally held election results, keyed by candidate name and term.
#[derive(Debug, Default, Clone)]
pub struct ElectionTable {
    by_name: HashMap<String, BTreeMap<i32, ElectionRecord>>,
}

impl ElectionTable {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::InternalError(format!(
                "Failed to read election table {}: {}",
                path.display(),
                e
            ))
        })?;
        let table = Self::from_csv(&raw)?;
        tracing::info!(
            "Election table loaded from {}: {} candidates",
            path.display(),
            table.len()
        );
        Ok(table)
    }

    pub fn from_csv(raw: &str) -> Result<Self, AppError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_bytes());

        let mut table = Self::default();
        for (line, result) in reader.deserialize::<RawRow>().enumerate() {
            let row = result.map_err(|e| {
                AppError::ParseError(format!("Election table row {}: {}", line + 2, e))
            })?;

            if let Some(status) = row.status.as_deref() {
                if !status.is_empty() && status != ELECTED {
                    continue;
                }
            }
            let Some(term) = parse_term(&row.age) else {
                tracing::warn!("Skipping election row with bad term: {:?}", row.age);
                continue;
            };
            let name = row.name.trim().to_string();
            if name.is_empty() {
                continue;
            }

            table
                .by_name
                .entry(name)
                .or_default()
                .entry(term)
                .or_insert(ElectionRecord {
                    term,
                    district: row.constituency.filter(|c| !c.is_empty()),
                    vote_share: row.vote_percent.as_deref().and_then(parse_vote_share),
                });
        }
        Ok(table)
    }

    /// Supported terms the name won, ascending.
    pub fn terms_for(&self, name: &str) -> Vec<i32> {
        self.by_name
            .get(name)
            .map(|terms| {
                terms
                    .keys()
                    .copied()
                    .filter(|t| SUPPORTED_TERMS.contains(t))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str, term: i32) -> Option<&ElectionRecord> {
        self.by_name.get(name)?.get(&term)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn parse_term(raw: &str) -> Option<i32> {
    let raw = raw.trim().trim_end_matches('대');
    raw.parse::<i32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as i32))
}

/// `"53.21%"` → 53.21; `"nan%"` and blanks are unknown.
fn parse_vote_share(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().trim_end_matches('%').trim().parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}name,age,constituency,vote_percent,status\n\
        홍길동,20,서울 종로구,52.3%,당선\n\
        홍길동,22,서울 종로구,nan%,당선\n\
        김철수,21,부산 해운대구갑,48.1%,낙선\n\
        이영희,21,비례대표,nan%,\n\
        박민수,19,대구 중구,60.0%,당선\n";

    #[test]
    fn test_bom_and_status_filter() {
        let table = ElectionTable::from_csv(SAMPLE).unwrap();
        assert_eq!(table.terms_for("홍길동"), vec![20, 22]);
        assert!(table.terms_for("김철수").is_empty());
        assert_eq!(table.terms_for("이영희"), vec![21]);
    }

    #[test]
    fn test_unsupported_terms_are_not_matched() {
        let table = ElectionTable::from_csv(SAMPLE).unwrap();
        assert!(table.terms_for("박민수").is_empty());
        assert!(table.get("박민수", 19).is_some());
    }

    #[test]
    fn test_vote_share_parsing() {
        let table = ElectionTable::from_csv(SAMPLE).unwrap();
        assert_eq!(table.get("홍길동", 20).unwrap().vote_share, Some(52.3));
        assert_eq!(table.get("홍길동", 22).unwrap().vote_share, None);
        assert_eq!(
            table.get("홍길동", 20).unwrap().district.as_deref(),
            Some("서울 종로구")
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ElectionTable::load(Path::new("/nonexistent/election.csv")).unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
    }
}
