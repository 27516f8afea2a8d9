use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Service terms the pipeline treats as "current era".
pub const SUPPORTED_TERMS: [i32; 3] = [20, 21, 22];

/// Terms covered by the historical-records feed.
pub const HISTORICAL_TERMS: [i32; 2] = [20, 21];

// ============ Persisted records ============

/// Per-term snapshot kept in `Person::session_details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub party: String,
    pub district: Option<String>,
    pub vote_share: Option<f64>,
}

/// A reconciled legislator profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    /// Birth date as reported by the feed (`""` when unknown).
    pub birth_date: String,
    /// Romanized handle used to build profile page URLs.
    pub english_name: Option<String>,
    pub party: Option<String>,
    pub gender: Option<String>,
    pub district: Option<String>,
    pub vote_share: Option<f64>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub homepage: Option<String>,
    pub photo_url: Option<String>,
    /// Sorted ascending, no duplicates.
    pub sessions: Vec<i32>,
    pub session_details: BTreeMap<i32, SessionDetail>,
    pub education: Vec<String>,
    pub career: Vec<String>,
    pub view_count: i64,
}

impl Person {
    pub fn new(name: &str, birth_date: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            birth_date: birth_date.to_string(),
            english_name: None,
            party: None,
            gender: None,
            district: None,
            vote_share: None,
            phone: None,
            email: None,
            homepage: None,
            photo_url: None,
            sessions: Vec::new(),
            session_details: BTreeMap::new(),
            education: Vec::new(),
            career: Vec::new(),
            view_count: 0,
        }
    }

    pub fn first_term(&self) -> Option<i32> {
        self.sessions.first().copied()
    }

    pub fn latest_term(&self) -> Option<i32> {
        self.sessions.last().copied()
    }

    /// Inserts `term` keeping `sessions` sorted and duplicate-free.
    /// Returns `false` when the term was already present.
    pub fn add_session(&mut self, term: i32) -> bool {
        match self.sessions.binary_search(&term) {
            Ok(_) => false,
            Err(pos) => {
                self.sessions.insert(pos, term);
                true
            }
        }
    }

    pub fn has_biography(&self) -> bool {
        !self.education.is_empty() || !self.career.is_empty()
    }

    /// Folds classified items into the education/career lists,
    /// skipping exact duplicates and keeping first-seen order.
    pub fn absorb_items(&mut self, items: &[BiographyItem]) -> usize {
        let mut added = 0;
        for item in items {
            let list = match item.label {
                BioLabel::Education => &mut self.education,
                BioLabel::Career => &mut self.career,
            };
            if !list.contains(&item.text) {
                list.push(item.text.clone());
                added += 1;
            }
        }
        added
    }
}

/// A legislative bill, keyed by the feed's stable `BILL_ID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub bill_id: String,
    pub bill_no: Option<String>,
    pub term: i32,
    pub title: String,
    pub proposer: Option<String>,
    pub propose_date: Option<String>,
    pub committee: Option<String>,
    pub detail_link: Option<String>,
    pub proc_result: Option<String>,
}

// ============ Biography items ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BioLabel {
    Education,
    Career,
}

/// Which fallback stage produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    HistoricalRecords,
    ProfilePage,
    RawField,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Provenance::HistoricalRecords => "historical_records",
            Provenance::ProfilePage => "profile_page",
            Provenance::RawField => "raw_field",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiographyItem {
    pub text: String,
    pub label: BioLabel,
    pub provenance: Provenance,
}

// ============ Sync job ============

/// Which passes a sync job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Deduplicate, then members, then bills.
    #[default]
    Full,
    Members,
    Bills,
    Dedup,
}

/// Process-wide sync status, served to pollers as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncJobStatus {
    pub running: bool,
    /// 0..=100
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
    pub completed: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub processed: u64,
}

/// Reported by a pass after each committed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassProgress {
    pub page: u32,
    /// Records handled so far in this pass.
    pub processed: u64,
    /// Feed total when the feed reports one.
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StartSyncRequest {
    #[serde(default)]
    pub mode: SyncMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, label: BioLabel) -> BiographyItem {
        BiographyItem {
            text: text.to_string(),
            label,
            provenance: Provenance::RawField,
        }
    }

    #[test]
    fn test_add_session_keeps_order_and_uniqueness() {
        let mut p = Person::new("홍길동", "1970-01-01");
        assert!(p.add_session(22));
        assert!(p.add_session(20));
        assert!(!p.add_session(22));
        assert!(p.add_session(21));
        assert_eq!(p.sessions, vec![20, 21, 22]);
        assert_eq!(p.first_term(), Some(20));
        assert_eq!(p.latest_term(), Some(22));
    }

    #[test]
    fn test_absorb_items_dedups_preserving_order() {
        let mut p = Person::new("홍길동", "");
        let added = p.absorb_items(&[
            item("서울대학교 법학과 졸업", BioLabel::Education),
            item("제21대 국회의원", BioLabel::Career),
            item("서울대학교 법학과 졸업", BioLabel::Education),
            item("법무법인 대표변호사", BioLabel::Career),
        ]);
        assert_eq!(added, 3);
        assert_eq!(p.education, vec!["서울대학교 법학과 졸업"]);
        assert_eq!(p.career, vec!["제21대 국회의원", "법무법인 대표변호사"]);
        assert!(p.has_biography());
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = SyncJobStatus {
            running: true,
            progress: 40,
            message: "members page 2".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["running"], true);
        assert_eq!(value["progress"], 40);
        assert!(value["error"].is_null());
    }
}
