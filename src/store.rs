use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Bill, Person};

#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Exact (name, birth date) lookup.
    async fn find_member(&self, name: &str, birth_date: &str) -> Result<Option<Person>, AppError>;

    async fn find_members_by_name(&self, name: &str) -> Result<Vec<Person>, AppError>;

    /// Every person, oldest record first.
    async fn list_members(&self) -> Result<Vec<Person>, AppError>;

    /// Inserts or replaces by id, all-or-nothing.
    async fn upsert_members(&self, people: &[Person]) -> Result<(), AppError>;

    /// Saves `canonical` and deletes `absorbed` in one unit of work.
    async fn merge_members(&self, canonical: &Person, absorbed: &[Uuid]) -> Result<(), AppError>;

    /// Persons with at least one term but no education or career.
    async fn count_missing_biography(&self) -> Result<u64, AppError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillUpsertSummary {
    pub inserted: u64,
    pub updated: u64,
}

#[async_trait]
pub trait BillStore: Send + Sync {
    async fn find_bill(&self, bill_id: &str) -> Result<Option<Bill>, AppError>;

    /// Inserts absent bills and overwrites present ones, all-or-nothing.
    async fn upsert_bills(&self, bills: &[Bill]) -> Result<BillUpsertSummary, AppError>;

    async fn count_bills(&self) -> Result<u64, AppError>;
}

/// In-process store. Members keep insertion order so "first record" means
/// the same thing it does in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    members: Mutex<Vec<Person>>,
    bills: Mutex<HashMap<String, Bill>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn find_member(&self, name: &str, birth_date: &str) -> Result<Option<Person>, AppError> {
        let members = self.members.lock().await;
        Ok(members
            .iter()
            .find(|p| p.name == name && p.birth_date == birth_date)
            .cloned())
    }

    async fn find_members_by_name(&self, name: &str) -> Result<Vec<Person>, AppError> {
        let members = self.members.lock().await;
        Ok(members.iter().filter(|p| p.name == name).cloned().collect())
    }

    async fn list_members(&self) -> Result<Vec<Person>, AppError> {
        Ok(self.members.lock().await.clone())
    }

    async fn upsert_members(&self, people: &[Person]) -> Result<(), AppError> {
        let mut members = self.members.lock().await;
        for person in people {
            match members.iter_mut().find(|p| p.id == person.id) {
                Some(existing) => *existing = person.clone(),
                None => members.push(person.clone()),
            }
        }
        Ok(())
    }

    async fn merge_members(&self, canonical: &Person, absorbed: &[Uuid]) -> Result<(), AppError> {
        let mut members = self.members.lock().await;
        let Some(slot) = members.iter_mut().find(|p| p.id == canonical.id) else {
            return Err(AppError::NotFound(format!(
                "Canonical person {} not found",
                canonical.id
            )));
        };
        *slot = canonical.clone();
        members.retain(|p| !absorbed.contains(&p.id));
        Ok(())
    }

    async fn count_missing_biography(&self) -> Result<u64, AppError> {
        let members = self.members.lock().await;
        Ok(members
            .iter()
            .filter(|p| !p.sessions.is_empty() && !p.has_biography())
            .count() as u64)
    }
}

#[async_trait]
impl BillStore for MemoryStore {
    async fn find_bill(&self, bill_id: &str) -> Result<Option<Bill>, AppError> {
        Ok(self.bills.lock().await.get(bill_id).cloned())
    }

    async fn upsert_bills(&self, bills: &[Bill]) -> Result<BillUpsertSummary, AppError> {
        let mut stored = self.bills.lock().await;
        let mut summary = BillUpsertSummary::default();
        for bill in bills {
            if stored.insert(bill.bill_id.clone(), bill.clone()).is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }
        Ok(summary)
    }

    async fn count_bills(&self) -> Result<u64, AppError> {
        Ok(self.bills.lock().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_by_id_and_keeps_order() {
        let store = MemoryStore::new();
        let mut a = Person::new("가나다", "1960");
        let b = Person::new("라마바", "1970");
        store.upsert_members(&[a.clone(), b.clone()]).await.unwrap();

        a.party = Some("무소속".into());
        store.upsert_members(&[a.clone()]).await.unwrap();

        let all = store.list_members().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id);
        assert_eq!(all[0].party.as_deref(), Some("무소속"));
    }

    #[tokio::test]
    async fn test_merge_deletes_absorbed() {
        let store = MemoryStore::new();
        let a = Person::new("가나다", "1960");
        let b = Person::new("가나다", "");
        store.upsert_members(&[a.clone(), b.clone()]).await.unwrap();

        store.merge_members(&a, &[b.id]).await.unwrap();
        assert_eq!(store.find_members_by_name("가나다").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bill_upsert_counts() {
        let store = MemoryStore::new();
        let bill = Bill {
            bill_id: "PRC_1".into(),
            bill_no: Some("2100001".into()),
            term: 21,
            title: "법률안".into(),
            proposer: None,
            propose_date: None,
            committee: None,
            detail_link: None,
            proc_result: None,
        };
        let first = store.upsert_bills(&[bill.clone()]).await.unwrap();
        let second = store.upsert_bills(&[bill]).await.unwrap();
        assert_eq!(first, BillUpsertSummary { inserted: 1, updated: 0 });
        assert_eq!(second, BillUpsertSummary { inserted: 0, updated: 1 });
        assert_eq!(store.count_bills().await.unwrap(), 1);
    }
}
