use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;
use crate::identity::{birth_compatible, longer_birth};
use crate::models::Person;
use crate::store::MemberStore;

/// Which records of a name group are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Every record with the same name.
    #[default]
    NameOnly,
    /// Only records whose birth dates are compatible.
    NameAndBirth,
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "name_only" => Ok(Self::NameOnly),
            "name_and_birth" | "name_birth" => Ok(Self::NameAndBirth),
            other => Err(format!(
                "DEDUP_POLICY must be name_only or name_and_birth, got {:?}",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub canonical: Person,
    pub absorbed: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub groups_merged: u64,
    pub records_removed: u64,
}

fn fill<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}

/// Folds `other` into `canonical`: empty fields are filled, terms and
/// per-term details unioned, view counts summed.
pub fn absorb(canonical: &mut Person, other: &Person) {
    if canonical.birth_date.trim().is_empty() {
        canonical.birth_date = other.birth_date.clone();
    } else if birth_compatible(&canonical.birth_date, &other.birth_date) {
        canonical.birth_date = longer_birth(&canonical.birth_date, &other.birth_date).to_string();
    }

    fill(&mut canonical.english_name, &other.english_name);
    fill(&mut canonical.party, &other.party);
    fill(&mut canonical.gender, &other.gender);
    fill(&mut canonical.district, &other.district);
    fill(&mut canonical.photo_url, &other.photo_url);
    fill(&mut canonical.phone, &other.phone);
    fill(&mut canonical.email, &other.email);
    fill(&mut canonical.homepage, &other.homepage);
    fill(&mut canonical.vote_share, &other.vote_share);

    if canonical.education.is_empty() {
        canonical.education = other.education.clone();
    }
    if canonical.career.is_empty() {
        canonical.career = other.career.clone();
    }

    for &term in &other.sessions {
        canonical.add_session(term);
    }
    for (term, detail) in &other.session_details {
        canonical
            .session_details
            .entry(*term)
            .or_insert_with(|| detail.clone());
    }

    canonical.view_count += other.view_count;
}

/// Merge plans for `people` (oldest first), one per group with duplicates.
///
/// Records are grouped by exact name (or name and compatible birth date);
/// the oldest record in a group is canonical and absorbs the rest.
pub fn plan(people: &[Person], policy: DedupPolicy) -> Vec<MergePlan> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_name: HashMap<&str, Vec<&Person>> = HashMap::new();
    for person in people {
        by_name
            .entry(person.name.as_str())
            .or_insert_with(|| {
                order.push(person.name.as_str());
                Vec::new()
            })
            .push(person);
    }

    let mut plans = Vec::new();
    for name in order {
        let Some(group) = by_name.get(name) else {
            continue;
        };
        let mut clusters: Vec<MergePlan> = Vec::new();
        for person in group {
            let home = match policy {
                DedupPolicy::NameOnly => clusters.first_mut(),
                DedupPolicy::NameAndBirth => clusters
                    .iter_mut()
                    .find(|c| birth_compatible(&c.canonical.birth_date, &person.birth_date)),
            };
            match home {
                Some(cluster) => {
                    absorb(&mut cluster.canonical, person);
                    cluster.absorbed.push(person.id);
                }
                None => clusters.push(MergePlan {
                    canonical: (*person).clone(),
                    absorbed: Vec::new(),
                }),
            }
        }
        plans.extend(clusters.into_iter().filter(|c| !c.absorbed.is_empty()));
    }
    plans
}

/// Runs the pass against the store, one merge per unit of work.
pub async fn deduplicate(
    store: &dyn MemberStore,
    policy: DedupPolicy,
) -> Result<DedupReport, AppError> {
    let people = store.list_members().await?;
    let plans = plan(&people, policy);
    tracing::info!(
        "Dedup ({:?}): {} records, {} groups to merge",
        policy,
        people.len(),
        plans.len()
    );

    let mut report = DedupReport::default();
    for merge in &plans {
        store.merge_members(&merge.canonical, &merge.absorbed).await?;
        report.groups_merged += 1;
        report.records_removed += merge.absorbed.len() as u64;
    }
    Ok(report)
}
