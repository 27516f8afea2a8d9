use std::sync::LazyLock;

use regex::Regex;

use crate::contact::{is_valid_email, normalize_kr_phone};
use crate::election::ElectionTable;
use crate::errors::AppError;
use crate::models::{Person, SessionDetail, SUPPORTED_TERMS};
use crate::services::MemberRecord;
use crate::store::MemberStore;

/// Party recorded for a term when the feed has none.
pub const INDEPENDENT: &str = "무소속";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// Matched supported terms, ascending.
    Accepted(Vec<i32>),
    /// Term coverage names only terms before the supported ones.
    OutOfEra,
    /// No elected row for the name in a supported term.
    NotElected,
}

/// Screens a record against its own term coverage and the election table.
pub fn screen(record: &MemberRecord, table: &ElectionTable) -> Screening {
    let coverage = record.term_coverage.trim();
    if !coverage.is_empty() && !mentions_supported_term(coverage) {
        return Screening::OutOfEra;
    }

    let terms = table.terms_for(&record.name);
    if terms.is_empty() {
        Screening::NotElected
    } else {
        Screening::Accepted(terms)
    }
}

static TERM_NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+").ok());

fn mentions_supported_term(coverage: &str) -> bool {
    let Some(numbers) = TERM_NUMBER.as_ref() else {
        return false;
    };
    let found = numbers
        .find_iter(coverage)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .any(|term| SUPPORTED_TERMS.contains(&term));
    found
}

/// Equal, one side unknown, or one a prefix of the other (`1970` vs
/// `1970-01-01`).
pub fn birth_compatible(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a.is_empty() || b.is_empty() || a.starts_with(b) || b.starts_with(a)
}

/// The more specific of two compatible birth strings.
pub fn longer_birth<'a>(a: &'a str, b: &'a str) -> &'a str {
    if b.trim().chars().count() > a.trim().chars().count() {
        b
    } else {
        a
    }
}

/// Looks the record's person up in `pending` (this page's unsaved work),
/// then in the store, and otherwise starts a new person.
///
/// Exact (name, birth) matches win; a name match with a compatible birth
/// date is accepted next and keeps the longer birth string. A store hit for
/// a person already in `pending` resolves to the pending copy.
pub async fn find_or_create(
    store: &dyn MemberStore,
    pending: &[Person],
    record: &MemberRecord,
) -> Result<Person, AppError> {
    let name = record.name.as_str();
    let birth = record.birth_date.as_str();

    let exact_pending = pending
        .iter()
        .find(|p| p.name == name && p.birth_date == birth);
    if let Some(person) = exact_pending {
        return Ok(person.clone());
    }
    if let Some(person) = store.find_member(name, birth).await? {
        return Ok(refine_birth(pending_copy(pending, person), birth));
    }

    let compatible_pending = pending
        .iter()
        .find(|p| p.name == name && birth_compatible(&p.birth_date, birth))
        .cloned();
    let compatible = match compatible_pending {
        Some(person) => Some(person),
        None => store
            .find_members_by_name(name)
            .await?
            .into_iter()
            .find(|p| birth_compatible(&p.birth_date, birth))
            .map(|p| pending_copy(pending, p)),
    };

    if let Some(person) = compatible {
        return Ok(refine_birth(person, birth));
    }

    tracing::info!("New person: {} ({})", name, birth);
    let mut person = Person::new(name, birth);
    person.english_name = record.english_name.clone();
    Ok(person)
}

fn pending_copy(pending: &[Person], stored: Person) -> Person {
    match pending.iter().find(|p| p.id == stored.id) {
        Some(person) => person.clone(),
        None => stored,
    }
}

fn refine_birth(mut person: Person, birth: &str) -> Person {
    let kept = longer_birth(&person.birth_date, birth).to_string();
    if kept != person.birth_date {
        tracing::debug!(
            "Birth date for {} refined: {:?} -> {:?}",
            person.name,
            person.birth_date,
            kept
        );
        person.birth_date = kept;
    }
    person
}

/// Folds the matched terms (ascending) into `person`.
pub fn apply_terms(person: &mut Person, record: &MemberRecord, terms: &[i32], table: &ElectionTable) {
    if person.english_name.is_none() {
        person.english_name = record.english_name.clone();
    }

    for &term in terms {
        person.add_session(term);
        let election = table.get(&record.name, term);
        let district = election.and_then(|e| e.district.clone());
        let vote_share = election.and_then(|e| e.vote_share);

        person.session_details.insert(
            term,
            SessionDetail {
                party: record
                    .party
                    .clone()
                    .unwrap_or_else(|| INDEPENDENT.to_string()),
                district: district.clone(),
                vote_share,
            },
        );

        if Some(term) < person.latest_term() {
            continue;
        }

        if record.party.is_some() {
            person.party = record.party.clone();
        }
        if record.gender.is_some() {
            person.gender = record.gender.clone();
        }
        fill_contacts(person, record);
        apply_photo(person, record);
        if election.is_some() {
            person.district = district;
            person.vote_share = vote_share;
        }
    }
}

fn fill_contacts(person: &mut Person, record: &MemberRecord) {
    if person.phone.is_none() {
        person.phone = record.phone.as_deref().and_then(normalize_kr_phone);
    }
    if person.email.is_none() {
        person.email = record
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| is_valid_email(e))
            .map(str::to_string);
    }
    if person.homepage.is_none() {
        person.homepage = record.homepage.clone();
    }
}

/// Photos only move when the feed's birth date matches exactly; a record
/// without a birth date may only fill an empty slot.
fn apply_photo(person: &mut Person, record: &MemberRecord) {
    let Some(photo) = record.photo_url.as_ref() else {
        return;
    };
    let feed_birth = record.birth_date.trim();
    if !feed_birth.is_empty() && person.birth_date == feed_birth {
        person.photo_url = Some(photo.clone());
    } else if feed_birth.is_empty() && person.photo_url.is_none() {
        person.photo_url = Some(photo.clone());
    } else {
        tracing::debug!("Photo for {} not updated (birth date mismatch)", person.name);
    }
}
