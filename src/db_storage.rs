use crate::errors::{AppError, ResultExt};
use crate::models::{Bill, Person, SessionDetail};
use crate::store::{BillStore, BillUpsertSummary, MemberStore};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

const MEMBER_COLUMNS: &str = "id, name, birth_date, english_name, party, gender, district, \
     vote_share, phone, email, homepage, photo_url, sessions, session_details, \
     education, career, view_count";

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    name: String,
    birth_date: String,
    english_name: Option<String>,
    party: Option<String>,
    gender: Option<String>,
    district: Option<String>,
    vote_share: Option<f64>,
    phone: Option<String>,
    email: Option<String>,
    homepage: Option<String>,
    photo_url: Option<String>,
    sessions: Vec<i32>,
    session_details: Json<BTreeMap<i32, SessionDetail>>,
    education: Vec<String>,
    career: Vec<String>,
    view_count: i64,
}

impl From<MemberRow> for Person {
    fn from(row: MemberRow) -> Self {
        let mut sessions = row.sessions;
        sessions.sort_unstable();
        sessions.dedup();

        Person {
            id: row.id,
            name: row.name,
            birth_date: row.birth_date,
            english_name: row.english_name,
            party: row.party,
            gender: row.gender,
            district: row.district,
            vote_share: row.vote_share,
            phone: row.phone,
            email: row.email,
            homepage: row.homepage,
            photo_url: row.photo_url,
            sessions,
            session_details: row.session_details.0,
            education: row.education,
            career: row.career,
            view_count: row.view_count,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BillRow {
    bill_id: String,
    bill_no: Option<String>,
    term: i32,
    title: String,
    proposer: Option<String>,
    propose_date: Option<String>,
    committee: Option<String>,
    detail_link: Option<String>,
    proc_result: Option<String>,
}

impl From<BillRow> for Bill {
    fn from(row: BillRow) -> Self {
        Bill {
            bill_id: row.bill_id,
            bill_no: row.bill_no,
            term: row.term,
            title: row.title,
            proposer: row.proposer,
            propose_date: row.propose_date,
            committee: row.committee,
            detail_link: row.detail_link,
            proc_result: row.proc_result,
        }
    }
}

/// Postgres storage for persons and bills
///
/// Every batch write runs in one transaction, so a page either lands
/// completely or not at all.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_member_tx(
        tx: &mut Transaction<'_, Postgres>,
        person: &Person,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO members (
                id, name, birth_date, english_name, party, gender, district,
                vote_share, phone, email, homepage, photo_url, sessions,
                first_term, latest_term, session_details, education, career, view_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                birth_date = EXCLUDED.birth_date,
                english_name = EXCLUDED.english_name,
                party = EXCLUDED.party,
                gender = EXCLUDED.gender,
                district = EXCLUDED.district,
                vote_share = EXCLUDED.vote_share,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                homepage = EXCLUDED.homepage,
                photo_url = EXCLUDED.photo_url,
                sessions = EXCLUDED.sessions,
                first_term = EXCLUDED.first_term,
                latest_term = EXCLUDED.latest_term,
                session_details = EXCLUDED.session_details,
                education = EXCLUDED.education,
                career = EXCLUDED.career,
                view_count = EXCLUDED.view_count,
                updated_at = now()
            "#,
        )
        .bind(person.id)
        .bind(&person.name)
        .bind(&person.birth_date)
        .bind(&person.english_name)
        .bind(&person.party)
        .bind(&person.gender)
        .bind(&person.district)
        .bind(person.vote_share)
        .bind(&person.phone)
        .bind(&person.email)
        .bind(&person.homepage)
        .bind(&person.photo_url)
        .bind(&person.sessions)
        .bind(person.first_term())
        .bind(person.latest_term())
        .bind(Json(&person.session_details))
        .bind(&person.education)
        .bind(&person.career)
        .bind(person.view_count)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to upsert member {} ({})", person.name, person.id))?;

        Ok(())
    }
}

#[async_trait]
impl MemberStore for PgStore {
    async fn find_member(&self, name: &str, birth_date: &str) -> Result<Option<Person>, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE name = $1 AND birth_date = $2 ORDER BY seq LIMIT 1",
            MEMBER_COLUMNS
        ))
        .bind(name)
        .bind(birth_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Person::from))
    }

    async fn find_members_by_name(&self, name: &str) -> Result<Vec<Person>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE name = $1 ORDER BY seq",
            MEMBER_COLUMNS
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Person::from).collect())
    }

    async fn list_members(&self) -> Result<Vec<Person>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members ORDER BY seq",
            MEMBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Person::from).collect())
    }

    async fn upsert_members(&self, people: &[Person]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for person in people {
            Self::upsert_member_tx(&mut tx, person).await?;
        }
        tx.commit().await?;

        tracing::debug!("Committed {} member rows", people.len());
        Ok(())
    }

    async fn merge_members(&self, canonical: &Person, absorbed: &[Uuid]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_member_tx(&mut tx, canonical).await?;

        let deleted = sqlx::query("DELETE FROM members WHERE id = ANY($1) AND id <> $2")
            .bind(absorbed)
            .bind(canonical.id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete merged members")?
            .rows_affected();
        tx.commit().await?;

        tracing::info!(
            "Merged {} duplicate record(s) into {} ({})",
            deleted,
            canonical.name,
            canonical.id
        );
        Ok(())
    }

    async fn count_missing_biography(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM members
            WHERE cardinality(sessions) > 0
              AND cardinality(education) = 0
              AND cardinality(career) = 0
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl BillStore for PgStore {
    async fn find_bill(&self, bill_id: &str) -> Result<Option<Bill>, AppError> {
        let row = sqlx::query_as::<_, BillRow>(
            "SELECT bill_id, bill_no, term, title, proposer, propose_date, committee, \
             detail_link, proc_result FROM bills WHERE bill_id = $1",
        )
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Bill::from))
    }

    async fn upsert_bills(&self, bills: &[Bill]) -> Result<BillUpsertSummary, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut summary = BillUpsertSummary::default();

        for bill in bills {
            // xmax = 0 only for freshly inserted rows
            let (inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO bills (
                    bill_id, bill_no, term, title, proposer, propose_date,
                    committee, detail_link, proc_result
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (bill_id) DO UPDATE
                SET bill_no = EXCLUDED.bill_no,
                    term = EXCLUDED.term,
                    title = EXCLUDED.title,
                    proposer = EXCLUDED.proposer,
                    propose_date = EXCLUDED.propose_date,
                    committee = EXCLUDED.committee,
                    detail_link = EXCLUDED.detail_link,
                    proc_result = EXCLUDED.proc_result,
                    updated_at = now()
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(&bill.bill_id)
            .bind(&bill.bill_no)
            .bind(bill.term)
            .bind(&bill.title)
            .bind(&bill.proposer)
            .bind(&bill.propose_date)
            .bind(&bill.committee)
            .bind(&bill.detail_link)
            .bind(&bill.proc_result)
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert bill {}", bill.bill_id))?;

            if inserted {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn count_bills(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bills")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
