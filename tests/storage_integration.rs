use std::env;

use rust_lawgg_sync::db::Database;
use rust_lawgg_sync::db_storage::PgStore;
use rust_lawgg_sync::models::{Bill, Person, SessionDetail};
use rust_lawgg_sync::store::{BillStore, MemberStore};

async fn test_store() -> anyhow::Result<PgStore> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    Ok(PgStore::new(db.pool.clone()))
}

/// Round trip of a person through Postgres, then a merge.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn member_upsert_and_merge_smoke_test() -> anyhow::Result<()> {
    let store = test_store().await?;

    // Unique name so repeated runs don't collide with earlier rows.
    let name = format!("테스트{}", uuid::Uuid::new_v4().simple());
    let mut canonical = Person::new(&name, "1970");
    canonical.add_session(21);
    canonical.session_details.insert(
        21,
        SessionDetail {
            party: "무소속".to_string(),
            district: Some("서울 종로구".to_string()),
            vote_share: Some(51.2),
        },
    );
    let mut duplicate = Person::new(&name, "1970-01-01");
    duplicate.add_session(22);
    duplicate.education = vec!["서울대학교 졸업".to_string()];

    store
        .upsert_members(&[canonical.clone(), duplicate.clone()])
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let found = store
        .find_member(&name, "1970")
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow::anyhow!("person not found after upsert"))?;
    assert_eq!(found.id, canonical.id);
    assert_eq!(found.session_details[&21].district.as_deref(), Some("서울 종로구"));

    let mut merged = canonical.clone();
    rust_lawgg_sync::dedup::absorb(&mut merged, &duplicate);
    store
        .merge_members(&merged, &[duplicate.id])
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let left = store
        .find_members_by_name(&name)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].sessions, vec![21, 22]);
    assert_eq!(left[0].birth_date, "1970-01-01");
    Ok(())
}

/// Bill upserts report inserts the first time and updates after that.
#[tokio::test]
#[ignore]
async fn bill_upsert_smoke_test() -> anyhow::Result<()> {
    let store = test_store().await?;

    let bill = Bill {
        bill_id: format!("TEST_{}", uuid::Uuid::new_v4().simple()),
        bill_no: Some("2200001".to_string()),
        term: 22,
        title: "테스트 법률안".to_string(),
        proposer: Some("홍길동".to_string()),
        propose_date: Some("2024-06-01".to_string()),
        committee: None,
        detail_link: None,
        proc_result: None,
    };

    let first = store
        .upsert_bills(std::slice::from_ref(&bill))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!((first.inserted, first.updated), (1, 0));

    let second = store
        .upsert_bills(std::slice::from_ref(&bill))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!((second.inserted, second.updated), (0, 1));
    Ok(())
}
