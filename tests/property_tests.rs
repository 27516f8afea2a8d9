/// Property-based tests using proptest
/// Invariants of the reconciliation pipeline that should hold for all inputs
use proptest::prelude::*;
use rust_lawgg_sync::dedup::{plan, DedupPolicy};
use rust_lawgg_sync::enrichment::BiographyParser;
use rust_lawgg_sync::identity::birth_compatible;
use rust_lawgg_sync::lexicon::Lexicon;
use rust_lawgg_sync::models::{Bill, Person, Provenance};
use rust_lawgg_sync::noise::{NoiseSignals, Verdict};
use rust_lawgg_sync::profile_fetcher::handle_variants;
use rust_lawgg_sync::segmenter::MIN_FRAGMENT_CHARS;
use rust_lawgg_sync::store::{BillStore, MemoryStore};
use std::collections::HashSet;

fn parser() -> BiographyParser {
    BiographyParser::new(&Lexicon::embedded().unwrap()).unwrap()
}

fn biography_text() -> impl Strategy<Value = String> {
    let fragment = prop::sample::select(vec![
        "서울대학교 법학과 졸업",
        "한국고등학교 졸업",
        "제21대 국회의원",
        "기획재정위원회 위원",
        "법무법인 대표변호사",
        "(현) 더불어민주당 최고위원",
        "■ 학력",
        "[경력]",
        "2016 ~ 2020",
        "전·후반기 간사",
        "T: 02-784-1234",
        "더보기",
    ]);
    let separator = prop::sample::select(vec!["•", "·", "\n", " ", "   ", " / "]);
    prop::collection::vec((fragment, separator), 0..12).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(f, s)| format!("{}{}", f, s))
            .collect::<String>()
    })
}

// Property: sessions stay sorted and duplicate-free under any insertion order
proptest! {
    #[test]
    fn sessions_sorted_and_unique(terms in prop::collection::vec(1i32..=30, 0..40)) {
        let mut person = Person::new("홍길동", "");
        for term in &terms {
            person.add_session(*term);
        }
        prop_assert!(person.sessions.windows(2).all(|w| w[0] < w[1]));
        let distinct: HashSet<i32> = terms.iter().copied().collect();
        prop_assert_eq!(person.sessions.len(), distinct.len());
    }
}

// Property: parsing is deterministic and never yields duplicate or short items
proptest! {
    #[test]
    fn parse_is_deterministic_and_deduplicated(text in biography_text()) {
        let parser = parser();
        let first = parser.parse(&text, Provenance::RawField);
        let second = parser.parse(&text, Provenance::RawField);
        prop_assert_eq!(&first, &second);

        let mut seen = HashSet::new();
        for item in &first {
            prop_assert!(seen.insert(item.text.clone()), "duplicate item {:?}", item.text);
            prop_assert!(item.text.chars().count() >= MIN_FRAGMENT_CHARS);
            prop_assert!(!item.text.contains('•'));
        }
    }

    #[test]
    fn absorbed_items_never_duplicate(text in biography_text()) {
        let parser = parser();
        let items = parser.parse(&text, Provenance::RawField);
        let mut person = Person::new("홍길동", "");
        person.absorb_items(&items);
        person.absorb_items(&items);

        let education: HashSet<&String> = person.education.iter().collect();
        let career: HashSet<&String> = person.career.iter().collect();
        prop_assert_eq!(education.len(), person.education.len());
        prop_assert_eq!(career.len(), person.career.len());
    }

    #[test]
    fn parse_never_panics(text in "\\PC*") {
        let _ = parser().parse(&text, Provenance::ProfilePage);
    }
}

// Property: more real-content evidence never flips a page to noise, and
// more menu evidence never flips it to real
proptest! {
    #[test]
    fn noise_verdict_is_monotonic(
        real in 0usize..10,
        menu in 0usize..10,
        suspicious in 0usize..5,
        len in 0usize..2000,
    ) {
        let base = NoiseSignals { real, menu, suspicious, len };
        let more_real = NoiseSignals { real: real + 1, ..base };
        let more_menu = NoiseSignals { menu: menu + 1, ..base };

        if base.verdict() == Verdict::Real {
            prop_assert_eq!(more_real.verdict(), Verdict::Real);
        }
        if base.verdict() == Verdict::Noise {
            prop_assert_eq!(more_menu.verdict(), Verdict::Noise);
        }
    }
}

// Property: merging a name group unions terms and sums view counts
proptest! {
    #[test]
    fn dedup_unions_terms_and_sums_views(
        groups in prop::collection::vec(
            (prop::collection::vec(20i32..=22, 0..3), 0i64..1000),
            2..6,
        )
    ) {
        let people: Vec<Person> = groups
            .iter()
            .map(|(terms, views)| {
                let mut p = Person::new("홍길동", "");
                for t in terms {
                    p.add_session(*t);
                }
                p.view_count = *views;
                p
            })
            .collect();

        let plans = plan(&people, DedupPolicy::NameOnly);
        prop_assert_eq!(plans.len(), 1);
        let merged = &plans[0].canonical;

        let expected_terms: HashSet<i32> =
            groups.iter().flat_map(|(terms, _)| terms.iter().copied()).collect();
        let merged_terms: HashSet<i32> = merged.sessions.iter().copied().collect();
        prop_assert_eq!(merged_terms, expected_terms);
        prop_assert!(merged.sessions.windows(2).all(|w| w[0] < w[1]));

        let total: i64 = groups.iter().map(|(_, views)| views).sum();
        prop_assert_eq!(merged.view_count, total);
        prop_assert_eq!(merged.id, people[0].id);
        prop_assert_eq!(plans[0].absorbed.len(), people.len() - 1);
    }

    #[test]
    fn birth_compatibility_is_symmetric(a in "[0-9-]{0,10}", b in "[0-9-]{0,10}") {
        prop_assert_eq!(birth_compatible(&a, &b), birth_compatible(&b, &a));
    }
}

// Property: upserting the same bill batch twice changes nothing the second time
proptest! {
    #[test]
    fn bill_upsert_is_idempotent(ids in prop::collection::hash_set("PRC_[A-Z0-9]{6}", 1..20)) {
        let bills: Vec<Bill> = ids
            .iter()
            .map(|id| Bill {
                bill_id: id.clone(),
                bill_no: None,
                term: 22,
                title: format!("{} 법률안", id),
                proposer: None,
                propose_date: None,
                committee: None,
                detail_link: None,
                proc_result: None,
            })
            .collect();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let store = MemoryStore::new();
        let (first, second, count) = runtime.block_on(async {
            let first = store.upsert_bills(&bills).await.unwrap();
            let second = store.upsert_bills(&bills).await.unwrap();
            (first, second, store.count_bills().await.unwrap())
        });

        prop_assert_eq!(first.inserted, bills.len() as u64);
        prop_assert_eq!(second.inserted, 0);
        prop_assert_eq!(second.updated, bills.len() as u64);
        prop_assert_eq!(count, bills.len() as u64);
    }
}

// Property: handle variants are non-empty, distinct and whitespace-free
proptest! {
    #[test]
    fn handle_variants_are_distinct(handle in "[A-Za-z]{1,8}( [A-Za-z]{1,8}){0,2}") {
        let variants = handle_variants(&handle);
        prop_assert!(!variants.is_empty());
        let distinct: HashSet<&String> = variants.iter().collect();
        prop_assert_eq!(distinct.len(), variants.len());
        prop_assert!(variants.iter().all(|v| !v.is_empty() && !v.contains(' ')));
    }
}
