/// Feed client and profile fetcher tests against mock HTTP servers
use rust_lawgg_sync::config::Config;
use rust_lawgg_sync::dedup::DedupPolicy;
use rust_lawgg_sync::enrichment::{BiographyParser, BiographySource, EnrichmentTarget, ProfilePageSource};
use rust_lawgg_sync::errors::AppError;
use rust_lawgg_sync::lexicon::Lexicon;
use rust_lawgg_sync::noise::NoiseDetector;
use rust_lawgg_sync::profile_fetcher::{extract_page_text, ProfileFetcher};
use std::sync::Arc;
use rust_lawgg_sync::services::AssemblyApiClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        assembly_api_key: "test_key".to_string(),
        assembly_api_base_url: base_url.clone(),
        profile_base_url: format!("{}/members", base_url),
        election_csv_path: "unused.csv".into(),
        lexicon_path: None,
        page_size: 10,
        bill_max_pages: 2,
        http_timeout_secs: 5,
        profile_fetch_delay_ms: 0,
        page_delay_ms: 0,
        term_delay_ms: 0,
        stage_delay_ms: 0,
        dedup_policy: DedupPolicy::NameOnly,
    }
}

fn feed_xml(root: &str, code: &str, total: usize, rows: &[&[(&str, &str)]]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><{root}><head>\
         <list_total_count>{total}</list_total_count>\
         <RESULT><CODE>{code}</CODE><MESSAGE>ok</MESSAGE></RESULT></head>"
    );
    for row in rows {
        xml.push_str("<row>");
        for (key, value) in row.iter() {
            xml.push_str(&format!("<{key}>{value}</{key}>"));
        }
        xml.push_str("</row>");
    }
    xml.push_str(&format!("</{root}>"));
    xml
}

fn xml_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/xml; charset=utf-8")
}

#[tokio::test]
async fn test_member_feed_page_success() {
    let mock_server = MockServer::start().await;

    let body = feed_xml(
        "ALLNAMEMBER",
        "INFO-000",
        312,
        &[
            &[
                ("NAAS_NM", "홍길동"),
                ("BIRDY_DT", "1970-01-01"),
                ("PLPT_NM", "더불어민주당"),
                ("GTELT_ERACO", "제21대, 제22대"),
            ],
            &[("NAAS_NM", "이영희"), ("BIRDY_DT", "1975-05-05")],
        ],
    );

    Mock::given(method("GET"))
        .and(path("/ALLNAMEMBER"))
        .and(query_param("KEY", "test_key"))
        .and(query_param("Type", "xml"))
        .and(query_param("pIndex", "1"))
        .and(query_param("pSize", "10"))
        .respond_with(xml_response(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let page = api.fetch_members(1, 10).await.unwrap();

    assert_eq!(page.row_count, 2);
    assert_eq!(page.total_count, Some(312));
    assert_eq!(page.items[0].name, "홍길동");
    assert_eq!(page.items[0].term_coverage, "제21대, 제22대");
    assert_eq!(page.items[1].birth_date, "1975-05-05");
}

#[tokio::test]
async fn test_no_data_code_is_an_empty_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ALLNAMEMBER"))
        .respond_with(xml_response(
            "<RESULT><CODE>INFO-200</CODE><MESSAGE>해당하는 데이터가 없습니다.</MESSAGE></RESULT>"
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let page = api.fetch_members(7, 10).await.unwrap();
    assert_eq!(page.row_count, 0);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_error_code_is_source_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ALLNAMEMBER"))
        .respond_with(xml_response(
            "<RESULT><CODE>ERROR-290</CODE><MESSAGE>인증키가 유효하지 않습니다.</MESSAGE></RESULT>"
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = api.fetch_members(1, 10).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(_)));
    assert!(err.is_source_unavailable());
    assert!(err.to_string().contains("ERROR-290"));
}

#[tokio::test]
async fn test_feed_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nzmimeepazxkubdpn"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let result = api.fetch_bills(22, 1, 10).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unparseable_feed_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ALLNAMEMBER"))
        .respond_with(xml_response("<ALLNAMEMBER><row><NAAS_NM>홍길동</row>".to_string()))
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let err = api.fetch_members(1, 10).await.unwrap_err();
    assert!(err.is_source_unavailable());
}

#[tokio::test]
async fn test_bill_feed_sends_term_filter() {
    let mock_server = MockServer::start().await;

    let body = feed_xml(
        "nzmimeepazxkubdpn",
        "INFO-000",
        1,
        &[&[
            ("BILL_ID", "PRC_X1Y2Z3"),
            ("BILL_NO", "2200123"),
            ("BILL_NAME", "정부조직법 일부개정법률안"),
            ("PROPOSER", "홍길동의원 등 10인"),
            ("COMMITTEE", "행정안전위원회"),
        ]],
    );

    Mock::given(method("GET"))
        .and(path("/nzmimeepazxkubdpn"))
        .and(query_param("AGE", "22"))
        .respond_with(xml_response(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let page = api.fetch_bills(22, 1, 10).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].bill_id, "PRC_X1Y2Z3");
    assert_eq!(page.items[0].term, 22);
    assert_eq!(page.items[0].committee.as_deref(), Some("행정안전위원회"));
}

#[tokio::test]
async fn test_historical_lookup_takes_first_biography() {
    let mock_server = MockServer::start().await;

    let body = feed_xml(
        "nprlapfmaufmqytet",
        "INFO-000",
        2,
        &[
            &[("NAME", "홍길동"), ("DAESU", "21"), ("HAK", "")],
            &[
                ("NAME", "홍길동"),
                ("DAESU", "21"),
                ("HAK", "서울대학교 법학과 졸업"),
            ],
        ],
    );

    Mock::given(method("GET"))
        .and(path("/nprlapfmaufmqytet"))
        .and(query_param("DAESU", "21"))
        .and(query_param("NAME", "홍길동"))
        .respond_with(xml_response(body))
        .mount(&mock_server)
        .await;

    let api = AssemblyApiClient::new(&create_test_config(mock_server.uri())).unwrap();
    let found = api.fetch_historical("홍길동", 21).await.unwrap();
    assert_eq!(found.as_deref(), Some("서울대학교 법학과 졸업"));
}

#[tokio::test]
async fn test_profile_page_text_is_cached() {
    let mock_server = MockServer::start().await;

    let html = r#"<html><head><style>.x { color: red }</style></head>
        <body><div class="bio"><p>한국대학교 경제학과 졸업</p>
        <script>var tracking = 1;</script><p>기획재정부 차관</p></div></body></html>"#;

    Mock::given(method("GET"))
        .and(path("/members/22nd/LEEYounghee"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = ProfileFetcher::new(&create_test_config(mock_server.uri())).unwrap();
    let url = fetcher.profile_url(22, "LEEYounghee");

    let first = fetcher.fetch_text(&url).await.unwrap().unwrap();
    assert_eq!(first, "한국대학교 경제학과 졸업\n기획재정부 차관");

    let second = fetcher.fetch_text(&url).await.unwrap();
    assert_eq!(second.as_deref(), Some(first.as_str()));
}

#[tokio::test]
async fn test_profile_page_not_found_is_none() {
    let mock_server = MockServer::start().await;

    let fetcher = ProfileFetcher::new(&create_test_config(mock_server.uri())).unwrap();
    let url = fetcher.profile_url(21, "Nobody");
    assert_eq!(fetcher.fetch_text(&url).await.unwrap(), None);
}

#[tokio::test]
async fn test_profile_site_breaker_opens_after_repeated_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&mock_server)
        .await;

    let fetcher = ProfileFetcher::new(&create_test_config(mock_server.uri())).unwrap();
    for i in 0..5 {
        let url = fetcher.profile_url(22, &format!("Member{}", i));
        assert!(fetcher.fetch_text(&url).await.is_err());
    }

    let url = fetcher.profile_url(22, "Member5");
    let err = fetcher.fetch_text(&url).await.unwrap_err();
    assert!(err.to_string().contains("circuit open"));
}

const MENU_PAGE: &str = "<html><body><p>국회의원 - 홍길동</p><p>의원실알림</p><p>역대국회의원</p>\
    <p>국회의원통계</p><p>더보기</p><p>접기</p></body></html>";

const BIOGRAPHY_PAGE: &str = r#"<html><body><div class="profile">
<p>■ 학력</p><p>한국고등학교 졸업</p><p>한국대학교 경제학과 졸업</p>
<p>■ 경력</p><p>기획재정부 차관</p><p>더불어민주당 정책위원회 부의장</p>
</div></body></html>"#;

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

fn profile_source(fetcher: ProfileFetcher) -> ProfilePageSource {
    let lexicon = Lexicon::embedded().unwrap();
    ProfilePageSource::new(
        fetcher,
        NoiseDetector::new(&lexicon).unwrap(),
        Arc::new(BiographyParser::new(&lexicon).unwrap()),
    )
}

fn hong() -> EnrichmentTarget {
    EnrichmentTarget {
        name: "홍길동".to_string(),
        handle: Some("HONG GILDONG".to_string()),
        terms: vec![21, 22],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_profile_menu_page_falls_through_to_next_handle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/members/22nd/HONGGILDONG"))
        .respond_with(html_response(MENU_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/members/22nd/Honggildong"))
        .respond_with(html_response(BIOGRAPHY_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = ProfileFetcher::new(&create_test_config(mock_server.uri())).unwrap();
    let source = profile_source(fetcher.clone());

    let found = source.fetch(&hong()).await.unwrap().unwrap();
    let texts: Vec<&str> = found.items.iter().map(|i| i.text.as_str()).collect();
    assert!(texts.contains(&"한국대학교 경제학과 졸업"));
    assert!(texts.contains(&"기획재정부 차관"));
    assert_eq!(
        found.homepage,
        Some(format!("{}/members/22nd/Honggildong", mock_server.uri()))
    );

    // The menu page is remembered by content.
    assert!(fetcher.cache().is_known_noise(&extract_page_text(MENU_PAGE)).await);
}

#[tokio::test]
async fn test_profile_not_found_falls_through_to_next_handle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/members/22nd/HONGGILDONG"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/members/22nd/Honggildong"))
        .respond_with(html_response(BIOGRAPHY_PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = ProfileFetcher::new(&create_test_config(mock_server.uri())).unwrap();
    let found = profile_source(fetcher).fetch(&hong()).await.unwrap().unwrap();

    assert!(!found.items.is_empty());
    assert!(found
        .homepage
        .as_deref()
        .is_some_and(|h| h.ends_with("/members/22nd/Honggildong")));
}

#[tokio::test]
async fn test_profile_noise_on_every_handle_yields_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html_response(MENU_PAGE))
        .mount(&mock_server)
        .await;

    let fetcher = ProfileFetcher::new(&create_test_config(mock_server.uri())).unwrap();
    let source = profile_source(fetcher);
    assert_eq!(source.fetch(&hong()).await.unwrap(), None);
}
