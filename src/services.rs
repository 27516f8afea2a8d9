use crate::config::Config;
use crate::errors::AppError;
use crate::models::Bill;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::HashMap;
use url::Url;

/// Result code the open API puts in `RESULT/CODE` on success.
pub const SUCCESS_CODE: &str = "INFO-000";
/// Result code for "no matching data"; treated as an empty page.
pub const NO_DATA_CODE: &str = "INFO-200";

const MEMBERS_ENDPOINT: &str = "ALLNAMEMBER";
const BILLS_ENDPOINT: &str = "nzmimeepazxkubdpn";
const HISTORICAL_ENDPOINT: &str = "nprlapfmaufmqytet";
const HISTORICAL_PAGE_SIZE: u32 = 10;

/// One `<row>` of a feed, keyed by child element name.
pub type FeedRow = HashMap<String, String>;

/// A parsed page from one of the XML feeds.
#[derive(Debug, Clone, Default)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    /// Rows in the response before any filtering. Paging stops on this.
    pub row_count: usize,
    pub total_count: Option<u64>,
}

/// A row of the member feed, with the alternate field names collapsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberRecord {
    pub name: String,
    pub birth_date: String,
    pub party: Option<String>,
    pub english_name: Option<String>,
    /// Free text listing the terms served, e.g. "제20대, 제21대".
    pub term_coverage: String,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub homepage: Option<String>,
    pub photo_url: Option<String>,
    pub raw_biography: Option<String>,
}

fn field<'a>(row: &'a FeedRow, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn owned(row: &FeedRow, keys: &[&str]) -> Option<String> {
    field(row, keys).map(str::to_string)
}

impl MemberRecord {
    /// `None` when the row carries no name at all.
    pub fn from_row(row: &FeedRow) -> Option<Self> {
        let name = field(row, &["HG_NM", "NAAS_NM", "KOR_NM"])?.to_string();
        Some(Self {
            name,
            birth_date: owned(row, &["BIRDY_DT"]).unwrap_or_default(),
            party: owned(row, &["POLY_NM", "PLPT_NM", "PARTY_NM"]),
            english_name: owned(row, &["NAAS_EN_NM"]),
            term_coverage: owned(row, &["GTELT_ERACO"]).unwrap_or_default(),
            gender: owned(row, &["SEX_GBN_NM", "NTR_DIV"]),
            phone: owned(row, &["TEL_NO", "NAAS_TEL_NO"]),
            email: owned(row, &["E_MAIL", "NAAS_EMAIL_ADDR"]),
            homepage: owned(row, &["HOMEPAGE", "NAAS_HP_URL"]),
            photo_url: owned(row, &["jpgLink", "NAAS_PIC"]),
            raw_biography: owned(row, &["BRF_HST"]),
        })
    }
}

impl Bill {
    /// `None` when the row lacks an id or a title.
    pub fn from_row(row: &FeedRow, term: i32) -> Option<Self> {
        let bill_id = owned(row, &["BILL_ID"])?;
        let title = owned(row, &["BILL_NAME"])?;
        let proposer = owned(row, &["PROPOSER"]).or_else(|| {
            field(row, &["MEMBER_LIST"])
                .and_then(|list| list.split(',').next())
                .map(|first| first.trim().to_string())
                .filter(|first| !first.is_empty())
        });
        let term = field(row, &["AGE"])
            .and_then(|age| age.parse().ok())
            .unwrap_or(term);

        Some(Self {
            bill_id,
            bill_no: owned(row, &["BILL_NO"]),
            term,
            title,
            proposer,
            propose_date: owned(row, &["PROPOSE_DT"]),
            committee: owned(row, &["COMMITTEE"]),
            detail_link: owned(row, &["DETAIL_LINK"]),
            proc_result: owned(row, &["PROC_RESULT"]),
        })
    }
}

/// Raw view of a feed response before rows are mapped.
#[derive(Debug, Default)]
pub struct RawFeed {
    pub code: Option<String>,
    pub message: Option<String>,
    pub total_count: Option<u64>,
    pub rows: Vec<FeedRow>,
}

/// Parses an open-API XML response.
///
/// Data rows are the `<row>` elements outside `<head>`. Text that does not
/// unescape cleanly (the feeds leak HTML entities) is kept verbatim.
pub fn parse_feed(xml: &str) -> Result<RawFeed, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = RawFeed::default();
    let mut path: Vec<String> = Vec::new();
    let mut row: Option<FeedRow> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "row" && !path.iter().any(|p| p == "head") {
                    row = Some(FeedRow::new());
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Text(t)) => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Ok(Event::CData(c)) => text.push_str(&String::from_utf8_lossy(&c)),
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    return Err(AppError::ParseError("Unbalanced feed XML".into()));
                };
                let value = text.trim().to_string();
                text.clear();

                if name == "row" {
                    if let Some(done) = row.take() {
                        feed.rows.push(done);
                    }
                } else if let Some(current) = row.as_mut() {
                    current.insert(name, value);
                } else if name == "CODE" && path.last().is_some_and(|p| p == "RESULT") {
                    feed.code = Some(value);
                } else if name == "MESSAGE" && path.last().is_some_and(|p| p == "RESULT") {
                    feed.message = Some(value);
                } else if name == "list_total_count" {
                    feed.total_count = value.parse().ok();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::ParseError(format!(
                    "Feed XML error at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(feed)
}

/// Client for the legislature's open-data API.
#[derive(Clone)]
pub struct AssemblyApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AssemblyApiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Assembly API client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.assembly_api_base_url.clone(),
            api_key: config.assembly_api_key.clone(),
        })
    }

    /// Fetches one page of an endpoint and checks the result code.
    pub async fn fetch_page(
        &self,
        endpoint: &str,
        page_index: u32,
        page_size: u32,
        filters: &[(&str, &str)],
    ) -> Result<RawFeed, AppError> {
        let page_index = page_index.to_string();
        let page_size = page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("KEY", self.api_key.as_str()),
            ("Type", "xml"),
            ("pIndex", page_index.as_str()),
            ("pSize", page_size.as_str()),
        ];
        params.extend_from_slice(filters);

        // Build URL with proper parameter encoding
        let url = Url::parse_with_params(&format!("{}/{}", self.base_url, endpoint), &params)
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        // Redact key from logs
        tracing::debug!(
            "Assembly API URL: {}/{}?KEY=[REDACTED]&pIndex={}&pSize={} {:?}",
            self.base_url,
            endpoint,
            page_index,
            page_size,
            filters
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Assembly API request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!("Assembly API {} returned status {}", endpoint, status);
            return Err(AppError::ExternalApiError(format!(
                "Assembly API {} returned status {}",
                endpoint, status
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read Assembly API response: {}", e))
        })?;
        let feed = parse_feed(&body)?;

        match feed.code.as_deref() {
            Some(SUCCESS_CODE) => Ok(feed),
            Some(NO_DATA_CODE) => Ok(RawFeed {
                rows: Vec::new(),
                ..feed
            }),
            other => Err(AppError::ExternalApiError(format!(
                "Assembly API {} failed: {} {}",
                endpoint,
                other.unwrap_or("no result code"),
                feed.message.as_deref().unwrap_or("")
            ))),
        }
    }

    pub async fn fetch_members(
        &self,
        page_index: u32,
        page_size: u32,
    ) -> Result<FeedPage<MemberRecord>, AppError> {
        let feed = self
            .fetch_page(MEMBERS_ENDPOINT, page_index, page_size, &[])
            .await?;
        tracing::info!(
            "Member feed page {}: {} rows (total {:?})",
            page_index,
            feed.rows.len(),
            feed.total_count
        );

        Ok(FeedPage {
            row_count: feed.rows.len(),
            items: feed.rows.iter().filter_map(MemberRecord::from_row).collect(),
            total_count: feed.total_count,
        })
    }

    pub async fn fetch_bills(
        &self,
        term: i32,
        page_index: u32,
        page_size: u32,
    ) -> Result<FeedPage<Bill>, AppError> {
        let age = term.to_string();
        let feed = self
            .fetch_page(BILLS_ENDPOINT, page_index, page_size, &[("AGE", age.as_str())])
            .await?;
        tracing::info!(
            "Bill feed term {} page {}: {} rows (total {:?})",
            term,
            page_index,
            feed.rows.len(),
            feed.total_count
        );

        Ok(FeedPage {
            row_count: feed.rows.len(),
            items: feed
                .rows
                .iter()
                .filter_map(|row| Bill::from_row(row, term))
                .collect(),
            total_count: feed.total_count,
        })
    }

    /// First non-empty biography (`HAK`) the historical feed has for
    /// `name` in `term`.
    pub async fn fetch_historical(&self, name: &str, term: i32) -> Result<Option<String>, AppError> {
        let daesu = term.to_string();
        let feed = self
            .fetch_page(
                HISTORICAL_ENDPOINT,
                1,
                HISTORICAL_PAGE_SIZE,
                &[("DAESU", daesu.as_str()), ("NAME", name)],
            )
            .await?;

        Ok(feed
            .rows
            .iter()
            .find_map(|row| owned(row, &["HAK"])))
    }
}
