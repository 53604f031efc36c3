use crate::sync::SyncError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Upstream day filter format.
const DAY_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default = "first_page")]
    pub last_page: u32,
}

impl Default for PageMeta {
    fn default() -> Self {
        PageMeta {
            current_page: first_page(),
            last_page: first_page(),
        }
    }
}

fn first_page() -> u32 {
    1
}

/// One page of raw upstream records.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub meta: PageMeta,
}

/// Paginated access to the upstream ledger.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetches a single page, optionally restricted to one calendar day.
    async fn fetch_page(&self, day: Option<NaiveDate>, page: u32) -> Result<TransactionPage>;

    /// Walks pages from 1 until the reported current page reaches the last
    /// page. Any failure aborts the walk and discards what was fetched.
    async fn fetch_all_pages(&self, day: Option<NaiveDate>) -> Result<Vec<Value>, SyncError> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .fetch_page(day, page)
                .await
                .map_err(|e| SyncError::Fetch {
                    page,
                    source: e.into(),
                })?;

            // A server echoing a stale page number must not stall the walk
            let current = response.meta.current_page.max(page);
            let last = response.meta.last_page;
            debug!(
                page = current,
                last_page = last,
                records = response.data.len(),
                "Fetched page"
            );
            records.extend(response.data);

            if current >= last {
                break;
            }
            page = current + 1;
        }

        info!(records = records.len(), day = ?day, "Fetched all pages");
        Ok(records)
    }
}

/// reqwest-backed client for `GET <base>?page=<n>&day=<dd-mm-yyyy>`.
pub struct SyncClient {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl SyncClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid upstream URL: {base_url}"))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("txpulse/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn page_url(&self, day: Option<NaiveDate>, page: u32) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &page.to_string());
            if let Some(day) = day {
                query.append_pair("day", &day.format(DAY_FORMAT).to_string());
            }
        }
        url
    }
}

#[async_trait]
impl TransactionSource for SyncClient {
    #[instrument(skip(self), fields(day = ?day))]
    async fn fetch_page(&self, day: Option<NaiveDate>, page: u32) -> Result<TransactionPage> {
        let url = self.page_url(day, page);
        debug!("Requesting transactions from {}", url);

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request for page {page}"))?
            .error_for_status()
            .with_context(|| format!("Upstream rejected request for page {page}"))?;

        response
            .json::<TransactionPage>()
            .await
            .with_context(|| format!("Failed to parse upstream response for page {page}"))
    }
}
