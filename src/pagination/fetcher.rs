//! Cursor-following fetcher
//!
//! Walks a vendor collection page by page. The first request carries
//! `per_page` and the optional date filters; every later request uses the
//! server-provided `next_page` URL exactly as given, since it already encodes
//! the full query.

use super::types::{DateWindow, FetchConfig, FetchScope};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use crate::types::{FailurePolicy, JsonObject, JsonValue};
use tracing::{debug, info, warn};

/// Response field carrying the next page URL
pub const NEXT_PAGE_FIELD: &str = "next_page";

/// Paginated fetcher for the vendor API
#[derive(Debug)]
pub struct Fetcher {
    client: HttpClient,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a fetcher around an existing client
    pub fn new(client: HttpClient, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// Build the authenticated, paced client described by the settings
    pub fn from_settings(settings: &Settings, policy: FailurePolicy) -> Result<Self> {
        let http_config = HttpClientConfig::builder()
            .base_url(&settings.api_base_url)
            .timeout(settings.http_timeout)
            .rate_limit(RateLimiterConfig::fixed_interval(
                settings.requests_per_second,
            ))
            .header("Content-Type", "application/json")
            .build();
        let client = HttpClient::with_credentials(http_config, settings.credentials.clone())?;

        Ok(Self::new(
            client,
            FetchConfig::new(settings.per_page, policy),
        ))
    }

    /// Fetch every page of a scope into one record list
    ///
    /// Under `FailFast` a non-success status is returned as the error. Under
    /// `SkipOnError` it is logged and the records gathered so far are returned.
    /// Transport and decoding failures propagate under either policy.
    pub async fn fetch_all(
        &self,
        scope: &FetchScope,
        window: Option<&DateWindow>,
    ) -> Result<Vec<JsonObject>> {
        let key = scope.collection_key();
        let mut records = Vec::new();
        let mut url = scope.path();
        let mut params = Some(self.initial_params(window));
        let mut page = 0u32;

        loop {
            page += 1;
            // Only the first request carries our own parameters
            let request = params.take().unwrap_or_default();
            debug!("Fetching {scope} page {page}: {url}");

            let body: JsonValue = match self.client.get_json_with_config(&url, request).await {
                Ok(body) => body,
                Err(e) if e.is_http_status() => match self.config.policy {
                    FailurePolicy::FailFast => return Err(e),
                    FailurePolicy::SkipOnError => {
                        warn!(
                            "Stopping fetch of {scope} at page {page} after {} records: {e}",
                            records.len()
                        );
                        return Ok(records);
                    }
                },
                Err(e) => return Err(e),
            };

            let page_records = extract_records(&body, key)?;
            let page_count = page_records.len();
            records.extend(page_records);

            debug!(
                "Fetched {page_count} {key} from page {page}. Total so far: {}",
                records.len()
            );

            match next_page_url(&body) {
                Some(next) => url = next,
                None => break,
            }
        }

        info!(
            "Fetched {} {key} for {scope} in {page} page(s)",
            records.len()
        );
        Ok(records)
    }

    fn initial_params(&self, window: Option<&DateWindow>) -> RequestConfig {
        let mut request = RequestConfig::new().query("per_page", self.config.per_page.to_string());
        if let Some(window) = window {
            for (key, value) in window.query_params() {
                request = request.query(key, value);
            }
        }
        request
    }
}

/// Pull the record array out of a page body
///
/// A missing field is an empty page; non-object entries are skipped.
pub fn extract_records(body: &JsonValue, key: &str) -> Result<Vec<JsonObject>> {
    let items = match body.get(key) {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items,
        Some(other) => {
            return Err(Error::decode(format!(
                "Expected '{key}' to be an array, got {}",
                json_type_name(other)
            )))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            JsonValue::Object(obj) => records.push(obj.clone()),
            other => warn!(
                "Skipping non-object entry in '{key}': {}",
                json_type_name(other)
            ),
        }
    }
    Ok(records)
}

/// Next page URL, if the body carries a non-empty one
pub fn next_page_url(body: &JsonValue) -> Option<String> {
    body.get(NEXT_PAGE_FIELD)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
