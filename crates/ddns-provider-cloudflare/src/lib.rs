// # Cloudflare Record Store
//
// This crate implements the engine's `RecordStore` over the Cloudflare API v4.
//
// ## Behaviour
//
// - One HTTP request per call; retries and re-planning are owned by the engine
// - Every non-2xx status or `success: false` body becomes `Error::Api` with
//   the status and Cloudflare's `errors` list kept as typed entries
// - Transport failures and undecodable bodies become `Error::Api` without a status
// - `update` checks the echoed record and fails with `Error::Verification`
//   if the content differs from what was sent
//
// ## Trust Level: Untrusted (Record Store)
//
// **Forbidden Capabilities** (enforced by code review):
// - ❌ Spawn tasks or threads (violates shutdown determinism)
// - ❌ Implement retry logic (owned by the Reconciler)
// - ❌ Cache records beyond a single request
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&page=N`
//   (every page is fetched, following `result_info.total_pages`)
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::error::ApiError;
use ddns_core::traits::{RecordStore, RecordStoreFactory};
use ddns_core::{AddressRecord, ApiErrorDetail, Configuration, Error, RecordType, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per list page
const LIST_PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched by one `list` call
const MAX_LIST_PAGES: u32 = 50;

const PROVIDER: &str = "cloudflare";

/// Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

/// Pagination block of list responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

impl ResultInfo {
    fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Body for create and update calls
#[derive(Debug, Serialize)]
struct RecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    /// Sent on update so a PUT keeps the record's proxy setting
    #[serde(skip_serializing_if = "Option::is_none")]
    proxied: Option<bool>,
}

/// Decode a Cloudflare response body
///
/// # Returns
///
/// - `Ok(T)`: 2xx status, `success: true` and a `result` present
/// - `Err(Error::Api)` with `status` set: non-2xx status or `success: false`
/// - `Err(Error::Api)` without `status`: body could not be decoded
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    decode_page(status, body).map(|(result, _)| result)
}

/// Decode a Cloudflare response body along with its pagination block
pub fn decode_page<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<(T, Option<ResultInfo>)> {
    let ok_status = (200..300).contains(&status);

    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if ok_status => {
            return Err(Error::transport(
                PROVIDER,
                format!("failed to decode response: {}", e),
            ));
        }
        Err(_) => {
            // Error bodies from proxies and load balancers are often not JSON
            let details = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
                .map(|e| e.errors)
                .unwrap_or_default();
            return Err(api_error(status, details, body));
        }
    };

    if !ok_status || !envelope.success {
        return Err(api_error(status, envelope.errors, body));
    }

    let result = envelope.result.ok_or_else(|| {
        Error::transport(PROVIDER, "response reported success without a result")
    })?;
    Ok((result, envelope.result_info))
}

fn api_error(status: u16, details: Vec<ApiErrorDetail>, body: &str) -> Error {
    let context = if details.is_empty() {
        let snippet: String = body.trim().chars().take(200).collect();
        (!snippet.is_empty()).then_some(snippet)
    } else {
        None
    };

    Error::Api {
        provider: PROVIDER.to_string(),
        source: ApiError {
            status: Some(status),
            details,
            context,
        },
    }
}

/// Cloudflare API v4 record client
///
/// # Trust Level: Untrusted
///
/// Isolated, stateless and single-shot. All coordination (retries,
/// re-planning, verification of the final state) is owned by the engine.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareClient {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API root, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a new Cloudflare client
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)` if the token is empty or the HTTP client
    ///   cannot be built
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_url(&self, zone: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone)
    }

    /// Send an authenticated request and decode the envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T> {
        self.send_paged(request, action).await.map(|(result, _)| result)
    }

    /// Like `send`, keeping the pagination block
    async fn send_paged<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<(T, Option<ResultInfo>)> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(PROVIDER, format!("{} request failed: {}", action, e)))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            Error::transport(PROVIDER, format!("{} response unreadable: {}", action, e))
        })?;

        let decoded = decode_page(status, &body);
        if let Err(ref e) = decoded {
            tracing::debug!("Cloudflare {} failed: {}", action, e);
        }
        decoded
    }
}

/// Whether the echoed content is the content that was sent
fn same_content(echoed: &str, requested: &str) -> bool {
    if echoed == requested {
        return true;
    }
    match (echoed.parse::<IpAddr>(), requested.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[async_trait]
impl RecordStore for CloudflareClient {
    /// List every record at `name`, regardless of type
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=host.example.com&per_page=100&page=1
    /// Authorization: Bearer <token>
    /// ```
    ///
    /// Pages are followed until `result_info` reports the last one.
    async fn list(&self, zone: &str, name: &str) -> Result<Vec<AddressRecord>> {
        let per_page = LIST_PAGE_SIZE.to_string();
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let page_str = page.to_string();
            let request = self.client.get(self.records_url(zone)).query(&[
                ("name", name),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ]);

            let (batch, info): (Vec<AddressRecord>, _) = self.send_paged(request, "list").await?;
            records.extend(batch);

            match info {
                Some(info) if info.has_more() && page < MAX_LIST_PAGES => page += 1,
                Some(info) if info.has_more() => {
                    tracing::warn!(
                        "Stopped listing {} after {} pages of {}",
                        name,
                        page,
                        info.total_pages
                    );
                    break;
                }
                _ => break,
            }
        }

        tracing::debug!("Listed {} record(s) at {}", records.len(), name);
        Ok(records)
    }

    /// Create a record
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name": "host.example.com", "content": "1.2.3.4", "ttl": 3600 }
    /// ```
    async fn create(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<AddressRecord> {
        let body = RecordRequest {
            record_type: record_type.as_str(),
            name,
            content,
            ttl,
            proxied: None,
        };
        let request = self.client.post(self.records_url(zone)).json(&body);

        let created: AddressRecord = self.send(request, "create").await?;
        tracing::info!(
            "Created {} record {} -> {} (id {})",
            record_type,
            name,
            created.content,
            created.id
        );
        Ok(created)
    }

    /// Overwrite a record and check the echoed content
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "type": "A", "name": "host.example.com", "content": "5.6.7.8", "ttl": 600, "proxied": false }
    /// ```
    async fn update(
        &self,
        zone: &str,
        record_id: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<()> {
        let body = RecordRequest {
            record_type: record_type.as_str(),
            name,
            content,
            ttl,
            proxied: Some(proxied),
        };
        let url = format!("{}/{}", self.records_url(zone), record_id);
        let request = self.client.put(url).json(&body);

        let updated: AddressRecord = self.send(request, "update").await?;

        if !same_content(&updated.content, content) {
            return Err(Error::verification(content, updated.content));
        }

        tracing::info!("Updated record {} at {} -> {}", record_id, name, content);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare clients
#[derive(Debug, Clone, Default)]
pub struct CloudflareFactory {
    /// Optional API root override
    base_url: Option<String>,
}

impl CloudflareFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients against a different API root
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }
}

impl RecordStoreFactory for CloudflareFactory {
    fn create(&self, config: &Configuration) -> Result<Arc<dyn RecordStore>> {
        let mut client = CloudflareClient::new(config.api_token.clone())?;
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(Arc::new(client))
    }
}
