// # HTTP Address Resolver
//
// This crate discovers the host's public address by asking "what is my IP"
// HTTP services.
//
// ## Architecture
//
// An ordered list of endpoints is queried one at a time, primary first. The
// first endpoint that answers 2xx with a bare address of the right family
// wins. Each endpoint gets exactly one attempt per `resolve()`; retries
// belong to the engine.
//
// ## Endpoints
//
// IPv4 (A records): api.ipify.org (primary), ifconfig.me, icanhazip.com, api.ip.sb
// IPv6 (AAAA records): api6.ipify.org (primary), ipv6.icanhazip.com, api-ipv6.ip.sb

use ddns_core::record::RecordType;
use ddns_core::traits::{AddressResolver, AddressResolverFactory, IpVersion};
use ddns_core::{Error, ObservedAddress, Result};

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default IPv4 services, primary first
pub const DEFAULT_IPV4_ENDPOINTS: &[&str] = &[
    "https://api.ipify.org",  // returns plain text IP
    "https://ifconfig.me/ip", // No rate limit documented
    "https://icanhazip.com",  // No rate limit documented
    "https://api.ip.sb/ip",
];

/// Default IPv6 services, primary first
pub const DEFAULT_IPV6_ENDPOINTS: &[&str] = &[
    "https://api6.ipify.org",
    "https://ipv6.icanhazip.com",
    "https://api-ipv6.ip.sb/ip",
];

/// One GET against one endpoint
///
/// Returns the response body of a 2xx answer. Split out so resolution
/// order and validation can be exercised without a network.
#[async_trait::async_trait]
trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, String>;
}

/// reqwest-backed fetcher
struct HttpFetch {
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }

        response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))
    }
}

/// HTTP-based public address resolver
pub struct HttpAddressResolver {
    /// Endpoints in query order; the first is the primary
    endpoints: Vec<String>,

    /// Address family to accept
    version: IpVersion,

    fetcher: Arc<dyn Fetch>,
}

impl HttpAddressResolver {
    /// Create a resolver over the given endpoints
    ///
    /// # Parameters
    ///
    /// - `endpoints`: URLs in query order; the first is the primary
    /// - `version`: Address family to accept
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)` if no endpoint is given or the HTTP client
    ///   cannot be built
    pub fn new(endpoints: Vec<String>, version: IpVersion) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::config("At least one address endpoint is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoints,
            version,
            fetcher: Arc::new(HttpFetch { client }),
        })
    }

    /// Create a resolver over the default endpoints for a family
    pub fn with_defaults(version: IpVersion) -> Result<Self> {
        let endpoints = match version {
            IpVersion::V4 => DEFAULT_IPV4_ENDPOINTS,
            IpVersion::V6 => DEFAULT_IPV6_ENDPOINTS,
        };
        Self::new(endpoints.iter().map(|e| e.to_string()).collect(), version)
    }

    /// Endpoints in query order
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Move `primary` to the front of the query order
    ///
    /// An endpoint not already listed is added.
    pub fn with_primary(mut self, primary: impl Into<String>) -> Self {
        let primary = primary.into();
        self.endpoints.retain(|e| *e != primary);
        self.endpoints.insert(0, primary);
        self
    }

    #[cfg(test)]
    fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }
}

/// Validate a response body as a bare address of the given family
pub fn parse_address(body: &str, version: IpVersion) -> std::result::Result<IpAddr, String> {
    let text = body.trim();
    if text.is_empty() {
        return Err("empty response".to_string());
    }

    let ip: IpAddr = text
        .parse()
        .map_err(|_| format!("invalid IP address: {:?}", truncate(text)))?;

    if !version.matches(&ip) {
        return Err(format!("expected {:?} address, got {}", version, ip));
    }

    Ok(ip)
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(64) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self) -> Result<ObservedAddress> {
        let mut last_error = String::from("no endpoints queried");

        for url in &self.endpoints {
            let answer = self
                .fetcher
                .fetch(url)
                .await
                .and_then(|body| parse_address(&body, self.version));

            match answer {
                Ok(ip) => {
                    tracing::debug!("Public address {} from {}", ip, url);
                    return Ok(ObservedAddress::new(ip, url.clone()));
                }
                Err(e) => {
                    tracing::warn!("Address endpoint {} failed: {}", url, e);
                    last_error = format!("{}: {}", url, e);
                }
            }
        }

        Err(Error::resolution(last_error))
    }

    fn version(&self) -> IpVersion {
        self.version
    }
}

/// Factory for creating HTTP address resolvers
///
/// Builds an IPv4 resolver for A records and an IPv6 resolver for AAAA.
#[derive(Debug, Clone, Default)]
pub struct HttpResolverFactory {
    /// Optional override for the primary endpoint
    primary: Option<String>,
}

impl HttpResolverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query `primary` before the defaults
    pub fn with_primary(primary: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
        }
    }
}

impl AddressResolverFactory for HttpResolverFactory {
    fn create(&self, record_type: RecordType) -> Result<Arc<dyn AddressResolver>> {
        let mut resolver = HttpAddressResolver::with_defaults(IpVersion::from(record_type))?;
        if let Some(primary) = &self.primary {
            resolver = resolver.with_primary(primary.clone());
        }
        Ok(Arc::new(resolver))
    }
}
