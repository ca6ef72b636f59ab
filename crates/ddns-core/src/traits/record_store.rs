// # Record Store Trait
//
// Defines a minimal client over a DNS provider's record CRUD API.
//
// ## Implementations
//
// - Cloudflare API v4: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{RecordStore, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RecordStore implementation */;
//
//     let records = store.list("zone-id", "host.example.com").await?;
//     if records.is_empty() {
//         store
//             .create("zone-id", RecordType::A, "host.example.com", "1.2.3.4", 3600)
//             .await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::{AddressRecord, RecordType};

/// Trait for record store implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to the provider's endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (engine handles retry)
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (owned by the `Reconciler`)
/// - ❌ Decide whether a record should be created or updated
/// - ❌ Cache records beyond a single call
/// - ❌ Spawn tasks or threads
///
/// ## Error contract
///
/// - A non-success HTTP status or a `success: false` body is `Error::Api`,
///   carrying the status and every provider error code
/// - `update` reads back the echoed content and fails with
///   `Error::Verification` when it differs from the request
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List all records at `name`, regardless of type
    async fn list(&self, zone: &str, name: &str) -> Result<Vec<AddressRecord>, crate::Error>;

    /// Create a record and return it as the provider stored it
    async fn create(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<AddressRecord, crate::Error>;

    /// Update the record `record_id` in place
    ///
    /// `ttl` and `proxied` are the record's current settings; only the
    /// content changes. Succeeds only when the provider echoes back `content`.
    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        zone: &str,
        record_id: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
///
/// The scheduler calls this at startup and again on every accepted reload,
/// so a changed credential takes effect without a restart.
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore for the given configuration
    fn create(
        &self,
        config: &crate::config::Configuration,
    ) -> Result<std::sync::Arc<dyn RecordStore>, crate::Error>;
}
