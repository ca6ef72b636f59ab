// # Address Resolver Trait
//
// Defines the interface for discovering this host's public address.
//
// ## Implementations
//
// - HTTP "what is my IP" endpoints: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* AddressResolver implementation */;
//
//     let observed = resolver.resolve().await?;
//     println!("public address {} from {}", observed.value, observed.source);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::ObservedAddress;

/// Address family a resolver accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn matches(&self, addr: &std::net::IpAddr) -> bool {
        match self {
            IpVersion::V4 => addr.is_ipv4(),
            IpVersion::V6 => addr.is_ipv6(),
        }
    }
}

impl From<crate::record::RecordType> for IpVersion {
    fn from(record_type: crate::record::RecordType) -> Self {
        match record_type {
            crate::record::RecordType::A => IpVersion::V4,
            crate::record::RecordType::Aaaa => IpVersion::V6,
        }
    }
}

/// Trait for address resolver implementations
///
/// A resolver performs one discovery pass per call and returns the first
/// valid address it finds, together with the endpoint that supplied it.
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Query external discovery endpoints, each with a bounded timeout
/// - ✅ Fall through to the next endpoint when one fails
///
/// ## Forbidden Capabilities
/// - ❌ Retry the same endpoint (retries across passes belong to the engine)
/// - ❌ Sleep or poll (the scheduler owns timing)
/// - ❌ Return an address that did not validate strictly
/// - ❌ Make decisions about when to update DNS
///
/// ## Rationale
///
/// Discovery endpoints are untrusted free-text services. Strict validation
/// keeps garbage out of the zone; keeping retries in the engine keeps the
/// confirmation protocol's timing predictable.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Discover the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(ObservedAddress)`: A validated address and its source endpoint
    /// - `Err(Error::Resolution)`: No endpoint produced a valid address
    async fn resolve(&self) -> Result<ObservedAddress, crate::Error>;

    /// Get the address family this resolver returns
    fn version(&self) -> IpVersion {
        IpVersion::V4
    }
}

/// Helper trait for constructing resolvers for a record type
pub trait AddressResolverFactory: Send + Sync {
    /// Create a resolver that yields addresses for `record_type`
    fn create(
        &self,
        record_type: crate::record::RecordType,
    ) -> Result<std::sync::Arc<dyn AddressResolver>, crate::Error>;
}
