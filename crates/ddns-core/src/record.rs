//! Address records and discovery results
//!
//! [`AddressRecord`] mirrors one resource record as the provider reports it.
//! The engine never keeps one past the cycle that read it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// DNS record type managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[default]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name used by the provider API
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Whether an address belongs to this record type's family
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            RecordType::A => addr.is_ipv4(),
            RecordType::Aaaa => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(crate::Error::invalid_input(format!(
                "record type must be A or AAAA, got '{}'",
                other
            ))),
        }
    }
}

/// One DNS resource record at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Provider-assigned identifier, immutable once created
    pub id: String,
    /// Record type as reported by the provider (`A`, `AAAA`, `CNAME`, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    /// The address value
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

impl AddressRecord {
    /// Whether this record is of the given managed type
    pub fn is_type(&self, record_type: RecordType) -> bool {
        self.record_type.eq_ignore_ascii_case(record_type.as_str())
    }

    /// Whether this record's content is the given address
    ///
    /// Content is compared as a parsed address so that equivalent IPv6
    /// spellings match; unparsable content never matches.
    pub fn points_at(&self, addr: &IpAddr) -> bool {
        self.content
            .trim()
            .parse::<IpAddr>()
            .map(|content| content == *addr)
            .unwrap_or(false)
    }
}

/// A single discovery result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedAddress {
    pub value: IpAddr,
    /// Endpoint that supplied the value
    pub source: String,
}

impl ObservedAddress {
    pub fn new(value: IpAddr, source: impl Into<String>) -> Self {
        Self {
            value,
            source: source.into(),
        }
    }
}

impl fmt::Display for ObservedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (source: {})", self.value, self.source)
    }
}
