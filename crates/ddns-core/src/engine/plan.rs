//! Record planning
//!
//! Given the live records at the managed name, decide which single action
//! brings this host's record to the confirmed address. Pure function; the
//! reconciler re-runs it against freshly listed records before every attempt.

use crate::record::{AddressRecord, RecordType};
use std::net::IpAddr;

/// Action the reconciler should take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// A record already holds the confirmed address
    AlreadyApplied { record_id: String },

    /// Rewrite this host's previous record in place
    ///
    /// `ttl` and `proxied` are carried over from the existing record.
    Update {
        record_id: String,
        previous: IpAddr,
        ttl: u32,
        proxied: bool,
    },

    /// No record belongs to this host; add one
    Create { ttl: u32 },
}

/// Decide how to reconcile `records` towards `confirmed`
///
/// Only records of `record_type` are considered. A record is treated as this
/// host's own only when its content equals `last_applied`; records holding
/// any other address belong to other hosts and are never chosen for update.
pub fn decide(
    records: &[AddressRecord],
    record_type: RecordType,
    confirmed: &IpAddr,
    last_applied: Option<IpAddr>,
    default_ttl: u32,
) -> Plan {
    let candidates: Vec<&AddressRecord> =
        records.iter().filter(|r| r.is_type(record_type)).collect();

    if let Some(existing) = candidates.iter().find(|r| r.points_at(confirmed)) {
        return Plan::AlreadyApplied {
            record_id: existing.id.clone(),
        };
    }

    if let Some(previous) = last_applied {
        if let Some(own) = candidates.iter().find(|r| r.points_at(&previous)) {
            return Plan::Update {
                record_id: own.id.clone(),
                previous,
                ttl: own.ttl,
                proxied: own.proxied,
            };
        }
    }

    let ttl = candidates.first().map(|r| r.ttl).unwrap_or(default_ttl);
    Plan::Create { ttl }
}
