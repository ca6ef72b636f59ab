//! Core DDNS engine
//!
//! The engine is responsible for:
//! - Discovering and confirming the host's public address
//! - Reconciling the provider's records at the managed name
//! - Driving reconciliation on a fixed tick, with reload and shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  tick / reload / shutdown
//! │  Scheduler  │◀──────────────────────────── SchedulerHandle
//! └─────────────┘
//!        │ one cycle at a time
//!        ▼
//! ┌─────────────┐           ┌─────────────────┐
//! │ Reconciler  │──────────▶│ AddressResolver │
//! └─────────────┘           └─────────────────┘
//!        │
//!        ▼
//! ┌─────────────┐           ┌──────────────┐
//! │ RecordStore │           │    Events    │
//! │ list/create │           │  (notify)    │
//! │ /update     │           └──────────────┘
//! └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve the public address; stop if it is the last applied one
//! 2. Wait, resolve again, and abort unless both observations agree
//! 3. List records; stop if one already holds the confirmed address
//! 4. Update this host's previous record, or create a new one
//! 5. Re-list and confirm the address is visible before recording it

pub mod plan;
pub mod reconciler;
pub mod scheduler;

pub use plan::{Plan, decide};
pub use reconciler::Reconciler;
pub use scheduler::{Scheduler, SchedulerHandle};

use crate::record::ObservedAddress;
use crate::record::RecordType;
use std::net::IpAddr;

/// How a reconciliation cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Observed address equals the last applied one; no provider calls made
    Unchanged { address: IpAddr },

    /// The two observations disagreed; nothing was changed
    Unconfirmed {
        first: ObservedAddress,
        second: ObservedAddress,
    },

    /// A record already held the confirmed address
    AlreadyApplied { address: IpAddr, record_id: String },

    /// This host's previous record was rewritten
    Updated {
        record_id: String,
        previous: IpAddr,
        address: IpAddr,
        ttl: u32,
    },

    /// A new record was created for this host
    Created {
        record_id: String,
        address: IpAddr,
        ttl: u32,
    },

    /// No valid address could be discovered
    ResolutionFailed { error: String },

    /// The live records could not be listed
    InspectionFailed { address: IpAddr, error: String },

    /// Every mutation attempt failed
    MutationFailed {
        address: IpAddr,
        attempts: usize,
        error: String,
    },

    /// A mutation reported success but the address is not visible
    ///
    /// The write may have been applied; the next cycle starts over.
    VerificationFailed { address: IpAddr, reason: String },
}

impl CycleOutcome {
    /// Whether the cycle issued a create or update that took effect
    pub fn is_mutation(&self) -> bool {
        matches!(self, CycleOutcome::Updated { .. } | CycleOutcome::Created { .. })
    }

    /// Whether the cycle ended in a failure the log should surface as an error
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CycleOutcome::ResolutionFailed { .. }
                | CycleOutcome::InspectionFailed { .. }
                | CycleOutcome::MutationFailed { .. }
                | CycleOutcome::VerificationFailed { .. }
        )
    }

    /// The address recorded as applied by this cycle, if any
    pub fn applied_address(&self) -> Option<IpAddr> {
        match self {
            CycleOutcome::AlreadyApplied { address, .. }
            | CycleOutcome::Updated { address, .. }
            | CycleOutcome::Created { address, .. } => Some(*address),
            _ => None,
        }
    }
}

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Scheduler started
    Started {
        record_name: String,
        record_type: RecordType,
    },

    /// A reconciliation cycle finished
    CycleCompleted(CycleOutcome),

    /// A reload request was applied
    Reloaded { record_name: String },

    /// A reload request was refused; the previous configuration stays active
    ReloadRejected { error: String },

    /// Scheduler stopped
    Stopped { reason: String },
}
