//! Reconciliation cycle
//!
//! The Reconciler runs one discover → confirm → inspect → mutate → verify
//! pass against the configured name. It owns every retry and delay in the
//! system; resolvers and record stores make single attempts.
//!
//! ## Invariants
//!
//! - No provider call is made when the observed address is the last applied one
//! - No mutation happens on a single observation
//! - Only the record whose content is this host's previous address is updated
//! - `SessionState` changes only after the provider shows the confirmed address

use crate::config::{Configuration, EngineConfig};
use crate::engine::plan::{Plan, decide};
use crate::engine::CycleOutcome;
use crate::error::{Error, Result};
use crate::record::{AddressRecord, ObservedAddress};
use crate::session::SessionState;
use crate::traits::{AddressResolver, IpVersion, RecordStore};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reconciles one DNS name towards this host's confirmed public address
pub struct Reconciler {
    /// Address discovery
    resolver: Arc<dyn AddressResolver>,

    /// Provider record API
    store: Arc<dyn RecordStore>,

    /// Managed zone, name and type
    config: Configuration,

    /// Timing and retry policy
    engine: EngineConfig,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)` if either configuration is invalid
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        store: Arc<dyn RecordStore>,
        config: Configuration,
        engine: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        engine.validate()?;

        let wanted = IpVersion::from(config.record_type);
        if wanted != resolver.version() {
            return Err(Error::config(format!(
                "{} records need a {:?} resolver, got {:?}",
                config.record_type,
                wanted,
                resolver.version()
            )));
        }

        Ok(Self {
            resolver,
            store,
            config,
            engine,
        })
    }

    /// The configuration this reconciler targets
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Run one reconciliation cycle
    ///
    /// Never returns an error: every failure is logged and reported as a
    /// [`CycleOutcome`] so the caller can always proceed to the next cycle.
    pub async fn run_cycle(&self, session: &mut SessionState) -> CycleOutcome {
        debug!("Checking public address for {}", self.config.record_name);

        let observed = match self.resolve_with_retry().await {
            Ok(observed) => observed,
            Err(e) => {
                error!("Failed to resolve public address: {}", e);
                return CycleOutcome::ResolutionFailed {
                    error: e.to_string(),
                };
            }
        };

        info!("Current public address: {}", observed);

        // No-op short-circuit, before any provider call
        if session.is_applied(&observed.value) {
            debug!("Address unchanged ({}), skipping update", observed.value);
            return CycleOutcome::Unchanged {
                address: observed.value,
            };
        }

        info!(
            "Address change detected ({} -> {}), confirming in {:?}",
            display_previous(session.last_applied()),
            observed.value,
            self.engine.confirm_delay()
        );

        let confirmed = match self.confirm(&observed).await {
            Ok(confirmed) => confirmed,
            Err(outcome) => return outcome,
        };

        info!(
            "Address change confirmed ({} -> {}), checking records at {}",
            display_previous(session.last_applied()),
            confirmed,
            self.config.record_name
        );

        let records = match self.inspect().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to list records for {}: {}", self.config.record_name, e);
                return CycleOutcome::InspectionFailed {
                    address: confirmed,
                    error: e.to_string(),
                };
            }
        };

        info!(
            "Found {} {} record(s) at {}",
            records.len(),
            self.config.record_type,
            self.config.record_name
        );

        self.reconcile(records, confirmed, session).await
    }

    /// Wait and observe again; both observations must agree
    ///
    /// `Err` carries the outcome that ends the cycle early.
    async fn confirm(
        &self,
        first: &ObservedAddress,
    ) -> std::result::Result<IpAddr, CycleOutcome> {
        tokio::time::sleep(self.engine.confirm_delay()).await;

        let second = match self.resolve_with_retry().await {
            Ok(second) => second,
            Err(e) => {
                error!("Failed to confirm address, cancelling update: {}", e);
                return Err(CycleOutcome::ResolutionFailed {
                    error: e.to_string(),
                });
            }
        };

        if second.value != first.value {
            warn!(
                "Address confirmation failed: first saw {}, then {}; endpoints may be unstable, cancelling update",
                first, second
            );
            return Err(CycleOutcome::Unconfirmed {
                first: first.clone(),
                second,
            });
        }

        Ok(first.value)
    }

    /// Mutate towards `confirmed`, re-planning against fresh records on retry
    async fn reconcile(
        &self,
        mut records: Vec<AddressRecord>,
        confirmed: IpAddr,
        session: &mut SessionState,
    ) -> CycleOutcome {
        let attempts = self.engine.mutation_attempts;
        let mut last_error: Option<Error> = None;
        let mut applied: Option<CycleOutcome> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.engine.mutation_retry_delay()).await;

                match self.inspect().await {
                    Ok(fresh) => records = fresh,
                    Err(e) => {
                        warn!(
                            "Failed to re-read records before attempt {}/{}: {}",
                            attempt, attempts, e
                        );
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            let plan = decide(
                &records,
                self.config.record_type,
                &confirmed,
                session.last_applied(),
                self.engine.default_ttl,
            );

            if let Plan::AlreadyApplied { record_id } = plan {
                if attempt == 1 {
                    info!(
                        "Record {} already points at {}, no update needed",
                        record_id, confirmed
                    );
                } else {
                    info!(
                        "Record {} now points at {}; an earlier attempt took effect",
                        record_id, confirmed
                    );
                }
                session.record_applied(confirmed);
                return CycleOutcome::AlreadyApplied {
                    address: confirmed,
                    record_id,
                };
            }

            match self.execute(&plan, confirmed).await {
                Ok(outcome) => {
                    applied = Some(outcome);
                    break;
                }
                Err(e) => {
                    let transient = e.as_api().map(|api| api.is_transient()).unwrap_or(false);
                    if attempt < attempts {
                        error!(
                            "Record update failed (attempt {}/{}, transient: {}): {}; retrying in {:?}",
                            attempt,
                            attempts,
                            transient,
                            e,
                            self.engine.mutation_retry_delay()
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        let Some(outcome) = applied else {
            let error = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            error!(
                "Record update failed after {} attempt(s): {}",
                attempts, error
            );
            return CycleOutcome::MutationFailed {
                address: confirmed,
                attempts,
                error,
            };
        };

        self.verify(outcome, confirmed, session).await
    }

    /// Issue the create or update chosen by the plan
    async fn execute(&self, plan: &Plan, confirmed: IpAddr) -> Result<CycleOutcome> {
        let zone = &self.config.zone_id;
        let name = &self.config.record_name;
        let content = confirmed.to_string();

        match plan {
            Plan::Update {
                record_id,
                previous,
                ttl,
                proxied,
            } => {
                info!(
                    "Updating record {} at {}: {} -> {} (ttl {})",
                    record_id, name, previous, confirmed, ttl
                );
                self.store
                    .update(
                        zone,
                        record_id,
                        self.config.record_type,
                        name,
                        &content,
                        *ttl,
                        *proxied,
                    )
                    .await?;
                Ok(CycleOutcome::Updated {
                    record_id: record_id.clone(),
                    previous: *previous,
                    address: confirmed,
                    ttl: *ttl,
                })
            }
            Plan::Create { ttl } => {
                info!(
                    "Creating {} record {} -> {} (ttl {})",
                    self.config.record_type, name, confirmed, ttl
                );
                let created = self
                    .store
                    .create(zone, self.config.record_type, name, &content, *ttl)
                    .await?;
                Ok(CycleOutcome::Created {
                    record_id: created.id,
                    address: confirmed,
                    ttl: *ttl,
                })
            }
            Plan::AlreadyApplied { record_id } => Ok(CycleOutcome::AlreadyApplied {
                address: confirmed,
                record_id: record_id.clone(),
            }),
        }
    }

    /// Re-list and require the confirmed address to be visible
    async fn verify(
        &self,
        outcome: CycleOutcome,
        confirmed: IpAddr,
        session: &mut SessionState,
    ) -> CycleOutcome {
        let records = match self.inspect().await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    "Failed to verify records after update, it may still have been applied: {}",
                    e
                );
                return CycleOutcome::VerificationFailed {
                    address: confirmed,
                    reason: e.to_string(),
                };
            }
        };

        if !records.iter().any(|r| r.points_at(&confirmed)) {
            error!(
                "Record verification failed: no {} record at {} points at {}",
                self.config.record_type, self.config.record_name, confirmed
            );
            return CycleOutcome::VerificationFailed {
                address: confirmed,
                reason: format!("no record points at {}", confirmed),
            };
        }

        info!(
            "Record verified: {} now includes {} ({} {} record(s))",
            self.config.record_name,
            confirmed,
            records.len(),
            self.config.record_type
        );
        session.record_applied(confirmed);
        outcome
    }

    /// List records of the managed type at the managed name
    async fn inspect(&self) -> Result<Vec<AddressRecord>> {
        let records = self
            .store
            .list(&self.config.zone_id, &self.config.record_name)
            .await?;

        Ok(records
            .into_iter()
            .filter(|r| r.is_type(self.config.record_type))
            .collect())
    }

    /// Resolve the public address, retrying whole passes
    async fn resolve_with_retry(&self) -> Result<ObservedAddress> {
        let attempts = self.engine.resolve_attempts;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.resolver.resolve().await {
                Ok(observed) if self.config.record_type.matches(&observed.value) => {
                    return Ok(observed);
                }
                Ok(observed) => {
                    last_error = Some(Error::resolution(format!(
                        "resolver returned {} for a {} record",
                        observed, self.config.record_type
                    )));
                }
                Err(e) => last_error = Some(e),
            }

            if attempt < attempts {
                if let Some(ref e) = last_error {
                    error!(
                        "Failed to get public address (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        self.engine.resolve_retry_delay()
                    );
                }
                tokio::time::sleep(self.engine.resolve_retry_delay()).await;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::resolution("no attempts made")))
    }
}

fn display_previous(previous: Option<IpAddr>) -> String {
    previous
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "none".to_string())
}
