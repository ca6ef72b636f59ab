//! Cycle scheduling
//!
//! The Scheduler owns the loaded configuration and the session state, and
//! drives the [`Reconciler`] on a fixed tick. Reload and shutdown requests
//! arrive through a [`SchedulerHandle`] and are serviced between cycles.
//!
//! ## Lifecycle
//!
//! 1. Create with [`Scheduler::new()`] (loads and validates configuration)
//! 2. Start with [`Scheduler::run()`]; one cycle runs immediately
//! 3. Runs until [`SchedulerHandle::shutdown()`] or every handle is dropped

use crate::config::{Configuration, EngineConfig};
use crate::engine::{CycleOutcome, EngineEvent, Reconciler};
use crate::error::Result;
use crate::session::SessionState;
use crate::traits::{AddressResolverFactory, ConfigLoader, RecordStoreFactory};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Pending control requests beyond this are dropped
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Request delivered to a running scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Reload,
    Shutdown,
}

/// What woke the loop
enum Trigger {
    Tick,
    Reload,
    Shutdown(&'static str),
}

/// Cloneable handle for reload and shutdown requests
///
/// The process manager side of the engine: signal handlers hold one of
/// these. Dropping every handle stops the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    control_tx: mpsc::Sender<Control>,
}

impl SchedulerHandle {
    /// Ask the scheduler to re-read its configuration
    ///
    /// Returns `false` if the scheduler has already stopped.
    pub async fn reload(&self) -> bool {
        self.control_tx.send(Control::Reload).await.is_ok()
    }

    /// Ask the scheduler to stop after the current cycle
    ///
    /// Returns `false` if the scheduler has already stopped.
    pub async fn shutdown(&self) -> bool {
        self.control_tx.send(Control::Shutdown).await.is_ok()
    }
}

/// Drives reconciliation cycles one at a time
pub struct Scheduler {
    /// Source of configuration at startup and on reload
    loader: Arc<dyn ConfigLoader>,

    /// Builds a resolver for the configured record type
    resolvers: Arc<dyn AddressResolverFactory>,

    /// Builds a record store for the configured credential
    stores: Arc<dyn RecordStoreFactory>,

    /// Timing and retry policy
    engine: EngineConfig,

    /// Reconciler for the active configuration
    reconciler: Reconciler,

    /// Last applied address
    session: SessionState,

    /// Reload and shutdown requests
    control_rx: mpsc::Receiver<Control>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `loader`: Configuration loader, consulted now and on every reload
    /// - `resolvers`: Address resolver factory
    /// - `stores`: Record store factory
    /// - `engine`: Engine tunables
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, handle, event_receiver). Fails if the
    /// configuration cannot be loaded or is invalid.
    pub async fn new(
        loader: Arc<dyn ConfigLoader>,
        resolvers: Arc<dyn AddressResolverFactory>,
        stores: Arc<dyn RecordStoreFactory>,
        engine: EngineConfig,
    ) -> Result<(Self, SchedulerHandle, mpsc::Receiver<EngineEvent>)> {
        engine.validate()?;

        let config = loader.load().await?;
        let reconciler = build_reconciler(resolvers.as_ref(), stores.as_ref(), config, &engine)?;

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(engine.event_channel_capacity);

        let scheduler = Self {
            loader,
            resolvers,
            stores,
            engine,
            reconciler,
            session: SessionState::new(),
            control_rx,
            event_tx,
        };

        Ok((scheduler, SchedulerHandle { control_tx }, event_rx))
    }

    /// Start from an existing session instead of an empty one
    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &Configuration {
        self.reconciler.config()
    }

    /// The current session state
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Run a single reconciliation cycle now
    pub async fn run_once(&mut self) -> CycleOutcome {
        let outcome = self.reconciler.run_cycle(&mut self.session).await;
        log_outcome(&outcome, self.reconciler.config());
        self.emit_event(EngineEvent::CycleCompleted(outcome.clone()));
        outcome
    }

    /// Run until shutdown
    ///
    /// Runs one cycle immediately, then one per tick. Cycles never overlap;
    /// reload and shutdown requests are handled between them.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(mut self) -> Result<()> {
        let config = self.reconciler.config();
        info!(
            "Scheduler started for {} ({}), tick every {:?}",
            config.record_name,
            config.record_type,
            self.engine.tick_interval()
        );
        self.emit_event(EngineEvent::Started {
            record_name: config.record_name.clone(),
            record_type: config.record_type,
        });

        self.run_once().await;

        let period = self.engine.tick_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Control requests win over a due tick
            let trigger = tokio::select! {
                biased;

                control = self.control_rx.recv() => match control {
                    Some(Control::Reload) => Trigger::Reload,
                    Some(Control::Shutdown) => Trigger::Shutdown("Shutdown requested"),
                    None => Trigger::Shutdown("All handles dropped"),
                },

                _ = ticker.tick() => Trigger::Tick,
            };

            match trigger {
                Trigger::Tick => {
                    self.run_once().await;
                }
                Trigger::Reload => {
                    self.reload().await;
                }
                Trigger::Shutdown(reason) => {
                    info!("{}, scheduler stopping", reason);
                    self.emit_event(EngineEvent::Stopped {
                        reason: reason.to_string(),
                    });
                    break;
                }
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Re-read configuration and rebuild collaborators
    ///
    /// An invalid configuration is rejected and the active one kept.
    async fn reload(&mut self) {
        info!("Reloading configuration");

        let rebuilt = match self.loader.load().await {
            Ok(config) => build_reconciler(
                self.resolvers.as_ref(),
                self.stores.as_ref(),
                config,
                &self.engine,
            ),
            Err(e) => Err(e),
        };

        let reconciler = match rebuilt {
            Ok(reconciler) => reconciler,
            Err(e) => {
                error!(
                    "Reload rejected, keeping configuration for {}: {}",
                    self.reconciler.config().record_name,
                    e
                );
                self.emit_event(EngineEvent::ReloadRejected {
                    error: e.to_string(),
                });
                return;
            }
        };

        if !reconciler.config().same_target(self.reconciler.config()) {
            info!(
                "Target changed ({} {} -> {} {}), forgetting last applied address",
                self.reconciler.config().record_type,
                self.reconciler.config().record_name,
                reconciler.config().record_type,
                reconciler.config().record_name
            );
            self.session.reset();
        } else {
            debug!("Target unchanged, keeping session state");
        }

        self.reconciler = reconciler;
        info!(
            "Configuration reloaded for {}",
            self.reconciler.config().record_name
        );
        self.emit_event(EngineEvent::Reloaded {
            record_name: self.reconciler.config().record_name.clone(),
        });
    }

    /// Emit an engine event
    ///
    /// Events are dropped with a warning when the channel is full, and
    /// silently when nobody is listening.
    fn emit_event(&self, event: EngineEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

fn build_reconciler(
    resolvers: &dyn AddressResolverFactory,
    stores: &dyn RecordStoreFactory,
    config: Configuration,
    engine: &EngineConfig,
) -> Result<Reconciler> {
    config.validate()?;
    let resolver = resolvers.create(config.record_type)?;
    let store = stores.create(&config)?;
    Reconciler::new(resolver, store, config, engine.clone())
}

fn log_outcome(outcome: &CycleOutcome, config: &Configuration) {
    match outcome {
        CycleOutcome::Updated {
            previous, address, ..
        } => info!(
            "Updated {} {}: {} -> {}",
            config.record_type, config.record_name, previous, address
        ),
        CycleOutcome::Created { address, .. } => info!(
            "Created {} {} -> {}",
            config.record_type, config.record_name, address
        ),
        other if other.is_failure() => {
            warn!("Cycle for {} ended without change: {:?}", config.record_name, other)
        }
        other => debug!("Cycle for {} finished: {:?}", config.record_name, other),
    }
}
