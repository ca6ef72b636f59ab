//! Test doubles and common utilities for engine contract tests
//!
//! This module provides in-memory stand-ins for the resolver, the provider
//! record API and the configuration loader, with call logs and fault
//! injection so tests can assert exactly which provider calls were made.

#![allow(dead_code)]

use ddns_core::error::{ApiErrorDetail, Error, Result};
use ddns_core::traits::{
    AddressResolver, AddressResolverFactory, ConfigLoader, IpVersion, RecordStore,
    RecordStoreFactory,
};
use ddns_core::{
    AddressRecord, Configuration, EngineConfig, EngineEvent, ObservedAddress, RecordType,
};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

pub const ZONE: &str = "zone-1";
pub const NAME: &str = "host.example.com";

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}

/// A resolver that replays a fixed script of answers
///
/// Answers are consumed in order; the last one repeats forever.
pub struct ScriptedResolver {
    script: Mutex<VecDeque<std::result::Result<IpAddr, String>>>,
    last: Mutex<Option<std::result::Result<IpAddr, String>>>,
    version: IpVersion,
    call_count: AtomicUsize,
    gate: Mutex<Option<Gate>>,
}

/// Parks one resolve() call until the test releases it
struct Gate {
    call: usize,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl ScriptedResolver {
    pub fn new(script: Vec<std::result::Result<IpAddr, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            version: IpVersion::V4,
            call_count: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Always answer with the same address
    pub fn fixed(addr: IpAddr) -> Self {
        Self::new(vec![Ok(addr)])
    }

    /// Answer with each address in turn
    pub fn sequence(addrs: &[&str]) -> Self {
        Self::new(addrs.iter().map(|a| Ok(ip(a))).collect())
    }

    pub fn with_version(mut self, version: IpVersion) -> Self {
        self.version = version;
        self
    }

    /// Get the number of times resolve() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Block the `call`-th resolve() (1-based) until released
    ///
    /// Returns `(entered, release)`: `entered` fires once the call is
    /// parked, and `release.notify_one()` lets it answer.
    pub fn hold_call(&self, call: usize) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            call,
            entered: entered.clone(),
            release: release.clone(),
        });
        (entered, release)
    }

    /// Append answers to the script
    pub fn push(&self, answer: std::result::Result<IpAddr, String>) {
        self.script.lock().unwrap().push_back(answer);
    }
}

#[async_trait::async_trait]
impl AddressResolver for ScriptedResolver {
    async fn resolve(&self) -> Result<ObservedAddress> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        let held = {
            let gate = self.gate.lock().unwrap();
            gate.as_ref()
                .filter(|g| g.call == call)
                .map(|g| (g.entered.clone(), g.release.clone()))
        };
        if let Some((entered, release)) = held {
            entered.notify_one();
            release.notified().await;
        }

        let answer = {
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = script.pop_front() {
                *last = Some(next.clone());
            }
            last.clone()
                .unwrap_or_else(|| Err("no scripted answer".to_string()))
        };

        match answer {
            Ok(addr) => Ok(ObservedAddress::new(addr, "scripted")),
            Err(e) => Err(Error::resolution(e)),
        }
    }

    fn version(&self) -> IpVersion {
        self.version
    }
}

/// One mutation the engine issued against the fake provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create {
        record_type: RecordType,
        name: String,
        content: String,
        ttl: u32,
    },
    Update {
        record_id: String,
        content: String,
        ttl: u32,
        proxied: bool,
    },
}

#[derive(Default)]
struct StoreState {
    records: Vec<AddressRecord>,
    mutations: Vec<Mutation>,
    next_id: usize,
    list_calls: usize,
    /// Mutations that fail without being applied
    failing_mutations: usize,
    /// Mutations that are applied but still report failure
    lossy_mutations: usize,
    /// List calls that fail
    failing_lists: usize,
    /// A specific list call (1-based) that fails
    failing_list_call: Option<usize>,
    /// Mutations report success without being applied
    swallow_writes: bool,
}

/// An in-memory provider record API
///
/// Clones share state, so a test can keep one clone for assertions while
/// the engine owns another.
#[derive(Clone, Default)]
pub struct FakeRecordStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given records at the managed name
    pub fn with_records(records: Vec<AddressRecord>) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().records = records;
        store
    }

    /// The current records, as the provider would list them
    pub fn records(&self) -> Vec<AddressRecord> {
        self.state.lock().unwrap().records.clone()
    }

    /// Every create or update call, in order
    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations.len()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    /// Fail the next `n` create/update calls with a server error
    pub fn fail_next_mutations(&self, n: usize) {
        self.state.lock().unwrap().failing_mutations = n;
    }

    /// Apply the next `n` create/update calls but report a timeout
    pub fn apply_then_fail_next_mutations(&self, n: usize) {
        self.state.lock().unwrap().lossy_mutations = n;
    }

    /// Fail the next `n` list calls with a server error
    pub fn fail_next_lists(&self, n: usize) {
        self.state.lock().unwrap().failing_lists = n;
    }

    /// Fail only the `n`th list call, counting from the first ever made
    pub fn fail_list_call(&self, n: usize) {
        self.state.lock().unwrap().failing_list_call = Some(n);
    }

    /// Report success for writes without applying them
    pub fn swallow_writes(&self) {
        self.state.lock().unwrap().swallow_writes = true;
    }

    /// Change a record's content behind the engine's back (another host)
    pub fn set_content(&self, record_id: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(r) = state.records.iter_mut().find(|r| r.id == record_id) {
            r.content = content.to_string();
        }
    }

    fn server_error() -> Error {
        Error::api(
            "fake",
            Some(500),
            vec![ApiErrorDetail::new(10000, "internal error")],
        )
    }
}

#[async_trait::async_trait]
impl RecordStore for FakeRecordStore {
    async fn list(&self, zone: &str, name: &str) -> Result<Vec<AddressRecord>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(Self::server_error());
        }
        if state.failing_list_call == Some(state.list_calls) {
            return Err(Self::server_error());
        }
        assert_eq!(zone, ZONE, "engine queried the wrong zone");
        Ok(state
            .records
            .iter()
            .filter(|r| r.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        _zone: &str,
        record_type: RecordType,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<AddressRecord> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(Mutation::Create {
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            ttl,
        });

        if state.failing_mutations > 0 {
            state.failing_mutations -= 1;
            return Err(Self::server_error());
        }

        state.next_id += 1;
        let record = AddressRecord {
            id: format!("new-{}", state.next_id),
            record_type: record_type.as_str().to_string(),
            name: name.to_string(),
            content: content.to_string(),
            ttl,
            proxied: false,
        };

        if !state.swallow_writes {
            state.records.push(record.clone());
        }

        if state.lossy_mutations > 0 {
            state.lossy_mutations -= 1;
            return Err(Error::transport("fake", "request timed out"));
        }

        Ok(record)
    }

    async fn update(
        &self,
        _zone: &str,
        record_id: &str,
        _record_type: RecordType,
        _name: &str,
        content: &str,
        ttl: u32,
        proxied: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(Mutation::Update {
            record_id: record_id.to_string(),
            content: content.to_string(),
            ttl,
            proxied,
        });

        if state.failing_mutations > 0 {
            state.failing_mutations -= 1;
            return Err(Self::server_error());
        }

        if !state.swallow_writes {
            match state.records.iter_mut().find(|r| r.id == record_id) {
                Some(r) => {
                    r.content = content.to_string();
                    r.ttl = ttl;
                    r.proxied = proxied;
                }
                None => {
                    return Err(Error::api(
                        "fake",
                        Some(404),
                        vec![ApiErrorDetail::new(81044, "Record not found")],
                    ));
                }
            }
        }

        if state.lossy_mutations > 0 {
            state.lossy_mutations -= 1;
            return Err(Error::transport("fake", "request timed out"));
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Build an address record at the managed name
pub fn record(id: &str, content: &str, ttl: u32) -> AddressRecord {
    typed_record(id, "A", content, ttl)
}

pub fn typed_record(id: &str, record_type: &str, content: &str, ttl: u32) -> AddressRecord {
    AddressRecord {
        id: id.to_string(),
        record_type: record_type.to_string(),
        name: NAME.to_string(),
        content: content.to_string(),
        ttl,
        proxied: false,
    }
}

/// Hands out one shared resolver regardless of record type
pub struct FixedResolverFactory {
    pub resolver: Arc<ScriptedResolver>,
}

impl AddressResolverFactory for FixedResolverFactory {
    fn create(&self, _record_type: RecordType) -> Result<Arc<dyn AddressResolver>> {
        Ok(self.resolver.clone())
    }
}

/// Hands out one shared fake store and remembers what it was asked for
#[derive(Default)]
pub struct FakeStoreFactory {
    pub store: FakeRecordStore,
    built_for: Mutex<Vec<Configuration>>,
}

impl FakeStoreFactory {
    pub fn new(store: FakeRecordStore) -> Self {
        Self {
            store,
            built_for: Mutex::new(Vec::new()),
        }
    }

    /// Number of stores built so far
    pub fn build_count(&self) -> usize {
        self.built_for.lock().unwrap().len()
    }

    pub fn last_built_for(&self) -> Option<Configuration> {
        self.built_for.lock().unwrap().last().cloned()
    }
}

impl RecordStoreFactory for FakeStoreFactory {
    fn create(&self, config: &Configuration) -> Result<Arc<dyn RecordStore>> {
        self.built_for.lock().unwrap().push(config.clone());
        Ok(Arc::new(self.store.clone()))
    }
}

/// A loader whose contents the test can change between reloads
#[derive(Clone)]
pub struct MemoryConfigLoader {
    config: Arc<Mutex<Configuration>>,
    load_count: Arc<AtomicUsize>,
}

impl MemoryConfigLoader {
    pub fn new(config: Configuration) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            load_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, config: Configuration) {
        *self.config.lock().unwrap() = config;
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConfigLoader for MemoryConfigLoader {
    async fn load(&self) -> Result<Configuration> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.config.lock().unwrap().clone())
    }

    async fn save(&self, config: &Configuration) -> Result<()> {
        self.set(config.clone());
        Ok(())
    }
}

/// A valid configuration for the managed test name
pub fn test_config() -> Configuration {
    Configuration::new("test-token", ZONE, NAME, RecordType::A)
}

/// Engine tunables with every pause removed
///
/// The tick is long enough that only the startup cycle runs unless a test
/// asks for ticks explicitly.
pub fn fast_engine() -> EngineConfig {
    EngineConfig {
        tick_interval_ms: 3_600_000,
        confirm_delay_ms: 0,
        resolve_attempts: 3,
        resolve_retry_delay_ms: 0,
        mutation_attempts: 3,
        mutation_retry_delay_ms: 0,
        default_ttl: 3600,
        event_channel_capacity: 100,
    }
}

/// Wait for the first event matching `pred`, skipping others
///
/// Panics if nothing matches within five seconds.
pub async fn wait_for<F>(events: &mut mpsc::Receiver<EngineEvent>, mut pred: F) -> EngineEvent
where
    F: FnMut(&EngineEvent) -> bool,
{
    let wait = async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    };

    tokio::time::timeout(std::time::Duration::from_secs(5), wait)
        .await
        .expect("event should arrive within 5 seconds")
        .expect("event channel closed before a matching event")
}
