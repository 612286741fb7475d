//! Adapter registry -- a named collection of backend adapters with cached
//! health state and failover selection.
//!
//! The registry never takes part in a single invocation's retry or timeout
//! logic; it only decides *which* adapter a caller should use.
//!
//! ```text
//! register(a) ──► entries (registration order) ──► default = first registered
//!                      │
//!   health_check(name) ┼─► spawned probe ─► {healthy, last_health_check}
//!   auto timers ───────┘      (Err / panic = unhealthy)
//!
//! get_healthy_adapter(primary, fallback) ─► fresh probe of primary,
//!                                           then fallback, else None
//! ```

mod health;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::model::Feature;

use health::HealthTimer;

/// Shortest period accepted by [`AdapterRegistry::enable_auto_health_check`].
pub const MIN_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("adapter '{0}' is already registered")]
    Duplicate(String),
    #[error("adapter '{0}' is not registered")]
    NotFound(String),
    #[error("no default adapter is set")]
    NoDefault,
    #[error("default adapter '{0}' is not registered")]
    DefaultNotRegistered(String),
}

/// Bookkeeping for one registered adapter.
#[derive(Clone)]
pub struct AdapterInfo {
    pub adapter: Arc<dyn Adapter>,
    pub registered_at: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,
    /// `None` until the first check.
    pub healthy: Option<bool>,
}

impl AdapterInfo {
    fn name(&self) -> &str {
        self.adapter.name()
    }
}

/// Point-in-time view of one adapter, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub name: String,
    pub version: String,
    pub registered_at: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub healthy: Option<bool>,
    pub is_default: bool,
}

/// Result of a successful healthy-adapter lookup.
#[derive(Clone)]
pub struct HealthyAdapter {
    pub name: String,
    pub adapter: Arc<dyn Adapter>,
    /// True when the primary was unhealthy and the fallback was chosen.
    pub used_fallback: bool,
}

impl fmt::Debug for HealthyAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthyAdapter")
            .field("name", &self.name)
            .field("used_fallback", &self.used_fallback)
            .finish()
    }
}

/// Shared state. Never locked across an `.await`.
#[derive(Default)]
pub(crate) struct RegistryState {
    entries: Vec<AdapterInfo>,
    default: Option<String>,
    auto_interval: Option<Duration>,
    timers: HashMap<String, HealthTimer>,
}

impl RegistryState {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    pub(crate) fn adapter(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.position(name)
            .map(|i| Arc::clone(&self.entries[i].adapter))
    }

    /// Store a check result. Concurrent checks resolve last-write-wins; a
    /// result for an adapter unregistered in the meantime is dropped.
    pub(crate) fn record(&mut self, name: &str, healthy: bool) {
        if let Some(i) = self.position(name) {
            let entry = &mut self.entries[i];
            entry.healthy = Some(healthy);
            entry.last_health_check = Some(Utc::now());
        }
    }

    fn status(&self, entry: &AdapterInfo) -> AdapterStatus {
        AdapterStatus {
            name: entry.name().to_string(),
            version: entry.adapter.version().to_string(),
            registered_at: entry.registered_at,
            last_health_check: entry.last_health_check,
            healthy: entry.healthy,
            is_default: self.default.as_deref() == Some(entry.name()),
        }
    }

    fn stop_all_timers(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.stop();
        }
    }
}

pub(crate) fn lock(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A collection of registered [`Adapter`]s, keyed by name and kept in
/// registration order.
///
/// All methods take `&self`; share the registry behind an `Arc` to use it
/// from several tasks. Periodic health checks need a Tokio runtime.
///
/// # Example
///
/// ```ignore
/// let registry = AdapterRegistry::new();
/// registry.register(Arc::new(CliAdapter::claude_code()))?;
/// let chosen = registry.get_healthy_adapter("claude-code", Some("backup")).await;
/// ```
#[derive(Default)]
pub struct AdapterRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        lock(&self.state)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Register an adapter under [`Adapter::name`].
    ///
    /// The first adapter registered while no default is set becomes the
    /// default.
    pub fn register(&self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        let name = adapter.name().to_string();
        let mut state = self.lock();
        if state.position(&name).is_some() {
            return Err(RegistryError::Duplicate(name));
        }
        state.entries.push(AdapterInfo {
            adapter,
            registered_at: Utc::now(),
            last_health_check: None,
            healthy: None,
        });
        if state.default.is_none() {
            state.default = Some(name.clone());
        }
        if let Some(interval) = state.auto_interval {
            if let Some(timer) = health::spawn_timer(&self.state, &name, interval) {
                state.timers.insert(name.clone(), timer);
            }
        }
        info!(adapter = %name, "registered adapter");
        Ok(())
    }

    /// Remove an adapter and stop its timer.
    ///
    /// Removing the default promotes the earliest-registered remaining
    /// adapter, or leaves no default when none remain.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Adapter>, RegistryError> {
        let mut state = self.lock();
        let index = state
            .position(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let removed = state.entries.remove(index);
        if let Some(timer) = state.timers.remove(name) {
            timer.stop();
        }
        if state.default.as_deref() == Some(name) {
            state.default = state.entries.first().map(|e| e.name().to_string());
            info!(
                adapter = name,
                new_default = state.default.as_deref().unwrap_or("<none>"),
                "unregistered default adapter"
            );
        } else {
            info!(adapter = name, "unregistered adapter");
        }
        Ok(removed.adapter)
    }

    pub fn set_default(&self, name: &str) -> Result<(), RegistryError> {
        let mut state = self.lock();
        if state.position(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        state.default = Some(name.to_string());
        Ok(())
    }

    /// Stop all timers, then drop every adapter and the default.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.stop_all_timers();
        state.entries.clear();
        state.default = None;
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.lock().adapter(name)
    }

    pub fn get_default(&self) -> Result<Arc<dyn Adapter>, RegistryError> {
        let state = self.lock();
        let name = state.default.as_deref().ok_or(RegistryError::NoDefault)?;
        state
            .adapter(name)
            .ok_or_else(|| RegistryError::DefaultNotRegistered(name.to_string()))
    }

    /// The named adapter, or the default when `name` is `None`.
    ///
    /// An explicit unknown name is `NotFound`; it never falls back to the
    /// default.
    pub fn get_or_default(&self, name: Option<&str>) -> Result<Arc<dyn Adapter>, RegistryError> {
        match name {
            Some(name) => self
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string())),
            None => self.get_default(),
        }
    }

    /// Adapters supporting `feature`, in registration order.
    pub fn find_by_feature(&self, feature: Feature) -> Vec<Arc<dyn Adapter>> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.adapter.supports_feature(feature))
            .map(|e| Arc::clone(&e.adapter))
            .collect()
    }

    /// Adapters reporting an *available* capability called `name`, in
    /// registration order.
    pub fn find_by_capability(&self, name: &str) -> Vec<Arc<dyn Adapter>> {
        self.lock()
            .entries
            .iter()
            .filter(|e| {
                e.adapter
                    .capabilities()
                    .iter()
                    .any(|c| c.name == name && c.available)
            })
            .map(|e| Arc::clone(&e.adapter))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Health
    // -----------------------------------------------------------------------

    /// Probe one adapter now and cache the result.
    pub async fn health_check(&self, name: &str) -> Result<bool, RegistryError> {
        let adapter = self
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let healthy = health::probe(name, adapter).await;
        self.lock().record(name, healthy);
        Ok(healthy)
    }

    /// Probe every adapter concurrently.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let adapters: Vec<(String, Arc<dyn Adapter>)> = self
            .lock()
            .entries
            .iter()
            .map(|e| (e.name().to_string(), Arc::clone(&e.adapter)))
            .collect();

        let checks = adapters.into_iter().map(|(name, adapter)| async move {
            let healthy = health::probe(&name, adapter).await;
            (name, healthy)
        });
        let results = futures::future::join_all(checks).await;

        let mut state = self.lock();
        for (name, healthy) in &results {
            state.record(name, *healthy);
        }
        results.into_iter().collect()
    }

    /// Re-check every adapter each `interval`, replacing any running timers.
    /// Adapters registered later get a timer too. Intervals shorter than
    /// [`MIN_HEALTH_CHECK_INTERVAL`] are raised to it.
    pub fn enable_auto_health_check(&self, interval: Duration) {
        let interval = if interval < MIN_HEALTH_CHECK_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_HEALTH_CHECK_INTERVAL.as_millis() as u64,
                "auto health check interval too short, using minimum"
            );
            MIN_HEALTH_CHECK_INTERVAL
        } else {
            interval
        };
        let mut state = self.lock();
        state.stop_all_timers();
        state.auto_interval = Some(interval);
        let names: Vec<String> = state.entries.iter().map(|e| e.name().to_string()).collect();
        for name in names {
            if let Some(timer) = health::spawn_timer(&self.state, &name, interval) {
                state.timers.insert(name, timer);
            }
        }
        info!(interval_secs = interval.as_secs_f64(), "auto health check enabled");
    }

    pub fn disable_auto_health_check(&self) {
        let mut state = self.lock();
        state.stop_all_timers();
        state.auto_interval = None;
    }

    pub fn auto_health_check_interval(&self) -> Option<Duration> {
        self.lock().auto_interval
    }

    // -----------------------------------------------------------------------
    // Failover
    // -----------------------------------------------------------------------

    async fn checked(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        let adapter = self.get(name)?;
        match self.health_check(name).await {
            Ok(true) => Some(adapter),
            _ => None,
        }
    }

    /// A freshly checked healthy adapter: `primary` if it passes, otherwise
    /// `fallback`. An unregistered name counts as unhealthy.
    pub async fn get_healthy_adapter(
        &self,
        primary: &str,
        fallback: Option<&str>,
    ) -> Option<HealthyAdapter> {
        if let Some(adapter) = self.checked(primary).await {
            return Some(HealthyAdapter {
                name: primary.to_string(),
                adapter,
                used_fallback: false,
            });
        }

        let Some(fallback) = fallback.filter(|f| *f != primary) else {
            warn!(primary, "primary adapter unavailable and no fallback configured");
            return None;
        };
        warn!(primary, fallback, "primary adapter unavailable, trying fallback");

        match self.checked(fallback).await {
            Some(adapter) => Some(HealthyAdapter {
                name: fallback.to_string(),
                adapter,
                used_fallback: true,
            }),
            None => {
                warn!(primary, fallback, "no adapter available");
                None
            }
        }
    }

    /// The first adapter, in registration order, that passes a fresh check.
    pub async fn find_healthy_adapter(&self) -> Option<HealthyAdapter> {
        for name in self.names() {
            if let Some(adapter) = self.checked(&name).await {
                return Some(HealthyAdapter {
                    name,
                    adapter,
                    used_fallback: false,
                });
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn names(&self) -> Vec<String> {
        self.lock()
            .entries
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn default_name(&self) -> Option<String> {
        self.lock().default.clone()
    }

    pub fn info(&self, name: &str) -> Option<AdapterInfo> {
        let state = self.lock();
        state.position(name).map(|i| state.entries[i].clone())
    }

    pub fn status(&self, name: &str) -> Option<AdapterStatus> {
        let state = self.lock();
        state
            .position(name)
            .map(|i| state.status(&state.entries[i]))
    }

    pub fn statuses(&self) -> Vec<AdapterStatus> {
        let state = self.lock();
        state.entries.iter().map(|e| state.status(e)).collect()
    }

    #[cfg(test)]
    fn timer_count(&self) -> usize {
        self.lock().timers.len()
    }
}

impl Drop for AdapterRegistry {
    fn drop(&mut self) {
        self.lock().stop_all_timers();
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AdapterRegistry")
            .field(
                "adapters",
                &state.entries.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("default", &state.default)
            .field("auto_interval", &state.auto_interval)
            .finish()
    }
}
