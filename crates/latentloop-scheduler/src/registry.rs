//! Scheduler registry
//!
//! Hands out schedulers by configuration and pools recycled instances. The
//! registry is an explicit value, usually shared through an `Arc`; the pool
//! is the only state it guards.

use crate::config::{SchedulerConfig, SchedulerKind};
use crate::contract::Scheduler;
use crate::ddim::DdimScheduler;
use crate::euler::EulerScheduler;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Idle instances kept per configuration; extras are dropped
    pub max_idle_per_config: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_idle_per_config: 4,
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total requests
    pub requests: u64,
    /// Requests served from the pool
    pub reuses: u64,
    /// Requests that built a new scheduler
    pub constructions: u64,
    /// Schedulers handed back
    pub recycles: u64,
    /// Recycled schedulers dropped because the pool was full
    pub discards: u64,
}

impl RegistryStats {
    /// Reuse rate (0.0 - 1.0)
    pub fn reuse_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.reuses as f64 / self.requests as f64
        }
    }
}

/// An owned scheduler handed out by the registry
///
/// Holds the configuration it was requested with so it can be pooled under
/// the same key when it comes back.
#[derive(Debug)]
pub struct SchedulerEntity {
    key: [u8; 32],
    config: SchedulerConfig,
    scheduler: Box<dyn Scheduler>,
}

impl SchedulerEntity {
    /// Configuration this scheduler was built for
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Pool key
    pub fn key(&self) -> [u8; 32] {
        self.key
    }

    /// The scheduler
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// The scheduler, mutably
    pub fn scheduler_mut(&mut self) -> &mut dyn Scheduler {
        self.scheduler.as_mut()
    }
}

#[derive(Default)]
struct Pool {
    idle: HashMap<[u8; 32], Vec<Box<dyn Scheduler>>>,
    stats: RegistryStats,
}

/// Scheduler registry and pool
pub struct SchedulerRegistry {
    config: RegistryConfig,
    pool: Mutex<Pool>,
}

impl SchedulerRegistry {
    /// Create a registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            pool: Mutex::new(Pool::default()),
        }
    }

    /// Create a registry behind an `Arc`
    pub fn shared(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Algorithms this registry can build
    pub fn available(&self) -> &'static [SchedulerKind] {
        &SchedulerKind::ALL
    }

    /// Get a scheduler for `config`, reusing a pooled one when possible
    pub fn request_scheduler(&self, config: &SchedulerConfig) -> SchedulerEntity {
        let key = config.content_key();
        let mut pool = self.lock();
        pool.stats.requests += 1;

        let pooled = pool.idle.get_mut(&key).and_then(Vec::pop);
        let scheduler = match pooled {
            Some(scheduler) => {
                pool.stats.reuses += 1;
                debug!(kind = %config.kind, "reusing pooled scheduler");
                scheduler
            }
            None => {
                pool.stats.constructions += 1;
                debug!(kind = %config.kind, "constructing scheduler");
                build(config)
            }
        };

        SchedulerEntity {
            key,
            config: config.clone(),
            scheduler,
        }
    }

    /// Take a scheduler back
    ///
    /// The scheduler is uninitialized and pooled, or dropped when its pool is
    /// full. Always returns `None`, which callers store over their handle.
    pub fn recycle_scheduler(&self, entity: SchedulerEntity) -> Option<SchedulerEntity> {
        let SchedulerEntity {
            key,
            config,
            mut scheduler,
        } = entity;
        scheduler.uninit();

        let mut pool = self.lock();
        pool.stats.recycles += 1;

        let limit = self.config.max_idle_per_config;
        let idle = pool.idle.entry(key).or_default();
        if idle.len() < limit {
            idle.push(scheduler);
            debug!(kind = %config.kind, idle = idle.len(), "scheduler pooled");
        } else {
            pool.stats.discards += 1;
            debug!(kind = %config.kind, "pool full, scheduler dropped");
        }
        None
    }

    /// Pool an externally built scheduler under `config`
    ///
    /// The next request for `config` receives it. Returns `false` when the
    /// pool for that configuration is already full.
    pub fn preload(&self, config: &SchedulerConfig, mut scheduler: Box<dyn Scheduler>) -> bool {
        scheduler.uninit();

        let limit = self.config.max_idle_per_config;
        let mut pool = self.lock();
        let idle = pool.idle.entry(config.content_key()).or_default();
        if idle.len() >= limit {
            return false;
        }
        debug!(kind = %config.kind, name = scheduler.name(), "scheduler preloaded");
        idle.push(scheduler);
        true
    }

    /// Total idle schedulers across all configurations
    pub fn idle_count(&self) -> usize {
        self.lock().idle.values().map(Vec::len).sum()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> RegistryStats {
        self.lock().stats.clone()
    }

    /// Drop all pooled schedulers
    pub fn clear(&self) {
        self.lock().idle.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for SchedulerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerRegistry")
            .field("config", &self.config)
            .field("idle", &self.idle_count())
            .finish()
    }
}

fn build(config: &SchedulerConfig) -> Box<dyn Scheduler> {
    match config.kind {
        SchedulerKind::Ddim => Box::new(DdimScheduler::new(config.clone())),
        SchedulerKind::Euler => Box::new(EulerScheduler::new(config.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::SchedulerState;

    #[test]
    fn test_request_builds_matching_kind() {
        let registry = SchedulerRegistry::default();

        let ddim = registry.request_scheduler(&SchedulerConfig::ddim());
        let euler = registry.request_scheduler(&SchedulerConfig::euler());

        assert_eq!(ddim.scheduler().name(), "ddim");
        assert_eq!(euler.scheduler().name(), "euler");
        assert_eq!(ddim.scheduler().state(), SchedulerState::Unconfigured);
        assert_eq!(registry.stats().constructions, 2);
    }

    #[test]
    fn test_recycle_then_reuse() {
        let registry = SchedulerRegistry::default();
        let config = SchedulerConfig::ddim().with_seed(5);

        let mut entity = registry.request_scheduler(&config);
        entity.scheduler_mut().init(3).unwrap();

        let handle = registry.recycle_scheduler(entity);
        assert!(handle.is_none());
        assert_eq!(registry.idle_count(), 1);

        let entity = registry.request_scheduler(&config);
        assert_eq!(entity.scheduler().state(), SchedulerState::Uninitialized);
        assert_eq!(registry.idle_count(), 0);

        let stats = registry.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.reuses, 1);
        assert_eq!(stats.constructions, 1);
        assert!((stats.reuse_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_is_keyed_by_config() {
        let registry = SchedulerRegistry::default();

        let entity = registry.request_scheduler(&SchedulerConfig::ddim().with_seed(1));
        registry.recycle_scheduler(entity);

        let other = registry.request_scheduler(&SchedulerConfig::ddim().with_seed(2));
        assert_eq!(registry.stats().reuses, 0);
        assert_eq!(registry.idle_count(), 1);
        assert_eq!(other.config().seed, 2);
    }

    #[test]
    fn test_pool_cap() {
        let registry = SchedulerRegistry::new(RegistryConfig {
            max_idle_per_config: 1,
        });
        let config = SchedulerConfig::euler();

        let a = registry.request_scheduler(&config);
        let b = registry.request_scheduler(&config);
        registry.recycle_scheduler(a);
        registry.recycle_scheduler(b);

        assert_eq!(registry.idle_count(), 1);
        assert_eq!(registry.stats().discards, 1);

        registry.clear();
        assert_eq!(registry.idle_count(), 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let entity = registry.request_scheduler(&SchedulerConfig::ddim());
                    registry.recycle_scheduler(entity);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = registry.stats();
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.recycles, 4);
        assert!(registry.idle_count() >= 1);
    }

    #[test]
    fn test_preload() {
        let registry = SchedulerRegistry::new(RegistryConfig {
            max_idle_per_config: 1,
        });
        let config = SchedulerConfig::euler().with_seed(8);

        assert!(registry.preload(&config, Box::new(EulerScheduler::new(config.clone()))));
        assert!(!registry.preload(&config, Box::new(EulerScheduler::new(config.clone()))));

        let entity = registry.request_scheduler(&config);
        assert_eq!(entity.scheduler().state(), SchedulerState::Uninitialized);
        assert_eq!(registry.stats().reuses, 1);
    }

    #[test]
    fn test_available() {
        let registry = SchedulerRegistry::default();
        assert_eq!(registry.available(), &[SchedulerKind::Ddim, SchedulerKind::Euler]);
    }
}
