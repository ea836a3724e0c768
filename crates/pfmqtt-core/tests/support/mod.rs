// In-memory gateways for driving the synchronizer in tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pfmqtt_api::{ConfigPatch, SystemConfig};
use pfmqtt_core::{
    BusEvent, BusGateway, CoreError, Delivery, FilterRule, FirewallGateway, IdentityRegistry,
    SyncConfig, Synchronizer, Timings, TopicConfig,
};

// ── Firewall ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeFirewall {
    rules: Mutex<Vec<FilterRule>>,
    gets: AtomicUsize,
    patches: AtomicUsize,
    failing_gets: AtomicUsize,
    failing_patches: AtomicBool,
}

impl FakeFirewall {
    pub fn with_rules(rules: Vec<FilterRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    pub fn rules(&self) -> Vec<FilterRule> {
        self.rules.lock().unwrap().clone()
    }

    pub fn rule(&self, descr: &str) -> FilterRule {
        self.rules()
            .into_iter()
            .find(|r| r.descr() == Some(descr))
            .unwrap()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn patches(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    /// Make the next `n` reads fail.
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    pub fn fail_patches(&self, fail: bool) {
        self.failing_patches.store(fail, Ordering::SeqCst);
    }
}

fn injected() -> CoreError {
    CoreError::Firewall {
        message: "injected failure".into(),
        status: Some(500),
    }
}

impl FirewallGateway for FakeFirewall {
    async fn get_configuration(&self) -> Result<SystemConfig, CoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(injected());
        }
        let mut config = SystemConfig::default();
        config.filter.rule = self.rules();
        Ok(config)
    }

    async fn patch_configuration(&self, patch: &ConfigPatch) -> Result<(), CoreError> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        if self.failing_patches.load(Ordering::SeqCst) {
            return Err(injected());
        }
        *self.rules.lock().unwrap() = patch.filter.rule.clone();
        Ok(())
    }
}

// ── Bus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub delivery: Delivery,
}

#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<Published>>,
    subscriptions: Mutex<Vec<String>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Payloads sent to `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload)
            .collect()
    }

    /// Topics published to, in order.
    pub fn topics(&self) -> Vec<String> {
        self.published().into_iter().map(|p| p.topic).collect()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl BusGateway for RecordingBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>, delivery: Delivery) -> Result<(), CoreError> {
        self.published.lock().unwrap().push(Published {
            topic: topic.to_owned(),
            payload: String::from_utf8(payload).unwrap(),
            delivery,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), CoreError> {
        self.subscriptions.lock().unwrap().push(topic.to_owned());
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub type TestSync = Synchronizer<FakeFirewall, RecordingBus>;

pub fn sync_config(managed: &[&str]) -> SyncConfig {
    SyncConfig {
        topics: TopicConfig::default(),
        rules: managed.iter().map(|s| (*s).to_owned()).collect(),
        republish_count: 1,
        timings: Timings::default(),
    }
}

/// Registry pre-populated with `<descriptor>` -> `<id>` pairs so tests
/// never hit the disk.
pub fn seeded_registry(pairs: &[(&str, &str)]) -> IdentityRegistry {
    IdentityRegistry::with_pairs(
        std::env::temp_dir().join("pfmqtt-core-tests-unused.json"),
        pairs.iter().map(|(d, id)| (*d, *id)),
    )
}

pub fn synchronizer(
    config: SyncConfig,
    registry: IdentityRegistry,
    rules: Vec<FilterRule>,
) -> TestSync {
    Synchronizer::new(
        config,
        registry,
        FakeFirewall::with_rules(rules),
        RecordingBus::default(),
    )
}

/// Mark the bus connected without running the connect-triggered cycle.
pub fn connect_quietly(sync: &TestSync) {
    if let Some(handle) = sync.dispatch(BusEvent::Connected) {
        handle.abort();
    }
}
